//! Agent child processes and the line protocol spoken over their pipes.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::error::{ArbiterError, ProtocolError};

/// A running agent connected through its stdin, stdout and stderr.
///
/// Stderr is drained continuously by a background task into a bounded
/// buffer, so a chatty agent can never block on a full pipe. Bytes past the
/// limit are discarded until the buffer is collected with
/// [`AgentProcess::take_comments`].
pub struct AgentProcess {
    label: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    comments: Arc<Mutex<Vec<u8>>>,
    drain: JoinHandle<()>,
}

impl AgentProcess {
    /// Launches `command_line`, split on whitespace into program and arguments.
    ///
    /// Must be called from within a tokio runtime. The child is killed if
    /// the handle is dropped without a [`shutdown`](Self::shutdown).
    pub fn spawn(label: &str, command_line: &str, stderr_limit: usize) -> Result<Self, ArbiterError> {
        let launch_error = |source: io::Error| ArbiterError::Launch {
            command: command_line.to_string(),
            source,
        };

        let mut words = command_line.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| launch_error(io::Error::new(io::ErrorKind::InvalidInput, "empty command")))?;

        let mut child = Command::new(program)
            .args(words)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_error)?;

        let missing = |stream: &str| launch_error(io::Error::other(format!("{} was not piped", stream)));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let comments = Arc::new(Mutex::new(Vec::new()));
        let sink = comments.clone();
        let drain = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut kept = sink.lock();
                        let room = stderr_limit.saturating_sub(kept.len());
                        kept.extend_from_slice(&buf[..n.min(room)]);
                    }
                }
            }
        });

        debug!("{}: launched `{}` (pid {:?})", label, command_line, child.id());
        Ok(AgentProcess {
            label: label.to_string(),
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            comments,
            drain,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Writes one newline-terminated line and flushes it
    pub async fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ProtocolError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed")))?;
        debug!("{} <- {}", self.label, line);
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Reads one line of at most `max_bytes` bytes (newline included)
    ///
    /// The line is returned without trailing whitespace. End of stream, a
    /// line cut off before its newline and an expired `timeout` are all
    /// protocol failures.
    pub async fn read_line(&mut self, timeout: Duration, max_bytes: usize) -> Result<String, ProtocolError> {
        let mut line = String::new();
        let mut limited = (&mut self.stdout).take(max_bytes as u64);
        let read = tokio::time::timeout(timeout, limited.read_line(&mut line))
            .await
            .map_err(|_| ProtocolError::Timeout(timeout))??;

        if read == 0 {
            return Err(ProtocolError::Eof);
        }
        if !line.ends_with('\n') {
            return Err(ProtocolError::Unterminated);
        }
        let line = line.trim_end().to_string();
        debug!("{} -> {}", self.label, line);
        Ok(line)
    }

    /// Returns and clears everything the agent wrote to stderr so far
    pub fn take_comments(&self) -> String {
        let bytes = std::mem::take(&mut *self.comments.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Sends `Quit`, closes stdin and waits up to `grace` for the agent to
    /// exit before killing it. Returns the exit status when one was observed.
    pub async fn shutdown(mut self, grace: Duration) -> Option<ExitStatus> {
        if let Err(e) = self.send_line("Quit").await {
            debug!("{}: couldn't send Quit: {}", self.label, e);
        }
        drop(self.stdin.take());

        let status = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!("{}: couldn't wait for exit: {}", self.label, e);
                None
            }
            Err(_) => {
                warn!("{}: still running {:?} after Quit, killing it", self.label, grace);
                if let Err(e) = self.child.kill().await {
                    warn!("{}: kill failed: {}", self.label, e);
                }
                None
            }
        };

        self.drain.abort();
        debug!("{}: exited with {:?}", self.label, status);
        status
    }
}
