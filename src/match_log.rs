// Match log module for per-turn JSONL records
//
// Each scored turn is appended to a JSON Lines file that the replay tool can
// read back. Writes go through a tokio file behind a mutex and are awaited,
// so records land in turn order.

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One scored turn as written to the match log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Round number as shown in the turn table; 0 scores the starting squares
    pub turn: usize,
    pub player: usize,
    /// Turn string as applied, after truncation and any forced move
    pub turn_string: String,
    pub moves: i64,
    pub discovered: i64,
    pub first: i64,
    pub captures: i64,
    /// Score delta of this turn
    pub score: i64,
    /// Running total of the player after this turn
    pub total: i64,
    /// Compact encoding of the player's map after the turn
    pub map: String,
    /// Whatever the agent wrote to stderr during the turn
    #[serde(default)]
    pub comments: String,
    pub timestamp: String,
}

/// Shared match log state
#[derive(Clone)]
pub struct MatchLogger {
    file: Arc<Mutex<Option<File>>>,
    enabled: bool,
}

impl MatchLogger {
    /// Creates a new match logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => {
                info!("Match log enabled: {}", log_file_path);
                MatchLogger {
                    file: Arc::new(Mutex::new(Some(file))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to create match log file '{}': {}", log_file_path, e);
                Self::disabled()
            }
        }
    }

    /// Creates a disabled match logger (no-op)
    pub fn disabled() -> Self {
        MatchLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Appends a record; failures are logged and otherwise ignored
    pub async fn log_turn(&self, record: &TurnRecord) {
        if !self.enabled {
            return;
        }

        let mut file_guard = self.file.lock().await;
        let Some(file) = file_guard.as_mut() else {
            return;
        };

        match serde_json::to_string(record) {
            Ok(json_line) => {
                let line_with_newline = format!("{}\n", json_line);
                if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                    error!("Failed to write match log entry: {}", e);
                } else if let Err(e) = file.flush().await {
                    error!("Failed to flush match log: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to serialize match log entry: {}", e);
            }
        }
    }
}

/// Current time in the format used by match log records
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(turn: usize) -> TurnRecord {
        TurnRecord {
            turn,
            player: turn % 2,
            turn_string: "FFR".to_string(),
            moves: 3,
            discovered: 5,
            first: 5,
            captures: 0,
            score: 7,
            total: 7,
            map: "BBAAAA".to_string(),
            comments: String::new(),
            timestamp: timestamp(),
        }
    }

    #[tokio::test]
    async fn test_records_are_written_in_order() {
        let path = std::env::temp_dir().join(format!("match_log_test_{}.jsonl", std::process::id()));
        let path_str = path.to_string_lossy().to_string();

        let logger = MatchLogger::new(true, &path_str).await;
        assert!(logger.is_enabled());
        for turn in 0..3 {
            logger.log_turn(&record(turn)).await;
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let turns: Vec<usize> = contents
            .lines()
            .map(|line| serde_json::from_str::<TurnRecord>(line).unwrap().turn)
            .collect();
        assert_eq!(turns, vec![0, 1, 2]);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_disabled_logger_is_a_no_op() {
        let logger = MatchLogger::new(false, "/nonexistent/dir/log.jsonl").await;
        assert!(!logger.is_enabled());
        logger.log_turn(&record(0)).await;
    }

    #[tokio::test]
    async fn test_unwritable_path_disables_logging() {
        let logger = MatchLogger::new(true, "/nonexistent/dir/log.jsonl").await;
        assert!(!logger.is_enabled());
    }
}
