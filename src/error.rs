//! Error types for the maze model, the agent protocol and match orchestration.

use std::time::Duration;

use thiserror::Error;

use crate::types::{Dir, State};

/// Errors raised by the maze model, inference, path analysis and the codec.
///
/// Apart from [`MazeError::Format`], every variant signals an internally
/// inconsistent map and is never recovered from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MazeError {
    /// A resolved wall was asked to take a different value.
    #[error("contradiction at ({row}, {col}) {dir:?}: wall is {stored:?}, asked for {requested:?}")]
    Contradiction {
        row: usize,
        col: usize,
        dir: Dir,
        stored: State,
        requested: State,
    },

    /// A line of sight did not match `[BLRN]*W`.
    #[error("malformed line of sight `{line}`: {reason}")]
    BadSightLine { line: String, reason: String },

    /// A move command outside F, T, L, R.
    #[error("invalid move command {0:?}")]
    BadCommand(char),

    /// Inference or path reconstruction reached an impossible state.
    #[error("inconsistent map: {0}")]
    Inconsistent(String),

    /// A text or compact maze description could not be parsed.
    #[error("malformed maze description: {0}")]
    Format(String),
}

/// Ways an agent can break the line protocol. Each one forfeits the match.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected end of input")]
    Eof,

    #[error("line was not newline-terminated")]
    Unterminated,

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("invalid turn `{0}`")]
    InvalidTurn(String),

    #[error("pipe error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that stop the arbiter before or during a match.
#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("couldn't load maze from `{path}`: {source}")]
    MazeFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unusable maze: {0}")]
    InvalidMaze(String),

    #[error("matches take one or two players, got {0}")]
    PlayerCount(usize),

    #[error("couldn't place players after {0} attempts")]
    Placement(usize),

    #[error("couldn't launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Maze(#[from] MazeError),
}
