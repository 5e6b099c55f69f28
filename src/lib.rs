// Library exports for the maze exploration contest
// The arbiter binary, the reference player and the conversion and replay
// tools all share the maze model, inference and analysis defined here

pub mod analysis;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod infer;
pub mod match_log;
pub mod maze;
pub mod maze_io;
pub mod process;
pub mod replay;
pub mod strategy;
pub mod types;
