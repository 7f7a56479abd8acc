//! Error types for the maze solver

use thiserror::Error;

use crate::environment::Pos;
use crate::navigate::Path;

/// Problems with the raw grid layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("grid has no cells")]
    Empty,

    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
}

/// Main error type for the crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed grid: {0}")]
    Shape(#[from] ShapeError),

    #[error("unknown cell code {code} at ({row}, {col}), expected 0 (wall), 1 (floor) or 2 (goal)")]
    UnknownCell { code: u8, row: usize, col: usize },

    #[error("grid has no goal cell")]
    NoGoal,

    #[error("rewards must satisfy wall < floor < goal (wall={wall}, floor={floor}, goal={goal})")]
    UnorderedRewards { wall: i32, floor: i32, goal: i32 },

    #[error("state {pos} is outside the {rows}x{cols} grid")]
    OutOfBounds { pos: Pos, rows: usize, cols: usize },

    #[error("value table is {table_rows}x{table_cols} but the grid is {rows}x{cols}")]
    TableShapeMismatch {
        table_rows: usize,
        table_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error(
        "greedy walk from {start} visited {state} {visits} times without reaching a terminal cell"
    )]
    NonConvergence {
        start: Pos,
        state: Pos,
        visits: usize,
        partial: Path,
    },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type alias for maze solver operations
pub type Result<T> = std::result::Result<T, Error>;
