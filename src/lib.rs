//! Tabular Q-learning maze solver
//!
//! A grid of walls, floor and goal cells is turned into an [`Env`] with a
//! reward per cell. A [`Trainer`] runs epsilon-greedy episodes from a start
//! cell and fills a [`ValueTable`]; a [`PathExtractor`] then walks the table
//! greedily to produce a [`Path`] to the goal.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod navigate;
pub mod policy;
pub mod rl;
pub mod value_table;

pub use config::{MazeConfig, NavigationConfig};
pub use environment::{Cell, Env, Movement, Pos, Rewards, Terminal};
pub use error::{Error, Result, ShapeError};
pub use navigate::{extract_path, Path, PathExtractor};
pub use policy::{select_action, EpsilonGreedy};
pub use rl::{train, CancelFlag, EpisodeStats, Trainer, TrainingConfig, TrainingReport};
pub use value_table::ValueTable;
