//! TOML configuration for a maze run
//!
//! Every section is optional; missing values fall back to the reference
//! 12x12 maze and its training constants.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::environment::{Env, Pos, Rewards};
use crate::error::{Error, Result};
use crate::navigate::DEFAULT_MAX_REVISITS;
use crate::rl::TrainingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub max_revisits: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            max_revisits: DEFAULT_MAX_REVISITS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    /// Rows of cell codes: 0 wall, 1 floor, 2 goal.
    pub grid: Vec<Vec<u8>>,
    pub start: Pos,
    /// Seed for the random source; drawn from entropy when absent.
    pub seed: Option<u64>,
    pub rewards: Rewards,
    pub training: TrainingConfig,
    pub navigation: NavigationConfig,
}

impl Default for MazeConfig {
    fn default() -> Self {
        MazeConfig {
            grid: reference_maze(),
            start: Pos::new(11, 5),
            seed: None,
            rewards: Rewards::default(),
            training: TrainingConfig::default(),
            navigation: NavigationConfig::default(),
        }
    }
}

impl MazeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MazeConfig = toml::from_str(text)?;
        config.training.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            operation: format!("read config {}", path.display()),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn build_env(&self) -> Result<Env> {
        let env = Env::build(&self.grid, self.rewards)?;
        env.check_bounds(self.start)?;
        Ok(env)
    }
}

/// The 12x12 maze the solver ships with; the goal sits at (0, 5).
pub fn reference_maze() -> Vec<Vec<u8>> {
    vec![
        vec![0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0],
        vec![0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0],
        vec![0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0],
        vec![0, 1, 1, 0, 1, 1, 1, 1, 0, 1, 1, 0],
        vec![0, 0, 0, 0, 1, 1, 0, 1, 0, 1, 1, 0],
        vec![0, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 0],
        vec![0, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 0],
        vec![0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0],
        vec![0, 1, 0, 1, 1, 1, 1, 1, 0, 1, 1, 0],
        vec![0, 1, 0, 1, 0, 0, 0, 1, 0, 1, 1, 0],
        vec![0, 1, 1, 1, 0, 1, 1, 1, 0, 1, 1, 0],
        vec![0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0],
    ]
}
