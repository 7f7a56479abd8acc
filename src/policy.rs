use rand::Rng;

use crate::environment::{Movement, Pos};
use crate::error::{Error, Result};
use crate::value_table::ValueTable;

/// Epsilon-greedy action selection where `epsilon` is the probability of
/// *exploiting* the value table. `epsilon = 0.95` acts greedily 95% of the
/// time and picks a uniformly random action otherwise.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EpsilonGreedy {
    epsilon: f32,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(Error::invalid_config(format!(
                "epsilon must be within [0, 1], got {}",
                epsilon
            )));
        }
        Ok(EpsilonGreedy { epsilon })
    }

    /// Always exploits; never draws from the random source.
    pub fn greedy() -> Self {
        EpsilonGreedy { epsilon: 1.0 }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn next_action<R: Rng + ?Sized>(
        &self,
        table: &ValueTable,
        state: Pos,
        rng: &mut R,
    ) -> Movement {
        if self.epsilon >= 1.0 || rng.gen::<f32>() < self.epsilon {
            table.best_action(state).0
        } else {
            rng.gen::<Movement>()
        }
    }
}

/// Picks an action for `state`: the best-known one with probability
/// `epsilon`, a uniformly random one otherwise.
pub fn select_action<R: Rng + ?Sized>(
    table: &ValueTable,
    state: Pos,
    epsilon: f32,
    rng: &mut R,
) -> Movement {
    EpsilonGreedy { epsilon }.next_action(table, state, rng)
}
