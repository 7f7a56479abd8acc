//! Greedy path extraction from a trained value table

use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, trace};

use crate::agent::Agent;
use crate::environment::{Env, Pos, Terminal};
use crate::error::{Error, Result};
use crate::value_table::ValueTable;

/// How often a greedy walk may re-enter the same cell before it is treated
/// as a cycle.
pub const DEFAULT_MAX_REVISITS: usize = 1;

/// Ordered cells visited by a greedy walk. Wall cells are never part of a
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    states: Vec<Pos>,
    end: Option<Terminal>,
}

impl Path {
    fn empty(end: Terminal) -> Self {
        Path {
            states: Vec::new(),
            end: Some(end),
        }
    }

    pub fn states(&self) -> &[Pos] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn first(&self) -> Option<Pos> {
        self.states.first().copied()
    }

    pub fn last(&self) -> Option<Pos> {
        self.states.last().copied()
    }

    /// Terminal cell kind that stopped the walk; `None` for the partial
    /// path of a walk that never terminated.
    pub fn end(&self) -> Option<Terminal> {
        self.end
    }

    pub fn reached_goal(&self) -> bool {
        self.end == Some(Terminal::Goal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pos> + '_ {
        self.states.iter()
    }

    pub fn into_states(self) -> Vec<Pos> {
        self.states
    }
}

pub struct PathExtractor<'a> {
    env: &'a Env,
    table: &'a ValueTable,
    max_revisits: usize,
}

impl<'a> PathExtractor<'a> {
    pub fn new(env: &'a Env, table: &'a ValueTable) -> Self {
        PathExtractor {
            env,
            table,
            max_revisits: DEFAULT_MAX_REVISITS,
        }
    }

    pub fn with_max_revisits(mut self, max_revisits: usize) -> Self {
        self.max_revisits = max_revisits;
        self
    }

    /// Walks greedily from `start` until a terminal cell is reached.
    ///
    /// A start cell that is already terminal yields an empty path. A walk that
    /// re-enters some cell more than `max_revisits` times fails with
    /// [`Error::NonConvergence`].
    pub fn extract(&self, start: Pos) -> Result<Path> {
        self.env.check_bounds(start)?;
        self.table.check_shape(self.env)?;

        if let Some(end) = self.env.terminal(start) {
            debug!(%start, ?end, "start cell is terminal");
            return Ok(Path::empty(end));
        }

        let mut visits = Array2::<usize>::zeros((self.env.rows(), self.env.cols()));
        visits[[start.row, start.col]] = 1;
        let mut states = vec![start];
        let mut agent = Agent::new(start);

        loop {
            let (action, value) = self.table.best_action(agent.pos);
            let (_, terminal) = agent.r#move(self.env, action);
            let pos = agent.pos;
            trace!(%pos, %action, value, "greedy step");

            if terminal != Some(Terminal::Wall) {
                states.push(pos);
            }
            if let Some(end) = terminal {
                debug!(%start, ?end, len = states.len(), reward = agent.reward, "path extracted");
                return Ok(Path {
                    states,
                    end: Some(end),
                });
            }

            let count = &mut visits[[pos.row, pos.col]];
            *count += 1;
            if *count > self.max_revisits + 1 {
                return Err(Error::NonConvergence {
                    start,
                    state: pos,
                    visits: *count,
                    partial: Path { states, end: None },
                });
            }
        }
    }
}

/// Extracts a greedy path with the default revisit threshold.
pub fn extract_path(env: &Env, table: &ValueTable, start: Pos) -> Result<Path> {
    PathExtractor::new(env, table).extract(start)
}
