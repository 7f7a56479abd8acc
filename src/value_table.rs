//! Dense state-action value store

use ndarray::{s, Array3, ArrayView3};
use ordered_float::OrderedFloat;

use crate::environment::{Env, Movement, Pos};
use crate::error::{Error, Result};

/// Q-values indexed by `(row, col, action)`, zero-initialised.
///
/// Indexing with a position outside the table panics.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    values: Array3<f32>,
}

impl ValueTable {
    pub fn new(rows: usize, cols: usize) -> Self {
        ValueTable {
            values: Array3::zeros((rows, cols, Movement::ALL.len())),
        }
    }

    pub fn for_env(env: &Env) -> Self {
        Self::new(env.rows(), env.cols())
    }

    pub fn rows(&self) -> usize {
        self.values.dim().0
    }

    pub fn cols(&self) -> usize {
        self.values.dim().1
    }

    pub(crate) fn check_shape(&self, env: &Env) -> Result<()> {
        if self.rows() == env.rows() && self.cols() == env.cols() {
            Ok(())
        } else {
            Err(Error::TableShapeMismatch {
                table_rows: self.rows(),
                table_cols: self.cols(),
                rows: env.rows(),
                cols: env.cols(),
            })
        }
    }

    pub fn get(&self, pos: Pos, action: Movement) -> f32 {
        self.values[[pos.row, pos.col, action.index()]]
    }

    pub fn set(&mut self, pos: Pos, action: Movement, value: f32) {
        self.values[[pos.row, pos.col, action.index()]] = value;
    }

    /// Highest-valued action at `pos`. Exact ties go to the action listed
    /// first in [`Movement::ALL`].
    pub fn best_action(&self, pos: Pos) -> (Movement, f32) {
        let row = self.values.slice(s![pos.row, pos.col, ..]);
        Movement::ALL
            .iter()
            .skip(1)
            .fold((Movement::ALL[0], row[0]), |(best, best_value), &action| {
                let value = row[action.index()];
                if OrderedFloat(value) > OrderedFloat(best_value) {
                    (action, value)
                } else {
                    (best, best_value)
                }
            })
    }

    pub fn max_value(&self, pos: Pos) -> f32 {
        self.best_action(pos).1
    }

    pub fn values(&self) -> ArrayView3<'_, f32> {
        self.values.view()
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}
