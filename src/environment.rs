use std::fmt;

use ndarray::{Array2, ArrayView2};
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ShapeError};

/// Content of a single grid cell, decoded from the raw integer codes
/// `0` (wall), `1` (floor) and `2` (goal).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Wall,
    Floor,
    Goal,
}

impl Cell {
    pub fn from_code(code: u8) -> Option<Cell> {
        match code {
            0 => Some(Cell::Wall),
            1 => Some(Cell::Floor),
            2 => Some(Cell::Goal),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Cell::Wall => 0,
            Cell::Floor => 1,
            Cell::Goal => 2,
        }
    }

    pub fn reward(self, rewards: &Rewards) -> i32 {
        match self {
            Cell::Wall => rewards.wall,
            Cell::Floor => rewards.floor,
            Cell::Goal => rewards.goal,
        }
    }
}

/// The kind of terminal cell a walk stopped on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminal {
    Wall,
    Goal,
}

// Action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Movement {
    Up,
    Down,
    Left,
    Right,
}

impl Movement {
    /// Every action, in the order used for indexing and tie-breaking.
    pub const ALL: [Movement; 4] = [Movement::Up, Movement::Down, Movement::Left, Movement::Right];

    pub fn index(self) -> usize {
        match self {
            Movement::Up => 0,
            Movement::Down => 1,
            Movement::Left => 2,
            Movement::Right => 3,
        }
    }

    pub fn into_vector(self) -> (isize, isize) {
        match self {
            Movement::Up    => (-1, 0),
            Movement::Down  => ( 1, 0),
            Movement::Left  => ( 0,-1),
            Movement::Right => ( 0, 1),
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Movement::Up => "up",
            Movement::Down => "down",
            Movement::Left => "left",
            Movement::Right => "right",
        };
        f.write_str(name)
    }
}

impl Distribution<Movement> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Movement {
        Movement::ALL[rng.gen_range(0..Movement::ALL.len())]
    }
}

/// A (row, col) coordinate in the grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }
}

impl From<(usize, usize)> for Pos {
    fn from((row, col): (usize, usize)) -> Self {
        Pos { row, col }
    }
}

impl From<Pos> for (usize, usize) {
    fn from(pos: Pos) -> Self {
        (pos.row, pos.col)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Reward granted for stepping onto each kind of cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rewards {
    pub wall: i32,
    pub floor: i32,
    pub goal: i32,
}

impl Default for Rewards {
    fn default() -> Self {
        Rewards {
            wall: -500,
            floor: -10,
            goal: 500,
        }
    }
}

impl Rewards {
    pub fn validate(&self) -> Result<()> {
        if self.wall < self.floor && self.floor < self.goal {
            Ok(())
        } else {
            Err(Error::UnorderedRewards {
                wall: self.wall,
                floor: self.floor,
                goal: self.goal,
            })
        }
    }
}

/// Immutable grid world together with its derived reward table.
///
/// Methods taking a [`Pos`] index the grid directly and panic when the
/// position lies outside it; use [`Env::check_bounds`] on untrusted input.
#[derive(Debug, Clone)]
pub struct Env {
    cells: Array2<Cell>,
    rewards: Array2<i32>,
    reward_values: Rewards,
}

impl Env {
    /// Decodes a rectangular grid of cell codes and derives its reward table.
    pub fn build(grid: &[Vec<u8>], rewards: Rewards) -> Result<Self> {
        if grid.iter().all(Vec::is_empty) {
            return Err(ShapeError::Empty.into());
        }
        let rows = grid.len();
        let cols = grid[0].len();
        rewards.validate()?;

        let mut cells = Array2::from_elem((rows, cols), Cell::Wall);
        for (row, line) in grid.iter().enumerate() {
            if line.len() != cols {
                return Err(ShapeError::RaggedRow {
                    row,
                    expected: cols,
                    got: line.len(),
                }
                .into());
            }
            for (col, &code) in line.iter().enumerate() {
                cells[[row, col]] =
                    Cell::from_code(code).ok_or(Error::UnknownCell { code, row, col })?;
            }
        }
        if !cells.iter().any(|cell| *cell == Cell::Goal) {
            return Err(Error::NoGoal);
        }

        let reward_table = cells.mapv(|cell| cell.reward(&rewards));
        Ok(Env {
            cells,
            rewards: reward_table,
            reward_values: rewards,
        })
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.row < self.rows() && pos.col < self.cols()
    }

    pub fn check_bounds(&self, pos: Pos) -> Result<()> {
        if self.contains(pos) {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                pos,
                rows: self.rows(),
                cols: self.cols(),
            })
        }
    }

    pub fn cell(&self, pos: Pos) -> Cell {
        self.cells[[pos.row, pos.col]]
    }

    pub fn reward(&self, pos: Pos) -> i32 {
        self.rewards[[pos.row, pos.col]]
    }

    pub fn rewards(&self) -> &Rewards {
        &self.reward_values
    }

    pub fn reward_table(&self) -> ArrayView2<'_, i32> {
        self.rewards.view()
    }

    /// Walls and goals both end a walk: anything not paying the floor reward
    /// is terminal.
    pub fn is_terminal(&self, pos: Pos) -> bool {
        self.reward(pos) != self.reward_values.floor
    }

    pub fn terminal(&self, pos: Pos) -> Option<Terminal> {
        if !self.is_terminal(pos) {
            None
        } else if self.reward(pos) == self.reward_values.goal {
            Some(Terminal::Goal)
        } else {
            Some(Terminal::Wall)
        }
    }

    /// Moves one cell in the given direction. Leaving the grid is absorbed:
    /// the position stays where it was.
    pub fn step(&self, pos: Pos, movement: Movement) -> Pos {
        self.check_movement(pos, movement).0
    }

    /// Returns the resulting position and whether the move bumped into the
    /// edge of the grid.
    fn check_movement(&self, pos: Pos, movement: Movement) -> (Pos, bool) {
        let (d_row, d_col) = movement.into_vector();
        let new_row = pos.row as isize + d_row;
        let new_col = pos.col as isize + d_col;

        if new_row < 0
            || new_col < 0
            || new_row >= self.rows() as isize
            || new_col >= self.cols() as isize
        {
            (pos, true)
        } else {
            (Pos::new(new_row as usize, new_col as usize), false)
        }
    }

    pub fn bumps_edge(&self, pos: Pos, movement: Movement) -> bool {
        self.check_movement(pos, movement).1
    }

    pub fn iter_all_coordinates(&self) -> EnvIter {
        EnvIter::new(self.rows(), self.cols())
    }
}

/// Row-major iterator over every coordinate of a grid.
pub struct EnvIter {
    next: Option<Pos>,
    rows: usize,
    cols: usize,
}

impl EnvIter {
    fn new(rows: usize, cols: usize) -> EnvIter {
        let next = if rows > 0 && cols > 0 { Some(Pos::new(0, 0)) } else { None };
        EnvIter { next, rows, cols }
    }
}

impl Iterator for EnvIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        let current = self.next?;
        let mut following = Pos::new(current.row, current.col + 1);
        if following.col == self.cols {
            following = Pos::new(current.row + 1, 0);
        }
        self.next = if following.row < self.rows { Some(following) } else { None };
        Some(current)
    }
}
