//! The fixed-size playing field
//!
//! Coordinates are `(x, y)` with `x` in `0..COLUMNS` left to right and `y` in
//! `0..ROWS` top to bottom. The grid never changes size: cleared rows are
//! removed and the same number of empty rows are inserted at the top.

use crate::error::SnapshotError;
use crate::piece::PieceColor;
use crate::{COLUMNS, ROWS};
use serde::{Deserialize, Serialize};

/// A board cell is either empty or holds the colour of a frozen piece.
pub type Cell = Option<PieceColor>;

/// Decoding goes through [`Board::from_rows`], so a received board always
/// has the fixed dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Cell>>", into = "Vec<Vec<Cell>>")]
pub struct Board {
    rows: Vec<Vec<Cell>>,
}

impl Board {
    pub fn new() -> Self {
        Self {
            rows: vec![vec![None; COLUMNS]; ROWS],
        }
    }

    /// Wraps a received grid, rejecting anything that is not ROWS x COLUMNS.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Self, SnapshotError> {
        if rows.len() != ROWS || rows.iter().any(|row| row.len() != COLUMNS) {
            return Err(SnapshotError::BoardSize);
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn get(&self, x: usize, y: usize) -> Cell {
        self.rows.get(y).and_then(|row| row.get(x)).copied().flatten()
    }

    /// Sets a cell; out-of-range writes are ignored and return false.
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) -> bool {
        match self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_some()
    }

    pub fn is_row_full(&self, y: usize) -> bool {
        self.rows
            .get(y)
            .is_some_and(|row| row.iter().all(Option::is_some))
    }

    /// Removes every full row, shifts the rest down and refills the top with
    /// empty rows. Returns the number of rows removed.
    pub fn clear_full_rows(&mut self) -> usize {
        self.rows.retain(|row| !row.iter().all(Option::is_some));
        let cleared = ROWS - self.rows.len();
        for _ in 0..cleared {
            self.rows.insert(0, vec![None; COLUMNS]);
        }
        cleared
    }

    pub fn occupied_cells(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().filter(|cell| cell.is_some()).count())
            .sum()
    }
}

impl TryFrom<Vec<Vec<Cell>>> for Board {
    type Error = SnapshotError;

    fn try_from(rows: Vec<Vec<Cell>>) -> Result<Self, Self::Error> {
        Board::from_rows(rows)
    }
}

impl From<Board> for Vec<Vec<Cell>> {
    fn from(board: Board) -> Self {
        board.rows
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
