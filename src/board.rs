//! Shared occupancy grid, collision detection and row clearing

use crate::error::{GameError, ProtocolError};
use crate::piece::FallingPiece;
use crate::player::PlayerId;
use std::collections::BTreeMap;

/// Wire value of an empty cell
pub const EMPTY_CELL: i64 = -1;

/// A cell on the grid - either empty or owned by the player who placed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Owned(PlayerId),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn owner(&self) -> Option<PlayerId> {
        match self {
            Cell::Empty => None,
            Cell::Owned(id) => Some(*id),
        }
    }

    /// Wire representation: the owner id, or -1 when empty
    pub fn to_raw(self) -> i64 {
        match self {
            Cell::Empty => EMPTY_CELL,
            Cell::Owned(id) => i64::from(id),
        }
    }

    pub fn from_raw(raw: i64) -> Option<Cell> {
        if raw == EMPTY_CELL {
            return Some(Cell::Empty);
        }
        PlayerId::try_from(raw).ok().map(Cell::Owned)
    }
}

/// The shared board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    /// Stored as [row][col], row 0 is the top, rows increase downward
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    /// Create an empty grid
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![vec![Cell::Empty; width]; height],
        }
    }

    /// Rebuild a grid from wire rows (owner ids, -1 for empty)
    pub fn from_raw(width: usize, height: usize, map: &[Vec<i64>]) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedGrid { width, height };
        if map.len() != height {
            return Err(malformed());
        }
        let cells = map
            .iter()
            .map(|row| {
                if row.len() != width {
                    return Err(malformed());
                }
                row.iter()
                    .map(|&raw| Cell::from_raw(raw).ok_or_else(malformed))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { width, height, cells })
    }

    /// Wire rows (owner ids, -1 for empty)
    pub fn to_raw(&self) -> Vec<Vec<i64>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_raw()).collect())
            .collect()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the cell at a position (row, col)
    /// Returns None if out of bounds
    #[cfg(test)]
    pub fn get(&self, row: i32, col: i32) -> Option<Cell> {
        let (row, col) = self.index(row, col)?;
        Some(self.cells[row][col])
    }

    /// Set a cell at a position
    /// Returns false if out of bounds
    #[cfg(test)]
    pub fn set(&mut self, row: i32, col: i32, cell: Cell) -> bool {
        let Some((row, col)) = self.index(row, col) else {
            return false;
        };
        self.cells[row][col] = cell;
        true
    }

    fn index(&self, row: i32, col: i32) -> Option<(usize, usize)> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < self.height && col < self.width).then_some((row, col))
    }

    /// Whether the piece fits at its own position
    pub fn test_shape(&self, piece: &FallingPiece) -> bool {
        self.test_shape_at(piece, piece.row, piece.col, piece.rotation)
    }

    /// Whether the piece would fit at a hypothetical anchor and rotation.
    ///
    /// Left, right and bottom bounds are strict. Cells above the top (negative
    /// rows) are always accepted so pieces can rotate right after spawning.
    pub fn test_shape_at(&self, piece: &FallingPiece, row: i32, col: i32, rotation: u8) -> bool {
        let Some(cells) = piece.cells_at(row, col, rotation) else {
            return false;
        };
        cells.iter().all(|&(r, c)| {
            if c < 0 || c >= self.width as i32 || r >= self.height as i32 {
                return false;
            }
            r < 0 || self.cells[r as usize][c as usize].is_empty()
        })
    }

    /// Write the piece's owner into every cell it covers.
    ///
    /// Nothing is written unless all four cells are on the grid.
    pub fn place_shape(&mut self, piece: &FallingPiece) -> Result<(), GameError> {
        let cells = piece.cells().ok_or(GameError::OutOfBounds {
            row: piece.row,
            col: piece.col,
        })?;
        let mut targets = Vec::with_capacity(cells.len());
        for (row, col) in cells {
            let index = self
                .index(row, col)
                .ok_or(GameError::OutOfBounds { row, col })?;
            targets.push(index);
        }
        for (row, col) in targets {
            self.cells[row][col] = Cell::Owned(piece.player_id);
        }
        Ok(())
    }

    /// Drop the piece as far as it goes, then place it.
    ///
    /// The piece's row is updated to its resting row.
    pub fn slam_shape(&mut self, piece: &mut FallingPiece) -> Result<(), GameError> {
        if !self.test_shape(piece) {
            return Err(GameError::IllegalSlam {
                player: piece.player_id,
            });
        }
        let mut row = piece.row;
        while self.test_shape_at(piece, row + 1, piece.col, piece.rotation) {
            row += 1;
        }
        piece.row = row;
        self.place_shape(piece)
    }

    /// Clear every full row, top to bottom, and return how many were cleared
    pub fn clear_full_rows(&mut self) -> usize {
        let mut cleared = 0;
        for row in 0..self.height {
            if self.is_row_full(row) {
                self.clear_row(row);
                cleared += 1;
            }
        }
        cleared
    }

    /// Remove a row, shifting every row above it down by one
    fn clear_row(&mut self, row: usize) {
        self.cells[..=row].rotate_right(1);
        self.cells[0] = vec![Cell::Empty; self.width];
    }

    fn is_row_full(&self, row: usize) -> bool {
        self.cells[row].iter().all(|cell| !cell.is_empty())
    }

    /// Number of placed cells owned by each player
    pub fn blocks_per_player(&self) -> BTreeMap<PlayerId, usize> {
        let mut counts = BTreeMap::new();
        for owner in self.cells.iter().flatten().filter_map(Cell::owner) {
            *counts.entry(owner).or_insert(0) += 1;
        }
        counts
    }

    /// Remove every placed cell
    pub fn clear(&mut self) {
        for row in &mut self.cells {
            row.fill(Cell::Empty);
        }
    }

    /// Check if the grid is completely empty
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(Cell::is_empty)
    }
}

#[cfg(test)]
pub(crate) fn grid_from(map: &[&[i64]]) -> Grid {
    let rows: Vec<Vec<i64>> = map.iter().map(|row| row.to_vec()).collect();
    let width = rows.first().map_or(0, Vec::len);
    Grid::from_raw(width, rows.len(), &rows).expect("valid test grid")
}
