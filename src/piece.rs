//! Falling piece logic

use crate::player::PlayerId;
use crate::tetromino::{Offset, ROTATION_STATES, ShapeType};

/// A piece controlled by one player, not yet placed on the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallingPiece {
    /// The type of shape
    pub shape_type: ShapeType,
    /// Owner of the piece (and of the cells it leaves behind)
    pub player_id: PlayerId,
    /// Anchor position, row 0 is the top of the grid
    pub col: i32,
    pub row: i32,
    /// Rotation counter, always in 0..4
    pub rotation: u8,
}

impl FallingPiece {
    pub fn new(shape_type: ShapeType, player_id: PlayerId, col: i32, row: i32, rotation: u8) -> Self {
        Self {
            shape_type,
            player_id,
            col,
            row,
            rotation: rotation % ROTATION_STATES,
        }
    }

    /// Offsets for a hypothetical rotation
    pub fn coordinates_at(&self, rotation: u8) -> [Offset; 4] {
        self.shape_type.offsets(rotation)
    }

    /// Absolute (row, col) cells for a hypothetical anchor and rotation.
    /// None if an anchor this far out overflows.
    pub fn cells_at(&self, row: i32, col: i32, rotation: u8) -> Option<[(i32, i32); 4]> {
        let mut cells = [(0, 0); 4];
        for (cell, (dx, dy)) in cells.iter_mut().zip(self.coordinates_at(rotation)) {
            *cell = (row.checked_add(dy)?, col.checked_add(dx)?);
        }
        Some(cells)
    }

    /// Absolute (row, col) cells at the current position
    pub fn cells(&self) -> Option<[(i32, i32); 4]> {
        self.cells_at(self.row, self.col, self.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_is_normalized() {
        let piece = FallingPiece::new(ShapeType::T, 1, 5, 3, 6);
        assert_eq!(piece.rotation, 2);
    }

    #[test]
    fn test_cells_follow_anchor() {
        let piece = FallingPiece::new(ShapeType::T, 1, 2, 3, 0);
        assert_eq!(piece.cells(), Some([(3, 2), (3, 1), (3, 3), (4, 2)]));
    }

    #[test]
    fn test_cells_at_uses_requested_rotation() {
        let piece = FallingPiece::new(ShapeType::Line, 1, 2, 2, 0);
        assert_eq!(piece.cells_at(2, 2, 1), Some([(2, 2), (1, 2), (3, 2), (4, 2)]));
        // The stored rotation is untouched
        assert_eq!(piece.rotation, 0);
    }

    #[test]
    fn test_square_ignores_rotation() {
        let piece = FallingPiece::new(ShapeType::Square, 1, 0, 0, 0);
        assert_eq!(piece.coordinates_at(3), piece.coordinates_at(0));
    }

    #[test]
    fn test_cells_at_extreme_anchor_is_none() {
        // T offsets reach one column either side of the anchor
        let piece = FallingPiece::new(ShapeType::T, 1, 5, 3, 0);
        assert_eq!(piece.cells_at(3, i32::MAX, 0), None);
        assert_eq!(piece.cells_at(3, i32::MIN, 0), None);
        assert_eq!(piece.cells_at(i32::MAX, 5, 0), None);
    }
}
