//! Shape catalog and rotation variants
//!
//! Every shape owns 1, 2 or 4 rotation variants. A variant is four (dx, dy)
//! offsets from the anchor, dx growing rightward and dy growing downward.
//! The anchor itself does not have to be one of the occupied cells.

use crate::error::ProtocolError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single (dx, dy) offset from a piece's anchor
pub type Offset = (i32, i32);

/// Number of rotation states a rotation request steps through,
/// regardless of how many variants a shape really has
pub const ROTATION_STATES: u8 = 4;

/// The 7 shape types, in catalog order (the wire carries the index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    T,
    Line,
    L,
    J,
    S,
    Z,
    Square,
}

const T_VARIANTS: &[[Offset; 4]] = &[
    [(0, 0), (-1, 0), (1, 0), (0, 1)],
    [(0, 0), (-1, 0), (0, 1), (0, -1)],
    [(0, 0), (-1, 0), (1, 0), (0, -1)],
    [(0, 0), (1, 0), (0, 1), (0, -1)],
];

const LINE_VARIANTS: &[[Offset; 4]] = &[
    [(0, 0), (1, 0), (-1, 0), (-2, 0)],
    [(0, 0), (0, -1), (0, 1), (0, 2)],
];

const L_VARIANTS: &[[Offset; 4]] = &[
    [(0, 0), (-1, 0), (-1, 1), (1, 0)],
    [(-1, -1), (0, -1), (0, 0), (0, 1)],
    [(1, 0), (1, 1), (0, 1), (-1, 1)],
    [(0, -1), (0, 0), (0, 1), (1, 1)],
];

const J_VARIANTS: &[[Offset; 4]] = &[
    [(0, 0), (-1, 0), (1, 1), (1, 0)],
    [(-1, 1), (0, -1), (0, 0), (0, 1)],
    [(-1, 0), (1, 1), (0, 1), (-1, 1)],
    [(0, -1), (0, 0), (0, 1), (1, -1)],
];

const S_VARIANTS: &[[Offset; 4]] = &[
    [(0, 0), (1, 0), (0, 1), (-1, 1)],
    [(-1, -1), (-1, 0), (0, 0), (0, 1)],
];

const Z_VARIANTS: &[[Offset; 4]] = &[
    [(-1, 0), (0, 0), (0, 1), (1, 1)],
    [(0, 1), (0, 0), (1, 0), (1, -1)],
];

const SQUARE_VARIANTS: &[[Offset; 4]] = &[[(0, 0), (1, 0), (1, 1), (0, 1)]];

impl ShapeType {
    /// All shape types in catalog order
    pub fn all() -> [ShapeType; 7] {
        [
            ShapeType::T,
            ShapeType::Line,
            ShapeType::L,
            ShapeType::J,
            ShapeType::S,
            ShapeType::Z,
            ShapeType::Square,
        ]
    }

    /// Position of this shape in the catalog
    pub fn index(self) -> usize {
        match self {
            ShapeType::T => 0,
            ShapeType::Line => 1,
            ShapeType::L => 2,
            ShapeType::J => 3,
            ShapeType::S => 4,
            ShapeType::Z => 5,
            ShapeType::Square => 6,
        }
    }

    pub fn from_index(index: usize) -> Result<ShapeType, ProtocolError> {
        Self::all()
            .get(index)
            .copied()
            .ok_or(ProtocolError::UnknownShapeType(index))
    }

    /// Rotation variants, in rotation order
    pub fn variants(self) -> &'static [[Offset; 4]] {
        match self {
            ShapeType::T => T_VARIANTS,
            ShapeType::Line => LINE_VARIANTS,
            ShapeType::L => L_VARIANTS,
            ShapeType::J => J_VARIANTS,
            ShapeType::S => S_VARIANTS,
            ShapeType::Z => Z_VARIANTS,
            ShapeType::Square => SQUARE_VARIANTS,
        }
    }

    /// Offsets for a rotation counter, folded onto the available variants
    pub fn offsets(self, rotation: u8) -> [Offset; 4] {
        let variants = self.variants();
        variants[rotation as usize % variants.len()]
    }
}

/// Direction of a rotation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationDirection {
    Left,
    Right,
}

impl RotationDirection {
    /// Apply this direction to a rotation counter, wrapping over 4 states
    pub fn apply(self, rotation: u8) -> u8 {
        let step = match self {
            RotationDirection::Left => ROTATION_STATES - 1,
            RotationDirection::Right => 1,
        };
        (rotation % ROTATION_STATES + step) % ROTATION_STATES
    }
}

/// Uniform random shape picker used at spawn time
#[derive(Debug, Clone)]
pub struct ShapeFactory {
    rng: ChaCha8Rng,
}

impl Default for ShapeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeFactory {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Deterministic sequence, for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn next(&mut self) -> ShapeType {
        let all = ShapeType::all();
        all[self.rng.gen_range(0..all.len())]
    }
}
