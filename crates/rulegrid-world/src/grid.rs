//! Bounded grid geometry.
//!
//! A [`Grid`] is a fixed `width × height` integer coordinate space. Cells are
//! addressed by [`Position`]; relative neighborhoods use [`Offset`]. Nothing
//! here knows about characters or rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WorldError;

// ---------------------------------------------------------------------------
// Position / Offset
// ---------------------------------------------------------------------------

/// A cell coordinate. `x` grows rightwards, `y` grows downwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell reached by applying `offset` to this position.
    #[inline]
    pub fn offset(self, offset: Offset) -> Self {
        Self {
            x: self.x + offset.dx,
            y: self.y + offset.dy,
        }
    }

    /// Chebyshev (king-move) distance between two cells.
    pub fn chebyshev(self, other: Position) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// Squared Euclidean distance, kept in integers so comparisons are exact.
    pub fn distance_squared(self, other: Position) -> u64 {
        let dx = u64::from((self.x - other.x).unsigned_abs());
        let dy = u64::from((self.y - other.y).unsigned_abs());
        dx * dx + dy * dy
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A relative displacement inside a 3×3 neighborhood (`-1..=1` on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0, dy: 0 };

    #[inline]
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// The eight neighbor offsets in row-major order, center excluded.
    pub const NEIGHBORS: [Offset; 8] = [
        Offset::new(-1, -1),
        Offset::new(0, -1),
        Offset::new(1, -1),
        Offset::new(-1, 0),
        Offset::new(1, 0),
        Offset::new(-1, 1),
        Offset::new(0, 1),
        Offset::new(1, 1),
    ];
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// The bounded play field. Fixed for the duration of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
}

impl Grid {
    /// Create a grid, rejecting zero-sized or overly large dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, WorldError> {
        let grid = Self { width, height };
        grid.validate()?;
        Ok(grid)
    }

    /// Check the dimensions of a grid that arrived without going through
    /// [`Grid::new`] (e.g. a deserialized document).
    pub fn validate(&self) -> Result<(), WorldError> {
        let max = i32::MAX as u32;
        if self.width == 0 || self.height == 0 || self.width > max || self.height > max {
            return Err(WorldError::InvalidGrid {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// True iff `0 <= x < width` and `0 <= y < height`.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Coordinate form of [`contains`](Self::contains).
    #[inline]
    pub fn is_in_bounds(&self, x: i32, y: i32) -> bool {
        self.contains(Position::new(x, y))
    }

    /// Number of cells.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major cell index, `None` when off-grid.
    #[inline]
    pub fn cell_index(&self, pos: Position) -> Option<usize> {
        if self.contains(pos) {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }
}

impl Default for Grid {
    /// 16×16, the editor's default canvas.
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
