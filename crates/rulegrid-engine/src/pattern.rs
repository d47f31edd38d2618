//! Structural matching of `before` templates against the live grid.
//!
//! A template matches when, for each of the eight neighbors of the actor's
//! cell, "something stands there" agrees with "the template cell is not
//! empty". Off-grid neighbors read as empty, so a template expecting a
//! character beyond the edge never matches. The center is the actor by
//! construction and is not inspected.

use rulegrid_world::grid::{Offset, Position};
use rulegrid_world::spatial::SpatialIndex;
use rulegrid_world::template::Template;

/// Whether `before` matches the neighborhood of `center`.
pub fn matches(index: &SpatialIndex, center: Position, before: &Template) -> bool {
    first_mismatch(index, center, before).is_none()
}

/// The first neighbor offset (row-major) at which `before` disagrees with the
/// grid, or `None` when it matches.
pub fn first_mismatch(index: &SpatialIndex, center: Position, before: &Template) -> Option<Offset> {
    let grid = index.grid();
    Offset::NEIGHBORS.into_iter().find(|&offset| {
        let cell = center.offset(offset);
        let expected = before.get(offset).is_occupied();
        let actual = grid.contains(cell) && index.is_occupied(cell);
        expected != actual
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
