//! Position → occupants lookup over the bounded grid.
//!
//! The [`SpatialIndex`] is a cache rebuilt wholesale from the roster rather
//! than patched incrementally: whenever a character's position changes the
//! owner calls [`SpatialIndex::rebuild`] before running dependent queries.
//! Within a cell, occupants appear in roster order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::character::{Character, CharacterId};
use crate::grid::{Grid, Position};
use crate::roster::Roster;

/// What the index remembers about a character standing in a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: CharacterId,
    pub kind: String,
    pub is_solid: bool,
    pub allow_overlap: bool,
}

impl Occupant {
    fn of(character: &Character) -> Self {
        Self {
            id: character.id,
            kind: character.kind.clone(),
            is_solid: character.is_solid,
            allow_overlap: character.allow_overlap,
        }
    }
}

/// Occupancy cache for one grid.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    grid: Grid,
    cells: HashMap<Position, Vec<Occupant>>,
}

impl SpatialIndex {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            cells: HashMap::new(),
        }
    }

    /// Build an index already populated from `roster`.
    pub fn build(grid: Grid, roster: &Roster) -> Self {
        let mut index = Self::new(grid);
        index.rebuild(roster);
        index
    }

    /// Drop every entry and repopulate from the roster's placed characters.
    ///
    /// Characters outside the grid (possible only if the grid was changed
    /// underneath them) are left out.
    pub fn rebuild(&mut self, roster: &Roster) {
        self.cells.clear();
        for character in roster.characters() {
            let Some(pos) = character.position else {
                continue;
            };
            if !self.grid.contains(pos) {
                tracing::warn!(character = %character.id, %pos, "character outside grid skipped by index");
                continue;
            }
            self.cells.entry(pos).or_default().push(Occupant::of(character));
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Replace the grid; the index is emptied and must be rebuilt.
    pub fn set_grid(&mut self, grid: Grid) {
        self.grid = grid;
        self.cells.clear();
    }

    #[inline]
    pub fn is_in_bounds(&self, x: i32, y: i32) -> bool {
        self.grid.is_in_bounds(x, y)
    }

    /// Everything standing at `(x, y)`. Empty for vacant or off-grid cells.
    pub fn occupants_at(&self, x: i32, y: i32) -> &[Occupant] {
        self.cells
            .get(&Position::new(x, y))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True if at least one character stands at `pos`.
    #[inline]
    pub fn is_occupied(&self, pos: Position) -> bool {
        !self.occupants_at(pos.x, pos.y).is_empty()
    }

    /// Whether `character` may step onto `(x, y)`.
    ///
    /// Off-grid cells are never valid. A cell is blocked by any occupant other
    /// than the mover that does not allow overlap, regardless of its kind.
    pub fn is_valid_move(&self, character: &Character, x: i32, y: i32) -> bool {
        if !self.is_in_bounds(x, y) {
            return false;
        }
        self.occupants_at(x, y)
            .iter()
            .all(|o| o.id == character.id || o.allow_overlap)
    }

    /// All occupants within Chebyshev distance `range` of `(x, y)`, row by
    /// row. Range 0 is the cell itself.
    ///
    /// The window is clipped to the grid first. When it still covers more
    /// cells than are occupied, the occupied cells are filtered instead of
    /// scanning the window; the result order is the same either way.
    pub fn characters_in_range(&self, x: i32, y: i32, range: u32) -> Vec<&Occupant> {
        let range = i64::from(range);
        let (x, y) = (i64::from(x), i64::from(y));
        let x_lo = (x - range).max(0);
        let x_hi = (x + range).min(i64::from(self.grid.width) - 1);
        let y_lo = (y - range).max(0);
        let y_hi = (y + range).min(i64::from(self.grid.height) - 1);
        if x_lo > x_hi || y_lo > y_hi {
            return Vec::new();
        }

        let area = (x_hi - x_lo + 1) as u64 * (y_hi - y_lo + 1) as u64;
        if area > self.cells.len() as u64 {
            let mut hits: Vec<(&Position, &Vec<Occupant>)> = self
                .cells
                .iter()
                .filter(|(p, _)| {
                    (x_lo..=x_hi).contains(&i64::from(p.x)) && (y_lo..=y_hi).contains(&i64::from(p.y))
                })
                .collect();
            hits.sort_unstable_by_key(|(p, _)| (p.y, p.x));
            return hits.into_iter().flat_map(|(_, occupants)| occupants).collect();
        }

        // In-grid coordinates fit in i32.
        let mut found = Vec::new();
        for cy in y_lo..=y_hi {
            for cx in x_lo..=x_hi {
                found.extend(self.occupants_at(cx as i32, cy as i32));
            }
        }
        found
    }

    /// Whether `a` can see `b`.
    ///
    /// Fails when either character is unplaced, when the Euclidean distance
    /// exceeds `max_distance`, or when a solid character other than `a` and
    /// `b` stands on an intermediate cell of the Bresenham line between them.
    pub fn has_line_of_sight(&self, a: &Character, b: &Character, max_distance: u32) -> bool {
        let (Some(from), Some(to)) = (a.position, b.position) else {
            return false;
        };
        let max = u64::from(max_distance);
        if from.distance_squared(to) > max * max {
            return false;
        }
        bresenham(from, to)
            .into_iter()
            .filter(|&cell| cell != from && cell != to)
            .all(|cell| {
                self.occupants_at(cell.x, cell.y)
                    .iter()
                    .all(|o| !o.is_solid || o.id == a.id || o.id == b.id)
            })
    }
}

/// Cells visited by Bresenham's line from `from` to `to`, both included.
fn bresenham(from: Position, to: Position) -> Vec<Position> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (from.x, from.y);
    let mut cells = Vec::with_capacity((dx - dy) as usize + 1);
    loop {
        cells.push(Position::new(x, y));
        if x == to.x && y == to.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterDraft;

    fn setup(placements: &[(&str, i32, i32, bool)]) -> (Roster, Vec<CharacterId>, SpatialIndex) {
        let grid = Grid::new(8, 8).unwrap();
        let mut roster = Roster::new(grid);
        let mut ids = Vec::new();
        for &(kind, x, y, overlap) in placements {
            let id = roster.spawn(CharacterDraft::new(kind).with_overlap(overlap)).unwrap();
            roster.place(id, x, y).unwrap();
            ids.push(id);
        }
        let index = SpatialIndex::build(grid, &roster);
        (roster, ids, index)
    }

    #[test]
    fn occupants_of_vacant_and_offgrid_cells_are_empty() {
        let (_, ids, index) = setup(&[("hero", 2, 2, false)]);
        assert_eq!(index.occupants_at(2, 2).len(), 1);
        assert_eq!(index.occupants_at(2, 2)[0].id, ids[0]);
        assert!(index.occupants_at(3, 3).is_empty());
        assert!(index.occupants_at(-5, 100).is_empty());
    }

    #[test]
    fn valid_move_respects_bounds_and_overlap() {
        let (roster, ids, index) =
            setup(&[("hero", 0, 0, false), ("wall", 1, 0, false), ("coin", 0, 1, true)]);
        let hero = roster.character(ids[0]).unwrap();
        assert!(!index.is_valid_move(hero, -1, 0), "off-grid");
        assert!(!index.is_valid_move(hero, 1, 0), "blocked by wall");
        assert!(index.is_valid_move(hero, 0, 1), "coin allows overlap");
        assert!(index.is_valid_move(hero, 0, 0), "own cell");
        assert!(index.is_valid_move(hero, 1, 1), "vacant");
    }

    #[test]
    fn range_is_chebyshev_inclusive() {
        let (_, ids, index) = setup(&[
            ("a", 4, 4, false),
            ("b", 5, 5, false),
            ("c", 6, 4, false),
            ("d", 7, 7, false),
        ]);
        let near: Vec<_> = index.characters_in_range(4, 4, 1).iter().map(|o| o.id).collect();
        assert_eq!(near, vec![ids[0], ids[1]]);
        let wider: Vec<_> = index.characters_in_range(4, 4, 2).iter().map(|o| o.id).collect();
        assert_eq!(wider, vec![ids[0], ids[2], ids[1]]);
        assert_eq!(index.characters_in_range(4, 4, 0).len(), 1);
    }

    #[test]
    fn range_clips_at_grid_edges() {
        let (_, _, index) = setup(&[("a", 0, 0, false), ("b", 1, 1, false)]);
        assert_eq!(index.characters_in_range(0, 0, 1).len(), 2);
        assert_eq!(index.characters_in_range(0, 0, u32::MAX).len(), 2);
    }

    #[test]
    fn range_near_the_far_edge_of_a_wide_grid() {
        let grid = Grid::new(i32::MAX as u32, 1).unwrap();
        let mut roster = Roster::new(grid);
        let edge = roster.spawn(CharacterDraft::new("edge")).unwrap();
        let near = roster.spawn(CharacterDraft::new("near")).unwrap();
        roster.place(edge, i32::MAX - 1, 0).unwrap();
        roster.place(near, i32::MAX - 4, 0).unwrap();
        let index = SpatialIndex::build(grid, &roster);

        let ids = |range| -> Vec<CharacterId> {
            index
                .characters_in_range(i32::MAX - 1, 0, range)
                .iter()
                .map(|o| o.id)
                .collect()
        };
        assert_eq!(ids(5), vec![near, edge]);
        assert_eq!(ids(2), vec![edge]);
        assert_eq!(ids(u32::MAX), vec![near, edge]);
    }

    #[test]
    fn line_of_sight_blocked_by_solid_intermediate() {
        let (mut roster, ids, _) =
            setup(&[("eye", 0, 0, false), ("target", 4, 0, false), ("rock", 2, 0, false)]);
        let grid = roster.grid();
        let index = SpatialIndex::build(grid, &roster);
        let eye = roster.character(ids[0]).unwrap();
        let target = roster.character(ids[1]).unwrap();
        assert!(!index.has_line_of_sight(eye, target, 10));

        roster.remove(ids[2]).unwrap();
        let index = SpatialIndex::build(grid, &roster);
        let eye = roster.character(ids[0]).unwrap();
        let target = roster.character(ids[1]).unwrap();
        assert!(index.has_line_of_sight(eye, target, 10));
        assert!(!index.has_line_of_sight(eye, target, 3), "too far");
        assert!(index.has_line_of_sight(eye, target, 4), "distance is inclusive");
    }

    #[test]
    fn non_solid_intermediate_does_not_block() {
        let grid = Grid::new(8, 8).unwrap();
        let mut roster = Roster::new(grid);
        let eye = roster.spawn(CharacterDraft::new("eye")).unwrap();
        let ghost = roster.spawn(CharacterDraft::new("ghost").with_solid(false)).unwrap();
        let target = roster.spawn(CharacterDraft::new("target")).unwrap();
        roster.place(eye, 0, 0).unwrap();
        roster.place(ghost, 1, 1).unwrap();
        roster.place(target, 3, 3).unwrap();
        let index = SpatialIndex::build(grid, &roster);
        assert!(index.has_line_of_sight(
            roster.character(eye).unwrap(),
            roster.character(target).unwrap(),
            5
        ));
    }

    #[test]
    fn bresenham_covers_endpoints() {
        let cells = bresenham(Position::new(0, 0), Position::new(3, 1));
        assert_eq!(cells.first(), Some(&Position::new(0, 0)));
        assert_eq!(cells.last(), Some(&Position::new(3, 1)));
        assert_eq!(cells.len(), 4);
        assert_eq!(bresenham(Position::new(2, 2), Position::new(2, 2)).len(), 1);
    }
}
