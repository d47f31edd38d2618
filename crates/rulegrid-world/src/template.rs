//! 3×3 neighborhood templates used by rule `before`/`after` patterns.
//!
//! Cells are tagged placeholders rather than references to live characters:
//! [`Cell::Actor`] marks the character that owns the rule, [`Cell::OtherOfType`]
//! marks "some character of this kind", and [`Cell::Empty`] marks nothing.
//!
//! Two notions of equality are used on purpose:
//!
//! - `before` templates are compared by *occupancy*: a non-empty cell only
//!   requires that something stands there.
//! - `after` templates are scanned for the *identity* marker [`Cell::Actor`] to
//!   find the actor's destination.

use serde::{Deserialize, Serialize};

use crate::grid::Offset;
use crate::WorldError;

/// One cell of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Empty,
    /// The character that owns the rule.
    Actor,
    /// Any character whose `kind` is the given label.
    OtherOfType(String),
}

impl Cell {
    /// True for every cell that stands for a character.
    #[inline]
    pub fn is_occupied(&self) -> bool {
        !matches!(self, Cell::Empty)
    }
}

/// A 3×3 template indexed `[row][col]`, where `[1][1]` is the actor's cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Template {
    cells: [[Cell; 3]; 3],
}

impl Template {
    /// Every cell empty, including the center.
    pub fn blank() -> Self {
        Self::default()
    }

    /// The canonical `before` shape: the actor at the center, nothing around.
    pub fn surrounded_by_nothing() -> Self {
        Self::blank().with(Offset::ZERO, Cell::Actor)
    }

    /// An `after` template that puts the actor at `offset` from its old cell.
    pub fn actor_at(offset: Offset) -> Self {
        Self::blank().with(offset, Cell::Actor)
    }

    /// Build from authoring-time rows, rejecting anything that is not 3×3.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Self, WorldError> {
        let malformed = WorldError::MalformedTemplate {
            rows: rows.len(),
            cols: rows.iter().map(Vec::len).max().unwrap_or(0),
        };
        let rows: [Vec<Cell>; 3] = rows.try_into().map_err(|_| malformed.clone())?;
        let mut cells: [[Cell; 3]; 3] = Default::default();
        for (target, row) in cells.iter_mut().zip(rows) {
            *target = row.try_into().map_err(|_| malformed.clone())?;
        }
        Ok(Self { cells })
    }

    /// Rows in authoring form.
    pub fn to_rows(&self) -> Vec<Vec<Cell>> {
        self.cells.iter().map(|row| row.to_vec()).collect()
    }

    /// The cell at `offset` from the center. Offsets are `-1..=1`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` leaves the 3×3 window.
    pub fn get(&self, offset: Offset) -> &Cell {
        let (row, col) = Self::slot(offset);
        &self.cells[row][col]
    }

    pub fn set(&mut self, offset: Offset, cell: Cell) {
        let (row, col) = Self::slot(offset);
        self.cells[row][col] = cell;
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, offset: Offset, cell: Cell) -> Self {
        self.set(offset, cell);
        self
    }

    pub fn center(&self) -> &Cell {
        &self.cells[1][1]
    }

    /// Number of [`Cell::Actor`] markers.
    pub fn actor_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| matches!(c, Cell::Actor))
            .count()
    }

    /// The offset of the single actor marker, `Ok(None)` when there is none.
    pub fn actor_offset(&self) -> Result<Option<Offset>, WorldError> {
        let mut found = None;
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                if *cell == Cell::Actor {
                    if found.is_some() {
                        return Err(WorldError::MultipleActorCells {
                            count: self.actor_count(),
                        });
                    }
                    found = Some(Offset::new(col as i32 - 1, row as i32 - 1));
                }
            }
        }
        Ok(found)
    }

    fn slot(offset: Offset) -> (usize, usize) {
        assert!(
            (-1..=1).contains(&offset.dx) && (-1..=1).contains(&offset.dy),
            "template offset {offset:?} outside the 3x3 window"
        );
        ((offset.dy + 1) as usize, (offset.dx + 1) as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
