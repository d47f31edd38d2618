//! Characters and their identifiers.
//!
//! A [`CharacterId`] is a 64-bit handle that packs a *generation* counter in
//! the high 32 bits and a slot *index* in the low 32 bits. Removing a
//! character bumps the generation of its slot, so ids held by the host after a
//! delete are detected as stale instead of silently aliasing a newer
//! character.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::grid::{Offset, Position};
use crate::WorldError;

// ---------------------------------------------------------------------------
// CharacterId
// ---------------------------------------------------------------------------

/// A generational character identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(u64);

impl CharacterId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharacterId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// IdAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`CharacterId`]s with generational tracking.
///
/// Freed slots are reused in FIFO order. The whole state is serialized with
/// a project so loaded rosters keep issuing the same ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh id, recycling a freed slot when one is available.
    pub fn allocate(&mut self) -> CharacterId {
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on release.
            self.alive[index as usize] = true;
            CharacterId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            CharacterId::new(index, 0)
        }
    }

    /// Release `id`. Returns `false` if it was already released or stale.
    pub fn release(&mut self, id: CharacterId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    /// True if `id` names a live slot with a matching generation.
    pub fn is_alive(&self, id: CharacterId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Check a loaded allocator against the characters of a document:
    /// exactly `ids` are alive, and the free list names dead slots only,
    /// each at most once.
    pub fn check_live(&self, ids: &[CharacterId]) -> Result<(), WorldError> {
        let fail = |details: String| WorldError::InconsistentIds { details };
        if self.generations.len() != self.alive.len() {
            return Err(fail(format!(
                "{} generations vs {} alive flags",
                self.generations.len(),
                self.alive.len()
            )));
        }
        let mut free = HashSet::new();
        for &index in &self.free_indices {
            let slot = index as usize;
            if slot >= self.alive.len() || self.alive[slot] {
                return Err(fail(format!("free list names slot {index}, which is not a dead slot")));
            }
            if !free.insert(index) {
                return Err(fail(format!("free list names slot {index} twice")));
            }
        }
        if let Some(id) = ids.iter().find(|&&id| !self.is_alive(id)) {
            return Err(fail(format!("character {id} is not live")));
        }
        let live = self.alive_count();
        if live != ids.len() {
            return Err(fail(format!("{live} live slots for {} characters", ids.len())));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Facing of a character, updated by its last successful move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// The facing implied by a single-cell move, or `None` for diagonals and
    /// the null move.
    pub fn from_offset(offset: Offset) -> Option<Direction> {
        match (offset.dx, offset.dy) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// A character placed (or waiting to be placed) on the grid.
///
/// `size` and `pixels` are sprite data for the renderer and are carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Stable handle; stale after the character is removed.
    pub id: CharacterId,
    /// Template/type label, matched by `OtherOfType` cells and collision
    /// filters.
    pub kind: String,
    /// `None` while the character is not on the grid.
    pub position: Option<Position>,
    /// Sprite edge length in pixels.
    pub size: u32,
    /// Sprite rows of CSS color strings; empty for no sprite.
    pub pixels: Vec<Vec<String>>,
    /// Facing after the last cardinal move.
    pub direction: Direction,
    /// Where [`reset`](crate::roster::Roster::reset_positions) puts the
    /// character back.
    pub initial_position: Option<Position>,
    /// Solid characters block line of sight.
    pub is_solid: bool,
    /// Whether other characters may share this character's cell.
    pub allow_overlap: bool,
}

impl Character {
    pub fn is_placed(&self) -> bool {
        self.position.is_some()
    }
}

/// Everything needed to create a character; the roster assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterDraft {
    pub kind: String,
    pub size: u32,
    pub pixels: Vec<Vec<String>>,
    pub is_solid: bool,
    pub allow_overlap: bool,
}

impl CharacterDraft {
    /// A solid, non-overlapping character of the given kind with no sprite.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_overlap(mut self, allow_overlap: bool) -> Self {
        self.allow_overlap = allow_overlap;
        self
    }

    pub fn with_solid(mut self, is_solid: bool) -> Self {
        self.is_solid = is_solid;
        self
    }

    pub fn with_sprite(mut self, size: u32, pixels: Vec<Vec<String>>) -> Self {
        self.size = size;
        self.pixels = pixels;
        self
    }

    /// Check that the sprite is `size × size` (an empty sprite is allowed).
    pub(crate) fn sprite_is_square(&self) -> bool {
        self.pixels.is_empty()
            || (self.pixels.len() == self.size as usize
                && self.pixels.iter().all(|row| row.len() == self.size as usize))
    }

    pub(crate) fn into_character(self, id: CharacterId) -> Character {
        Character {
            id,
            kind: self.kind,
            position: None,
            size: self.size,
            pixels: self.pixels,
            direction: Direction::None,
            initial_position: None,
            is_solid: self.is_solid,
            allow_overlap: self.allow_overlap,
        }
    }
}

impl Default for CharacterDraft {
    fn default() -> Self {
        Self {
            kind: String::new(),
            size: 1,
            pixels: Vec::new(),
            is_solid: true,
            allow_overlap: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
