//! Rule resolution: pick and apply at most one rule per character per tick.
//!
//! Rules are tried in priority order. The first rule whose trigger fires
//! *and* whose `before` pattern matches is the matching rule, and no later
//! rule is considered, even when the matching rule ends up not moving the
//! character (no actor marker in `after`, or a blocked destination).
//!
//! Blocked moves are an expected outcome, not an error: they are reported as
//! [`Outcome::Blocked`] and traced at debug level.

use rulegrid_world::character::{Character, CharacterId, Direction};
use rulegrid_world::grid::{Offset, Position};
use rulegrid_world::rule::{Rule, RuleId};
use rulegrid_world::spatial::SpatialIndex;
use rulegrid_world::template::Cell;
use serde::{Deserialize, Serialize};

use crate::pattern;
use crate::trigger::TriggerEvaluator;

/// Why a matched move was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    /// The destination is off the grid.
    OutOfBounds,
    /// The destination holds a character that does not allow overlap.
    Occupied,
}

/// What happened to one character in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// No rule matched; the character is untouched.
    Unmatched,
    /// A rule matched but does not move the character.
    Stayed,
    /// The move was committed.
    Moved {
        /// Cell before the move.
        from: Position,
        /// Cell after the move.
        to: Position,
        /// Facing after the move; unchanged for diagonal steps.
        direction: Direction,
    },
    /// A rule matched but its destination was rejected.
    Blocked {
        /// The rejected destination.
        target: Position,
        reason: BlockReason,
    },
}

/// The resolver's verdict for one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub character: CharacterId,
    /// The matching rule, if any.
    pub rule: Option<RuleId>,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn moved(&self) -> bool {
        matches!(self.outcome, Outcome::Moved { .. })
    }

    /// Destination of an applied move.
    pub fn new_position(&self) -> Option<Position> {
        match self.outcome {
            Outcome::Moved { to, .. } => Some(to),
            _ => None,
        }
    }

    /// Facing after an applied move.
    pub fn new_direction(&self) -> Option<Direction> {
        match self.outcome {
            Outcome::Moved { direction, .. } => Some(direction),
            _ => None,
        }
    }
}

/// Resolve `actor` against its ordered `rules`.
///
/// Must run inside an evaluation pass of `triggers`, with `index` reflecting
/// the current positions.
///
/// # Panics
///
/// Panics on a corrupted rule: a `before` whose center is not the actor, or
/// an `after` marking the actor more than once. The roster refuses such
/// rules, so this indicates a bug rather than bad input.
pub fn resolve(
    actor: &Character,
    rules: &[Rule],
    triggers: &mut TriggerEvaluator,
    index: &SpatialIndex,
) -> Resolution {
    let unmatched = Resolution {
        character: actor.id,
        rule: None,
        outcome: Outcome::Unmatched,
    };
    let Some(from) = actor.position else {
        return unmatched;
    };

    for rule in rules {
        assert!(
            *rule.before.center() == Cell::Actor,
            "corrupted {} on character {}: before-template center is not the actor",
            rule.id,
            actor.id
        );
        if !triggers.evaluate(&rule.trigger, actor, index) {
            continue;
        }
        if !pattern::matches(index, from, &rule.before) {
            continue;
        }

        let offset = match rule.after.actor_offset() {
            Ok(offset) => offset,
            Err(e) => panic!("corrupted {} on character {}: {e}", rule.id, actor.id),
        };
        let outcome = match offset {
            None | Some(Offset::ZERO) => Outcome::Stayed,
            Some(offset) => apply_offset(actor, from, offset, index),
        };
        if let Outcome::Blocked { target, reason } = outcome {
            tracing::debug!(
                character = %actor.id,
                rule = %rule.id,
                %from,
                %target,
                ?reason,
                "move blocked"
            );
        }
        return Resolution {
            character: actor.id,
            rule: Some(rule.id),
            outcome,
        };
    }

    unmatched
}

fn apply_offset(actor: &Character, from: Position, offset: Offset, index: &SpatialIndex) -> Outcome {
    let target = from.offset(offset);
    if index.is_valid_move(actor, target.x, target.y) {
        Outcome::Moved {
            from,
            to: target,
            direction: Direction::from_offset(offset).unwrap_or(actor.direction),
        }
    } else {
        let reason = if index.is_in_bounds(target.x, target.y) {
            BlockReason::Occupied
        } else {
            BlockReason::OutOfBounds
        };
        Outcome::Blocked { target, reason }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
