//! Behavior rules attached to characters.
//!
//! A [`Rule`] pairs a [`Trigger`] with a `before` pattern the neighborhood
//! must show and an `after` template saying where the actor ends up. Rules are
//! created from a [`RuleDraft`]; validation happens once, when the roster
//! admits the draft.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::template::{Cell, Template};
use crate::WorldError;

/// Identifier of a rule, unique within a roster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// What has to happen for a rule to be considered at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Always,
    /// The key is currently held. Compared case-insensitively.
    KeyPress { key: String },
    /// Another character shares the actor's cell, optionally of a given kind.
    Collision {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    /// Another character within Chebyshev distance `range` (at least 1).
    Proximity { range: u32 },
    /// The shared simulation timer is due.
    Timer,
    /// The last click landed on the actor's cell.
    Click,
}

impl Trigger {
    pub fn key_press(key: impl Into<String>) -> Self {
        Trigger::KeyPress { key: key.into() }
    }

    fn validate(&self) -> Result<(), WorldError> {
        match self {
            Trigger::KeyPress { key } if key.trim().is_empty() => Err(WorldError::EmptyTriggerKey),
            Trigger::Proximity { range } if *range < 1 => {
                Err(WorldError::InvalidProximity { range: *range })
            }
            _ => Ok(()),
        }
    }
}

/// Authoring-time description of a rule, before it has an id.
///
/// Templates are kept as plain rows so that a malformed shape from the editor
/// surfaces as a validation error instead of a type error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub trigger: Trigger,
    pub before: Vec<Vec<Cell>>,
    pub after: Vec<Vec<Cell>>,
}

impl RuleDraft {
    pub fn new(trigger: Trigger, before: &Template, after: &Template) -> Self {
        Self {
            trigger,
            before: before.to_rows(),
            after: after.to_rows(),
        }
    }

    /// Validate and stamp with `id`.
    pub fn into_rule(self, id: RuleId) -> Result<Rule, WorldError> {
        let rule = Rule {
            id,
            trigger: self.trigger,
            before: Template::from_rows(self.before)?,
            after: Template::from_rows(self.after)?,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// A validated rule owned by one character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub trigger: Trigger,
    pub before: Template,
    pub after: Template,
}

impl Rule {
    /// Check the trigger payload and both templates.
    ///
    /// `before` must hold the actor at its center and nowhere else; `after`
    /// may hold the actor at most once.
    pub fn validate(&self) -> Result<(), WorldError> {
        self.trigger.validate()?;
        if *self.before.center() != Cell::Actor {
            return Err(WorldError::ActorNotAtCenter);
        }
        if self.before.actor_count() != 1 {
            return Err(WorldError::MultipleActorCells {
                count: self.before.actor_count(),
            });
        }
        self.after.actor_offset()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
