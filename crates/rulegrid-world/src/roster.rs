//! The character and rule store.
//!
//! The [`Roster`] exclusively owns every character and every rule of one
//! simulation. Characters keep their insertion order, which is also the order
//! the engine processes them in each tick. Rules live in one ordered list per
//! character; index 0 has the highest priority.

use std::collections::HashMap;

use crate::character::{Character, CharacterDraft, CharacterId, Direction, IdAllocator};
use crate::grid::{Grid, Position};
use crate::rule::{Rule, RuleDraft, RuleId};
use crate::WorldError;

/// Arena of characters and their rule lists.
#[derive(Debug, Clone)]
pub struct Roster {
    /// Bounds every placement is checked against.
    grid: Grid,
    /// Issues and recycles character ids.
    allocator: IdAllocator,
    /// Live ids in processing order.
    order: Vec<CharacterId>,
    /// Character data keyed by id.
    characters: HashMap<CharacterId, Character>,
    /// Per-character rule lists, highest priority first.
    rules: HashMap<CharacterId, Vec<Rule>>,
    /// Id handed to the next authored rule. Never reused.
    next_rule_id: u64,
}

impl Roster {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            allocator: IdAllocator::new(),
            order: Vec::new(),
            characters: HashMap::new(),
            rules: HashMap::new(),
            next_rule_id: 1,
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Change the grid size.
    ///
    /// Rejected if any placed character would end up outside the new bounds.
    pub fn set_grid(&mut self, grid: Grid) -> Result<(), WorldError> {
        grid.validate()?;
        if let Some(stranded) = self
            .characters()
            .find(|c| c.position.is_some_and(|p| !grid.contains(p)))
        {
            return Err(WorldError::StrandedCharacter {
                id: stranded.id,
                width: grid.width,
                height: grid.height,
            });
        }
        self.grid = grid;
        Ok(())
    }

    // -- characters ---------------------------------------------------------

    /// Create an unplaced character at the end of the processing order.
    pub fn spawn(&mut self, draft: CharacterDraft) -> Result<CharacterId, WorldError> {
        if !draft.sprite_is_square() {
            return Err(WorldError::SpriteShape { size: draft.size });
        }
        let id = self.allocator.allocate();
        self.characters.insert(id, draft.into_character(id));
        self.order.push(id);
        Ok(id)
    }

    /// Put a character on the grid and record the cell as its reset point.
    ///
    /// Fails without mutating anything if the cell is off-grid, holds another
    /// character that does not allow overlap, or is the reset point of such a
    /// character. The last rule keeps reset points of exclusive characters
    /// distinct, so [`reset_positions`](Self::reset_positions) never stacks
    /// two of them.
    pub fn place(&mut self, id: CharacterId, x: i32, y: i32) -> Result<(), WorldError> {
        self.require(id)?;
        let pos = Position::new(x, y);
        if !self.grid.contains(pos) {
            return Err(WorldError::OutOfBounds {
                x,
                y,
                width: self.grid.width,
                height: self.grid.height,
            });
        }
        if let Some(blocker) = self
            .characters()
            .find(|c| c.id != id && c.position == Some(pos) && !c.allow_overlap)
        {
            return Err(WorldError::CellOccupied {
                x,
                y,
                occupant: blocker.id,
            });
        }
        if let Some(owner) = self
            .characters()
            .find(|c| c.id != id && c.initial_position == Some(pos) && !c.allow_overlap)
        {
            return Err(WorldError::ReservedCell {
                x,
                y,
                owner: owner.id,
            });
        }
        let character = self.get_mut(id)?;
        character.position = Some(pos);
        character.initial_position = Some(pos);
        Ok(())
    }

    /// Take a character off the grid without deleting it.
    pub fn unplace(&mut self, id: CharacterId) -> Result<(), WorldError> {
        let character = self.get_mut(id)?;
        character.position = None;
        character.initial_position = None;
        character.direction = Direction::None;
        Ok(())
    }

    /// Delete a character together with all of its rules.
    pub fn remove(&mut self, id: CharacterId) -> Result<Character, WorldError> {
        self.require(id)?;
        self.allocator.release(id);
        self.order.retain(|&other| other != id);
        self.rules.remove(&id);
        self.characters
            .remove(&id)
            .ok_or(WorldError::UnknownCharacter { id })
    }

    /// Apply a resolved move. The caller is responsible for having checked
    /// bounds and occupancy.
    pub fn relocate(
        &mut self,
        id: CharacterId,
        to: Position,
        direction: Direction,
    ) -> Result<(), WorldError> {
        let character = self.get_mut(id)?;
        character.position = Some(to);
        character.direction = direction;
        Ok(())
    }

    /// Move every character with a reset point back to it, facing nowhere.
    /// Returns how many characters were restored.
    pub fn reset_positions(&mut self) -> usize {
        let mut restored = 0;
        for character in self.characters.values_mut() {
            if let Some(initial) = character.initial_position {
                character.position = Some(initial);
                character.direction = Direction::None;
                restored += 1;
            }
        }
        restored
    }

    /// Move the character at processing slot `from` to slot `to`.
    pub fn reorder_characters(&mut self, from: usize, to: usize) -> Result<(), WorldError> {
        move_within(&mut self.order, from, to)
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.allocator.is_alive(id)
    }

    /// Characters in processing order.
    pub fn characters(&self) -> impl Iterator<Item = &Character> + '_ {
        self.order.iter().filter_map(|id| self.characters.get(id))
    }

    /// Ids in processing order.
    pub fn ids(&self) -> &[CharacterId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // -- rules --------------------------------------------------------------

    /// Validate `draft` and append it to the owner's rule list (lowest
    /// priority).
    pub fn add_rule(&mut self, owner: CharacterId, draft: RuleDraft) -> Result<RuleId, WorldError> {
        self.require(owner)?;
        let id = RuleId(self.next_rule_id);
        let next = self
            .next_rule_id
            .checked_add(1)
            .ok_or(WorldError::RuleIdsExhausted)?;
        let rule = draft.into_rule(id)?;
        self.next_rule_id = next;
        self.rules.entry(owner).or_default().push(rule);
        Ok(id)
    }

    pub fn remove_rule(&mut self, owner: CharacterId, rule: RuleId) -> Result<Rule, WorldError> {
        self.require(owner)?;
        let list = self.rules.entry(owner).or_default();
        let index = list
            .iter()
            .position(|r| r.id == rule)
            .ok_or(WorldError::UnknownRule { owner, rule })?;
        Ok(list.remove(index))
    }

    /// Move the rule at priority `from` to priority `to`.
    pub fn reorder_rules(
        &mut self,
        owner: CharacterId,
        from: usize,
        to: usize,
    ) -> Result<(), WorldError> {
        self.require(owner)?;
        move_within(self.rules.entry(owner).or_default(), from, to)
    }

    /// The owner's rules, highest priority first. Empty for unknown ids.
    pub fn rules(&self, owner: CharacterId) -> &[Rule] {
        self.rules.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub(crate) fn next_rule_id(&self) -> u64 {
        self.next_rule_id
    }

    pub(crate) fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    /// Reassemble a roster from already-validated parts. Used by the
    /// document loader.
    pub(crate) fn from_parts(
        grid: Grid,
        allocator: IdAllocator,
        characters: Vec<Character>,
        rules: HashMap<CharacterId, Vec<Rule>>,
        next_rule_id: u64,
    ) -> Self {
        let order: Vec<CharacterId> = characters.iter().map(|c| c.id).collect();
        Self {
            grid,
            allocator,
            order,
            characters: characters.into_iter().map(|c| (c.id, c)).collect(),
            rules,
            next_rule_id,
        }
    }

    // -- helpers ------------------------------------------------------------

    fn require(&self, id: CharacterId) -> Result<(), WorldError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(WorldError::UnknownCharacter { id })
        }
    }

    fn get_mut(&mut self, id: CharacterId) -> Result<&mut Character, WorldError> {
        self.characters
            .get_mut(&id)
            .ok_or(WorldError::UnknownCharacter { id })
    }
}

/// Splice-style move: remove at `from`, insert at `to`.
fn move_within<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), WorldError> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(WorldError::IndexOutOfRange { index, len });
        }
    }
    let item = items.remove(from);
    items.insert(to, item);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Offset;
    use crate::rule::Trigger;
    use crate::template::Template;

    fn roster() -> Roster {
        Roster::new(Grid::new(8, 8).unwrap())
    }

    fn step_right() -> RuleDraft {
        RuleDraft::new(
            Trigger::Always,
            &Template::surrounded_by_nothing(),
            &Template::actor_at(Offset::new(1, 0)),
        )
    }

    #[test]
    fn spawned_characters_start_unplaced() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        let c = r.character(id).unwrap();
        assert!(!c.is_placed());
        assert_eq!(c.direction, Direction::None);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn place_records_reset_point() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        r.place(id, 3, 4).unwrap();
        let c = r.character(id).unwrap();
        assert_eq!(c.position, Some(Position::new(3, 4)));
        assert_eq!(c.initial_position, Some(Position::new(3, 4)));
    }

    #[test]
    fn place_out_of_bounds_rejected_without_mutation() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        let err = r.place(id, 8, 0).unwrap_err();
        assert_eq!(
            err,
            WorldError::OutOfBounds {
                x: 8,
                y: 0,
                width: 8,
                height: 8
            }
        );
        assert!(!r.character(id).unwrap().is_placed());
    }

    #[test]
    fn place_onto_exclusive_occupant_rejected() {
        let mut r = roster();
        let wall = r.spawn(CharacterDraft::new("wall")).unwrap();
        let coin = r.spawn(CharacterDraft::new("coin").with_overlap(true)).unwrap();
        let hero = r.spawn(CharacterDraft::new("hero")).unwrap();
        r.place(wall, 1, 1).unwrap();
        r.place(coin, 2, 2).unwrap();

        assert_eq!(
            r.place(hero, 1, 1).unwrap_err(),
            WorldError::CellOccupied {
                x: 1,
                y: 1,
                occupant: wall
            }
        );
        r.place(hero, 2, 2).unwrap();
        // Re-placing onto its own cell is fine.
        r.place(hero, 2, 2).unwrap();
    }

    #[test]
    fn remove_drops_rules_and_invalidates_id() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        r.add_rule(id, step_right()).unwrap();
        assert_eq!(r.rule_count(), 1);

        r.remove(id).unwrap();
        assert_eq!(r.rule_count(), 0);
        assert!(r.is_empty());
        assert_eq!(
            r.place(id, 0, 0).unwrap_err(),
            WorldError::UnknownCharacter { id }
        );

        let again = r.spawn(CharacterDraft::new("hero")).unwrap();
        assert_ne!(again, id);
        assert!(r.rules(again).is_empty());
    }

    #[test]
    fn rules_keep_priority_order() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        let a = r.add_rule(id, step_right()).unwrap();
        let b = r.add_rule(id, step_right()).unwrap();
        let c = r.add_rule(id, step_right()).unwrap();
        let ids = |r: &Roster| r.rules(id).iter().map(|rule| rule.id).collect::<Vec<_>>();
        assert_eq!(ids(&r), vec![a, b, c]);

        r.reorder_rules(id, 2, 0).unwrap();
        assert_eq!(ids(&r), vec![c, a, b]);

        r.remove_rule(id, a).unwrap();
        assert_eq!(ids(&r), vec![c, b]);

        assert_eq!(
            r.remove_rule(id, a).unwrap_err(),
            WorldError::UnknownRule { owner: id, rule: a }
        );
        assert_eq!(
            r.reorder_rules(id, 0, 5).unwrap_err(),
            WorldError::IndexOutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn invalid_rule_not_added() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        let bad = RuleDraft::new(
            Trigger::Proximity { range: 0 },
            &Template::surrounded_by_nothing(),
            &Template::blank(),
        );
        assert!(r.add_rule(id, bad).is_err());
        assert!(r.rules(id).is_empty());
        // The failed draft did not burn an id.
        assert_eq!(r.add_rule(id, step_right()).unwrap(), RuleId(1));
    }

    #[test]
    fn reset_restores_initial_positions() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        let floating = r.spawn(CharacterDraft::new("ghost")).unwrap();
        r.place(id, 1, 1).unwrap();
        r.relocate(id, Position::new(5, 5), Direction::Right).unwrap();

        assert_eq!(r.reset_positions(), 1);
        let c = r.character(id).unwrap();
        assert_eq!(c.position, Some(Position::new(1, 1)));
        assert_eq!(c.direction, Direction::None);
        assert!(!r.character(floating).unwrap().is_placed());
    }

    #[test]
    fn vacated_reset_point_stays_reserved() {
        let mut r = roster();
        let walker = r.spawn(CharacterDraft::new("walker")).unwrap();
        let late = r.spawn(CharacterDraft::new("late")).unwrap();
        let coin = r.spawn(CharacterDraft::new("coin").with_overlap(true)).unwrap();
        r.place(walker, 1, 1).unwrap();
        r.relocate(walker, Position::new(2, 1), Direction::Right).unwrap();

        assert_eq!(
            r.place(late, 1, 1).unwrap_err(),
            WorldError::ReservedCell {
                x: 1,
                y: 1,
                owner: walker
            }
        );
        assert!(!r.character(late).unwrap().is_placed());
        // Overlappable characters may share the reset point.
        r.place(coin, 1, 1).unwrap();

        r.place(late, 3, 1).unwrap();
        r.reset_positions();
        assert_eq!(r.character(walker).unwrap().position, Some(Position::new(1, 1)));
        assert_eq!(r.character(late).unwrap().position, Some(Position::new(3, 1)));
    }

    #[test]
    fn rule_ids_never_wrap() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        r.next_rule_id = u64::MAX;
        assert_eq!(r.add_rule(id, step_right()).unwrap_err(), WorldError::RuleIdsExhausted);
        assert!(r.rules(id).is_empty());
    }

    #[test]
    fn reorder_characters_changes_processing_order() {
        let mut r = roster();
        let a = r.spawn(CharacterDraft::new("a")).unwrap();
        let b = r.spawn(CharacterDraft::new("b")).unwrap();
        r.reorder_characters(1, 0).unwrap();
        assert_eq!(r.ids(), &[b, a]);
        let kinds: Vec<_> = r.characters().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["b", "a"]);
    }

    #[test]
    fn shrinking_grid_cannot_strand_characters() {
        let mut r = roster();
        let id = r.spawn(CharacterDraft::new("hero")).unwrap();
        r.place(id, 6, 6).unwrap();
        assert!(matches!(
            r.set_grid(Grid::new(4, 4).unwrap()),
            Err(WorldError::StrandedCharacter { .. })
        ));
        r.set_grid(Grid::new(7, 7).unwrap()).unwrap();
        assert_eq!(r.grid().width, 7);
    }

    #[test]
    fn lopsided_sprite_rejected() {
        let mut r = roster();
        let draft = CharacterDraft::new("hero").with_sprite(2, vec![vec!["#fff".into()]; 2]);
        assert_eq!(
            r.spawn(draft).unwrap_err(),
            WorldError::SpriteShape { size: 2 }
        );
        assert!(r.is_empty());
    }
}
