//! The [`Simulation`]: one grid, its characters and rules, and the clock that
//! drives them.
//!
//! Every tick resolves placed characters one at a time in roster order and
//! commits each move before the next character is considered (*sequential
//! commit*). A character processed later therefore sees the positions of
//! characters processed earlier in the same tick, and reordering characters
//! can change the outcome.
//!
//! The host owns time. It calls [`Simulation::tick`] with a monotonic
//! millisecond timestamp from its own scheduler; calls that arrive before the
//! configured speed has elapsed return `None` and change nothing.
//!
//! ```
//! use rulegrid_engine::prelude::*;
//!
//! let mut sim = Simulation::new(SimulationConfig {
//!     grid: Grid::new(8, 8).unwrap(),
//!     ..Default::default()
//! })
//! .unwrap();
//! let hero = sim.spawn(CharacterDraft::new("hero")).unwrap();
//! sim.place(hero, 3, 3).unwrap();
//! sim.add_rule(
//!     hero,
//!     RuleDraft::new(
//!         Trigger::Always,
//!         &Template::surrounded_by_nothing(),
//!         &Template::actor_at(Offset::new(1, 0)),
//!     ),
//! )
//! .unwrap();
//!
//! sim.start(0);
//! assert!(sim.tick(100).is_none(), "not due yet");
//! let report = sim.tick(sim.speed()).unwrap();
//! assert_eq!(report.tick, 1);
//! assert_eq!(sim.character(hero).unwrap().position, Some(Position::new(4, 3)));
//! ```

use rulegrid_world::character::{Character, CharacterDraft, CharacterId};
use rulegrid_world::config::SimulationConfig;
use rulegrid_world::document::ProjectDocument;
use rulegrid_world::grid::{Grid, Position};
use rulegrid_world::roster::Roster;
use rulegrid_world::rule::{Rule, RuleDraft, RuleId};
use rulegrid_world::spatial::{Occupant, SpatialIndex};
use rulegrid_world::WorldError;
use serde::{Deserialize, Serialize};

use crate::clock::SimulationClock;
use crate::resolve::{resolve, Outcome, Resolution};
use crate::trigger::TriggerEvaluator;

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// What one executed tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// 1-based tick number.
    pub tick: u64,
    /// Host timestamp the tick ran at.
    pub now: u64,
    /// One entry per placed character, in processing order.
    pub resolutions: Vec<Resolution>,
}

impl TickReport {
    /// Resolutions that moved their character.
    pub fn moves(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions.iter().filter(|r| r.moved())
    }

    pub fn resolution_for(&self, id: CharacterId) -> Option<&Resolution> {
        self.resolutions.iter().find(|r| r.character == id)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// A running (or stopped) rule simulation.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(crate) config: SimulationConfig,
    pub(crate) roster: Roster,
    pub(crate) index: SpatialIndex,
    pub(crate) triggers: TriggerEvaluator,
    pub(crate) clock: SimulationClock,
}

impl Simulation {
    /// An empty, stopped simulation.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidGrid`] for a zero-sized grid.
    pub fn new(config: SimulationConfig) -> Result<Self, WorldError> {
        config.grid.validate()?;
        let roster = Roster::new(config.grid);
        Ok(Self::from_parts(config, roster))
    }

    /// A stopped simulation built from a saved project.
    pub fn from_document(document: ProjectDocument) -> Result<Self, WorldError> {
        let (config, roster) = document.into_roster()?;
        Ok(Self::from_parts(config, roster))
    }

    fn from_parts(mut config: SimulationConfig, roster: Roster) -> Self {
        let clock = SimulationClock::new(config.speed_ms);
        config.speed_ms = clock.speed();
        Self {
            index: SpatialIndex::build(roster.grid(), &roster),
            triggers: TriggerEvaluator::new(config.timer_interval_ms),
            clock,
            roster,
            config,
        }
    }

    /// Replace everything with the contents of `document`. The simulation
    /// ends up stopped. On error nothing changes.
    pub fn load(&mut self, document: ProjectDocument) -> Result<(), WorldError> {
        let loaded = Self::from_document(document)?;
        *self = loaded;
        tracing::info!(
            characters = self.roster.len(),
            rules = self.roster.rule_count(),
            width = self.grid().width,
            height = self.grid().height,
            "project loaded"
        );
        Ok(())
    }

    /// The current project as a document.
    pub fn to_document(&self) -> ProjectDocument {
        ProjectDocument::capture(&self.config, &self.roster)
    }

    // -- authoring ----------------------------------------------------------

    /// Create an unplaced character.
    pub fn spawn(&mut self, draft: CharacterDraft) -> Result<CharacterId, WorldError> {
        self.roster.spawn(draft)
    }

    /// Put a character on the grid and make `(x, y)` its reset point.
    pub fn place(&mut self, id: CharacterId, x: i32, y: i32) -> Result<(), WorldError> {
        if let Err(e) = self.roster.place(id, x, y) {
            tracing::debug!(character = %id, x, y, error = %e, "placement rejected");
            return Err(e);
        }
        self.index.rebuild(&self.roster);
        Ok(())
    }

    /// Take a character off the grid without deleting it.
    pub fn unplace(&mut self, id: CharacterId) -> Result<(), WorldError> {
        self.roster.unplace(id)?;
        self.index.rebuild(&self.roster);
        Ok(())
    }

    /// Delete a character and its rules.
    pub fn remove(&mut self, id: CharacterId) -> Result<Character, WorldError> {
        let removed = self.roster.remove(id)?;
        self.index.rebuild(&self.roster);
        Ok(removed)
    }

    /// Move the character at processing slot `from` to slot `to`.
    pub fn reorder_characters(&mut self, from: usize, to: usize) -> Result<(), WorldError> {
        self.roster.reorder_characters(from, to)?;
        self.index.rebuild(&self.roster);
        Ok(())
    }

    /// Append a rule with the lowest priority.
    pub fn add_rule(&mut self, owner: CharacterId, draft: RuleDraft) -> Result<RuleId, WorldError> {
        self.roster.add_rule(owner, draft)
    }

    pub fn remove_rule(&mut self, owner: CharacterId, rule: RuleId) -> Result<Rule, WorldError> {
        self.roster.remove_rule(owner, rule)
    }

    pub fn reorder_rules(
        &mut self,
        owner: CharacterId,
        from: usize,
        to: usize,
    ) -> Result<(), WorldError> {
        self.roster.reorder_rules(owner, from, to)
    }

    /// Rules of `owner`, highest priority first.
    pub fn rules(&self, owner: CharacterId) -> &[Rule] {
        self.roster.rules(owner)
    }

    /// Resize the grid. Rejected if a placed character would fall outside.
    pub fn set_grid(&mut self, grid: Grid) -> Result<(), WorldError> {
        self.roster.set_grid(grid)?;
        self.config.grid = grid;
        self.index.set_grid(grid);
        self.index.rebuild(&self.roster);
        Ok(())
    }

    // -- lifecycle ----------------------------------------------------------

    /// Start running at host time `now`. The first tick is due one speed
    /// interval later. Starting a running simulation does nothing.
    pub fn start(&mut self, now: u64) {
        if self.clock.start(now) {
            self.triggers.restart_timer(now);
            tracing::info!(now, speed_ms = self.clock.speed(), "simulation started");
        }
    }

    /// Stop running and forget held keys and any pending click.
    pub fn stop(&mut self) {
        if self.clock.stop() {
            tracing::info!(ticks = self.clock.tick_count(), "simulation stopped");
        }
        self.triggers.input_mut().clear();
    }

    /// Execute one tick if one is due at `now`.
    ///
    /// Returns `None`, with no state change, when stopped or when less than
    /// the configured speed has elapsed since the previous tick.
    pub fn tick(&mut self, now: u64) -> Option<TickReport> {
        if !self.clock.is_due(now) {
            return None;
        }
        let tick = self.clock.advance(now);

        self.index.rebuild(&self.roster);
        self.triggers.begin_pass(now);

        let order = self.roster.ids().to_vec();
        let mut resolutions = Vec::with_capacity(order.len());
        for id in order {
            let Some(actor) = self.roster.character(id) else {
                continue;
            };
            if !actor.is_placed() {
                continue;
            }
            let resolution = resolve(actor, self.roster.rules(id), &mut self.triggers, &self.index);
            if let Outcome::Moved { to, direction, .. } = resolution.outcome {
                self.roster
                    .relocate(id, to, direction)
                    .expect("ids come from the roster's own order, so the mover is live");
                self.index.rebuild(&self.roster);
            }
            resolutions.push(resolution);
        }

        self.triggers.end_pass(now);

        tracing::trace!(
            tick,
            now,
            resolved = resolutions.len(),
            moved = resolutions.iter().filter(|r| r.moved()).count(),
            "tick executed"
        );
        Some(TickReport {
            tick,
            now,
            resolutions,
        })
    }

    /// Put every placed character back at its reset point, facing nowhere.
    ///
    /// Rules and the running state are untouched; held keys and any pending
    /// click are dropped and the shared timer restarts. Resetting twice is the
    /// same as resetting once.
    pub fn reset(&mut self) {
        let restored = self.roster.reset_positions();
        self.index.rebuild(&self.roster);
        self.triggers.input_mut().clear();
        self.triggers.restart_timer(self.clock.last_tick());
        tracing::info!(restored, "simulation reset");
    }

    /// Change the tick interval. Returns the clamped value actually used.
    pub fn set_speed(&mut self, ms: u64) -> u64 {
        let applied = self.clock.set_speed(ms);
        if applied != ms {
            tracing::debug!(requested = ms, applied, "speed clamped");
        }
        self.config.speed_ms = applied;
        applied
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn speed(&self) -> u64 {
        self.clock.speed()
    }

    /// Number of ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.clock.tick_count()
    }

    // -- input --------------------------------------------------------------

    pub fn on_key_down(&mut self, key: &str) {
        self.triggers.input_mut().key_down(key);
    }

    pub fn on_key_up(&mut self, key: &str) {
        self.triggers.input_mut().key_up(key);
    }

    /// Record a click on cell `(x, y)`. It is seen by the next executed tick
    /// only; a later click before that tick replaces it.
    pub fn on_click(&mut self, x: i32, y: i32) {
        self.triggers.input_mut().click(Position::new(x, y));
    }

    // -- reads --------------------------------------------------------------

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.roster.character(id)
    }

    /// All characters in processing order.
    pub fn characters(&self) -> impl Iterator<Item = &Character> + '_ {
        self.roster.characters()
    }

    pub fn occupants_at(&self, x: i32, y: i32) -> &[Occupant] {
        self.index.occupants_at(x, y)
    }

    pub fn grid(&self) -> Grid {
        self.roster.grid()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn triggers(&self) -> &TriggerEvaluator {
        &self.triggers
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }
}

impl Default for Simulation {
    fn default() -> Self {
        let config = SimulationConfig::default();
        let roster = Roster::new(config.grid);
        Self::from_parts(config, roster)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rulegrid_world::prelude::*;

    fn sim(width: u32, height: u32) -> Simulation {
        Simulation::new(SimulationConfig {
            grid: Grid::new(width, height).unwrap(),
            speed_ms: 100,
            timer_interval_ms: 1000,
        })
        .unwrap()
    }

    fn walker(sim: &mut Simulation, x: i32, y: i32, step: Offset) -> CharacterId {
        let id = sim.spawn(CharacterDraft::new("walker")).unwrap();
        sim.place(id, x, y).unwrap();
        sim.add_rule(
            id,
            RuleDraft::new(
                Trigger::Always,
                &Template::surrounded_by_nothing(),
                &Template::actor_at(step),
            ),
        )
        .unwrap();
        id
    }

    #[test]
    fn zero_grid_rejected() {
        let err = Simulation::new(SimulationConfig {
            grid: Grid {
                width: 0,
                height: 4,
            },
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, WorldError::InvalidGrid { .. }));
    }

    #[test]
    fn stopped_simulation_never_ticks() {
        let mut sim = sim(4, 4);
        let id = walker(&mut sim, 0, 0, Offset::new(1, 0));
        assert!(sim.tick(10_000).is_none());
        assert_eq!(sim.character(id).unwrap().position, Some(Position::new(0, 0)));
        assert_eq!(sim.tick_count(), 0);
    }

    #[test]
    fn placement_updates_the_index_immediately() {
        let mut sim = sim(4, 4);
        let id = sim.spawn(CharacterDraft::new("hero")).unwrap();
        sim.place(id, 2, 1).unwrap();
        assert_eq!(sim.occupants_at(2, 1)[0].id, id);
        sim.unplace(id).unwrap();
        assert!(sim.occupants_at(2, 1).is_empty());
    }

    #[test]
    fn place_rejects_occupied_and_out_of_bounds() {
        let mut sim = sim(4, 4);
        let a = sim.spawn(CharacterDraft::new("a")).unwrap();
        let b = sim.spawn(CharacterDraft::new("b")).unwrap();
        sim.place(a, 1, 1).unwrap();
        assert!(matches!(sim.place(b, 1, 1), Err(WorldError::CellOccupied { .. })));
        assert!(matches!(sim.place(b, 4, 0), Err(WorldError::OutOfBounds { .. })));
        assert!(sim.character(b).unwrap().position.is_none());
    }

    #[test]
    fn removed_character_leaves_the_grid() {
        let mut sim = sim(4, 4);
        let id = walker(&mut sim, 1, 1, Offset::new(1, 0));
        let removed = sim.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(sim.occupants_at(1, 1).is_empty());
        assert!(sim.rules(id).is_empty());
        assert!(matches!(
            sim.place(id, 0, 0),
            Err(WorldError::UnknownCharacter { .. })
        ));
    }

    #[test]
    fn stop_clears_transient_input() {
        let mut sim = sim(4, 4);
        sim.start(0);
        sim.on_key_down("Space");
        sim.on_click(1, 1);
        sim.stop();
        assert!(!sim.is_running());
        assert!(!sim.triggers().input().is_pressed("space"));
        assert!(sim.triggers().input().pending_click().is_none());
    }

    #[test]
    fn set_speed_updates_config() {
        let mut sim = sim(4, 4);
        assert_eq!(sim.set_speed(50), 100);
        assert_eq!(sim.set_speed(9999), 2000);
        assert_eq!(sim.config().speed_ms, 2000);
        assert_eq!(sim.to_document().config.speed_ms, 2000);
    }

    #[test]
    fn unplaced_characters_are_skipped() {
        let mut sim = sim(4, 4);
        let placed = walker(&mut sim, 0, 0, Offset::new(1, 0));
        let loose = sim.spawn(CharacterDraft::new("loose")).unwrap();
        sim.start(0);
        let report = sim.tick(100).unwrap();
        assert_eq!(report.resolutions.len(), 1);
        assert!(report.resolution_for(placed).unwrap().moved());
        assert!(report.resolution_for(loose).is_none());
    }

    #[test]
    fn shrinking_grid_cannot_strand_characters() {
        let mut sim = sim(8, 8);
        walker(&mut sim, 6, 6, Offset::new(1, 0));
        assert!(matches!(
            sim.set_grid(Grid::new(4, 4).unwrap()),
            Err(WorldError::StrandedCharacter { .. })
        ));
        sim.set_grid(Grid::new(10, 7).unwrap()).unwrap();
        assert_eq!(sim.grid(), Grid::new(10, 7).unwrap());
        assert_eq!(sim.index().grid(), sim.grid());
        assert_eq!(sim.occupants_at(6, 6).len(), 1);
    }

    #[test]
    fn load_replaces_everything_and_stops() {
        let mut source = sim(6, 6);
        let id = walker(&mut source, 2, 2, Offset::new(0, 1));
        let doc = source.to_document();

        let mut sim = Simulation::default();
        sim.start(0);
        sim.load(doc.clone()).unwrap();
        assert!(!sim.is_running());
        assert_eq!(sim.grid(), Grid::new(6, 6).unwrap());
        assert_eq!(sim.occupants_at(2, 2)[0].id, id);
        assert_eq!(sim.rules(id).len(), 1);
        assert_eq!(sim.to_document(), doc);
    }

    #[test]
    fn failed_load_leaves_simulation_untouched() {
        let mut sim = sim(4, 4);
        let id = walker(&mut sim, 1, 1, Offset::new(1, 0));
        let mut doc = sim.to_document();
        doc.characters[0].position = Some(Position::new(9, 9));
        assert!(sim.load(doc).is_err());
        assert_eq!(sim.character(id).unwrap().position, Some(Position::new(1, 1)));
    }
}
