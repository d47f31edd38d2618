//! Property tests for the tick loop.
//!
//! Random scenes and random host-call sequences must be deterministic, reset
//! must be idempotent, and the speed must always land inside its bounds.

use proptest::prelude::*;
use rulegrid_engine::prelude::*;

const GRID: u32 = 6;

#[derive(Debug, Clone)]
struct Walker {
    x: i32,
    y: i32,
    overlap: bool,
    rules: Vec<(u8, i32, i32)>,
}

fn walker_strategy() -> impl Strategy<Value = Walker> {
    (
        0..GRID as i32,
        0..GRID as i32,
        any::<bool>(),
        prop::collection::vec((0u8..5, -1i32..=1, -1i32..=1), 0..4),
    )
        .prop_map(|(x, y, overlap, rules)| Walker {
            x,
            y,
            overlap,
            rules,
        })
}

fn trigger_for(kind: u8) -> Trigger {
    match kind {
        0 => Trigger::Always,
        1 => Trigger::key_press("a"),
        2 => Trigger::Timer,
        3 => Trigger::Proximity { range: 2 },
        _ => Trigger::Click,
    }
}

/// Build a scene; walkers whose cell is already taken stay unplaced.
fn build(walkers: &[Walker]) -> Simulation {
    let mut sim = Simulation::new(SimulationConfig {
        grid: Grid::new(GRID, GRID).unwrap(),
        speed_ms: 100,
        timer_interval_ms: 300,
    })
    .unwrap();
    for w in walkers {
        let id = sim
            .spawn(CharacterDraft::new("walker").with_overlap(w.overlap))
            .unwrap();
        let _ = sim.place(id, w.x, w.y);
        for &(kind, dx, dy) in &w.rules {
            sim.add_rule(
                id,
                RuleDraft::new(
                    trigger_for(kind),
                    &Template::surrounded_by_nothing(),
                    &Template::actor_at(Offset::new(dx, dy)),
                ),
            )
            .unwrap();
        }
    }
    sim
}

fn call_strategy() -> impl Strategy<Value = HostCall> {
    prop_oneof![
        4 => (0u64..400).prop_map(|dt| HostCall::Tick { now: dt }),
        1 => Just(HostCall::KeyDown { key: "a".into() }),
        1 => Just(HostCall::KeyUp { key: "A".into() }),
        1 => (0..GRID as i32, 0..GRID as i32).prop_map(|(x, y)| HostCall::Click { x, y }),
        1 => Just(HostCall::Reset),
        1 => (0u64..3000).prop_map(|ms| HostCall::SetSpeed { ms }),
    ]
}

/// Turn relative tick offsets into a monotonic host clock.
fn run(sim: &mut Simulation, calls: &[HostCall]) -> Vec<TickReport> {
    let mut now = 0;
    sim.start(now);
    let mut reports = Vec::new();
    for call in calls {
        let call = match call {
            HostCall::Tick { now: dt } => {
                now += dt;
                HostCall::Tick { now }
            }
            other => other.clone(),
        };
        if let Some(report) = call.apply(sim) {
            reports.push(report);
        }
    }
    reports
}

fn exclusive_occupants_per_cell(sim: &Simulation) -> usize {
    (0..GRID as i32)
        .flat_map(|y| (0..GRID as i32).map(move |x| (x, y)))
        .map(|(x, y)| {
            sim.occupants_at(x, y)
                .iter()
                .filter(|o| !o.allow_overlap)
                .count()
        })
        .max()
        .unwrap_or(0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn identical_inputs_give_identical_runs(
        walkers in prop::collection::vec(walker_strategy(), 1..8),
        calls in prop::collection::vec(call_strategy(), 0..40),
    ) {
        let mut a = build(&walkers);
        let mut b = build(&walkers);
        prop_assert_eq!(a.state_hash(), b.state_hash());

        let reports_a = run(&mut a, &calls);
        let reports_b = run(&mut b, &calls);
        prop_assert_eq!(reports_a, reports_b);
        prop_assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn moves_stay_on_grid_and_respect_exclusivity(
        walkers in prop::collection::vec(walker_strategy(), 1..8),
        calls in prop::collection::vec(call_strategy(), 0..40),
    ) {
        let mut sim = build(&walkers);
        for report in run(&mut sim, &calls) {
            for res in &report.resolutions {
                if let Some(to) = res.new_position() {
                    prop_assert!(sim.grid().contains(to));
                }
                prop_assert!(res.rule.is_some() || res.outcome == Outcome::Unmatched);
            }
        }
        for c in sim.characters() {
            if let Some(p) = c.position {
                prop_assert!(sim.grid().contains(p));
            }
        }
        prop_assert!(exclusive_occupants_per_cell(&sim) <= 1);
    }

    #[test]
    fn reset_is_idempotent(
        walkers in prop::collection::vec(walker_strategy(), 1..8),
        calls in prop::collection::vec(call_strategy(), 0..40),
    ) {
        let mut sim = build(&walkers);
        let initial: Vec<_> = sim.characters().map(|c| c.position).collect();
        run(&mut sim, &calls);

        sim.reset();
        let once = sim.state_hash();
        sim.reset();
        prop_assert_eq!(sim.state_hash(), once);

        let after: Vec<_> = sim.characters().map(|c| c.position).collect();
        prop_assert_eq!(after, initial);
        prop_assert!(sim.characters().all(|c| c.direction == Direction::None));
    }

    #[test]
    fn speed_always_within_bounds(ms in any::<u64>()) {
        let mut sim = Simulation::default();
        let applied = sim.set_speed(ms);
        prop_assert!((MIN_SPEED_MS..=MAX_SPEED_MS).contains(&applied));
        prop_assert_eq!(applied, sim.speed());
        prop_assert_eq!(applied, clamp_speed(ms));
        if (MIN_SPEED_MS..=MAX_SPEED_MS).contains(&ms) {
            prop_assert_eq!(applied, ms);
        }
    }
}
