//! Headless demo: a keyboard-driven hero, a coin that gets kicked aside, a
//! patrolling guard, and a timer-driven drifter on a small grid, driven by a simulated host clock.
//!
//! Prints the grid after every executed tick, then verifies the run by
//! replaying its recording.
//!
//! Run with: `cargo run --example headless_walkers`
//! (`RUST_LOG=rulegrid_engine=debug` shows blocked moves.)

use rulegrid_engine::prelude::*;

fn walk(trigger: Trigger, before: Template, dx: i32, dy: i32) -> RuleDraft {
    RuleDraft::new(trigger, &before, &Template::actor_at(Offset::new(dx, dy)))
}

fn render(sim: &Simulation) -> String {
    let grid = sim.grid();
    let mut out = String::new();
    for y in 0..grid.height as i32 {
        for x in 0..grid.width as i32 {
            let glyph = match sim.occupants_at(x, y).first() {
                None => '.',
                Some(o) => o.kind.chars().next().unwrap_or('?'),
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut sim = Simulation::new(SimulationConfig {
        grid: Grid::new(10, 6)?,
        speed_ms: 200,
        timer_interval_ms: 600,
    })?;

    let hero = sim.spawn(CharacterDraft::new("hero"))?;
    sim.place(hero, 1, 1)?;
    let coin_ahead = Template::surrounded_by_nothing()
        .with(Offset::new(1, 0), Cell::OtherOfType("coin".into()));
    sim.add_rule(hero, walk(Trigger::key_press("d"), coin_ahead, 1, 0))?;
    sim.add_rule(
        hero,
        walk(Trigger::key_press("d"), Template::surrounded_by_nothing(), 1, 0),
    )?;
    sim.add_rule(
        hero,
        walk(Trigger::key_press("s"), Template::surrounded_by_nothing(), 0, 1),
    )?;

    let coin = sim.spawn(CharacterDraft::new("coin").with_overlap(true))?;
    sim.place(coin, 5, 1)?;
    sim.add_rule(
        coin,
        walk(
            Trigger::Collision {
                target: Some("hero".into()),
            },
            Template::surrounded_by_nothing(),
            0,
            1,
        ),
    )?;

    let guard = sim.spawn(CharacterDraft::new("guard"))?;
    sim.place(guard, 8, 4)?;
    sim.add_rule(
        guard,
        walk(Trigger::Always, Template::surrounded_by_nothing(), -1, 0),
    )?;

    let drifter = sim.spawn(CharacterDraft::new("xeno"))?;
    sim.place(drifter, 0, 5)?;
    sim.add_rule(
        drifter,
        walk(Trigger::Timer, Template::surrounded_by_nothing(), 1, 0),
    )?;

    let mut recorder = ReplayRecorder::new(sim.capture_snapshot(), 2);
    recorder.apply(&mut sim, HostCall::Start { now: 0 });
    recorder.apply(&mut sim, HostCall::KeyDown { key: "d".into() });

    for step in 1..=12u64 {
        let now = step * 100;
        if step == 9 {
            recorder.apply(&mut sim, HostCall::KeyUp { key: "d".into() });
            recorder.apply(&mut sim, HostCall::KeyDown { key: "s".into() });
        }
        if let Some(report) = recorder.apply(&mut sim, HostCall::Tick { now }) {
            println!("tick {} at {} ms, {} moved", report.tick, now, report.moves().count());
            for res in &report.resolutions {
                if let Outcome::Blocked { target, reason } = res.outcome {
                    println!("  {} blocked at {target}: {reason:?}", res.character);
                }
            }
            print!("{}", render(&sim));
        }
    }
    recorder.apply(&mut sim, HostCall::Stop);

    let log = recorder.finish();
    let final_hash = sim.state_hash();
    let mut verify = Simulation::default();
    let result = replay(&mut verify, &log)?;
    println!(
        "replayed {} calls ({} ticks): {}",
        result.calls_replayed,
        result.ticks_executed,
        if result.completed && verify.state_hash() == final_hash {
            "deterministic"
        } else {
            "DIVERGED"
        }
    );
    Ok(())
}
