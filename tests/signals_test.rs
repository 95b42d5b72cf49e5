//! Signals framework integration: cadence sampling, envelope shape,
//! failure isolation.

mod test_utils;

use bevy::math::Vec2;
use test_utils::*;

use factoryverse::signals::{SignalRegistry, SignalSchema, SignalSubscriptions};
use factoryverse::sinks::SinkKind;

#[test]
fn test_subscription_samples_on_cadence_and_writes_jsonl() {
    let dir = std::env::temp_dir().join(format!("fv-signals-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::new(3.0, 4.0));
    app.world_mut()
        .resource_mut::<SignalSubscriptions>()
        .subscribe(
            "force:player",
            "agents.positions",
            10,
            0,
            SinkKind::File {
                base_dir: dir.clone(),
            },
            serde_json::json!({"rig": "test"}),
        );

    run_ticks(&mut app, 35);

    let content = std::fs::read_to_string(dir.join("signals/force_player.jsonl"))
        .expect("signal JSONL written");
    let lines: Vec<&str> = content.lines().collect();
    assert!(
        (3..=4).contains(&lines.len()),
        "every-10-ticks over 35 ticks, got {}",
        lines.len()
    );

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["type"], "signal");
    assert_eq!(first["schema"]["id"], "agents.positions");
    assert_eq!(first["namespace"], "force:player");
    assert_eq!(first["meta"]["rig"], "test");
    assert_eq!(first["data"][0]["agent_id"], 1);

    // seq increments per successful sample.
    let last: serde_json::Value = serde_json::from_str(lines[lines.len() - 1]).unwrap();
    assert_eq!(last["seq"].as_u64().unwrap(), (lines.len() - 1) as u64);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_failing_extractor_does_not_abort_the_tick() {
    let mut app = test_app();
    app.world_mut()
        .resource_mut::<SignalRegistry>()
        .register(SignalSchema::new("always.fails", 1, None, |_, _| {
            Err("extractor exploded".to_string())
        }));
    app.world_mut()
        .resource_mut::<SignalSubscriptions>()
        .subscribe(
            "telemetry",
            "always.fails",
            1,
            0,
            SinkKind::Noop,
            serde_json::json!({}),
        );

    // Ticks keep flowing; the failing subscription just never advances.
    run_ticks(&mut app, 10);
    assert!(app.world().resource::<factoryverse::SimulationTick>().get() >= 10);
}

#[test]
fn test_unknown_schema_subscription_is_tolerated() {
    let mut app = test_app();
    app.world_mut()
        .resource_mut::<SignalSubscriptions>()
        .subscribe(
            "telemetry",
            "no.such.schema",
            1,
            0,
            SinkKind::Noop,
            serde_json::json!({}),
        );
    run_ticks(&mut app, 5);
    assert!(app.world().resource::<factoryverse::SimulationTick>().get() >= 5);
}
