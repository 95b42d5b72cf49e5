//! Action queue integration: backpressure, drain order, fairness,
//! immediate mode, keyed drains and persistence.

mod test_utils;

use bevy::math::Vec2;
use test_utils::*;

use factoryverse::actions::{enqueue_or_invoke, process_key, ActionQueue};
use factoryverse::ErrorCategory;

#[test]
fn test_backpressure_at_bound_of_two() {
    let mut app = test_app();
    {
        let mut queue = app.world_mut().resource_mut::<ActionQueue>();
        queue.set_max_queue_size(2);
        queue.set_immediate_mode(false);
    }

    let first = enqueue_or_invoke(
        app.world_mut(),
        "system.noop",
        serde_json::json!({}),
        None,
        0,
        None,
    );
    let second = enqueue_or_invoke(
        app.world_mut(),
        "system.noop",
        serde_json::json!({}),
        None,
        0,
        None,
    );
    let third = enqueue_or_invoke(
        app.world_mut(),
        "system.noop",
        serde_json::json!({}),
        None,
        0,
        None,
    );

    assert!(first.is_none() && second.is_none(), "deferred enqueues ack later");
    let rejection = third.expect("third enqueue must be rejected synchronously");
    assert!(!rejection.ok);
    assert_eq!(rejection.category, Some(ErrorCategory::Capacity));

    // Cap the drain to one per tick: the two accepted intents clear over
    // the next two ticks.
    app.world_mut()
        .resource_mut::<factoryverse::RuntimeConfig>()
        .max_actions_per_tick = 1;
    run_ticks(&mut app, 1);
    assert_eq!(app.world().resource::<ActionQueue>().len(), 1);
    run_ticks(&mut app, 1);
    assert_eq!(app.world().resource::<ActionQueue>().len(), 0);
    assert_eq!(app.world().resource::<ActionQueue>().stats.processed, 2);
}

#[test]
fn test_equal_priority_preserves_fifo_completion_order() {
    let mut app = test_app();
    for i in 0..5 {
        app.world_mut()
            .resource_mut::<ActionQueue>()
            .enqueue(
                "system.noop",
                serde_json::json!({"payload": i}),
                None,
                3,
                1,
                None,
            )
            .unwrap();
    }
    run_ticks(&mut app, 1);

    let payloads: Vec<i64> = app
        .world()
        .resource::<ActionQueue>()
        .recent_results()
        .map(|(_, env)| env.data["payload"].as_i64().unwrap())
        .collect();
    assert_eq!(payloads, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_lower_priority_value_drains_first() {
    let mut app = test_app();
    {
        let mut queue = app.world_mut().resource_mut::<ActionQueue>();
        queue
            .enqueue("system.noop", serde_json::json!({"payload": "late"}), None, 5, 1, None)
            .unwrap();
        queue
            .enqueue("system.noop", serde_json::json!({"payload": "early"}), None, -5, 1, None)
            .unwrap();
    }
    run_ticks(&mut app, 1);

    let payloads: Vec<String> = app
        .world()
        .resource::<ActionQueue>()
        .recent_results()
        .map(|(_, env)| env.data["payload"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(payloads, vec!["early", "late"]);
}

#[test]
fn test_immediate_mode_short_circuits() {
    let mut app = test_app();
    app.world_mut()
        .resource_mut::<ActionQueue>()
        .set_immediate_mode(true);

    let envelope = enqueue_or_invoke(
        app.world_mut(),
        "system.noop",
        serde_json::json!({}),
        None,
        0,
        None,
    )
    .expect("immediate mode returns the envelope synchronously");
    assert!(envelope.ok);
    assert_eq!(app.world().resource::<ActionQueue>().len(), 0);
}

#[test]
fn test_process_key_drains_only_that_group() {
    let mut app = test_app();
    {
        let mut queue = app.world_mut().resource_mut::<ActionQueue>();
        queue
            .enqueue("system.noop", serde_json::json!({}), Some("a".into()), 0, 1, None)
            .unwrap();
        queue
            .enqueue("system.noop", serde_json::json!({}), None, 0, 1, None)
            .unwrap();
        queue
            .enqueue("system.noop", serde_json::json!({}), Some("a".into()), 0, 1, None)
            .unwrap();
    }
    let processed = process_key(app.world_mut(), "a");
    assert_eq!(processed, 2);
    assert_eq!(app.world().resource::<ActionQueue>().len(), 1);
}

#[test]
fn test_queue_state_survives_save_restore() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    app.world_mut()
        .resource_mut::<ActionQueue>()
        .enqueue(
            "agent.walk",
            serde_json::json!({"agent_id": 1, "direction": "e", "ticks": 5}),
            None,
            0,
            1,
            None,
        )
        .unwrap();

    let state = factoryverse::persist::capture_state(app.world());
    assert_eq!(state.queue.items.len(), 1);

    // A fresh app standing in for the reloaded host.
    let mut reloaded = test_app();
    spawn_agent_at(&mut reloaded, 1, Vec2::ZERO);
    factoryverse::persist::restore_state(reloaded.world_mut(), state);
    assert_eq!(reloaded.world().resource::<ActionQueue>().len(), 1);

    run_ticks(&mut reloaded, 3);
    assert_eq!(reloaded.world().resource::<ActionQueue>().len(), 0);
    // The restored intent actually ran: the agent walked east.
    assert!(agent_pos(&reloaded, 1).x > 0.0);
}

#[test]
fn test_rejected_unknown_action_never_completes() {
    let mut app = test_app();
    let envelope = invoke(&mut app, "no.such.action", serde_json::json!({}));
    assert!(!envelope.ok);
    assert_eq!(envelope.code.as_deref(), Some("UNKNOWN_ACTION"));

    run_ticks(&mut app, 5);
    assert!(
        completions(&app).is_empty(),
        "a synchronous rejection must not also produce a datagram"
    );
}
