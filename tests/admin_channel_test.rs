//! Admin channel pump: request parsing, deferred replies through the
//! queue, and error envelopes for malformed calls.

mod test_utils;

use std::sync::mpsc;

use bevy::math::Vec2;
use test_utils::*;

use factoryverse::admin::{AdminChannel, AdminRequest};
use factoryverse::errors::Envelope;

fn push_request(app: &mut bevy::app::App, payload: &str) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    app.world()
        .resource::<AdminChannel>()
        .push(AdminRequest {
            payload: payload.to_string(),
            reply: tx,
        });
    rx
}

fn app_with_channel() -> bevy::app::App {
    let mut app = test_app();
    app.insert_resource(AdminChannel::default());
    app
}

#[test]
fn test_request_is_answered_with_envelope_on_drain() {
    let mut app = app_with_channel();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);

    let rx = push_request(
        &mut app,
        r#"{"action": "agent.walk", "params": {"agent_id": 1, "direction": "n"}}"#,
    );
    run_ticks(&mut app, 1);

    let response = rx.try_recv().expect("reply within the tick");
    let envelope: Envelope = serde_json::from_str(&response).unwrap();
    assert!(envelope.ok, "{}", envelope.message);
    assert_eq!(envelope.agent_id, Some(1));
}

#[test]
fn test_params_as_json_string_form() {
    let mut app = app_with_channel();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);

    let rx = push_request(
        &mut app,
        r#"{"action": "agent.walk", "params": "{\"agent_id\": 1, \"direction\": \"s\"}"}"#,
    );
    run_ticks(&mut app, 1);

    let envelope: Envelope =
        serde_json::from_str(&rx.try_recv().expect("reply")).unwrap();
    assert!(envelope.ok, "{}", envelope.message);
    assert_eq!(envelope.data["direction"], "s");
}

#[test]
fn test_malformed_request_gets_error_envelope() {
    let mut app = app_with_channel();

    let rx = push_request(&mut app, "this is not json");
    run_ticks(&mut app, 1);
    let envelope: Envelope =
        serde_json::from_str(&rx.try_recv().expect("reply")).unwrap();
    assert!(!envelope.ok);
    assert_eq!(envelope.code.as_deref(), Some("BAD_JSON"));

    let rx = push_request(&mut app, r#"{"params": {}}"#);
    run_ticks(&mut app, 1);
    let envelope: Envelope =
        serde_json::from_str(&rx.try_recv().expect("reply")).unwrap();
    assert!(!envelope.ok);
    assert_eq!(envelope.code.as_deref(), Some("MISSING_PARAM"));
}

#[test]
fn test_async_action_acks_with_action_id() {
    let mut app = app_with_channel();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);

    let rx = push_request(
        &mut app,
        r#"{"action": "agent.walk_to", "params": {"agent_id": 1, "goal": {"x": 5.0, "y": 0.0}}}"#,
    );
    run_ticks(&mut app, 1);

    let envelope: Envelope =
        serde_json::from_str(&rx.try_recv().expect("reply")).unwrap();
    assert!(envelope.ok);
    assert_eq!(envelope.queued, Some(true));
    let action_id = envelope.action_id.expect("async ack carries the action id");
    assert!(action_id.starts_with("walk_"));
    assert!(envelope.rcon_tick.is_some());
}
