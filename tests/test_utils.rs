//! Shared fixture for integration tests: a headless app with the full
//! runtime and a disconnected completion transport, driven tick by tick
//! with `App::update`.
#![allow(dead_code)]

use bevy::math::Vec2;
use bevy::prelude::*;

use factoryverse::agents::{Agent, AgentInventory};
use factoryverse::config::RuntimeConfig;
use factoryverse::errors::Envelope;
use factoryverse::transport::{CompletionEnvelope, CompletionTransport};
use factoryverse::world::worldgen::place_deposit;
use factoryverse::world::PrototypeCatalog;
use factoryverse::FactoryVersePlugin;

/// Full runtime with no network, no autosave and no discovery charting.
/// The returned app has already run its startup tick.
pub fn test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(RuntimeConfig {
        autosave_every: 0,
        discovery_every: 0,
        save_path: std::env::temp_dir().join("factoryverse-test-no-save.ron"),
        ..Default::default()
    });
    app.insert_resource(CompletionTransport::disconnected());
    app.add_plugins(FactoryVersePlugin);
    app.update();
    app
}

pub fn run_ticks(app: &mut App, ticks: usize) {
    for _ in 0..ticks {
        app.update();
    }
}

/// Invoke an action immediately against the world, bypassing the queue.
pub fn invoke(app: &mut App, action: &str, params: serde_json::Value) -> Envelope {
    factoryverse::invoke_action(app.world_mut(), action, params)
}

pub fn spawn_agent_at(app: &mut App, agent_id: u32, pos: Vec2) {
    let envelope = invoke(
        app,
        "agent.spawn",
        serde_json::json!({"agent_id": agent_id, "position": {"x": pos.x, "y": pos.y}}),
    );
    assert!(envelope.ok, "agent.spawn failed: {}", envelope.message);
}

pub fn set_reach(app: &mut App, agent_id: u32, reach: f32) {
    let entity = factoryverse::agents::resolve_agent(app.world(), agent_id).unwrap();
    app.world_mut().get_mut::<Agent>(entity).unwrap().reach_distance = reach;
}

pub fn give_items(app: &mut App, agent_id: u32, item: &str, count: u32) {
    let entity = factoryverse::agents::resolve_agent(app.world(), agent_id).unwrap();
    let catalog = app.world().resource::<PrototypeCatalog>().clone();
    let mut inventory = app.world_mut().get_mut::<AgentInventory>(entity).unwrap();
    let accepted = inventory.0.insert(item, count, &catalog);
    assert_eq!(accepted, count, "fixture inventory overflow for {}", item);
}

pub fn item_count(app: &App, agent_id: u32, item: &str) -> u32 {
    let entity = factoryverse::agents::resolve_agent(app.world(), agent_id).unwrap();
    app.world()
        .get::<AgentInventory>(entity)
        .map(|inv| inv.0.count_of(item))
        .unwrap_or(0)
}

pub fn agent_pos(app: &App, agent_id: u32) -> Vec2 {
    let entity = factoryverse::agents::resolve_agent(app.world(), agent_id).unwrap();
    app.world()
        .get::<factoryverse::agents::AgentPosition>(entity)
        .unwrap()
        .pos
}

pub fn place_resource(app: &mut App, name: &str, pos: Vec2, amount: u32) {
    place_deposit(app.world_mut(), name, pos, amount);
}

/// Completion datagrams recorded by the disconnected transport.
pub fn completions(app: &App) -> Vec<CompletionEnvelope> {
    app.world()
        .resource::<CompletionTransport>()
        .recent
        .clone()
}

pub fn completion_for(app: &App, action_id: &str) -> Option<CompletionEnvelope> {
    completions(app)
        .into_iter()
        .find(|c| c.action_id == action_id)
}
