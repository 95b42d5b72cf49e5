//! Craft tracker integration: completion detection, mid-craft cancel
//! accounting, concurrency rules.

mod test_utils;

use bevy::math::Vec2;
use test_utils::*;

use factoryverse::jobs::CraftTrackings;

#[test]
fn test_craft_three_gears_to_completion() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "iron-plate", 8);

    let envelope = invoke(
        &mut app,
        "agent.crafting.enqueue",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel", "count": 3}),
    );
    assert!(envelope.ok, "{}", envelope.message);
    assert_eq!(envelope.queued, Some(true));
    assert_eq!(envelope.data["count_queued"], 3);
    let action_id = envelope.action_id.clone().unwrap();

    run_ticks(&mut app, 600);

    let completion = completion_for(&app, &action_id).expect("completion datagram");
    assert!(completion.success);
    assert_eq!(completion.cancelled, Some(false));
    assert_eq!(completion.result["count_crafted"], 3);
    assert_eq!(item_count(&app, 1, "iron-gear-wheel"), 3);
    // 2 plates per gear.
    assert_eq!(item_count(&app, 1, "iron-plate"), 2);
    assert!(app.world().resource::<CraftTrackings>().get(1).is_none());
}

#[test]
fn test_cancel_mid_craft_reports_partial_accounting() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "iron-plate", 6);

    let envelope = invoke(
        &mut app,
        "agent.crafting.enqueue",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel", "count": 3}),
    );
    assert!(envelope.ok);
    let action_id = envelope.action_id.clone().unwrap();

    // Roughly one item's worth of ticks (craft_ticks = 30).
    run_ticks(&mut app, 35);

    let cancel = invoke(
        &mut app,
        "agent.crafting.cancel",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel"}),
    );
    assert!(cancel.ok, "{}", cancel.message);

    run_ticks(&mut app, 5);

    let completion = completion_for(&app, &action_id).expect("completion datagram");
    assert_eq!(completion.cancelled, Some(true));
    let count_crafted = completion.result["count_crafted"].as_u64().unwrap();
    let count_cancelled = completion.result["count_cancelled"].as_u64().unwrap();
    assert!(
        (0..=2).contains(&count_crafted),
        "crafted {} of 3 before cancel",
        count_crafted
    );
    assert_eq!(count_cancelled, 3 - count_crafted);
    // Only crafted products are reported, never cancelled ones.
    assert_eq!(
        completion.result["products"]["iron-gear-wheel"].as_u64().unwrap(),
        count_crafted
    );
    // Ingredients of cancelled items were refunded.
    assert_eq!(
        item_count(&app, 1, "iron-plate") as u64,
        6 - 2 * count_crafted
    );
}

#[test]
fn test_concurrent_craft_is_rejected() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "iron-plate", 10);

    let first = invoke(
        &mut app,
        "agent.crafting.enqueue",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel", "count": 2}),
    );
    assert!(first.ok);

    let second = invoke(
        &mut app,
        "agent.crafting.enqueue",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel", "count": 1}),
    );
    assert!(!second.ok);
    assert_eq!(second.category, Some(factoryverse::ErrorCategory::Logical));
    assert_eq!(second.code.as_deref(), Some("CRAFT_IN_PROGRESS"));
}

#[test]
fn test_insufficient_ingredients_is_resource_error() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);

    let envelope = invoke(
        &mut app,
        "agent.crafting.enqueue",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel", "count": 1}),
    );
    assert!(!envelope.ok);
    assert_eq!(envelope.category, Some(factoryverse::ErrorCategory::Resource));
}

#[test]
fn test_count_queued_is_capped_by_craftable() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "iron-plate", 4); // enough for 2 gears

    let envelope = invoke(
        &mut app,
        "agent.crafting.enqueue",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel", "count": 10}),
    );
    assert!(envelope.ok);
    assert_eq!(envelope.data["count_requested"], 10);
    assert_eq!(envelope.data["count_queued"], 2);
}

#[test]
fn test_cancel_without_tracking_is_logical_error() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);

    let envelope = invoke(
        &mut app,
        "agent.crafting.cancel",
        serde_json::json!({"agent_id": 1, "recipe": "iron-gear-wheel"}),
    );
    assert!(!envelope.ok);
    assert_eq!(envelope.category, Some(factoryverse::ErrorCategory::Logical));
}

#[test]
fn test_unknown_recipe_fails_validation() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);

    let envelope = invoke(
        &mut app,
        "agent.crafting.enqueue",
        serde_json::json!({"agent_id": 1, "recipe": "warp-drive", "count": 1}),
    );
    assert!(!envelope.ok);
    assert_eq!(
        envelope.category,
        Some(factoryverse::ErrorCategory::Validation)
    );
    assert_eq!(envelope.code.as_deref(), Some("UNKNOWN_RECIPE"));
}
