//! Entity placement/pickup/configuration through the action surface.

mod test_utils;

use bevy::math::Vec2;
use test_utils::*;

use factoryverse::snapshot::{Category, WorldSnapshot};
use factoryverse::world::WorldIndex;
use factoryverse::ErrorCategory;

#[test]
fn test_place_consumes_item_and_registers_entity() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "stone-furnace", 2);

    let pos = Vec2::new(1.5, 1.5);
    let envelope = invoke(
        &mut app,
        "entity.place",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "stone-furnace",
            "position": {"x": 1.5, "y": 1.5},
        }),
    );
    assert!(envelope.ok, "{}", envelope.message);
    assert_eq!(item_count(&app, 1, "stone-furnace"), 1);
    assert!(app.world().resource::<WorldIndex>().get(pos, "stone-furnace").is_some());
    // Post-run refreshed the snapshot row synchronously.
    assert!(app
        .world()
        .resource::<WorldSnapshot>()
        .row(pos, "stone-furnace", Category::Entities)
        .is_some());
}

#[test]
fn test_place_on_occupied_tile_is_map_error_and_refunds() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "wooden-chest", 1);
    factoryverse::world::spawn_placed(
        app.world_mut(),
        "stone-furnace",
        Vec2::new(1.5, 1.5),
        factoryverse::types::Direction::North,
    )
    .unwrap();

    let envelope = invoke(
        &mut app,
        "entity.place",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "wooden-chest",
            "position": {"x": 1.5, "y": 1.5},
        }),
    );
    assert!(!envelope.ok);
    assert_eq!(envelope.category, Some(ErrorCategory::Map));
    assert_eq!(item_count(&app, 1, "wooden-chest"), 1, "item refunded");
}

#[test]
fn test_place_without_item_is_resource_error() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);

    let envelope = invoke(
        &mut app,
        "entity.place",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "stone-furnace",
            "position": {"x": 1.5, "y": 1.5},
        }),
    );
    assert!(!envelope.ok);
    assert_eq!(envelope.category, Some(ErrorCategory::Resource));
}

#[test]
fn test_pick_returns_entity_and_contents() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "coal", 5);
    let pos = Vec2::new(1.5, 0.5);
    factoryverse::world::spawn_placed(
        app.world_mut(),
        "wooden-chest",
        pos,
        factoryverse::types::Direction::North,
    )
    .unwrap();
    let set = invoke(
        &mut app,
        "entity.inventory.set_item",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "wooden-chest",
            "items": [{"name": "coal", "count": 5}],
        }),
    );
    assert!(set.ok);
    assert_eq!(item_count(&app, 1, "coal"), 0);

    let envelope = invoke(
        &mut app,
        "entity.pick",
        serde_json::json!({"agent_id": 1, "entity_name": "wooden-chest"}),
    );
    assert!(envelope.ok, "{}", envelope.message);
    // The chest item itself plus the coal inside it.
    assert_eq!(item_count(&app, 1, "wooden-chest"), 1);
    assert_eq!(item_count(&app, 1, "coal"), 5);
    assert!(app.world().resource::<WorldIndex>().get(pos, "wooden-chest").is_none());
}

#[test]
fn test_recipe_set_requires_a_crafter() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    factoryverse::world::spawn_placed(
        app.world_mut(),
        "assembling-machine-1",
        Vec2::new(2.5, 0.5),
        factoryverse::types::Direction::North,
    )
    .unwrap();
    factoryverse::world::spawn_placed(
        app.world_mut(),
        "wooden-chest",
        Vec2::new(0.5, 2.5),
        factoryverse::types::Direction::North,
    )
    .unwrap();

    let ok = invoke(
        &mut app,
        "entity.recipe.set",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "assembling-machine-1",
            "recipe": "iron-gear-wheel",
        }),
    );
    assert!(ok.ok, "{}", ok.message);

    let bad = invoke(
        &mut app,
        "entity.recipe.set",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "wooden-chest",
            "recipe": "iron-gear-wheel",
        }),
    );
    assert!(!bad.ok);
    assert_eq!(bad.category, Some(ErrorCategory::Logical));
    assert_eq!(bad.code.as_deref(), Some("NOT_A_CRAFTER"));
}

#[test]
fn test_out_of_reach_placement_is_map_error() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "wooden-chest", 1);

    let envelope = invoke(
        &mut app,
        "entity.place",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "wooden-chest",
            "position": {"x": 20.5, "y": 0.5},
        }),
    );
    assert!(!envelope.ok);
    assert_eq!(envelope.code.as_deref(), Some("OUT_OF_REACH"));
}
