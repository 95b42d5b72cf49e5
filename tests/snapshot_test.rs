//! Snapshot layer integration: row lifecycle, idempotence, categorization,
//! status cadence, inventory view and the sliced chunked export.

mod test_utils;

use bevy::math::Vec2;
use test_utils::*;

use factoryverse::sinks::SinkKind;
use factoryverse::snapshot::{
    remove_entity_from_action, update_entity_from_action, Category, SnapshotExporter,
    WorldSnapshot,
};
use factoryverse::types::Direction;
use factoryverse::world::chunks::ChunkCoord;
use factoryverse::world::spawn_placed;

#[test]
fn test_rows_appear_and_disappear_with_entities() {
    let mut app = test_app();
    let pos = Vec2::new(4.5, 4.5);
    spawn_placed(app.world_mut(), "stone-furnace", pos, Direction::North).unwrap();
    run_ticks(&mut app, 1); // placement event consumed by the snapshot

    assert!(app
        .world()
        .resource::<WorldSnapshot>()
        .row(pos, "stone-furnace", Category::Entities)
        .is_some());

    factoryverse::world::remove_placed(app.world_mut(), pos, "stone-furnace").unwrap();
    run_ticks(&mut app, 1);
    assert!(app
        .world()
        .resource::<WorldSnapshot>()
        .row(pos, "stone-furnace", Category::Entities)
        .is_none());
}

#[test]
fn test_update_is_idempotent_and_remove_is_idempotent() {
    let mut app = test_app();
    let pos = Vec2::new(2.5, 2.5);
    spawn_placed(app.world_mut(), "pipe", pos, Direction::North).unwrap();

    update_entity_from_action(app.world_mut(), pos, "pipe");
    let first = app
        .world()
        .resource::<WorldSnapshot>()
        .row(pos, "pipe", Category::Pipes)
        .cloned()
        .expect("pipe row");
    update_entity_from_action(app.world_mut(), pos, "pipe");
    let second = app
        .world()
        .resource::<WorldSnapshot>()
        .row(pos, "pipe", Category::Pipes)
        .cloned()
        .expect("pipe row after second update");
    assert_eq!(first, second, "double update with unchanged world must match");

    remove_entity_from_action(app.world_mut(), pos, "pipe");
    remove_entity_from_action(app.world_mut(), pos, "pipe");
    assert!(app
        .world()
        .resource::<WorldSnapshot>()
        .row(pos, "pipe", Category::Pipes)
        .is_none());
}

#[test]
fn test_categorization_routes_belts_poles_resources() {
    let mut app = test_app();
    spawn_placed(app.world_mut(), "transport-belt", Vec2::new(1.5, 0.5), Direction::East)
        .unwrap();
    spawn_placed(
        app.world_mut(),
        "small-electric-pole",
        Vec2::new(3.5, 0.5),
        Direction::North,
    )
    .unwrap();
    place_resource(&mut app, "iron-ore", Vec2::new(5.5, 0.5), 750);
    run_ticks(&mut app, 1);

    let snapshot = app.world().resource::<WorldSnapshot>();
    assert!(snapshot
        .row(Vec2::new(1.5, 0.5), "transport-belt", Category::Belts)
        .is_some());
    assert!(snapshot
        .row(Vec2::new(3.5, 0.5), "small-electric-pole", Category::Poles)
        .is_some());
    let ore = snapshot
        .row(Vec2::new(5.5, 0.5), "iron-ore", Category::Resources)
        .expect("resource row");
    assert_eq!(ore[2], "iron-ore");
    assert_eq!(ore[3], "750");
}

#[test]
fn test_status_rows_refresh_on_cadence() {
    let mut app = test_app();
    let pos = Vec2::new(1.5, 1.5);
    spawn_placed(app.world_mut(), "assembling-machine-1", pos, Direction::North).unwrap();
    invoke(
        &mut app,
        "chart.register_area",
        serde_json::json!({"min": {"x": 0, "y": 0}, "max": {"x": 31, "y": 31}}),
    );

    // The status view samples every 60 ticks.
    run_ticks(&mut app, 61);

    let snapshot = app.world().resource::<WorldSnapshot>();
    let rows = snapshot
        .rows(ChunkCoord::new(0, 0), Category::EntityStatus)
        .expect("status rows for the charted chunk");
    let row = rows
        .values()
        .find(|r| r[2] == "assembling-machine-1")
        .expect("status row for the machine");
    // No recipe configured yet.
    assert_eq!(row[4], "no_recipe");
}

#[test]
fn test_inventory_view_returns_non_empty_kinds() {
    let mut app = test_app();
    spawn_agent_at(&mut app, 1, Vec2::ZERO);
    give_items(&mut app, 1, "coal", 10);
    let pos = Vec2::new(1.5, 1.5);
    spawn_placed(app.world_mut(), "wooden-chest", pos, Direction::North).unwrap();

    let envelope = invoke(
        &mut app,
        "entity.inventory.set_item",
        serde_json::json!({
            "agent_id": 1,
            "entity_name": "wooden-chest",
            "position": {"x": 1.5, "y": 1.5},
            "items": [{"name": "coal", "count": 4}],
        }),
    );
    assert!(envelope.ok, "{}", envelope.message);

    let view = factoryverse::snapshot::inventory_view(app.world(), pos, "wooden-chest")
        .expect("inventory view");
    assert_eq!(view["chest"]["coal"], 4);
    assert_eq!(item_count(&app, 1, "coal"), 6);
}

#[test]
fn test_sliced_export_writes_csv_and_metadata() {
    let dir = std::env::temp_dir().join(format!("fv-export-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut app = test_app();
    app.world_mut()
        .resource_mut::<SnapshotExporter>()
        .set_sink(SinkKind::File {
            base_dir: dir.clone(),
        });

    spawn_placed(
        app.world_mut(),
        "stone-furnace",
        Vec2::new(2.5, 2.5),
        Direction::North,
    )
    .unwrap();
    place_resource(&mut app, "coal", Vec2::new(40.5, 2.5), 300); // second chunk
    run_ticks(&mut app, 1);
    invoke(
        &mut app,
        "chart.register_area",
        serde_json::json!({"min": {"x": 0, "y": 0}, "max": {"x": 63, "y": 31}}),
    );

    let envelope = invoke(&mut app, "snapshot.export", serde_json::json!({}));
    assert!(envelope.ok, "{}", envelope.message);
    let action_id = envelope.action_id.clone().unwrap();

    // 2 charted chunks at the default slice width finish quickly.
    run_ticks(&mut app, 5);
    assert!(!app.world().resource::<SnapshotExporter>().busy());

    let completion = completion_for(&app, &action_id).expect("export completion");
    assert!(completion.success);

    // One CSV per non-empty category per chunk, under chunks/<cx>/<cy>/.
    let furnace_csvs: Vec<_> = std::fs::read_dir(dir.join("chunks/0/0"))
        .expect("chunk 0/0 directory")
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(
        furnace_csvs.iter().any(|f| f.starts_with("entities-")),
        "expected an entities CSV, got {:?}",
        furnace_csvs
    );
    let resource_csvs: Vec<_> = std::fs::read_dir(dir.join("chunks/1/0"))
        .expect("chunk 1/0 directory")
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(resource_csvs.iter().any(|f| f.starts_with("resources-")));

    // Metadata declares the headers downstream relies on.
    let meta_dir = dir.join("metadata");
    let tick_dir = std::fs::read_dir(&meta_dir).unwrap().next().unwrap().unwrap();
    let entities_meta: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(tick_dir.path().join("entities.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(entities_meta["headers"][0], "position_x");
    assert!(entities_meta["files"].as_array().unwrap().len() >= 1);

    let _ = std::fs::remove_dir_all(dir);
}
