/// Entity/resource snapshot layer: a materialized, per-chunk view of the
/// map consumed by downstream analytics and the agent's own queries.
///
/// Rows are keyed by `(position, entity_name)` and updated incrementally
/// from action post-run hooks and placement events; the invariant is that a
/// row exists iff a live entity of that name occupies that position.
pub mod categorize;
pub mod export;

pub use categorize::{categorize, Category};
pub use export::{start_export, ExportJob, SnapshotExporter};

use std::collections::BTreeMap;

use bevy::math::Vec2;
use bevy::prelude::*;

use crate::simulation::{every_n_ticks, should_tick, SimulationSet, SimulationTick};
use crate::types::{PosKey, tile_center};
use crate::world::chunks::{ChartedChunks, ChunkCoord};
use crate::world::entity_map::{
    BeltContents, CrafterConfig, EntityInventories, EntityPlacedEvent, EntityRemovedEvent,
    Health, InserterArms, Placed, ResourceDeposit, UndergroundLink, WorldIndex,
};
use crate::world::inventory::InventoryKind;
use crate::world::terrain::Terrain;

pub type RowKey = (PosKey, String);

/// Row sets for one chunk, one map per category.
#[derive(Debug, Default, Clone)]
pub struct ChunkRows {
    rows: BTreeMap<Category, BTreeMap<RowKey, Vec<String>>>,
}

impl ChunkRows {
    pub fn category(&self, category: Category) -> Option<&BTreeMap<RowKey, Vec<String>>> {
        self.rows.get(&category)
    }

    fn upsert(&mut self, category: Category, key: RowKey, row: Vec<String>) {
        self.rows.entry(category).or_default().insert(key, row);
    }

    fn remove_key(&mut self, key: &RowKey) {
        for rows in self.rows.values_mut() {
            rows.remove(key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(|r| r.is_empty())
    }
}

/// The materialized view, chunk by chunk.
#[derive(Resource, Debug, Default)]
pub struct WorldSnapshot {
    pub chunks: BTreeMap<ChunkCoord, ChunkRows>,
}

impl WorldSnapshot {
    pub fn rows(
        &self,
        chunk: ChunkCoord,
        category: Category,
    ) -> Option<&BTreeMap<RowKey, Vec<String>>> {
        self.chunks.get(&chunk).and_then(|c| c.category(category))
    }

    pub fn row(
        &self,
        position: Vec2,
        name: &str,
        category: Category,
    ) -> Option<&Vec<String>> {
        let key = (PosKey::from_vec2(position), name.to_string());
        self.rows(ChunkCoord::from_position(position), category)
            .and_then(|rows| rows.get(&key))
    }
}

// ============================================================================
// ROW CONSTRUCTION
// ============================================================================

fn fmt_pos(v: f32) -> String {
    // Trim trailing zeros the way the exporter always has.
    let s = format!("{:.3}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn unit_id(entity: Entity) -> String {
    entity.index().to_string()
}

/// Entity handle at `position` whose prototype kind satisfies `pred`.
fn neighbor_unit(
    world: &World,
    position: Vec2,
    pred: impl Fn(&str) -> bool,
) -> Option<Entity> {
    let index = world.resource::<WorldIndex>();
    index
        .rows_near(position, 0.4)
        .into_iter()
        .find(|(_, _, entity)| {
            world
                .get::<Placed>(*entity)
                .map(|p| pred(&p.kind))
                .unwrap_or(false)
        })
        .map(|(_, _, entity)| entity)
}

fn is_belt_kind(kind: &str) -> bool {
    matches!(categorize(kind), Category::Belts)
}

fn is_pipe_kind(kind: &str) -> bool {
    matches!(categorize(kind), Category::Pipes)
}

/// Build the component row for a live entity. Returns the category and the
/// cells in header order.
fn build_row(world: &World, entity: Entity) -> Option<(Category, Vec<String>)> {
    let placed = world.get::<Placed>(entity)?;
    let pos = placed.position;
    let category = categorize(&placed.kind);

    let row = match category {
        Category::Belts => {
            let lines = world
                .get::<BeltContents>(entity)
                .map(|b| serde_json::to_string(&b.lines).unwrap_or_default())
                .unwrap_or_else(|| "[]".to_string());
            let ahead = pos + placed.direction.unit();
            let behind = pos - placed.direction.unit();
            let output = neighbor_unit(world, ahead, is_belt_kind)
                .map(unit_id)
                .unwrap_or_default();
            let input = neighbor_unit(world, behind, is_belt_kind)
                .map(unit_id)
                .unwrap_or_default();
            let (underground_type, paired) = world
                .get::<UndergroundLink>(entity)
                .map(|link| {
                    let paired = link
                        .pair
                        .and_then(|key| {
                            world
                                .resource::<WorldIndex>()
                                .get(key.to_vec2(), &placed.name)
                        })
                        .map(unit_id)
                        .unwrap_or_default();
                    (link.io.clone(), paired)
                })
                .unwrap_or_default();
            vec![
                fmt_pos(pos.x),
                fmt_pos(pos.y),
                placed.name.clone(),
                placed.direction.name().to_string(),
                lines,
                format!("[{}]", input),
                format!("[{}]", output),
                underground_type,
                paired,
            ]
        }
        Category::Pipes => {
            // Fluid-box neighbours split by positional sign.
            let mut inputs = Vec::new();
            let mut outputs = Vec::new();
            for offset in [
                Vec2::new(1.0, 0.0),
                Vec2::new(-1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(0.0, -1.0),
            ] {
                if let Some(neighbor) = neighbor_unit(world, pos + offset, is_pipe_kind) {
                    if offset.x + offset.y < 0.0 {
                        inputs.push(unit_id(neighbor));
                    } else {
                        outputs.push(unit_id(neighbor));
                    }
                }
            }
            vec![
                fmt_pos(pos.x),
                fmt_pos(pos.y),
                placed.name.clone(),
                format!("[{}]", inputs.join(" ")),
                format!("[{}]", outputs.join(" ")),
            ]
        }
        Category::Poles => vec![
            fmt_pos(pos.x),
            fmt_pos(pos.y),
            placed.name.clone(),
            placed.direction.name().to_string(),
        ],
        Category::Resources => {
            let amount = world
                .get::<ResourceDeposit>(entity)
                .map(|d| d.amount)
                .unwrap_or(0);
            vec![
                fmt_pos(pos.x),
                fmt_pos(pos.y),
                placed.name.clone(),
                amount.to_string(),
            ]
        }
        Category::Trees => vec![fmt_pos(pos.x), fmt_pos(pos.y), placed.name.clone()],
        _ => {
            let recipe = world
                .get::<CrafterConfig>(entity)
                .and_then(|c| c.recipe.clone())
                .unwrap_or_default();
            let arms = world.get::<InserterArms>(entity);
            let (pickup_x, pickup_y, drop_x, drop_y, pickup_unit, drop_unit) = match arms {
                Some(arms) => (
                    fmt_pos(arms.pickup.x),
                    fmt_pos(arms.pickup.y),
                    fmt_pos(arms.drop.x),
                    fmt_pos(arms.drop.y),
                    neighbor_unit(world, arms.pickup, |_| true)
                        .map(unit_id)
                        .unwrap_or_default(),
                    neighbor_unit(world, arms.drop, |_| true)
                        .map(unit_id)
                        .unwrap_or_default(),
                ),
                None => Default::default(),
            };
            vec![
                fmt_pos(pos.x),
                fmt_pos(pos.y),
                placed.name.clone(),
                placed.kind.clone(),
                placed.direction.name().to_string(),
                recipe,
                pickup_x,
                pickup_y,
                drop_x,
                drop_y,
                pickup_unit,
                drop_unit,
                fmt_pos(pos.x - 0.5),
                fmt_pos(pos.y - 0.5),
                fmt_pos(pos.x + 0.5),
                fmt_pos(pos.y + 0.5),
                unit_id(entity),
            ]
        }
    };
    Some((category, row))
}

fn inventory_rows(world: &World, entity: Entity, placed: &Placed) -> Vec<Vec<String>> {
    let Some(inventories) = world.get::<EntityInventories>(entity) else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for kind in InventoryKind::ALL {
        if let Some(inventory) = inventories.get(kind) {
            if !inventory.is_empty() {
                rows.push(vec![
                    fmt_pos(placed.position.x),
                    fmt_pos(placed.position.y),
                    placed.name.clone(),
                    kind.name().to_string(),
                    serde_json::to_string(inventory.contents()).unwrap_or_default(),
                ]);
            }
        }
    }
    rows
}

// ============================================================================
// INCREMENTAL UPDATES (post-run hooks)
// ============================================================================

/// Refresh the snapshot row for `(position, name)` from live world state.
/// Re-applying with unchanged state produces identical rows; a vanished
/// entity degrades into a removal, keeping the row/live invariant.
pub fn update_entity_from_action(world: &mut World, position: Vec2, name: &str) {
    let Some(entity) = world.resource::<WorldIndex>().get(position, name) else {
        remove_entity_from_action(world, position, name);
        return;
    };
    if world.get_entity(entity).is_err() {
        remove_entity_from_action(world, position, name);
        return;
    }
    let Some((category, row)) = build_row(world, entity) else {
        remove_entity_from_action(world, position, name);
        return;
    };
    let placed = world.get::<Placed>(entity).cloned();
    let inv_rows = placed
        .as_ref()
        .map(|p| inventory_rows(world, entity, p))
        .unwrap_or_default();

    let chunk = ChunkCoord::from_position(position);
    let key: RowKey = (PosKey::from_vec2(position), name.to_string());
    let mut snapshot = world.resource_mut::<WorldSnapshot>();
    let chunk_rows = snapshot.chunks.entry(chunk).or_default();
    chunk_rows.upsert(category, key.clone(), row);
    // Inventory rows key as "<name>#<i>", one per non-empty kind; stale
    // suffixes from a previous refresh are cleared first.
    if let Some(rows) = chunk_rows.rows.get_mut(&Category::Inventory) {
        for i in 0..InventoryKind::ALL.len() {
            rows.remove(&(key.0, format!("{}#{}", key.1, i)));
        }
    }
    for (i, inv_row) in inv_rows.into_iter().enumerate() {
        let inv_key = (key.0, format!("{}#{}", key.1, i));
        chunk_rows.upsert(Category::Inventory, inv_key, inv_row);
    }
}

/// Delete every snapshot row for `(position, name)`. Idempotent.
pub fn remove_entity_from_action(world: &mut World, position: Vec2, name: &str) {
    let chunk = ChunkCoord::from_position(position);
    let key: RowKey = (PosKey::from_vec2(position), name.to_string());
    let mut snapshot = world.resource_mut::<WorldSnapshot>();
    if let Some(chunk_rows) = snapshot.chunks.get_mut(&chunk) {
        chunk_rows.remove_key(&key);
        for i in 0..InventoryKind::ALL.len() {
            chunk_rows.remove_key(&(key.0, format!("{}#{}", key.1, i)));
        }
        if chunk_rows.is_empty() {
            snapshot.chunks.remove(&chunk);
        }
    }
}

/// Consume placement events produced outside action post-run (world
/// generation, depletion despawns).
pub fn apply_entity_events(world: &mut World) {
    let placed: Vec<EntityPlacedEvent> = {
        let mut events = world.resource_mut::<Events<EntityPlacedEvent>>();
        events.drain().collect()
    };
    let removed: Vec<EntityRemovedEvent> = {
        let mut events = world.resource_mut::<Events<EntityRemovedEvent>>();
        events.drain().collect()
    };
    for event in placed {
        update_entity_from_action(world, event.position, &event.name);
    }
    for event in removed {
        remove_entity_from_action(world, event.position, &event.name);
    }
}

// ============================================================================
// STATUS AND INVENTORY VIEWS
// ============================================================================

/// Status of a live entity: numeric code plus name.
pub fn entity_status(world: &World, entity: Entity) -> (u8, &'static str) {
    if let Some(config) = world.get::<CrafterConfig>(entity) {
        let Some(recipe_name) = &config.recipe else {
            return (2, "no_recipe");
        };
        let catalog = world.resource::<crate::world::prototypes::PrototypeCatalog>();
        let Some(recipe) = catalog.recipe(recipe_name) else {
            return (2, "no_recipe");
        };
        let has_ingredients = world
            .get::<EntityInventories>(entity)
            .and_then(|inv| inv.get(InventoryKind::Input))
            .map(|input| {
                recipe
                    .ingredients
                    .iter()
                    .all(|ing| input.count_of(&ing.item) >= ing.count)
            })
            .unwrap_or(false);
        if has_ingredients {
            (1, "working")
        } else {
            (3, "no_ingredients")
        }
    } else {
        (0, "normal")
    }
}

/// Recurring status view: rebuild `entity_status` rows for every charted
/// chunk that holds entities.
pub fn status_snapshot_tick(world: &mut World) {
    let tick = world.resource::<SimulationTick>().get();
    let chunks = world.resource::<ChartedChunks>().charted(false);

    for chunk in chunks {
        let rows = world.resource::<WorldIndex>().rows_in_chunk(chunk);
        let mut status_rows: Vec<(RowKey, Vec<String>)> = Vec::new();
        for (pos, name) in rows {
            let Some(entity) = world.resource::<WorldIndex>().get(pos.to_vec2(), &name)
            else {
                continue;
            };
            if world.get_entity(entity).is_err() {
                continue;
            }
            let (status, status_name) = entity_status(world, entity);
            let health = world
                .get::<Health>(entity)
                .map(|h| h.current)
                .unwrap_or(0.0);
            status_rows.push((
                (pos, name.clone()),
                vec![
                    fmt_pos(pos.to_vec2().x),
                    fmt_pos(pos.to_vec2().y),
                    name,
                    status.to_string(),
                    status_name.to_string(),
                    fmt_pos(health),
                    tick.to_string(),
                ],
            ));
        }
        if status_rows.is_empty() {
            continue;
        }
        let mut snapshot = world.resource_mut::<WorldSnapshot>();
        let chunk_rows = snapshot.chunks.entry(chunk).or_default();
        chunk_rows.rows.insert(
            Category::EntityStatus,
            status_rows.into_iter().collect(),
        );
    }
}

/// Query interface: non-empty inventories of the entity at
/// `(position, name)`, keyed by inventory kind.
pub fn inventory_view(
    world: &World,
    position: Vec2,
    name: &str,
) -> Option<serde_json::Value> {
    let entity = world.resource::<WorldIndex>().get(position, name)?;
    let inventories = world.get::<EntityInventories>(entity)?;
    let mut out = serde_json::Map::new();
    for kind in InventoryKind::ALL {
        if let Some(inventory) = inventories.get(kind) {
            if !inventory.is_empty() {
                out.insert(
                    kind.name().to_string(),
                    serde_json::to_value(inventory.contents()).ok()?,
                );
            }
        }
    }
    Some(serde_json::Value::Object(out))
}

// ============================================================================
// WATER ROWS AND DISCOVERY CHARTING
// ============================================================================

/// Seed water rows from terrain. Water is static, so this runs once after
/// world generation.
pub fn seed_water_rows(world: &mut World) {
    let tiles: Vec<bevy::math::IVec2> =
        world.resource::<Terrain>().water_tiles().collect();
    let mut snapshot = world.resource_mut::<WorldSnapshot>();
    for tile in tiles {
        let center = tile_center(tile);
        let chunk = ChunkCoord::from_tile(tile);
        let key = (PosKey::from_vec2(center), "water".to_string());
        snapshot.chunks.entry(chunk).or_default().upsert(
            Category::Water,
            key,
            vec![
                fmt_pos(center.x),
                fmt_pos(center.y),
                "water".to_string(),
            ],
        );
    }
}

/// Map-discovery charting: chart the chunks around every agent. Cadence is
/// configured; unattended hosts rely on explicit registration instead.
pub fn discovery_charting_tick(world: &mut World) {
    const RADIUS_CHUNKS: i32 = 2;
    let positions: Vec<Vec2> = {
        let registry = world.resource::<crate::agents::AgentRegistry>();
        registry
            .ids()
            .into_iter()
            .filter_map(|id| crate::agents::resolve_agent(world, id).ok())
            .filter_map(|e| world.get::<crate::agents::AgentPosition>(e).map(|p| p.pos))
            .collect()
    };
    let mut charted = world.resource_mut::<ChartedChunks>();
    for pos in positions {
        let center = ChunkCoord::from_position(pos);
        for dy in -RADIUS_CHUNKS..=RADIUS_CHUNKS {
            for dx in -RADIUS_CHUNKS..=RADIUS_CHUNKS {
                charted.chart(ChunkCoord::new(center.x + dx, center.y + dy));
            }
        }
    }
}

// ============================================================================
// PLUGIN
// ============================================================================

pub struct SnapshotPlugin;

impl Plugin for SnapshotPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WorldSnapshot>()
            .init_resource::<SnapshotExporter>()
            .add_systems(
                Update,
                (
                    apply_entity_events,
                    status_snapshot_tick.run_if(every_n_ticks(60, 0)),
                    export::export_slice_tick,
                )
                    .chain()
                    .in_set(SimulationSet::Snapshot)
                    .run_if(should_tick),
            )
            .add_systems(
                Update,
                discovery_charting_tick
                    .in_set(SimulationSet::Snapshot)
                    .after(export::export_slice_tick)
                    .run_if(should_tick)
                    .run_if(discovery_enabled),
            );
    }
}

fn discovery_enabled(
    config: Res<crate::config::RuntimeConfig>,
    tick: Res<SimulationTick>,
) -> bool {
    config.discovery_every != 0 && tick.0 % config.discovery_every == 0
}
