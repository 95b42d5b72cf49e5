/// Factory entities and the spatial index over them.
///
/// Durable identity for everything placed on the map is the pair
/// `(position, entity_name)`; `Entity` handles are live references that get
/// re-resolved through the index. The index also maintains the per-chunk row
/// keys the snapshot layer iterates.
use std::collections::{BTreeMap, BTreeSet};

use bevy::math::Vec2;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{ActionError, ActionResult};
use crate::types::{tile_of, Direction, PosKey};
use crate::world::chunks::ChunkCoord;
use crate::world::inventory::{Inventory, InventoryKind};
use crate::world::prototypes::PrototypeCatalog;

// ============================================================================
// COMPONENTS
// ============================================================================

/// Core component of every placed factory entity.
#[derive(Component, Debug, Clone)]
pub struct Placed {
    pub name: String,
    pub kind: String,
    pub position: Vec2,
    pub direction: Direction,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

/// Remaining units in a resource deposit.
#[derive(Component, Debug, Clone, Copy)]
pub struct ResourceDeposit {
    pub amount: u32,
}

/// Recipe configured on a crafting machine.
#[derive(Component, Debug, Clone, Default)]
pub struct CrafterConfig {
    pub recipe: Option<String>,
}

/// Pickup/drop positions derived from an inserter's direction.
#[derive(Component, Debug, Clone, Copy)]
pub struct InserterArms {
    pub pickup: Vec2,
    pub drop: Vec2,
}

/// Item names per transport line, by line index.
#[derive(Component, Debug, Clone, Default)]
pub struct BeltContents {
    pub lines: Vec<Vec<String>>,
}

/// Pairing state for underground belts.
#[derive(Component, Debug, Clone, Default)]
pub struct UndergroundLink {
    /// "input" or "output".
    pub io: String,
    pub pair: Option<PosKey>,
}

/// Inventories exposed by the entity, keyed by kind.
#[derive(Component, Debug, Clone, Default)]
pub struct EntityInventories {
    pub map: BTreeMap<InventoryKind, Inventory>,
}

impl EntityInventories {
    pub fn get(&self, kind: InventoryKind) -> Option<&Inventory> {
        self.map.get(&kind)
    }

    pub fn get_mut(&mut self, kind: InventoryKind) -> Option<&mut Inventory> {
        self.map.get_mut(&kind)
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Emitted after an entity lands on the map; the snapshot layer refreshes
/// the matching row.
#[derive(Event, Debug, Clone)]
pub struct EntityPlacedEvent {
    pub position: Vec2,
    pub name: String,
}

/// Emitted after an entity leaves the map.
#[derive(Event, Debug, Clone)]
pub struct EntityRemovedEvent {
    pub position: Vec2,
    pub name: String,
}

// ============================================================================
// RESOURCES
// ============================================================================

/// Items spilled on the ground (mining overflow), keyed by position.
#[derive(Resource, Debug, Default, Clone, Serialize, Deserialize)]
pub struct GroundSpills {
    pub piles: BTreeMap<PosKey, BTreeMap<String, u32>>,
}

impl GroundSpills {
    pub fn spill(&mut self, position: Vec2, item: &str, count: u32) {
        if count == 0 {
            return;
        }
        *self
            .piles
            .entry(PosKey::from_vec2(position))
            .or_default()
            .entry(item.to_string())
            .or_insert(0) += count;
    }

    pub fn total_of(&self, item: &str) -> u32 {
        self.piles
            .values()
            .map(|pile| pile.get(item).copied().unwrap_or(0))
            .sum()
    }
}

/// Spatial index: `(position, entity_name)` → live entity, plus per-chunk
/// row-key sets.
#[derive(Resource, Debug, Default)]
pub struct WorldIndex {
    by_key: BTreeMap<(PosKey, String), Entity>,
    by_chunk: BTreeMap<ChunkCoord, BTreeSet<(PosKey, String)>>,
}

impl WorldIndex {
    pub fn insert(&mut self, position: Vec2, name: &str, entity: Entity) {
        let key = (PosKey::from_vec2(position), name.to_string());
        let chunk = ChunkCoord::from_position(position);
        self.by_chunk.entry(chunk).or_default().insert(key.clone());
        self.by_key.insert(key, entity);
    }

    pub fn remove(&mut self, position: Vec2, name: &str) -> Option<Entity> {
        let key = (PosKey::from_vec2(position), name.to_string());
        let chunk = ChunkCoord::from_position(position);
        if let Some(rows) = self.by_chunk.get_mut(&chunk) {
            rows.remove(&key);
            if rows.is_empty() {
                self.by_chunk.remove(&chunk);
            }
        }
        self.by_key.remove(&key)
    }

    pub fn get(&self, position: Vec2, name: &str) -> Option<Entity> {
        self.by_key
            .get(&(PosKey::from_vec2(position), name.to_string()))
            .copied()
    }

    pub fn rows_in_chunk(&self, chunk: ChunkCoord) -> Vec<(PosKey, String)> {
        self.by_chunk
            .get(&chunk)
            .map(|rows| rows.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn occupied_chunks(&self) -> Vec<ChunkCoord> {
        self.by_chunk.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// All index rows within `radius` tiles of `center`, nearest first.
    pub fn rows_near(&self, center: Vec2, radius: f32) -> Vec<(PosKey, String, Entity)> {
        let lo = ChunkCoord::from_position(center - Vec2::splat(radius));
        let hi = ChunkCoord::from_position(center + Vec2::splat(radius));
        let mut out = Vec::new();
        for cy in lo.y..=hi.y {
            for cx in lo.x..=hi.x {
                if let Some(rows) = self.by_chunk.get(&ChunkCoord::new(cx, cy)) {
                    for (pos, name) in rows {
                        let p = pos.to_vec2();
                        if p.distance(center) <= radius {
                            if let Some(&entity) =
                                self.by_key.get(&(*pos, name.clone()))
                            {
                                out.push((*pos, name.clone(), entity));
                            }
                        }
                    }
                }
            }
        }
        out.sort_by(|a, b| {
            let da = a.0.to_vec2().distance_squared(center);
            let db = b.0.to_vec2().distance_squared(center);
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.0, &a.1).cmp(&(b.0, &b.1)))
        });
        out
    }
}

// ============================================================================
// SPAWN / REMOVE HELPERS
// ============================================================================

fn default_inventories(kind: &str) -> EntityInventories {
    let mut map = BTreeMap::new();
    match kind {
        "container" => {
            map.insert(InventoryKind::Chest, Inventory::new(16));
        }
        "furnace" => {
            map.insert(InventoryKind::Fuel, Inventory::new(1));
            map.insert(InventoryKind::Input, Inventory::new(1));
            map.insert(InventoryKind::Output, Inventory::new(1));
        }
        "assembling-machine" => {
            map.insert(InventoryKind::Input, Inventory::new(2));
            map.insert(InventoryKind::Output, Inventory::new(1));
            map.insert(InventoryKind::Modules, Inventory::new(2));
        }
        "mining-drill" => {
            map.insert(InventoryKind::Fuel, Inventory::new(1));
        }
        "lab" => {
            map.insert(InventoryKind::Input, Inventory::new(2));
        }
        _ => {}
    }
    EntityInventories { map }
}

/// Spawn a factory entity at `position`, wiring index, pathfinding grid and
/// placement event. Fails MAP if the tile already holds a colliding entity.
pub fn spawn_placed(
    world: &mut World,
    name: &str,
    position: Vec2,
    direction: Direction,
) -> ActionResult<Entity> {
    let proto = {
        let catalog = world.resource::<PrototypeCatalog>();
        catalog
            .entity(name)
            .cloned()
            .ok_or_else(|| ActionError::validation("UNKNOWN_ENTITY", name))?
    };

    let tile = tile_of(position);
    if proto.collides {
        let blocked = world
            .resource::<WorldIndex>()
            .rows_near(crate::types::tile_center(tile), 0.8)
            .iter()
            .any(|(_, other, entity)| {
                world
                    .resource::<PrototypeCatalog>()
                    .entity(other)
                    .map(|p| p.collides)
                    .unwrap_or(false)
                    && world.get_entity(*entity).is_ok()
            });
        if blocked {
            return Err(ActionError::map(
                "POSITION_BLOCKED",
                format!("tile ({}, {}) is occupied", tile.x, tile.y),
            ));
        }
    }

    let mut builder = world.spawn((
        Placed {
            name: proto.name.clone(),
            kind: proto.kind.clone(),
            position,
            direction,
        },
        Health {
            current: proto.max_health,
            max: proto.max_health,
        },
        default_inventories(&proto.kind),
    ));
    match proto.kind.as_str() {
        "assembling-machine" | "furnace" => {
            builder.insert(CrafterConfig::default());
        }
        "inserter" => {
            let arm = direction.unit();
            builder.insert(InserterArms {
                pickup: position - arm,
                drop: position + arm,
            });
        }
        "transport-belt" | "splitter" | "loader" | "loader-1x1" | "linked-belt" => {
            builder.insert(BeltContents::default());
        }
        "underground-belt" => {
            builder.insert((BeltContents::default(), UndergroundLink::default()));
        }
        _ => {}
    }
    let entity = builder.id();

    world
        .resource_mut::<WorldIndex>()
        .insert(position, &proto.name, entity);
    if proto.collides {
        world
            .resource_mut::<crate::pathfinding::PathfindingGrid>()
            .block(tile);
    }
    world
        .resource_mut::<crate::world::chunks::ChartedChunks>()
        .chart(ChunkCoord::from_position(position));
    world.send_event(EntityPlacedEvent {
        position,
        name: proto.name,
    });
    Ok(entity)
}

/// Spawn a resource deposit (or tree) with the given richness.
pub fn spawn_resource(
    world: &mut World,
    name: &str,
    position: Vec2,
    amount: u32,
) -> ActionResult<Entity> {
    let entity = spawn_placed(world, name, position, Direction::North)?;
    world.entity_mut(entity).insert(ResourceDeposit { amount });
    Ok(entity)
}

/// Remove the entity at `(position, name)` from the map; despawns it and
/// unblocks its tile. Returns MAP if no such entity lives there.
pub fn remove_placed(world: &mut World, position: Vec2, name: &str) -> ActionResult<()> {
    let entity = world
        .resource::<WorldIndex>()
        .get(position, name)
        .ok_or_else(|| {
            ActionError::map(
                "ENTITY_NOT_FOUND",
                format!("no {} at ({}, {})", name, position.x, position.y),
            )
        })?;

    let collides = world
        .get::<Placed>(entity)
        .and_then(|p| {
            world
                .resource::<PrototypeCatalog>()
                .entity(&p.name)
                .map(|proto| proto.collides)
        })
        .unwrap_or(false);

    world.resource_mut::<WorldIndex>().remove(position, name);
    if collides {
        world
            .resource_mut::<crate::pathfinding::PathfindingGrid>()
            .unblock(tile_of(position));
    }
    if world.get_entity(entity).is_ok() {
        world.despawn(entity);
    }
    world.send_event(EntityRemovedEvent {
        position,
        name: name.to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_insert_lookup_remove() {
        let mut index = WorldIndex::default();
        let entity = Entity::from_raw(9);
        let pos = Vec2::new(4.5, 4.5);
        index.insert(pos, "stone-furnace", entity);

        assert_eq!(index.get(pos, "stone-furnace"), Some(entity));
        assert_eq!(index.get(pos, "wooden-chest"), None);
        assert_eq!(index.rows_in_chunk(ChunkCoord::new(0, 0)).len(), 1);

        index.remove(pos, "stone-furnace");
        assert!(index.is_empty());
        assert!(index.occupied_chunks().is_empty());
    }

    #[test]
    fn test_rows_near_orders_by_distance() {
        let mut index = WorldIndex::default();
        index.insert(Vec2::new(10.0, 0.0), "iron-ore", Entity::from_raw(1));
        index.insert(Vec2::new(2.0, 0.0), "iron-ore", Entity::from_raw(2));
        index.insert(Vec2::new(5.0, 0.0), "coal", Entity::from_raw(3));

        let near = index.rows_near(Vec2::ZERO, 6.0);
        assert_eq!(near.len(), 2);
        assert_eq!(near[0].1, "iron-ore");
        assert_eq!(near[0].2, Entity::from_raw(2));
        assert_eq!(near[1].1, "coal");
    }

    #[test]
    fn test_ground_spills_accumulate() {
        let mut spills = GroundSpills::default();
        spills.spill(Vec2::new(1.0, 1.0), "iron-ore", 3);
        spills.spill(Vec2::new(1.0, 1.0), "iron-ore", 2);
        spills.spill(Vec2::new(9.0, 9.0), "iron-ore", 1);
        assert_eq!(spills.total_of("iron-ore"), 6);
    }
}
