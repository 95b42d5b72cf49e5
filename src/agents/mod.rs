/// Agent actors: the characters that walk, mine and craft on behalf of the
/// external controller.
///
/// Agents are Bevy entities addressed by a stable `agent_id`; the
/// `AgentRegistry` arena re-resolves ids to live entities every tick, so a
/// despawned agent simply stops resolving and its jobs terminate.
use std::collections::BTreeMap;

use bevy::math::Vec2;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{ActionError, ActionResult};
use crate::types::{AgentId, Direction};
use crate::world::entity_map::ResourceDeposit;
use crate::world::inventory::Inventory;
use crate::world::prototypes::PrototypeCatalog;

/// Tiles per tick while walking. Matches the host engine's base character
/// speed at 60 ticks per second.
pub const WALK_SPEED: f32 = 0.15;

/// Default interaction reach for resources, in tiles.
pub const DEFAULT_REACH_DISTANCE: f32 = 2.7;

// ============================================================================
// COMPONENTS
// ============================================================================

#[derive(Component, Debug, Clone)]
pub struct Agent {
    pub agent_id: AgentId,
    pub reach_distance: f32,
}

#[derive(Component, Debug, Clone, Copy, Default)]
pub struct AgentPosition {
    pub pos: Vec2,
}

/// Walking sub-state, commanded by the walk engine or the raw
/// `agent.walk` action.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkingState {
    pub walking: bool,
    pub direction: Direction,
    /// Raw walk commands may bound themselves to a number of ticks.
    pub ticks_left: Option<u32>,
}

/// Mining sub-state driven in emulate mode: while `mining` is set the host
/// swings at the selected deposit on a timer.
#[derive(Component, Debug, Clone, Default)]
pub struct MiningState {
    pub mining: bool,
    pub position: Option<Vec2>,
    pub resource_name: Option<String>,
    pub swing_ticks_left: u32,
}

/// One batch of hand-crafts in the agent's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftOrder {
    pub recipe: String,
    pub count: u32,
}

/// The agent's hand-crafting queue. Ingredients are consumed when crafts
/// are queued; the head item accumulates progress ticks.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CraftQueue {
    pub orders: Vec<CraftOrder>,
    pub progress_ticks: u32,
}

impl CraftQueue {
    /// Total items still queued, the "queue size" the craft tracker
    /// compares against.
    pub fn queue_size(&self) -> u32 {
        self.orders.iter().map(|o| o.count).sum()
    }
}

#[derive(Component, Debug, Clone, Default)]
pub struct AgentInventory(pub Inventory);

// ============================================================================
// REGISTRY
// ============================================================================

/// Arena mapping agent ids to live entities. BTreeMap so per-tick iteration
/// order is deterministic.
#[derive(Resource, Debug, Default)]
pub struct AgentRegistry {
    by_id: BTreeMap<AgentId, Entity>,
}

impl AgentRegistry {
    pub fn get(&self, agent_id: AgentId) -> Option<Entity> {
        self.by_id.get(&agent_id).copied()
    }

    pub fn insert(&mut self, agent_id: AgentId, entity: Entity) {
        self.by_id.insert(agent_id, entity);
    }

    pub fn remove(&mut self, agent_id: AgentId) -> Option<Entity> {
        self.by_id.remove(&agent_id)
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.by_id.contains_key(&agent_id)
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.by_id.keys().copied().collect()
    }
}

/// Resolve an agent id to its live entity, AGENT error if stale or unknown.
pub fn resolve_agent(world: &World, agent_id: AgentId) -> ActionResult<Entity> {
    let entity = world
        .resource::<AgentRegistry>()
        .get(agent_id)
        .ok_or_else(|| {
            ActionError::agent("AGENT_NOT_FOUND", format!("agent {} not found", agent_id))
        })?;
    if world.get_entity(entity).is_err() || world.get::<Agent>(entity).is_none() {
        return Err(ActionError::agent(
            "AGENT_NOT_CHARACTER",
            format!("agent {} is no longer a character", agent_id),
        ));
    }
    Ok(entity)
}

/// Spawn an agent actor. At most one agent per identifier may exist.
pub fn spawn_agent(world: &mut World, agent_id: AgentId, pos: Vec2) -> ActionResult<Entity> {
    if world.resource::<AgentRegistry>().contains(agent_id) {
        return Err(ActionError::logical(
            "AGENT_EXISTS",
            format!("agent {} already exists", agent_id),
        ));
    }
    let entity = world
        .spawn((
            Agent {
                agent_id,
                reach_distance: DEFAULT_REACH_DISTANCE,
            },
            AgentPosition { pos },
            WalkingState::default(),
            MiningState::default(),
            CraftQueue::default(),
            AgentInventory(Inventory::new(60)),
        ))
        .id();
    world.resource_mut::<AgentRegistry>().insert(agent_id, entity);
    info!("🧍 Spawned agent {} at ({}, {})", agent_id, pos.x, pos.y);
    Ok(entity)
}

/// Despawn an agent actor and drop it from the arena. Job engines notice the
/// stale id on their next tick and terminate their jobs.
pub fn despawn_agent(world: &mut World, agent_id: AgentId) -> ActionResult<()> {
    let entity = world
        .resource_mut::<AgentRegistry>()
        .remove(agent_id)
        .ok_or_else(|| {
            ActionError::agent("AGENT_NOT_FOUND", format!("agent {} not found", agent_id))
        })?;
    if world.get_entity(entity).is_ok() {
        world.despawn(entity);
    }
    Ok(())
}

// ============================================================================
// HOST TICK SYSTEMS
// ============================================================================

/// Apply walking displacement. Runs in the host-sim phase after the job
/// engines have issued their commands for this tick. Blocked tiles stop the
/// step; the walk engine's stall detection picks that up.
pub fn apply_walking(
    grid: Res<crate::pathfinding::PathfindingGrid>,
    mut query: Query<(&mut AgentPosition, &mut WalkingState)>,
) {
    for (mut position, mut walking) in query.iter_mut() {
        if !walking.walking {
            continue;
        }
        let next = position.pos + walking.direction.unit() * WALK_SPEED;
        if !grid.is_blocked(crate::types::tile_of(next)) {
            position.pos = next;
        }
        if let Some(ticks) = walking.ticks_left.as_mut() {
            *ticks = ticks.saturating_sub(1);
            if *ticks == 0 {
                walking.walking = false;
                walking.ticks_left = None;
            }
        }
    }
}

/// Advance emulated mining swings: every `ceil(mining_time * 60)` ticks the
/// selected deposit yields its products into the agent inventory and loses
/// one unit. Runs exclusively because depletion despawns map entities.
pub fn tick_emulated_mining(world: &mut World) {
    let agent_ids: Vec<AgentId> = world.resource::<AgentRegistry>().ids();

    for agent_id in agent_ids {
        let Ok(entity) = resolve_agent(world, agent_id) else {
            continue;
        };
        let (mining, target_pos, resource_name) = {
            let Some(state) = world.get::<MiningState>(entity) else {
                continue;
            };
            (
                state.mining,
                state.position,
                state.resource_name.clone(),
            )
        };
        if !mining {
            continue;
        }
        let (Some(target_pos), Some(resource_name)) = (target_pos, resource_name) else {
            continue;
        };

        let Some(deposit_entity) = world
            .resource::<crate::world::entity_map::WorldIndex>()
            .get(target_pos, &resource_name)
        else {
            // Deposit vanished; stop swinging, the mine engine will notice.
            if let Some(mut state) = world.get_mut::<MiningState>(entity) {
                state.mining = false;
            }
            continue;
        };

        let swing_ticks = {
            let catalog = world.resource::<PrototypeCatalog>();
            catalog
                .entity(&resource_name)
                .map(|p| (p.mining_time * 60.0).ceil() as u32)
                .unwrap_or(60)
        };

        let finished_swing = {
            let mut state = world.get_mut::<MiningState>(entity).unwrap();
            if state.swing_ticks_left == 0 {
                state.swing_ticks_left = swing_ticks;
            }
            state.swing_ticks_left -= 1;
            state.swing_ticks_left == 0
        };
        if !finished_swing {
            continue;
        }

        let products = {
            let catalog = world.resource::<PrototypeCatalog>();
            catalog
                .entity(&resource_name)
                .map(|p| p.minable_products.clone())
                .unwrap_or_default()
        };
        let agent_pos = world.get::<AgentPosition>(entity).map(|p| p.pos);
        world.resource_scope(|world, catalog: Mut<PrototypeCatalog>| {
            let mut inventory = world.get_mut::<AgentInventory>(entity).unwrap();
            let mut overflow = Vec::new();
            for product in &products {
                let accepted = inventory.0.insert(&product.item, product.count, &catalog);
                if accepted < product.count {
                    overflow.push((product.item.clone(), product.count - accepted));
                }
            }
            if let Some(agent_pos) = agent_pos {
                let mut spills =
                    world.resource_mut::<crate::world::entity_map::GroundSpills>();
                for (item, count) in overflow {
                    spills.spill(agent_pos, &item, count);
                }
            }
        });

        let depleted = {
            let mut deposit = world.get_mut::<ResourceDeposit>(deposit_entity).unwrap();
            deposit.amount = deposit.amount.saturating_sub(1);
            deposit.amount == 0
        };
        if depleted {
            let _ = crate::world::entity_map::remove_placed(
                world,
                target_pos,
                &resource_name,
            );
            debug!("⛏️ Deposit {} at {:?} depleted", resource_name, target_pos);
        }
    }
}

/// Advance the head of each agent's hand-craft queue. Ingredients were
/// consumed when the order was queued; products land when each item
/// finishes.
pub fn tick_hand_crafting(world: &mut World) {
    let agent_ids: Vec<AgentId> = world.resource::<AgentRegistry>().ids();

    for agent_id in agent_ids {
        let Ok(entity) = resolve_agent(world, agent_id) else {
            continue;
        };
        let head = {
            let Some(queue) = world.get::<CraftQueue>(entity) else {
                continue;
            };
            queue.orders.first().map(|o| o.recipe.clone())
        };
        let Some(recipe_name) = head else { continue };

        let (craft_ticks, products) = {
            let catalog = world.resource::<PrototypeCatalog>();
            let Some(recipe) = catalog.recipe(&recipe_name) else {
                // Unknown recipe in the queue; drop the order defensively.
                let mut queue = world.get_mut::<CraftQueue>(entity).unwrap();
                queue.orders.remove(0);
                queue.progress_ticks = 0;
                continue;
            };
            (recipe.craft_ticks, recipe.products.clone())
        };

        let finished = {
            let mut queue = world.get_mut::<CraftQueue>(entity).unwrap();
            queue.progress_ticks += 1;
            queue.progress_ticks >= craft_ticks
        };
        if !finished {
            continue;
        }

        let agent_pos = world.get::<AgentPosition>(entity).map(|p| p.pos);
        world.resource_scope(|world, catalog: Mut<PrototypeCatalog>| {
            let mut inventory = world.get_mut::<AgentInventory>(entity).unwrap();
            let mut overflow = Vec::new();
            for product in &products {
                let accepted = inventory.0.insert(&product.item, product.count, &catalog);
                if accepted < product.count {
                    overflow.push((product.item.clone(), product.count - accepted));
                }
            }
            if let Some(agent_pos) = agent_pos {
                let mut spills =
                    world.resource_mut::<crate::world::entity_map::GroundSpills>();
                for (item, count) in overflow {
                    spills.spill(agent_pos, &item, count);
                }
            }
        });

        let mut queue = world.get_mut::<CraftQueue>(entity).unwrap();
        queue.progress_ticks = 0;
        if let Some(order) = queue.orders.first_mut() {
            order.count -= 1;
            if order.count == 0 {
                queue.orders.remove(0);
            }
        }
    }
}

// ============================================================================
// CRAFTING PRIMITIVES (engine contract used by the craft tracker)
// ============================================================================

/// How many items of `recipe` the agent can start right now from direct
/// ingredients.
pub fn craftable_count(world: &World, entity: Entity, recipe_name: &str) -> u32 {
    let catalog = world.resource::<PrototypeCatalog>();
    let Some(recipe) = catalog.recipe(recipe_name) else {
        return 0;
    };
    let Some(inventory) = world.get::<AgentInventory>(entity) else {
        return 0;
    };
    recipe
        .ingredients
        .iter()
        .map(|ing| {
            if ing.count == 0 {
                u32::MAX
            } else {
                inventory.0.count_of(&ing.item) / ing.count
            }
        })
        .min()
        .unwrap_or(0)
}

/// Consume ingredients and append `count` crafts to the agent queue.
/// Returns the number actually started.
pub fn begin_crafting(
    world: &mut World,
    entity: Entity,
    recipe_name: &str,
    count: u32,
) -> u32 {
    let started = count.min(craftable_count(world, entity, recipe_name));
    if started == 0 {
        return 0;
    }
    let ingredients = {
        let catalog = world.resource::<PrototypeCatalog>();
        catalog.recipe(recipe_name).unwrap().ingredients.clone()
    };
    let mut inventory = world.get_mut::<AgentInventory>(entity).unwrap();
    for ing in &ingredients {
        inventory.0.remove(&ing.item, ing.count * started);
    }
    let mut queue = world.get_mut::<CraftQueue>(entity).unwrap();
    if let Some(order) = queue
        .orders
        .iter_mut()
        .rev()
        .find(|o| o.recipe == recipe_name)
    {
        order.count += started;
    } else {
        queue.orders.push(CraftOrder {
            recipe: recipe_name.to_string(),
            count: started,
        });
    }
    started
}

/// Cancel up to `count` queued crafts of `recipe`, newest first, refunding
/// their ingredients. The in-progress item counts as cancellable; its
/// progress is lost. Returns the number cancelled.
pub fn cancel_crafting(
    world: &mut World,
    entity: Entity,
    recipe_name: &str,
    count: u32,
) -> u32 {
    let cancelled = {
        let Some(mut queue) = world.get_mut::<CraftQueue>(entity) else {
            return 0;
        };
        let mut remaining = count;
        let mut cancelled = 0;
        for idx in (0..queue.orders.len()).rev() {
            if remaining == 0 {
                break;
            }
            if queue.orders[idx].recipe != recipe_name {
                continue;
            }
            let take = queue.orders[idx].count.min(remaining);
            queue.orders[idx].count -= take;
            remaining -= take;
            cancelled += take;
            if queue.orders[idx].count == 0 {
                if idx == 0 {
                    queue.progress_ticks = 0;
                }
                queue.orders.remove(idx);
            }
        }
        cancelled
    };
    if cancelled == 0 {
        return 0;
    }
    let ingredients = {
        let catalog = world.resource::<PrototypeCatalog>();
        catalog
            .recipe(recipe_name)
            .map(|r| r.ingredients.clone())
            .unwrap_or_default()
    };
    world.resource_scope(|world, catalog: Mut<PrototypeCatalog>| {
        let mut inventory = world.get_mut::<AgentInventory>(entity).unwrap();
        for ing in &ingredients {
            inventory.0.insert(&ing.item, ing.count * cancelled, &catalog);
        }
    });
    cancelled
}

// ============================================================================
// PLUGIN
// ============================================================================

pub struct AgentsPlugin;

impl Plugin for AgentsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AgentRegistry>().add_systems(
            Update,
            (apply_walking, tick_emulated_mining, tick_hand_crafting)
                .chain()
                .in_set(crate::simulation::SimulationSet::HostSim)
                .run_if(crate::simulation::should_tick),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_craft_queue_size_sums_orders() {
        let queue = CraftQueue {
            orders: vec![
                CraftOrder {
                    recipe: "iron-gear-wheel".into(),
                    count: 3,
                },
                CraftOrder {
                    recipe: "copper-cable".into(),
                    count: 2,
                },
            ],
            progress_ticks: 10,
        };
        assert_eq!(queue.queue_size(), 5);
    }

    #[test]
    fn test_registry_round_trip() {
        let mut registry = AgentRegistry::default();
        registry.insert(1, Entity::from_raw(10));
        registry.insert(2, Entity::from_raw(20));
        assert_eq!(registry.get(1), Some(Entity::from_raw(10)));
        assert_eq!(registry.ids(), vec![1, 2]);
        registry.remove(1);
        assert!(!registry.contains(1));
    }
}
