/// Craft job tracker: watches each agent's hand-craft queue to detect
/// completion and handles mid-flight cancellation with partial accounting.
///
/// Tracking is product-delta based: a snapshot of the product counts is
/// taken before `begin_crafting`, and completion reports only what actually
/// landed in the inventory, never what was cancelled.
use std::collections::BTreeMap;

use bevy::prelude::*;
use serde_json::json;

use crate::agents::{
    begin_crafting, cancel_crafting, craftable_count, resolve_agent, AgentInventory,
    CraftQueue,
};
use crate::errors::{ActionError, ActionResult};
use crate::simulation::{SimulationTick, TickStamp};
use crate::transport::ActionCompletedEvent;
use crate::types::AgentId;
use crate::world::prototypes::{ProductSpec, PrototypeCatalog};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CraftTracking {
    pub agent_id: AgentId,
    pub action_id: String,
    pub rcon_tick: u64,
    pub recipe: String,
    pub count_requested: u32,
    pub count_queued: u32,
    pub start_queue_size: u32,
    pub start_products: BTreeMap<String, u32>,
    /// Products of one craft, from the recipe prototype.
    pub products: Vec<ProductSpec>,
    pub cancelled: bool,
    pub cancel_tick: Option<u64>,
    pub count_cancelled: u32,
}

/// At most one live tracking per agent; concurrent crafts are rejected.
#[derive(Resource, Debug, Default)]
pub struct CraftTrackings {
    pub by_agent: BTreeMap<AgentId, CraftTracking>,
    pub(crate) stamp: TickStamp,
}

impl CraftTrackings {
    pub fn get(&self, agent_id: AgentId) -> Option<&CraftTracking> {
        self.by_agent.get(&agent_id)
    }
}

/// Enqueue a hand-craft and start tracking it. Returns `(action_id,
/// count_queued)` for the initial envelope.
pub fn enqueue_craft(
    world: &mut World,
    agent_id: AgentId,
    recipe_name: &str,
    count_requested: u32,
) -> ActionResult<(String, u32)> {
    let entity = resolve_agent(world, agent_id)?;

    if world.resource::<CraftTrackings>().by_agent.contains_key(&agent_id) {
        return Err(ActionError::logical(
            "CRAFT_IN_PROGRESS",
            format!("agent {} already has a tracked craft", agent_id),
        ));
    }

    let craftable = craftable_count(world, entity, recipe_name);
    if craftable == 0 {
        return Err(ActionError::resource(
            "INSUFFICIENT_INGREDIENTS",
            format!("agent {} cannot craft any {}", agent_id, recipe_name),
        ));
    }

    let products = {
        let catalog = world.resource::<PrototypeCatalog>();
        catalog
            .recipe(recipe_name)
            .map(|r| r.products.clone())
            .ok_or_else(|| ActionError::validation("UNKNOWN_RECIPE", recipe_name))?
    };

    // Snapshots precede begin_crafting so the delta accounting is exact.
    let start_products: BTreeMap<String, u32> = {
        let inventory = world
            .get::<AgentInventory>(entity)
            .ok_or_else(|| ActionError::agent("AGENT_NOT_CHARACTER", "no inventory"))?;
        products
            .iter()
            .map(|p| (p.item.clone(), inventory.0.count_of(&p.item)))
            .collect()
    };
    let start_queue_size = world
        .get::<CraftQueue>(entity)
        .map(|q| q.queue_size())
        .unwrap_or(0);

    let count_to_queue = count_requested.min(craftable);
    let count_started = begin_crafting(world, entity, recipe_name, count_to_queue);
    if count_started == 0 {
        return Err(ActionError::logical(
            "CRAFT_NOT_STARTED",
            format!("engine refused to start crafting {}", recipe_name),
        ));
    }

    let tick = world.resource::<SimulationTick>().get();
    let action_id = crate::errors::action_id("craft", tick, agent_id);
    world.resource_mut::<CraftTrackings>().by_agent.insert(
        agent_id,
        CraftTracking {
            agent_id,
            action_id: action_id.clone(),
            rcon_tick: tick,
            recipe: recipe_name.to_string(),
            count_requested,
            count_queued: count_started,
            start_queue_size,
            start_products,
            products,
            cancelled: false,
            cancel_tick: None,
            count_cancelled: 0,
        },
    );
    debug!(
        "🛠️ agent {} crafting {} x{} (requested {})",
        agent_id, recipe_name, count_started, count_requested
    );
    Ok((action_id, count_started))
}

/// Product deltas since the tracking snapshot, plus the implied number of
/// finished crafts.
fn crafted_so_far(
    world: &World,
    entity: Entity,
    tracking: &CraftTracking,
) -> (BTreeMap<String, u32>, u32) {
    let mut actual = BTreeMap::new();
    let inventory = world.get::<AgentInventory>(entity);
    for product in &tracking.products {
        let now = inventory.map(|inv| inv.0.count_of(&product.item)).unwrap_or(0);
        let start = tracking
            .start_products
            .get(&product.item)
            .copied()
            .unwrap_or(0);
        actual.insert(product.item.clone(), now.saturating_sub(start));
    }
    let count_crafted = tracking
        .products
        .first()
        .map(|first| {
            let delta = actual.get(&first.item).copied().unwrap_or(0);
            if first.count == 0 {
                0
            } else {
                delta / first.count
            }
        })
        .unwrap_or(0);
    (actual, count_crafted)
}

fn completion_result(
    tracking: &CraftTracking,
    actual: &BTreeMap<String, u32>,
    count_crafted: u32,
) -> serde_json::Value {
    json!({
        "recipe": tracking.recipe,
        "count_requested": tracking.count_requested,
        "count_queued": tracking.count_queued,
        "count_crafted": count_crafted.min(tracking.count_queued),
        "count_cancelled": tracking.count_cancelled,
        "products": actual,
    })
}

/// Cancel up to `count` tracked crafts (all of them when omitted). The
/// crafted-so-far accounting is computed before cancellation so the result
/// only ever reports products that exist.
pub fn cancel_craft(
    world: &mut World,
    agent_id: AgentId,
    recipe_name: &str,
    count: Option<u32>,
) -> ActionResult<serde_json::Value> {
    let entity = resolve_agent(world, agent_id)?;

    let tracking = world
        .resource::<CraftTrackings>()
        .get(agent_id)
        .cloned()
        .ok_or_else(|| {
            ActionError::logical("NO_TRACKED_CRAFT", format!("agent {} has no craft", agent_id))
        })?;
    if tracking.recipe != recipe_name {
        return Err(ActionError::logical(
            "RECIPE_MISMATCH",
            format!("tracked craft is {}, not {}", tracking.recipe, recipe_name),
        ));
    }

    let queue_size = world
        .get::<CraftQueue>(entity)
        .map(|q| q.queue_size())
        .unwrap_or(0);
    if queue_size == 0 {
        // Stale tracking; the tick path will flush it, nothing to cancel.
        world.resource_mut::<CraftTrackings>().by_agent.remove(&agent_id);
        return Err(ActionError::logical(
            "CRAFT_QUEUE_EMPTY",
            format!("agent {} craft queue already drained", agent_id),
        ));
    }

    let (actual, count_crafted) = crafted_so_far(world, entity, &tracking);
    let to_cancel = count.unwrap_or(tracking.count_queued);
    let cancelled = cancel_crafting(world, entity, recipe_name, to_cancel);
    let tick = world.resource::<SimulationTick>().get();

    {
        let mut trackings = world.resource_mut::<CraftTrackings>();
        let entry = trackings.by_agent.get_mut(&agent_id).unwrap();
        entry.cancelled = true;
        entry.cancel_tick = Some(tick);
        entry.count_cancelled += cancelled;
    }

    let remaining = world
        .get::<CraftQueue>(entity)
        .map(|q| q.queue_size())
        .unwrap_or(0);
    if remaining == 0 {
        // Everything drained: report immediately with only the products
        // that were actually crafted.
        let tracking = world
            .resource_mut::<CraftTrackings>()
            .by_agent
            .remove(&agent_id)
            .unwrap();
        world.send_event(ActionCompletedEvent {
            action_id: tracking.action_id.clone(),
            agent_id,
            action_type: "agent.crafting.enqueue".to_string(),
            rcon_tick: tracking.rcon_tick,
            success: true,
            cancelled: Some(true),
            result: completion_result(&tracking, &actual, count_crafted),
        });
    }

    Ok(json!({
        "recipe": recipe_name,
        "count_cancelled": cancelled,
        "count_crafted": count_crafted,
    }))
}

/// Per-tick completion detection.
pub fn craft_tracking_tick(world: &mut World) {
    let tick = world.resource::<SimulationTick>().get();
    if !world.resource_mut::<CraftTrackings>().stamp.mark(tick) {
        return;
    }

    let agent_ids: Vec<AgentId> = world
        .resource::<CraftTrackings>()
        .by_agent
        .keys()
        .copied()
        .collect();

    for agent_id in agent_ids {
        let Ok(entity) = resolve_agent(world, agent_id) else {
            // Agent invalid or no longer a character: cleanup, no datagram.
            world.resource_mut::<CraftTrackings>().by_agent.remove(&agent_id);
            debug!("🛠️ craft tracking for stale agent {} pruned", agent_id);
            continue;
        };
        let tracking = world.resource::<CraftTrackings>().by_agent[&agent_id].clone();

        let (queue_size, progress) = world
            .get::<CraftQueue>(entity)
            .map(|q| (q.queue_size(), q.progress_ticks))
            .unwrap_or((0, 0));

        let drained =
            queue_size < tracking.start_queue_size || (queue_size == 0 && progress == 0);
        if !drained {
            continue;
        }

        let (actual, count_crafted) = crafted_so_far(world, entity, &tracking);
        world.resource_mut::<CraftTrackings>().by_agent.remove(&agent_id);
        world.send_event(ActionCompletedEvent {
            action_id: tracking.action_id.clone(),
            agent_id,
            action_type: "agent.crafting.enqueue".to_string(),
            rcon_tick: tracking.rcon_tick,
            success: true,
            cancelled: Some(tracking.cancelled),
            result: completion_result(&tracking, &actual, count_crafted),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_result_caps_at_count_queued() {
        let tracking = CraftTracking {
            agent_id: 1,
            action_id: "craft_1_1".into(),
            rcon_tick: 1,
            recipe: "iron-gear-wheel".into(),
            count_requested: 5,
            count_queued: 3,
            start_queue_size: 0,
            start_products: BTreeMap::new(),
            products: vec![ProductSpec::new("iron-gear-wheel", 1)],
            cancelled: false,
            cancel_tick: None,
            count_cancelled: 0,
        };
        let mut actual = BTreeMap::new();
        // Delta inflated by an unrelated pickup mid-craft.
        actual.insert("iron-gear-wheel".to_string(), 7);
        let result = completion_result(&tracking, &actual, 7);
        assert_eq!(result["count_crafted"], 3);
    }
}
