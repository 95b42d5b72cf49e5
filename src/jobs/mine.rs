/// Mine job engine: per-agent mining loop with reach checking, optional
/// walk-to, and inventory-delta accounting.
///
/// One job per agent; a new mine replaces the previous one. The engine
/// never pathfinds on its own: when the target is out of reach it starts an
/// internal walk job through the walk engine and keeps retrying.
use std::collections::BTreeMap;

use bevy::math::Vec2;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::agents::{resolve_agent, Agent, AgentInventory, AgentPosition, MiningState};
use crate::simulation::{SimulationTick, TickStamp};
use crate::transport::ActionCompletedEvent;
use crate::types::AgentId;
use crate::world::entity_map::{remove_placed, GroundSpills, ResourceDeposit, WorldIndex};
use crate::world::prototypes::PrototypeCatalog;

/// Search radius around the requested position when no resource sits on the
/// exact tile.
const NEARBY_SEARCH_RADIUS: f32 = 2.5;
/// Tolerance added to the agent's reach distance.
const REACH_SLACK: f32 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MineJob {
    pub agent_id: AgentId,
    pub action_id: String,
    pub rcon_tick: u64,
    pub target: Vec2,
    pub resource_name: String,
    pub min_count: u32,
    pub mined_count: u32,
    /// Product item names, filled on the first tick from the prototype.
    pub products: Option<Vec<String>>,
    /// Inventory total of all products when the job started.
    pub start_total: Option<u32>,
    pub walking_started: bool,
    pub walk_if_unreachable: bool,
    pub emulate: bool,
    /// Swing timer for non-emulated mining.
    pub ticks_left: Option<u32>,
}

#[derive(Resource, Debug, Default)]
pub struct MineJobs {
    pub jobs: BTreeMap<AgentId, MineJob>,
    pub(crate) stamp: TickStamp,
}

impl MineJobs {
    pub fn get(&self, agent_id: AgentId) -> Option<&MineJob> {
        self.jobs.get(&agent_id)
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.jobs.contains_key(&agent_id)
    }
}

/// Register (or replace) a mine job. Returns its action id.
pub fn start_mine(
    world: &mut World,
    agent_id: AgentId,
    target: Vec2,
    resource_name: &str,
    min_count: u32,
    walk_if_unreachable: bool,
    emulate: bool,
) -> crate::errors::ActionResult<String> {
    resolve_agent(world, agent_id)?;
    let tick = world.resource::<SimulationTick>().get();
    let action_id = crate::errors::action_id("mine", tick, agent_id);
    world.resource_mut::<MineJobs>().jobs.insert(
        agent_id,
        MineJob {
            agent_id,
            action_id: action_id.clone(),
            rcon_tick: tick,
            target,
            resource_name: resource_name.to_string(),
            min_count,
            mined_count: 0,
            products: None,
            start_total: None,
            walking_started: false,
            walk_if_unreachable,
            emulate,
            ticks_left: None,
        },
    );
    debug!(
        "⛏️ mine job for agent {}: {} x{} at ({}, {})",
        agent_id, resource_name, min_count, target.x, target.y
    );
    Ok(action_id)
}

/// Cancel the agent's mine job, emitting a cancelled completion. Returns
/// false when no job was live (cancel of a finished mine is a no-op).
pub fn cancel_mine(world: &mut World, agent_id: AgentId) -> bool {
    let Some(job) = world.resource_mut::<MineJobs>().jobs.remove(&agent_id) else {
        return false;
    };
    stop_mining_substate(world, agent_id);
    if job.walking_started {
        super::walk::cancel_walk(world, agent_id);
    }
    world.send_event(ActionCompletedEvent {
        action_id: job.action_id.clone(),
        agent_id,
        action_type: "mine_resource".to_string(),
        rcon_tick: job.rcon_tick,
        success: false,
        cancelled: Some(true),
        result: serde_json::json!({
            "mined": job.mined_count,
            "resource_name": job.resource_name,
        }),
    });
    true
}

fn stop_mining_substate(world: &mut World, agent_id: AgentId) {
    if let Ok(entity) = resolve_agent(world, agent_id) {
        if let Some(mut mining) = world.get_mut::<MiningState>(entity) {
            mining.mining = false;
            mining.position = None;
            mining.resource_name = None;
            mining.swing_ticks_left = 0;
        }
    }
}

/// Resolve the resource entity: exact `(position, name)` first, then the
/// nearest matching deposit within the search radius.
fn resolve_resource(world: &World, target: Vec2, name: &str) -> Option<(Vec2, Entity)> {
    let index = world.resource::<WorldIndex>();
    if let Some(entity) = index.get(target, name) {
        if world.get_entity(entity).is_ok() {
            return Some((target, entity));
        }
    }
    index
        .rows_near(target, NEARBY_SEARCH_RADIUS)
        .into_iter()
        .find(|(_, row_name, entity)| {
            row_name == name && world.get::<ResourceDeposit>(*entity).is_some()
        })
        .map(|(pos, _, entity)| (pos.to_vec2(), entity))
}

enum MineOutcome {
    Success,
    Failed(&'static str),
    StaleAgent,
}

/// Per-tick mining loop.
pub fn mine_jobs_tick(world: &mut World) {
    let tick = world.resource::<SimulationTick>().get();
    if !world.resource_mut::<MineJobs>().stamp.mark(tick) {
        return;
    }

    let agent_ids: Vec<AgentId> =
        world.resource::<MineJobs>().jobs.keys().copied().collect();
    let mut finished: Vec<(AgentId, MineOutcome)> = Vec::new();

    for agent_id in agent_ids {
        let Ok(entity) = resolve_agent(world, agent_id) else {
            finished.push((agent_id, MineOutcome::StaleAgent));
            continue;
        };
        let agent_pos = world
            .get::<AgentPosition>(entity)
            .map(|p| p.pos)
            .unwrap_or_default();
        let reach = world
            .get::<Agent>(entity)
            .map(|a| a.reach_distance)
            .unwrap_or(crate::agents::DEFAULT_REACH_DISTANCE);

        let (target, resource_name) = {
            let job = &world.resource::<MineJobs>().jobs[&agent_id];
            (job.target, job.resource_name.clone())
        };

        // 1. Resolve the deposit; absent or depleted ends the job.
        let resolved = resolve_resource(world, target, &resource_name);
        let Some((found_pos, deposit_entity)) = resolved else {
            finished.push((agent_id, MineOutcome::Failed("resource absent or depleted")));
            continue;
        };
        if world
            .get::<ResourceDeposit>(deposit_entity)
            .map(|d| d.amount == 0)
            .unwrap_or(true)
        {
            finished.push((agent_id, MineOutcome::Failed("resource absent or depleted")));
            continue;
        }

        // 2. First-tick initialization: products and the starting total.
        let needs_init = world.resource::<MineJobs>().jobs[&agent_id].products.is_none();
        if needs_init {
            let proto = world
                .resource::<PrototypeCatalog>()
                .entity(&resource_name)
                .cloned();
            let Some(proto) = proto else {
                finished.push((agent_id, MineOutcome::Failed("unknown resource prototype")));
                continue;
            };
            if proto.requires_fluid {
                finished.push((agent_id, MineOutcome::Failed("resource requires a fluid")));
                continue;
            }
            let product_names: Vec<String> =
                proto.minable_products.iter().map(|p| p.item.clone()).collect();
            let start_total = world
                .get::<AgentInventory>(entity)
                .map(|inv| inv.0.total_of(product_names.iter().map(String::as_str)))
                .unwrap_or(0);
            let mut jobs = world.resource_mut::<MineJobs>();
            let job = jobs.jobs.get_mut(&agent_id).unwrap();
            job.products = Some(product_names);
            job.start_total = Some(start_total);
            job.target = found_pos;
        } else {
            let mut jobs = world.resource_mut::<MineJobs>();
            jobs.jobs.get_mut(&agent_id).unwrap().target = found_pos;
        }

        // 3. Reach check.
        let reachable = agent_pos.distance(found_pos) <= reach + REACH_SLACK;
        if reachable {
            let (emulate, walking_started) = {
                let job = &world.resource::<MineJobs>().jobs[&agent_id];
                (job.emulate, job.walking_started)
            };
            if walking_started {
                super::walk::cancel_walk(world, agent_id);
                world
                    .resource_mut::<MineJobs>()
                    .jobs
                    .get_mut(&agent_id)
                    .unwrap()
                    .walking_started = false;
            }

            if emulate {
                // Hand the swing loop to the host; account the delta.
                if let Some(mut mining) = world.get_mut::<MiningState>(entity) {
                    if !mining.mining {
                        mining.mining = true;
                        mining.swing_ticks_left = 0;
                    }
                    if mining.resource_name.as_deref() != Some(&resource_name) {
                        // Selection changed (job replaced); restart the swing.
                        mining.resource_name = Some(resource_name.clone());
                        mining.swing_ticks_left = 0;
                    }
                    mining.position = Some(found_pos);
                }
                let (products, start_total) = {
                    let job = &world.resource::<MineJobs>().jobs[&agent_id];
                    (job.products.clone().unwrap_or_default(), job.start_total.unwrap_or(0))
                };
                let current_total = world
                    .get::<AgentInventory>(entity)
                    .map(|inv| inv.0.total_of(products.iter().map(String::as_str)))
                    .unwrap_or(0);
                let mut jobs = world.resource_mut::<MineJobs>();
                let job = jobs.jobs.get_mut(&agent_id).unwrap();
                job.mined_count = current_total.saturating_sub(start_total);
            } else {
                // Swing timer owned by the engine itself.
                let swing_ticks = world
                    .resource::<PrototypeCatalog>()
                    .entity(&resource_name)
                    .map(|p| (p.mining_time * 60.0).ceil() as u32)
                    .unwrap_or(60);
                let swing_done = {
                    let mut jobs = world.resource_mut::<MineJobs>();
                    let job = jobs.jobs.get_mut(&agent_id).unwrap();
                    let ticks = job.ticks_left.get_or_insert(swing_ticks);
                    *ticks = ticks.saturating_sub(1);
                    if *ticks == 0 {
                        job.ticks_left = None;
                        true
                    } else {
                        false
                    }
                };
                if swing_done {
                    let products = world
                        .resource::<PrototypeCatalog>()
                        .entity(&resource_name)
                        .map(|p| p.minable_products.clone())
                        .unwrap_or_default();
                    let mut accepted_total = 0;
                    world.resource_scope(|world, catalog: Mut<PrototypeCatalog>| {
                        let mut inventory =
                            world.get_mut::<AgentInventory>(entity).unwrap();
                        let mut overflow = Vec::new();
                        for product in &products {
                            let accepted =
                                inventory.0.insert(&product.item, product.count, &catalog);
                            accepted_total += accepted;
                            if accepted < product.count {
                                overflow.push((product.item.clone(), product.count - accepted));
                            }
                        }
                        let mut spills = world.resource_mut::<GroundSpills>();
                        for (item, count) in overflow {
                            spills.spill(agent_pos, &item, count);
                        }
                    });
                    let depleted = {
                        let mut deposit =
                            world.get_mut::<ResourceDeposit>(deposit_entity).unwrap();
                        deposit.amount = deposit.amount.saturating_sub(1);
                        deposit.amount == 0
                    };
                    if depleted {
                        let _ = remove_placed(world, found_pos, &resource_name);
                    }
                    let mut jobs = world.resource_mut::<MineJobs>();
                    let job = jobs.jobs.get_mut(&agent_id).unwrap();
                    job.mined_count += accepted_total;
                }
            }

            let (mined, min_count) = {
                let job = &world.resource::<MineJobs>().jobs[&agent_id];
                (job.mined_count, job.min_count)
            };
            if mined >= min_count {
                finished.push((agent_id, MineOutcome::Success));
            }
        } else {
            // Out of reach: optionally walk closer, otherwise give up.
            let walk_if_unreachable =
                world.resource::<MineJobs>().jobs[&agent_id].walk_if_unreachable;
            if !walk_if_unreachable {
                finished.push((agent_id, MineOutcome::Failed("resource out of reach")));
                continue;
            }
            stop_mining_substate(world, agent_id);
            let walk_live = world.resource::<super::walk::WalkJobs>().contains(agent_id);
            if !walk_live {
                let params = super::walk::WalkParams {
                    goal: found_pos,
                    arrive_radius: 1.2,
                    max_replans: 2,
                    ..Default::default()
                };
                if super::walk::start_walk(world, agent_id, params, false).is_ok() {
                    let mut jobs = world.resource_mut::<MineJobs>();
                    jobs.jobs.get_mut(&agent_id).unwrap().walking_started = true;
                }
            }
        }
    }

    for (agent_id, outcome) in finished {
        let Some(job) = world.resource_mut::<MineJobs>().jobs.remove(&agent_id) else {
            continue;
        };
        stop_mining_substate(world, agent_id);
        if job.walking_started {
            super::walk::cancel_walk(world, agent_id);
        }
        match outcome {
            MineOutcome::StaleAgent => {
                debug!("⛏️ mine job for stale agent {} pruned", agent_id);
            }
            MineOutcome::Success => {
                world.send_event(ActionCompletedEvent {
                    action_id: job.action_id.clone(),
                    agent_id,
                    action_type: "mine_resource".to_string(),
                    rcon_tick: job.rcon_tick,
                    success: true,
                    cancelled: None,
                    result: serde_json::json!({
                        "mined": job.mined_count,
                        "resource_name": job.resource_name,
                    }),
                });
            }
            MineOutcome::Failed(reason) => {
                world.send_event(ActionCompletedEvent {
                    action_id: job.action_id.clone(),
                    agent_id,
                    action_type: "mine_resource".to_string(),
                    rcon_tick: job.rcon_tick,
                    success: false,
                    cancelled: None,
                    result: serde_json::json!({
                        "mined": job.mined_count,
                        "resource_name": job.resource_name,
                        "reason": reason,
                    }),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_are_exclusive_per_agent() {
        let mut jobs = MineJobs::default();
        jobs.jobs.insert(
            1,
            MineJob {
                agent_id: 1,
                action_id: "mine_1_1".into(),
                rcon_tick: 1,
                target: Vec2::new(2.0, 0.0),
                resource_name: "iron-ore".into(),
                min_count: 5,
                mined_count: 0,
                products: None,
                start_total: None,
                walking_started: false,
                walk_if_unreachable: true,
                emulate: true,
                ticks_left: None,
            },
        );
        // Replacement overwrites; the arena holds at most one job per agent.
        jobs.jobs.insert(
            1,
            MineJob {
                action_id: "mine_2_1".into(),
                ..jobs.jobs[&1].clone()
            },
        );
        assert_eq!(jobs.jobs.len(), 1);
        assert_eq!(jobs.get(1).unwrap().action_id, "mine_2_1");
    }
}
