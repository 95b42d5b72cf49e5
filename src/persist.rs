//! Persistence: queue and job arenas serialized into the host's store.
//!
//! The persisted state is a pure serialization of the arenas; restoring it
//! reinstates the queue and re-issues path requests for walk jobs that were
//! mid-plan. The load path never writes.

use std::collections::BTreeMap;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::actions::{ActionQueue, SavedQueue};
use crate::jobs::{CraftTracking, MineJob, WalkJob};
use crate::simulation::{should_tick, SimulationSet, SimulationTick};
use crate::types::AgentId;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub tick: u64,
    pub queue: SavedQueue,
    pub walk_jobs: BTreeMap<AgentId, WalkJob>,
    pub mine_jobs: BTreeMap<AgentId, MineJob>,
    pub craft_tracking: BTreeMap<AgentId, CraftTracking>,
}

/// Capture the current arenas.
pub fn capture_state(world: &World) -> PersistedState {
    PersistedState {
        tick: world.resource::<SimulationTick>().get(),
        queue: world.resource::<ActionQueue>().to_saved(),
        walk_jobs: world.resource::<crate::jobs::WalkJobs>().jobs.clone(),
        mine_jobs: world.resource::<crate::jobs::MineJobs>().jobs.clone(),
        craft_tracking: world
            .resource::<crate::jobs::CraftTrackings>()
            .by_agent
            .clone(),
    }
}

/// Reinstate a persisted state. Walk jobs come back in `Planning` with a
/// fresh path request; their correlation ids are process-local and never
/// survive a reload.
pub fn restore_state(world: &mut World, state: PersistedState) {
    world.resource_mut::<SimulationTick>().set(state.tick);
    world.resource_mut::<ActionQueue>().restore(state.queue);

    let tick = state.tick;
    for (agent_id, mut job) in state.walk_jobs {
        job.state = crate::jobs::WalkState::Planning;
        job.current_dir = None;
        job.req_id = None;
        if let Ok(entity) = crate::agents::resolve_agent(world, agent_id) {
            let from = world
                .get::<crate::agents::AgentPosition>(entity)
                .map(|p| p.pos)
                .unwrap_or_default();
            let req_id = world
                .resource_mut::<crate::pathfinding::PathfindingQueue>()
                .request(
                    agent_id,
                    crate::types::tile_of(from),
                    crate::types::tile_of(job.goal),
                    tick,
                );
            job.req_id = Some(req_id);
        }
        world.resource_mut::<crate::jobs::WalkJobs>().jobs.insert(agent_id, job);
    }
    world.resource_mut::<crate::jobs::MineJobs>().jobs = state.mine_jobs;
    world.resource_mut::<crate::jobs::CraftTrackings>().by_agent = state.craft_tracking;
}

pub fn write_save(world: &World, path: &Path) -> std::io::Result<()> {
    let state = capture_state(world);
    let text = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::default())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

pub fn read_save(path: &Path) -> Option<PersistedState> {
    let text = std::fs::read_to_string(path).ok()?;
    match ron::from_str(&text) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("persisted state at {:?} unreadable: {}", path, e);
            None
        }
    }
}

/// Startup: reinstate the persisted store if one exists.
pub fn restore_on_startup(world: &mut World) {
    let path = world
        .resource::<crate::config::RuntimeConfig>()
        .save_path
        .clone();
    if let Some(state) = read_save(&path) {
        info!(
            "💾 restoring persisted state from {:?} (tick {}, {} queued)",
            path,
            state.tick,
            state.queue.items.len()
        );
        restore_state(world, state);
    }
}

/// Cadenced autosave. Runs in the cleanup phase; disabled when the cadence
/// is zero.
pub fn autosave_tick(world: &mut World) {
    let (every, path) = {
        let config = world.resource::<crate::config::RuntimeConfig>();
        (config.autosave_every, config.save_path.clone())
    };
    if every == 0 {
        return;
    }
    let tick = world.resource::<SimulationTick>().get();
    if tick == 0 || tick % every != 0 {
        return;
    }
    if let Err(e) = write_save(world, &path) {
        warn!("autosave to {:?} failed: {}", path, e);
    } else {
        debug!("💾 autosaved at tick {}", tick);
    }
}

pub struct PersistPlugin;

impl Plugin for PersistPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, restore_on_startup.after(crate::actions::load_registry))
            .add_systems(
                Update,
                autosave_tick
                    .in_set(SimulationSet::Cleanup)
                    .run_if(should_tick),
            );
    }
}
