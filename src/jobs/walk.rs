/// Walk job engine: path request plus waypoint follower with hysteresis,
/// stuck detection and bounded replans.
///
/// One job per agent; starting a new walk replaces the previous one.
/// Pending path responses correlate by request id, so a response arriving
/// after its job is gone (or after the job replanned) is dropped, which
/// also makes duplicate deliveries idempotent.
use std::collections::BTreeMap;

use bevy::math::Vec2;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::agents::{resolve_agent, AgentPosition, WalkingState};
use crate::pathfinding::{PathRequestId, PathResponseEvent, PathResult, PathfindingQueue};
use crate::simulation::{SimulationTick, TickStamp};
use crate::transport::ActionCompletedEvent;
use crate::types::{tile_of, AgentId, Direction};

/// Waypoint advance radius in tiles.
const DEFAULT_LOOKAHEAD: f32 = 0.8;
/// Minimum per-tick shrink of the goal distance that counts as progress.
const PROGRESS_EPSILON: f32 = 0.05;
/// Ticks without progress before a replan (or failure) triggers.
const STALL_TICKS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkState {
    Planning,
    Following,
    Arrived,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkJob {
    pub agent_id: AgentId,
    pub action_id: String,
    pub rcon_tick: u64,
    pub goal: Vec2,
    pub arrive_radius: f32,
    pub lookahead: f32,
    pub waypoints: Vec<Vec2>,
    pub wp_index: usize,
    /// Current commanded octant, kept for hysteresis.
    pub current_dir: Option<u8>,
    pub last_goal_dist: f32,
    pub no_progress_ticks: u32,
    pub replans: u32,
    pub max_replans: u32,
    pub replan_on_stuck: bool,
    #[serde(skip)]
    pub req_id: Option<PathRequestId>,
    pub state: WalkState,
    pub prefer_cardinal: bool,
    pub diag_band: f32,
    pub snap_axis_eps: f32,
    /// Internal jobs (started by the mine engine) skip the completion
    /// datagram.
    pub notify_completion: bool,
}

/// Tunables accepted by `agent.walk_to`.
#[derive(Debug, Clone)]
pub struct WalkParams {
    pub goal: Vec2,
    pub arrive_radius: f32,
    pub lookahead: f32,
    pub replan_on_stuck: bool,
    pub max_replans: u32,
    pub prefer_cardinal: bool,
    pub diag_band: f32,
    pub snap_axis_eps: f32,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            goal: Vec2::ZERO,
            arrive_radius: 0.7,
            lookahead: DEFAULT_LOOKAHEAD,
            replan_on_stuck: true,
            max_replans: 3,
            prefer_cardinal: true,
            diag_band: 0.25,
            snap_axis_eps: 0.15,
        }
    }
}

/// Arena of walk jobs, one per agent, iterated in agent-id order.
#[derive(Resource, Debug, Default)]
pub struct WalkJobs {
    pub jobs: BTreeMap<AgentId, WalkJob>,
    pub(crate) stamp: TickStamp,
}

impl WalkJobs {
    pub fn get(&self, agent_id: AgentId) -> Option<&WalkJob> {
        self.jobs.get(&agent_id)
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.jobs.contains_key(&agent_id)
    }
}

/// Start (or replace) a walk job for `agent_id` and issue its path request.
/// Returns the job's action id.
pub fn start_walk(
    world: &mut World,
    agent_id: AgentId,
    params: WalkParams,
    notify_completion: bool,
) -> crate::errors::ActionResult<String> {
    let entity = resolve_agent(world, agent_id)?;
    let from = world
        .get::<AgentPosition>(entity)
        .map(|p| p.pos)
        .unwrap_or_default();
    let tick = world.resource::<SimulationTick>().get();
    let action_id = crate::errors::action_id("walk", tick, agent_id);

    let req_id = world.resource_mut::<PathfindingQueue>().request(
        agent_id,
        tile_of(from),
        tile_of(params.goal),
        tick,
    );

    let job = WalkJob {
        agent_id,
        action_id: action_id.clone(),
        rcon_tick: tick,
        goal: params.goal,
        arrive_radius: params.arrive_radius,
        lookahead: params.lookahead,
        waypoints: Vec::new(),
        wp_index: 0,
        current_dir: None,
        last_goal_dist: f32::MAX,
        no_progress_ticks: 0,
        replans: 0,
        max_replans: params.max_replans,
        replan_on_stuck: params.replan_on_stuck,
        req_id: Some(req_id),
        state: WalkState::Planning,
        prefer_cardinal: params.prefer_cardinal,
        diag_band: params.diag_band,
        snap_axis_eps: params.snap_axis_eps,
        notify_completion,
    };
    world.resource_mut::<WalkJobs>().jobs.insert(agent_id, job);
    debug!(
        "🚶 walk job for agent {} → ({}, {}), req {}",
        agent_id,
        params.goal.x,
        params.goal.y,
        req_id.as_u64()
    );
    Ok(action_id)
}

/// Remove the agent's walk job. Walking stops on the next tick boundary;
/// a still-pending path response will find no matching job and be dropped.
pub fn cancel_walk(world: &mut World, agent_id: AgentId) -> bool {
    let removed = world.resource_mut::<WalkJobs>().jobs.remove(&agent_id);
    if removed.is_some() {
        if let Ok(entity) = resolve_agent(world, agent_id) {
            if let Some(mut walking) = world.get_mut::<WalkingState>(entity) {
                walking.walking = false;
                walking.ticks_left = None;
            }
        }
        true
    } else {
        false
    }
}

// ============================================================================
// OCTANT SELECTION
// ============================================================================

/// Pure-angle octant: `floor(((atan2(dy,dx) + pi/8) mod 2pi) / (pi/4))`.
pub fn octant_pure_angle(delta: Vec2) -> u8 {
    use std::f32::consts::PI;
    let angle = (delta.y.atan2(delta.x) + PI / 8.0).rem_euclid(2.0 * PI);
    ((angle / (PI / 4.0)) as u8) % 8
}

/// Manhattan-biased octant: command a cardinal when one axis dominates by
/// more than `(1 + diag_band)`, snap to the axis when within
/// `snap_axis_eps` of it, diagonal otherwise.
pub fn octant_manhattan(delta: Vec2, diag_band: f32, snap_axis_eps: f32) -> u8 {
    let adx = delta.x.abs();
    let ady = delta.y.abs();
    let east_west = if delta.x >= 0.0 { 0 } else { 4 };
    let north_south = if delta.y >= 0.0 { 2 } else { 6 };

    if ady <= snap_axis_eps {
        return east_west;
    }
    if adx <= snap_axis_eps {
        return north_south;
    }
    if adx > (1.0 + diag_band) * ady {
        return east_west;
    }
    if ady > (1.0 + diag_band) * adx {
        return north_south;
    }
    match (delta.x >= 0.0, delta.y >= 0.0) {
        (true, true) => 1,   // NE
        (false, true) => 3,  // NW
        (false, false) => 5, // SW
        (true, false) => 7,  // SE
    }
}

/// Single-step hysteresis: stick with the current octant when the desired
/// one is only one step away.
pub fn apply_hysteresis(current: Option<u8>, desired: u8) -> u8 {
    match current {
        Some(current) => {
            let diff = (desired + 8 - current) % 8;
            if diff == 1 || diff == 7 {
                current
            } else {
                desired
            }
        }
        None => desired,
    }
}

// ============================================================================
// TICK SYSTEMS
// ============================================================================

/// Consume path responses and transition matching jobs out of `Planning`.
/// Responses with no matching request id are dropped.
pub fn apply_path_responses(
    mut jobs: ResMut<WalkJobs>,
    mut responses: EventReader<PathResponseEvent>,
) {
    for response in responses.read() {
        let Some(job) = jobs.jobs.get_mut(&response.agent_id) else {
            debug!(
                "🗺️ dropping path response {} (no job)",
                response.req_id.as_u64()
            );
            continue;
        };
        if job.req_id != Some(response.req_id) {
            debug!(
                "🗺️ dropping stale path response {} for agent {}",
                response.req_id.as_u64(),
                response.agent_id
            );
            continue;
        }
        job.req_id = None;

        match &response.result {
            PathResult::Success { waypoints } => {
                job.waypoints = waypoints.clone();
                job.wp_index = 0;
                job.state = WalkState::Following;
                job.last_goal_dist = f32::MAX;
                job.no_progress_ticks = 0;
            }
            PathResult::Failed { .. } => {
                if job.replan_on_stuck {
                    // Greedy fallback: follow the goal directly.
                    job.waypoints.clear();
                    job.wp_index = 0;
                    job.state = WalkState::Following;
                    job.last_goal_dist = f32::MAX;
                    job.no_progress_ticks = 0;
                } else {
                    job.state = WalkState::Failed;
                }
            }
        }
    }
}

enum Outcome {
    Arrived,
    Failed(&'static str),
    StaleAgent,
}

/// Per-tick follower for every walk job.
pub fn walk_jobs_tick(world: &mut World) {
    let tick = world.resource::<SimulationTick>().get();
    if !world.resource_mut::<WalkJobs>().stamp.mark(tick) {
        return;
    }

    let agent_ids: Vec<AgentId> =
        world.resource::<WalkJobs>().jobs.keys().copied().collect();
    let mut finished: Vec<(AgentId, Outcome)> = Vec::new();

    for agent_id in agent_ids {
        let Ok(entity) = resolve_agent(world, agent_id) else {
            finished.push((agent_id, Outcome::StaleAgent));
            continue;
        };
        let pos = world
            .get::<AgentPosition>(entity)
            .map(|p| p.pos)
            .unwrap_or_default();

        // Failed may have been set by the response handler this tick.
        let state = world.resource::<WalkJobs>().jobs[&agent_id].state;
        match state {
            WalkState::Planning => continue,
            WalkState::Failed => {
                finished.push((agent_id, Outcome::Failed("no path to goal")));
                continue;
            }
            WalkState::Arrived => {
                finished.push((agent_id, Outcome::Arrived));
                continue;
            }
            WalkState::Following => {}
        }

        let mut command: Option<Direction> = None;
        let mut needs_replan = false;
        {
            let mut jobs = world.resource_mut::<WalkJobs>();
            let job = jobs.jobs.get_mut(&agent_id).unwrap();

            let goal_dist = pos.distance(job.goal);
            if goal_dist <= job.arrive_radius {
                job.state = WalkState::Arrived;
                finished.push((agent_id, Outcome::Arrived));
                continue;
            }

            // Advance past waypoints already within the lookahead radius.
            while job.wp_index < job.waypoints.len()
                && pos.distance(job.waypoints[job.wp_index]) <= job.lookahead
            {
                job.wp_index += 1;
            }
            let target = job
                .waypoints
                .get(job.wp_index)
                .copied()
                .unwrap_or(job.goal);

            let delta = target - pos;
            let desired = if job.prefer_cardinal {
                octant_manhattan(delta, job.diag_band, job.snap_axis_eps)
            } else {
                octant_pure_angle(delta)
            };
            let chosen = apply_hysteresis(job.current_dir, desired);
            job.current_dir = Some(chosen);
            command = Some(Direction::from_octant(chosen));

            // Stuck detection: the goal distance must keep shrinking.
            if job.last_goal_dist - goal_dist >= PROGRESS_EPSILON {
                job.last_goal_dist = goal_dist;
                job.no_progress_ticks = 0;
            } else {
                job.no_progress_ticks += 1;
            }

            if job.no_progress_ticks >= STALL_TICKS {
                if job.replans < job.max_replans {
                    job.replans += 1;
                    job.state = WalkState::Planning;
                    job.no_progress_ticks = 0;
                    job.last_goal_dist = f32::MAX;
                    job.current_dir = None;
                    needs_replan = true;
                    command = None;
                } else {
                    job.state = WalkState::Failed;
                    finished.push((agent_id, Outcome::Failed("stuck after max replans")));
                    command = None;
                }
            }
        }

        if needs_replan {
            let goal = world.resource::<WalkJobs>().jobs[&agent_id].goal;
            let req_id = world.resource_mut::<PathfindingQueue>().request(
                agent_id,
                tile_of(pos),
                tile_of(goal),
                tick,
            );
            let mut jobs = world.resource_mut::<WalkJobs>();
            if let Some(job) = jobs.jobs.get_mut(&agent_id) {
                job.req_id = Some(req_id);
            }
            debug!("🔁 agent {} replanning (req {})", agent_id, req_id.as_u64());
        }

        if let Some(mut walking) = world.get_mut::<WalkingState>(entity) {
            match command {
                Some(direction) => {
                    walking.walking = true;
                    walking.direction = direction;
                    walking.ticks_left = None;
                }
                None => {
                    walking.walking = false;
                }
            }
        }
    }

    for (agent_id, outcome) in finished {
        let Some(job) = world.resource_mut::<WalkJobs>().jobs.remove(&agent_id) else {
            continue;
        };
        // Arrival leaves the actor facing its last commanded direction.
        if let Ok(entity) = resolve_agent(world, agent_id) {
            if let Some(mut walking) = world.get_mut::<WalkingState>(entity) {
                walking.walking = false;
                if let Some(octant) = job.current_dir {
                    walking.direction = Direction::from_octant(octant);
                }
            }
        }
        match outcome {
            Outcome::StaleAgent => {
                debug!("🚶 walk job for stale agent {} pruned", agent_id);
            }
            Outcome::Arrived | Outcome::Failed(_) if !job.notify_completion => {}
            Outcome::Arrived => {
                let final_pos = resolve_agent(world, agent_id)
                    .ok()
                    .and_then(|e| world.get::<AgentPosition>(e).map(|p| p.pos))
                    .unwrap_or(job.goal);
                world.send_event(ActionCompletedEvent {
                    action_id: job.action_id.clone(),
                    agent_id,
                    action_type: "agent.walk_to".to_string(),
                    rcon_tick: job.rcon_tick,
                    success: true,
                    cancelled: None,
                    result: serde_json::json!({
                        "state": "arrived",
                        "position": {"x": final_pos.x, "y": final_pos.y},
                        "replans": job.replans,
                    }),
                });
            }
            Outcome::Failed(reason) => {
                world.send_event(ActionCompletedEvent {
                    action_id: job.action_id.clone(),
                    agent_id,
                    action_type: "agent.walk_to".to_string(),
                    rcon_tick: job.rcon_tick,
                    success: false,
                    cancelled: None,
                    result: serde_json::json!({
                        "state": "failed",
                        "reason": reason,
                        "replans": job.replans,
                    }),
                });
            }
        }
    }
}
