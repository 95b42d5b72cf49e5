/// Agent lifecycle and the raw walking command.
use bevy::math::Vec2;
use bevy::prelude::*;
use serde_json::json;

use crate::agents::{despawn_agent, resolve_agent, spawn_agent, Agent, WalkingState};
use crate::errors::{ActionError, ActionResult};
use crate::params::{ParamInstance, ParamKind, ParamSpec};
use crate::types::Direction;

use super::registry::{ActionSpec, RunOutput};

pub fn actions() -> Vec<Box<dyn ActionSpec>> {
    vec![
        Box::new(AgentSpawn),
        Box::new(AgentDespawn),
        Box::new(AgentWalk),
        Box::new(AgentState),
    ]
}

struct AgentSpawn;

impl ActionSpec for AgentSpawn {
    fn name(&self) -> &'static str {
        "agent.spawn"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .optional("position", ParamKind::Position, json!({"x": 0.0, "y": 0.0}))
            .opt("reach_distance", ParamKind::Number)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let position = params.get_position("position")?;
        let entity = spawn_agent(world, agent_id, position)?;
        if let Some(reach) = params.opt_f32("reach_distance")? {
            if let Some(mut agent) = world.get_mut::<Agent>(entity) {
                agent.reach_distance = reach;
            }
        }
        Ok(RunOutput::sync(json!({
            "agent_id": agent_id,
            "position": {"x": position.x, "y": position.y},
        }))
        .with_agent(agent_id))
    }
}

struct AgentDespawn;

impl ActionSpec for AgentDespawn {
    fn name(&self) -> &'static str {
        "agent.despawn"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new().required("agent_id", ParamKind::Number)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        // Jobs notice the stale id next tick anyway; pruning here keeps the
        // arenas tidy without waiting.
        world
            .resource_mut::<crate::jobs::WalkJobs>()
            .jobs
            .remove(&agent_id);
        world
            .resource_mut::<crate::jobs::MineJobs>()
            .jobs
            .remove(&agent_id);
        world
            .resource_mut::<crate::jobs::CraftTrackings>()
            .by_agent
            .remove(&agent_id);
        despawn_agent(world, agent_id)?;
        Ok(RunOutput::sync(json!({ "agent_id": agent_id })).with_agent(agent_id))
    }
}

/// Raw walking command: set the walking sub-state directly, optionally
/// bounded to a number of ticks. No pathfinding involved.
struct AgentWalk;

impl ActionSpec for AgentWalk {
    fn name(&self) -> &'static str {
        "agent.walk"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("direction", ParamKind::String)
            .optional("walking", ParamKind::Boolean, json!(true))
            .opt("ticks", ParamKind::Number)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let direction_name = params.get_str("direction")?;
        let direction = Direction::from_name(direction_name).ok_or_else(|| {
            ActionError::validation(
                "BAD_DIRECTION",
                format!("'{}' is not a compass direction", direction_name),
            )
        })?;
        let walking = params.get_bool("walking")?;
        let ticks = params.opt_u32("ticks")?;

        let entity = resolve_agent(world, agent_id)?;
        let mut state = world.get_mut::<WalkingState>(entity).ok_or_else(|| {
            ActionError::agent("AGENT_NOT_CHARACTER", "agent has no walking state")
        })?;
        state.walking = walking;
        state.direction = direction;
        state.ticks_left = if walking { ticks } else { None };

        let pos = world
            .get::<crate::agents::AgentPosition>(entity)
            .map(|p| p.pos)
            .unwrap_or(Vec2::ZERO);
        Ok(RunOutput::sync(json!({
            "agent_id": agent_id,
            "walking": walking,
            "direction": direction.name(),
            "position": {"x": pos.x, "y": pos.y},
        }))
        .with_agent(agent_id))
    }
}

/// Read-only agent query over the game-state facade: position, sub-states,
/// inventory contents and the charted-chunk count.
struct AgentState;

impl ActionSpec for AgentState {
    fn name(&self) -> &'static str {
        "agent.state"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new().required("agent_id", ParamKind::Number)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let state = crate::world::GameState::new(world);
        let position = state.agent_position(agent_id)?;
        let entity = state.agent(agent_id)?;
        let charted = state.charted_chunks(false).len();

        let walking = world
            .get::<WalkingState>(entity)
            .map(|w| json!({"walking": w.walking, "direction": w.direction.name()}))
            .unwrap_or(serde_json::Value::Null);
        let mining = world
            .get::<crate::agents::MiningState>(entity)
            .map(|m| m.mining)
            .unwrap_or(false);
        let craft_queue = world
            .get::<crate::agents::CraftQueue>(entity)
            .map(|q| q.queue_size())
            .unwrap_or(0);
        let inventory = world
            .get::<crate::agents::AgentInventory>(entity)
            .map(|inv| serde_json::to_value(inv.0.contents()).unwrap_or_default())
            .unwrap_or_default();

        Ok(RunOutput::sync(json!({
            "agent_id": agent_id,
            "position": {"x": position.x, "y": position.y},
            "walking_state": walking,
            "mining": mining,
            "craft_queue_size": craft_queue,
            "inventory": inventory,
            "charted_chunks": charted,
        }))
        .with_agent(agent_id))
    }
}
