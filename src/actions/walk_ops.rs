/// Path-following walk intents, routed to the walk job engine.
use bevy::prelude::*;
use serde_json::json;

use crate::errors::ActionResult;
use crate::jobs::walk::{cancel_walk, start_walk, WalkParams};
use crate::params::{ParamInstance, ParamKind, ParamSpec};
use crate::transport::ActionCompletedEvent;

use super::registry::{ActionSpec, RunOutput};

pub fn actions() -> Vec<Box<dyn ActionSpec>> {
    vec![Box::new(AgentWalkTo), Box::new(AgentWalkToCancel)]
}

struct AgentWalkTo;

impl ActionSpec for AgentWalkTo {
    fn name(&self) -> &'static str {
        "agent.walk_to"
    }

    fn param_spec(&self) -> ParamSpec {
        let defaults = WalkParams::default();
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("goal", ParamKind::Position)
            .optional("arrive_radius", ParamKind::Number, json!(defaults.arrive_radius))
            .optional("lookahead", ParamKind::Number, json!(defaults.lookahead))
            .optional(
                "replan_on_stuck",
                ParamKind::Boolean,
                json!(defaults.replan_on_stuck),
            )
            .optional("max_replans", ParamKind::Number, json!(defaults.max_replans))
            .optional(
                "prefer_cardinal",
                ParamKind::Boolean,
                json!(defaults.prefer_cardinal),
            )
            .optional("diag_band", ParamKind::Number, json!(defaults.diag_band))
            .optional(
                "snap_axis_eps",
                ParamKind::Number,
                json!(defaults.snap_axis_eps),
            )
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let goal = params.get_position("goal")?;
        let walk_params = WalkParams {
            goal,
            arrive_radius: params.get_f32("arrive_radius")?,
            lookahead: params.get_f32("lookahead")?,
            replan_on_stuck: params.get_bool("replan_on_stuck")?,
            max_replans: params.get_u32("max_replans")?,
            prefer_cardinal: params.get_bool("prefer_cardinal")?,
            diag_band: params.get_f32("diag_band")?,
            snap_axis_eps: params.get_f32("snap_axis_eps")?,
        };
        let action_id = start_walk(world, agent_id, walk_params, true)?;
        Ok(RunOutput::queued(
            action_id,
            json!({ "goal": {"x": goal.x, "y": goal.y} }),
        )
        .with_agent(agent_id))
    }
}

/// Cancel the agent's walk job. Cancelling when no job is live is a no-op.
struct AgentWalkToCancel;

impl ActionSpec for AgentWalkToCancel {
    fn name(&self) -> &'static str {
        "agent.walk_to.cancel"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new().required("agent_id", ParamKind::Number)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let job = world
            .resource::<crate::jobs::WalkJobs>()
            .get(agent_id)
            .map(|j| (j.action_id.clone(), j.rcon_tick, j.notify_completion));
        let cancelled = cancel_walk(world, agent_id);
        if cancelled {
            if let Some((action_id, rcon_tick, notify)) = job {
                if notify {
                    world.send_event(ActionCompletedEvent {
                        action_id,
                        agent_id,
                        action_type: "agent.walk_to".to_string(),
                        rcon_tick,
                        success: false,
                        cancelled: Some(true),
                        result: json!({ "state": "cancelled" }),
                    });
                }
            }
        }
        Ok(RunOutput::sync(json!({ "cancelled": cancelled })).with_agent(agent_id))
    }
}
