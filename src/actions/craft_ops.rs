/// Hand-crafting intents, routed to the craft tracker.
use bevy::prelude::*;
use serde_json::json;

use crate::errors::ActionResult;
use crate::jobs::craft::{cancel_craft, enqueue_craft};
use crate::params::{ParamInstance, ParamKind, ParamSpec};

use super::registry::{ActionSpec, RunOutput};

pub fn actions() -> Vec<Box<dyn ActionSpec>> {
    vec![Box::new(CraftingEnqueue), Box::new(CraftingCancel)]
}

struct CraftingEnqueue;

impl ActionSpec for CraftingEnqueue {
    fn name(&self) -> &'static str {
        "agent.crafting.enqueue"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("recipe", ParamKind::Recipe)
            .optional("count", ParamKind::Number, json!(1))
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let recipe = params.get_str("recipe")?;
        let count = params.get_u32("count")?;
        let (action_id, count_queued) = enqueue_craft(world, agent_id, recipe, count)?;
        Ok(RunOutput::queued(
            action_id,
            json!({
                "recipe": recipe,
                "count_requested": count,
                "count_queued": count_queued,
            }),
        )
        .with_agent(agent_id))
    }
}

struct CraftingCancel;

impl ActionSpec for CraftingCancel {
    fn name(&self) -> &'static str {
        "agent.crafting.cancel"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("recipe", ParamKind::Recipe)
            .opt("count", ParamKind::Number)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let recipe = params.get_str("recipe")?;
        let count = params.opt_u32("count")?;
        let data = cancel_craft(world, agent_id, recipe, count)?;
        Ok(RunOutput::sync(data).with_agent(agent_id))
    }
}
