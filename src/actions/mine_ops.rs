/// Mining intents, routed to the mine job engine.
use bevy::math::Vec2;
use bevy::prelude::*;
use serde_json::json;

use crate::errors::{ActionError, ActionResult};
use crate::jobs::mine::{cancel_mine, start_mine};
use crate::params::{ParamInstance, ParamKind, ParamSpec};

use super::registry::{ActionSpec, RunOutput};

pub fn actions() -> Vec<Box<dyn ActionSpec>> {
    vec![Box::new(MineResource), Box::new(MineResourceCancel)]
}

struct MineResource;

impl ActionSpec for MineResource {
    fn name(&self) -> &'static str {
        "mine_resource"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("agent_id", ParamKind::Number)
            .required("x", ParamKind::Number)
            .required("y", ParamKind::Number)
            .required("resource_name", ParamKind::EntityName)
            .optional("min_count", ParamKind::Number, json!(1))
            .optional("walk_if_unreachable", ParamKind::Boolean, json!(true))
            .optional("emulate", ParamKind::Boolean, json!(true))
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let target = Vec2::new(params.get_f32("x")?, params.get_f32("y")?);
        let resource_name = params.get_str("resource_name")?;

        // Hand-mining needs a minable prototype with solid products.
        {
            let catalog = world.resource::<crate::world::PrototypeCatalog>();
            let proto = catalog.entity(resource_name).ok_or_else(|| {
                ActionError::validation("UNKNOWN_ENTITY", resource_name)
            })?;
            if proto.minable_products.is_empty() {
                return Err(ActionError::validation(
                    "NOT_MINABLE",
                    format!("'{}' yields no products", resource_name),
                ));
            }
        }

        let action_id = start_mine(
            world,
            agent_id,
            target,
            resource_name,
            params.get_u32("min_count")?,
            params.get_bool("walk_if_unreachable")?,
            params.get_bool("emulate")?,
        )?;
        Ok(RunOutput::queued(
            action_id,
            json!({
                "resource_name": resource_name,
                "target": {"x": target.x, "y": target.y},
            }),
        )
        .with_agent(agent_id))
    }
}

/// Cancel the agent's mine job. Cancelling a finished mine is a no-op.
struct MineResourceCancel;

impl ActionSpec for MineResourceCancel {
    fn name(&self) -> &'static str {
        "mine_resource.cancel"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new().required("agent_id", ParamKind::Number)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let cancelled = cancel_mine(world, agent_id);
        Ok(RunOutput::sync(json!({ "cancelled": cancelled })).with_agent(agent_id))
    }
}
