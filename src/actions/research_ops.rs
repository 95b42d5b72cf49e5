/// Force research selection.
use bevy::prelude::*;
use serde_json::json;

use crate::errors::{ActionError, ActionResult};
use crate::params::{ParamInstance, ParamKind, ParamSpec};
use crate::world::ForceState;

use super::registry::{ActionSpec, RunOutput};

pub fn actions() -> Vec<Box<dyn ActionSpec>> {
    vec![Box::new(ResearchStart)]
}

struct ResearchStart;

impl ActionSpec for ResearchStart {
    fn name(&self) -> &'static str {
        "force.research.start"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new().required("technology", ParamKind::String)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let technology = params.get_str("technology")?.to_string();

        let prerequisites = {
            let catalog = world.resource::<crate::world::PrototypeCatalog>();
            let tech = catalog.technology(&technology).ok_or_else(|| {
                ActionError::validation(
                    "UNKNOWN_TECHNOLOGY",
                    format!("'{}' is not a known technology", technology),
                )
            })?;
            tech.prerequisites.clone()
        };

        let mut force = world.resource_mut::<ForceState>();
        if force.researched.contains(&technology) {
            return Err(ActionError::logical(
                "ALREADY_RESEARCHED",
                format!("'{}' is already researched", technology),
            ));
        }
        for prerequisite in &prerequisites {
            if !force.researched.contains(prerequisite) {
                return Err(ActionError::logical(
                    "PREREQUISITE_MISSING",
                    format!("'{}' requires '{}'", technology, prerequisite),
                ));
            }
        }
        force.current_research = Some(technology.clone());
        force.research_progress = 0.0;

        Ok(RunOutput::sync(json!({ "technology": technology })))
    }
}
