/// Validator registry: named predicate chains attached to actions.
///
/// Keys are exact action names or trailing-glob patterns (`"agent.*"`).
/// `get_validations` returns explicit-name matches first, then glob matches,
/// each group in registration order; the invoker stops at the first failure.
use std::sync::Arc;

use bevy::prelude::*;

use crate::errors::{ActionError, ActionResult};
use crate::params::ParamInstance;

pub type ValidatorFn =
    dyn Fn(&ParamInstance, &World) -> ActionResult<()> + Send + Sync + 'static;

#[derive(Clone)]
pub struct Validator {
    pub name: &'static str,
    pub check: Arc<ValidatorFn>,
}

impl Validator {
    pub fn new<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&ParamInstance, &World) -> ActionResult<()> + Send + Sync + 'static,
    {
        Self {
            name,
            check: Arc::new(check),
        }
    }
}

#[derive(Default)]
pub struct ValidatorRegistry {
    entries: Vec<(String, Validator)>,
}

impl ValidatorRegistry {
    /// Append a validator under an action name or glob key.
    pub fn register<K: Into<String>>(&mut self, key: K, validator: Validator) {
        self.entries.push((key.into(), validator));
    }

    fn key_matches(key: &str, action: &str) -> bool {
        if let Some(prefix) = key.strip_suffix(".*") {
            action.starts_with(prefix)
                && action.len() > prefix.len()
                && action.as_bytes()[prefix.len()] == b'.'
        } else {
            key == action
        }
    }

    /// All validators applying to `action`: exact matches, then globs,
    /// preserving registration order within each group.
    pub fn get_validations(&self, action: &str) -> Vec<Validator> {
        let mut out = Vec::new();
        for (key, validator) in &self.entries {
            if key == action {
                out.push(validator.clone());
            }
        }
        for (key, validator) in &self.entries {
            if key != action && Self::key_matches(key, action) {
                out.push(validator.clone());
            }
        }
        out
    }
}

/// Run a validator chain; the first failure wins.
pub fn run_validators(
    validators: &[Validator],
    params: &ParamInstance,
    world: &World,
) -> ActionResult<()> {
    for validator in validators {
        if let Err(err) = (validator.check)(params, world) {
            debug!("🚫 Validator '{}' rejected: {}", validator.name, err);
            return Err(err);
        }
    }
    Ok(())
}

// ============================================================================
// BUILT-IN VALIDATORS
// ============================================================================

/// The acting agent must resolve to a live character.
pub fn agent_exists() -> Validator {
    Validator::new("agent_exists", |params, world| {
        let agent_id = params.get_u32("agent_id")?;
        crate::agents::resolve_agent(world, agent_id).map(|_| ())
    })
}

/// `items` must contain at least one stack.
pub fn items_not_empty() -> Validator {
    Validator::new("items_not_empty", |params, world| {
        let _ = world;
        let stacks = params.get_item_stacks("items")?;
        if stacks.is_empty() {
            return Err(ActionError::validation(
                "EMPTY_ITEMS",
                "items list must not be empty",
            ));
        }
        Ok(())
    })
}

/// Install the default validator set. `agent.spawn` is deliberately not
/// covered by the liveness check (the agent does not exist yet).
pub fn register_default_validators(registry: &mut ValidatorRegistry) {
    registry.register("agent.walk", agent_exists());
    registry.register("agent.walk_to", agent_exists());
    registry.register("agent.walk_to.cancel", agent_exists());
    registry.register("agent.crafting.*", agent_exists());
    registry.register("mine_resource", agent_exists());
    registry.register("mine_resource.cancel", agent_exists());
    registry.register("entity.*", agent_exists());
    registry.register("entity.inventory.set_item", items_not_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamKind, ParamSpec};

    fn trivial(name: &'static str) -> Validator {
        Validator::new(name, |_, _| Ok(()))
    }

    #[test]
    fn test_glob_matching() {
        assert!(ValidatorRegistry::key_matches("agent.*", "agent.walk"));
        assert!(ValidatorRegistry::key_matches("agent.*", "agent.crafting.enqueue"));
        assert!(!ValidatorRegistry::key_matches("agent.*", "agent"));
        assert!(!ValidatorRegistry::key_matches("agent.*", "agentx.walk"));
        assert!(ValidatorRegistry::key_matches("mine_resource", "mine_resource"));
        assert!(!ValidatorRegistry::key_matches("mine_resource", "mine_resource.cancel"));
    }

    #[test]
    fn test_explicit_before_glob_in_registration_order() {
        let mut registry = ValidatorRegistry::default();
        registry.register("agent.*", trivial("glob_a"));
        registry.register("agent.walk", trivial("exact_a"));
        registry.register("agent.*", trivial("glob_b"));
        registry.register("agent.walk", trivial("exact_b"));

        let chain = registry.get_validations("agent.walk");
        let names: Vec<&str> = chain.iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["exact_a", "exact_b", "glob_a", "glob_b"]);
    }

    #[test]
    fn test_first_failure_short_circuits() {
        let mut world = World::new();
        let spec = ParamSpec::new().opt("x", ParamKind::Number);
        let mut params =
            crate::params::ParamInstance::from_value(spec, serde_json::json!({})).unwrap();
        // Validation context is irrelevant for these validators.
        let catalog = crate::world::prototypes::PrototypeCatalog::default();
        let force = crate::world::prototypes::ForceState::new(&catalog);
        params
            .validate(&crate::params::ValidationCtx {
                catalog: &catalog,
                force: &force,
            })
            .unwrap();

        let chain = vec![
            trivial("first"),
            Validator::new("fails", |_, _| {
                Err(ActionError::validation("NOPE", "second check failed"))
            }),
            Validator::new("unreachable", |_, _| {
                panic!("chain must stop at the first failure")
            }),
        ];
        let err = run_validators(&chain, &params, &mut world).unwrap_err();
        assert_eq!(err.code, "NOPE");
    }
}
