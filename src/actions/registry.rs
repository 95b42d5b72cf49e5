/// Action registry and the uniform pre/post-run lifecycle.
///
/// Load-time, a static enumerated list of action constructors is imported;
/// each action gets its validator chain attached from the validator
/// registry. The invoker is the single entry point: decode → bind →
/// validate → validator chain → run → snapshot refresh.
use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::math::Vec2;
use bevy::prelude::*;
use serde_json::Value;

use crate::errors::{ActionError, ActionResult, Envelope};
use crate::params::{ParamInstance, ParamKind, ValidationCtx};
use crate::simulation::SimulationTick;
use crate::world::prototypes::{ForceState, PrototypeCatalog};

use super::validators::{run_validators, Validator, ValidatorRegistry};

/// What an action body produced, before envelope assembly.
#[derive(Debug, Clone)]
pub enum ActionReturn {
    /// Completed within this tick.
    Sync { data: Value },
    /// Registered a multi-tick job; the terminal outcome arrives on the
    /// completion transport under `action_id`.
    Queued { action_id: String, data: Value },
}

/// Result of a successful action body.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ret: ActionReturn,
    pub agent_id: Option<u32>,
    /// Rows the snapshot layer must refresh after this action.
    pub affected: Vec<(Vec2, String)>,
    /// Rows the snapshot layer must delete after this action.
    pub removed: Vec<(Vec2, String)>,
}

impl RunOutput {
    pub fn sync(data: Value) -> Self {
        Self {
            ret: ActionReturn::Sync { data },
            agent_id: None,
            affected: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn queued(action_id: String, data: Value) -> Self {
        Self {
            ret: ActionReturn::Queued { action_id, data },
            agent_id: None,
            affected: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn with_agent(mut self, agent_id: u32) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_affected(mut self, position: Vec2, name: &str) -> Self {
        self.affected.push((position, name.to_string()));
        self
    }

    pub fn with_removed(mut self, position: Vec2, name: &str) -> Self {
        self.removed.push((position, name.to_string()));
        self
    }
}

/// One registered action: name, parameter schema, body.
pub trait ActionSpec: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn param_spec(&self) -> ParamSpec;
    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput>;
}

struct RegisteredAction {
    spec: Arc<dyn ActionSpec>,
    validators: Vec<Validator>,
}

/// Name → invoker map built once at startup.
#[derive(Resource, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, RegisteredAction>,
}

impl ActionRegistry {
    pub fn register(&mut self, action: Arc<dyn ActionSpec>, validators: Vec<Validator>) {
        let name = action.name().to_string();
        if self
            .actions
            .insert(name.clone(), RegisteredAction { spec: action, validators })
            .is_some()
        {
            warn!("action '{}' registered twice, later wins", name);
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    fn lookup(&self, name: &str) -> Option<(Arc<dyn ActionSpec>, Vec<Validator>)> {
        self.actions
            .get(name)
            .map(|r| (Arc::clone(&r.spec), r.validators.clone()))
    }
}

/// Build the registry from the static action list plus the validator
/// registry.
pub fn build_registry(validator_registry: &ValidatorRegistry) -> ActionRegistry {
    let mut registry = ActionRegistry::default();
    for action in super::all_actions() {
        let validators = validator_registry.get_validations(action.name());
        registry.register(Arc::from(action), validators);
    }
    info!("✅ Action registry loaded: {} actions", registry.names().len());
    registry
}

/// Accept either a decoded mapping or a JSON string encoding one.
fn normalize_params(raw: Value) -> Value {
    if let Value::String(s) = &raw {
        let trimmed = s.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(decoded) = serde_json::from_str::<Value>(s) {
                return decoded;
            }
        }
    }
    raw
}

/// Canonical entry point: run `name` with `raw_params` against the world
/// and return its envelope. Never panics; every failure becomes a tagged
/// envelope.
pub fn invoke_action(world: &mut World, name: &str, raw_params: Value) -> Envelope {
    let tick = world.resource::<SimulationTick>().get();

    let Some((action, validators)) = world.resource::<ActionRegistry>().lookup(name) else {
        return Envelope::failure(
            tick,
            ActionError::validation("UNKNOWN_ACTION", format!("no action '{}'", name)),
        );
    };

    match pre_run(world, &action, validators, raw_params) {
        Ok(params) => {
            let trace_id = params.opt_str("trace_id").ok().flatten().map(str::to_string);
            let agent_hint = params.opt_u32("agent_id").ok().flatten();
            match action.run(world, &params) {
                Ok(output) => {
                    post_run(world, &output);
                    let agent_id = output.agent_id.or(agent_hint);
                    let envelope = match output.ret {
                        ActionReturn::Sync { data } => Envelope::success(tick, data),
                        ActionReturn::Queued { action_id, data } => {
                            Envelope::queued(tick, action_id, data)
                        }
                    };
                    let mut envelope = envelope.with_trace(trace_id);
                    if let Some(agent_id) = agent_id {
                        envelope = envelope.with_agent(agent_id);
                    }
                    envelope
                }
                Err(err) => {
                    let mut envelope = Envelope::failure(tick, err).with_trace(trace_id);
                    if let Some(agent_id) = agent_hint {
                        envelope = envelope.with_agent(agent_id);
                    }
                    envelope
                }
            }
        }
        Err(err) => Envelope::failure(tick, err),
    }
}

/// Decode, bind, validate and run the validator chain.
fn pre_run(
    world: &mut World,
    action: &Arc<dyn ActionSpec>,
    validators: Vec<Validator>,
    raw_params: Value,
) -> ActionResult<ParamInstance> {
    let normalized = normalize_params(raw_params);
    // Every action implicitly accepts a trace_id for log correlation.
    let spec = action.param_spec().opt("trace_id", ParamKind::String);
    let mut params = ParamInstance::from_value(spec, normalized)?;
    {
        let catalog = world.resource::<PrototypeCatalog>();
        let force = world.resource::<ForceState>();
        params.validate(&ValidationCtx {
            catalog,
            force,
        })?;
    }
    run_validators(&validators, &params, world)?;
    Ok(params)
}

/// Refresh / delete the snapshot rows an action touched.
fn post_run(world: &mut World, output: &RunOutput) {
    for (position, name) in &output.affected {
        crate::snapshot::update_entity_from_action(world, *position, name);
    }
    for (position, name) in &output.removed {
        crate::snapshot::remove_entity_from_action(world, *position, name);
    }
}
