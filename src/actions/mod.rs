/// The typed action surface: registry, validator chains, bounded queue and
/// the registered action modules.
///
/// Action modules are enumerated statically in `all_actions`; adding an
/// action means adding its constructor there and nothing else.
pub mod agent_ops;
pub mod craft_ops;
pub mod entity_ops;
pub mod mine_ops;
pub mod queue;
pub mod registry;
pub mod research_ops;
pub mod system_ops;
pub mod validators;
pub mod walk_ops;

pub use queue::{
    drain_action_queue, enqueue_or_invoke, process_all, process_key, process_some,
    ActionQueue, QueuedIntent, SavedQueue,
};
pub use registry::{
    build_registry, invoke_action, ActionRegistry, ActionReturn, ActionSpec, RunOutput,
};
pub use validators::{register_default_validators, Validator, ValidatorRegistry};

use bevy::prelude::*;

use crate::simulation::{should_tick, SimulationSet};

/// The static, enumerated set of action modules.
pub fn all_actions() -> Vec<Box<dyn ActionSpec>> {
    let mut actions: Vec<Box<dyn ActionSpec>> = Vec::new();
    actions.extend(system_ops::actions());
    actions.extend(agent_ops::actions());
    actions.extend(walk_ops::actions());
    actions.extend(mine_ops::actions());
    actions.extend(craft_ops::actions());
    actions.extend(entity_ops::actions());
    actions.extend(research_ops::actions());
    actions
}

pub fn load_registry(world: &mut World) {
    let mut validator_registry = ValidatorRegistry::default();
    register_default_validators(&mut validator_registry);
    let registry = build_registry(&validator_registry);
    world.insert_resource(registry);

    let max = world
        .resource::<crate::config::RuntimeConfig>()
        .max_queue_size;
    world.resource_mut::<ActionQueue>().set_max_queue_size(max);
}

pub struct ActionsPlugin;

impl Plugin for ActionsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ActionQueue>()
            .add_systems(Startup, load_registry)
            .add_systems(
                Update,
                drain_action_queue
                    .in_set(SimulationSet::QueueDrain)
                    .run_if(should_tick),
            );
    }
}
