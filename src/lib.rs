pub mod actions;
pub mod admin;
pub mod agents;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod params;
pub mod pathfinding;
pub mod persist;
pub mod signals;
pub mod simulation;
pub mod sinks;
pub mod snapshot;
pub mod transport;
pub mod types;
pub mod world;

pub use actions::{
    invoke_action, process_all, process_key, process_some, ActionQueue, ActionRegistry,
    ActionSpec, RunOutput,
};
pub use config::RuntimeConfig;
pub use errors::{ActionError, ActionResult, Envelope, ErrorCategory};
pub use params::{ParamInstance, ParamKind, ParamSpec};
pub use simulation::{SimulationSet, SimulationTick};
pub use types::{AgentId, Direction, PosKey};

use bevy::prelude::*;

/// The full agent action runtime: tick orchestration, world substrate,
/// action pipeline, job engines, snapshot layer, signals and transports.
pub struct FactoryVersePlugin;

impl Plugin for FactoryVersePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<RuntimeConfig>() {
            app.init_resource::<RuntimeConfig>();
        }
        app.add_plugins((
            simulation::SimulationPlugin,
            world::WorldPlugin,
            agents::AgentsPlugin,
            pathfinding::PathfindingPlugin,
            actions::ActionsPlugin,
            jobs::JobsPlugin,
            snapshot::SnapshotPlugin,
            signals::SignalsPlugin,
            transport::TransportPlugin,
            persist::PersistPlugin,
            admin::AdminPlugin,
        ));
    }
}
