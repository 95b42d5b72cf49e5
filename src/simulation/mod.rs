/// Tick-driven orchestration: the tick counter, the phased system sets and
/// their deterministic ordering.
///
/// Every observable mutation happens inside the tick; the only suspension
/// point is the end of a tick, and multi-tick work lives in explicit job
/// arenas resumed by their engines.
pub mod system_sets;
pub mod tick;

pub use system_sets::SimulationSet;
pub use tick::{advance_tick, every_n_ticks, should_tick, SimulationState, SimulationTick, TickStamp};

use bevy::prelude::*;

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationTick>()
            .init_resource::<SimulationState>()
            .configure_sets(
                Update,
                (
                    SimulationSet::QueueDrain,
                    SimulationSet::WalkJobs,
                    SimulationSet::MineJobs,
                    SimulationSet::CraftJobs,
                    SimulationSet::HostSim,
                    SimulationSet::Snapshot,
                    SimulationSet::Signals,
                    SimulationSet::Cleanup,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                advance_tick.before(SimulationSet::QueueDrain),
            );
    }
}
