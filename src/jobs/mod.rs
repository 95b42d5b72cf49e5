/// Tick-driven job state machines for the intrinsically multi-tick actions:
/// path-following walk, mining, and recipe crafting.
///
/// Each engine owns an arena keyed by agent id; jobs hold ids, never entity
/// back-pointers, and re-resolve the live actor every tick.
pub mod craft;
pub mod mine;
pub mod walk;

pub use craft::{cancel_craft, enqueue_craft, CraftTracking, CraftTrackings};
pub use mine::{cancel_mine, start_mine, MineJob, MineJobs};
pub use walk::{cancel_walk, start_walk, WalkJob, WalkJobs, WalkParams, WalkState};

use bevy::prelude::*;

use crate::simulation::{should_tick, SimulationSet};

pub struct JobsPlugin;

impl Plugin for JobsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WalkJobs>()
            .init_resource::<MineJobs>()
            .init_resource::<CraftTrackings>()
            .add_systems(
                Update,
                (walk::apply_path_responses, walk::walk_jobs_tick)
                    .chain()
                    .in_set(SimulationSet::WalkJobs)
                    .after(crate::pathfinding::process_pathfinding_queue)
                    .run_if(should_tick),
            )
            .add_systems(
                Update,
                mine::mine_jobs_tick
                    .in_set(SimulationSet::MineJobs)
                    .run_if(should_tick),
            )
            .add_systems(
                Update,
                craft::craft_tracking_tick
                    .in_set(SimulationSet::CraftJobs)
                    .run_if(should_tick),
            );
    }
}
