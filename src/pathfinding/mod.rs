/// Pathfinding: grid A* behind a budget-controlled request queue.
///
/// Job engines never call the search directly; they queue a request and
/// consume the correlated `PathResponseEvent` on a later tick, which keeps
/// per-tick cost bounded regardless of how many agents replan at once.
mod grid;
mod queue;

pub use grid::{find_path, PathfindingGrid};
pub use queue::{
    PathFailureReason, PathRequest, PathRequestId, PathResponseEvent, PathResult,
    PathfindingQueue,
};

use bevy::prelude::*;

use crate::simulation::{should_tick, SimulationSet};
use crate::types::tile_center;

pub struct PathfindingPlugin;

impl Plugin for PathfindingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PathfindingGrid>()
            .init_resource::<PathfindingQueue>()
            .add_event::<PathResponseEvent>()
            .add_systems(
                Update,
                process_pathfinding_queue
                    .in_set(SimulationSet::WalkJobs)
                    .run_if(should_tick),
            );
    }
}

/// Drain up to the per-tick budget of requests and publish responses.
pub fn process_pathfinding_queue(
    mut queue: ResMut<PathfindingQueue>,
    grid: Res<PathfindingGrid>,
    mut responses: EventWriter<PathResponseEvent>,
) {
    let budget = queue.paths_per_tick();
    for request in queue.drain(budget) {
        let result = match find_path(
            request.from,
            request.to,
            &grid,
            request.allow_diagonal,
            Some(5000),
        ) {
            Some(tiles) => PathResult::Success {
                waypoints: tiles.into_iter().map(tile_center).collect(),
            },
            None => PathResult::Failed {
                reason: PathFailureReason::Unreachable,
            },
        };
        responses.send(PathResponseEvent {
            req_id: request.id,
            agent_id: request.agent_id,
            result,
        });
    }
}
