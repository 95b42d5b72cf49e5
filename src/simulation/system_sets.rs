/// System sets defining the deterministic per-tick execution order.
///
/// # Execution order
/// 1. QueueDrain - admin intake and bounded action-queue drain
/// 2. WalkJobs - walk job engine (path responses, waypoint following)
/// 3. MineJobs - mine job engine
/// 4. CraftJobs - craft completion tracking
/// 5. HostSim - host character simulation (walking, swings, hand-crafts)
/// 6. Snapshot - status/stats views, sliced exports, discovery charting
/// 7. Signals - subscription sampling
/// 8. Cleanup - completion transport flush, autosave
use bevy::prelude::*;

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Admin intake plus `process_some(MAX_ACTIONS_PER_TICK)`.
    QueueDrain,
    /// Walk engine: consume path responses, follow waypoints.
    WalkJobs,
    /// Mine engine: reach checks, swing/emulation accounting.
    MineJobs,
    /// Craft tracker: queue-drain detection, completion accounting.
    CraftJobs,
    /// Host character simulation (movement, mining swings, hand-crafting).
    HostSim,
    /// Snapshot layer: incremental rows, status cadence, sliced export.
    Snapshot,
    /// Signals sampler and sinks.
    Signals,
    /// Completion datagrams, persistence, stale-reference pruning.
    Cleanup,
}
