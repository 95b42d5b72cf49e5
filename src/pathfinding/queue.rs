/// Budget-controlled path request queue.
///
/// Engines request paths by agent id and correlate the response by request
/// id; responses arriving after their job is gone are simply dropped by the
/// consumer. Requests are processed FIFO under a per-tick budget.
use std::collections::VecDeque;

use bevy::math::IVec2;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::AgentId;

/// Unique identifier for a path request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PathRequestId(u64);

impl PathRequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct PathRequest {
    pub id: PathRequestId,
    pub agent_id: AgentId,
    pub from: IVec2,
    pub to: IVec2,
    pub allow_diagonal: bool,
    pub requested_tick: u64,
}

/// Why a pathfinding request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFailureReason {
    Unreachable,
    Timeout,
}

/// Result of a pathfinding computation. `Success` with no waypoints means
/// the requester already stands on the goal tile.
#[derive(Debug, Clone)]
pub enum PathResult {
    Success { waypoints: Vec<Vec2> },
    Failed { reason: PathFailureReason },
}

/// Delivered once per request; duplicate deliveries are possible after a
/// reload and must be ignored by request id.
#[derive(Event, Debug, Clone)]
pub struct PathResponseEvent {
    pub req_id: PathRequestId,
    pub agent_id: AgentId,
    pub result: PathResult,
}

/// Global queue of pathfinding requests with a per-tick processing budget.
#[derive(Resource, Debug)]
pub struct PathfindingQueue {
    queue: VecDeque<PathRequest>,
    paths_per_tick: usize,
    next_id: u64,
    total_processed: u64,
}

impl Default for PathfindingQueue {
    fn default() -> Self {
        Self::new(40)
    }
}

impl PathfindingQueue {
    pub fn new(paths_per_tick: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            paths_per_tick,
            next_id: 1,
            total_processed: 0,
        }
    }

    /// Queue a path request; the response correlates by the returned id.
    pub fn request(
        &mut self,
        agent_id: AgentId,
        from: IVec2,
        to: IVec2,
        requested_tick: u64,
    ) -> PathRequestId {
        let id = PathRequestId::new(self.next_id);
        self.next_id += 1;
        self.queue.push_back(PathRequest {
            id,
            agent_id,
            from,
            to,
            allow_diagonal: true,
            requested_tick,
        });
        debug!(
            "🗺️ Queued path request {}: agent={} {:?} → {:?}",
            id.as_u64(),
            agent_id,
            from,
            to
        );
        id
    }

    pub fn drain(&mut self, max_count: usize) -> Vec<PathRequest> {
        let take = max_count.min(self.queue.len());
        let drained: Vec<PathRequest> = self.queue.drain(..take).collect();
        self.total_processed += drained.len() as u64;
        drained
    }

    pub fn paths_per_tick(&self) -> usize {
        self.paths_per_tick
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_and_monotonic() {
        let mut queue = PathfindingQueue::new(10);
        let a = queue.request(1, IVec2::ZERO, IVec2::new(5, 5), 1);
        let b = queue.request(1, IVec2::ZERO, IVec2::new(5, 5), 1);
        assert!(b.as_u64() > a.as_u64());
        assert_eq!(queue.queued(), 2);
    }

    #[test]
    fn test_drain_respects_budget() {
        let mut queue = PathfindingQueue::new(2);
        for i in 0..5 {
            queue.request(i, IVec2::ZERO, IVec2::new(1, 1), 0);
        }
        let first = queue.drain(2);
        assert_eq!(first.len(), 2);
        assert_eq!(queue.queued(), 3);
        assert_eq!(first[0].agent_id, 0);
        assert_eq!(first[1].agent_id, 1);
    }
}
