/// Bounded action queue: non-blocking intake, capped per-tick drain.
///
/// Items drain in (priority ascending, enqueue order) order; equal
/// priorities keep strict FIFO fairness. The queue body is plain serde data
/// so it survives reloads via the persistence layer; reply handles attached
/// by the admin channel are transient and dropped on save.
use std::collections::VecDeque;
use std::sync::mpsc::Sender;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ActionError, ActionResult, Envelope};
use crate::simulation::TickStamp;

use super::registry::invoke_action;

/// One queued intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedIntent {
    pub action_name: String,
    pub params: Value,
    pub key: Option<String>,
    pub priority: i32,
    pub enqueue_tick: u64,
    pub seq: u64,
    /// Admin connections waiting on the real envelope. Not persisted.
    #[serde(skip)]
    pub reply: Option<Sender<String>>,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub processed: u64,
    pub rejected: u64,
}

#[derive(Resource)]
pub struct ActionQueue {
    items: Vec<QueuedIntent>,
    next_seq: u64,
    max_queue_size: usize,
    immediate: bool,
    pub stats: QueueStats,
    /// Recently returned envelopes, newest last. For diagnostics and tests.
    recent: VecDeque<(String, Envelope)>,
    pub(crate) drain_stamp: TickStamp,
}

const RECENT_CAP: usize = 256;

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ActionQueue {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            items: Vec::new(),
            next_seq: 0,
            max_queue_size,
            immediate: false,
            stats: QueueStats::default(),
            recent: VecDeque::new(),
            drain_stamp: TickStamp::default(),
        }
    }

    pub fn set_max_queue_size(&mut self, max: usize) {
        self.max_queue_size = max;
    }

    /// When set, `enqueue_or_invoke` short-circuits straight through the
    /// invoker instead of deferring to the next drain.
    pub fn set_immediate_mode(&mut self, immediate: bool) {
        self.immediate = immediate;
    }

    pub fn immediate_mode(&self) -> bool {
        self.immediate
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Non-blocking intake. CAPACITY once the bound is reached.
    pub fn enqueue(
        &mut self,
        action_name: &str,
        params: Value,
        key: Option<String>,
        priority: i32,
        tick: u64,
        reply: Option<Sender<String>>,
    ) -> ActionResult<u64> {
        if self.items.len() >= self.max_queue_size {
            self.stats.rejected += 1;
            return Err(ActionError::capacity(
                "QUEUE_FULL",
                format!("action queue is at its bound of {}", self.max_queue_size),
            ));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.push(QueuedIntent {
            action_name: action_name.to_string(),
            params,
            key,
            priority,
            enqueue_tick: tick,
            seq,
            reply,
        });
        self.stats.enqueued += 1;
        Ok(seq)
    }

    /// Remove and return the next `max` items in drain order.
    fn take_batch(&mut self, max: usize) -> Vec<QueuedIntent> {
        self.items.sort_by_key(|i| (i.priority, i.seq));
        let take = max.min(self.items.len());
        self.items.drain(..take).collect()
    }

    /// Remove and return every item carrying `key`, in drain order.
    fn take_key(&mut self, key: &str) -> Vec<QueuedIntent> {
        self.items.sort_by_key(|i| (i.priority, i.seq));
        let mut taken = Vec::new();
        self.items.retain_mut(|item| {
            if item.key.as_deref() == Some(key) {
                taken.push(QueuedIntent {
                    reply: item.reply.take(),
                    ..item.clone()
                });
                false
            } else {
                true
            }
        });
        taken
    }

    fn record_result(&mut self, action_name: &str, envelope: Envelope) {
        self.recent.push_back((action_name.to_string(), envelope));
        while self.recent.len() > RECENT_CAP {
            self.recent.pop_front();
        }
        self.stats.processed += 1;
    }

    pub fn recent_results(&self) -> impl Iterator<Item = &(String, Envelope)> {
        self.recent.iter()
    }

    /// Serializable queue body for the persistence layer.
    pub fn to_saved(&self) -> SavedQueue {
        SavedQueue {
            items: self
                .items
                .iter()
                .map(|i| QueuedIntent {
                    reply: None,
                    ..i.clone()
                })
                .collect(),
            next_seq: self.next_seq,
            stats: self.stats,
        }
    }

    pub fn restore(&mut self, saved: SavedQueue) {
        self.items = saved.items;
        self.next_seq = saved.next_seq;
        self.stats = saved.stats;
    }
}

/// Queue state as written into the persisted store.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SavedQueue {
    pub items: Vec<QueuedIntent>,
    pub next_seq: u64,
    pub stats: QueueStats,
}

// ============================================================================
// DRAIN ENTRY POINTS
// ============================================================================

fn run_batch(world: &mut World, batch: Vec<QueuedIntent>) -> usize {
    let mut processed = 0;
    for intent in batch {
        let envelope = invoke_action(world, &intent.action_name, intent.params.clone());
        if let Some(reply) = &intent.reply {
            let _ = reply.send(serde_json::to_string(&envelope).unwrap_or_default());
        }
        world
            .resource_mut::<ActionQueue>()
            .record_result(&intent.action_name, envelope);
        processed += 1;
    }
    processed
}

/// Drain up to `max_actions` queued intents through the invoker.
pub fn process_some(world: &mut World, max_actions: usize) -> usize {
    let batch = world.resource_mut::<ActionQueue>().take_batch(max_actions);
    run_batch(world, batch)
}

/// Drain every intent carrying `key`.
pub fn process_key(world: &mut World, key: &str) -> usize {
    let batch = world.resource_mut::<ActionQueue>().take_key(key);
    run_batch(world, batch)
}

/// Drain the whole queue.
pub fn process_all(world: &mut World) -> usize {
    let len = world.resource::<ActionQueue>().len();
    process_some(world, len)
}

/// Intake used by the admin channel and tests: immediate mode goes straight
/// through the invoker, deferred mode answers with the real envelope later
/// through `reply`.
pub fn enqueue_or_invoke(
    world: &mut World,
    action_name: &str,
    params: Value,
    key: Option<String>,
    priority: i32,
    reply: Option<Sender<String>>,
) -> Option<Envelope> {
    let tick = world.resource::<crate::simulation::SimulationTick>().get();
    let immediate = world.resource::<ActionQueue>().immediate_mode();
    if immediate {
        let envelope = invoke_action(world, action_name, params);
        if let Some(reply) = &reply {
            let _ = reply.send(serde_json::to_string(&envelope).unwrap_or_default());
        }
        world
            .resource_mut::<ActionQueue>()
            .record_result(action_name, envelope.clone());
        return Some(envelope);
    }
    let result = world.resource_mut::<ActionQueue>().enqueue(
        action_name,
        params,
        key,
        priority,
        tick,
        reply.clone(),
    );
    match result {
        Ok(_) => None,
        Err(err) => {
            let envelope = Envelope::failure(tick, err);
            if let Some(reply) = &reply {
                let _ = reply.send(serde_json::to_string(&envelope).unwrap_or_default());
            }
            Some(envelope)
        }
    }
}

/// Per-tick scheduled drain, guarded against same-tick re-entry.
pub fn drain_action_queue(world: &mut World) {
    let tick = world.resource::<crate::simulation::SimulationTick>().get();
    let max = world
        .resource::<crate::config::RuntimeConfig>()
        .max_actions_per_tick;
    if !world
        .resource_mut::<ActionQueue>()
        .drain_stamp
        .mark(tick)
    {
        return;
    }
    let processed = process_some(world, max);
    if processed > 0 {
        debug!("⚙️ Drained {} actions on tick {}", processed, tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capacity_rejection() {
        let mut queue = ActionQueue::new(2);
        assert!(queue.enqueue("system.noop", json!({}), None, 0, 1, None).is_ok());
        assert!(queue.enqueue("system.noop", json!({}), None, 0, 1, None).is_ok());
        let err = queue
            .enqueue("system.noop", json!({}), None, 0, 1, None)
            .unwrap_err();
        assert_eq!(err.category, crate::errors::ErrorCategory::Capacity);
        assert_eq!(queue.stats.rejected, 1);
    }

    #[test]
    fn test_drain_order_priority_then_fifo() {
        let mut queue = ActionQueue::new(100);
        queue.enqueue("a", json!({}), None, 5, 1, None).unwrap();
        queue.enqueue("b", json!({}), None, 0, 1, None).unwrap();
        queue.enqueue("c", json!({}), None, 0, 1, None).unwrap();
        queue.enqueue("d", json!({}), None, -1, 1, None).unwrap();

        let batch = queue.take_batch(10);
        let names: Vec<&str> = batch.iter().map(|i| i.action_name.as_str()).collect();
        assert_eq!(names, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_take_key_filters_and_preserves_rest() {
        let mut queue = ActionQueue::new(100);
        queue
            .enqueue("a", json!({}), Some("group".into()), 0, 1, None)
            .unwrap();
        queue.enqueue("b", json!({}), None, 0, 1, None).unwrap();
        queue
            .enqueue("c", json!({}), Some("group".into()), 0, 1, None)
            .unwrap();

        let taken = queue.take_key("group");
        assert_eq!(taken.len(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_saved_queue_round_trip() {
        let mut queue = ActionQueue::new(100);
        queue
            .enqueue("agent.walk", json!({"agent_id": 1}), None, 2, 7, None)
            .unwrap();
        let saved = queue.to_saved();
        let ron = ron::to_string(&saved).unwrap();
        let back: SavedQueue = ron::from_str(&ron).unwrap();

        let mut restored = ActionQueue::new(100);
        restored.restore(back);
        assert_eq!(restored.len(), 1);
        let batch = restored.take_batch(1);
        assert_eq!(batch[0].action_name, "agent.walk");
        assert_eq!(batch[0].enqueue_tick, 7);
    }
}
