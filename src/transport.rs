//! Async-completion transport: best-effort UDP datagrams correlating a
//! started action to its terminal outcome.
//!
//! Job engines publish `ActionCompletedEvent`s; the flush system turns each
//! into one JSON datagram. Send failures are logged and never touch job
//! state.

use std::net::UdpSocket;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::simulation::{should_tick, SimulationSet, SimulationTick};
use crate::types::AgentId;

/// Terminal outcome of an async action, published by its job engine.
#[derive(Event, Debug, Clone)]
pub struct ActionCompletedEvent {
    pub action_id: String,
    pub agent_id: AgentId,
    pub action_type: String,
    pub rcon_tick: u64,
    pub success: bool,
    pub cancelled: Option<bool>,
    pub result: Value,
}

/// Wire form of one completion datagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEnvelope {
    pub action_id: String,
    pub agent_id: AgentId,
    pub action_type: String,
    pub rcon_tick: u64,
    pub completion_tick: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    pub result: Value,
}

/// Fire-and-forget UDP sender. A missing socket downgrades every send to a
/// logged no-op so headless test rigs run without a listener.
#[derive(Resource)]
pub struct CompletionTransport {
    socket: Option<UdpSocket>,
    target: String,
    /// Datagrams handed to the OS. For tests and diagnostics.
    pub sent_count: u64,
    /// Copies of everything sent, newest last, kept short.
    pub recent: Vec<CompletionEnvelope>,
}

const RECENT_CAP: usize = 128;

impl CompletionTransport {
    pub fn new(host: &str, port: u16) -> Self {
        let target = format!("{}:{}", host, port);
        let socket = match UdpSocket::bind(("0.0.0.0", 0)) {
            Ok(socket) => {
                if let Err(e) = socket.set_nonblocking(true) {
                    warn!("completion transport: nonblocking set failed: {}", e);
                }
                Some(socket)
            }
            Err(e) => {
                warn!("completion transport unavailable: {}", e);
                None
            }
        };
        Self {
            socket,
            target,
            sent_count: 0,
            recent: Vec::new(),
        }
    }

    /// Transport that records envelopes without touching the network.
    pub fn disconnected() -> Self {
        Self {
            socket: None,
            target: String::new(),
            sent_count: 0,
            recent: Vec::new(),
        }
    }

    pub fn send(&mut self, envelope: CompletionEnvelope) {
        if let Some(socket) = &self.socket {
            match serde_json::to_vec(&envelope) {
                Ok(payload) => {
                    if let Err(e) = socket.send_to(&payload, &self.target) {
                        debug!("completion datagram to {} dropped: {}", self.target, e);
                    } else {
                        self.sent_count += 1;
                    }
                }
                Err(e) => warn!("completion envelope encode failed: {}", e),
            }
        }
        self.recent.push(envelope);
        if self.recent.len() > RECENT_CAP {
            self.recent.remove(0);
        }
    }
}

/// Turn completion events into datagrams. Runs in the cleanup phase so all
/// engines of the tick have already published.
pub fn flush_completions(
    mut events: EventReader<ActionCompletedEvent>,
    mut transport: ResMut<CompletionTransport>,
    tick: Res<SimulationTick>,
) {
    for event in events.read() {
        debug!(
            "📤 completion {}: success={} cancelled={:?}",
            event.action_id, event.success, event.cancelled
        );
        transport.send(CompletionEnvelope {
            action_id: event.action_id.clone(),
            agent_id: event.agent_id,
            action_type: event.action_type.clone(),
            rcon_tick: event.rcon_tick,
            completion_tick: tick.get(),
            success: event.success,
            cancelled: event.cancelled,
            result: event.result.clone(),
        });
    }
}

pub struct TransportPlugin;

impl Plugin for TransportPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ActionCompletedEvent>().add_systems(
            Update,
            flush_completions
                .in_set(SimulationSet::Cleanup)
                .run_if(should_tick),
        );
        if !app.world().contains_resource::<CompletionTransport>() {
            app.insert_resource(CompletionTransport::disconnected());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_transport_records_locally() {
        let mut transport = CompletionTransport::disconnected();
        transport.send(CompletionEnvelope {
            action_id: "mine_10_1".into(),
            agent_id: 1,
            action_type: "mine_resource".into(),
            rcon_tick: 10,
            completion_tick: 99,
            success: true,
            cancelled: None,
            result: serde_json::json!({"mined": 5}),
        });
        assert_eq!(transport.sent_count, 0);
        assert_eq!(transport.recent.len(), 1);
        assert_eq!(transport.recent[0].action_id, "mine_10_1");
    }

    #[test]
    fn test_envelope_omits_absent_cancelled() {
        let envelope = CompletionEnvelope {
            action_id: "walk_1_2".into(),
            agent_id: 2,
            action_type: "agent.walk_to".into(),
            rcon_tick: 1,
            completion_tick: 50,
            success: true,
            cancelled: None,
            result: serde_json::json!({}),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("cancelled"));
    }
}
