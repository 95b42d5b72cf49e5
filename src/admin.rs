//! Admin line protocol: one JSON object per line over TCP, one envelope
//! per line back.
//!
//! The listener thread never touches the world; it parks each request in a
//! shared inbox and blocks on a reply channel. The simulation pumps the
//! inbox at the head of every tick, so admin traffic obeys the same
//! single-threaded ordering as everything else.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bevy::prelude::*;
use serde_json::Value;

use crate::actions::enqueue_or_invoke;
use crate::simulation::{should_tick, SimulationSet};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AdminRequest {
    pub payload: String,
    pub reply: mpsc::Sender<String>,
}

/// Shared inbox between the listener threads and the simulation.
#[derive(Resource, Clone, Default)]
pub struct AdminChannel {
    inbox: Arc<Mutex<Vec<AdminRequest>>>,
}

impl AdminChannel {
    pub fn push(&self, request: AdminRequest) {
        if let Ok(mut inbox) = self.inbox.lock() {
            inbox.push(request);
        }
    }

    pub fn drain(&self) -> Vec<AdminRequest> {
        self.inbox
            .lock()
            .map(|mut inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

fn handle_connection(stream: TcpStream, channel: AdminChannel) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(e) => {
            warn!("admin connection {} clone failed: {}", peer, e);
            return;
        }
    };
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let (tx, rx) = mpsc::channel();
        channel.push(AdminRequest {
            payload: line,
            reply: tx,
        });
        let response = rx
            .recv_timeout(REPLY_TIMEOUT)
            .unwrap_or_else(|_| "{\"ok\":false,\"code\":\"TIMEOUT\",\"category\":\"ENGINE\",\"message\":\"no reply within timeout\"}".to_string());
        if writer.write_all(response.as_bytes()).is_err() {
            break;
        }
        if writer.write_all(b"\n").is_err() {
            break;
        }
    }
    debug!("admin connection {} closed", peer);
}

/// Spawn the accept loop. Returns the channel to install as a resource.
pub fn start_admin_listener(port: u16) -> std::io::Result<AdminChannel> {
    let channel = AdminChannel::default();
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!("🔌 admin listener on port {}", port);
    let accept_channel = channel.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let conn_channel = accept_channel.clone();
                    thread::spawn(move || handle_connection(stream, conn_channel));
                }
                Err(e) => warn!("admin accept failed: {}", e),
            }
        }
    });
    Ok(channel)
}

/// Pump the inbox into the action queue (or straight through the invoker in
/// immediate mode). Runs before the queue drain each tick.
pub fn pump_admin_requests(world: &mut World) {
    let Some(channel) = world.get_resource::<AdminChannel>().cloned() else {
        return;
    };
    for request in channel.drain() {
        let parsed: Result<Value, _> = serde_json::from_str(&request.payload);
        let call = match parsed {
            Ok(Value::Object(map)) => map,
            _ => {
                let tick = world.resource::<crate::simulation::SimulationTick>().get();
                let envelope = crate::errors::Envelope::failure(
                    tick,
                    crate::errors::ActionError::validation(
                        "BAD_JSON",
                        "admin request is not a JSON object",
                    ),
                );
                let _ = request
                    .reply
                    .send(serde_json::to_string(&envelope).unwrap_or_default());
                continue;
            }
        };
        let Some(action) = call.get("action").and_then(Value::as_str).map(str::to_string)
        else {
            let tick = world.resource::<crate::simulation::SimulationTick>().get();
            let envelope = crate::errors::Envelope::failure(
                tick,
                crate::errors::ActionError::validation(
                    "MISSING_PARAM",
                    "admin request needs an 'action' field",
                ),
            );
            let _ = request
                .reply
                .send(serde_json::to_string(&envelope).unwrap_or_default());
            continue;
        };
        let params = call.get("params").cloned().unwrap_or(Value::Null);
        let key = call
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string);
        let priority = call
            .get("priority")
            .and_then(Value::as_i64)
            .unwrap_or(0) as i32;
        // Deferred intents answer through the reply handle when they drain.
        enqueue_or_invoke(world, &action, params, key, priority, Some(request.reply));
    }
}

pub struct AdminPlugin;

impl Plugin for AdminPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            pump_admin_requests
                .in_set(SimulationSet::QueueDrain)
                .before(crate::actions::drain_action_queue)
                .run_if(should_tick),
        );
    }
}
