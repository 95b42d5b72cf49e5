//! Byte-stream sinks shared by the snapshot exporter and the signals
//! framework.
//!
//! A sink receives `(topic, payload)` pairs; the file sink maps topics to
//! paths under its base directory, the UDP sink fires one datagram per
//! payload and silently no-ops when no transport is available, the RCON
//! sink echoes to the debug console, and noop swallows everything. Sink
//! failures are for the caller to log; they must never abort a tick.

use std::fs;
use std::io::{self, Write};
use std::net::UdpSocket;
use std::path::PathBuf;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Serializable sink selector used by signal subscriptions and the
/// exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SinkKind {
    File { base_dir: PathBuf },
    Udp { target: String },
    Rcon,
    Noop,
}

/// A live sink. UDP sockets bind lazily on first use.
#[derive(Debug)]
pub struct Sink {
    kind: SinkKind,
    socket: Option<UdpSocket>,
}

impl Sink {
    pub fn new(kind: SinkKind) -> Self {
        let socket = match &kind {
            SinkKind::Udp { .. } => match UdpSocket::bind(("0.0.0.0", 0)) {
                Ok(socket) => {
                    let _ = socket.set_nonblocking(true);
                    Some(socket)
                }
                Err(e) => {
                    warn!("udp sink unavailable: {}", e);
                    None
                }
            },
            _ => None,
        };
        Self { kind, socket }
    }

    pub fn kind(&self) -> &SinkKind {
        &self.kind
    }

    fn file_path(base_dir: &std::path::Path, topic: &str) -> PathBuf {
        base_dir.join(topic)
    }

    /// Replace the topic's content with `payload`.
    pub fn write(&mut self, topic: &str, payload: &[u8]) -> io::Result<()> {
        match &self.kind {
            SinkKind::File { base_dir } => {
                let path = Self::file_path(base_dir, topic);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, payload)
            }
            _ => self.append(topic, payload),
        }
    }

    /// Append `payload` to the topic (one record per call).
    pub fn append(&mut self, topic: &str, payload: &[u8]) -> io::Result<()> {
        match &self.kind {
            SinkKind::File { base_dir } => {
                let path = Self::file_path(base_dir, topic);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(payload)?;
                file.write_all(b"\n")
            }
            SinkKind::Udp { target } => {
                // Fire-and-forget; a missing transport is a no-op.
                if let Some(socket) = &self.socket {
                    socket.send_to(payload, target.as_str()).map(|_| ())
                } else {
                    Ok(())
                }
            }
            SinkKind::Rcon => {
                info!("[rcon:{}] {}", topic, String::from_utf8_lossy(payload));
                Ok(())
            }
            SinkKind::Noop => Ok(()),
        }
    }
}
