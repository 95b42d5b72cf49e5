//! Runtime configuration.
//!
//! Defaults mirror the production deployment; the server binary overrides
//! them from CLI flags, and a RON file can replace the whole block for
//! test rigs.

use std::path::PathBuf;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Per-tick action cap for the queue drain.
    pub max_actions_per_tick: usize,
    /// Queue bound; enqueues beyond it are rejected with CAPACITY.
    pub max_queue_size: usize,
    /// Snapshot export slice width.
    pub chunks_per_tick: usize,
    /// Destination for completion datagrams.
    pub completion_host: String,
    pub completion_port: u16,
    /// Admin line-protocol port; `None` disables the listener.
    pub admin_port: Option<u16>,
    /// Base directory for snapshot and signal output.
    pub base_dir: PathBuf,
    /// Autosave cadence in ticks; 0 disables.
    pub autosave_every: u64,
    /// Path of the persisted queue/job store.
    pub save_path: PathBuf,
    /// Seed for the demo world layout.
    pub world_seed: u64,
    /// Map-discovery charting cadence in ticks; 0 disables.
    pub discovery_every: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_actions_per_tick: 10,
            max_queue_size: 10_000,
            chunks_per_tick: 4,
            completion_host: "127.0.0.1".to_string(),
            completion_port: 34202,
            admin_port: None,
            base_dir: PathBuf::from("script-output/factoryverse"),
            autosave_every: 600,
            save_path: PathBuf::from("script-output/factoryverse/state.ron"),
            world_seed: 0x5eed,
            discovery_every: 120,
        }
    }
}

impl RuntimeConfig {
    pub fn load_ron(path: &std::path::Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        ron::from_str(&raw).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_ron() {
        let config = RuntimeConfig::default();
        let text = ron::to_string(&config).unwrap();
        let back: RuntimeConfig = ron::from_str(&text).unwrap();
        assert_eq!(back.max_actions_per_tick, 10);
        assert_eq!(back.completion_port, 34202);
    }
}
