/// Sliced batch export of the snapshot: per-chunk CSVs plus per-category
/// metadata JSON declaring the column headers.
///
/// Exports never block a tick: a job walks the charted-chunk list
/// `chunks_per_tick` at a time and emits through the sink abstraction, so a
/// slow disk degrades into more ticks, not longer ones.
use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::*;
use serde_json::json;

use crate::sinks::{Sink, SinkKind};
use crate::simulation::SimulationTick;
use crate::transport::ActionCompletedEvent;
use crate::world::chunks::ChunkCoord;

use super::{Category, WorldSnapshot};

/// One running export.
#[derive(Debug)]
pub struct ExportJob {
    pub action_id: String,
    pub rcon_tick: u64,
    pub agent_id: u32,
    pub tick_started: u64,
    pub surface: String,
    pub pending: VecDeque<ChunkCoord>,
    pub chunks_total: usize,
    /// Relative file paths written so far, per category.
    pub files: BTreeMap<Category, Vec<String>>,
}

#[derive(Resource)]
pub struct SnapshotExporter {
    pub current: Option<ExportJob>,
    sink: Sink,
}

impl Default for SnapshotExporter {
    fn default() -> Self {
        Self {
            current: None,
            sink: Sink::new(SinkKind::Noop),
        }
    }
}

impl SnapshotExporter {
    pub fn with_sink(kind: SinkKind) -> Self {
        Self {
            current: None,
            sink: Sink::new(kind),
        }
    }

    pub fn set_sink(&mut self, kind: SinkKind) {
        self.sink = Sink::new(kind);
    }

    pub fn busy(&self) -> bool {
        self.current.is_some()
    }
}

/// CSV cell escaping: quote when a delimiter, quote or newline is present.
fn csv_cell(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn csv_document(headers: &[&str], rows: Vec<&Vec<String>>) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&headers.join(","));
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| csv_cell(c)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

/// Kick off a chunked export over every charted chunk. LOGICAL if one is
/// already running. Returns the export's action id.
pub fn start_export(
    world: &mut World,
    agent_id: u32,
) -> crate::errors::ActionResult<(String, usize)> {
    let tick = world.resource::<SimulationTick>().get();
    if world.resource::<SnapshotExporter>().busy() {
        return Err(crate::errors::ActionError::logical(
            "EXPORT_IN_PROGRESS",
            "a snapshot export is already running",
        ));
    }
    let chunks: VecDeque<ChunkCoord> = crate::world::GameState::new(world)
        .charted_chunks(true)
        .into();
    let total = chunks.len();
    let action_id = crate::errors::action_id("snapshot", tick, agent_id);
    world.resource_mut::<SnapshotExporter>().current = Some(ExportJob {
        action_id: action_id.clone(),
        rcon_tick: tick,
        agent_id,
        tick_started: tick,
        surface: "nauvis".to_string(),
        pending: chunks,
        chunks_total: total,
        files: BTreeMap::new(),
    });
    info!("🗺️ snapshot export started: {} chunks", total);
    Ok((action_id, total))
}

/// Advance the running export by one slice.
pub fn export_slice_tick(world: &mut World) {
    let Some(mut exporter) = world.remove_resource::<SnapshotExporter>() else {
        return;
    };
    if exporter.current.is_none() {
        world.insert_resource(exporter);
        return;
    }
    let chunks_per_tick = world
        .resource::<crate::config::RuntimeConfig>()
        .chunks_per_tick
        .max(1);

    // Collect this slice's documents against the snapshot, then emit.
    let mut documents: Vec<(String, Vec<u8>)> = Vec::new();
    let mut finished: Option<ExportJob> = None;
    {
        let snapshot = world.resource::<WorldSnapshot>();
        let job = exporter.current.as_mut().unwrap();
        let mut slice_files: Vec<(Category, String)> = Vec::new();
        for _ in 0..chunks_per_tick {
            let Some(chunk) = job.pending.pop_front() else {
                break;
            };
            for category in Category::COMPONENT
                .iter()
                .chain([Category::EntityStatus, Category::Water, Category::Inventory].iter())
            {
                let Some(rows) = snapshot.rows(chunk, *category) else {
                    continue;
                };
                if rows.is_empty() {
                    continue;
                }
                let path = format!(
                    "chunks/{}/{}/{}-{}.csv",
                    chunk.x,
                    chunk.y,
                    category.name(),
                    job.tick_started
                );
                documents.push((
                    path.clone(),
                    csv_document(category.headers(), rows.values().collect()),
                ));
                slice_files.push((*category, path));
            }
        }
        for (category, path) in slice_files {
            job.files.entry(category).or_default().push(path);
        }
        if job.pending.is_empty() {
            finished = exporter.current.take();
        }
    }

    for (path, payload) in documents {
        if let Err(e) = exporter.sink.write(&path, &payload) {
            warn!("snapshot export write {} failed: {}", path, e);
        }
    }
    if let Some(job) = &finished {
        let timestamp = chrono::Utc::now().to_rfc3339();
        for (category, files) in &job.files {
            let meta = json!({
                "tick": job.tick_started,
                "surface": job.surface,
                "timestamp": timestamp,
                "headers": category.headers(),
                "files": files,
            });
            let path = format!("metadata/{}/{}.json", job.tick_started, category.name());
            if let Err(e) = exporter
                .sink
                .write(&path, meta.to_string().as_bytes())
            {
                warn!("snapshot metadata write {} failed: {}", path, e);
            }
        }
    }
    world.insert_resource(exporter);

    if let Some(job) = finished {
        info!(
            "🗺️ snapshot export finished: {} chunks, started tick {}",
            job.chunks_total, job.tick_started
        );
        world.send_event(ActionCompletedEvent {
            action_id: job.action_id.clone(),
            agent_id: job.agent_id,
            action_type: "snapshot.export".to_string(),
            rcon_tick: job.rcon_tick,
            success: true,
            cancelled: None,
            result: json!({
                "chunks": job.chunks_total,
                "categories": job.files.keys().map(|c| c.name()).collect::<Vec<_>>(),
            }),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_cell_escaping() {
        assert_eq!(csv_cell("plain"), "plain");
        assert_eq!(csv_cell("a,b"), "\"a,b\"");
        assert_eq!(csv_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_document_shape() {
        let rows = vec![
            vec!["1.5".to_string(), "2".to_string(), "pipe".to_string()],
        ];
        let doc = csv_document(
            &["position_x", "position_y", "entity_name"],
            rows.iter().collect(),
        );
        let text = String::from_utf8(doc).unwrap();
        assert_eq!(text, "position_x,position_y,entity_name\n1.5,2,pipe\n");
    }
}
