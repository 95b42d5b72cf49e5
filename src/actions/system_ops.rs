/// Housekeeping actions: no-op, explicit chart registration, snapshot
/// export kick-off.
use bevy::math::IVec2;
use bevy::prelude::*;
use serde_json::json;

use crate::errors::ActionResult;
use crate::params::{ParamInstance, ParamKind, ParamSpec};

use super::registry::{ActionSpec, RunOutput};

pub fn actions() -> Vec<Box<dyn ActionSpec>> {
    vec![
        Box::new(Noop),
        Box::new(RegisterChartArea),
        Box::new(SnapshotExport),
    ]
}

/// Does nothing, successfully. Queue and backpressure tests lean on it.
struct Noop;

impl ActionSpec for Noop {
    fn name(&self) -> &'static str {
        "system.noop"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new().opt("payload", ParamKind::Any)
    }

    fn run(&self, _world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let payload = if params.has("payload") {
            params.to_value()["payload"].clone()
        } else {
            serde_json::Value::Null
        };
        Ok(RunOutput::sync(json!({ "payload": payload })))
    }
}

/// Explicitly register a tile-space rect as charted; the fallback for
/// unattended hosts where no human actor ever reveals chunks.
struct RegisterChartArea;

impl ActionSpec for RegisterChartArea {
    fn name(&self) -> &'static str {
        "chart.register_area"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new()
            .required("min", ParamKind::Position)
            .required("max", ParamKind::Position)
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let min = params.get_position("min")?;
        let max = params.get_position("max")?;
        let added = world
            .resource_mut::<crate::world::ChartedChunks>()
            .register_area(
                IVec2::new(min.x.floor() as i32, min.y.floor() as i32),
                IVec2::new(max.x.floor() as i32, max.y.floor() as i32),
            );
        Ok(RunOutput::sync(json!({ "chunks_registered": added })))
    }
}

/// Kick off a sliced chunked export of the snapshot.
struct SnapshotExport;

impl ActionSpec for SnapshotExport {
    fn name(&self) -> &'static str {
        "snapshot.export"
    }

    fn param_spec(&self) -> ParamSpec {
        ParamSpec::new().optional("agent_id", ParamKind::Number, json!(0))
    }

    fn run(&self, world: &mut World, params: &ParamInstance) -> ActionResult<RunOutput> {
        let agent_id = params.get_u32("agent_id")?;
        let (action_id, chunks) = crate::snapshot::start_export(world, agent_id)?;
        Ok(RunOutput::queued(action_id, json!({ "chunks": chunks })))
    }
}
