/// Signals framework: schema registry plus per-namespace subscriptions
/// sampled on tick cadence and published to byte sinks.
///
/// A schema is an extractor over the live world; a subscription pairs one
/// schema with a namespace, a cadence `(every, offset)` and a sink.
/// Extractor and sink failures are logged and never abort the tick.
use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::prelude::*;
use serde_json::{json, Value};

use crate::sinks::{Sink, SinkKind};
use crate::simulation::{should_tick, SimulationSet, SimulationTick};

/// Sampling context inferred from the namespace prefix
/// (`force:<name>`, `surface:<name>`).
#[derive(Debug, Clone)]
pub struct SignalCtx {
    pub namespace: String,
    pub force: Option<String>,
    pub surface: Option<String>,
}

impl SignalCtx {
    pub fn from_namespace(namespace: &str) -> Self {
        let (force, surface) = match namespace.split_once(':') {
            Some(("force", name)) => (Some(name.to_string()), None),
            Some(("surface", name)) => (None, Some(name.to_string())),
            _ => (None, None),
        };
        Self {
            namespace: namespace.to_string(),
            force,
            surface,
        }
    }
}

pub type ExtractFn = dyn Fn(&SignalCtx, &World) -> Result<Value, String> + Send + Sync;

#[derive(Clone)]
pub struct SignalSchema {
    pub id: String,
    pub version: u32,
    pub describe: Option<String>,
    pub extract: Arc<ExtractFn>,
}

impl SignalSchema {
    pub fn new<F>(id: &str, version: u32, describe: Option<&str>, extract: F) -> Self
    where
        F: Fn(&SignalCtx, &World) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            version,
            describe: describe.map(str::to_string),
            extract: Arc::new(extract),
        }
    }
}

#[derive(Resource, Default)]
pub struct SignalRegistry {
    schemas: BTreeMap<String, SignalSchema>,
}

impl SignalRegistry {
    pub fn register(&mut self, schema: SignalSchema) {
        self.schemas.insert(schema.id.clone(), schema);
    }

    pub fn get(&self, id: &str) -> Option<&SignalSchema> {
        self.schemas.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }
}

pub struct Subscription {
    pub namespace: String,
    pub schema_id: String,
    pub every: u64,
    pub offset: u64,
    pub meta: Value,
    pub seq: u64,
    sink: Sink,
}

#[derive(Resource, Default)]
pub struct SignalSubscriptions {
    subs: Vec<Subscription>,
}

impl SignalSubscriptions {
    pub fn subscribe(
        &mut self,
        namespace: &str,
        schema_id: &str,
        every: u64,
        offset: u64,
        sink_kind: SinkKind,
        meta: Value,
    ) {
        self.subs.push(Subscription {
            namespace: namespace.to_string(),
            schema_id: schema_id.to_string(),
            every: every.max(1),
            offset,
            meta,
            seq: 0,
            sink: Sink::new(sink_kind),
        });
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

/// Sample every due subscription for this tick.
pub fn sample_signals(world: &mut World) {
    let tick = world.resource::<SimulationTick>().get();
    let Some(mut subs) = world.remove_resource::<SignalSubscriptions>() else {
        return;
    };
    let registry = world
        .remove_resource::<SignalRegistry>()
        .unwrap_or_default();

    for sub in subs.subs.iter_mut() {
        if (tick + sub.offset) % sub.every != 0 {
            continue;
        }
        let Some(schema) = registry.get(&sub.schema_id) else {
            warn!("signal subscription references unknown schema '{}'", sub.schema_id);
            continue;
        };
        let ctx = SignalCtx::from_namespace(&sub.namespace);
        let data = match (schema.extract)(&ctx, world) {
            Ok(data) => data,
            Err(e) => {
                warn!("signal extractor '{}' failed: {}", schema.id, e);
                continue;
            }
        };
        let envelope = json!({
            "type": "signal",
            "schema": {"id": schema.id, "version": schema.version},
            "namespace": sub.namespace,
            "seq": sub.seq,
            "tick": tick,
            "meta": sub.meta,
            "data": data,
        });
        let topic = format!("signals/{}.jsonl", sub.namespace.replace(':', "_"));
        if let Err(e) = sub.sink.append(&topic, envelope.to_string().as_bytes()) {
            warn!("signal sink for '{}' failed: {}", sub.namespace, e);
            continue;
        }
        sub.seq += 1;
    }

    world.insert_resource(registry);
    world.insert_resource(subs);
}

// ============================================================================
// BUILT-IN SCHEMAS
// ============================================================================

pub fn register_default_schemas(registry: &mut SignalRegistry) {
    registry.register(SignalSchema::new(
        "agents.positions",
        1,
        Some("agent ids with positions and walking state"),
        |_ctx, world| {
            let agent_ids = world
                .resource::<crate::agents::AgentRegistry>()
                .ids();
            let mut out = Vec::new();
            for agent_id in agent_ids {
                let Ok(entity) = crate::agents::resolve_agent(world, agent_id) else {
                    continue;
                };
                let pos = world
                    .get::<crate::agents::AgentPosition>(entity)
                    .map(|p| p.pos)
                    .unwrap_or_default();
                let walking = world
                    .get::<crate::agents::WalkingState>(entity)
                    .map(|w| w.walking)
                    .unwrap_or(false);
                out.push(json!({
                    "agent_id": agent_id,
                    "x": pos.x,
                    "y": pos.y,
                    "walking": walking,
                }));
            }
            Ok(Value::Array(out))
        },
    ));

    registry.register(SignalSchema::new(
        "queue.depth",
        1,
        Some("action queue depth and counters"),
        |_ctx, world| {
            let queue = world.resource::<crate::actions::ActionQueue>();
            Ok(json!({
                "pending": queue.len(),
                "enqueued": queue.stats.enqueued,
                "processed": queue.stats.processed,
                "rejected": queue.stats.rejected,
            }))
        },
    ));

    registry.register(SignalSchema::new(
        "entities.count",
        1,
        Some("map entity count and charted chunk count"),
        |_ctx, world| {
            let index = world.resource::<crate::world::entity_map::WorldIndex>();
            let charted = world.resource::<crate::world::chunks::ChartedChunks>();
            Ok(json!({
                "entities": index.len(),
                "charted_chunks": charted.charted(false).len(),
            }))
        },
    ));
}

pub struct SignalsPlugin;

impl Plugin for SignalsPlugin {
    fn build(&self, app: &mut App) {
        let mut registry = SignalRegistry::default();
        register_default_schemas(&mut registry);
        app.insert_resource(registry)
            .init_resource::<SignalSubscriptions>()
            .add_systems(
                Update,
                sample_signals
                    .in_set(SimulationSet::Signals)
                    .run_if(should_tick),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_context_parsing() {
        let force = SignalCtx::from_namespace("force:player");
        assert_eq!(force.force.as_deref(), Some("player"));
        assert!(force.surface.is_none());

        let surface = SignalCtx::from_namespace("surface:nauvis");
        assert_eq!(surface.surface.as_deref(), Some("nauvis"));

        let plain = SignalCtx::from_namespace("telemetry");
        assert!(plain.force.is_none() && plain.surface.is_none());
    }

    #[test]
    fn test_cadence_due_check() {
        // (tick + offset) % every == 0
        let due = |tick: u64, every: u64, offset: u64| (tick + offset) % every == 0;
        assert!(due(0, 30, 0));
        assert!(!due(15, 30, 0));
        assert!(due(25, 30, 5));
    }
}
