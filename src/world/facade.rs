/// Game-state facade: a thin read model over the live world for action
/// bodies and validators.
///
/// Nothing mutable is cached; every accessor resolves live handles at call
/// time, so holding a `GameState` across ticks is impossible by
/// construction (it borrows the world).
use bevy::math::Vec2;
use bevy::prelude::*;

use crate::agents::{resolve_agent, AgentPosition};
use crate::errors::ActionResult;
use crate::types::AgentId;
use crate::world::chunks::{ChartedChunks, ChunkCoord};
use crate::world::entity_map::WorldIndex;

pub struct GameState<'w> {
    world: &'w World,
}

impl<'w> GameState<'w> {
    pub fn new(world: &'w World) -> Self {
        Self { world }
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<crate::simulation::SimulationTick>().get()
    }

    pub fn agent(&self, agent_id: AgentId) -> ActionResult<Entity> {
        resolve_agent(self.world, agent_id)
    }

    pub fn agent_position(&self, agent_id: AgentId) -> ActionResult<Vec2> {
        let entity = self.agent(agent_id)?;
        Ok(self
            .world
            .get::<AgentPosition>(entity)
            .map(|p| p.pos)
            .unwrap_or_default())
    }

    pub fn entity_at(&self, position: Vec2, name: &str) -> Option<Entity> {
        self.world
            .resource::<WorldIndex>()
            .get(position, name)
            .filter(|e| self.world.get_entity(*e).is_ok())
    }

    /// Union of engine-charted chunks and explicit registrations, the
    /// fallback for unattended hosts.
    pub fn charted_chunks(&self, sort_by_distance: bool) -> Vec<ChunkCoord> {
        self.world
            .resource::<ChartedChunks>()
            .charted(sort_by_distance)
    }
}
