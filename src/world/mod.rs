/// World substrate: prototype catalog, inventories, chunked charting,
/// terrain, the placed-entity index and the demo world generator.
pub mod chunks;
pub mod entity_map;
pub mod facade;
pub mod inventory;
pub mod prototypes;
pub mod terrain;
pub mod worldgen;

pub use chunks::{ChartedChunks, ChunkCoord, CHUNK_SIZE};
pub use entity_map::{
    remove_placed, spawn_placed, spawn_resource, EntityPlacedEvent, EntityRemovedEvent,
    GroundSpills, Placed, WorldIndex,
};
pub use facade::GameState;
pub use inventory::{Inventory, InventoryKind, ItemStackRequest, StackCount};
pub use prototypes::{ForceState, PrototypeCatalog};
pub use terrain::Terrain;

use bevy::prelude::*;

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        let catalog = PrototypeCatalog::default();
        let force = ForceState::new(&catalog);
        app.insert_resource(catalog)
            .insert_resource(force)
            .init_resource::<Terrain>()
            .init_resource::<WorldIndex>()
            .init_resource::<ChartedChunks>()
            .init_resource::<GroundSpills>()
            .add_event::<EntityPlacedEvent>()
            .add_event::<EntityRemovedEvent>();
    }
}
