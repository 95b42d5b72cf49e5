/// Minimal terrain layer: water tiles.
///
/// Water blocks walking and feeds the `water` snapshot category. Everything
/// else is walkable land; machine collision comes from the entity index.
use std::collections::BTreeSet;

use bevy::math::IVec2;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Resource, Debug, Default, Clone, Serialize, Deserialize)]
pub struct Terrain {
    water: BTreeSet<(i32, i32)>,
}

impl Terrain {
    pub fn add_water(&mut self, tile: IVec2) {
        self.water.insert((tile.x, tile.y));
    }

    pub fn is_water(&self, tile: IVec2) -> bool {
        self.water.contains(&(tile.x, tile.y))
    }

    pub fn water_tiles(&self) -> impl Iterator<Item = IVec2> + '_ {
        self.water.iter().map(|&(x, y)| IVec2::new(x, y))
    }

    pub fn water_in_chunk(&self, chunk: super::chunks::ChunkCoord) -> Vec<IVec2> {
        let (min, max) = chunk.tile_bounds();
        self.water
            .range((min.x, min.y)..=(max.x - 1, max.y - 1))
            .filter(|&&(_, y)| y >= min.y && y < max.y)
            .map(|&(x, y)| IVec2::new(x, y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::chunks::ChunkCoord;

    #[test]
    fn test_water_lookup() {
        let mut terrain = Terrain::default();
        terrain.add_water(IVec2::new(3, -4));
        assert!(terrain.is_water(IVec2::new(3, -4)));
        assert!(!terrain.is_water(IVec2::new(3, 4)));
    }

    #[test]
    fn test_water_in_chunk_filters_columns() {
        let mut terrain = Terrain::default();
        terrain.add_water(IVec2::new(1, 1));
        terrain.add_water(IVec2::new(1, 40)); // same column, next chunk up
        terrain.add_water(IVec2::new(40, 1)); // next chunk right
        let rows = terrain.water_in_chunk(ChunkCoord::new(0, 0));
        assert_eq!(rows, vec![IVec2::new(1, 1)]);
    }
}
