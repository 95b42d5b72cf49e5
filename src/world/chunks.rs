/// Chunk coordinates and the charted-chunk registry.
///
/// A chunk is a fixed 32x32-tile region. The set of charted chunks is the
/// union of what the engine charted through play and areas registered
/// explicitly, the fallback for unattended headless hosts where no human
/// actor ever reveals the map.
use std::collections::BTreeSet;

use bevy::math::{IVec2, Vec2};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub const CHUNK_SIZE: i32 = 32;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn from_tile(tile: IVec2) -> Self {
        Self {
            x: tile.x.div_euclid(CHUNK_SIZE),
            y: tile.y.div_euclid(CHUNK_SIZE),
        }
    }

    pub fn from_position(pos: Vec2) -> Self {
        Self::from_tile(crate::types::tile_of(pos))
    }

    /// Tile-bounded rect `[min, max)` covered by this chunk.
    pub fn tile_bounds(&self) -> (IVec2, IVec2) {
        let min = IVec2::new(self.x * CHUNK_SIZE, self.y * CHUNK_SIZE);
        (min, min + IVec2::splat(CHUNK_SIZE))
    }

    /// Squared distance to the origin chunk, in chunk units. Integer
    /// arithmetic keeps the ordering deterministic.
    pub fn dist2_to_origin(&self) -> i64 {
        let x = self.x as i64;
        let y = self.y as i64;
        x * x + y * y
    }
}

/// Registry of charted chunks: engine-charted plus explicit registrations.
#[derive(Resource, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ChartedChunks {
    engine: BTreeSet<ChunkCoord>,
    registered: BTreeSet<ChunkCoord>,
}

impl ChartedChunks {
    pub fn chart(&mut self, chunk: ChunkCoord) {
        self.engine.insert(chunk);
    }

    pub fn register(&mut self, chunk: ChunkCoord) {
        self.registered.insert(chunk);
    }

    /// Register every chunk overlapping the tile-space rect `[min, max]`.
    pub fn register_area(&mut self, min: IVec2, max: IVec2) -> usize {
        let lo = ChunkCoord::from_tile(min);
        let hi = ChunkCoord::from_tile(max);
        let mut added = 0;
        for cy in lo.y..=hi.y {
            for cx in lo.x..=hi.x {
                if self.registered.insert(ChunkCoord::new(cx, cy)) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn is_charted(&self, chunk: ChunkCoord) -> bool {
        self.engine.contains(&chunk) || self.registered.contains(&chunk)
    }

    /// Union of engine-charted and registered chunks. With
    /// `sort_by_distance` the result is ordered by squared distance to the
    /// origin, ties broken by coordinate order.
    pub fn charted(&self, sort_by_distance: bool) -> Vec<ChunkCoord> {
        let mut all: Vec<ChunkCoord> =
            self.engine.union(&self.registered).copied().collect();
        if sort_by_distance {
            all.sort_by_key(|c| (c.dist2_to_origin(), c.x, c.y));
        }
        all
    }

    pub fn engine_charted_count(&self) -> usize {
        self.engine.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_from_negative_tiles() {
        assert_eq!(
            ChunkCoord::from_tile(IVec2::new(-1, -33)),
            ChunkCoord::new(-1, -2)
        );
        assert_eq!(
            ChunkCoord::from_tile(IVec2::new(31, 32)),
            ChunkCoord::new(0, 1)
        );
    }

    #[test]
    fn test_register_area_covers_overlapping_chunks() {
        let mut charted = ChartedChunks::default();
        let added = charted.register_area(IVec2::new(-10, -10), IVec2::new(40, 10));
        // x chunks: -1, 0, 1; y chunks: -1, 0
        assert_eq!(added, 6);
        assert!(charted.is_charted(ChunkCoord::new(-1, -1)));
        assert!(charted.is_charted(ChunkCoord::new(1, 0)));
        assert!(!charted.is_charted(ChunkCoord::new(2, 0)));
    }

    #[test]
    fn test_union_and_distance_ordering() {
        let mut charted = ChartedChunks::default();
        charted.chart(ChunkCoord::new(2, 2));
        charted.register(ChunkCoord::new(0, 0));
        charted.register(ChunkCoord::new(-1, 0));
        let ordered = charted.charted(true);
        assert_eq!(ordered[0], ChunkCoord::new(0, 0));
        assert_eq!(ordered[1], ChunkCoord::new(-1, 0));
        assert_eq!(ordered[2], ChunkCoord::new(2, 2));
    }

    #[test]
    fn test_empty_sources_do_not_crash() {
        let charted = ChartedChunks::default();
        assert!(charted.charted(true).is_empty());
    }
}
