/// Demo world layout for the headless server: resource patches, trees, a
/// lake and a starter factory, all placed from the seeded RNG so every run
/// with the same seed produces the same map.
use bevy::math::{IVec2, Vec2};
use bevy::prelude::*;
use rand::Rng;
use rand_pcg::Pcg64;

use crate::types::tile_center;
use crate::world::chunks::ChartedChunks;
use crate::world::entity_map::{spawn_placed, spawn_resource};
use crate::world::terrain::Terrain;
use crate::types::Direction;

fn ore_patch(
    world: &mut World,
    rng: &mut Pcg64,
    resource: &str,
    center: IVec2,
    radius: i32,
) -> usize {
    let mut placed = 0;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let amount = rng.gen_range(400..1600);
            let tile = IVec2::new(center.x + dx, center.y + dy);
            if spawn_resource(world, resource, tile_center(tile), amount).is_ok() {
                placed += 1;
            }
        }
    }
    placed
}

/// Lay out the demo map. Safe to call exactly once at startup.
pub fn generate_demo_world(world: &mut World, seed: u64) {
    use rand::SeedableRng;
    let mut rng = Pcg64::seed_from_u64(seed);

    // A lake south-west of spawn.
    {
        let mut terrain = world.resource_mut::<Terrain>();
        for dy in 0..6 {
            for dx in 0..9 {
                terrain.add_water(IVec2::new(-20 + dx, -18 + dy));
            }
        }
    }
    {
        let terrain = world.resource::<Terrain>();
        let water: Vec<IVec2> = terrain.water_tiles().collect();
        let mut grid = world.resource_mut::<crate::pathfinding::PathfindingGrid>();
        for tile in water {
            grid.block(tile);
        }
    }

    // Resource patches at fixed bearings, radii jittered by the seed.
    let iron = ore_patch(world, &mut rng, "iron-ore", IVec2::new(12, 6), 3);
    let copper = ore_patch(world, &mut rng, "copper-ore", IVec2::new(-14, 8), 3);
    let coal = ore_patch(world, &mut rng, "coal", IVec2::new(8, -12), 2);
    let stone = ore_patch(world, &mut rng, "stone", IVec2::new(-6, -10), 2);

    // A scattering of trees.
    let mut trees = 0;
    for _ in 0..24 {
        let tile = IVec2::new(rng.gen_range(-24..24), rng.gen_range(12..26));
        if spawn_resource(world, "tree-01", tile_center(tile), 1).is_ok() {
            trees += 1;
        }
    }

    // Starter factory: furnace, chest, a short belt run and a pole.
    let _ = spawn_placed(world, "stone-furnace", tile_center(IVec2::new(3, 2)), Direction::North);
    let _ = spawn_placed(world, "wooden-chest", tile_center(IVec2::new(5, 2)), Direction::North);
    let _ = spawn_placed(world, "small-electric-pole", tile_center(IVec2::new(4, 4)), Direction::North);
    for i in 0..4 {
        let _ = spawn_placed(
            world,
            "transport-belt",
            tile_center(IVec2::new(3 + i, 0)),
            Direction::East,
        );
    }

    // Chart the home area so exports work without any human actor.
    world
        .resource_mut::<ChartedChunks>()
        .register_area(IVec2::new(-32, -32), IVec2::new(32, 32));

    info!(
        "🌍 demo world: {} iron, {} copper, {} coal, {} stone tiles, {} trees",
        iron, copper, coal, stone, trees
    );
}

/// Convenience for tests: a single deposit at an exact position.
pub fn place_deposit(world: &mut World, resource: &str, position: Vec2, amount: u32) {
    let _ = spawn_resource(world, resource, position, amount);
}
