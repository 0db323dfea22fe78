//! Land/ocean classification: the head of the land pipeline (poles, the
//! shore split with depth-graded ocean terrain, the placement map, and the
//! terrain budgets).

use crate::world::generate::{
    height::{normalize_hmap_poles, renormalize_hmap_poles},
    placement::PlacementMap,
    Generate, TerrainBudgets, WorldBuilder, OCEAN_DEPTH_MAX,
};

/// Classifies every tile as ocean or land from the height field.
///
/// Order inside this stage is part of the pipeline contract:
/// 1. normalize pole heights (when poles exist),
/// 2. split tiles at the shore level, assigning depth-graded ocean terrain
///    and leaving land in the land-fill state,
/// 3. renormalize pole heights,
/// 4. create the placement map and mark every ocean tile placed,
/// 5. compute the terrain budget percentages.
#[derive(Debug)]
pub(crate) struct LandGenerator;

impl Generate for LandGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        normalize_hmap_poles(world);

        let (w, h) = (world.width(), world.height());
        for x in 0..w {
            for y in 0..h {
                let elevation = *world.heights.get(x, y);
                if elevation < world.shore_level {
                    let depth = ocean_depth(world, x, y, elevation);
                    let terrain = world.ruleset.pick_ocean(depth);
                    world.tiles.get_mut(x, y).set_terrain(terrain);
                }
                // Land stays unset: that is the land-fill state the
                // placement passes will commit over.
            }
        }

        renormalize_hmap_poles(world);

        let mut placed = PlacementMap::new(w, h);
        placed.set_all_ocean_tiles_placed(&world.tiles);
        world.placed = Some(placed);

        world.budgets = TerrainBudgets::for_config(world.config);
        Ok(())
    }
}

/// Depth of a new ocean tile: how far below the shore it sits, pulled
/// shallower when the 3x3 neighborhood is mostly land.
fn ocean_depth(world: &WorldBuilder, x: u32, y: u32, elevation: i32) -> i32 {
    let shore = world.shore_level.max(1);
    let mut depth = (shore - elevation) * 100 / shore;

    let mut neighbors = 0;
    let mut land_neighbors = 0;
    for (nx, ny) in world.heights.neighbors8(x, y) {
        neighbors += 1;
        if *world.heights.get(nx, ny) >= world.shore_level {
            land_neighbors += 1;
        }
    }
    if neighbors > 0 {
        depth -= 30 * land_neighbors / neighbors;
    }
    depth.clamp(0, OCEAN_DEPTH_MAX)
}
