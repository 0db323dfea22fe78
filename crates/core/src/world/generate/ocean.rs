//! Ocean depth classes: coast near land, deep ocean far from it, then a
//! majority-smoothing pass that cleans up speckle.

use crate::world::{
    generate::{Generate, WorldBuilder, OCEAN_DEPTH_MAX},
    grid::chebyshev_distance,
    Terrain,
};
use rand::Rng;

/// Distance-to-land is only measured out to this many tiles; everything
/// further is equally deep.
const MAX_LAND_DISTANCE: u32 = 4;

#[derive(Debug)]
pub(crate) struct OceanGenerator;

impl Generate for OceanGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let (w, h) = (world.width(), world.height());

        // Depth by distance to land, with a little noise so the coastline
        // bands don't look machine-cut
        for x in 0..w {
            for y in 0..h {
                if !world.tiles.get(x, y).is_water() {
                    continue;
                }
                let dist = distance_to_land(world, x, y);
                let depth = (dist as i32 * 25 + world.rng.gen_range(0..15)).min(OCEAN_DEPTH_MAX);
                let terrain = world.ruleset.pick_ocean(depth);
                world.tiles.get_mut(x, y).set_terrain(terrain);
            }
        }

        // 2/3 majority smoothing, committed in one shot so earlier adoptions
        // don't cascade within the pass
        let mut adopted: Vec<(u32, u32, Terrain)> = Vec::new();
        for x in 0..w {
            for y in 0..h {
                let current = match world.tiles.get(x, y).terrain_opt() {
                    Some(t) if t.is_open_water() => t,
                    _ => continue,
                };
                let mut counts = [(Terrain::Coast, 0u32), (Terrain::Ocean, 0), (Terrain::DeepOcean, 0)];
                for (nx, ny) in world.tiles.neighbors8(x, y) {
                    if let Some(neighbor) = world.tiles.get(nx, ny).terrain_opt() {
                        for entry in counts.iter_mut() {
                            if entry.0 == neighbor {
                                entry.1 += 1;
                            }
                        }
                    }
                }
                for (terrain, count) in counts {
                    if terrain != current && count >= 5 {
                        adopted.push((x, y, terrain));
                        break;
                    }
                }
            }
        }
        for (x, y, terrain) in adopted {
            world.tiles.get_mut(x, y).set_terrain(terrain);
        }
        Ok(())
    }
}

/// Chebyshev distance to the nearest land tile, bounded at
/// [MAX_LAND_DISTANCE].
fn distance_to_land(world: &WorldBuilder, x: u32, y: u32) -> u32 {
    for radius in 1..=MAX_LAND_DISTANCE {
        for (nx, ny) in world.tiles.square(x, y, radius) {
            if chebyshev_distance((x, y), (nx, ny)) == radius
                && !world.tiles.get(nx, ny).is_water()
            {
                return radius;
            }
        }
    }
    MAX_LAND_DISTANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GenConfig, ruleset::TerrainRuleset};

    fn world_with_island<'a>(
        config: &'a GenConfig,
        ruleset: &'a TerrainRuleset,
    ) -> WorldBuilder<'a> {
        let mut world = WorldBuilder::new(config, ruleset, None);
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            // A land blob in the middle, everything else generic ocean
            if (6..=9).contains(&x) && (6..=9).contains(&y) {
                world.tiles.get_mut(x, y).set_terrain(Terrain::Grassland);
            } else {
                world.tiles.get_mut(x, y).set_terrain(Terrain::Ocean);
            }
        }
        world
    }

    #[test]
    fn test_depth_bands() {
        let config = GenConfig {
            width: 16,
            height: 16,
            seed: 13u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = world_with_island(&config, &ruleset);
        OceanGenerator.generate(&mut world).unwrap();

        // Adjacent to land: depth 25..40 picks regular ocean at most; the
        // far corner is pinned to deep ocean
        let beside = world.tiles.get(10, 7).terrain_opt().unwrap();
        assert!(matches!(beside, Terrain::Coast | Terrain::Ocean));
        assert_eq!(world.tiles.get(0, 15).terrain_opt().unwrap(), Terrain::DeepOcean);
        // Land is untouched
        assert_eq!(world.tiles.get(7, 7).terrain_opt().unwrap(), Terrain::Grassland);
    }

    #[test]
    fn test_open_sea_is_uniformly_deep() {
        let config = GenConfig {
            width: 9,
            height: 9,
            seed: 13u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = WorldBuilder::new(&config, &ruleset, None);
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            world.tiles.get_mut(x, y).set_terrain(Terrain::Ocean);
        }
        // No land anywhere: distance caps out everywhere and the pass (with
        // its smoothing step) settles on deep ocean across the board
        OceanGenerator.generate(&mut world).unwrap();
        assert!(world
            .tiles
            .cells()
            .all(|t| t.terrain_opt() == Some(Terrain::DeepOcean)));
    }
}
