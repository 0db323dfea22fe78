//! Per-tile wetness, 0..=100: the global wetness lever plus a proximity
//! bonus from nearby water and rivers. Runs after river generation; only the
//! biome transition pass and a few placement predicates consume it.

use crate::world::{
    generate::{Generate, WorldBuilder},
    grid::chebyshev_distance,
};

const PROXIMITY_RADIUS: u32 = 3;

#[derive(Debug)]
pub(crate) struct WetnessGenerator;

impl Generate for WetnessGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let (w, h) = (world.width(), world.height());
        for x in 0..w {
            for y in 0..h {
                let wetness = if world.tiles.get(x, y).is_water() {
                    100
                } else {
                    let base = f64::from(world.config.wetness);
                    let bonus = 0.3 * f64::from(proximity_bonus(world, x, y));
                    (base + bonus).clamp(0.0, 100.0).round() as u8
                };
                world.tiles.get_mut(x, y).set_wetness(wetness);
            }
        }
        Ok(())
    }
}

/// Falloff contributions from water and river tiles within the proximity
/// radius: nearer sources contribute more, rivers more than open water.
fn proximity_bonus(world: &WorldBuilder, x: u32, y: u32) -> u32 {
    let mut bonus = 0;
    for (nx, ny) in world.tiles.square(x, y, PROXIMITY_RADIUS) {
        if (nx, ny) == (x, y) {
            continue;
        }
        let distance = chebyshev_distance((x, y), (nx, ny));
        let falloff = PROXIMITY_RADIUS + 1 - distance;
        let tile = world.tiles.get(nx, ny);
        if tile.is_water() {
            bonus += falloff * 8;
        } else if tile.has_river() {
            bonus += falloff * 12;
        }
    }
    bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GenConfig,
        ruleset::TerrainRuleset,
        world::{grid::Direction, Terrain},
    };

    #[test]
    fn test_wetness_rises_near_water() {
        let config = GenConfig {
            width: 12,
            height: 5,
            seed: 1u64.into(),
            wetness: 40,
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = WorldBuilder::new(&config, &ruleset, None);
        for x in 0..12 {
            for y in 0..5 {
                let terrain = if x < 2 { Terrain::Ocean } else { Terrain::Grassland };
                world.tiles.get_mut(x, y).set_terrain(terrain);
            }
        }
        WetnessGenerator.generate(&mut world).unwrap();

        let coastal = world.tiles.get(2, 2).wetness().unwrap();
        let inland = world.tiles.get(11, 2).wetness().unwrap();
        assert!(coastal > inland, "coastal {} vs inland {}", coastal, inland);
        assert_eq!(inland, 40);
        // Water itself saturates
        assert_eq!(world.tiles.get(0, 0).wetness().unwrap(), 100);
    }

    #[test]
    fn test_rivers_wet_their_surroundings() {
        let config = GenConfig {
            width: 9,
            height: 9,
            seed: 1u64.into(),
            wetness: 30,
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = WorldBuilder::new(&config, &ruleset, None);
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            world.tiles.get_mut(x, y).set_terrain(Terrain::Plains);
        }
        world.tiles.get_mut(4, 4).add_river(Direction::North);
        WetnessGenerator.generate(&mut world).unwrap();

        assert!(world.tiles.get(4, 5).wetness().unwrap() > 30);
        assert_eq!(world.tiles.get(0, 8).wetness().unwrap(), 30);
    }
}
