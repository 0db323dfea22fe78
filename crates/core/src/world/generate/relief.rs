//! Hills and mountains. Relief is driven by the height field relative to the
//! mountain level, with a flatness rescue so large plains still get some
//! texture, plus per-generator policy tweaks.

use crate::{
    config::Generator,
    ruleset::TerrainProperty,
    world::{
        generate::{Generate, WorldBuilder, HMAX},
        grid::chebyshev_distance,
        Terrain,
    },
};
use rand::Rng;

/// Places hills/mountains on unplaced land tiles. The fracture generator
/// uses its own two-pass algorithm; everything else shares the base rule
/// with generator-specific acceptance modifiers.
#[derive(Debug)]
pub(crate) struct ReliefGenerator;

impl Generate for ReliefGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        if world.config.generator == Generator::Fracture {
            fracture_relief(world)
        } else {
            standard_relief(world)
        }
    }
}

fn standard_relief(world: &mut WorldBuilder) -> anyhow::Result<()> {
    let (w, h) = (world.width(), world.height());
    for x in 0..w {
        for y in 0..h {
            if world.tiles.get(x, y).is_water() || !world.not_placed(x, y) {
                continue;
            }

            let elevation = *world.heights.get(x, y);
            let steep = elevation > world.mountain_level
                && (world.rng.gen::<f64>() > 0.5 || !terrain_is_too_high(world, x, y));
            if !steep && !area_is_too_flat(world, x, y) {
                continue;
            }

            // Generator policy: islands damp relief (hardest on the
            // interior), the random generator just adds mild variety.
            let (acceptance, hill_chance) = match world.config.generator {
                Generator::Island | Generator::Fair => {
                    if distance_to_coast(world, x, y, 3).is_some() {
                        (0.8, 0.7)
                    } else {
                        (0.7, 0.7)
                    }
                }
                Generator::Random => {
                    let factor = if world.rng.gen::<f64>() < 0.5 {
                        1.1
                    } else {
                        1.0 / 1.1
                    };
                    (factor, 0.5)
                }
                _ => (1.0, 0.5),
            };
            if world.rng.gen::<f64>() >= acceptance {
                continue;
            }

            let terrain = if world.rng.gen::<f64>() < hill_chance {
                pick_hills(world)
            } else {
                pick_mountains(world)
            };
            world.place_terrain(x, y, terrain)?;
        }
    }
    Ok(())
}

/// Fracture relief runs two passes: a local-average comparison that turns
/// sharp height contrast into relief (skipping the coastline entirely), then
/// a sprinkle pass that tops the map up to the steepness quota.
fn fracture_relief(world: &mut WorldBuilder) -> anyhow::Result<()> {
    let (w, h) = (world.width(), world.height());
    let mut relief_count = 0usize;

    for x in 0..w {
        for y in 0..h {
            if world.tiles.get(x, y).is_water()
                || !world.not_placed(x, y)
                || distance_to_coast(world, x, y, 1).is_some()
            {
                continue;
            }
            let elevation = *world.heights.get(x, y);
            if elevation <= world.shore_level {
                continue;
            }
            let local_avg = world.local_average_elevation(x, y).max(1);

            if elevation * 10 > local_avg * 12
                || (area_is_too_flat(world, x, y) && world.rng.gen::<f64>() < 0.4)
            {
                let terrain = pick_mountains(world);
                world.place_terrain(x, y, terrain)?;
                relief_count += 1;
            } else if elevation * 10 > local_avg * 11
                || (area_is_too_flat(world, x, y) && world.rng.gen::<f64>() < 0.4)
            {
                let terrain = pick_hills(world);
                world.place_terrain(x, y, terrain)?;
                relief_count += 1;
            }
        }
    }

    // Sprinkle pass: keep seeding 0.1%-probability relief until the
    // steepness quota is reached or the iteration cap runs out.
    let min_relief = world.land_tile_count() * world.config.steepness as usize / 100;
    let mut iterations = 0;
    while relief_count < min_relief && iterations < 50 {
        iterations += 1;
        for x in 0..w {
            for y in 0..h {
                if world.tiles.get(x, y).is_water() || !world.not_placed(x, y) {
                    continue;
                }
                if world.rng.gen::<f64>() >= 0.001 {
                    continue;
                }
                let terrain = if world.rng.gen::<f64>() < 0.5 {
                    pick_hills(world)
                } else {
                    pick_mountains(world)
                };
                world.place_terrain(x, y, terrain)?;
                relief_count += 1;
            }
        }
    }
    Ok(())
}

fn pick_hills(world: &mut WorldBuilder) -> Terrain {
    world.ruleset.pick_terrain(
        Some(TerrainProperty::Mountainous),
        Some(TerrainProperty::Green),
        None,
        &mut world.rng,
    )
}

fn pick_mountains(world: &mut WorldBuilder) -> Terrain {
    world.ruleset.pick_terrain(
        Some(TerrainProperty::Mountainous),
        None,
        Some(TerrainProperty::Green),
        &mut world.rng,
    )
}

/// Dense high plateau test: every 3x3 neighbor is (nearly) at mountain level
/// already, so another peak would just flatten the skyline.
fn terrain_is_too_high(world: &WorldBuilder, x: u32, y: u32) -> bool {
    let slack = (HMAX - world.mountain_level) / 5;
    world
        .heights
        .square(x, y, 1)
        .all(|(nx, ny)| *world.heights.get(nx, ny) + slack >= world.mountain_level)
}

/// Flatness test over the 5x5 neighborhood: the area needs relief only when
/// nothing nearby is above the mountain level, nothing adjacent is higher
/// than this tile, at most 2 distant neighbors are higher, and the relative
/// height inequality doesn't rule it out.
fn area_is_too_flat(world: &WorldBuilder, x: u32, y: u32) -> bool {
    let my_height = *world.heights.get(x, y);
    let mut higher_than_me = 0;
    for (nx, ny) in world.heights.square(x, y, 2) {
        let neighbor = *world.heights.get(nx, ny);
        if neighbor > world.mountain_level {
            return false;
        }
        if neighbor > my_height {
            if chebyshev_distance((x, y), (nx, ny)) == 1 {
                return false;
            }
            higher_than_me += 1;
            if higher_than_me > 2 {
                return false;
            }
        }
    }
    (world.mountain_level - world.shore_level) * higher_than_me
        <= (my_height - world.shore_level) * 4
}

/// Chebyshev distance to the nearest water tile, when within `max` steps.
fn distance_to_coast(world: &WorldBuilder, x: u32, y: u32, max: u32) -> Option<u32> {
    for radius in 1..=max {
        for (nx, ny) in world.tiles.square(x, y, radius) {
            if chebyshev_distance((x, y), (nx, ny)) == radius && world.tiles.get(nx, ny).is_water()
            {
                return Some(radius);
            }
        }
    }
    None
}
