//! The temperature field: a continuous heat value per tile (latitude,
//! cooled by elevation, moderated by ocean proximity), equalized and then
//! discretized into the four temperature classes.
//!
//! This must run before any climate-gated terrain placement.

use crate::{
    util::adjust_int_map_filtered,
    world::{
        generate::{Generate, WorldBuilder, HMAX, MAX_COLATITUDE},
        grid::Grid,
    },
};

/// Fraction of the heat scale clipped off both ends by equalization.
const EQUALIZE_MARGIN: i32 = MAX_COLATITUDE / 10;

#[derive(Debug)]
pub(crate) struct TemperatureGenerator;

impl Generate for TemperatureGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let (w, h) = (world.width(), world.height());
        let mut field = Grid::filled(w, h, 0i32);

        // Phase 1: continuous heat per tile
        for x in 0..w {
            for y in 0..h {
                field.set(x, y, continuous_heat(world, x, y));
            }
        }
        adjust_int_map_filtered(
            &mut field,
            EQUALIZE_MARGIN,
            MAX_COLATITUDE - EQUALIZE_MARGIN,
            |_, _| true,
        );

        // Phase 2: discretize into classes
        for x in 0..w {
            for y in 0..h {
                let class = world.climate.classify(*field.get(x, y));
                world.tiles.get_mut(x, y).set_temperature(class);
            }
        }

        world.temperature_field = if world.config.cleanup_temperature_map {
            None
        } else {
            Some(field)
        };
        Ok(())
    }
}

fn continuous_heat(world: &WorldBuilder, x: u32, y: u32) -> i32 {
    // Equator hot, poles cold
    let mut heat = f64::from(world.heat_latitude(x, y));

    // Multiplicative elevation cooling, up to -30% at peak land
    let elevation = *world.heights.get(x, y);
    if elevation > world.shore_level && HMAX > world.shore_level {
        let above = f64::from(elevation - world.shore_level)
            / f64::from(HMAX - world.shore_level);
        heat *= 1.0 - 0.3 * above.min(1.0);
    }

    // Ocean proximity moderates toward the configured temperature lever,
    // up to 15% for a tile fully surrounded by water
    let mut water = 0usize;
    let mut total = 0usize;
    for (nx, ny) in world.tiles.square(x, y, 2) {
        total += 1;
        if world.tiles.get(nx, ny).is_water() {
            water += 1;
        }
    }
    if total > 0 && water > 0 {
        let blend = 0.15 * water as f64 / total as f64;
        let target = f64::from(MAX_COLATITUDE) * f64::from(world.config.temperature) / 100.0;
        heat = heat * (1.0 - blend) + target * blend;
    }

    heat.round() as i32
}
