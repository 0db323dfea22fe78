//! Height-field construction: the three interchangeable elevation
//! strategies, the shore/mountain thresholds, and polar height scaling.

use crate::{
    config::Generator,
    util::{adjust_int_map_filtered, smooth_int_map},
    world::{
        generate::{Generate, WorldBuilder, HMAX},
        grid::Grid,
    },
};
use rand::Rng;
use rand_pcg::Pcg64;

/// Produces the 0..=HMAX elevation field for the configured generator, then
/// derives the shore and mountain levels. Never fails: degenerate (constant)
/// fields are permitted and simply produce an all-shore or all-ocean world.
#[derive(Debug)]
pub(crate) struct HeightGenerator;

impl Generate for HeightGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let (w, h) = (world.width(), world.height());
        let mut heights = match world.config.generator {
            Generator::Fractal => pseudofractal_heights(&mut world.rng, w, h),
            Generator::Random => random_heights(&mut world.rng, w, h),
            Generator::Fracture => fracture_heights(&mut world.rng, w, h),
            // Island strategies paint their own heights
            Generator::Island | Generator::Fair => Grid::new(w, h),
        };

        // Equalize into the full internal range so the shore threshold below
        // carves off exactly the configured land share.
        adjust_int_map_filtered(&mut heights, 0, HMAX, |_, _| true);
        world.heights = heights;
        world.shore_level = shore_level(world.config.landpercent);
        world.mountain_level = mountain_level(world.shore_level, world.config.steepness);
        Ok(())
    }
}

/// Elevation threshold leaving ~landpercent% of (equalized) tiles above it.
pub(crate) fn shore_level(landpercent: u32) -> i32 {
    HMAX * (100 - landpercent as i32) / 100
}

/// Relief threshold: the top `steepness`% slice of the land elevation range.
pub(crate) fn mountain_level(shore_level: i32, steepness: u32) -> i32 {
    (HMAX - shore_level) * (100 - steepness as i32) / 100 + shore_level
}

/// Pseudo-fractal heights: midpoint-displacement (diamond-square) over the
/// smallest power-of-two square covering the map, cropped to size and
/// smoothed once.
fn pseudofractal_heights(rng: &mut Pcg64, width: u32, height: u32) -> Grid<i32> {
    let longest = width.max(height).max(2) - 1;
    let steps = longest.next_power_of_two() as usize;
    let size = steps + 1;

    let mut field = vec![0i32; size * size];
    let at = |x: usize, y: usize| x * size + y;

    // Seed the four corners
    for &(x, y) in &[(0, 0), (steps, 0), (0, steps), (steps, steps)] {
        field[at(x, y)] = rng.gen_range(0..=HMAX);
    }

    let mut step = steps;
    let mut amplitude = HMAX / 2;
    while step > 1 {
        let half = step / 2;

        // Diamond step: cell centers from their four corners
        for x in (half..size).step_by(step) {
            for y in (half..size).step_by(step) {
                let avg = (field[at(x - half, y - half)]
                    + field[at(x + half, y - half)]
                    + field[at(x - half, y + half)]
                    + field[at(x + half, y + half)])
                    / 4;
                field[at(x, y)] = avg + rng.gen_range(-amplitude..=amplitude);
            }
        }

        // Square step: edge midpoints from their in-bounds axial neighbors
        for x in (0..size).step_by(half) {
            let start = if (x / half) % 2 == 0 { half } else { 0 };
            for y in (start..size).step_by(step) {
                let mut sum = 0i64;
                let mut count = 0i64;
                for (dx, dy) in [(0i64, -(half as i64)), (half as i64, 0), (0, half as i64), (-(half as i64), 0)]
                {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx >= 0 && ny >= 0 && (nx as usize) < size && (ny as usize) < size {
                        sum += i64::from(field[at(nx as usize, ny as usize)]);
                        count += 1;
                    }
                }
                field[at(x, y)] = (sum / count.max(1)) as i32 + rng.gen_range(-amplitude..=amplitude);
            }
        }

        step = half;
        amplitude = (amplitude * 55 / 100).max(1);
    }

    let mut heights = Grid::from_fn(width, height, |x, y| field[at(x as usize, y as usize)]);
    smooth_int_map(&mut heights);
    heights
}

/// Per-tile uniform heights, smoothed by the separable kernel.
fn random_heights(rng: &mut Pcg64, width: u32, height: u32) -> Grid<i32> {
    let mut heights = Grid::filled(width, height, 0i32);
    for x in 0..width {
        for y in 0..height {
            heights.set(x, y, rng.gen_range(0..=HMAX));
        }
    }
    smooth_int_map(&mut heights);
    heights
}

/// Fracture heights: scatter fracture centers and paint a disk of random
/// radius and elevation around each. Centers landing near the border paint
/// depressions, which keeps the map edge oceanic.
fn fracture_heights(rng: &mut Pcg64, width: u32, height: u32) -> Grid<i32> {
    let mut heights = Grid::filled(width, height, 0i32);
    let tiles = f64::from(width) * f64::from(height);
    let num_landmass = 20 + 15 * (tiles.sqrt() as i32 / 10);
    let max_radius = (width.min(height) / 5).max(4);

    for _ in 0..num_landmass {
        let cx = rng.gen_range(0..width) as i32;
        let cy = rng.gen_range(0..height) as i32;
        let near_border =
            cx < 2 || cy < 2 || cx >= width as i32 - 2 || cy >= height as i32 - 2;
        let elevation = if near_border {
            rng.gen_range(0..3 * HMAX / 10)
        } else {
            rng.gen_range(2 * HMAX / 10..HMAX)
        };
        let radius = rng.gen_range(3..=max_radius as i32);
        paint_disk(&mut heights, cx, cy, radius, elevation);
    }

    smooth_int_map(&mut heights);
    heights
}

/// Rasterize a filled circle with the midpoint (Bresenham) circle algorithm,
/// raising every covered cell to at least `elevation`.
fn paint_disk(heights: &mut Grid<i32>, cx: i32, cy: i32, radius: i32, elevation: i32) {
    let mut fill_span = |y: i32, x_from: i32, x_to: i32| {
        if y < 0 || y >= heights.height() as i32 {
            return;
        }
        for x in x_from.max(0)..=x_to.min(heights.width() as i32 - 1) {
            let cell = heights.get_mut(x as u32, y as u32);
            *cell = (*cell).max(elevation);
        }
    };

    let mut x = 0;
    let mut y = radius;
    let mut decision = 3 - 2 * radius;
    while x <= y {
        fill_span(cy + x, cx - y, cx + y);
        fill_span(cy - x, cx - y, cx + y);
        fill_span(cy + y, cx - x, cx + x);
        fill_span(cy - y, cx - x, cx + x);
        if decision < 0 {
            decision += 4 * x + 6;
        } else {
            decision += 4 * (x - y) + 10;
            y -= 1;
        }
        x += 1;
    }
}

/// Scaling factor for pole processing: a linear ramp from the edge of the
/// polar band down to the pole itself, floored so the inverse stays finite,
/// with map corners (the singularity) clamped to the floor outright.
fn pole_factor(world: &WorldBuilder, x: u32, y: u32) -> f64 {
    const FLOOR: f64 = 0.1;
    let band = world.climate.ice_base * 5 / 2;
    let heat = world.heat_latitude(x, y);
    if heat > band {
        return 1.0;
    }
    if near_singularity(world, x, y) {
        return FLOOR;
    }
    (f64::from(heat) / f64::from(band.max(1))).clamp(FLOOR, 1.0)
}

/// Map corners behave degenerately under latitude math; treat a small
/// Chebyshev neighborhood of each corner specially.
fn near_singularity(world: &WorldBuilder, x: u32, y: u32) -> bool {
    let (w, h) = (world.width(), world.height());
    let dx = x.min(w - 1 - x);
    let dy = y.min(h - 1 - y);
    dx <= 1 && dy <= 1
}

/// Pre-scale heights inside the polar band so land classification produces
/// polar ocean. Inverted by [renormalize_hmap_poles]; the flag on the
/// builder makes the pair idempotent.
pub(crate) fn normalize_hmap_poles(world: &mut WorldBuilder) {
    if world.poles_normalized || !world.has_poles() {
        return;
    }
    for x in 0..world.width() {
        for y in 0..world.height() {
            let factor = pole_factor(world, x, y);
            if factor < 1.0 {
                let scaled = (f64::from(*world.heights.get(x, y)) * factor).round() as i32;
                world.heights.set(x, y, scaled);
            }
        }
    }
    world.poles_normalized = true;
}

/// Invert the polar pre-scaling applied by [normalize_hmap_poles]. Zero
/// heights stay put (there is nothing to restore).
pub(crate) fn renormalize_hmap_poles(world: &mut WorldBuilder) {
    if !world.poles_normalized {
        return;
    }
    for x in 0..world.width() {
        for y in 0..world.height() {
            let current = *world.heights.get(x, y);
            if current == 0 {
                continue;
            }
            let factor = pole_factor(world, x, y);
            if factor < 1.0 {
                let restored = (f64::from(current) / factor).round() as i32;
                world.heights.set(x, y, restored.min(HMAX));
            }
        }
    }
    world.poles_normalized = false;
}
