//! Numeric helpers shared by the height and climate stages, plus the timing
//! macro used to instrument every pipeline stage.

use crate::world::grid::Grid;
use rand::Rng;

/// A macro to measure the evaluation time of an expression. Wraps an
/// expression, logs the elapsed time at the given level (debug by default)
/// and evaluates to the expression's value.
#[macro_export]
macro_rules! timed {
    ($label:expr, $ex:expr) => {
        $crate::timed!($label, log::Level::Debug, $ex)
    };
    ($label:expr, $log_level:expr, $ex:expr) => {{
        let now = std::time::Instant::now();
        let value = $ex;
        let elapsed = now.elapsed();
        log::log!($log_level, "{} took {} ms", $label, elapsed.as_millis());
        value
    }};
}

/// Kernel of the separable Gaussian smoother. Applied once along x and once
/// along y; weights are renormalized at the map edge where taps fall off.
const SMOOTH_KERNEL: [f64; 5] = [0.13, 0.19, 0.37, 0.19, 0.13];

/// Smooth an integer field with the two-pass separable kernel. The height
/// strategies run this once after painting raw elevations.
pub fn smooth_int_map(map: &mut Grid<i32>) {
    let (w, h) = (map.width(), map.height());
    if w == 0 || h == 0 {
        return;
    }

    // Horizontal pass into a scratch grid, then vertical pass back.
    let mut scratch = Grid::filled(w, h, 0i32);
    for x in 0..w {
        for y in 0..h {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, coeff) in SMOOTH_KERNEL.iter().enumerate() {
                let nx = x as i32 + k as i32 - 2;
                if map.contains(nx, y as i32) {
                    acc += coeff * f64::from(*map.get(nx as u32, y));
                    weight += coeff;
                }
            }
            scratch.set(x, y, (acc / weight).round() as i32);
        }
    }
    for x in 0..w {
        for y in 0..h {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, coeff) in SMOOTH_KERNEL.iter().enumerate() {
                let ny = y as i32 + k as i32 - 2;
                if scratch.contains(x as i32, ny) {
                    acc += coeff * f64::from(*scratch.get(x, ny as u32));
                    weight += coeff;
                }
            }
            map.set(x, y, (acc / weight).round() as i32);
        }
    }
}

/// Histogram-equalize the values selected by `filter` into `[min, max]`.
///
/// After this runs, the filtered values are spread evenly across the target
/// interval: the k-th smallest value maps (approximately) to
/// `min + span * k / n`. This is what makes `landpercent` meaningful — once
/// heights are equalized into [0, HMAX], the shore threshold
/// `HMAX * (100 - landpercent) / 100` leaves landpercent% of tiles above it.
/// Unfiltered cells are left untouched.
pub fn adjust_int_map_filtered(
    map: &mut Grid<i32>,
    min: i32,
    max: i32,
    filter: impl Fn(u32, u32) -> bool,
) {
    let mut selected: Vec<i32> = Vec::new();
    for (x, y) in map.coords() {
        if filter(x, y) {
            selected.push(*map.get(x, y));
        }
    }
    if selected.is_empty() {
        return;
    }

    let lowest = *selected.iter().min().expect("non-empty");
    let highest = *selected.iter().max().expect("non-empty");
    if lowest == highest {
        // Degenerate (constant) field: pin everything to the minimum.
        for (x, y) in map.coords() {
            if filter(x, y) {
                map.set(x, y, min);
            }
        }
        return;
    }

    // Frequency histogram over the observed value range, then a cumulative
    // sweep assigns each distinct value its equalized position.
    let span = (highest - lowest) as usize + 1;
    let mut freq = vec![0usize; span];
    for &v in &selected {
        freq[(v - lowest) as usize] += 1;
    }
    let total = selected.len();
    let target_span = i64::from(max) - i64::from(min);
    let mut seen = 0usize;
    let mut remap = vec![0i32; span];
    for (offset, count) in freq.iter().enumerate() {
        remap[offset] = (i64::from(min) + target_span * seen as i64 / total as i64) as i32;
        seen += count;
    }

    for (x, y) in map.coords() {
        if filter(x, y) {
            let v = *map.get(x, y);
            map.set(x, y, remap[(v - lowest) as usize]);
        }
    }
}

/// Weighted draw over `(item, weight)` pairs. Zero-weight entries can never
/// win. Returns `None` when the pool is empty or all weights are zero.
pub fn weighted_choice<T: Copy>(rng: &mut impl Rng, pool: &[(T, u32)]) -> Option<T> {
    let total: u64 = pool.iter().map(|(_, w)| u64::from(*w)).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for (item, weight) in pool {
        let weight = u64::from(*weight);
        if roll < weight {
            return Some(*item);
        }
        roll -= weight;
    }
    None
}
