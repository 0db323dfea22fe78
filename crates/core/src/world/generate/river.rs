//! River networks: grown from high-ground springs, flowing strictly downhill
//! (RNG breaks ties) until they reach open water, a lake, or an existing
//! river. Total river coverage is bounded by the river budget.

use crate::world::{
    generate::{Generate, WorldBuilder, HMAX},
    grid::Direction,
    Terrain,
};
use rand::Rng;

#[derive(Debug)]
pub(crate) struct RiverGenerator;

impl Generate for RiverGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let land_tiles = world.land_tile_count();
        if land_tiles == 0 {
            return Ok(());
        }
        let target = (world.budgets.river_pct * land_tiles as f64 / 100.0).round() as usize;
        if target == 0 {
            return Ok(());
        }
        // Stay within +-2 percentage points of the requested share
        let tolerance = (land_tiles * 2 / 100).max(1);

        let mut placed = 0usize;
        let mut attempts = 0usize;
        let max_attempts = target * 20 + 100;
        while placed + tolerance / 2 < target && attempts < max_attempts {
            attempts += 1;
            let spring = match find_spring(world, attempts > max_attempts / 2) {
                Some(coord) => coord,
                None => break,
            };
            if let Some(path) = trace_path(world, spring) {
                let new_tiles = path
                    .tiles
                    .iter()
                    .filter(|&&(x, y)| !world.tiles.get(x, y).has_river())
                    .count();
                if placed + new_tiles > target + tolerance {
                    continue;
                }
                commit_path(world, &path);
                placed += new_tiles;
            }
        }
        Ok(())
    }
}

/// A traced river: the land tiles it runs over, in flow order, plus how it
/// terminates.
struct RiverPath {
    tiles: Vec<(u32, u32)>,
    outlet: Outlet,
}

enum Outlet {
    /// Flows into open water or a lake in the given direction from the last
    /// path tile.
    Water(Direction),
    /// Merges into an existing river in the given direction.
    Merge(Direction),
}

/// Springs rise on high ground that doesn't already carry water.
fn find_spring(world: &mut WorldBuilder, relaxed: bool) -> Option<(u32, u32)> {
    let (w, h) = (world.width(), world.height());
    let high_ground = (2 * world.shore_level + HMAX) / 3;
    for _ in 0..30 {
        let x = world.rng.gen_range(0..w);
        let y = world.rng.gen_range(0..h);
        let tile = world.tiles.get(x, y);
        if tile.is_water() || tile.has_river() {
            continue;
        }
        if tile.terrain_opt() == Some(Terrain::Mountains) {
            continue;
        }
        if !relaxed && *world.heights.get(x, y) < high_ground {
            continue;
        }
        // Keep springs off existing river systems
        let near_river = world
            .tiles
            .neighbors4(x, y)
            .any(|(nx, ny)| world.tiles.get(nx, ny).has_river());
        if near_river {
            continue;
        }
        return Some((x, y));
    }
    None
}

/// Walk downhill from the spring. Returns `None` for dead ends (local
/// minima with no outlet); those springs just never become rivers.
fn trace_path(world: &mut WorldBuilder, spring: (u32, u32)) -> Option<RiverPath> {
    let mut tiles = vec![spring];
    let mut current = spring;

    loop {
        // Reaching water (or an existing river) ends the trace
        if let Some(direction) = adjacent_outlet(world, current, &tiles) {
            return Some(RiverPath {
                tiles,
                outlet: direction,
            });
        }

        // Otherwise continue to the lowest non-mountain neighbor that
        // doesn't climb; RNG breaks ties
        let current_height = *world.heights.get(current.0, current.1);
        let mut best: Vec<(u32, u32)> = Vec::new();
        let mut best_height = current_height;
        for (nx, ny) in world.tiles.neighbors4(current.0, current.1) {
            if tiles.contains(&(nx, ny)) {
                continue;
            }
            if world.tiles.get(nx, ny).terrain_opt() == Some(Terrain::Mountains) {
                continue;
            }
            let height = *world.heights.get(nx, ny);
            if height > current_height {
                continue;
            }
            if height < best_height {
                best_height = height;
                best = vec![(nx, ny)];
            } else if height == best_height {
                best.push((nx, ny));
            }
        }

        if best.is_empty() {
            return None;
        }
        let next = best[world.rng.gen_range(0..best.len())];
        tiles.push(next);
        current = next;

        if tiles.len() > (world.width() + world.height()) as usize {
            // Runaway trace; treat as a dead end
            return None;
        }
    }
}

/// If the head of the path borders water or another river, pick the outlet
/// direction (water wins over merging).
fn adjacent_outlet(
    world: &WorldBuilder,
    (x, y): (u32, u32),
    path: &[(u32, u32)],
) -> Option<Outlet> {
    let mut merge: Option<Outlet> = None;
    for direction in Direction::ALL {
        let (dx, dy) = direction.offset();
        let (nx, ny) = (x as i32 + dx, y as i32 + dy);
        if !world.tiles.contains(nx, ny) {
            continue;
        }
        let (nx, ny) = (nx as u32, ny as u32);
        if path.contains(&(nx, ny)) {
            continue;
        }
        let neighbor = world.tiles.get(nx, ny);
        if neighbor.is_water() {
            return Some(Outlet::Water(direction));
        }
        if neighbor.has_river() && merge.is_none() {
            merge = Some(Outlet::Merge(direction));
        }
    }
    merge
}

/// Write the river bits: consecutive land tiles link both ways, and the head
/// tile links toward its outlet (the merged-into river links back).
fn commit_path(world: &mut WorldBuilder, path: &RiverPath) {
    for pair in path.tiles.windows(2) {
        let (ax, ay) = pair[0];
        let (bx, by) = pair[1];
        let direction = direction_between((ax, ay), (bx, by));
        world.tiles.get_mut(ax, ay).add_river(direction);
        world.tiles.get_mut(bx, by).add_river(direction.opposite());
    }

    let &(hx, hy) = path.tiles.last().expect("path is never empty");
    match path.outlet {
        Outlet::Water(direction) => {
            world.tiles.get_mut(hx, hy).add_river(direction);
        }
        Outlet::Merge(direction) => {
            world.tiles.get_mut(hx, hy).add_river(direction);
            let (dx, dy) = direction.offset();
            let (mx, my) = ((hx as i32 + dx) as u32, (hy as i32 + dy) as u32);
            world.tiles.get_mut(mx, my).add_river(direction.opposite());
        }
    }
}

fn direction_between(a: (u32, u32), b: (u32, u32)) -> Direction {
    let (dx, dy) = (b.0 as i32 - a.0 as i32, b.1 as i32 - a.1 as i32);
    match (dx, dy) {
        (0, -1) => Direction::North,
        (1, 0) => Direction::East,
        (0, 1) => Direction::South,
        (-1, 0) => Direction::West,
        _ => unreachable!("path tiles are always 4-adjacent"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GenConfig,
        ruleset::TerrainRuleset,
        world::{generate::TerrainBudgets, grid::Grid, RiverMask},
    };
    use assert_approx_eq::assert_approx_eq;

    fn sloped_world<'a>(config: &'a GenConfig, ruleset: &'a TerrainRuleset) -> WorldBuilder<'a> {
        let mut world = WorldBuilder::new(config, ruleset, None);
        world.shore_level = 200;
        // West edge is sea, land climbs steadily to the east
        world.heights = Grid::from_fn(config.width, config.height, |x, _| {
            if x == 0 {
                50
            } else {
                200 + (x * 700 / config.width) as i32
            }
        });
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            let terrain = if x == 0 { Terrain::Ocean } else { Terrain::Grassland };
            world.tiles.get_mut(x, y).set_terrain(terrain);
        }
        world.budgets = TerrainBudgets::for_config(config);
        world
    }

    #[test]
    fn test_rivers_run_downhill_to_the_sea() {
        let config = GenConfig {
            width: 30,
            height: 20,
            seed: 55u64.into(),
            wetness: 60,
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = sloped_world(&config, &ruleset);
        RiverGenerator.generate(&mut world).unwrap();

        let river_tiles = world.tiles.cells().filter(|t| t.has_river()).count();
        assert!(river_tiles > 0, "no rivers placed");

        // Every river bit points at a river-capable or water neighbor
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            let mask = world.tiles.get(x, y).river_mask();
            for direction in Direction::ALL {
                if !mask.contains(RiverMask::from_direction(direction)) {
                    continue;
                }
                let (dx, dy) = direction.offset();
                assert!(world.tiles.contains(x as i32 + dx, y as i32 + dy));
                let neighbor = world.tiles.get((x as i32 + dx) as u32, (y as i32 + dy) as u32);
                let terrain = neighbor.terrain_opt().unwrap();
                assert!(
                    terrain.is_water() || ruleset.can_have_river(terrain),
                    "river bit points at {:?}",
                    terrain
                );
            }
        }
    }

    #[test]
    fn test_budget_respected() {
        let config = GenConfig {
            width: 40,
            height: 30,
            seed: 56u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = sloped_world(&config, &ruleset);
        RiverGenerator.generate(&mut world).unwrap();

        let land = world.land_tile_count();
        let river_tiles = world.tiles.cells().filter(|t| t.has_river()).count();
        let actual_pct = river_tiles as f64 * 100.0 / land as f64;
        // The budget contract is +-2 percentage points
        assert_approx_eq!(actual_pct, world.budgets.river_pct, 2.0);
    }

    #[test]
    fn test_no_land_no_rivers() {
        let config = GenConfig {
            width: 6,
            height: 6,
            seed: 55u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = WorldBuilder::new(&config, &ruleset, None);
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            world.tiles.get_mut(x, y).set_terrain(Terrain::Ocean);
        }
        world.budgets = TerrainBudgets::for_config(&config);
        RiverGenerator.generate(&mut world).unwrap();
        assert!(world.tiles.cells().all(|t| !t.has_river()));
    }
}
