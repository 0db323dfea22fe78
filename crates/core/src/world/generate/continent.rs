//! Continent labeling, tiny-island cleanup, and lake regeneration.

use crate::{
    config::Generator,
    world::{
        generate::{height::renormalize_hmap_poles, Generate, WorldBuilder, LAKE_MAX_SIZE},
        Terrain,
    },
};
use rand::Rng;

/// Removes tiny islands, then flood-fills the remaining land into continent
/// IDs. This also closes out the placement phase: the placement map is
/// released and the final pole renormalization runs.
#[derive(Debug)]
pub(crate) struct ContinentGenerator;

impl Generate for ContinentGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        remove_tiny_islands(world);
        world.continent_count = label_continents(world);

        // Placement is over; later passes write freely
        world.placed = None;
        renormalize_hmap_poles(world);
        Ok(())
    }
}

/// A land tile whose radius-2 neighborhood holds too little land is noise
/// from the height field; dissolve it into shallow sea. The random generator
/// leaves more single-tile islands standing, so its threshold is lower.
fn remove_tiny_islands(world: &mut WorldBuilder) {
    let threshold = match world.config.generator {
        Generator::Random => world.rng.gen_range(1..=2),
        _ => world.rng.gen_range(3..=5),
    };

    let mut doomed: Vec<(u32, u32)> = Vec::new();
    for (x, y) in world.tiles.coords() {
        if world.tiles.get(x, y).is_water() {
            continue;
        }
        let land_nearby = world
            .tiles
            .square(x, y, 2)
            .filter(|&(nx, ny)| !world.tiles.get(nx, ny).is_water())
            .count();
        if land_nearby <= threshold {
            doomed.push((x, y));
        }
    }
    for (x, y) in doomed {
        world.tiles.get_mut(x, y).set_terrain(Terrain::Coast);
        if let Some(placed) = &mut world.placed {
            placed.set_placed(x, y);
        }
    }
}

/// Flood-fill 4-connected non-ocean tiles (land and lakes) into sequential
/// continent IDs, via an explicit stack. Open ocean is always ID 0. Returns
/// the number of continents labeled.
pub(crate) fn label_continents(world: &mut WorldBuilder) -> u32 {
    let (w, h) = (world.width(), world.height());
    for (x, y) in world.tiles.coords() {
        world.tiles.get_mut(x, y).set_continent_id(0);
    }

    let connects = |world: &WorldBuilder, x: u32, y: u32| {
        let tile = world.tiles.get(x, y);
        !tile.is_water() || tile.terrain_opt() == Some(Terrain::Lake)
    };

    let mut next_id = 0u32;
    let mut stack: Vec<(u32, u32)> = Vec::new();
    for x in 0..w {
        for y in 0..h {
            if !connects(world, x, y) || world.tiles.get(x, y).continent_id() != 0 {
                continue;
            }
            next_id += 1;
            stack.push((x, y));
            world.tiles.get_mut(x, y).set_continent_id(next_id);
            while let Some((cx, cy)) = stack.pop() {
                let neighbors: Vec<(u32, u32)> = world.tiles.neighbors4(cx, cy).collect();
                for (nx, ny) in neighbors {
                    if connects(world, nx, ny) && world.tiles.get(nx, ny).continent_id() == 0 {
                        world.tiles.get_mut(nx, ny).set_continent_id(next_id);
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    next_id
}

/// Lake regeneration: open-water bodies small enough to be freshwater are
/// converted to lake tiles, then continents are relabeled so land connected
/// through a lake shares an ID.
#[derive(Debug)]
pub(crate) struct LakeGenerator;

impl Generate for LakeGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let (w, h) = (world.width(), world.height());
        let mut visited = vec![false; (w as usize) * (h as usize)];
        let index = |x: u32, y: u32| (x as usize) * (h as usize) + (y as usize);

        for x in 0..w {
            for y in 0..h {
                if visited[index(x, y)] {
                    continue;
                }
                let is_open = matches!(
                    world.tiles.get(x, y).terrain_opt(),
                    Some(t) if t.is_open_water()
                );
                if !is_open {
                    continue;
                }

                // Collect this 4-connected open-water component
                let mut component = vec![(x, y)];
                let mut stack = vec![(x, y)];
                visited[index(x, y)] = true;
                while let Some((cx, cy)) = stack.pop() {
                    let neighbors: Vec<(u32, u32)> = world.tiles.neighbors4(cx, cy).collect();
                    for (nx, ny) in neighbors {
                        if visited[index(nx, ny)] {
                            continue;
                        }
                        let open = matches!(
                            world.tiles.get(nx, ny).terrain_opt(),
                            Some(t) if t.is_open_water()
                        );
                        if open {
                            visited[index(nx, ny)] = true;
                            component.push((nx, ny));
                            stack.push((nx, ny));
                        }
                    }
                }

                if component.len() <= LAKE_MAX_SIZE {
                    for (lx, ly) in component {
                        world.tiles.get_mut(lx, ly).set_terrain(Terrain::Lake);
                    }
                }
            }
        }

        world.continent_count = label_continents(world);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GenConfig, ruleset::TerrainRuleset};

    fn world_from_rows<'a>(
        config: &'a GenConfig,
        ruleset: &'a TerrainRuleset,
        rows: &[&str],
    ) -> WorldBuilder<'a> {
        let mut world = WorldBuilder::new(config, ruleset, None);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let terrain = match c {
                    '~' => Terrain::Ocean,
                    _ => Terrain::Grassland,
                };
                world.tiles.get_mut(x as u32, y as u32).set_terrain(terrain);
            }
        }
        world
    }

    fn config_sized(width: u32, height: u32) -> GenConfig {
        GenConfig {
            width,
            height,
            seed: 8u64.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_two_landmasses_two_ids() {
        let config = config_sized(7, 3);
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = world_from_rows(
            &config,
            &ruleset,
            &["LL~~~LL", "LL~~~LL", "LL~~~LL"],
        );
        let count = label_continents(&mut world);
        assert_eq!(count, 2);
        assert_eq!(world.tiles.get(0, 0).continent_id(), 1);
        assert_eq!(world.tiles.get(6, 2).continent_id(), 2);
        assert_eq!(world.tiles.get(3, 1).continent_id(), 0);
        // Same column, same component
        assert_eq!(
            world.tiles.get(0, 2).continent_id(),
            world.tiles.get(1, 0).continent_id()
        );
    }

    #[test]
    fn test_tiny_island_dissolves() {
        let config = config_sized(9, 9);
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut rows = vec!["~~~~~~~~~".to_string(); 9];
        // A lone land tile in the middle of the sea
        rows[4] = "~~~~L~~~~".into();
        let rows_ref: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        let mut world = world_from_rows(&config, &ruleset, &rows_ref);
        ContinentGenerator.generate(&mut world).unwrap();
        assert!(world.tiles.get(4, 4).is_water());
        assert_eq!(world.continent_count, 0);
    }

    #[test]
    fn test_lake_regeneration_and_relabel() {
        let config = config_sized(8, 5);
        let ruleset = TerrainRuleset::load("classic").unwrap();
        // A 2-tile pond inside the landmass, and open sea on the right edge
        let mut world = world_from_rows(
            &config,
            &ruleset,
            &[
                "LLLLLL~~",
                "LL~LLL~~",
                "LL~LLL~~",
                "LLLLLL~~",
                "LLLLLL~~",
            ],
        );
        LakeGenerator.generate(&mut world).unwrap();

        assert_eq!(world.tiles.get(2, 1).terrain_opt(), Some(Terrain::Lake));
        assert_eq!(world.tiles.get(2, 2).terrain_opt(), Some(Terrain::Lake));
        // Open sea is too large to become a lake
        assert_eq!(world.tiles.get(7, 0).terrain_opt(), Some(Terrain::Ocean));
        // The lake belongs to the surrounding continent
        assert_eq!(world.tiles.get(2, 1).continent_id(), world.tiles.get(0, 0).continent_id());
        assert!(world.tiles.get(2, 1).continent_id() >= 1);
        assert_eq!(world.continent_count, 1);
    }
}
