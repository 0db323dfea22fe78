//! End-to-end scenarios over the public API, plus the universal invariants
//! every emitted map must hold.

use assert_approx_eq::assert_approx_eq;
use pangaea::{
    GenConfig, Generator, MapValidator, RiverMask, StartPosMode, TemperatureType, Terrain,
    TerrainBudgets, TerrainRuleset, World,
};
use std::collections::HashMap;

fn config(seed: &str, width: u32, height: u32, generator: Generator) -> GenConfig {
    GenConfig {
        seed: seed.into(),
        width,
        height,
        generator,
        ..Default::default()
    }
}

/// Flood-fill 4-connected components of tiles matching `pred`; returns the
/// component sizes.
fn component_sizes(map: &pangaea::MapData, pred: impl Fn(&pangaea::Tile) -> bool) -> Vec<usize> {
    let (w, h) = (map.width as usize, map.height as usize);
    let mut visited = vec![false; w * h];
    let index = |x: u32, y: u32| (x as usize) * h + (y as usize);
    let mut sizes = Vec::new();

    for x in 0..map.width {
        for y in 0..map.height {
            if visited[index(x, y)] || !pred(map.tile(x, y)) {
                continue;
            }
            let mut size = 0;
            let mut stack = vec![(x, y)];
            visited[index(x, y)] = true;
            while let Some((cx, cy)) = stack.pop() {
                size += 1;
                for (dx, dy) in [(0i32, -1i32), (1, 0), (0, 1), (-1, 0)] {
                    let (nx, ny) = (cx as i32 + dx, cy as i32 + dy);
                    if nx < 0 || ny < 0 || nx >= map.width as i32 || ny >= map.height as i32 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    if !visited[index(nx, ny)] && pred(map.tile(nx, ny)) {
                        visited[index(nx, ny)] = true;
                        stack.push((nx, ny));
                    }
                }
            }
            sizes.push(size);
        }
    }
    sizes
}

#[test]
fn test_fractal_fixture_a() {
    let config = config("fixture-a", 40, 30, Generator::Fractal);
    let map = World::generate(config).unwrap().into_map();

    let total = map.tiles.len() as f64;
    let land = map.land_tiles().count() as f64;
    let land_pct = land * 100.0 / total;
    assert!(
        (20.0..=40.0).contains(&land_pct),
        "land share {:.1}%",
        land_pct
    );

    assert_eq!(map.starting_positions.len(), 2);
    for start in &map.starting_positions {
        assert!(map.tile(start.x, start.y).terrain.is_land());
    }

    let largest = component_sizes(&map, |t| t.terrain.is_land())
        .into_iter()
        .max()
        .unwrap_or(0);
    assert!(largest >= 80, "largest continent is only {} tiles", largest);
}

#[test]
fn test_random_fixture_b_scores() {
    let config = config("fixture-b", 80, 50, Generator::Random);
    let ruleset = TerrainRuleset::load("classic").unwrap();
    let map = World::generate(config.clone()).unwrap().into_map();

    // Every tile carries one of the four temperature classes
    for tile in &map.tiles {
        assert!(matches!(
            tile.temperature,
            TemperatureType::Frozen
                | TemperatureType::Cold
                | TemperatureType::Temperate
                | TemperatureType::Tropical
        ));
    }

    let config4 = GenConfig {
        player_count: 4,
        ..config
    };
    let map4 = World::generate(config4.clone()).unwrap().into_map();
    let report = MapValidator::new(&config4, &ruleset).validate(&map4);
    assert!(
        report.score >= 70,
        "score {} with issues {:#?}",
        report.score,
        report.issues
    );
}

#[test]
fn test_fracture_fixture_c_river_budget() {
    let config = GenConfig {
        wetness: 50,
        temperature: 50,
        ..config("fixture-c", 60, 40, Generator::Fracture)
    };
    let map = World::generate(config.clone()).unwrap().into_map();

    let land = map.land_tiles().count();
    let rivers = map
        .land_tiles()
        .filter(|t| !t.river_mask.is_empty())
        .count();
    let actual = rivers as f64 * 100.0 / land as f64;
    let expected = TerrainBudgets::for_config(&config).river_pct;
    // The requested river share must be met within +-2 percentage points
    assert_approx_eq!(actual, expected, 2.0);
}

#[test]
fn test_island_fixture_e_falls_back_to_random() {
    let config = GenConfig {
        startpos: StartPosMode::Variable,
        landpercent: 90,
        ..config("fixture-e", 25, 25, Generator::Island)
    };
    let ruleset = TerrainRuleset::load("classic").unwrap();
    let err = pangaea::IslandStrategy
        .generate(&config, &ruleset)
        .unwrap_err();
    assert_eq!(err.kind(), "FALLBACK_TO_RANDOM");

    // The top-level driver resolves the same failure by switching to the
    // random height generator
    let map = World::generate(config).unwrap().into_map();
    assert_eq!(map.starting_positions.len(), 2);
}

#[test]
fn test_determinism_fixture_f() {
    let make = || {
        World::generate(config("fixture-a", 40, 30, Generator::Fractal))
            .unwrap()
            .into_map()
    };
    let first = make();
    let second = make();
    // Equality is defined over tiles + starts (the emission stamp may
    // differ between the two runs)
    assert_eq!(first, second);
    assert_eq!(first.tiles.len(), second.tiles.len());
    assert_eq!(first.starting_positions, second.starting_positions);
}

#[test]
fn test_p1_elevation_coherence() {
    for generator in [Generator::Fractal, Generator::Random, Generator::Fracture] {
        let map = World::generate(config("coherence", 50, 35, generator))
            .unwrap()
            .into_map();
        for tile in &map.tiles {
            if tile.terrain.is_water() {
                assert!(tile.elevation < map.shore_level, "wet tile above shore");
            } else {
                assert!(tile.elevation >= map.shore_level, "dry tile below shore");
            }
        }
    }
}

#[test]
fn test_p2_lake_size_bound() {
    for seed in ["lakes-1", "lakes-2", "lakes-3"] {
        let map = World::generate(config(seed, 60, 40, Generator::Fractal))
            .unwrap()
            .into_map();
        // Open-water bodies are always bigger than the lake bound, and lake
        // bodies never exceed it
        for size in component_sizes(&map, |t| t.terrain.is_open_water()) {
            assert!(size >= 3, "open-water component of size {}", size);
        }
        for size in component_sizes(&map, |t| t.terrain == Terrain::Lake) {
            assert!(size <= 2, "lake component of size {}", size);
        }
    }
}

#[test]
fn test_p3_continent_labeling_is_equivalence() {
    let map = World::generate(config("continents", 60, 40, Generator::Fracture))
        .unwrap()
        .into_map();

    // Recompute components over land+lake and compare with the labels
    let (w, h) = (map.width as usize, map.height as usize);
    let mut component = vec![0u32; w * h];
    let index = |x: u32, y: u32| (x as usize) * h + (y as usize);
    let connects = |t: &pangaea::Tile| t.terrain.is_land() || t.terrain == Terrain::Lake;
    let mut next = 0u32;
    for x in 0..map.width {
        for y in 0..map.height {
            if component[index(x, y)] != 0 || !connects(map.tile(x, y)) {
                continue;
            }
            next += 1;
            let mut stack = vec![(x, y)];
            component[index(x, y)] = next;
            while let Some((cx, cy)) = stack.pop() {
                for (dx, dy) in [(0i32, -1i32), (1, 0), (0, 1), (-1, 0)] {
                    let (nx, ny) = (cx as i32 + dx, cy as i32 + dy);
                    if nx < 0 || ny < 0 || nx >= map.width as i32 || ny >= map.height as i32 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    if component[index(nx, ny)] == 0 && connects(map.tile(nx, ny)) {
                        component[index(nx, ny)] = next;
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }

    // component <-> continent_id must be a bijection over connecting tiles
    let mut forward: HashMap<u32, u32> = HashMap::new();
    let mut backward: HashMap<u32, u32> = HashMap::new();
    for x in 0..map.width {
        for y in 0..map.height {
            let tile = map.tile(x, y);
            if connects(tile) {
                assert!(tile.continent_id >= 1, "land tile with ID 0");
                let c = component[index(x, y)];
                assert_eq!(*forward.entry(c).or_insert(tile.continent_id), tile.continent_id);
                assert_eq!(*backward.entry(tile.continent_id).or_insert(c), c);
            } else if tile.terrain.is_open_water() {
                assert_eq!(tile.continent_id, 0);
            }
        }
    }
}

#[test]
fn test_p4_river_masks_point_at_valid_neighbors() {
    let ruleset = TerrainRuleset::load("classic").unwrap();
    let map = World::generate(config("rivers", 60, 40, Generator::Fractal))
        .unwrap()
        .into_map();
    for tile in &map.tiles {
        for (mask, (dx, dy)) in [
            (RiverMask::NORTH, (0i32, -1i32)),
            (RiverMask::EAST, (1, 0)),
            (RiverMask::SOUTH, (0, 1)),
            (RiverMask::WEST, (-1, 0)),
        ] {
            if !tile.river_mask.contains(mask) {
                continue;
            }
            let (nx, ny) = (tile.x as i32 + dx, tile.y as i32 + dy);
            assert!(
                nx >= 0 && ny >= 0 && nx < map.width as i32 && ny < map.height as i32,
                "river bit points off the map"
            );
            let neighbor = map.tile(nx as u32, ny as u32);
            assert!(
                neighbor.terrain.is_water() || ruleset.can_have_river(neighbor.terrain),
                "river bit points at {:?}",
                neighbor.terrain
            );
        }
    }
}

#[test]
fn test_r2_json_round_trip() {
    let map = World::generate(config("round-trip", 30, 20, Generator::Random))
        .unwrap()
        .into_map();
    let json = map.to_json().unwrap();
    let back = pangaea::MapData::from_json(&json).unwrap();
    assert_eq!(map, back);
    assert_eq!(map.generated_at, back.generated_at);
}

#[test]
fn test_b1_degenerate_dimensions() {
    for (w, h) in [(1, 1), (1, 12), (12, 1)] {
        for generator in [Generator::Fractal, Generator::Random, Generator::Fracture] {
            let cfg = GenConfig {
                player_count: 1,
                ..config("degenerate", w, h, generator)
            };
            let map = World::generate(cfg).unwrap().into_map();
            assert_eq!(map.tiles.len(), (w * h) as usize);
            assert_eq!(map.starting_positions.len(), 1);
        }
    }
}

#[test]
fn test_resources_are_unique_and_admissible() {
    let map = World::generate(config("resources", 50, 40, Generator::Fractal))
        .unwrap()
        .into_map();
    let with_resources = map.tiles.iter().filter(|t| t.resource.is_some()).count();
    assert!(with_resources > 0);
    // Mountains never get fish, coast never gets gold, and so on: the
    // properties map mirrors the ruleset entry for the tile's terrain
    let ruleset = TerrainRuleset::load("classic").unwrap();
    for tile in &map.tiles {
        assert_eq!(&tile.properties, ruleset.properties(tile.terrain));
    }
}
