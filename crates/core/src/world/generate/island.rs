//! The island strategy: instead of deriving land from a height field, the
//! land-mass budget is partitioned into player-island buckets and each
//! island is grown directly onto an empty ocean.

use crate::{
    config::{GenConfig, StartPosMode},
    error::GenError,
    ruleset::{IslandPick, TerrainRuleset},
    timed,
    world::{
        generate::{
            biome::BiomeGenerator, continent::LakeGenerator, height, ocean::OceanGenerator,
            placement::PlacementMap, relief::ReliefGenerator, resource::ResourceGenerator,
            river::RiverGenerator, startpos::StartPosGenerator, temperature::TemperatureGenerator,
            terrain::PlainsGenerator, wetness::WetnessGenerator, TerrainBudgets, WorldBuilder,
            HMAX,
        },
        validate::MapValidator,
        Deadline, MapData, Terrain,
    },
};
use anyhow::anyhow;
use log::info;
use rand::Rng;
use std::time::Instant;

/// Island generation refuses maps that are almost all land; the landmass
/// can't be partitioned with ocean margins past this point.
const LANDPERCENT_CAP: u32 = 85;

/// Margin of guaranteed ocean around the map edge and between islands.
const BORDER_MARGIN: u32 = 1;

/// Attempts to seed-and-grow a single island before giving up on it.
const PLACE_ATTEMPTS: u32 = 50;

/// One grown island and its claim on starting positions.
#[derive(Clone, Debug)]
struct Island {
    /// A tile inside the island, used to recover its continent ID after
    /// relabeling.
    representative: (u32, u32),
    /// Tiles actually painted.
    mass: usize,
    /// How many players start here.
    starters: u32,
}

/// Top-level driver that partitions the land mass into islands keyed by the
/// start-position mode, then runs the rest of the terrain pipeline.
#[derive(Copy, Clone, Debug, Default)]
pub struct IslandStrategy;

impl IslandStrategy {
    pub fn generate(
        &self,
        config: &GenConfig,
        ruleset: &TerrainRuleset,
    ) -> Result<MapData, GenError> {
        config.check()?;
        self.generate_with_deadline(config, ruleset, None)
    }

    pub(crate) fn generate_with_deadline(
        &self,
        config: &GenConfig,
        ruleset: &TerrainRuleset,
        deadline: Option<Deadline>,
    ) -> Result<MapData, GenError> {
        if config.landpercent > LANDPERCENT_CAP {
            return Err(GenError::FallbackToRandom(format!(
                "landpercent {} is above the island cap of {}",
                config.landpercent, LANDPERCENT_CAP
            )));
        }
        if config.width < 4 + 2 * BORDER_MARGIN || config.height < 4 + 2 * BORDER_MARGIN {
            return Err(GenError::FallbackToRandom(format!(
                "{}x{} leaves no room for islands",
                config.width, config.height
            )));
        }

        let started = Instant::now();
        let mut world = WorldBuilder::new(config, ruleset, deadline);
        init_ocean_world(&mut world);

        let islands = timed!(
            "island placement",
            log::Level::Debug,
            place_islands(&mut world)?
        );

        let mut placed = PlacementMap::new(world.width(), world.height());
        placed.set_all_ocean_tiles_placed(&world.tiles);
        world.placed = Some(placed);

        world.apply_stage(ReliefGenerator)?;
        world.apply_stage(TemperatureGenerator)?;
        world.apply_stage(OceanGenerator)?;
        world.apply_stage(LakeGenerator)?;

        fill_all_island_terrain(&mut world, &islands)?;
        world.placed = None;

        world.apply_stage(RiverGenerator)?;
        world.apply_stage(WetnessGenerator)?;
        world.apply_stage(BiomeGenerator)?;
        world.apply_stage(PlainsGenerator)?;
        world.apply_stage(ResourceGenerator)?;

        // Every starter slot claims its island's (post-relabel) continent
        world.starter_continents = islands
            .iter()
            .flat_map(|island| {
                let id = world
                    .tiles
                    .get(island.representative.0, island.representative.1)
                    .continent_id();
                std::iter::repeat(id).take(island.starters as usize)
            })
            .collect();
        world.apply_stage(StartPosGenerator)?;

        let map = world.finalize()?;
        let report = MapValidator::new(config, ruleset)
            .with_generation_time(started.elapsed().as_millis() as u64)
            .validate(&map);
        info!(
            "island map scored {} ({} issues)",
            report.score,
            report.issues.len()
        );
        Ok(map)
    }
}

/// Blank slate: deepest ocean everywhere, levels derived from the config.
fn init_ocean_world(world: &mut WorldBuilder) {
    world.shore_level = height::shore_level(world.config.landpercent);
    world.mountain_level = height::mountain_level(world.shore_level, world.config.steepness);
    world.budgets = TerrainBudgets::for_config(world.config);
    for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
        world.tiles.get_mut(x, y).set_terrain(Terrain::DeepOcean);
    }
}

/// The total mass to distribute: the configured land share, minus the polar
/// margin rows that islands are kept out of.
fn total_land_mass(world: &WorldBuilder) -> usize {
    let (w, h) = (world.width() as usize, world.height() as usize);
    let effective_rows = h.saturating_sub(6).max(1);
    (w * effective_rows * world.config.landpercent as usize / 100).max(1)
}

/// Dispatch to the island sub-generator for the configured start-pos mode.
fn place_islands(world: &mut WorldBuilder) -> Result<Vec<Island>, GenError> {
    let (w, h) = (world.width(), world.height());
    match world.config.startpos {
        StartPosMode::Variable => {
            if w >= 30 && h >= 30 {
                map_generator_2(world)
            } else {
                map_generator_4(world)
            }
        }
        StartPosMode::Default | StartPosMode::Single => {
            if w >= 40 && h >= 40 {
                map_generator_3(world)
            } else {
                map_generator_4(world)
            }
        }
        StartPosMode::TwoOnThree | StartPosMode::All => map_generator_4(world),
    }
}

/// VARIABLE: one big continent holding every player, then mediums and
/// per-player smalls on a 70/20/10 split.
fn map_generator_2(world: &mut WorldBuilder) -> Result<Vec<Island>, GenError> {
    let total = total_land_mass(world);
    let players = world.config.player_count;
    let mut islands = Vec::new();

    let big = total * 7 / 10;
    match make_island(world, big, players, 95, islands.len())? {
        Some(island) => islands.push(island),
        None => {
            return Err(GenError::FallbackToRandom(
                "could not grow the big continent".into(),
            ))
        }
    }

    let medium = total * 2 / 10;
    for _ in 0..3 {
        if let Some(island) = make_island(world, (medium / 3).max(2), 0, 70, islands.len())? {
            islands.push(island);
        }
    }
    let small = total / 10;
    for _ in 0..players {
        if let Some(island) = make_island(world, (small / players as usize).max(2), 0, 70, islands.len())? {
            islands.push(island);
        }
    }
    Ok(islands)
}

/// DEFAULT/SINGLE: `floor(sqrt(players))` big starter islands consuming the
/// mass budget, then slightly larger supplementary islands.
fn map_generator_3(world: &mut WorldBuilder) -> Result<Vec<Island>, GenError> {
    let total = total_land_mass(world);
    let players = world.config.player_count;
    let big_islands = ((players as f64).sqrt().floor() as usize).max(1);
    let island_mass = (total / (3 * big_islands)).max(4);

    let mut islands = Vec::new();
    let mut consumed = 0usize;
    let mut starters_granted = 0u32;
    let mut guard = 0;
    while consumed + island_mass <= total && guard < 500 {
        guard += 1;
        let starters = u32::from(starters_granted < players);
        match make_island(world, island_mass, starters, 80, islands.len())? {
            Some(island) => {
                consumed += island.mass;
                starters_granted += island.starters;
                islands.push(island);
            }
            None => break,
        }
    }
    if starters_granted < players {
        return Err(GenError::FallbackToRandom(format!(
            "placed starter islands for only {} of {} players",
            starters_granted, players
        )));
    }

    // Supplementary islands: a notch bigger than the base mass, no starters
    let supplementary = (island_mass * 11 / 8).max(2);
    while consumed + supplementary <= total && guard < 1500 {
        guard += 1;
        match make_island(world, supplementary, 0, 70, islands.len())? {
            Some(island) => {
                consumed += island.mass;
                islands.push(island);
            }
            None => break,
        }
    }
    Ok(islands)
}

/// TWO_ON_THREE/ALL: multi-player islands first (2 or 3 players each,
/// depending on the player count), then singles, then filler.
fn map_generator_4(world: &mut WorldBuilder) -> Result<Vec<Island>, GenError> {
    let total = total_land_mass(world);
    let players = world.config.player_count;
    let per_island = players_per_island(players, world.config.startpos);
    let bigweight = match world.config.landpercent {
        0..=40 => 70usize,
        41..=60 => 50,
        _ => 30,
    };

    let mut islands = Vec::new();
    let mut consumed = 0usize;

    let multi_islands = (players / per_island) as usize;
    if multi_islands > 0 && per_island > 1 {
        let mass_each = (total * bigweight / 100 / multi_islands).max(4);
        for _ in 0..multi_islands {
            match make_island(world, mass_each, per_island, 80, islands.len())? {
                Some(island) => {
                    consumed += island.mass;
                    islands.push(island);
                }
                None => {
                    return Err(GenError::FallbackToRandom(
                        "could not grow a shared starter island".into(),
                    ))
                }
            }
        }
    }

    let placed_starters: u32 = islands.iter().map(|i| i.starters).sum();
    let single_players = players - placed_starters;
    let player_mass = (total / players as usize).max(4);
    for _ in 0..single_players {
        match make_island(world, player_mass, 1, 80, islands.len())? {
            Some(island) => {
                consumed += island.mass;
                islands.push(island);
            }
            None => {
                return Err(GenError::FallbackToRandom(
                    "could not grow a single-player island".into(),
                ))
            }
        }
    }

    // Spend what's left on filler, in two shrinking bucket sizes
    for divisor in [2usize, 3] {
        let filler = player_mass / divisor;
        if filler < 2 {
            break;
        }
        let mut guard = 0;
        while consumed + filler <= total && guard < 100 {
            guard += 1;
            match make_island(world, filler, 0, 60, islands.len())? {
                Some(island) => {
                    consumed += island.mass;
                    islands.push(island);
                }
                None => break,
            }
        }
    }
    Ok(islands)
}

/// How many players share one island under the given mode.
pub(crate) fn players_per_island(players: u32, mode: StartPosMode) -> u32 {
    match mode {
        StartPosMode::All | StartPosMode::TwoOnThree => {
            if players % 3 == 0 && players >= 6 {
                3
            } else if players % 2 == 0 && players >= 4 {
                2
            } else if mode == StartPosMode::TwoOnThree && players >= 3 {
                2.min(players)
            } else {
                1
            }
        }
        _ => 1,
    }
}

/// Grow one island of roughly `mass` tiles by random frontier expansion.
/// Returns `None` when no acceptable placement was found; partially grown
/// attempts are rolled back, so failure never leaves debris.
fn make_island(
    world: &mut WorldBuilder,
    mass: usize,
    starters: u32,
    min_fill_pct: usize,
    island_index: usize,
) -> Result<Option<Island>, GenError> {
    if mass == 0 {
        return Ok(None);
    }
    let continent_id = island_index as u32 + 1;

    for _ in 0..PLACE_ATTEMPTS {
        world.check_deadline()?;

        let seed = match random_seed_tile(world) {
            Some(coord) => coord,
            None => continue,
        };

        let mut painted: Vec<(u32, u32)> = Vec::new();
        let mut frontier: Vec<(u32, u32)> = vec![seed];
        while painted.len() < mass && !frontier.is_empty() {
            let pick = world.rng.gen_range(0..frontier.len());
            let (x, y) = frontier.swap_remove(pick);
            if !can_paint(world, x, y, continent_id) {
                continue;
            }

            let tile = world.tiles.get_mut(x, y);
            tile.clear_terrain();
            tile.set_continent_id(continent_id);
            let lift = world.rng.gen_range(0..=(HMAX - world.shore_level) / 2);
            world.heights.set(x, y, world.shore_level + lift);
            painted.push((x, y));

            let neighbors: Vec<(u32, u32)> = world.tiles.neighbors4(x, y).collect();
            for (nx, ny) in neighbors {
                if world.tiles.get(nx, ny).is_water() {
                    frontier.push((nx, ny));
                }
            }
        }

        if painted.len() * 100 >= mass * min_fill_pct {
            return Ok(Some(Island {
                representative: painted[0],
                mass: painted.len(),
                starters,
            }));
        }

        // Not enough room here; roll back and reseed
        for (x, y) in painted {
            let tile = world.tiles.get_mut(x, y);
            tile.set_terrain(Terrain::DeepOcean);
            tile.set_continent_id(0);
            world.heights.set(x, y, 0);
        }
    }
    Ok(None)
}

/// A random open-sea tile with margin from the border and from other land.
fn random_seed_tile(world: &mut WorldBuilder) -> Option<(u32, u32)> {
    let (w, h) = (world.width(), world.height());
    for _ in 0..30 {
        let x = world.rng.gen_range(BORDER_MARGIN..w - BORDER_MARGIN);
        let y = world.rng.gen_range(BORDER_MARGIN..h - BORDER_MARGIN);
        if can_paint(world, x, y, u32::MAX) && world.tiles.square(x, y, 2).all(|(nx, ny)| world.tiles.get(nx, ny).is_water()) {
            return Some((x, y));
        }
    }
    None
}

/// A tile can join an island if it is still sea, keeps the border margin,
/// and touches no foreign land (1-tile separation between islands).
fn can_paint(world: &WorldBuilder, x: u32, y: u32, continent_id: u32) -> bool {
    let (w, h) = (world.width(), world.height());
    if x < BORDER_MARGIN || y < BORDER_MARGIN || x >= w - BORDER_MARGIN || y >= h - BORDER_MARGIN {
        return false;
    }
    if !world.tiles.get(x, y).is_water() {
        return false;
    }
    world.tiles.square(x, y, 1).all(|(nx, ny)| {
        let tile = world.tiles.get(nx, ny);
        tile.is_water() || tile.continent_id() == continent_id
    })
}

/// Climate-conditioned variety per continent: draw candidate tiles at random
/// (up to 10x the target), accept the ones on the right continent that still
/// hold the land fill and match a weighted selection entry, and place the
/// entry's pick.
fn fill_all_island_terrain(
    world: &mut WorldBuilder,
    islands: &[Island],
) -> Result<(), GenError> {
    let lists = world.ruleset.island_terrain().clone();
    for island in islands {
        world.check_deadline()?;
        let id = world
            .tiles
            .get(island.representative.0, island.representative.1)
            .continent_id();
        if id == 0 {
            return Err(GenError::Internal(anyhow!(
                "island representative lost its continent ID"
            )));
        }

        let b = world.budgets;
        let relief_here = world
            .tiles
            .coords()
            .filter(|&(x, y)| {
                world.tiles.get(x, y).continent_id() == id
                    && matches!(
                        world.tiles.get(x, y).terrain_opt(),
                        Some(Terrain::Hills) | Some(Terrain::Mountains)
                    )
            })
            .count();

        let share = |pct: f64| (island.mass as f64 * pct / 100.0).round() as usize;
        let mountain_target = share(b.mountain_pct).saturating_sub(relief_here);

        fill_island_terrain(world, id, &lists.forest, share(b.forest_pct + b.jungle_pct))?;
        fill_island_terrain(world, id, &lists.desert, share(b.desert_pct))?;
        fill_island_terrain(world, id, &lists.mountain, mountain_target)?;
        fill_island_terrain(world, id, &lists.swamp, share(b.swamp_pct))?;
    }
    Ok(())
}

fn fill_island_terrain(
    world: &mut WorldBuilder,
    continent_id: u32,
    list: &[IslandPick],
    target: usize,
) -> Result<(), GenError> {
    let (w, h) = (world.width(), world.height());
    let weights: Vec<(usize, u32)> = list
        .iter()
        .enumerate()
        .map(|(i, entry)| (i, entry.weight))
        .collect();

    let mut placed = 0usize;
    let mut tries = target * 10;
    while placed < target && tries > 0 {
        tries -= 1;
        let x = world.rng.gen_range(0..w);
        let y = world.rng.gen_range(0..h);
        let tile = world.tiles.get(x, y);
        if tile.continent_id() != continent_id || !tile.is_land_fill() || !world.not_placed(x, y) {
            continue;
        }

        let entry = match crate::util::weighted_choice(&mut world.rng, &weights) {
            Some(index) => &list[index],
            None => break,
        };
        if !world.test_temperature(x, y, entry.temperature)
            || !world.test_wetness(x, y, entry.wetness)
        {
            continue;
        }
        let terrain =
            world
                .ruleset
                .pick_terrain(entry.target, entry.prefer, entry.avoid, &mut world.rng);
        world
            .place_terrain(x, y, terrain)
            .map_err(GenError::Internal)?;
        placed += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Generator;

    fn island_config(width: u32, height: u32, players: u32, mode: StartPosMode) -> GenConfig {
        GenConfig {
            width,
            height,
            seed: "island-test".into(),
            generator: Generator::Island,
            startpos: mode,
            player_count: players,
            ..Default::default()
        }
    }

    #[test]
    fn test_players_per_island() {
        assert_eq!(players_per_island(6, StartPosMode::All), 3);
        assert_eq!(players_per_island(4, StartPosMode::All), 2);
        assert_eq!(players_per_island(5, StartPosMode::All), 1);
        assert_eq!(players_per_island(1, StartPosMode::All), 1);
        assert_eq!(players_per_island(3, StartPosMode::TwoOnThree), 2);
        assert_eq!(players_per_island(7, StartPosMode::Single), 1);
    }

    #[test]
    fn test_landpercent_cap_raises_fallback() {
        let config = GenConfig {
            landpercent: 90,
            ..island_config(25, 25, 2, StartPosMode::Variable)
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let err = IslandStrategy.generate(&config, &ruleset).unwrap_err();
        assert_eq!(err.kind(), "FALLBACK_TO_RANDOM");
    }

    #[test]
    fn test_tiny_map_raises_fallback() {
        let config = island_config(4, 4, 2, StartPosMode::All);
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let err = IslandStrategy.generate(&config, &ruleset).unwrap_err();
        assert_eq!(err.kind(), "FALLBACK_TO_RANDOM");
    }

    #[test]
    fn test_islands_generate_disjoint_starter_continents() {
        let config = island_config(60, 50, 4, StartPosMode::All);
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let map = IslandStrategy.generate(&config, &ruleset).unwrap();

        assert_eq!(map.starting_positions.len(), 4);
        for start in &map.starting_positions {
            assert!(map.tile(start.x, start.y).terrain.is_land());
        }
        // Land exists and the border margin held
        assert!(map.land_tiles().count() > 0);
        for x in 0..60 {
            assert!(map.tile(x, 0).terrain.is_water());
            assert!(map.tile(x, 49).terrain.is_water());
        }
    }

    #[test]
    fn test_single_player_island_map() {
        let config = island_config(40, 40, 1, StartPosMode::Single);
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let map = IslandStrategy.generate(&config, &ruleset).unwrap();
        assert_eq!(map.starting_positions.len(), 1);
        let start = map.starting_positions[0];
        assert!(map.tile(start.x, start.y).terrain.is_land());
    }
}
