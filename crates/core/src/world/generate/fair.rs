//! Fair islands: an admissibility pre-check, a bounded retry loop around the
//! island strategy with progressively relaxed targets, and a post-generation
//! fairness validator. Anything unrecoverable degrades to the plain island
//! strategy via a typed fallback.

use crate::{
    config::{GenConfig, Generator, StartPosMode},
    error::GenError,
    ruleset::TerrainRuleset,
    world::{
        generate::{island::players_per_island, ClimateLevels, IslandStrategy, MAX_COLATITUDE},
        grid::{chebyshev_distance, euclidean_distance},
        Deadline, MapData,
    },
};
use log::{debug, info};

/// Islands below this size don't count as major; also the smallest island
/// mass worth asking for.
const MIN_ISLAND_SIZE: usize = 20;

/// Radius (Chebyshev) of the resource neighborhood scored around each start.
const RESOURCE_RADIUS: u32 = 3;

#[derive(Copy, Clone, Debug)]
pub struct FairIslandsStrategy {
    pub max_attempts: u32,
}

impl Default for FairIslandsStrategy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl FairIslandsStrategy {
    pub fn generate(
        &self,
        config: &GenConfig,
        ruleset: &TerrainRuleset,
    ) -> Result<MapData, GenError> {
        config.check()?;

        // Fair islands always runs the island machinery in ALL mode
        let base = GenConfig {
            generator: Generator::Island,
            startpos: StartPosMode::All,
            ..config.clone()
        };
        precheck(&base)?;

        for attempt in 1..=self.max_attempts {
            // Relax the island mass targets a step per retry, on a copy;
            // the original percentages are never touched
            let relaxed = GenConfig {
                landpercent: base.landpercent * (100 - 10 * (attempt - 1)) / 100,
                ..base.clone()
            };
            let budget_ms = 30_000 + u64::from(attempt - 1) * 10_000;
            let deadline = Deadline::after_ms(budget_ms);

            debug!(
                "fair islands attempt {}/{} (landpercent {}, budget {} ms)",
                attempt, self.max_attempts, relaxed.landpercent, budget_ms
            );
            match IslandStrategy.generate_with_deadline(&relaxed, ruleset, Some(deadline)) {
                Ok(map) => match postcheck(&map, &base) {
                    Ok(()) => {
                        info!("fair islands succeeded on attempt {}", attempt);
                        return Ok(map);
                    }
                    Err(reason) => {
                        debug!("attempt {} rejected: {}", attempt, reason);
                    }
                },
                Err(GenError::GenerationTimeout { budget_ms }) => {
                    debug!("attempt {} timed out after {} ms", attempt, budget_ms);
                }
                Err(GenError::FallbackToRandom(reason)) => {
                    // The island machinery itself can't work here; fairness
                    // is moot
                    return Err(GenError::FallbackToIsland(reason));
                }
                Err(other) => return Err(other),
            }
        }
        Err(GenError::FallbackToIsland(format!(
            "no acceptable map within {} attempts",
            self.max_attempts
        )))
    }
}

/// Admissibility: is there even enough land budget to give every player a
/// fair island? Failing this skips generation entirely.
pub(crate) fn precheck(config: &GenConfig) -> Result<(), GenError> {
    if config.width < 20 || config.height < 20 {
        return Err(GenError::FallbackToIsland(format!(
            "{}x{} is below the fair-islands minimum of 20x20",
            config.width, config.height
        )));
    }

    let players = config.player_count as i64;
    let per_island = i64::from(players_per_island(config.player_count, StartPosMode::All));
    let tiles = i64::from(config.width) * i64::from(config.height);
    let landpercent = i64::from(config.landpercent);
    let polar = polar_tile_count(config) as i64;

    let playermass = (tiles * landpercent - 100 * polar) / (players * 100);
    let islandmass1 = (per_island * playermass * 7 / 10).max(MIN_ISLAND_SIZE as i64);
    let islandmass2 = (2 * playermass / 10).max(MIN_ISLAND_SIZE as i64);
    let islandmass3 = (playermass / 10).max(MIN_ISLAND_SIZE as i64);

    if playermass <= 0 {
        return Err(GenError::FallbackToIsland(
            "land budget leaves no mass per player".into(),
        ));
    }
    if per_island * playermass * 7 / 10 <= MIN_ISLAND_SIZE as i64 {
        return Err(GenError::FallbackToIsland(format!(
            "player islands would be under the {}-tile minimum",
            MIN_ISLAND_SIZE
        )));
    }

    let starter_islands = (players + per_island - 1) / per_island;
    let demanded = islandmass1 * starter_islands + 2 * islandmass2 + 3 * islandmass3;
    let available = tiles * landpercent / 100;
    if demanded * 10 > available * 12 {
        return Err(GenError::FallbackToIsland(format!(
            "island plan needs {} tiles but only {} are budgeted",
            demanded, available
        )));
    }
    Ok(())
}

/// Tiles inside the restrictive polar band, where islands are not placed.
fn polar_tile_count(config: &GenConfig) -> usize {
    let climate = ClimateLevels::new(config.temperature);
    let band = climate.ice_base * 5 / 2;
    let rows = config.height;
    if rows <= 1 {
        return 0;
    }
    let half = f64::from(rows - 1) / 2.0;
    let mut polar_rows = 0usize;
    for y in 0..rows {
        let colatitude = ((f64::from(y) - half).abs() / half * f64::from(MAX_COLATITUDE)).round();
        if MAX_COLATITUDE - (colatitude as i32) <= band {
            polar_rows += 1;
        }
    }
    polar_rows * config.width as usize
}

/// Post-generation fairness: enough major islands, well-spread starts, and
/// balanced resources around every start.
pub(crate) fn postcheck(map: &MapData, config: &GenConfig) -> Result<(), String> {
    let players = config.player_count;
    if map.starting_positions.len() != players as usize {
        return Err(format!(
            "expected {} starting positions, found {}",
            players,
            map.starting_positions.len()
        ));
    }

    // Major island count
    let per_island = players_per_island(players, StartPosMode::All);
    let required_majors = (players + per_island - 1) / per_island;
    let majors = major_island_count(map);
    if majors < required_majors as usize {
        return Err(format!(
            "only {} major islands for {} starter groups",
            majors, required_majors
        ));
    }

    // Start spacing
    if players > 1 {
        let minimum =
            f64::from(map.width.min(map.height)) / (f64::from(players) * 0.8);
        for (i, a) in map.starting_positions.iter().enumerate() {
            for b in map.starting_positions.iter().skip(i + 1) {
                let distance = euclidean_distance((a.x, a.y), (b.x, b.y));
                if distance < minimum {
                    return Err(format!(
                        "starts {:.1} apart, need {:.1}",
                        distance, minimum
                    ));
                }
            }
        }
    }

    // Resource balance around starts
    let counts: Vec<usize> = map
        .starting_positions
        .iter()
        .map(|start| resources_near(map, start.x, start.y))
        .collect();
    let min = counts.iter().copied().min().unwrap_or(0);
    let max = counts.iter().copied().max().unwrap_or(0);
    if min < 2 {
        return Err(format!("a start has only {} resources nearby", min));
    }
    if max > 0 && (min as f64) / (max as f64) < 0.6 {
        return Err(format!("resource balance {}/{} is under 0.6", min, max));
    }
    Ok(())
}

/// Count 4-connected non-ocean components of at least [MIN_ISLAND_SIZE]
/// tiles.
fn major_island_count(map: &MapData) -> usize {
    let (w, h) = (map.width as usize, map.height as usize);
    let mut visited = vec![false; w * h];
    let index = |x: u32, y: u32| (x as usize) * h + (y as usize);
    let mut majors = 0;

    for x in 0..map.width {
        for y in 0..map.height {
            if visited[index(x, y)] || map.tile(x, y).terrain.is_open_water() {
                continue;
            }
            let mut size = 0usize;
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
                    if !visited[index(nx, ny)] && !map.tile(nx, ny).terrain.is_open_water() {
                        visited[index(nx, ny)] = true;
                        stack.push((nx, ny));
                    }
                }
            }
            if size >= MIN_ISLAND_SIZE {
                majors += 1;
            }
        }
    }
    majors
}

fn resources_near(map: &MapData, x: u32, y: u32) -> usize {
    let mut count = 0;
    for nx in x.saturating_sub(RESOURCE_RADIUS)..=(x + RESOURCE_RADIUS).min(map.width - 1) {
        for ny in y.saturating_sub(RESOURCE_RADIUS)..=(y + RESOURCE_RADIUS).min(map.height - 1) {
            if chebyshev_distance((x, y), (nx, ny)) <= RESOURCE_RADIUS
                && map.tile(nx, ny).resource.is_some()
            {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fair_config(width: u32, height: u32, players: u32) -> GenConfig {
        GenConfig {
            width,
            height,
            seed: "fair-test".into(),
            generator: Generator::Island,
            startpos: StartPosMode::All,
            player_count: players,
            ..Default::default()
        }
    }

    #[test]
    fn test_precheck_accepts_reasonable_maps() {
        precheck(&fair_config(40, 40, 4)).unwrap();
        precheck(&fair_config(40, 40, 1)).unwrap();
    }

    #[test]
    fn test_precheck_rejects_small_maps() {
        let err = precheck(&fair_config(15, 40, 2)).unwrap_err();
        assert_eq!(err.kind(), "FALLBACK_TO_ISLAND");
    }

    #[test]
    fn test_precheck_rejects_starved_land_budget() {
        let config = GenConfig {
            landpercent: 1,
            ..fair_config(20, 20, 8)
        };
        let err = precheck(&config).unwrap_err();
        assert_eq!(err.kind(), "FALLBACK_TO_ISLAND");
    }

    #[test]
    fn test_fair_generation_or_typed_fallback() {
        let config = GenConfig {
            generator: Generator::Fair,
            ..fair_config(40, 40, 4)
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        match FairIslandsStrategy::default().generate(&config, &ruleset) {
            Ok(map) => {
                assert_eq!(map.starting_positions.len(), 4);
                assert!(major_island_count(&map) >= 2);
                let minimum = 40.0 / (4.0 * 0.8);
                for (i, a) in map.starting_positions.iter().enumerate() {
                    for b in map.starting_positions.iter().skip(i + 1) {
                        assert!(euclidean_distance((a.x, a.y), (b.x, b.y)) >= minimum);
                    }
                }
            }
            Err(err) => assert_eq!(err.kind(), "FALLBACK_TO_ISLAND"),
        }
    }
}
