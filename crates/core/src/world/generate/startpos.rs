//! Player starting positions. Island strategies dictate which continent each
//! start lands on; height-based maps get a greedy max-min-distance spread
//! over hospitable land.

use crate::world::{
    generate::{Generate, WorldBuilder},
    grid::euclidean_distance,
    StartPosition, Terrain,
};
use rand::Rng;

/// Terrains worth founding a capital on, in preference order.
const HOSPITABLE: &[Terrain] = &[
    Terrain::Grassland,
    Terrain::Plains,
    Terrain::Forest,
    Terrain::Hills,
];

#[derive(Debug)]
pub(crate) struct StartPosGenerator;

impl Generate for StartPosGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let players = world.config.player_count;
        let mut chosen: Vec<(u32, u32)> = Vec::new();

        for player in 0..players {
            let constraint = world
                .starter_continents
                .get(player as usize)
                .copied();
            let position = pick_start(world, &chosen, constraint);
            chosen.push(position);
            world.start_positions.push(StartPosition {
                x: position.0,
                y: position.1,
                player_id: player,
            });
        }
        Ok(())
    }
}

/// Choose the next start: among the best available candidate pool, take the
/// tile furthest (max-min distance) from everyone already placed. The first
/// pick is randomized so different seeds spread players differently.
fn pick_start(
    world: &mut WorldBuilder,
    chosen: &[(u32, u32)],
    continent: Option<u32>,
) -> (u32, u32) {
    let candidates = candidate_pool(world, chosen, continent);
    if candidates.is_empty() {
        // Degenerate map (no land at all, or fewer tiles than players):
        // fall back to any tile so the contract of one start per player
        // still holds
        return (
            world.rng.gen_range(0..world.width()),
            world.rng.gen_range(0..world.height()),
        );
    }

    if chosen.is_empty() {
        return candidates[world.rng.gen_range(0..candidates.len())];
    }
    *candidates
        .iter()
        .max_by(|a, b| {
            let da = min_distance(a, chosen);
            let db = min_distance(b, chosen);
            da.partial_cmp(&db).expect("distances are finite")
        })
        .expect("non-empty candidate pool")
}

/// Candidate tiles, relaxing the quality bar until something is available:
/// hospitable unclaimed land first, then any unclaimed land, then claimed
/// land.
fn candidate_pool(
    world: &WorldBuilder,
    chosen: &[(u32, u32)],
    continent: Option<u32>,
) -> Vec<(u32, u32)> {
    let on_continent = |x: u32, y: u32| match continent {
        Some(id) => world.tiles.get(x, y).continent_id() == id,
        None => true,
    };
    let land = |x: u32, y: u32| {
        matches!(world.tiles.get(x, y).terrain_opt(), Some(t) if t.is_land())
    };
    let hospitable = |x: u32, y: u32| {
        matches!(world.tiles.get(x, y).terrain_opt(), Some(t) if HOSPITABLE.contains(&t))
    };
    let unclaimed = |x: u32, y: u32| !chosen.contains(&(x, y));

    let tiers: [&dyn Fn(u32, u32) -> bool; 3] = [
        &|x, y| hospitable(x, y) && unclaimed(x, y) && on_continent(x, y),
        &|x, y| land(x, y) && unclaimed(x, y) && on_continent(x, y),
        &|x, y| land(x, y) && unclaimed(x, y),
    ];
    for tier in tiers {
        let pool: Vec<(u32, u32)> = world.tiles.coords().filter(|&(x, y)| tier(x, y)).collect();
        if !pool.is_empty() {
            return pool;
        }
    }
    Vec::new()
}

fn min_distance(candidate: &(u32, u32), chosen: &[(u32, u32)]) -> f64 {
    chosen
        .iter()
        .map(|c| euclidean_distance(*candidate, *c))
        .fold(f64::INFINITY, f64::min)
}
