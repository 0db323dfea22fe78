//! Biome transitions: a post-pass over the placed terrain that clusters
//! same-biome regions, softens hard climate edges, and nudges regional
//! outliers toward their biome. Each phase collects its edits into a shadow
//! list and commits once, so results don't depend on sweep order within a
//! phase.

use crate::world::{
    generate::{Generate, WorldBuilder},
    grid::Direction,
    RiverMask, TemperatureType, Terrain,
};
use rand::Rng;

/// Probability of adopting the neighborhood terrain during clustering.
const CLUSTER_CHANCE: f64 = 0.15;
/// Probability of softening a hard gradient edge.
const TRANSITION_CHANCE: f64 = 0.1;
/// Probability of resampling a regional outlier.
const REGION_CHANCE: f64 = 0.3;

/// Elevation difference (internal scale) that counts as a hard edge.
const ELEVATION_EDGE: i32 = 100;
/// Wetness difference that counts as a climate edge.
const WETNESS_EDGE: i32 = 30;

#[derive(Debug)]
pub(crate) struct BiomeGenerator;

impl Generate for BiomeGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        cluster_biomes(world)?;
        soften_transitions(world)?;
        regional_consistency(world)?;
        Ok(())
    }
}

/// The coarse climate bucket used for grouping and regional consistency.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Biome {
    TropicalWet,
    TropicalDry,
    TemperateWet,
    Temperate,
    TemperateDry,
    ColdWet,
    ColdDry,
    Arctic,
}

impl Biome {
    fn classify(temperature: TemperatureType, wetness: u8) -> Self {
        match temperature {
            TemperatureType::Frozen => Self::Arctic,
            TemperatureType::Cold => {
                if wetness >= 50 {
                    Self::ColdWet
                } else {
                    Self::ColdDry
                }
            }
            TemperatureType::Temperate => {
                if wetness >= 60 {
                    Self::TemperateWet
                } else if wetness >= 40 {
                    Self::Temperate
                } else {
                    Self::TemperateDry
                }
            }
            TemperatureType::Tropical => {
                if wetness >= 50 {
                    Self::TropicalWet
                } else {
                    Self::TropicalDry
                }
            }
        }
    }

    /// Land terrains that read as native inside this biome.
    fn compatible(self) -> &'static [Terrain] {
        match self {
            Self::TropicalWet => &[Terrain::Jungle, Terrain::Swamp, Terrain::Forest, Terrain::Grassland],
            Self::TropicalDry => &[Terrain::Plains, Terrain::Desert, Terrain::Grassland, Terrain::Hills],
            Self::TemperateWet => &[Terrain::Grassland, Terrain::Forest, Terrain::Swamp, Terrain::Hills],
            Self::Temperate => &[Terrain::Grassland, Terrain::Plains, Terrain::Forest, Terrain::Hills],
            Self::TemperateDry => &[Terrain::Plains, Terrain::Desert, Terrain::Grassland, Terrain::Hills],
            Self::ColdWet => &[Terrain::Tundra, Terrain::Forest, Terrain::Hills],
            Self::ColdDry => &[Terrain::Tundra, Terrain::Plains, Terrain::Hills, Terrain::Mountains],
            Self::Arctic => &[Terrain::Tundra, Terrain::Mountains, Terrain::Hills],
        }
    }
}

fn biome_of(world: &WorldBuilder, x: u32, y: u32) -> Option<Biome> {
    let tile = world.tiles.get(x, y);
    if tile.is_water() || tile.is_land_fill() {
        return None;
    }
    let temperature = tile.temperature_opt()?;
    let wetness = tile.wetness().ok()?;
    Some(Biome::classify(temperature, wetness))
}

/// A terrain swap can't strand a river bit: the new terrain either supports
/// rivers, or the tile carries no bits and no neighbor points one at it.
fn river_allows(world: &WorldBuilder, x: u32, y: u32, terrain: Terrain) -> bool {
    if world.ruleset.can_have_river(terrain) {
        return true;
    }
    if world.tiles.get(x, y).has_river() {
        return false;
    }
    for direction in Direction::ALL {
        let (dx, dy) = direction.offset();
        let (nx, ny) = (x as i32 + dx, y as i32 + dy);
        if !world.tiles.contains(nx, ny) {
            continue;
        }
        let inbound = RiverMask::from_direction(direction.opposite());
        if world
            .tiles
            .get(nx as u32, ny as u32)
            .river_mask()
            .contains(inbound)
        {
            return false;
        }
    }
    true
}

/// Phase 1: tiles inside a same-biome pocket occasionally adopt the pocket's
/// dominant compatible terrain, thickening natural clusters.
fn cluster_biomes(world: &mut WorldBuilder) -> anyhow::Result<()> {
    let (w, h) = (world.width(), world.height());
    let mut edits: Vec<(u32, u32, Terrain)> = Vec::new();

    for x in 0..w {
        for y in 0..h {
            let biome = match biome_of(world, x, y) {
                Some(b) => b,
                None => continue,
            };

            // Dominant terrain among same-biome neighbors
            let mut counts: Vec<(Terrain, u32)> = Vec::new();
            let mut same_biome = 0;
            for (nx, ny) in world.tiles.neighbors8(x, y) {
                if biome_of(world, nx, ny) != Some(biome) {
                    continue;
                }
                same_biome += 1;
                let terrain = world.tiles.get(nx, ny).terrain()?;
                match counts.iter_mut().find(|(t, _)| *t == terrain) {
                    Some(entry) => entry.1 += 1,
                    None => counts.push((terrain, 1)),
                }
            }
            if same_biome < 3 {
                continue;
            }
            if world.rng.gen::<f64>() >= CLUSTER_CHANCE {
                continue;
            }

            let dominant = counts
                .iter()
                .max_by_key(|(_, count)| *count)
                .map(|(terrain, _)| *terrain);
            if let Some(terrain) = dominant {
                if terrain != world.tiles.get(x, y).terrain()?
                    && biome.compatible().contains(&terrain)
                    && river_allows(world, x, y, terrain)
                {
                    edits.push((x, y, terrain));
                }
            }
        }
    }

    for (x, y, terrain) in edits {
        world.tiles.get_mut(x, y).set_terrain(terrain);
    }
    Ok(())
}

/// Phase 2: hard local gradients get softened — sheer relief steps down, and
/// climate edges swap in transition terrain.
fn soften_transitions(world: &mut WorldBuilder) -> anyhow::Result<()> {
    let (w, h) = (world.width(), world.height());
    let mut edits: Vec<(u32, u32, Terrain)> = Vec::new();

    for x in 0..w {
        for y in 0..h {
            let tile = world.tiles.get(x, y);
            if tile.is_water() || tile.is_land_fill() {
                continue;
            }
            let terrain = tile.terrain()?;
            let temperature = tile.temperature()?;
            let wetness = i32::from(tile.wetness()?);

            let elevation = *world.heights.get(x, y);
            let mut elevation_gradient = 0;
            let mut wetness_gradient = 0;
            for (nx, ny) in world.tiles.neighbors4(x, y) {
                elevation_gradient =
                    elevation_gradient.max((elevation - *world.heights.get(nx, ny)).abs());
                if let Ok(neighbor_wetness) = world.tiles.get(nx, ny).wetness() {
                    wetness_gradient =
                        wetness_gradient.max((wetness - i32::from(neighbor_wetness)).abs());
                }
            }

            // Sheer relief steps down one notch
            if elevation_gradient > ELEVATION_EDGE
                && matches!(terrain, Terrain::Mountains | Terrain::Hills)
                && world.rng.gen::<f64>() < TRANSITION_CHANCE
            {
                let softened = match terrain {
                    Terrain::Mountains => Terrain::Hills,
                    _ => match temperature {
                        TemperatureType::Frozen | TemperatureType::Cold => Terrain::Tundra,
                        _ => Terrain::Grassland,
                    },
                };
                edits.push((x, y, softened));
                continue;
            }

            // Climate edges: deserts against wet zones turn to plains,
            // forests in hot wet spots close into jungle
            if wetness_gradient > WETNESS_EDGE
                && terrain == Terrain::Desert
                && world.rng.gen::<f64>() < TRANSITION_CHANCE
            {
                edits.push((x, y, Terrain::Plains));
                continue;
            }
            if terrain == Terrain::Forest
                && temperature == TemperatureType::Tropical
                && wetness > 60
                && world.rng.gen::<f64>() < TRANSITION_CHANCE
            {
                edits.push((x, y, Terrain::Jungle));
            }
        }
    }

    for (x, y, terrain) in edits {
        world.tiles.get_mut(x, y).set_terrain(terrain);
    }
    Ok(())
}

/// Phase 3: random regional windows pull terrain outliers toward the
/// window's average climate.
fn regional_consistency(world: &mut WorldBuilder) -> anyhow::Result<()> {
    let (w, h) = (world.width(), world.height());
    let windows = ((w as usize) * (h as usize) / 25).max(1);
    let mut edits: Vec<(u32, u32, Terrain)> = Vec::new();

    for _ in 0..windows {
        let cx = world.rng.gen_range(0..w);
        let cy = world.rng.gen_range(0..h);
        let radius = if world.rng.gen::<f64>() < 0.5 { 1 } else { 2 };

        // Average climate over the window's land tiles
        let mut temp_sum = 0i32;
        let mut wetness_sum = 0i32;
        let mut count = 0i32;
        for (nx, ny) in world.tiles.square(cx, cy, radius) {
            let tile = world.tiles.get(nx, ny);
            if tile.is_water() || tile.is_land_fill() {
                continue;
            }
            if let (Some(temperature), Ok(wetness)) = (tile.temperature_opt(), tile.wetness()) {
                temp_sum += match temperature {
                    TemperatureType::Frozen => 0,
                    TemperatureType::Cold => 1,
                    TemperatureType::Temperate => 2,
                    TemperatureType::Tropical => 3,
                };
                wetness_sum += i32::from(wetness);
                count += 1;
            }
        }
        if count == 0 {
            continue;
        }
        let dominant_temperature = match (temp_sum as f64 / f64::from(count)).round() as i32 {
            0 => TemperatureType::Frozen,
            1 => TemperatureType::Cold,
            2 => TemperatureType::Temperate,
            _ => TemperatureType::Tropical,
        };
        let dominant =
            Biome::classify(dominant_temperature, (wetness_sum / count).clamp(0, 100) as u8);

        // Resample outliers into biome-valid terrain
        let coords: Vec<(u32, u32)> = world.tiles.square(cx, cy, radius).collect();
        for (nx, ny) in coords {
            let tile = world.tiles.get(nx, ny);
            if tile.is_water() || tile.is_land_fill() {
                continue;
            }
            let terrain = tile.terrain()?;
            if dominant.compatible().contains(&terrain) {
                continue;
            }
            if world.rng.gen::<f64>() >= REGION_CHANCE {
                continue;
            }
            let pool = dominant.compatible();
            let replacement = pool[world.rng.gen_range(0..pool.len())];
            if river_allows(world, nx, ny, replacement) {
                edits.push((nx, ny, replacement));
            }
        }
    }

    for (x, y, terrain) in edits {
        world.tiles.get_mut(x, y).set_terrain(terrain);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GenConfig, ruleset::TerrainRuleset, world::grid::Grid};

    fn uniform_world<'a>(
        config: &'a GenConfig,
        ruleset: &'a TerrainRuleset,
        terrain: Terrain,
    ) -> WorldBuilder<'a> {
        let mut world = WorldBuilder::new(config, ruleset, None);
        world.shore_level = 200;
        world.heights = Grid::filled(config.width, config.height, 500);
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            let tile = world.tiles.get_mut(x, y);
            tile.set_terrain(terrain);
            tile.set_temperature(TemperatureType::Temperate);
            tile.set_wetness(50);
        }
        world
    }

    #[test]
    fn test_biome_classification() {
        assert_eq!(Biome::classify(TemperatureType::Frozen, 90), Biome::Arctic);
        assert_eq!(Biome::classify(TemperatureType::Cold, 70), Biome::ColdWet);
        assert_eq!(Biome::classify(TemperatureType::Temperate, 50), Biome::Temperate);
        assert_eq!(Biome::classify(TemperatureType::Temperate, 10), Biome::TemperateDry);
        assert_eq!(Biome::classify(TemperatureType::Tropical, 80), Biome::TropicalWet);
    }

    #[test]
    fn test_stable_map_stays_mostly_stable() {
        let config = GenConfig {
            width: 20,
            height: 20,
            seed: 61u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = uniform_world(&config, &ruleset, Terrain::Grassland);
        BiomeGenerator.generate(&mut world).unwrap();

        // Grassland is compatible with the temperate biome and there are no
        // gradients, so the pass converges: nothing changes
        let changed = world
            .tiles
            .cells()
            .filter(|t| t.terrain_opt() != Some(Terrain::Grassland))
            .count();
        assert_eq!(changed, 0);
    }

    #[test]
    fn test_desert_outlier_eroded() {
        let config = GenConfig {
            width: 15,
            height: 15,
            seed: 62u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = uniform_world(&config, &ruleset, Terrain::Grassland);
        // A lone desert blob in a temperate grass plain
        for (x, y) in [(7, 7), (7, 8), (8, 7)] {
            world.tiles.get_mut(x, y).set_terrain(Terrain::Desert);
        }
        // Several sweeps: clustering and regional consistency both get
        // chances to erode the outlier
        for _ in 0..20 {
            BiomeGenerator.generate(&mut world).unwrap();
        }
        let deserts = world
            .tiles
            .cells()
            .filter(|t| t.terrain_opt() == Some(Terrain::Desert))
            .count();
        assert!(deserts < 3, "desert outlier survived every sweep");
    }

    #[test]
    fn test_river_tiles_never_become_mountains() {
        let config = GenConfig {
            width: 10,
            height: 10,
            seed: 63u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        // Grassland under arctic temperatures: the regional pass wants to
        // resample these tiles, and mountains are in the arctic pool
        let mut world = uniform_world(&config, &ruleset, Terrain::Grassland);
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            let tile = world.tiles.get_mut(x, y);
            tile.set_temperature(TemperatureType::Frozen);
            tile.set_wetness(20);
        }
        world.tiles.get_mut(5, 5).add_river(Direction::North);
        world.tiles.get_mut(5, 4).add_river(Direction::South);
        for _ in 0..30 {
            BiomeGenerator.generate(&mut world).unwrap();
        }
        let terrain = world.tiles.get(5, 5).terrain_opt().unwrap();
        assert!(ruleset.can_have_river(terrain), "river tile became {:?}", terrain);
    }
}
