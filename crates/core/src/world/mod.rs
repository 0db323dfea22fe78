mod generate;
pub mod grid;
pub mod validate;

pub use generate::{FairIslandsStrategy, HeightBasedStrategy, IslandStrategy, TerrainBudgets};

use crate::{
    config::{GenConfig, Generator},
    error::GenError,
    ruleset::{TerrainProperty, TerrainRuleset},
    timed,
    world::grid::Direction,
};
use bitflags::bitflags;
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use strum::{EnumIter, EnumString};

/// Every terrain a tile can hold after finalization. The first four are the
/// water set; the rest is land. `DeepOcean`/`Ocean`/`Coast` are distinguished
/// purely by depth; `Lake` is a tiny water body reclassified as freshwater.
#[derive(
    Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize, EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Terrain {
    Ocean,
    Coast,
    DeepOcean,
    Lake,
    Grassland,
    Plains,
    Desert,
    Tundra,
    Forest,
    Jungle,
    Swamp,
    Hills,
    Mountains,
}

impl Terrain {
    /// Water set: all four water terrains, lakes included.
    pub fn is_water(self) -> bool {
        matches!(self, Self::Ocean | Self::Coast | Self::DeepOcean | Self::Lake)
    }

    /// Open (salt) water — everything lakes are carved out of.
    pub fn is_open_water(self) -> bool {
        matches!(self, Self::Ocean | Self::Coast | Self::DeepOcean)
    }

    pub fn is_land(self) -> bool {
        !self.is_water()
    }
}

/// The discrete temperature class of a tile. Exactly one per tile once the
/// temperature stage has run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureType {
    Frozen,
    Cold,
    Temperate,
    Tropical,
}

impl TemperatureType {
    /// The singleton set holding just this class, for membership tests
    /// against [TemperatureSet] literals.
    pub fn as_set(self) -> TemperatureSet {
        match self {
            Self::Frozen => TemperatureSet::FROZEN,
            Self::Cold => TemperatureSet::COLD,
            Self::Temperate => TemperatureSet::TEMPERATE,
            Self::Tropical => TemperatureSet::TROPICAL,
        }
    }
}

bitflags! {
    /// A set of temperature classes. Placement predicates are written against
    /// sets ("not frozen", "hot"), so the class doubles as a bitmask.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct TemperatureSet: u8 {
        const FROZEN = 1;
        const COLD = 2;
        const TEMPERATE = 4;
        const TROPICAL = 8;
    }
}

impl TemperatureSet {
    pub const HOT: Self = Self::TEMPERATE.union(Self::TROPICAL);
    pub const NHOT: Self = Self::FROZEN.union(Self::COLD);
    pub const NFROZEN: Self = Self::COLD.union(Self::TEMPERATE).union(Self::TROPICAL);

    pub fn matches(self, class: TemperatureType) -> bool {
        self.contains(class.as_set())
    }
}

/// Wetness condition used by placement predicates. `Dry` tiles sit in the
/// mid-latitude dry belt away from water and rivers; `NotDry` is everything
/// else.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WetnessCondition {
    All,
    Dry,
    NotDry,
}

bitflags! {
    /// River connections out of a tile. A bit may be set only when the
    /// neighbor in that direction exists and is either river-capable land or
    /// water.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RiverMask: u8 {
        const NORTH = 1;
        const EAST = 2;
        const SOUTH = 4;
        const WEST = 8;
    }
}

impl RiverMask {
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::North => Self::NORTH,
            Direction::East => Self::EAST,
            Direction::South => Self::SOUTH,
            Direction::West => Self::WEST,
        }
    }
}

/// A special resource on a tile. At most one per tile, and only on terrains
/// that admit it per the ruleset's resource table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Coal,
    Fish,
    Game,
    Gems,
    Gold,
    Oasis,
    Peat,
    Resources,
    Wheat,
}

/// One finalized cell of the emitted map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub terrain: Terrain,
    /// Emitted elevation, rescaled to 0..=255. Water tiles sit strictly below
    /// the map's shore level, land at or above it.
    pub elevation: u8,
    pub temperature: TemperatureType,
    /// 0..=100.
    pub wetness: u8,
    pub river_mask: RiverMask,
    /// Positive for land and lake tiles, 0 for open ocean.
    pub continent_id: u32,
    pub resource: Option<Resource>,
    /// The tile's climate affinities, copied from the ruleset entry for its
    /// terrain.
    pub properties: IndexMap<TerrainProperty, u8>,
}

/// A player starting position. Exactly one entry per player on the emitted
/// map.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StartPosition {
    pub x: u32,
    pub y: u32,
    pub player_id: u32,
}

/// A fully generated map, released to the caller once the pipeline has
/// finalized every tile. Tiles are stored column-major (x outer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapData {
    pub width: u32,
    pub height: u32,
    /// The seed in its original (string) form.
    pub seed: String,
    /// Unix timestamp (seconds) of emission. Excluded from equality: map
    /// identity is defined by tiles and starting positions.
    pub generated_at: u64,
    /// Elevation threshold separating water from land, on the emitted
    /// 0..=255 scale.
    pub shore_level: u8,
    pub tiles: Vec<Tile>,
    pub starting_positions: Vec<StartPosition>,
}

impl MapData {
    pub fn tile(&self, x: u32, y: u32) -> &Tile {
        &self.tiles[(x as usize) * (self.height as usize) + (y as usize)]
    }

    pub fn land_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(|t| t.terrain.is_land())
    }

    /// Serialize into JSON. This is a recoverable format; load it back with
    /// [MapData::from_json]. A failure here indicates a bug that prevents
    /// serialization.
    pub fn to_json(&self) -> anyhow::Result<String> {
        use anyhow::Context;
        serde_json::to_string(self).context("error serializing map")
    }

    /// Deserialize a map previously written by [MapData::to_json].
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        serde_json::from_str(json).context("error deserializing map")
    }

    pub(crate) fn now_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

// generated_at is an emission stamp, not part of map identity
impl PartialEq for MapData {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.seed == other.seed
            && self.shore_level == other.shore_level
            && self.tiles == other.tiles
            && self.starting_positions == other.starting_positions
    }
}

/// The top-level entry point: owns a config, runs the configured strategy and
/// the documented fallback chain, and hands out the finalized [MapData].
#[derive(Clone, Debug)]
pub struct World {
    config: GenConfig,
    map: MapData,
}

impl World {
    /// Generate a new world with the given config. Expected strategy
    /// failures are resolved here: fair islands falls back to plain islands,
    /// and island generation falls back to the random height generator. Use
    /// the strategy types directly if you need to observe those failures.
    pub fn generate(config: GenConfig) -> Result<Self, GenError> {
        config.check()?;
        let ruleset = TerrainRuleset::load(&config.ruleset_id)?;
        info!(
            "Generating {}x{} map with {:?} generator",
            config.width, config.height, config.generator
        );

        let map = timed!(
            "World generation",
            log::Level::Info,
            Self::dispatch(&config, &ruleset)?
        );
        Ok(Self { config, map })
    }

    fn dispatch(config: &GenConfig, ruleset: &TerrainRuleset) -> Result<MapData, GenError> {
        match config.generator {
            Generator::Fractal | Generator::Random | Generator::Fracture => {
                HeightBasedStrategy.generate(config, ruleset)
            }
            Generator::Island => Self::islands_or_random(config, ruleset),
            Generator::Fair => match FairIslandsStrategy::default().generate(config, ruleset) {
                Err(GenError::FallbackToIsland(reason)) => {
                    warn!("fair islands unavailable ({}), using plain islands", reason);
                    let island_config = GenConfig {
                        generator: Generator::Island,
                        ..config.clone()
                    };
                    Self::islands_or_random(&island_config, ruleset)
                }
                other => other,
            },
        }
    }

    fn islands_or_random(config: &GenConfig, ruleset: &TerrainRuleset) -> Result<MapData, GenError> {
        match IslandStrategy.generate(config, ruleset) {
            Err(GenError::FallbackToRandom(reason)) => {
                warn!("island generation unavailable ({}), using random heights", reason);
                let random_config = GenConfig {
                    generator: Generator::Random,
                    ..config.clone()
                };
                HeightBasedStrategy.generate(&random_config, ruleset)
            }
            other => other,
        }
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn into_map(self) -> MapData {
        self.map
    }
}

/// Shared stopwatch type for attempt deadlines. Checked between stages and at
/// the top of long placement loops; there is no mid-stage cancellation.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Deadline {
    at: Instant,
    budget_ms: u64,
}

impl Deadline {
    pub fn after_ms(budget_ms: u64) -> Self {
        Self {
            at: Instant::now() + std::time::Duration::from_millis(budget_ms),
            budget_ms,
        }
    }

    pub fn check(&self) -> Result<(), GenError> {
        if Instant::now() > self.at {
            Err(GenError::GenerationTimeout {
                budget_ms: self.budget_ms,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_water_sets() {
        assert!(Terrain::Lake.is_water());
        assert!(!Terrain::Lake.is_open_water());
        assert!(Terrain::DeepOcean.is_open_water());
        assert!(Terrain::Tundra.is_land());
    }

    #[test]
    fn test_temperature_set_literals() {
        assert!(TemperatureSet::HOT.matches(TemperatureType::Tropical));
        assert!(TemperatureSet::HOT.matches(TemperatureType::Temperate));
        assert!(!TemperatureSet::HOT.matches(TemperatureType::Cold));
        assert!(TemperatureSet::NFROZEN.matches(TemperatureType::Cold));
        assert!(!TemperatureSet::NFROZEN.matches(TemperatureType::Frozen));
        assert_eq!(TemperatureSet::HOT.union(TemperatureSet::NHOT), TemperatureSet::all());
    }

    #[test]
    fn test_river_mask_directions() {
        let mask = RiverMask::from_direction(Direction::North) | RiverMask::from_direction(Direction::West);
        assert!(mask.contains(RiverMask::NORTH));
        assert!(!mask.contains(RiverMask::SOUTH));
        assert_eq!(mask.bits(), 0b1001);
    }
}
