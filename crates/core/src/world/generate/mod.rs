mod biome;
mod continent;
mod fair;
mod height;
mod island;
mod land;
mod ocean;
mod placement;
mod relief;
mod resource;
mod river;
mod startpos;
mod temperature;
mod terrain;
mod wetness;

pub use fair::FairIslandsStrategy;
pub use island::IslandStrategy;

use crate::{
    config::GenConfig,
    error::GenError,
    ruleset::TerrainRuleset,
    timed,
    world::{
        generate::placement::PlacementMap,
        grid::{Direction, Grid},
        validate::MapValidator,
        Deadline, MapData, Resource, RiverMask, StartPosition, TemperatureSet, TemperatureType,
        Terrain, Tile, WetnessCondition,
    },
};
use anyhow::{anyhow, Context};
use log::info;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::{fmt::Debug, time::Instant};

/// Maximum internal elevation. Heights live on this scale for the whole
/// pipeline and are rescaled to 0..=255 on emit.
pub(crate) const HMAX: i32 = 1000;

/// Colatitude of the poles (map edges); the equator row is 0.
pub(crate) const MAX_COLATITUDE: i32 = 1000;

/// Largest 4-connected open-water component that gets reclassified as lake.
pub(crate) const LAKE_MAX_SIZE: usize = 2;

/// Cap on the ocean-depth value handed to the depth-based terrain pick.
pub(crate) const OCEAN_DEPTH_MAX: i32 = 100;

/// Top-level driver for the fractal/random/fracture generators: prepares the
/// height field, runs the land pipeline, then reports validator metrics. No
/// retry logic at this layer.
#[derive(Copy, Clone, Debug, Default)]
pub struct HeightBasedStrategy;

impl HeightBasedStrategy {
    pub fn generate(
        &self,
        config: &GenConfig,
        ruleset: &TerrainRuleset,
    ) -> Result<MapData, GenError> {
        config.check()?;
        if !config.generator.is_height_based() {
            return Err(GenError::InvalidConfig(format!(
                "{:?} is not a height-based generator",
                config.generator
            )));
        }
        let started = Instant::now();
        let mut world = WorldBuilder::new(config, ruleset, None);
        world.run_height_pipeline()?;
        let map = world.finalize()?;

        // Metrics only; height-based maps are emitted regardless of score
        let report = MapValidator::new(config, ruleset)
            .with_generation_time(started.elapsed().as_millis() as u64)
            .validate(&map);
        info!(
            "height-based map scored {} ({} issues)",
            report.score,
            report.issues.len()
        );
        Ok(map)
    }
}

/// A type that generates some part of the world: each stage reads fields the
/// previous stages wrote and adds its own. Stages can mutate tiles and side
/// fields but never resize the map.
///
/// Any error returned from `generate` is an internal failure — a bug in the
/// pipeline rather than something wrong with the input — and aborts the
/// whole invocation.
pub(crate) trait Generate {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()>;
}

/// A container for building a new world: the tile grid plus every transient
/// side field the stages communicate through. Fields are public to allow
/// disjoint borrows of several of them at once inside stage code.
pub(crate) struct WorldBuilder<'a> {
    pub config: &'a GenConfig,
    pub ruleset: &'a TerrainRuleset,

    /// RNG provider. Draw order is fixed by the stage sequence, which is
    /// what makes generation reproducible.
    pub rng: Pcg64,

    /// All tiles in the world, column-major.
    pub tiles: Grid<TileBuilder>,

    /// Working elevation field, 0..=[HMAX].
    pub heights: Grid<i32>,

    /// Elevation threshold separating ocean from land. Set by the height
    /// stage (or island init) before anything reads it.
    pub shore_level: i32,

    /// Elevation threshold above which a tile is a relief candidate.
    pub mountain_level: i32,

    /// Swamp threshold: land strictly below it counts as "low".
    pub hmap_low_level: i32,

    /// Discrete climate band thresholds, derived from the temperature lever.
    pub climate: ClimateLevels,

    /// Terrain budget percentages. Computed by the land stage (step 5).
    pub budgets: TerrainBudgets,

    /// The continuous temperature field. Dropped after classification when
    /// the config asks for cleanup.
    pub temperature_field: Option<Grid<i32>>,

    /// Tracks which tiles have had their terrain committed by a placement
    /// pass. Alive from land classification until continent labeling.
    pub placed: Option<PlacementMap>,

    /// Number of continents labeled so far (IDs run 1..=count).
    pub continent_count: u32,

    pub start_positions: Vec<StartPosition>,

    /// Continent IDs that should each receive a starting position, one entry
    /// per start slot. Filled by the island strategies; empty means "place
    /// starts anywhere good".
    pub starter_continents: Vec<u32>,

    /// Attempt deadline, checked between stages and at the top of long
    /// placement loops.
    pub deadline: Option<Deadline>,

    /// True while pole heights are pre-scaled down; guards renormalization
    /// so it runs exactly once per normalization.
    pub poles_normalized: bool,
}

impl<'a> WorldBuilder<'a> {
    pub fn new(
        config: &'a GenConfig,
        ruleset: &'a TerrainRuleset,
        deadline: Option<Deadline>,
    ) -> Self {
        let tiles = Grid::from_fn(config.width, config.height, |_, _| TileBuilder::new());
        Self {
            config,
            ruleset,
            rng: Pcg64::seed_from_u64(config.seed.to_u64()),
            tiles,
            heights: Grid::new(config.width, config.height),
            shore_level: 0,
            mountain_level: HMAX,
            hmap_low_level: 0,
            climate: ClimateLevels::new(config.temperature),
            budgets: TerrainBudgets::default(),
            temperature_field: None,
            placed: None,
            continent_count: 0,
            start_positions: Vec::new(),
            starter_continents: Vec::new(),
            deadline,
            poles_normalized: false,
        }
    }

    /// The full height-based pipeline: land classification through start
    /// positions, in the fixed stage order.
    pub fn run_height_pipeline(&mut self) -> Result<(), GenError> {
        self.apply_stage(height::HeightGenerator)?;
        self.apply_stage(land::LandGenerator)?;
        self.apply_stage(relief::ReliefGenerator)?;
        self.apply_stage(temperature::TemperatureGenerator)?;
        self.apply_stage(terrain::TerrainGenerator)?;
        self.apply_stage(continent::ContinentGenerator)?;
        self.apply_stage(river::RiverGenerator)?;
        self.apply_stage(ocean::OceanGenerator)?;
        self.apply_stage(continent::LakeGenerator)?;
        self.apply_stage(wetness::WetnessGenerator)?;
        self.apply_stage(biome::BiomeGenerator)?;
        self.apply_stage(terrain::PlainsGenerator)?;
        self.apply_stage(resource::ResourceGenerator)?;
        self.apply_stage(startpos::StartPosGenerator)?;
        Ok(())
    }

    /// Run one generation stage with timing and error context. The deadline
    /// is checked first, so a timed-out attempt stops at the next stage
    /// boundary.
    pub fn apply_stage(&mut self, stage: impl Debug + Generate) -> Result<(), GenError> {
        self.check_deadline()?;
        timed!(&format!("{:?}", stage), stage.generate(self))
            .with_context(|| format!("error in {:?}", stage))
            .map_err(GenError::from)
    }

    pub fn check_deadline(&self) -> Result<(), GenError> {
        match self.deadline {
            Some(deadline) => deadline.check(),
            None => Ok(()),
        }
    }

    pub fn width(&self) -> u32 {
        self.tiles.width()
    }

    pub fn height(&self) -> u32 {
        self.tiles.height()
    }

    /// Colatitude of a row: 0 at the equator, [MAX_COLATITUDE] at the top
    /// and bottom edges. Single-row maps are all equator.
    pub fn colatitude(&self, _x: u32, y: u32) -> i32 {
        let rows = self.height();
        if rows <= 1 {
            return 0;
        }
        let half = f64::from(rows - 1) / 2.0;
        let offset = (f64::from(y) - half).abs() / half;
        (offset * f64::from(MAX_COLATITUDE)).round() as i32
    }

    /// Complement of colatitude: high at the equator, 0 at the poles. The
    /// climate thresholds are written against this scale.
    pub fn heat_latitude(&self, x: u32, y: u32) -> i32 {
        MAX_COLATITUDE - self.colatitude(x, y)
    }

    /// Whether the polar bands exist at all. A scorched-earth temperature
    /// lever dissolves them (the ice base hits zero).
    pub fn has_poles(&self) -> bool {
        self.climate.ice_base > 0
    }

    /// Count of land tiles (anything that isn't water, the land-fill state
    /// included).
    pub fn land_tile_count(&self) -> usize {
        self.tiles.cells().filter(|t| !t.is_water()).count()
    }

    /// Dry predicate used by placement: mid-latitude dry belt, away from
    /// water and rivers.
    pub fn tile_is_dry(&self, x: u32, y: u32) -> bool {
        let colat = self.colatitude(x, y);
        if colat < MAX_COLATITUDE / 2 || colat > MAX_COLATITUDE * 7 / 10 {
            return false;
        }
        let wet_neighbors = self
            .tiles
            .neighbors4(x, y)
            .filter(|&(nx, ny)| {
                let tile = self.tiles.get(nx, ny);
                tile.is_water() || !tile.river_mask().is_empty()
            })
            .count();
        wet_neighbors < 2
    }

    pub fn test_wetness(&self, x: u32, y: u32, condition: WetnessCondition) -> bool {
        match condition {
            WetnessCondition::All => true,
            WetnessCondition::Dry => self.tile_is_dry(x, y),
            WetnessCondition::NotDry => !self.tile_is_dry(x, y),
        }
    }

    pub fn test_temperature(&self, x: u32, y: u32, set: TemperatureSet) -> bool {
        match self.tiles.get(x, y).temperature_opt() {
            Some(class) => set.matches(class),
            None => false,
        }
    }

    /// Mean height over the 7x7 square centered on the tile.
    pub fn local_average_elevation(&self, x: u32, y: u32) -> i32 {
        let mut sum = 0i64;
        let mut count = 0i64;
        for (nx, ny) in self.heights.square(x, y, 3) {
            sum += i64::from(*self.heights.get(nx, ny));
            count += 1;
        }
        (sum / count.max(1)) as i32
    }

    /// Whether the placement map (when alive) still allows writing this
    /// tile. Out-of-bounds coordinates count as placed.
    pub fn not_placed(&self, x: u32, y: u32) -> bool {
        match &self.placed {
            Some(placed) => placed.not_placed(x, y),
            None => true,
        }
    }

    /// Commit a terrain to a tile and mark it placed (while the placement
    /// map is alive). This is the write path every placement pass uses;
    /// overwriting an already-placed tile is an invariant breach.
    pub fn place_terrain(&mut self, x: u32, y: u32, terrain: Terrain) -> anyhow::Result<()> {
        if !self.not_placed(x, y) {
            return Err(anyhow!(
                "placement overwrite at ({}, {}): tile is already committed",
                x,
                y
            ));
        }
        self.tiles.get_mut(x, y).set_terrain(terrain);
        if let Some(placed) = &mut self.placed {
            placed.set_placed(x, y);
        }
        Ok(())
    }

    /// Finish the build: rescale elevations, derive per-tile properties and
    /// hand the buffer to the caller. Any tile still missing a field is an
    /// invariant breach surfaced as an internal error.
    pub fn finalize(self) -> Result<MapData, GenError> {
        let (w, h) = (self.width(), self.height());
        let shore_emitted = (self.shore_level * 255 / HMAX).clamp(1, 255) as u8;

        let mut tiles = Vec::with_capacity(self.tiles.len());
        for x in 0..w {
            for y in 0..h {
                let builder = self.tiles.get(x, y);
                let terrain = builder
                    .terrain()
                    .with_context(|| format!("tile ({}, {}) left in land-fill state", x, y))?;
                let temperature = builder
                    .temperature()
                    .with_context(|| format!("tile ({}, {}) has no temperature", x, y))?;
                let wetness = builder
                    .wetness()
                    .with_context(|| format!("tile ({}, {}) has no wetness", x, y))?;

                let continent_id = builder.continent_id();
                if terrain.is_land() && continent_id == 0 {
                    return Err(GenError::Internal(anyhow!(
                        "land tile ({}, {}) has continent ID 0",
                        x,
                        y
                    )));
                }

                // Clamp emitted elevation to the emitted shore threshold so
                // terrain/elevation coherence holds exactly on the 255 scale.
                let raw = (*self.heights.get(x, y)).clamp(0, HMAX) * 255 / HMAX;
                let elevation = if terrain.is_water() {
                    raw.min(i32::from(shore_emitted) - 1).max(0) as u8
                } else {
                    raw.max(i32::from(shore_emitted)) as u8
                };

                tiles.push(Tile {
                    x,
                    y,
                    terrain,
                    elevation,
                    temperature,
                    wetness,
                    river_mask: builder.river_mask(),
                    continent_id: if terrain.is_water() && !matches!(terrain, Terrain::Lake) {
                        0
                    } else {
                        continent_id
                    },
                    resource: builder.resource(),
                    properties: self.ruleset.properties(terrain).clone(),
                });
            }
        }

        if self.start_positions.len() != self.config.player_count as usize {
            return Err(GenError::Internal(anyhow!(
                "expected {} starting positions, placed {}",
                self.config.player_count,
                self.start_positions.len()
            )));
        }

        Ok(MapData {
            width: w,
            height: h,
            seed: self.config.seed.to_string(),
            generated_at: MapData::now_timestamp(),
            shore_level: shore_emitted,
            tiles,
            starting_positions: self.start_positions,
        })
    }
}

/// A partially built tile. Fields start unset and are filled in by the
/// stages; the getters return errors when a field is read before the stage
/// that writes it has run, which makes ordering bugs loud.
///
/// An unset terrain on a land tile *is* the "land fill" state: land
/// classification leaves land terrain unset, placement passes commit real
/// terrains, and the final plains sweep resolves whatever is left.
#[derive(Clone, Debug, Default)]
pub(crate) struct TileBuilder {
    terrain: Option<Terrain>,
    temperature: Option<TemperatureType>,
    wetness: Option<u8>,
    river_mask: RiverMask,
    continent_id: u32,
    resource: Option<Resource>,
}

impl TileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terrain(&self) -> anyhow::Result<Terrain> {
        self.terrain.ok_or_else(|| anyhow!("terrain not set"))
    }

    pub fn terrain_opt(&self) -> Option<Terrain> {
        self.terrain
    }

    pub fn set_terrain(&mut self, terrain: Terrain) {
        self.terrain = Some(terrain);
    }

    /// Reset the tile to the land-fill state.
    pub fn clear_terrain(&mut self) {
        self.terrain = None;
    }

    /// Whether this tile currently holds a water terrain. Unset (land-fill)
    /// tiles are not water.
    pub fn is_water(&self) -> bool {
        matches!(self.terrain, Some(t) if t.is_water())
    }

    /// Whether this tile is land still waiting for a committed terrain.
    pub fn is_land_fill(&self) -> bool {
        self.terrain.is_none()
    }

    pub fn temperature(&self) -> anyhow::Result<TemperatureType> {
        self.temperature
            .ok_or_else(|| anyhow!("temperature not set"))
    }

    pub fn temperature_opt(&self) -> Option<TemperatureType> {
        self.temperature
    }

    pub fn set_temperature(&mut self, class: TemperatureType) {
        self.temperature = Some(class);
    }

    pub fn wetness(&self) -> anyhow::Result<u8> {
        self.wetness.ok_or_else(|| anyhow!("wetness not set"))
    }

    pub fn set_wetness(&mut self, wetness: u8) {
        self.wetness = Some(wetness.min(100));
    }

    pub fn river_mask(&self) -> RiverMask {
        self.river_mask
    }

    pub fn add_river(&mut self, direction: Direction) {
        self.river_mask |= RiverMask::from_direction(direction);
    }

    pub fn has_river(&self) -> bool {
        !self.river_mask.is_empty()
    }

    pub fn continent_id(&self) -> u32 {
        self.continent_id
    }

    pub fn set_continent_id(&mut self, id: u32) {
        self.continent_id = id;
    }

    pub fn resource(&self) -> Option<Resource> {
        self.resource
    }

    /// Assign a resource. At most one per tile; a second assignment is an
    /// invariant breach.
    pub fn set_resource(&mut self, resource: Resource) -> anyhow::Result<()> {
        if self.resource.is_some() {
            return Err(anyhow!("tile already has a resource"));
        }
        self.resource = Some(resource);
        Ok(())
    }
}

/// Discrete climate band thresholds on the heat-latitude scale, derived from
/// the global temperature lever.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ClimateLevels {
    /// Below this a tile is cold; a tenth of it bounds the frozen band.
    pub cold_level: i32,
    /// At or above this a tile is tropical.
    pub tropical_level: i32,
    /// The restrictive polar band threshold.
    pub ice_base: i32,
}

impl ClimateLevels {
    pub fn new(temperature: u32) -> Self {
        let t = i32::try_from(temperature).unwrap_or(100);
        let mc = MAX_COLATITUDE;
        let cold_level = (mc * (420 - 6 * t) / 700).max(0);
        let tropical_level = (mc * (1001 - 10 * t) / 700).min(9 * mc / 10);
        Self {
            cold_level,
            tropical_level,
            ice_base: cold_level / 10,
        }
    }

    /// Classify a heat value into its temperature class.
    pub fn classify(&self, heat: i32) -> TemperatureType {
        if heat <= self.ice_base {
            TemperatureType::Frozen
        } else if heat <= self.cold_level {
            TemperatureType::Cold
        } else if heat < self.tropical_level {
            TemperatureType::Temperate
        } else {
            TemperatureType::Tropical
        }
    }
}

/// Terrain budget percentages derived from the world-shape parameters. All
/// values are percentages of the land area, except `river_pct` which bounds
/// the river tile share.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TerrainBudgets {
    pub polar: f64,
    pub mountain_pct: f64,
    pub forest_pct: f64,
    pub jungle_pct: f64,
    pub river_pct: f64,
    pub swamp_pct: f64,
    pub desert_pct: f64,
}

impl TerrainBudgets {
    /// The budget formulas. Given the landpercent/steepness/wetness/
    /// temperature levers, carve the land area into relief, foliage, swamp
    /// and desert shares plus a river budget.
    pub fn compute(landpercent: u32, steepness: u32, wetness: u32, temperature: u32) -> Self {
        let climate = ClimateLevels::new(temperature);
        let mc = f64::from(MAX_COLATITUDE);
        let (l, s) = (f64::from(landpercent), f64::from(steepness));
        let (w, t) = (f64::from(wetness), f64::from(temperature));

        let polar = 2.0 * f64::from(climate.ice_base) * l / mc;
        let mount_factor = (100.0 - polar - 24.0) / 10000.0;
        let factor = (100.0 - polar - 0.8 * s) / 10000.0;

        let mountain_pct = mount_factor * s * 90.0;
        let forest_raw = factor * (w * 40.0 + 700.0);
        let jungle_pct = forest_raw * (mc - f64::from(climate.tropical_level)) / (2.0 * mc);
        let forest_pct = forest_raw - jungle_pct;
        let river_pct = (100.0 - polar) * (3.0 + w / 12.0) / 100.0;
        let swamp_pct = factor * (w * 12.0 - 150.0 + t * 10.0).max(0.0);
        let desert_pct = factor * (t * 15.0 - 250.0 + (100.0 - w) * 10.0).max(0.0);

        Self {
            polar,
            mountain_pct,
            forest_pct,
            jungle_pct,
            river_pct,
            swamp_pct,
            desert_pct,
        }
    }

    pub fn for_config(config: &GenConfig) -> Self {
        Self::compute(
            config.landpercent,
            config.steepness,
            config.wetness,
            config.temperature,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;

    fn builder_for(width: u32, height: u32) -> (GenConfig, TerrainRuleset) {
        let config = GenConfig {
            width,
            height,
            seed: 42u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        (config, ruleset)
    }

    #[test]
    fn test_colatitude_bounds() {
        let (config, ruleset) = builder_for(10, 21);
        let world = WorldBuilder::new(&config, &ruleset, None);
        assert_eq!(world.colatitude(0, 10), 0);
        assert_eq!(world.colatitude(0, 0), MAX_COLATITUDE);
        assert_eq!(world.colatitude(0, 20), MAX_COLATITUDE);
        assert!(world.colatitude(0, 5) > 0 && world.colatitude(0, 5) < MAX_COLATITUDE);
    }

    #[test]
    fn test_colatitude_degenerate_row() {
        let (config, ruleset) = builder_for(5, 1);
        let world = WorldBuilder::new(&config, &ruleset, None);
        assert_eq!(world.colatitude(3, 0), 0);
    }

    #[test]
    fn test_climate_levels_default() {
        let levels = ClimateLevels::new(50);
        assert_eq!(levels.cold_level, 171);
        assert_eq!(levels.tropical_level, 715);
        assert_eq!(levels.ice_base, 17);
        assert_eq!(levels.classify(5), TemperatureType::Frozen);
        assert_eq!(levels.classify(100), TemperatureType::Cold);
        assert_eq!(levels.classify(400), TemperatureType::Temperate);
        assert_eq!(levels.classify(900), TemperatureType::Tropical);
    }

    #[test]
    fn test_climate_levels_hot_world_has_no_poles() {
        let levels = ClimateLevels::new(100);
        assert_eq!(levels.cold_level, 0);
        assert_eq!(levels.ice_base, 0);
        assert_ne!(levels.classify(0), TemperatureType::Frozen);
    }

    #[test]
    fn test_budget_values_at_defaults() {
        let budgets = TerrainBudgets::compute(30, 30, 50, 50);
        assert!(budgets.mountain_pct > 15.0 && budgets.mountain_pct < 25.0);
        assert!(budgets.forest_pct > 10.0 && budgets.forest_pct < 25.0);
        assert!(budgets.river_pct > 5.0 && budgets.river_pct < 10.0);
        assert!(budgets.swamp_pct > 0.0);
        assert!(budgets.desert_pct > 0.0);
    }

    #[test]
    fn test_desert_monotone_in_temperature_when_dryish() {
        // Desert share never shrinks as the world heats up (wetness < 50)
        let mut last = -1.0;
        for t in (0..=100).step_by(10) {
            let budgets = TerrainBudgets::compute(30, 30, 30, t);
            assert!(budgets.desert_pct >= last);
            last = budgets.desert_pct;
        }
    }

    #[test]
    fn test_forest_monotone_in_wetness() {
        let mut last = -1.0;
        for w in (0..=100).step_by(10) {
            let budgets = TerrainBudgets::compute(30, 30, w, 50);
            assert!(budgets.forest_pct + budgets.jungle_pct >= last);
            last = budgets.forest_pct + budgets.jungle_pct;
        }
    }

    #[test]
    fn test_tile_builder_reads_error_until_set() {
        let mut tile = TileBuilder::new();
        assert!(tile.terrain().is_err());
        assert!(tile.temperature().is_err());
        tile.set_terrain(Terrain::Plains);
        assert_eq!(tile.terrain().unwrap(), Terrain::Plains);
        assert!(tile.is_land_fill() == false);
    }

    #[test]
    fn test_tile_builder_single_resource() {
        let mut tile = TileBuilder::new();
        tile.set_resource(Resource::Coal).unwrap();
        assert!(tile.set_resource(Resource::Gold).is_err());
    }
}
