//! The terrain ruleset: an immutable table mapping each terrain to its
//! climate properties, yields and generation flags, loaded once per run and
//! shared by reference through the whole pipeline.

use crate::{
    error::GenError,
    util::weighted_choice,
    world::{Terrain, TemperatureSet, WetnessCondition},
};
use anyhow::Context;
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// The classic ruleset data, embedded so the library works without any
/// filesystem access.
const CLASSIC_JSON: &str = include_str!("classic.json");

/// Climate and relief properties a terrain can carry, each valued 0..=100.
/// A terrain's value for a property is its weight when that property is the
/// pick target.
#[derive(
    Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerrainProperty {
    Cold,
    Dry,
    Foliage,
    Frozen,
    Green,
    Mountainous,
    OceanDepth,
    Temperate,
    Tropical,
    Wet,
}

/// One terrain's row in the ruleset table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerrainInfo {
    /// Insertion-ordered so iteration (and anything seeded from it) is
    /// deterministic.
    pub properties: IndexMap<TerrainProperty, u8>,
    pub move_cost: u32,
    pub defense: u32,
    pub food: u32,
    pub shields: u32,
    pub trade: u32,
    pub transform_to: Option<Terrain>,
    pub can_have_river: bool,
    /// Water terrains and other placement-only terrains are never returned
    /// by the weighted picker.
    pub not_generated: bool,
}

impl Default for TerrainInfo {
    fn default() -> Self {
        Self {
            properties: IndexMap::new(),
            move_cost: 1,
            defense: 100,
            food: 0,
            shields: 0,
            trade: 0,
            transform_to: None,
            can_have_river: false,
            not_generated: false,
        }
    }
}

/// Immutable terrain table. Pure and deterministic: the same inputs and RNG
/// stream always produce the same picks.
#[derive(Clone, Debug)]
pub struct TerrainRuleset {
    id: String,
    infos: IndexMap<Terrain, TerrainInfo>,
    /// Generatable terrains in a fixed order, so candidate pools (and
    /// therefore RNG consumption) are stable.
    generatable: Vec<Terrain>,
    island_terrain: IslandTerrainLists,
}

impl TerrainRuleset {
    /// Load a ruleset by identifier. Only embedded rulesets are known;
    /// anything else is a config error.
    pub fn load(id: &str) -> Result<Self, GenError> {
        match id {
            "classic" => Self::from_json(id, CLASSIC_JSON)
                .map_err(|err| GenError::Internal(err.context("embedded classic ruleset"))),
            _ => Err(GenError::InvalidConfig(format!("unknown ruleset {:?}", id))),
        }
    }

    /// Parse a ruleset from its JSON form. Every terrain must have an entry.
    pub fn from_json(id: &str, json: &str) -> anyhow::Result<Self> {
        let infos: IndexMap<Terrain, TerrainInfo> =
            serde_json::from_str(json).context("error parsing ruleset")?;
        for terrain in Terrain::iter() {
            if !infos.contains_key(&terrain) {
                anyhow::bail!("ruleset {:?} is missing terrain {:?}", id, terrain);
            }
        }
        let generatable = Terrain::iter()
            .filter(|t| !infos[t].not_generated)
            .collect();
        Ok(Self {
            id: id.into(),
            infos,
            generatable,
            island_terrain: IslandTerrainLists::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info(&self, terrain: Terrain) -> &TerrainInfo {
        &self.infos[&terrain]
    }

    pub fn properties(&self, terrain: Terrain) -> &IndexMap<TerrainProperty, u8> {
        &self.info(terrain).properties
    }

    /// A terrain's value for one property; absent properties are 0.
    pub fn property(&self, terrain: Terrain, property: TerrainProperty) -> u8 {
        self.properties(terrain).get(&property).copied().unwrap_or(0)
    }

    pub fn can_have_river(&self, terrain: Terrain) -> bool {
        self.info(terrain).can_have_river
    }

    pub fn transform_to(&self, terrain: Terrain) -> Option<Terrain> {
        self.info(terrain).transform_to
    }

    /// The immutable island terrain-selection lists (see
    /// [IslandTerrainLists]).
    pub fn island_terrain(&self) -> &IslandTerrainLists {
        &self.island_terrain
    }

    /// Weighted draw of a generatable terrain.
    ///
    /// Candidates are the generatable terrains with a positive `prefer`
    /// property (when given) and a zero `avoid` property (when given); each
    /// is weighted by its `target` property (1 when no target). When no
    /// candidate remains the constraints are dropped one at a time — prefer
    /// first, then avoid, then target — so the ladder terminates in at most
    /// three hops before falling back to grassland.
    pub fn pick_terrain(
        &self,
        target: Option<TerrainProperty>,
        prefer: Option<TerrainProperty>,
        avoid: Option<TerrainProperty>,
        rng: &mut impl Rng,
    ) -> Terrain {
        let (mut target, mut prefer, mut avoid) = (target, prefer, avoid);
        loop {
            let pool: Vec<(Terrain, u32)> = self
                .generatable
                .iter()
                .copied()
                .filter(|&t| prefer.map_or(true, |p| self.property(t, p) > 0))
                .filter(|&t| avoid.map_or(true, |a| self.property(t, a) == 0))
                .map(|t| {
                    let weight = target.map_or(1, |p| u32::from(self.property(t, p)));
                    (t, weight)
                })
                .collect();

            if let Some(terrain) = weighted_choice(rng, &pool) {
                return terrain;
            }
            if prefer.take().is_some() {
                continue;
            }
            if avoid.take().is_some() {
                continue;
            }
            if target.take().is_some() {
                continue;
            }
            return Terrain::Grassland;
        }
    }

    /// Pick the open-water terrain whose OCEAN_DEPTH property is closest to
    /// the given depth. Lakes are never picked — they only appear through
    /// lake regeneration.
    pub fn pick_ocean(&self, depth: i32) -> Terrain {
        let mut best = Terrain::Ocean;
        let mut best_delta = i32::MAX;
        for terrain in [Terrain::Coast, Terrain::Ocean, Terrain::DeepOcean] {
            let delta =
                (i32::from(self.property(terrain, TerrainProperty::OceanDepth)) - depth).abs();
            if delta < best_delta {
                best = terrain;
                best_delta = delta;
            }
        }
        best
    }
}

/// One weighted entry in an island terrain-selection list: the pick-terrain
/// arguments plus the climate conditions a candidate tile must satisfy.
#[derive(Copy, Clone, Debug)]
pub struct IslandPick {
    pub target: Option<TerrainProperty>,
    pub prefer: Option<TerrainProperty>,
    pub avoid: Option<TerrainProperty>,
    pub temperature: TemperatureSet,
    pub wetness: WetnessCondition,
    pub weight: u32,
}

impl IslandPick {
    const fn new(
        target: Option<TerrainProperty>,
        prefer: Option<TerrainProperty>,
        avoid: Option<TerrainProperty>,
        temperature: TemperatureSet,
        wetness: WetnessCondition,
        weight: u32,
    ) -> Self {
        Self {
            target,
            prefer,
            avoid,
            temperature,
            wetness,
            weight,
        }
    }
}

/// The per-class selection lists used when filling island terrain. Built once
/// at ruleset load and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct IslandTerrainLists {
    pub forest: Vec<IslandPick>,
    pub desert: Vec<IslandPick>,
    pub mountain: Vec<IslandPick>,
    pub swamp: Vec<IslandPick>,
}

impl IslandTerrainLists {
    fn new() -> Self {
        use TerrainProperty::*;
        Self {
            forest: vec![
                IslandPick::new(
                    Some(Foliage),
                    Some(Tropical),
                    Some(Dry),
                    TemperatureSet::TROPICAL,
                    WetnessCondition::All,
                    1,
                ),
                IslandPick::new(
                    Some(Foliage),
                    Some(Temperate),
                    None,
                    TemperatureSet::all(),
                    WetnessCondition::All,
                    3,
                ),
                IslandPick::new(
                    Some(Foliage),
                    Some(Wet),
                    Some(Frozen),
                    TemperatureSet::TROPICAL,
                    WetnessCondition::NotDry,
                    1,
                ),
                IslandPick::new(
                    Some(Foliage),
                    Some(Cold),
                    None,
                    TemperatureSet::NFROZEN,
                    WetnessCondition::All,
                    1,
                ),
            ],
            desert: vec![
                IslandPick::new(
                    Some(Dry),
                    Some(Tropical),
                    Some(Green),
                    TemperatureSet::HOT,
                    WetnessCondition::Dry,
                    3,
                ),
                IslandPick::new(
                    Some(Dry),
                    Some(Temperate),
                    Some(Green),
                    TemperatureSet::NFROZEN,
                    WetnessCondition::Dry,
                    2,
                ),
                IslandPick::new(
                    Some(Cold),
                    Some(Dry),
                    Some(Tropical),
                    TemperatureSet::NHOT,
                    WetnessCondition::Dry,
                    1,
                ),
                IslandPick::new(
                    Some(Frozen),
                    Some(Dry),
                    None,
                    TemperatureSet::FROZEN,
                    WetnessCondition::Dry,
                    1,
                ),
            ],
            mountain: vec![
                IslandPick::new(
                    Some(Mountainous),
                    Some(Green),
                    None,
                    TemperatureSet::all(),
                    WetnessCondition::All,
                    2,
                ),
                IslandPick::new(
                    Some(Mountainous),
                    None,
                    Some(Green),
                    TemperatureSet::all(),
                    WetnessCondition::All,
                    1,
                ),
            ],
            swamp: vec![
                IslandPick::new(
                    Some(Wet),
                    Some(Tropical),
                    Some(Foliage),
                    TemperatureSet::TROPICAL,
                    WetnessCondition::NotDry,
                    1,
                ),
                IslandPick::new(
                    Some(Wet),
                    Some(Temperate),
                    Some(Foliage),
                    TemperatureSet::HOT,
                    WetnessCondition::NotDry,
                    2,
                ),
                IslandPick::new(
                    Some(Wet),
                    Some(Cold),
                    Some(Foliage),
                    TemperatureSet::NHOT,
                    WetnessCondition::NotDry,
                    1,
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn classic() -> TerrainRuleset {
        TerrainRuleset::load("classic").unwrap()
    }

    #[test]
    fn test_load_classic() {
        let ruleset = classic();
        assert_eq!(ruleset.id(), "classic");
        assert_eq!(ruleset.property(Terrain::Desert, TerrainProperty::Dry), 100);
        assert!(ruleset.can_have_river(Terrain::Grassland));
        assert!(!ruleset.can_have_river(Terrain::Mountains));
        assert_eq!(ruleset.transform_to(Terrain::Jungle), Some(Terrain::Forest));
    }

    #[test]
    fn test_unknown_ruleset_is_config_error() {
        assert!(matches!(
            TerrainRuleset::load("does-not-exist"),
            Err(GenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_terrain_rejected() {
        assert!(TerrainRuleset::from_json("partial", r#"{"ocean": {}}"#).is_err());
    }

    #[test]
    fn test_pick_terrain_honors_filters() {
        let ruleset = classic();
        let mut rng = Pcg64::seed_from_u64(1);
        // Foliage preferring temperate while avoiding tropical: always forest
        for _ in 0..20 {
            let got = ruleset.pick_terrain(
                Some(TerrainProperty::Foliage),
                Some(TerrainProperty::Temperate),
                Some(TerrainProperty::Tropical),
                &mut rng,
            );
            assert_eq!(got, Terrain::Forest);
        }
        // Wet avoiding foliage: only swamp qualifies
        for _ in 0..20 {
            let got = ruleset.pick_terrain(
                Some(TerrainProperty::Wet),
                None,
                Some(TerrainProperty::Foliage),
                &mut rng,
            );
            assert_eq!(got, Terrain::Swamp);
        }
    }

    #[test]
    fn test_pick_terrain_never_returns_water() {
        let ruleset = classic();
        let mut rng = Pcg64::seed_from_u64(7);
        for _ in 0..200 {
            let got = ruleset.pick_terrain(Some(TerrainProperty::OceanDepth), None, None, &mut rng);
            assert!(got.is_land(), "picked water terrain {:?}", got);
        }
    }

    #[test]
    fn test_pick_terrain_fallback_ladder() {
        let ruleset = classic();
        let mut rng = Pcg64::seed_from_u64(3);
        // Impossible combination: prefer and avoid the same property. The
        // ladder drops prefer, then avoid, and the remaining target weight
        // selects the only frozen-capable terrain.
        let got = ruleset.pick_terrain(
            Some(TerrainProperty::Frozen),
            Some(TerrainProperty::Frozen),
            Some(TerrainProperty::Frozen),
            &mut rng,
        );
        assert_eq!(got, Terrain::Tundra);
    }

    #[test]
    fn test_pick_ocean_by_depth() {
        let ruleset = classic();
        assert_eq!(ruleset.pick_ocean(0), Terrain::Coast);
        assert_eq!(ruleset.pick_ocean(40), Terrain::Ocean);
        assert_eq!(ruleset.pick_ocean(100), Terrain::DeepOcean);
    }

    #[test]
    fn test_pick_terrain_deterministic() {
        let ruleset = classic();
        let picks: Vec<Terrain> = (0..50)
            .map(|i| {
                let mut rng = Pcg64::seed_from_u64(i);
                ruleset.pick_terrain(Some(TerrainProperty::Temperate), Some(TerrainProperty::Green), None, &mut rng)
            })
            .collect();
        let again: Vec<Terrain> = (0..50)
            .map(|i| {
                let mut rng = Pcg64::seed_from_u64(i);
                ruleset.pick_terrain(Some(TerrainProperty::Temperate), Some(TerrainProperty::Green), None, &mut rng)
            })
            .collect();
        assert_eq!(picks, again);
    }
}
