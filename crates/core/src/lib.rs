//! Pangaea generates rectangular world maps for a turn-based civilization
//! style strategy game. From a seed, a set of world-shape parameters and a
//! player count it produces a grid of tiles — terrain, elevation,
//! temperature class, wetness, river connections, continent IDs, resources —
//! plus one starting position per player.
//!
//! ```
//! use pangaea::{GenConfig, World};
//!
//! let config = GenConfig {
//!     seed: "example".into(),
//!     ..GenConfig::default()
//! };
//! let world = World::generate(config).unwrap();
//! println!("{} tiles", world.map().tiles.len());
//! ```
//!
//! Generation is fully deterministic: the same config (seed included) always
//! emits the identical map. See [GenConfig] for the available levers and
//! [Generator](crate::Generator) for the strategies; the fair-islands
//! strategy additionally validates player fairness and reports typed
//! fallbacks ([GenError]) that the [World] driver resolves automatically.

mod config;
mod error;
mod ruleset;
mod util;
mod world;

pub use crate::{
    config::{GenConfig, Generator, Seed, StartPosMode},
    error::GenError,
    ruleset::{IslandPick, IslandTerrainLists, TerrainInfo, TerrainProperty, TerrainRuleset},
    world::{
        validate::{
            IssueSeverity, MapValidator, ValidationIssue, ValidationMetrics, ValidationReport,
        },
        FairIslandsStrategy, HeightBasedStrategy, IslandStrategy, MapData, Resource, RiverMask,
        StartPosition, TemperatureSet, TemperatureType, Terrain, TerrainBudgets, Tile,
        WetnessCondition, World,
    },
};
pub use anyhow;
