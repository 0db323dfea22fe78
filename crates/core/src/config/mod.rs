mod seed;

pub use seed::Seed;

use crate::error::GenError;
use serde::{Deserialize, Serialize};
use strum::EnumString;
use validator::Validate;

/// Configuration that defines one map generation run. Two maps generated with
/// the same config (including the seed) are always identical.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GenConfig {
    /// Map width in tiles.
    #[validate(range(min = 1, max = 2048))]
    pub width: u32,

    /// Map height in tiles.
    #[validate(range(min = 1, max = 2048))]
    pub height: u32,

    /// RNG seed for all randomized processes. See [Seed] for the supported
    /// forms.
    pub seed: Seed,

    /// Which top-level generation strategy to run.
    pub generator: Generator,

    /// How players are distributed over landmasses. Only meaningful for the
    /// island-based generators.
    pub startpos: StartPosMode,

    /// Global temperature lever, 0 (frigid) to 100 (scorched). Shifts the
    /// latitude bands that the climate stages carve the map into.
    #[validate(range(min = 0, max = 100))]
    pub temperature: u32,

    /// Percentage of the map that should end up as land.
    #[validate(range(min = 0, max = 100))]
    pub landpercent: u32,

    /// Terrain steepness, 0..100. Higher values mean more of the land budget
    /// goes to hills and mountains.
    #[validate(range(min = 0, max = 100))]
    pub steepness: u32,

    /// Global wetness lever, 0..100. Drives the forest/jungle/swamp budgets
    /// and the per-tile wetness field.
    #[validate(range(min = 0, max = 100))]
    pub wetness: u32,

    /// Number of players to place starting positions for.
    #[validate(range(min = 1, max = 64))]
    pub player_count: u32,

    /// Release the continuous temperature field as soon as the discrete
    /// classes have been written into the tiles. Keeping it around is only
    /// useful for diagnostics.
    pub cleanup_temperature_map: bool,

    /// Identifier of the terrain ruleset to generate against.
    pub ruleset_id: String,
}

impl GenConfig {
    /// Validate the config, mapping any violation to
    /// [GenError::InvalidConfig].
    pub fn check(&self) -> Result<(), GenError> {
        self.validate()
            .map_err(|errs| GenError::InvalidConfig(errs.to_string()))
    }
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 50,
            seed: Seed::default(),
            generator: Generator::Fractal,
            startpos: StartPosMode::Default,
            temperature: 50,
            landpercent: 30,
            steepness: 30,
            wetness: 50,
            player_count: 2,
            cleanup_temperature_map: true,
            ruleset_id: "classic".into(),
        }
    }
}

/// The top-level generation strategies. The first three drive the pipeline
/// off a height field; the island variants place landmasses directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Generator {
    /// Pseudo-fractal height field (recursive midpoint subdivision).
    Fractal,
    /// Per-tile uniform heights, smoothed.
    Random,
    /// Fracture-center disks painted onto the height field.
    Fracture,
    /// Player-island partitioning.
    Island,
    /// Island partitioning with admissibility pre-check, bounded retries and
    /// a post-generation fairness validator.
    Fair,
}

impl Generator {
    /// Whether this strategy derives land from a height field.
    pub fn is_height_based(self) -> bool {
        matches!(self, Self::Fractal | Self::Random | Self::Fracture)
    }
}

/// How players map to islands.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StartPosMode {
    /// Generator picks a sensible default.
    Default,
    /// One player per island.
    Single,
    /// Two or three players per island.
    TwoOnThree,
    /// All players can share islands.
    All,
    /// Mass-weighted mix of island sizes.
    Variable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        GenConfig::default().check().unwrap();
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let config = GenConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(config.check(), Err(GenError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_players() {
        let config = GenConfig {
            player_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.check(), Err(GenError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_out_of_range_percent() {
        let config = GenConfig {
            landpercent: 101,
            ..Default::default()
        };
        assert!(matches!(config.check(), Err(GenError::InvalidConfig(_))));
    }

    #[test]
    fn test_generator_parses_from_str() {
        use std::str::FromStr;
        assert_eq!(Generator::from_str("fracture").unwrap(), Generator::Fracture);
        assert_eq!(StartPosMode::from_str("two_on_three").unwrap(), StartPosMode::TwoOnThree);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = GenConfig {
            seed: "fixture-a".into(),
            generator: Generator::Island,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: GenConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
