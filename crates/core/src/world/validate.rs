//! Map validation: scores a produced map across terrain balance, continent
//! structure, rivers, parameter compliance, and start positions. The
//! strategies run this for metrics; callers can rerun it on any emitted map.

use crate::{
    config::GenConfig,
    ruleset::TerrainRuleset,
    world::{
        generate::TerrainBudgets,
        grid::{chebyshev_distance, euclidean_distance, DIRS8},
        MapData, RiverMask, Terrain,
    },
};
use indexmap::IndexMap;
use serde::Serialize;
use strum::IntoEnumIterator;

/// Percent values that smell like a hardcoded override instead of a derived
/// budget.
const SUSPICIOUS_PERCENTS: [f64; 4] = [15.0, 20.0, 25.0, 30.0];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    /// Which validation dimension raised this.
    pub category: &'static str,
    pub message: String,
}

/// Raw measurements backing the score, for callers that want the numbers.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationMetrics {
    pub land_pct: f64,
    /// One entry per terrain, in declaration order.
    pub terrain_shares: IndexMap<Terrain, f64>,
    pub continent_count: usize,
    pub largest_continent_pct: f64,
    pub river_pct_actual: f64,
    pub river_pct_expected: f64,
    pub start_min_distance: f64,
    pub generation_time_ms: u64,
    pub baseline_time_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub passed: bool,
    /// 0..=100; weighted over terrain (40%), continents (30%) and the
    /// overall issue count (30%).
    pub score: u32,
    pub issues: Vec<ValidationIssue>,
    pub metrics: ValidationMetrics,
}

pub struct MapValidator<'a> {
    config: &'a GenConfig,
    ruleset: &'a TerrainRuleset,
    generation_time_ms: u64,
}

impl<'a> MapValidator<'a> {
    pub fn new(config: &'a GenConfig, ruleset: &'a TerrainRuleset) -> Self {
        Self {
            config,
            ruleset,
            generation_time_ms: 0,
        }
    }

    pub fn with_generation_time(mut self, ms: u64) -> Self {
        self.generation_time_ms = ms;
        self
    }

    pub fn validate(&self, map: &MapData) -> ValidationReport {
        let mut issues = Vec::new();
        let mut metrics = ValidationMetrics {
            generation_time_ms: self.generation_time_ms,
            baseline_time_ms: (map.tiles.len() as u64 / 1000) * 100,
            ..Default::default()
        };

        let terrain_score = self.validate_terrain(map, &mut issues, &mut metrics);
        let continent_score = self.validate_continents(map, &mut issues, &mut metrics);
        self.validate_rivers(map, &mut issues, &mut metrics);
        self.validate_parameters(map, &mut issues, &metrics);
        self.validate_starts(map, &mut issues, &mut metrics);
        self.validate_performance(&mut issues, &metrics);

        let errors = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count() as u32;
        let warnings = issues.len() as u32 - errors;
        let issue_penalty = (10 * errors + 3 * warnings).min(100);

        let score = (0.4 * f64::from(terrain_score)
            + 0.3 * f64::from(continent_score)
            + 0.3 * f64::from(100 - issue_penalty))
        .round() as u32;

        ValidationReport {
            passed: score >= 70,
            score,
            issues,
            metrics,
        }
    }

    fn validate_terrain(
        &self,
        map: &MapData,
        issues: &mut Vec<ValidationIssue>,
        metrics: &mut ValidationMetrics,
    ) -> u32 {
        let mut score = 100i32;
        let total = map.tiles.len().max(1) as f64;
        let mut counts: IndexMap<Terrain, usize> = IndexMap::new();
        for tile in &map.tiles {
            *counts.entry(tile.terrain).or_default() += 1;
        }
        for terrain in Terrain::iter() {
            let share = *counts.get(&terrain).unwrap_or(&0) as f64 * 100.0 / total;
            metrics.terrain_shares.insert(terrain, share);
        }

        let land = map.land_tiles().count() as f64;
        metrics.land_pct = land * 100.0 / total;
        if !(15.0..=60.0).contains(&metrics.land_pct) {
            score -= 30;
            issues.push(issue(
                IssueSeverity::Error,
                "terrain",
                format!("land share {:.1}% is outside 15-60%", metrics.land_pct),
            ));
        } else if !(20.0..=40.0).contains(&metrics.land_pct) {
            score -= 10;
            issues.push(issue(
                IssueSeverity::Warning,
                "terrain",
                format!("land share {:.1}% is outside the usual 20-40%", metrics.land_pct),
            ));
        }

        for (terrain, share) in &metrics.terrain_shares {
            if terrain.is_open_water() {
                continue;
            }
            if *share > 50.0 {
                score -= 25;
                issues.push(issue(
                    IssueSeverity::Error,
                    "terrain",
                    format!("{:?} covers {:.1}% of the map", terrain, share),
                ));
            } else if *share > 30.0 {
                score -= 10;
                issues.push(issue(
                    IssueSeverity::Warning,
                    "terrain",
                    format!("{:?} covers {:.1}% of the map", terrain, share),
                ));
            }
        }

        if land > 0.0 {
            for essential in [Terrain::Grassland, Terrain::Plains, Terrain::Forest] {
                let of_land =
                    *counts.get(&essential).unwrap_or(&0) as f64 * 100.0 / land;
                if of_land < 1.0 {
                    score -= 5;
                    issues.push(issue(
                        IssueSeverity::Warning,
                        "terrain",
                        format!("{:?} is under 1% of land", essential),
                    ));
                }
            }
        }
        score.clamp(0, 100) as u32
    }

    fn validate_continents(
        &self,
        map: &MapData,
        issues: &mut Vec<ValidationIssue>,
        metrics: &mut ValidationMetrics,
    ) -> u32 {
        let mut score = 100i32;
        let mut sizes: IndexMap<u32, usize> = IndexMap::new();
        for tile in map.land_tiles() {
            *sizes.entry(tile.continent_id).or_default() += 1;
        }
        metrics.continent_count = sizes.len();
        let land: usize = sizes.values().sum();

        let expected = (map.tiles.len() / 5000).max(1);
        if sizes.is_empty() {
            if land == 0 && self.config.landpercent > 0 {
                score -= 40;
                issues.push(issue(
                    IssueSeverity::Error,
                    "continent",
                    "map has no land at all".into(),
                ));
            }
            return score.clamp(0, 100) as u32;
        }
        if sizes.len() < expected {
            score -= 5;
            issues.push(issue(
                IssueSeverity::Warning,
                "continent",
                format!("{} continents, expected around {}", sizes.len(), expected),
            ));
        }

        let largest = sizes.values().copied().max().unwrap_or(0);
        metrics.largest_continent_pct = largest as f64 * 100.0 / land.max(1) as f64;
        if metrics.largest_continent_pct > 80.0 {
            score -= 10;
            issues.push(issue(
                IssueSeverity::Warning,
                "continent",
                format!(
                    "largest continent holds {:.0}% of all land",
                    metrics.largest_continent_pct
                ),
            ));
        }

        let tiny = sizes.values().filter(|&&s| s < 10).count();
        if tiny * 2 > sizes.len() {
            score -= 10;
            issues.push(issue(
                IssueSeverity::Warning,
                "continent",
                format!("{} of {} continents are under 10 tiles", tiny, sizes.len()),
            ));
        }

        let singles = sizes.values().filter(|&&s| s == 1).count();
        if singles as f64 * 100.0 > land as f64 * 5.0 {
            score -= 10;
            issues.push(issue(
                IssueSeverity::Warning,
                "continent",
                format!("{} isolated single-tile islands", singles),
            ));
        }
        score.clamp(0, 100) as u32
    }

    fn validate_rivers(
        &self,
        map: &MapData,
        issues: &mut Vec<ValidationIssue>,
        metrics: &mut ValidationMetrics,
    ) {
        let land = map.land_tiles().count();
        if land == 0 {
            return;
        }
        let river_tiles = map
            .tiles
            .iter()
            .filter(|t| t.terrain.is_land() && !t.river_mask.is_empty())
            .count();
        metrics.river_pct_actual = river_tiles as f64 * 100.0 / land as f64;
        metrics.river_pct_expected = TerrainBudgets::for_config(self.config).river_pct;

        if river_tiles == 0 {
            issues.push(issue(
                IssueSeverity::Error,
                "river",
                "map has no rivers".into(),
            ));
            return;
        }
        let deviation = (metrics.river_pct_actual - metrics.river_pct_expected).abs();
        if deviation >= 3.0 {
            issues.push(issue(
                IssueSeverity::Error,
                "river",
                format!(
                    "river share {:.1}% deviates {:.1} points from the requested {:.1}%",
                    metrics.river_pct_actual, deviation, metrics.river_pct_expected
                ),
            ));
        } else if deviation >= 2.0 {
            issues.push(issue(
                IssueSeverity::Warning,
                "river",
                format!(
                    "river share {:.1}% is {:.1} points off the requested {:.1}%",
                    metrics.river_pct_actual, deviation, metrics.river_pct_expected
                ),
            ));
        }

        // Mask integrity: every set bit must point at water or
        // river-capable terrain; lone segments are merely suspicious
        let mut broken = 0usize;
        let mut isolated = 0usize;
        for tile in &map.tiles {
            if tile.river_mask.is_empty() {
                continue;
            }
            let mut connected = false;
            for (direction, (dx, dy)) in [
                (RiverMask::NORTH, (0i32, -1i32)),
                (RiverMask::EAST, (1, 0)),
                (RiverMask::SOUTH, (0, 1)),
                (RiverMask::WEST, (-1, 0)),
            ] {
                if !tile.river_mask.contains(direction) {
                    continue;
                }
                let (nx, ny) = (tile.x as i32 + dx, tile.y as i32 + dy);
                if nx < 0 || ny < 0 || nx >= map.width as i32 || ny >= map.height as i32 {
                    broken += 1;
                    continue;
                }
                let neighbor = map.tile(nx as u32, ny as u32);
                if neighbor.terrain.is_water() || !neighbor.river_mask.is_empty() {
                    connected = true;
                } else if !self.ruleset.can_have_river(neighbor.terrain) {
                    broken += 1;
                }
            }
            if !connected {
                isolated += 1;
            }
        }
        if broken > 0 {
            issues.push(issue(
                IssueSeverity::Error,
                "river",
                format!("{} river connections point nowhere", broken),
            ));
        }
        if isolated > 0 {
            issues.push(issue(
                IssueSeverity::Warning,
                "river",
                format!("{} isolated river segments", isolated),
            ));
        }
    }

    fn validate_parameters(
        &self,
        map: &MapData,
        issues: &mut Vec<ValidationIssue>,
        metrics: &ValidationMetrics,
    ) {
        let land = map.land_tiles().count();
        if land == 0 {
            return;
        }
        let budgets = TerrainBudgets::for_config(self.config);
        let of_land = |terrains: &[Terrain]| {
            map.land_tiles()
                .filter(|t| terrains.contains(&t.terrain))
                .count() as f64
                * 100.0
                / land as f64
        };

        let checks = [
            ("river", metrics.river_pct_actual, budgets.river_pct),
            (
                "forest",
                of_land(&[Terrain::Forest, Terrain::Jungle]),
                budgets.forest_pct + budgets.jungle_pct,
            ),
            ("desert", of_land(&[Terrain::Desert]), budgets.desert_pct),
            (
                "mountain",
                of_land(&[Terrain::Hills, Terrain::Mountains]),
                budgets.mountain_pct,
            ),
        ];
        for (name, actual, expected) in checks {
            if (actual - expected).abs() > 10.0 {
                issues.push(issue(
                    IssueSeverity::Warning,
                    "parameter",
                    format!(
                        "{} share {:.1}% strays from the derived {:.1}%",
                        name, actual, expected
                    ),
                ));
            }
            // A share that lands exactly on a common override value while
            // the derived budget says otherwise suggests hardcoding
            if SUSPICIOUS_PERCENTS
                .iter()
                .any(|&s| (actual - s).abs() < 0.05)
                && (actual - expected).abs() > 5.0
            {
                issues.push(issue(
                    IssueSeverity::Warning,
                    "parameter",
                    format!("{} share {:.1}% looks like a hardcoded override", name, actual),
                ));
            }
        }
    }

    fn validate_starts(
        &self,
        map: &MapData,
        issues: &mut Vec<ValidationIssue>,
        metrics: &mut ValidationMetrics,
    ) {
        let starts = &map.starting_positions;
        if starts.is_empty() {
            issues.push(issue(
                IssueSeverity::Error,
                "startpos",
                "map has no starting positions".into(),
            ));
            return;
        }

        for start in starts {
            if start.x >= map.width || start.y >= map.height {
                issues.push(issue(
                    IssueSeverity::Error,
                    "startpos",
                    format!("start for player {} is out of bounds", start.player_id),
                ));
                continue;
            }
            let tile = map.tile(start.x, start.y);
            if tile.terrain.is_water() {
                issues.push(issue(
                    IssueSeverity::Error,
                    "startpos",
                    format!("start for player {} is on water", start.player_id),
                ));
            }
            self.start_quality(map, start.x, start.y, start.player_id, issues);
        }

        // Spacing statistics
        let mut distances = Vec::new();
        for (i, a) in starts.iter().enumerate() {
            for b in starts.iter().skip(i + 1) {
                distances.push(euclidean_distance((a.x, a.y), (b.x, b.y)));
            }
        }
        if !distances.is_empty() {
            let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
            metrics.start_min_distance = min;
            let floor = f64::from(map.width.min(map.height)) / 8.0;
            if min < floor {
                issues.push(issue(
                    IssueSeverity::Warning,
                    "startpos",
                    format!("closest starts are {:.1} tiles apart (floor {:.1})", min, floor),
                ));
            }
            let mean = distances.iter().sum::<f64>() / distances.len() as f64;
            let variance = distances
                .iter()
                .map(|d| (d - mean) * (d - mean))
                .sum::<f64>()
                / distances.len() as f64;
            if variance.sqrt() >= 0.5 * mean {
                issues.push(issue(
                    IssueSeverity::Warning,
                    "startpos",
                    "start spacing is very uneven".into(),
                ));
            }
        }
    }

    /// Per-position quality: some terrain variety, a resource and water
    /// within reach, and not walled in by mountains.
    fn start_quality(
        &self,
        map: &MapData,
        x: u32,
        y: u32,
        player: u32,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let mut terrains: Vec<Terrain> = Vec::new();
        let mut has_resource = false;
        let mut has_water = false;
        for nx in x.saturating_sub(2)..=(x + 2).min(map.width - 1) {
            for ny in y.saturating_sub(2)..=(y + 2).min(map.height - 1) {
                if chebyshev_distance((x, y), (nx, ny)) > 2 {
                    continue;
                }
                let tile = map.tile(nx, ny);
                if !terrains.contains(&tile.terrain) {
                    terrains.push(tile.terrain);
                }
                has_resource |= tile.resource.is_some();
                has_water |= tile.terrain.is_water() || !tile.river_mask.is_empty();
            }
        }
        if terrains.len() < 3 {
            issues.push(issue(
                IssueSeverity::Warning,
                "startpos",
                format!("player {} start has little terrain variety", player),
            ));
        }
        if !has_resource {
            issues.push(issue(
                IssueSeverity::Warning,
                "startpos",
                format!("player {} start has no resource in reach", player),
            ));
        }
        if !has_water {
            issues.push(issue(
                IssueSeverity::Warning,
                "startpos",
                format!("player {} start has no water access", player),
            ));
        }

        let mut mountains = 0;
        let mut neighbors = 0;
        for (dx, dy) in DIRS8 {
            let (nx, ny) = (x as i32 + dx, y as i32 + dy);
            if nx < 0 || ny < 0 || nx >= map.width as i32 || ny >= map.height as i32 {
                continue;
            }
            neighbors += 1;
            if map.tile(nx as u32, ny as u32).terrain == Terrain::Mountains {
                mountains += 1;
            }
        }
        if neighbors > 0 && mountains * 100 > neighbors * 30 {
            issues.push(issue(
                IssueSeverity::Warning,
                "startpos",
                format!("player {} start is walled in by mountains", player),
            ));
        }
    }

    fn validate_performance(
        &self,
        issues: &mut Vec<ValidationIssue>,
        metrics: &ValidationMetrics,
    ) {
        if metrics.baseline_time_ms > 0
            && metrics.generation_time_ms > metrics.baseline_time_ms * 10
        {
            issues.push(issue(
                IssueSeverity::Warning,
                "performance",
                format!(
                    "generation took {} ms against a {} ms baseline",
                    metrics.generation_time_ms, metrics.baseline_time_ms
                ),
            ));
        }
    }
}

fn issue(severity: IssueSeverity, category: &'static str, message: String) -> ValidationIssue {
    ValidationIssue {
        severity,
        category,
        message,
    }
}
