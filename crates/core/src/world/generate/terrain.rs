//! Quantity-budgeted terrain placement: forests, jungles, swamps and the two
//! desert flavors drawn onto random climate-matching tiles, plus the final
//! plains sweep that resolves whatever land is still uncommitted.

use crate::{
    ruleset::TerrainProperty,
    world::{
        generate::{Generate, WorldBuilder, HMAX},
        TemperatureSet, WetnessCondition,
    },
};
use rand::Rng;

/// Random draws attempted before falling back to a full candidate scan.
const RANDOM_TRIES: u32 = 20;

/// Elevation condition for placement: swamps want low ground, deserts high.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum MountainCondition {
    Any,
    Low,
    NotLow,
}

/// One placement bucket: the pick-terrain arguments plus the conditions a
/// candidate tile must satisfy.
#[derive(Copy, Clone, Debug)]
struct Bucket {
    target: TerrainProperty,
    prefer: Option<TerrainProperty>,
    avoid: Option<TerrainProperty>,
    wetness: WetnessCondition,
    temperature: TemperatureSet,
    mountain: MountainCondition,
    count: usize,
}

#[derive(Debug)]
pub(crate) struct TerrainGenerator;

impl Generate for TerrainGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        world.hmap_low_level = hmap_low_level(world.budgets.swamp_pct, world.shore_level);

        let total = world
            .tiles
            .coords()
            .filter(|&(x, y)| world.tiles.get(x, y).is_land_fill() && world.not_placed(x, y))
            .count();
        let b = &world.budgets;
        // Budgets are shares of the non-mountain land area
        let land_share = (100.0 - b.mountain_pct).max(1.0);
        let scaled = |pct: f64| (total as f64 * pct / land_share) as usize;

        let buckets = [
            Bucket {
                target: TerrainProperty::Foliage,
                prefer: Some(TerrainProperty::Temperate),
                avoid: Some(TerrainProperty::Tropical),
                wetness: WetnessCondition::All,
                temperature: TemperatureSet::NFROZEN,
                mountain: MountainCondition::Any,
                count: scaled(b.forest_pct),
            },
            Bucket {
                target: TerrainProperty::Foliage,
                prefer: Some(TerrainProperty::Tropical),
                avoid: Some(TerrainProperty::Cold),
                wetness: WetnessCondition::All,
                temperature: TemperatureSet::TROPICAL,
                mountain: MountainCondition::Any,
                count: scaled(b.jungle_pct),
            },
            Bucket {
                target: TerrainProperty::Wet,
                prefer: None,
                avoid: Some(TerrainProperty::Foliage),
                wetness: WetnessCondition::NotDry,
                temperature: TemperatureSet::HOT,
                mountain: MountainCondition::Low,
                count: scaled(b.swamp_pct),
            },
            Bucket {
                target: TerrainProperty::Dry,
                prefer: Some(TerrainProperty::Tropical),
                avoid: Some(TerrainProperty::Cold),
                wetness: WetnessCondition::Dry,
                temperature: TemperatureSet::NFROZEN,
                mountain: MountainCondition::NotLow,
                count: scaled(b.desert_pct),
            },
            // Alternate deserts relax the dry-belt requirement so hot maps
            // can still spend their desert budget
            Bucket {
                target: TerrainProperty::Dry,
                prefer: Some(TerrainProperty::Tropical),
                avoid: Some(TerrainProperty::Wet),
                wetness: WetnessCondition::All,
                temperature: TemperatureSet::NFROZEN,
                mountain: MountainCondition::NotLow,
                count: (total as f64 * b.desert_pct * 10.0 / (500.0 - b.mountain_pct * 5.0).max(1.0))
                    as usize,
            },
        ];

        for bucket in buckets {
            place_bucket(world, bucket)?;
        }
        Ok(())
    }
}

/// The swamp threshold: land strictly below it counts as "low".
pub(crate) fn hmap_low_level(swamp_pct: f64, shore_level: i32) -> i32 {
    (4.0 * swamp_pct * f64::from(HMAX - shore_level) / 100.0) as i32 + shore_level
}

fn place_bucket(world: &mut WorldBuilder, bucket: Bucket) -> anyhow::Result<()> {
    let mut remaining = bucket.count;
    while remaining > 0 {
        match find_candidate(world, &bucket) {
            Some((x, y)) => {
                let terrain = world.ruleset.pick_terrain(
                    Some(bucket.target),
                    bucket.prefer,
                    bucket.avoid,
                    &mut world.rng,
                );
                world.place_terrain(x, y, terrain)?;
                remaining -= 1;
            }
            // Bucket ran dry: the rest of its budget spills into the final
            // plains sweep
            None => break,
        }
    }
    Ok(())
}

/// Pick a random unplaced land tile matching the bucket's conditions: a
/// handful of random probes first, then a full scan so a scarce candidate
/// can still be found.
fn find_candidate(world: &mut WorldBuilder, bucket: &Bucket) -> Option<(u32, u32)> {
    let (w, h) = (world.width(), world.height());
    for _ in 0..RANDOM_TRIES {
        let x = world.rng.gen_range(0..w);
        let y = world.rng.gen_range(0..h);
        if tile_matches(world, bucket, x, y) {
            return Some((x, y));
        }
    }

    let candidates: Vec<(u32, u32)> = world
        .tiles
        .coords()
        .filter(|&(x, y)| tile_matches(world, bucket, x, y))
        .collect();
    if candidates.is_empty() {
        None
    } else {
        Some(candidates[world.rng.gen_range(0..candidates.len())])
    }
}

fn tile_matches(world: &WorldBuilder, bucket: &Bucket, x: u32, y: u32) -> bool {
    if !world.tiles.get(x, y).is_land_fill() || !world.not_placed(x, y) {
        return false;
    }
    if !world.test_wetness(x, y, bucket.wetness) {
        return false;
    }
    if !world.test_temperature(x, y, bucket.temperature) {
        return false;
    }
    let elevation = *world.heights.get(x, y);
    match bucket.mountain {
        MountainCondition::Any => true,
        MountainCondition::Low => elevation < world.hmap_low_level,
        MountainCondition::NotLow => elevation >= world.hmap_low_level,
    }
}

/// The final sweep: every land tile still in the land-fill state is resolved
/// from its temperature class — tundra in the cold and frozen bands, a
/// grassland/plains mix everywhere else.
#[derive(Debug)]
pub(crate) struct PlainsGenerator;

impl Generate for PlainsGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let (w, h) = (world.width(), world.height());
        for x in 0..w {
            for y in 0..h {
                if !world.tiles.get(x, y).is_land_fill() {
                    continue;
                }
                let class = world.tiles.get(x, y).temperature()?;
                let terrain = if TemperatureSet::FROZEN.matches(class) {
                    world.ruleset.pick_terrain(
                        Some(TerrainProperty::Frozen),
                        None,
                        Some(TerrainProperty::Mountainous),
                        &mut world.rng,
                    )
                } else if TemperatureSet::COLD.matches(class) {
                    world.ruleset.pick_terrain(
                        Some(TerrainProperty::Cold),
                        None,
                        Some(TerrainProperty::Mountainous),
                        &mut world.rng,
                    )
                } else {
                    world.ruleset.pick_terrain(
                        Some(TerrainProperty::Temperate),
                        Some(TerrainProperty::Green),
                        Some(TerrainProperty::Mountainous),
                        &mut world.rng,
                    )
                };
                world.tiles.get_mut(x, y).set_terrain(terrain);
            }
        }
        Ok(())
    }
}
