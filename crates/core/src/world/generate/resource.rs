//! The thin terrain-to-resource lookup. Each terrain that can carry a
//! special resource gets a fixed percent chance per tile; at most one
//! resource ever lands on a tile.

use crate::world::{
    generate::{Generate, WorldBuilder},
    Resource, Terrain,
};
use rand::Rng;

/// `(terrain, resource, percent chance)` rows of the lookup.
const RESOURCE_TABLE: &[(Terrain, Resource, u32)] = &[
    (Terrain::Coast, Resource::Fish, 15),
    (Terrain::Grassland, Resource::Resources, 10),
    (Terrain::Plains, Resource::Wheat, 10),
    (Terrain::Desert, Resource::Oasis, 10),
    (Terrain::Tundra, Resource::Game, 10),
    (Terrain::Forest, Resource::Game, 15),
    (Terrain::Jungle, Resource::Gems, 10),
    (Terrain::Swamp, Resource::Peat, 10),
    (Terrain::Hills, Resource::Coal, 15),
    (Terrain::Mountains, Resource::Gold, 10),
];

#[derive(Debug)]
pub(crate) struct ResourceGenerator;

impl Generate for ResourceGenerator {
    fn generate(&self, world: &mut WorldBuilder) -> anyhow::Result<()> {
        let (w, h) = (world.width(), world.height());
        for x in 0..w {
            for y in 0..h {
                let terrain = world.tiles.get(x, y).terrain()?;
                let row = RESOURCE_TABLE
                    .iter()
                    .find(|(t, _, _)| *t == terrain)
                    .copied();
                if let Some((_, resource, chance)) = row {
                    if world.rng.gen_range(0..100) < chance {
                        world.tiles.get_mut(x, y).set_resource(resource)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Whether a terrain admits the given resource, per the lookup table.
pub(crate) fn terrain_admits(terrain: Terrain, resource: Resource) -> bool {
    RESOURCE_TABLE
        .iter()
        .any(|&(t, r, _)| t == terrain && r == resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GenConfig, ruleset::TerrainRuleset};

    #[test]
    fn test_resources_only_on_admitting_terrain() {
        let config = GenConfig {
            width: 30,
            height: 30,
            seed: 70u64.into(),
            ..Default::default()
        };
        let ruleset = TerrainRuleset::load("classic").unwrap();
        let mut world = WorldBuilder::new(&config, &ruleset, None);
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            let terrain = match (x + y) % 4 {
                0 => Terrain::Ocean, // never in the table
                1 => Terrain::Hills,
                2 => Terrain::Forest,
                _ => Terrain::Grassland,
            };
            world.tiles.get_mut(x, y).set_terrain(terrain);
        }
        ResourceGenerator.generate(&mut world).unwrap();

        let mut placed = 0;
        for (x, y) in world.tiles.coords().collect::<Vec<_>>() {
            if let Some(resource) = world.tiles.get(x, y).resource() {
                placed += 1;
                let terrain = world.tiles.get(x, y).terrain_opt().unwrap();
                assert!(terrain_admits(terrain, resource));
            }
        }
        // ~675 eligible tiles at 10-15% apiece: some always land
        assert!(placed > 10, "only {} resources placed", placed);
    }

    #[test]
    fn test_admission_table() {
        assert!(terrain_admits(Terrain::Hills, Resource::Coal));
        assert!(!terrain_admits(Terrain::Hills, Resource::Fish));
        assert!(!terrain_admits(Terrain::Ocean, Resource::Fish));
        assert!(terrain_admits(Terrain::Coast, Resource::Fish));
    }
}
