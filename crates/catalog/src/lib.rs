//! Authoring catalog: region types by tier, entity types, portal anchors.
//!
//! The catalog is read-only at runtime. The graph consults it when a node is
//! materialized and the layout engine consults it when a node is populated.
//!
//! # Layout
//! Catalogs are plain JSON so designers can edit them; `Catalog::builtin()`
//! carries the shipped defaults.

use glam::Vec2;
use mapgraph_common::{Direction, EntityKind, EntityTypeId, RegionTier, RegionTypeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Axis-aligned rectangle in node-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Rectangle of `size` centered on `center`.
    pub fn centered(center: Vec2, size: Vec2) -> Self {
        Self {
            min: center - size / 2.0,
            max: center + size / 2.0,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }
}

/// A portal placed in a node, relative to the node origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortalAnchor {
    pub direction: Direction,
    pub position: Vec2,
}

/// A region (map) type that procedural nodes are instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionType {
    pub id: RegionTypeId,
    pub name: String,
    pub tier: RegionTier,
    /// Full extent of the spawn area, centered on the node origin.
    pub area: Vec2,
    /// Number of common entities to place.
    pub budget: u32,
    #[serde(default)]
    pub portals: Vec<PortalAnchor>,
    /// Cells must fall inside one of these. Empty means the whole area.
    #[serde(default)]
    pub spawn_zones: Vec<Rect>,
    /// Cells inside any of these are rejected.
    #[serde(default)]
    pub obstacles: Vec<Rect>,
}

impl RegionType {
    pub fn portal(&self, direction: Direction) -> Option<&PortalAnchor> {
        self.portals.iter().find(|p| p.direction == direction)
    }
}

/// A placeable entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    pub id: EntityTypeId,
    pub name: String,
    pub kind: EntityKind,
    /// Relative weight for common draws; percent chance for bonus rolls.
    pub spawn_weight: u32,
    /// Earliest stage (day) at which the type may spawn.
    #[serde(default)]
    pub spawn_stage: u32,
    /// Bonus-drop types are placed by independent probability rolls.
    #[serde(default)]
    pub bonus_drop: bool,
    pub durability: u32,
    /// Item produced when a resource of this type is consumed.
    #[serde(default)]
    pub drop_item: u32,
}

/// Errors from catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate region type id {0:?}")]
    DuplicateRegion(RegionTypeId),
    #[error("duplicate entity type id {0:?}")]
    DuplicateEntity(EntityTypeId),
    #[error("region type {id:?} has a non-positive area")]
    EmptyArea { id: RegionTypeId },
}

/// Region and entity type tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub regions: Vec<RegionType>,
    #[serde(default)]
    pub entities: Vec<EntityType>,
    /// Portals of the home node, relative to the home origin.
    #[serde(default)]
    pub home_portals: Vec<PortalAnchor>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self, id: RegionTypeId) -> Option<&RegionType> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn entity(&self, id: EntityTypeId) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Region types of one tier, in catalog order.
    pub fn regions_in_tier(&self, tier: RegionTier) -> Vec<&RegionType> {
        self.regions.iter().filter(|r| r.tier == tier).collect()
    }

    /// Entity types unlocked at `stage`. Core structures are never spawned.
    pub fn spawnable(&self, stage: u32) -> Vec<&EntityType> {
        self.entities
            .iter()
            .filter(|e| stage >= e.spawn_stage && e.kind != EntityKind::CoreStructure)
            .collect()
    }

    pub fn home_portal(&self, direction: Direction) -> Option<&PortalAnchor> {
        self.home_portals.iter().find(|p| p.direction == direction)
    }

    /// Reject duplicate ids and degenerate areas.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut regions = BTreeSet::new();
        for r in &self.regions {
            if !regions.insert(r.id) {
                return Err(CatalogError::DuplicateRegion(r.id));
            }
            if r.area.x <= 0.0 || r.area.y <= 0.0 {
                return Err(CatalogError::EmptyArea { id: r.id });
            }
        }
        let mut entities = BTreeSet::new();
        for e in &self.entities {
            if !entities.insert(e.id) {
                return Err(CatalogError::DuplicateEntity(e.id));
            }
        }
        Ok(())
    }

    /// Save the catalog to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load and validate a catalog from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path.as_ref())?;
        let catalog: Self = serde_json::from_reader(file)?;
        catalog.validate()?;
        tracing::debug!(
            regions = catalog.regions.len(),
            entities = catalog.entities.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// The shipped mine set: small, large and rare mines plus ores, a jewel,
    /// a lamp and the base core.
    pub fn builtin() -> Self {
        let small = Vec2::new(60.0, 32.0);
        let large = Vec2::new(85.0, 50.0);
        Self {
            regions: vec![
                mine(1110, "small mine", RegionTier::Common, small, 100),
                mine(1120, "large mine", RegionTier::Uncommon, large, 160),
                mine(1130, "rare mine", RegionTier::Rare, small, 100),
            ],
            entities: vec![
                ore(1, "copper ore", 60, 0, 3, 301),
                ore(2, "iron ore", 30, 2, 5, 302),
                ore(3, "gold ore", 10, 4, 8, 303),
                EntityType {
                    id: EntityTypeId(900),
                    name: "jewel".into(),
                    kind: EntityKind::Resource,
                    spawn_weight: 5,
                    spawn_stage: 0,
                    bonus_drop: true,
                    durability: 10,
                    drop_item: 500,
                },
                EntityType {
                    id: EntityTypeId(1500),
                    name: "lamp".into(),
                    kind: EntityKind::DecorativeObject,
                    spawn_weight: 2,
                    spawn_stage: 0,
                    bonus_drop: false,
                    durability: 1,
                    drop_item: 0,
                },
                EntityType {
                    id: EntityTypeId(2000),
                    name: "core".into(),
                    kind: EntityKind::CoreStructure,
                    spawn_weight: 0,
                    spawn_stage: 0,
                    bonus_drop: false,
                    durability: 500,
                    drop_item: 0,
                },
            ],
            home_portals: edge_portals(Vec2::new(40.0, 24.0)),
        }
    }
}

fn mine(id: u32, name: &str, tier: RegionTier, area: Vec2, budget: u32) -> RegionType {
    RegionType {
        id: RegionTypeId(id),
        name: name.into(),
        tier,
        area,
        budget,
        portals: edge_portals(area),
        spawn_zones: Vec::new(),
        // Keep a clear walkway around the portal centerlines.
        obstacles: vec![
            Rect::centered(Vec2::ZERO, Vec2::new(area.x, 2.0)),
            Rect::centered(Vec2::ZERO, Vec2::new(2.0, area.y)),
        ],
    }
}

fn ore(id: u32, name: &str, weight: u32, stage: u32, durability: u32, drop: u32) -> EntityType {
    EntityType {
        id: EntityTypeId(id),
        name: name.into(),
        kind: EntityKind::Resource,
        spawn_weight: weight,
        spawn_stage: stage,
        bonus_drop: false,
        durability,
        drop_item: drop,
    }
}

/// One portal centered on each edge of an area.
fn edge_portals(area: Vec2) -> Vec<PortalAnchor> {
    let half = area / 2.0;
    vec![
        PortalAnchor { direction: Direction::North, position: Vec2::new(0.0, half.y) },
        PortalAnchor { direction: Direction::East, position: Vec2::new(half.x, 0.0) },
        PortalAnchor { direction: Direction::South, position: Vec2::new(0.0, -half.y) },
        PortalAnchor { direction: Direction::West, position: Vec2::new(-half.x, 0.0) },
    ]
}

pub fn crate_info() -> &'static str {
    "mapgraph-catalog v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_is_valid() {
        let catalog = Catalog::builtin();
        catalog.validate().unwrap();
        assert_eq!(catalog.regions_in_tier(RegionTier::Common).len(), 1);
        assert_eq!(catalog.regions_in_tier(RegionTier::Uncommon).len(), 1);
        assert_eq!(catalog.regions_in_tier(RegionTier::Rare).len(), 1);
        assert_eq!(catalog.home_portals.len(), 4);
    }

    #[test]
    fn spawnable_respects_stage_and_excludes_core() {
        let catalog = Catalog::builtin();
        let day0: Vec<_> = catalog.spawnable(0).iter().map(|e| e.id).collect();
        assert!(day0.contains(&EntityTypeId(1)));
        assert!(!day0.contains(&EntityTypeId(2)));
        assert!(!day0.contains(&EntityTypeId(2000)));

        let day4: Vec<_> = catalog.spawnable(4).iter().map(|e| e.id).collect();
        assert!(day4.contains(&EntityTypeId(3)));
    }

    #[test]
    fn duplicate_region_rejected() {
        let mut catalog = Catalog::builtin();
        let dup = catalog.regions[0].clone();
        catalog.regions.push(dup);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::DuplicateRegion(RegionTypeId(1110)))
        ));
    }

    #[test]
    fn empty_area_rejected() {
        let mut catalog = Catalog::builtin();
        catalog.regions[1].area = Vec2::new(0.0, 10.0);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::EmptyArea { .. })
        ));
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(Vec2::ZERO, Vec2::ONE);
        assert!(r.contains(Vec2::new(0.5, 0.5)));
        assert!(r.contains(Vec2::ZERO));
        assert!(!r.contains(Vec2::ONE));
    }

    #[test]
    fn region_portal_lookup() {
        let catalog = Catalog::builtin();
        let small = catalog.region(RegionTypeId(1110)).unwrap();
        let south = small.portal(Direction::South).unwrap();
        assert_eq!(south.position, Vec2::new(0.0, -16.0));
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let catalog = Catalog::builtin();
        catalog.save(tmp.path()).unwrap();

        let loaded = Catalog::load(tmp.path()).unwrap();
        assert_eq!(loaded.regions.len(), catalog.regions.len());
        assert_eq!(loaded.entities.len(), catalog.entities.len());
    }
}
