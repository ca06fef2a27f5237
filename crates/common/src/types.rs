use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index of a node in the map graph. `0` is home; procedural nodes count up from 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub const HOME: NodeIndex = NodeIndex(0);

    pub fn is_home(self) -> bool {
        self == Self::HOME
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Portal direction. Discriminants double as slot indices in per-node link tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Slot index in a `[_; 4]` table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Unit step pointing from a portal on this side back into the node.
    pub fn inward(self) -> Vec2 {
        match self {
            Self::North => Vec2::new(0.0, -1.0),
            Self::South => Vec2::new(0.0, 1.0),
            Self::East => Vec2::new(-1.0, 0.0),
            Self::West => Vec2::new(1.0, 0.0),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Self::North),
            "e" | "east" => Ok(Self::East),
            "s" | "south" => Ok(Self::South),
            "w" | "west" => Ok(Self::West),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Catalog id of a region (map) type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionTypeId(pub u32);

/// Catalog id of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTypeId(pub u32);

/// Rarity tier of a region type. Drawn 60 / 30 / 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegionTier {
    Common,
    Uncommon,
    Rare,
}

/// Closed set of things the layout engine can place in a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Minable; consumed when durability reaches zero.
    Resource,
    /// Placed scenery. Ignores mining.
    DecorativeObject,
    /// Takes damage but is never consumed.
    CoreStructure,
}

/// Unique identifier of one placed entity. Survives snapshot, restore and save/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable state of one transient entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: EntityId,
    pub type_id: EntityTypeId,
    pub kind: EntityKind,
    pub position: Vec2,
    pub durability: u32,
    pub consumed: bool,
}

impl ResourceState {
    pub fn fresh(type_id: EntityTypeId, kind: EntityKind, position: Vec2, durability: u32) -> Self {
        Self {
            id: EntityId::new(),
            type_id,
            kind,
            position,
            durability,
            consumed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_involution() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().opposite(), d);
            assert_ne!(d.opposite(), d);
        }
    }

    #[test]
    fn direction_slots_are_distinct() {
        let mut seen = [false; 4];
        for d in Direction::ALL {
            assert!(!seen[d.index()]);
            seen[d.index()] = true;
        }
    }

    #[test]
    fn inward_points_away_from_the_portal_side() {
        assert_eq!(Direction::North.inward(), Vec2::new(0.0, -1.0));
        assert_eq!(Direction::West.inward(), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn direction_parses_short_and_long_names() {
        assert_eq!("n".parse::<Direction>().unwrap(), Direction::North);
        assert_eq!("West".parse::<Direction>().unwrap(), Direction::West);
        assert!("up".parse::<Direction>().is_err());
    }

    #[test]
    fn entity_id_uniqueness() {
        assert_ne!(EntityId::new(), EntityId::new());
    }

    #[test]
    fn home_index() {
        assert!(NodeIndex::HOME.is_home());
        assert_eq!(NodeIndex::HOME.next(), NodeIndex(1));
    }
}
