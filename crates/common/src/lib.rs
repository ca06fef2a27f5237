//! Shared types for the map graph workspace.
//!
//! # Invariants
//! - `Direction::opposite` is an involution.
//! - Node index 0 is the home node and is never pooled.

pub mod pool;
pub mod types;

pub use pool::{InMemoryPool, InstanceHandle, InstancePool, PoolError, PoolKey};
pub use types::{
    Direction, EntityId, EntityKind, EntityTypeId, NodeIndex, RegionTier, RegionTypeId,
    ResourceState,
};

pub fn crate_info() -> &'static str {
    "mapgraph-common v0.1.0"
}
