//! Instance-pool port.
//!
//! The real allocator lives outside the map graph. The graph only needs
//! "acquire an instance of type T near P" and "release it back". Anything
//! that implements [`InstancePool`] can be plugged in; [`InMemoryPool`] is a
//! bookkeeping-only implementation used by the CLI and tests.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{EntityTypeId, RegionTypeId};

/// Which pool an instance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoolKey {
    Region(RegionTypeId),
    Entity(EntityTypeId),
}

/// Opaque handle to a pooled instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceHandle(pub u64);

/// Errors from pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool {key:?} exhausted (capacity {capacity})")]
    Exhausted { key: PoolKey, capacity: usize },
    #[error("instance {handle:?} is not active in pool {key:?}")]
    NotActive { key: PoolKey, handle: InstanceHandle },
}

/// Capability provided by the external object pool.
pub trait InstancePool {
    fn acquire(&mut self, key: PoolKey, position: Vec2) -> Result<InstanceHandle, PoolError>;

    fn release(&mut self, key: PoolKey, handle: InstanceHandle) -> Result<(), PoolError>;
}

/// Pool that only tracks handles. Capacity limits are optional per key.
#[derive(Debug, Default)]
pub struct InMemoryPool {
    next_handle: u64,
    active: BTreeMap<PoolKey, BTreeSet<InstanceHandle>>,
    capacity: BTreeMap<PoolKey, usize>,
    acquired_total: u64,
    released_total: u64,
}

impl InMemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of simultaneously active instances for `key`.
    pub fn with_capacity(mut self, key: PoolKey, capacity: usize) -> Self {
        self.capacity.insert(key, capacity);
        self
    }

    pub fn set_capacity(&mut self, key: PoolKey, capacity: usize) {
        self.capacity.insert(key, capacity);
    }

    /// Active instance count for one key.
    pub fn active_count(&self, key: PoolKey) -> usize {
        self.active.get(&key).map_or(0, BTreeSet::len)
    }

    /// Active instance count across all keys.
    pub fn total_active(&self) -> usize {
        self.active.values().map(BTreeSet::len).sum()
    }

    /// Active region instances across all region types.
    pub fn active_regions(&self) -> usize {
        self.active
            .iter()
            .filter(|(k, _)| matches!(k, PoolKey::Region(_)))
            .map(|(_, v)| v.len())
            .sum()
    }

    pub fn acquired_total(&self) -> u64 {
        self.acquired_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }
}

impl InstancePool for InMemoryPool {
    fn acquire(&mut self, key: PoolKey, position: Vec2) -> Result<InstanceHandle, PoolError> {
        let in_use = self.active_count(key);
        if let Some(&capacity) = self.capacity.get(&key) {
            if in_use >= capacity {
                return Err(PoolError::Exhausted { key, capacity });
            }
        }
        self.next_handle += 1;
        let handle = InstanceHandle(self.next_handle);
        self.active.entry(key).or_default().insert(handle);
        self.acquired_total += 1;
        tracing::trace!(?key, ?handle, x = position.x, y = position.y, "pool acquire");
        Ok(handle)
    }

    fn release(&mut self, key: PoolKey, handle: InstanceHandle) -> Result<(), PoolError> {
        let removed = self
            .active
            .get_mut(&key)
            .is_some_and(|set| set.remove(&handle));
        if !removed {
            return Err(PoolError::NotActive { key, handle });
        }
        self.released_total += 1;
        tracing::trace!(?key, ?handle, "pool release");
        Ok(())
    }
}
