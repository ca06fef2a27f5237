use mapgraph_common::{EntityKind, InstanceHandle, ResourceState};
use serde::{Deserialize, Serialize};

/// What a single hit did to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strike {
    /// Durability went down and the entity is still standing.
    Damaged { remaining: u32 },
    /// This hit consumed the entity.
    Consumed,
    /// The entity was already consumed or spent before this hit.
    Spent,
    /// The entity kind does not react to mining.
    Ignored,
}

/// Items released by consuming a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropYield {
    pub item: u32,
    pub amount: u32,
}

/// Result of `mine(damage)` as seen by collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MineOutcome {
    pub still_alive: bool,
    pub consumed: bool,
    pub drop: Option<DropYield>,
}

/// An entity placed in an active node, together with its pooled instance.
///
/// The handle is `None` once the instance went back to the pool (consumed).
#[derive(Debug, Clone)]
pub struct LiveEntity {
    pub state: ResourceState,
    pub handle: Option<InstanceHandle>,
}

impl LiveEntity {
    pub fn new(state: ResourceState, handle: InstanceHandle) -> Self {
        Self {
            state,
            handle: Some(handle),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.state.kind
    }

    /// Apply one hit according to the entity kind.
    pub fn strike(&mut self, damage: u32) -> Strike {
        match self.state.kind {
            EntityKind::DecorativeObject => Strike::Ignored,
            EntityKind::Resource => {
                if self.state.consumed || self.state.durability == 0 {
                    return Strike::Spent;
                }
                self.state.durability = self.state.durability.saturating_sub(damage);
                if self.state.durability == 0 {
                    self.state.consumed = true;
                    Strike::Consumed
                } else {
                    Strike::Damaged {
                        remaining: self.state.durability,
                    }
                }
            }
            EntityKind::CoreStructure => {
                if self.state.durability == 0 {
                    return Strike::Spent;
                }
                self.state.durability = self.state.durability.saturating_sub(damage);
                Strike::Damaged {
                    remaining: self.state.durability,
                }
            }
        }
    }
}
