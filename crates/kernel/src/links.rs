use mapgraph_common::{Direction, NodeIndex};
use std::collections::BTreeMap;

/// Outgoing portal links of one node, one slot per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortalSlots([Option<NodeIndex>; 4]);

impl PortalSlots {
    pub fn get(&self, direction: Direction) -> Option<NodeIndex> {
        self.0[direction.index()]
    }

    pub fn set(&mut self, direction: Direction, to: NodeIndex) {
        self.0[direction.index()] = Some(to);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, NodeIndex)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|d| self.get(d).map(|to| (d, to)))
    }
}

/// Directed portal links keyed by (source node, exit direction).
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    slots: BTreeMap<NodeIndex, PortalSlots>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, from: NodeIndex, direction: Direction) -> Option<NodeIndex> {
        self.slots.get(&from).and_then(|s| s.get(direction))
    }

    /// Create `(from, direction) -> to` and its reciprocal
    /// `(to, opposite(direction)) -> from` together.
    pub fn connect(&mut self, from: NodeIndex, direction: Direction, to: NodeIndex) {
        self.insert(from, direction, to);
        self.insert(to, direction.opposite(), from);
    }

    /// Insert a single directed edge. Used when rebuilding from saved data.
    pub fn insert(&mut self, from: NodeIndex, direction: Direction, to: NodeIndex) {
        self.slots.entry(from).or_default().set(direction, to);
    }

    /// Exit direction of `from` that leads to `to`, if any.
    pub fn direction_to(&self, from: NodeIndex, to: NodeIndex) -> Option<Direction> {
        self.slots
            .get(&from)
            .and_then(|s| s.iter().find(|(_, dest)| *dest == to).map(|(d, _)| d))
    }

    /// Number of directed edges.
    pub fn len(&self) -> usize {
        self.slots.values().map(|s| s.iter().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// All edges in (source, direction) order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, Direction, NodeIndex)> + '_ {
        self.slots
            .iter()
            .flat_map(|(from, slots)| slots.iter().map(move |(d, to)| (*from, d, to)))
    }
}
