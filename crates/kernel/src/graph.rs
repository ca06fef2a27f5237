use glam::Vec2;
use mapgraph_catalog::Catalog;
use mapgraph_common::{
    Direction, EntityId, InstanceHandle, InstancePool, NodeIndex, PoolError, PoolKey, RegionTier,
    RegionTypeId, ResourceState,
};
use mapgraph_layout::{Activation, LayoutEngine, LayoutError, MineOutcome, NodeArea};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{EngineConfig, GraphConfig};
use crate::links::LinkTable;
use crate::modes::{ModeFlags, transitions_locked};
use crate::portal::{PortalResolver, Traversal};

/// Collaborators a graph mutation needs for the duration of one call.
pub struct WorldEnv<'a> {
    pub pool: &'a mut dyn InstancePool,
    pub catalog: &'a Catalog,
    pub modes: &'a dyn ModeFlags,
}

impl<'a> WorldEnv<'a> {
    pub fn new(
        pool: &'a mut dyn InstancePool,
        catalog: &'a Catalog,
        modes: &'a dyn ModeFlags,
    ) -> Self {
        Self {
            pool,
            catalog,
            modes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Inactive,
    Active,
}

/// One map region in the graph. Identity outlives the pooled instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub index: NodeIndex,
    /// `None` only for home, which is never pooled.
    pub region: Option<RegionTypeId>,
    pub origin: Vec2,
    pub state: NodeState,
}

/// Errors from graph mutations. A failed mutation leaves the graph as it was.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("catalog has no region types")]
    NoRegionTypes,
    #[error("node {node} uses unknown region type {region:?}")]
    UnknownRegion {
        node: NodeIndex,
        region: RegionTypeId,
    },
    #[error("pool failure: {0}")]
    Pool(#[from] PoolError),
    #[error("layout failure: {0}")]
    Layout(#[from] LayoutError),
    #[error("node {0} already has an active instance")]
    InstanceAlreadyActive(NodeIndex),
}

impl GraphError {
    /// Pool exhaustion may clear up later; configuration errors will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GraphError::Pool(_) | GraphError::Layout(LayoutError::Pool(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionOutcome {
    Moved {
        from: NodeIndex,
        to: NodeIndex,
        /// Where the player is placed in the target node.
        entry: Vec2,
    },
    /// Locked, already there, or nothing to return to.
    Unchanged,
}

impl TransitionOutcome {
    pub fn moved(&self) -> bool {
        matches!(self, TransitionOutcome::Moved { .. })
    }
}

/// Record of every committed graph mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    Materialized {
        node: NodeIndex,
        region: RegionTypeId,
    },
    Linked {
        from: NodeIndex,
        direction: Direction,
        to: NodeIndex,
    },
    Activated {
        node: NodeIndex,
        entities: usize,
    },
    Deactivated {
        node: NodeIndex,
        snapshot: usize,
    },
    Reset,
}

/// Flat copy of the graph's persistent state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub current: NodeIndex,
    pub next_index: NodeIndex,
    /// Oldest first.
    pub history: Vec<NodeIndex>,
    pub links: Vec<(NodeIndex, Direction, NodeIndex)>,
    pub regions: BTreeMap<NodeIndex, RegionTypeId>,
    /// Newest snapshot per node, consumed entities excluded.
    pub snapshots: BTreeMap<NodeIndex, Vec<ResourceState>>,
}

/// The map graph: nodes, portal links, history, and the active node.
///
/// Only the current node holds a pooled instance. Moving deactivates the
/// current node (snapshot, despawn, release) before the target is acquired.
pub struct MapGraph {
    config: GraphConfig,
    rng: SmallRng,
    nodes: BTreeMap<NodeIndex, MapNode>,
    links: LinkTable,
    history: Vec<NodeIndex>,
    next_index: NodeIndex,
    current: NodeIndex,
    resolver: PortalResolver,
    layout: LayoutEngine,
    instances: BTreeMap<NodeIndex, (RegionTypeId, InstanceHandle)>,
    last_entry: Vec2,
    events: Vec<GraphEvent>,
}

impl MapGraph {
    pub fn new(config: &EngineConfig) -> Self {
        Self::build(
            config,
            SmallRng::from_entropy(),
            LayoutEngine::new(config.layout.clone()),
        )
    }

    /// Seeded graph: region selection and placement are reproducible.
    pub fn with_seed(config: &EngineConfig, seed: u64) -> Self {
        Self::build(
            config,
            SmallRng::seed_from_u64(seed),
            LayoutEngine::with_seed(config.layout.clone(), seed),
        )
    }

    fn build(config: &EngineConfig, rng: SmallRng, layout: LayoutEngine) -> Self {
        let graph_config = config.graph.clone();
        let home = home_node(&graph_config);
        let last_entry = home.origin + graph_config.home_spawn;
        Self {
            config: graph_config,
            rng,
            nodes: BTreeMap::from([(NodeIndex::HOME, home)]),
            links: LinkTable::new(),
            history: Vec::new(),
            next_index: NodeIndex(1),
            current: NodeIndex::HOME,
            resolver: PortalResolver::new(),
            layout,
            instances: BTreeMap::new(),
            last_entry,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn current_node_index(&self) -> NodeIndex {
        self.current
    }

    pub fn next_index(&self) -> NodeIndex {
        self.next_index
    }

    pub fn history(&self) -> &[NodeIndex] {
        &self.history
    }

    pub fn nodes(&self) -> &BTreeMap<NodeIndex, MapNode> {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&MapNode> {
        self.nodes.get(&index)
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn link(&self, from: NodeIndex, direction: Direction) -> Option<NodeIndex> {
        self.links.get(from, direction)
    }

    pub fn resolver(&self) -> &PortalResolver {
        &self.resolver
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Pool handle of a node's region instance while it is active.
    pub fn active_instance(&self, node: NodeIndex) -> Option<InstanceHandle> {
        self.instances.get(&node).map(|(_, handle)| *handle)
    }

    /// Player position chosen by the last successful move.
    pub fn last_entry(&self) -> Vec2 {
        self.last_entry
    }

    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    /// World origin of a node. Nodes are spaced along X and never overlap.
    pub fn origin_of(&self, index: NodeIndex) -> Vec2 {
        self.config.home_origin + Vec2::new(self.config.map_spacing * index.0 as f32, 0.0)
    }

    /// Classify a portal entry from the current node. `None` while locked.
    ///
    /// Portal memory is untouched; [`MapGraph::enter_portal`] records it once
    /// the move commits.
    pub fn resolve_entry(&self, entered: Direction, modes: &dyn ModeFlags) -> Option<Traversal> {
        if transitions_locked(modes) {
            tracing::debug!(?entered, "portal entry ignored: locked");
            return None;
        }
        Some(self.resolver.classify(self.current, entered))
    }

    /// Walk through the `entered` portal of the current node. A forward
    /// traversal follows or creates the link; a return steps back through
    /// history. Portal memory only changes when the node changes.
    pub fn enter_portal(
        &mut self,
        entered: Direction,
        traversal: Traversal,
        env: &mut WorldEnv<'_>,
    ) -> Result<TransitionOutcome, GraphError> {
        let prior = self.resolver.clone();
        self.resolver.record(entered);
        let result = match traversal {
            Traversal::Forward => self.transition_by_direction(entered, env),
            Traversal::Return => self.return_to_previous(env),
        };
        if !matches!(result, Ok(TransitionOutcome::Moved { .. })) {
            self.resolver = prior;
        }
        result
    }

    /// Move through the portal on the `direction` side of the current node,
    /// creating the target node and both links on first use.
    pub fn transition_by_direction(
        &mut self,
        direction: Direction,
        env: &mut WorldEnv<'_>,
    ) -> Result<TransitionOutcome, GraphError> {
        if transitions_locked(env.modes) {
            tracing::debug!(?direction, "transition ignored: locked");
            return Ok(TransitionOutcome::Unchanged);
        }
        let from = self.current;
        let _span = tracing::info_span!("transition", from = from.0, ?direction).entered();

        if let Some(target) = self.links.get(from, direction) {
            return self.move_to(target, true, Some(direction), env);
        }
        let target = self.next_index;
        let outcome = self.move_to(target, true, Some(direction), env)?;
        self.links.connect(from, direction, target);
        self.events.push(GraphEvent::Linked {
            from,
            direction,
            to: target,
        });
        Ok(outcome)
    }

    /// Move straight to `target`, materializing it if needed.
    pub fn transition_to(
        &mut self,
        target: NodeIndex,
        record_history: bool,
        env: &mut WorldEnv<'_>,
    ) -> Result<TransitionOutcome, GraphError> {
        if transitions_locked(env.modes) {
            tracing::debug!(target = target.0, "transition ignored: locked");
            return Ok(TransitionOutcome::Unchanged);
        }
        let _span = tracing::info_span!("transition", from = self.current.0, to = target.0).entered();
        self.move_to(target, record_history, None, env)
    }

    /// Step back to the node on top of the history stack.
    ///
    /// An entry equal to the current node (left behind by a home return) is
    /// discarded as already consumed; portal memory is not inverted for it.
    pub fn return_to_previous(
        &mut self,
        env: &mut WorldEnv<'_>,
    ) -> Result<TransitionOutcome, GraphError> {
        if transitions_locked(env.modes) {
            tracing::debug!("return ignored: locked");
            return Ok(TransitionOutcome::Unchanged);
        }
        let Some(previous) = self.history.pop() else {
            return Ok(TransitionOutcome::Unchanged);
        };
        if previous == self.current {
            tracing::debug!(node = previous.0, "stale history entry discarded");
            return Ok(TransitionOutcome::Unchanged);
        }
        let _span =
            tracing::info_span!("transition", from = self.current.0, to = previous.0).entered();

        // Arrive at the portal of `previous` that leads back here.
        let entered = self
            .links
            .direction_to(previous, self.current)
            .map(Direction::opposite)
            .or(self.resolver.last_entered());
        self.resolver.invert_last();

        match self.move_to(previous, false, entered, env) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.history.push(previous);
                self.resolver.invert_last();
                Err(e)
            }
        }
    }

    /// Recall to home. When a long rest is due the whole graph is wiped;
    /// otherwise only the current node is reclaimed and the graph survives.
    pub fn return_to_home(
        &mut self,
        env: &mut WorldEnv<'_>,
    ) -> Result<TransitionOutcome, GraphError> {
        if transitions_locked(env.modes) {
            tracing::debug!("home return ignored: locked");
            return Ok(TransitionOutcome::Unchanged);
        }
        let from = self.current;
        if from.is_home() {
            return Ok(TransitionOutcome::Unchanged);
        }
        if env.modes.long_rest_due() {
            self.reset_graph(env.pool);
            return Ok(TransitionOutcome::Moved {
                from,
                to: NodeIndex::HOME,
                entry: self.last_entry,
            });
        }
        let _span = tracing::info_span!("transition", from = from.0, to = 0).entered();
        self.move_to(NodeIndex::HOME, false, None, env)
    }

    /// Release every pooled instance and forget all nodes but home.
    pub fn reset_graph(&mut self, pool: &mut dyn InstancePool) {
        for (node, (region, handle)) in std::mem::take(&mut self.instances) {
            if let Err(e) = pool.release(PoolKey::Region(region), handle) {
                tracing::warn!(node = node.0, error = %e, "region release failed during reset");
            }
        }
        self.layout.clear(pool);
        let home = home_node(&self.config);
        self.nodes = BTreeMap::from([(NodeIndex::HOME, home)]);
        self.links.clear();
        self.history.clear();
        self.next_index = NodeIndex(1);
        self.current = NodeIndex::HOME;
        self.resolver.clear();
        self.last_entry = home.origin + self.config.home_spawn;
        self.events.push(GraphEvent::Reset);
        tracing::info!("map graph reset");
    }

    /// Route a mining hit to a live entity of the current node.
    pub fn mine(
        &mut self,
        entity: EntityId,
        damage: u32,
        drop_rate_percent: f64,
        env: &mut WorldEnv<'_>,
    ) -> Result<MineOutcome, GraphError> {
        Ok(self
            .layout
            .mine(entity, damage, drop_rate_percent, env.catalog, env.pool)?)
    }

    /// Flatten the graph. The current node contributes its live state.
    pub fn export_state(&self) -> GraphState {
        let mut snapshots = self.layout.snapshots().clone();
        if let Some(live) = self.layout.capture(self.current) {
            snapshots.insert(self.current, live);
        }
        for states in snapshots.values_mut() {
            states.retain(|s| !s.consumed);
        }
        GraphState {
            current: self.current,
            next_index: self.next_index,
            history: self.history.clone(),
            links: self.links.iter().collect(),
            regions: self
                .nodes
                .values()
                .filter_map(|n| n.region.map(|r| (n.index, r)))
                .collect(),
            snapshots,
        }
    }

    /// Replace the graph with saved state, standing at home.
    ///
    /// Nothing is activated; the next move into a restored node consults its
    /// seeded snapshot. `state.current` is left to the caller to resume.
    pub fn restore_state(&mut self, state: GraphState, pool: &mut dyn InstancePool) {
        self.reset_graph(pool);
        self.drain_events();

        let mut next = state.next_index.max(NodeIndex(1));
        for (index, region) in state.regions {
            if index.is_home() {
                continue;
            }
            let origin = self.origin_of(index);
            self.nodes.insert(
                index,
                MapNode {
                    index,
                    region: Some(region),
                    origin,
                    state: NodeState::Inactive,
                },
            );
            next = next.max(index.next());
        }
        for (from, direction, to) in state.links {
            self.links.insert(from, direction, to);
        }
        self.history = state.history;
        self.next_index = next;
        for (node, states) in state.snapshots {
            self.layout.seed_snapshot(node, states);
        }
        tracing::debug!(
            nodes = self.nodes.len(),
            links = self.links.len(),
            history = self.history.len(),
            "graph state restored"
        );
    }

    fn move_to(
        &mut self,
        target: NodeIndex,
        record_history: bool,
        entered: Option<Direction>,
        env: &mut WorldEnv<'_>,
    ) -> Result<TransitionOutcome, GraphError> {
        let from = self.current;
        if target == from {
            return Ok(TransitionOutcome::Unchanged);
        }
        let catalog = env.catalog;

        let (mut node, fresh) = match self.nodes.get(&target) {
            Some(node) => (*node, false),
            None => (self.materialize(target, catalog)?, true),
        };

        self.deactivate(from, env.pool);
        if let Err(e) = self.activate(&node, env) {
            tracing::warn!(target = target.0, error = %e, "activation failed, rolling back");
            self.rollback(from, env);
            return Err(e);
        }

        node.state = NodeState::Active;
        self.nodes.insert(target, node);
        if fresh {
            if let Some(region) = node.region {
                self.events.push(GraphEvent::Materialized {
                    node: target,
                    region,
                });
                tracing::info!(node = target.0, region = region.0, "node materialized");
            }
        }
        if target >= self.next_index {
            self.next_index = target.next();
        }
        if record_history {
            self.history.push(from);
        }
        self.current = target;
        let entry = self.entry_position(&node, entered, catalog);
        self.last_entry = entry;
        tracing::debug!(from = from.0, to = target.0, "moved");
        Ok(TransitionOutcome::Moved {
            from,
            to: target,
            entry,
        })
    }

    fn rollback(&mut self, from: NodeIndex, env: &mut WorldEnv<'_>) {
        let Some(node) = self.nodes.get(&from).copied() else {
            return;
        };
        match self.activate(&node, env) {
            Ok(_) => {
                if let Some(n) = self.nodes.get_mut(&from) {
                    n.state = NodeState::Active;
                }
            }
            Err(e) => tracing::error!(node = from.0, error = %e, "rollback activation failed"),
        }
    }

    fn materialize(&mut self, index: NodeIndex, catalog: &Catalog) -> Result<MapNode, GraphError> {
        let region = self.pick_region(catalog)?;
        Ok(MapNode {
            index,
            region: Some(region),
            origin: self.origin_of(index),
            state: NodeState::Inactive,
        })
    }

    /// 60% common, 30% uncommon, 10% rare; any type when the tier is empty.
    fn pick_region(&mut self, catalog: &Catalog) -> Result<RegionTypeId, GraphError> {
        let tier = match self.rng.gen_range(0..100u32) {
            0..60 => RegionTier::Common,
            60..90 => RegionTier::Uncommon,
            _ => RegionTier::Rare,
        };
        let in_tier = catalog.regions_in_tier(tier);
        if !in_tier.is_empty() {
            return Ok(in_tier[self.rng.gen_range(0..in_tier.len())].id);
        }
        if catalog.regions.is_empty() {
            tracing::error!("no region types available, transition aborted");
            return Err(GraphError::NoRegionTypes);
        }
        tracing::debug!(?tier, "tier empty, falling back to any region type");
        let i = self.rng.gen_range(0..catalog.regions.len());
        Ok(catalog.regions[i].id)
    }

    fn deactivate(&mut self, index: NodeIndex, pool: &mut dyn InstancePool) {
        let snapshot = self.layout.snapshot(index).unwrap_or(0);
        self.layout.despawn(index, pool);
        if let Some((region, handle)) = self.instances.remove(&index) {
            if let Err(e) = pool.release(PoolKey::Region(region), handle) {
                tracing::warn!(node = index.0, error = %e, "region release failed");
            }
        }
        if let Some(node) = self.nodes.get_mut(&index) {
            node.state = NodeState::Inactive;
        }
        self.events.push(GraphEvent::Deactivated {
            node: index,
            snapshot,
        });
        tracing::debug!(node = index.0, snapshot, "node deactivated");
    }

    fn activate(&mut self, node: &MapNode, env: &mut WorldEnv<'_>) -> Result<(), GraphError> {
        let catalog = env.catalog;
        let Some(region_id) = node.region else {
            self.events.push(GraphEvent::Activated {
                node: node.index,
                entities: 0,
            });
            return Ok(());
        };
        let region = catalog.region(region_id).ok_or(GraphError::UnknownRegion {
            node: node.index,
            region: region_id,
        })?;
        if self.instances.contains_key(&node.index) {
            return Err(GraphError::InstanceAlreadyActive(node.index));
        }

        let key = PoolKey::Region(region_id);
        let handle = env.pool.acquire(key, node.origin)?;
        let area = NodeArea {
            node: node.index,
            origin: node.origin,
            region,
        };
        let stage = env.modes.stage();
        match self.layout.activate(area, catalog, stage, env.pool) {
            Ok(activation) => {
                self.instances.insert(node.index, (region_id, handle));
                let entities = match activation {
                    Activation::Restored { entities } => entities,
                    Activation::Populated(report) => report.total_placed(),
                };
                self.events.push(GraphEvent::Activated {
                    node: node.index,
                    entities,
                });
                tracing::debug!(node = node.index.0, entities, "node activated");
                Ok(())
            }
            Err(e) => {
                if let Err(release) = env.pool.release(key, handle) {
                    tracing::warn!(node = node.index.0, error = %release, "region release failed");
                }
                Err(e.into())
            }
        }
    }

    /// Portal opposite the entered side, moved inward by `entry_offset`.
    fn entry_position(&self, node: &MapNode, entered: Option<Direction>, catalog: &Catalog) -> Vec2 {
        let Some(entered) = entered else {
            return if node.index.is_home() {
                node.origin + self.config.home_spawn
            } else {
                node.origin
            };
        };
        let exit = entered.opposite();
        let anchor = match node.region {
            Some(id) => catalog.region(id).and_then(|r| r.portal(exit)),
            None => catalog.home_portal(exit),
        };
        anchor.map_or(node.origin, |a| {
            node.origin + a.position + exit.inward() * self.config.entry_offset
        })
    }
}

fn home_node(config: &GraphConfig) -> MapNode {
    MapNode {
        index: NodeIndex::HOME,
        region: None,
        origin: config.home_origin,
        state: NodeState::Active,
    }
}
