use glam::Vec2;
use mapgraph_common::{Direction, NodeIndex, RegionTypeId};
use mapgraph_kernel::{MapGraph, NodeState};

/// Map graph inspector for developer tooling.
///
/// Read-only queries used by the CLI and for debugging.
pub struct GraphInspector;

impl GraphInspector {
    pub fn summary(graph: &MapGraph) -> GraphSummary {
        GraphSummary {
            current: graph.current_node_index(),
            next_index: graph.next_index(),
            node_count: graph.nodes().len(),
            link_count: graph.links().len(),
            history_depth: graph.history().len(),
            snapshot_count: graph.layout().snapshots().len(),
            live_entities: graph.layout().live_count(),
            pending_events: graph.events().len(),
        }
    }

    /// Every directed link in (source, direction) order.
    pub fn links(graph: &MapGraph) -> Vec<LinkInfo> {
        graph
            .links()
            .iter()
            .map(|(from, direction, to)| LinkInfo {
                from,
                direction,
                to,
            })
            .collect()
    }

    pub fn inspect_node(graph: &MapGraph, index: NodeIndex) -> Option<NodeInfo> {
        let Some(node) = graph.node(index) else {
            tracing::debug!(node = index.0, "inspect: no such node");
            return None;
        };
        Some(NodeInfo {
            index,
            region: node.region,
            origin: node.origin,
            active: node.state == NodeState::Active,
            snapshot_entities: graph.layout().snapshot_for(index).map(<[_]>::len),
            live_entities: graph.layout().live_entities(index).len(),
        })
    }

    pub fn list_nodes(graph: &MapGraph) -> Vec<NodeIndex> {
        graph.nodes().keys().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSummary {
    pub current: NodeIndex,
    pub next_index: NodeIndex,
    pub node_count: usize,
    pub link_count: usize,
    pub history_depth: usize,
    pub snapshot_count: usize,
    pub live_entities: usize,
    pub pending_events: usize,
}

impl std::fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Graph: current={} next={} nodes={} links={} history={} snapshots={} live={} pending_events={}",
            self.current,
            self.next_index,
            self.node_count,
            self.link_count,
            self.history_depth,
            self.snapshot_count,
            self.live_entities,
            self.pending_events
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    pub from: NodeIndex,
    pub direction: Direction,
    pub to: NodeIndex,
}

impl std::fmt::Display for LinkInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} --{:?}--> {}", self.from, self.direction, self.to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub index: NodeIndex,
    pub region: Option<RegionTypeId>,
    pub origin: Vec2,
    pub active: bool,
    /// `None` when the node was never left.
    pub snapshot_entities: Option<usize>,
    pub live_entities: usize,
}

impl std::fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let region = self
            .region
            .map_or_else(|| "home".to_string(), |r| r.0.to_string());
        write!(
            f,
            "Node {} region={} origin=({:.1}, {:.1}) {} live={}",
            self.index,
            region,
            self.origin.x,
            self.origin.y,
            if self.active { "active" } else { "inactive" },
            self.live_entities
        )?;
        if let Some(n) = self.snapshot_entities {
            write!(f, " snapshot={n}")?;
        }
        Ok(())
    }
}
