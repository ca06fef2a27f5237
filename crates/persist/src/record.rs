use glam::Vec2;
use mapgraph_common::{
    Direction, EntityId, EntityKind, EntityTypeId, InstancePool, NodeIndex, RegionTypeId,
    ResourceState,
};
use mapgraph_kernel::{GraphState, MapGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Schema version written into every save record.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// Errors from validating a save record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("save record hash mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    HashMismatch { stored: u64, computed: u64 },
    #[error("save record schema v{found}, expected v{expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub index: NodeIndex,
    pub region: RegionTypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub from: NodeIndex,
    pub direction: Direction,
    pub to: NodeIndex,
}

/// A surviving entity. Consumed entities are never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub type_id: EntityTypeId,
    pub kind: EntityKind,
    pub position: Vec2,
    pub durability: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub node: NodeIndex,
    pub entities: Vec<EntityRecord>,
}

/// Flat, serializable form of the graph and its per-node layouts.
///
/// The hash covers every field except itself, so tampering or truncation
/// is caught before anything is rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub schema_version: u32,
    pub current: NodeIndex,
    pub next_index: NodeIndex,
    /// Oldest first.
    pub history: Vec<NodeIndex>,
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
    pub snapshots: Vec<SnapshotRecord>,
    pub hash: u64,
}

/// Entries discarded during import because they referenced unknown nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dropped {
    pub nodes: usize,
    pub links: usize,
    pub history: usize,
    pub snapshots: usize,
    pub current: bool,
}

impl Dropped {
    pub fn total(&self) -> usize {
        self.nodes + self.links + self.history + self.snapshots + usize::from(self.current)
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// The node the player was in when the record was written.
    pub resume_at: NodeIndex,
    pub dropped: Dropped,
}

impl SaveRecord {
    /// Flatten a graph. The current node's live entities are included.
    pub fn export(graph: &MapGraph) -> Self {
        let _span = tracing::info_span!("export").entered();
        let state = graph.export_state();
        let snapshots = state
            .snapshots
            .into_iter()
            .map(|(node, states)| SnapshotRecord {
                node,
                entities: states
                    .into_iter()
                    .filter(|s| !s.consumed)
                    .map(|s| EntityRecord {
                        id: s.id,
                        type_id: s.type_id,
                        kind: s.kind,
                        position: s.position,
                        durability: s.durability,
                    })
                    .collect(),
            })
            .collect();

        let mut record = Self {
            schema_version: RECORD_SCHEMA_VERSION,
            current: state.current,
            next_index: state.next_index,
            history: state.history,
            nodes: state
                .regions
                .into_iter()
                .map(|(index, region)| NodeRecord { index, region })
                .collect(),
            links: state
                .links
                .into_iter()
                .map(|(from, direction, to)| LinkRecord {
                    from,
                    direction,
                    to,
                })
                .collect(),
            snapshots,
            hash: 0,
        };
        record.seal();
        tracing::debug!(
            nodes = record.nodes.len(),
            links = record.links.len(),
            snapshots = record.snapshots.len(),
            "graph exported"
        );
        record
    }

    /// Recompute and store the content hash.
    pub fn seal(&mut self) {
        self.hash = self.content_hash();
    }

    pub fn verify(&self) -> bool {
        self.hash == self.content_hash()
    }

    fn content_hash(&self) -> u64 {
        fnv1a_hash(&format!(
            "{}|{}|{}|{:?}|{:?}|{:?}|{:?}",
            self.schema_version,
            self.current.0,
            self.next_index.0,
            self.history,
            self.nodes,
            self.links,
            self.snapshots
        ))
    }

    /// Rebuild `graph` from this record, standing at home.
    ///
    /// Entries that reference unknown nodes are dropped and logged; the rest
    /// still loads. Nothing is activated, so the next move into a saved node
    /// restores its snapshot instead of generating a fresh layout.
    pub fn import_into(
        &self,
        graph: &mut MapGraph,
        pool: &mut dyn InstancePool,
    ) -> Result<ImportReport, PersistError> {
        let _span = tracing::info_span!("import").entered();
        if self.schema_version != RECORD_SCHEMA_VERSION {
            return Err(PersistError::SchemaMismatch {
                found: self.schema_version,
                expected: RECORD_SCHEMA_VERSION,
            });
        }
        let computed = self.content_hash();
        if computed != self.hash {
            return Err(PersistError::HashMismatch {
                stored: self.hash,
                computed,
            });
        }

        let mut dropped = Dropped::default();
        let mut regions = BTreeMap::new();
        for node in &self.nodes {
            if node.index.is_home() || regions.contains_key(&node.index) {
                tracing::warn!(node = node.index.0, "dropping duplicate or home node record");
                dropped.nodes += 1;
                continue;
            }
            regions.insert(node.index, node.region);
        }
        let known: BTreeSet<NodeIndex> = std::iter::once(NodeIndex::HOME)
            .chain(regions.keys().copied())
            .collect();

        let mut links = Vec::with_capacity(self.links.len());
        for link in &self.links {
            if known.contains(&link.from) && known.contains(&link.to) {
                links.push((link.from, link.direction, link.to));
            } else {
                tracing::warn!(
                    from = link.from.0,
                    to = link.to.0,
                    direction = ?link.direction,
                    "dropping dangling link"
                );
                dropped.links += 1;
            }
        }

        let mut history = Vec::with_capacity(self.history.len());
        for &entry in &self.history {
            if known.contains(&entry) {
                history.push(entry);
            } else {
                tracing::warn!(node = entry.0, "dropping dangling history entry");
                dropped.history += 1;
            }
        }

        let mut snapshots = BTreeMap::new();
        for snapshot in &self.snapshots {
            if !regions.contains_key(&snapshot.node) {
                tracing::warn!(node = snapshot.node.0, "dropping snapshot of unknown node");
                dropped.snapshots += 1;
                continue;
            }
            let states = snapshot
                .entities
                .iter()
                .map(|e| ResourceState {
                    id: e.id,
                    type_id: e.type_id,
                    kind: e.kind,
                    position: e.position,
                    durability: e.durability,
                    consumed: false,
                })
                .collect();
            snapshots.insert(snapshot.node, states);
        }

        let resume_at = if known.contains(&self.current) {
            self.current
        } else {
            tracing::warn!(node = self.current.0, "current node unknown, resuming at home");
            dropped.current = true;
            NodeIndex::HOME
        };

        graph.restore_state(
            GraphState {
                current: resume_at,
                next_index: self.next_index,
                history,
                links,
                regions,
                snapshots,
            },
            pool,
        );
        tracing::info!(
            resume_at = resume_at.0,
            dropped = dropped.total(),
            "save record imported"
        );
        Ok(ImportReport { resume_at, dropped })
    }
}

/// FNV-1a over the record's debug text. Detects corruption, not forgery.
fn fnv1a_hash(data: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgraph_catalog::Catalog;
    use mapgraph_common::InMemoryPool;
    use mapgraph_kernel::{EngineConfig, FixedModes, WorldEnv};

    fn walked_graph(pool: &mut InMemoryPool, catalog: &Catalog, path: &[Direction]) -> MapGraph {
        let day = FixedModes::day();
        let mut env = WorldEnv::new(pool, catalog, &day);
        let mut graph = MapGraph::with_seed(&EngineConfig::default(), 31);
        for &d in path {
            graph.transition_by_direction(d, &mut env).unwrap();
        }
        graph
    }

    fn empty_graph() -> MapGraph {
        MapGraph::with_seed(&EngineConfig::default(), 77)
    }

    #[test]
    fn export_seals_record() {
        let catalog = Catalog::builtin();
        let mut pool = InMemoryPool::new();
        let graph = walked_graph(&mut pool, &catalog, &[Direction::North, Direction::East]);
        let record = SaveRecord::export(&graph);
        assert!(record.verify());
        assert_eq!(record.schema_version, RECORD_SCHEMA_VERSION);
        assert_eq!(record.current, NodeIndex(2));
        assert_eq!(record.next_index, NodeIndex(3));
        assert_eq!(record.history, vec![NodeIndex(0), NodeIndex(1)]);
        assert_eq!(record.nodes.len(), 2);
        assert_eq!(record.links.len(), 4);
        assert_eq!(record.snapshots.len(), 2);
    }

    #[test]
    fn tampering_is_detected() {
        let catalog = Catalog::builtin();
        let mut pool = InMemoryPool::new();
        let graph = walked_graph(&mut pool, &catalog, &[Direction::North]);
        let mut record = SaveRecord::export(&graph);
        record.history.push(NodeIndex(1));
        assert!(!record.verify());

        let mut target = empty_graph();
        let err = record.import_into(&mut target, &mut InMemoryPool::new()).unwrap_err();
        assert!(matches!(err, PersistError::HashMismatch { .. }));
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let mut record = SaveRecord::export(&empty_graph());
        record.schema_version = 9;
        record.seal();
        let err = record
            .import_into(&mut empty_graph(), &mut InMemoryPool::new())
            .unwrap_err();
        assert_eq!(
            err,
            PersistError::SchemaMismatch {
                found: 9,
                expected: RECORD_SCHEMA_VERSION
            }
        );
    }

    #[test]
    fn import_rebuilds_without_activating() {
        let catalog = Catalog::builtin();
        let mut pool = InMemoryPool::new();
        let graph = walked_graph(
            &mut pool,
            &catalog,
            &[Direction::North, Direction::North, Direction::West],
        );
        let record = SaveRecord::export(&graph);

        let mut fresh_pool = InMemoryPool::new();
        let mut restored = empty_graph();
        let report = record.import_into(&mut restored, &mut fresh_pool).unwrap();
        assert_eq!(report.resume_at, NodeIndex(3));
        assert_eq!(report.dropped.total(), 0);
        assert_eq!(restored.current_node_index(), NodeIndex::HOME);
        assert_eq!(restored.history(), graph.history());
        assert_eq!(restored.next_index(), graph.next_index());
        assert_eq!(restored.links().len(), graph.links().len());
        assert_eq!(fresh_pool.total_active(), 0);
        for (from, d, to) in graph.links().iter() {
            assert_eq!(restored.link(from, d), Some(to));
        }
        for (index, node) in graph.nodes() {
            assert_eq!(restored.node(*index).map(|n| n.region), Some(node.region));
        }
    }

    #[test]
    fn resume_restores_saved_layout() {
        let catalog = Catalog::builtin();
        let mut pool = InMemoryPool::new();
        let graph = walked_graph(&mut pool, &catalog, &[Direction::South]);
        let saved: BTreeSet<EntityId> = graph
            .layout()
            .live_entities(NodeIndex(1))
            .iter()
            .map(|e| e.state.id)
            .collect();
        let record = SaveRecord::export(&graph);

        let mut fresh_pool = InMemoryPool::new();
        let mut restored = empty_graph();
        let report = record.import_into(&mut restored, &mut fresh_pool).unwrap();
        let day = FixedModes::day();
        let mut env = WorldEnv::new(&mut fresh_pool, &catalog, &day);
        restored.transition_to(report.resume_at, false, &mut env).unwrap();

        let live: BTreeSet<EntityId> = restored
            .layout()
            .live_entities(NodeIndex(1))
            .iter()
            .map(|e| e.state.id)
            .collect();
        assert_eq!(live, saved);
    }

    #[test]
    fn consumed_entities_never_survive_round_trips() {
        let catalog = Catalog::builtin();
        let day = FixedModes::day();
        let mut pool = InMemoryPool::new();
        let mut graph = walked_graph(&mut pool, &catalog, &[Direction::East]);

        let mut env = WorldEnv::new(&mut pool, &catalog, &day);
        let victim = graph
            .layout()
            .live_entities(NodeIndex(1))
            .iter()
            .find(|e| e.kind() == EntityKind::Resource)
            .map(|e| e.state.id)
            .unwrap();
        assert!(graph.mine(victim, 1_000, 100.0, &mut env).unwrap().consumed);
        drop(env);

        for round in 0..4 {
            let record = SaveRecord::export(&graph);
            assert!(
                record
                    .snapshots
                    .iter()
                    .flat_map(|s| s.entities.iter())
                    .all(|e| e.id != victim),
                "round {round}"
            );
            let mut next_pool = InMemoryPool::new();
            let mut next = MapGraph::with_seed(&EngineConfig::default(), round);
            let report = record.import_into(&mut next, &mut next_pool).unwrap();
            let mut env = WorldEnv::new(&mut next_pool, &catalog, &day);
            next.transition_to(report.resume_at, false, &mut env).unwrap();
            assert!(
                next.layout()
                    .live_entities(report.resume_at)
                    .iter()
                    .all(|e| e.state.id != victim)
            );
            graph = next;
            pool = next_pool;
        }
        assert!(pool.total_active() > 0);
    }

    #[test]
    fn dangling_entries_are_dropped() {
        let catalog = Catalog::builtin();
        let mut pool = InMemoryPool::new();
        let graph = walked_graph(&mut pool, &catalog, &[Direction::North]);
        let mut record = SaveRecord::export(&graph);

        record.links.push(LinkRecord {
            from: NodeIndex(1),
            direction: Direction::East,
            to: NodeIndex(9),
        });
        record.history.push(NodeIndex(9));
        record.snapshots.push(SnapshotRecord {
            node: NodeIndex(9),
            entities: Vec::new(),
        });
        record.nodes.push(NodeRecord {
            index: NodeIndex(1),
            region: RegionTypeId(1130),
        });
        record.current = NodeIndex(9);
        record.seal();

        let mut restored = empty_graph();
        let report = record
            .import_into(&mut restored, &mut InMemoryPool::new())
            .unwrap();
        assert_eq!(
            report.dropped,
            Dropped {
                nodes: 1,
                links: 1,
                history: 1,
                snapshots: 1,
                current: true,
            }
        );
        assert_eq!(report.resume_at, NodeIndex::HOME);
        assert_eq!(restored.links().len(), 2);
        assert_eq!(restored.history(), &[NodeIndex(0)]);
        assert_eq!(
            restored.node(NodeIndex(1)).and_then(|n| n.region),
            graph.node(NodeIndex(1)).and_then(|n| n.region)
        );
        assert!(restored.layout().snapshot_for(NodeIndex(9)).is_none());
    }

    #[test]
    fn record_survives_json() {
        let catalog = Catalog::builtin();
        let mut pool = InMemoryPool::new();
        let graph = walked_graph(&mut pool, &catalog, &[Direction::West]);
        let record = SaveRecord::export(&graph);
        let text = serde_json::to_string(&record).unwrap();
        let back: SaveRecord = serde_json::from_str(&text).unwrap();
        assert!(back.verify());
        assert_eq!(back, record);
    }
}
