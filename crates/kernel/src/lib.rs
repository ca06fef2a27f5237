//! Map graph kernel: lazily linked nodes, navigation history, activation
//! orchestration, and the transition driver.
//!
//! # Invariants
//! - Links are created in reciprocal pairs: `(a, d) -> b` implies `(b, opposite(d)) -> a`.
//! - At most one node holds a pooled region instance at any time.
//! - The node being left is snapshotted and released before the target is acquired.
//! - A failed transition leaves nodes, links, history and the current node unchanged.
//! - During night, without a recall override, no transition changes the current node.

pub mod config;
pub mod graph;
pub mod links;
pub mod modes;
pub mod navigator;
pub mod portal;

pub use config::{ConfigError, EngineConfig, GraphConfig, TransitionConfig};
pub use graph::{
    GraphError, GraphEvent, GraphState, MapGraph, MapNode, NodeState, TransitionOutcome, WorldEnv,
};
pub use links::{LinkTable, PortalSlots};
pub use modes::{FixedModes, ModeFlags, transitions_locked};
pub use navigator::{Navigator, Request, TransitionPhase};
pub use portal::{PortalResolver, Traversal};

pub fn crate_info() -> &'static str {
    "mapgraph-kernel v0.1.0"
}
