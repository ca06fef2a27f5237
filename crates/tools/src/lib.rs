//! Developer tooling: read-only map graph inspector.
//!
//! # Invariants
//! - Inspection never mutates the graph.

pub mod inspector;

pub use inspector::{GraphInspector, GraphSummary, LinkInfo, NodeInfo};

pub fn crate_info() -> &'static str {
    "mapgraph-tools v0.1.0"
}
