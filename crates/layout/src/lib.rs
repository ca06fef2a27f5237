//! Resource layout: spawn-cell grid, weighted placement, snapshot and restore.
//!
//! # Invariants
//! - A node has at most one live entity set at a time.
//! - A consumed entity is never re-materialized.
//! - The newest snapshot of a node always wins.
//!
//! Placement is intentionally non-deterministic per materialization; tests
//! seed the engine to make it reproducible.

mod drops;
mod engine;
mod entity;
mod grid;

pub use drops::roll_drop_amount;
pub use engine::{Activation, LayoutConfig, LayoutEngine, LayoutError, NodeArea, PopulateReport};
pub use entity::{DropYield, LiveEntity, MineOutcome, Strike};
pub use grid::{CellCoord, ExclusionGrid, spawn_cells};

pub fn crate_info() -> &'static str {
    "mapgraph-layout v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("layout"));
    }
}
