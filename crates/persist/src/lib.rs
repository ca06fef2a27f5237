//! Persistence: flat save records and a file-backed save store.
//!
//! # Invariants
//! - Consumed entities are never written.
//! - A record whose hash or schema does not match is rejected before anything is rebuilt.
//! - Dangling entries are dropped individually; the rest of a record still loads.
//! - Store files are CBOR+zstd, chained by SHA-256 in the manifest.

pub mod record;
pub mod store;

pub use record::{
    Dropped, EntityRecord, ImportReport, LinkRecord, NodeRecord, PersistError,
    RECORD_SCHEMA_VERSION, SaveRecord, SnapshotRecord,
};
pub use store::{IntegrityManifest, ManifestEntry, SaveStore, StoreError, StoreMeta};

pub fn crate_info() -> &'static str {
    "mapgraph-persist v0.1.0"
}
