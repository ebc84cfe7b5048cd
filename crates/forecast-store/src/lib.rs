//! # Forecast Store
//!
//! The durable archive of forecast snapshots.
//!
//! - `SnapshotStore`: the storage contract the pipeline writes through. Snapshots
//!   are listed oldest first and are never modified once written.
//! - `FileStore`: one pretty-printed JSON file per forecast in a directory.
//! - `RetentionManager`: keeps the store at or below its maximum snapshot count.
//! - `StoreError`: the error type returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod retention;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use error::StoreError;
pub use retention::{PruneReport, RetentionManager};
pub use store::{FileStore, SnapshotId, SnapshotStore};
