// src/state/mod.rs

pub mod model;
pub mod sink;
pub mod snapshot;
pub mod store;

pub use model::{ActionRecord, ExecutionState, TransitionMeta};
pub use sink::{FileSink, MemorySink, SnapshotSink};
pub use snapshot::{AuditEntry, PersistedVariable, SCHEMA_VERSION, Snapshot};
pub use store::{StateStore, check_snapshot};
