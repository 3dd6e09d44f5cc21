//! Backup Core Library
//!
//! Lifecycle orchestration for backup records: an in-memory record store, a
//! staged creation pipeline, asynchronous restore and delete operations, and
//! aggregate statistics derived from the store.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod store;
pub mod tracker;
pub mod utils;

// Re-export commonly used types
pub use aggregate::{Aggregates, BucketBy, Overview, StatusDistribution, TrendPoint};
pub use clock::{Clock, TokioClock};
pub use config::Config;
pub use events::{BackupEvent, BroadcastSink, EventKind, EventPayload, NotificationSink, OperationKind};
pub use model::{Backup, BackupDetails, BackupId, BackupPatch, BackupStatus, BackupType};
pub use orchestrator::{CreateBackupRequest, Orchestrator, OrchestratorSettings};
pub use pipeline::{BackupPipeline, PipelineError, SimulatedPipeline, StageUpdate};
pub use store::BackupStore;
pub use tracker::{OperationId, OperationInfo, OperationTracker};
pub use utils::errors::CoreError;
pub type Result<T> = std::result::Result<T, CoreError>;
