//! Tier Manager - Tiered placement for large model artifacts
//!
//! A library that decides which storage tier each named model artifact
//! occupies on a memory-constrained host, admits placement requests
//! against hard capacity limits, executes tier-to-tier migrations and
//! hot-load insertions as asynchronous jobs, and re-optimizes placement
//! from observed access patterns. Catalog reads, status queries, and
//! admission decisions never block on migration activity.

pub mod admission;
pub mod catalog;
pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod metrics;
pub mod optimize;
pub mod scheduler;
pub mod tier;

pub use admission::{AdmissionController, AdmissionTicket};
pub use catalog::{Artifact, ArtifactCatalog, ArtifactSnapshot, TierAssignment};
pub use config::{ArtifactSeed, ManagerConfig, OptimizerConfig, SchedulerConfig};
pub use error::{PlacementError, PlacementResult};
pub use job::{JobId, JobKind, JobSnapshot, JobSource, JobStatus, MigrationJob};
pub use manager::{PlacementManager, StatusReport};
pub use optimize::{OptimizeOutcome, PlacementAction};
pub use scheduler::{
    MigrationScheduler, PlacementEvent, SimulatedTransfer, TransferExecutor, TransferRequest,
    estimate_transfer_duration,
};
pub use tier::{TierConfig, TierRegistry, TierUsage};
