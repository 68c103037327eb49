//! Error taxonomy for placement and migration operations

use crate::job::JobId;
use thiserror::Error;

/// Result alias used across the placement API
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Synchronous, recoverable-by-caller rejections
///
/// Admission and configuration rejections are returned, never thrown as
/// fatal. Job execution failures do not appear here; they are captured on
/// the job record and surfaced only through status polling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("artifact '{name}' is not registered")]
    UnknownArtifact { name: String },

    #[error("tier '{id}' is not configured")]
    UnknownTier { id: String },

    #[error("artifact '{name}' is already in tier '{tier}'")]
    ArtifactAlreadyInTier { name: String, tier: String },

    #[error(
        "artifact '{name}' ({size_bytes} bytes) exceeds the {max_artifact_bytes} byte \
         per-artifact limit of tier '{tier}'"
    )]
    ArtifactTooLargeForTier {
        name: String,
        tier: String,
        size_bytes: u64,
        max_artifact_bytes: u64,
    },

    #[error(
        "tier '{tier}' cannot hold {requested_bytes} more bytes \
         ({available_bytes} bytes of budget left)"
    )]
    CapacityExceeded {
        tier: String,
        requested_bytes: u64,
        available_bytes: u64,
    },

    #[error("artifact '{name}' already has a migration in flight")]
    AlreadyInProgress { name: String },

    #[error("artifact '{name}' is already registered")]
    DuplicateArtifact { name: String },

    #[error("tier '{tier}' capacity cannot drop below its {floor_bytes} byte floor")]
    LimitBelowFloor { tier: String, floor_bytes: u64 },

    #[error(
        "tier '{tier}' budget cannot drop below {in_use_bytes} bytes of \
         committed and reserved usage"
    )]
    LimitBelowCommitted { tier: String, in_use_bytes: u64 },

    #[error("reserved margin {margin_bytes} exceeds capacity {capacity_bytes} for tier '{tier}'")]
    MarginExceedsCapacity {
        tier: String,
        margin_bytes: u64,
        capacity_bytes: u64,
    },

    #[error("{id} is not retained (it may have expired from the job log)")]
    JobNotFound { id: JobId },
}

impl PlacementError {
    /// Stable machine-readable reason code for front-ends
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownArtifact { .. } => "unknown_artifact",
            Self::UnknownTier { .. } => "unknown_tier",
            Self::ArtifactAlreadyInTier { .. } => "artifact_already_in_tier",
            Self::ArtifactTooLargeForTier { .. } => "artifact_too_large_for_tier",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::AlreadyInProgress { .. } => "already_in_progress",
            Self::DuplicateArtifact { .. } => "duplicate_artifact",
            Self::LimitBelowFloor { .. } => "limit_below_floor",
            Self::LimitBelowCommitted { .. } => "limit_below_committed",
            Self::MarginExceedsCapacity { .. } => "margin_exceeds_capacity",
            Self::JobNotFound { .. } => "job_not_found",
        }
    }
}
