//! Migration job records and snapshots

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Identifier for a migration job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{:06}", self.0)
    }
}

/// What kind of placement change a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Promote,
    Demote,
    HotLoad,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::HotLoad => "hot_load",
        }
    }
}

/// Where the bytes come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    /// A configured tier
    Tier(String),
    /// Outside the managed tiers entirely (hot-load insertion)
    External,
}

impl JobSource {
    pub fn tier_id(&self) -> Option<&str> {
        match self {
            Self::Tier(id) => Some(id),
            Self::External => None,
        }
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(id) => write!(f, "{id}"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Job lifecycle status; transitions are monotonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    started: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    progress: f64,
    error: Option<String>,
}

/// An asynchronous tier migration or hot-load insertion
///
/// Status moves `pending -> running -> {succeeded, failed}` and never
/// leaves a terminal state; snapshots of a terminal job are frozen.
pub struct MigrationJob {
    pub id: JobId,
    pub artifact: String,
    pub source: JobSource,
    pub destination: String,
    pub kind: JobKind,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub estimated: Duration,
    state: RwLock<JobState>,
}

impl MigrationJob {
    pub(crate) fn new(
        id: JobId,
        artifact: String,
        source: JobSource,
        destination: String,
        kind: JobKind,
        size_bytes: u64,
        estimated: Duration,
    ) -> Self {
        Self {
            id,
            artifact,
            source,
            destination,
            kind,
            size_bytes,
            created_at: Utc::now(),
            estimated,
            state: RwLock::new(JobState {
                status: JobStatus::Pending,
                started: None,
                started_at: None,
                finished_at: None,
                progress: 0.0,
                error: None,
            }),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.read().status
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().finished_at
    }

    /// Transition pending -> running; false from any other state
    pub(crate) fn mark_running(&self) -> bool {
        let mut state = self.state.write();
        if state.status != JobStatus::Pending {
            return false;
        }
        state.status = JobStatus::Running;
        state.started = Some(Instant::now());
        state.started_at = Some(Utc::now());
        true
    }

    /// Transition into succeeded; false if already terminal
    pub(crate) fn mark_succeeded(&self) -> bool {
        let mut state = self.state.write();
        if state.status.is_terminal() {
            return false;
        }
        state.status = JobStatus::Succeeded;
        state.progress = 1.0;
        state.finished_at = Some(Utc::now());
        true
    }

    /// Transition into failed with an error detail; false if already terminal
    pub(crate) fn mark_failed(&self, error: String) -> bool {
        let mut state = self.state.write();
        if state.status.is_terminal() {
            return false;
        }
        state.progress = Self::live_progress(&state, self.estimated);
        state.status = JobStatus::Failed;
        state.error = Some(error);
        state.finished_at = Some(Utc::now());
        true
    }

    /// Elapsed-over-estimate while running, frozen value otherwise
    fn live_progress(state: &JobState, estimated: Duration) -> f64 {
        match (state.status, state.started) {
            (JobStatus::Running, Some(started)) => {
                if estimated.is_zero() {
                    return 1.0;
                }
                (started.elapsed().as_secs_f64() / estimated.as_secs_f64()).min(1.0)
            }
            _ => state.progress,
        }
    }

    /// Point-in-time view; byte-stable once the job is terminal
    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.state.read();
        JobSnapshot {
            id: self.id,
            artifact: self.artifact.clone(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            kind: self.kind,
            status: state.status,
            progress: Self::live_progress(&state, self.estimated),
            created_at: self.created_at,
            started_at: state.started_at,
            finished_at: state.finished_at,
            estimated_secs: self.estimated.as_secs_f64(),
            error: state.error.clone(),
        }
    }
}

/// Serializable view of a migration job for status polling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub artifact: String,
    pub source: JobSource,
    pub destination: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub estimated_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
