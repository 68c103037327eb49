//! Migration scheduler: asynchronous execution of admitted placements
//!
//! A fixed pool of long-lived workers drains a queue of admitted jobs.
//! Jobs for different artifacts race freely; per-artifact serialization is
//! enforced upstream at admission. A running transfer that exceeds three
//! times its estimate is failed by timeout, releasing its reservation the
//! same way an execution error would.

use crate::admission::{AdmissionController, AdmissionTicket};
use crate::job::{JobId, JobSnapshot, MigrationJob};
use crate::metrics;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Supervisory timeout: a job is failed after this many estimates elapse
const TIMEOUT_FACTOR: u32 = 3;
/// Floor for the timeout so near-zero estimates are not failed instantly
const MIN_TIMEOUT: Duration = Duration::from_secs(1);
/// How often the janitor prunes expired terminal jobs
const JANITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Duration estimate for moving `size_bytes` between tiers
///
/// Uses the more expensive of the two tiers' per-gigabyte costs; a
/// hot-load has no source side and is priced by the destination alone.
/// Pure so migration costs are testable without wall-clock delay.
pub fn estimate_transfer_duration(
    size_bytes: u64,
    source_cost_secs_per_gb: Option<f64>,
    dest_cost_secs_per_gb: f64,
) -> Duration {
    let cost = source_cost_secs_per_gb.map_or(dest_cost_secs_per_gb, |source| {
        source.max(dest_cost_secs_per_gb)
    });
    let gigabytes = size_bytes as f64 / 1e9;
    Duration::from_secs_f64((gigabytes * cost).max(0.0))
}

/// Everything an executor needs to move an artifact's bytes
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub artifact: String,
    pub size_bytes: u64,
    pub source: crate::job::JobSource,
    pub destination: String,
    pub estimated: Duration,
}

/// Trait for performing the actual data transfer of a migration
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Move the artifact's bytes into the destination tier
    async fn transfer(&self, request: &TransferRequest) -> Result<()>;
}

/// Production executor that models transfer latency from the cost estimate
pub struct SimulatedTransfer;

impl SimulatedTransfer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimulatedTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferExecutor for SimulatedTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<()> {
        tokio::time::sleep(request.estimated).await;
        Ok(())
    }
}

/// Lifecycle events emitted as jobs progress
#[derive(Debug, Clone)]
pub enum PlacementEvent {
    JobAccepted { job: JobId, artifact: String },
    JobStarted { job: JobId, artifact: String },
    JobSucceeded {
        job: JobId,
        artifact: String,
        tier: String,
    },
    JobFailed {
        job: JobId,
        artifact: String,
        error: String,
    },
}

struct SchedulerCore {
    admission: Arc<AdmissionController>,
    executor: Arc<dyn TransferExecutor>,
    jobs: DashMap<JobId, Arc<MigrationJob>>,
    event_tx: broadcast::Sender<PlacementEvent>,
    retention: Duration,
}

impl SchedulerCore {
    async fn run(&self, id: JobId) {
        let Some(job) = self.jobs.get(&id).map(|entry| entry.value().clone()) else {
            return;
        };
        if !job.mark_running() {
            return;
        }

        tracing::info!(
            job = %job.id,
            artifact = %job.artifact,
            source = %job.source,
            destination = %job.destination,
            estimated_secs = job.estimated.as_secs_f64(),
            "Migration started"
        );
        let _ = self.event_tx.send(PlacementEvent::JobStarted {
            job: job.id,
            artifact: job.artifact.clone(),
        });

        let request = TransferRequest {
            artifact: job.artifact.clone(),
            size_bytes: job.size_bytes,
            source: job.source.clone(),
            destination: job.destination.clone(),
            estimated: job.estimated,
        };
        let deadline = (job.estimated * TIMEOUT_FACTOR).max(MIN_TIMEOUT);

        match tokio::time::timeout(deadline, self.executor.transfer(&request)).await {
            Ok(Ok(())) => {
                // Commit before exposing the terminal status so a poller
                // never sees a succeeded job with the old tier still in
                // the catalog.
                self.admission.commit(
                    &job.artifact,
                    job.source.tier_id(),
                    &job.destination,
                    job.size_bytes,
                );
                job.mark_succeeded();

                tracing::info!(
                    job = %job.id,
                    artifact = %job.artifact,
                    tier = %job.destination,
                    "Migration succeeded"
                );
                metrics::record_job_succeeded(job.kind.as_str());
                let _ = self.event_tx.send(PlacementEvent::JobSucceeded {
                    job: job.id,
                    artifact: job.artifact.clone(),
                    tier: job.destination.clone(),
                });
            }
            Ok(Err(err)) => {
                self.fail(&job, format!("transfer failed: {err:#}"));
            }
            Err(_) => {
                self.fail(
                    &job,
                    format!(
                        "timed out after {:.1}s ({}x the {:.1}s estimate)",
                        deadline.as_secs_f64(),
                        TIMEOUT_FACTOR,
                        job.estimated.as_secs_f64()
                    ),
                );
            }
        }
    }

    fn fail(&self, job: &MigrationJob, error: String) {
        self.admission
            .release(&job.artifact, &job.destination, job.size_bytes);
        job.mark_failed(error.clone());

        tracing::warn!(
            job = %job.id,
            artifact = %job.artifact,
            destination = %job.destination,
            error = %error,
            "Migration failed"
        );
        metrics::record_job_failed(job.kind.as_str());
        let _ = self.event_tx.send(PlacementEvent::JobFailed {
            job: job.id,
            artifact: job.artifact.clone(),
            error,
        });
    }

    /// Drop terminal jobs older than the retention window
    fn sweep_expired(&self) {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return;
        };
        let cutoff = chrono::Utc::now() - retention;
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| job.finished_at().is_none_or(|finished| finished > cutoff));
        let pruned = before.saturating_sub(self.jobs.len());
        if pruned > 0 {
            tracing::debug!(pruned, retained = self.jobs.len(), "Expired jobs pruned");
        }
    }
}

/// Executes migration jobs on a worker pool with status tracking
pub struct MigrationScheduler {
    core: Arc<SchedulerCore>,
    queue_tx: parking_lot::Mutex<Option<mpsc::UnboundedSender<JobId>>>,
    next_id: AtomicU64,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl MigrationScheduler {
    /// Create a scheduler and spawn its workers; must run inside a Tokio
    /// runtime
    pub fn new(
        admission: Arc<AdmissionController>,
        executor: Arc<dyn TransferExecutor>,
        workers: usize,
        retention: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let core = Arc::new(SchedulerCore {
            admission,
            executor,
            jobs: DashMap::new(),
            event_tx,
            retention,
        });

        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));
        let mut tasks = Vec::with_capacity(workers + 1);
        for worker in 0..workers.max(1) {
            let core = core.clone();
            let queue_rx = queue_rx.clone();
            tasks.push(tokio::spawn(async move {
                tracing::debug!(worker, "Migration worker started");
                loop {
                    let next = { queue_rx.lock().await.recv().await };
                    match next {
                        Some(id) => core.run(id).await,
                        None => break,
                    }
                }
            }));
        }

        let janitor_core = core.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(JANITOR_INTERVAL);
            loop {
                ticker.tick().await;
                janitor_core.sweep_expired();
            }
        }));

        Self {
            core,
            queue_tx: parking_lot::Mutex::new(Some(queue_tx)),
            next_id: AtomicU64::new(1),
            tasks: parking_lot::Mutex::new(tasks),
        }
    }

    /// Turn an admission ticket into a pending job and enqueue it
    pub fn submit(&self, ticket: AdmissionTicket) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let job = Arc::new(MigrationJob::new(
            id,
            ticket.artifact,
            ticket.source,
            ticket.destination,
            ticket.kind,
            ticket.size_bytes,
            ticket.estimated,
        ));
        self.core.jobs.insert(id, job.clone());

        metrics::record_job_accepted(job.kind.as_str());
        let _ = self.core.event_tx.send(PlacementEvent::JobAccepted {
            job: id,
            artifact: job.artifact.clone(),
        });

        let enqueued = self
            .queue_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(id).is_ok());
        if !enqueued {
            // Workers are gone (shutdown); fail the job instead of leaving
            // a reservation stranded.
            self.core
                .fail(&job, "scheduler is shut down".to_string());
        }
        id
    }

    /// Snapshot a job by id; None once it expires from retention
    pub fn get_job(&self, id: JobId) -> Option<JobSnapshot> {
        self.core.jobs.get(&id).map(|entry| entry.value().snapshot())
    }

    /// Snapshots of all retained jobs, oldest first
    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<_> = self
            .core
            .jobs
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        jobs.sort_by_key(|snapshot| snapshot.id.0);
        jobs
    }

    /// Subscribe to job lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlacementEvent> {
        self.core.event_tx.subscribe()
    }

    /// Stop the workers and the janitor; queued jobs are abandoned
    pub fn shutdown(&self) {
        self.queue_tx.lock().take();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1_000_000_000;

    #[test]
    fn test_estimate_uses_more_expensive_side() {
        let est = estimate_transfer_duration(2 * GB, Some(0.1), 0.5);
        assert!((est.as_secs_f64() - 1.0).abs() < 1e-9);

        let est = estimate_transfer_duration(2 * GB, Some(0.5), 0.1);
        assert!((est.as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_for_hot_load_uses_destination() {
        let est = estimate_transfer_duration(10 * GB, None, 0.1);
        assert!((est.as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_scales_with_size() {
        let small = estimate_transfer_duration(GB, None, 0.5);
        let large = estimate_transfer_duration(4 * GB, None, 0.5);
        assert_eq!(large, small * 4);
        assert_eq!(estimate_transfer_duration(0, None, 0.5), Duration::ZERO);
    }
}
