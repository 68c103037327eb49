//! Placement API façade
//!
//! The only entry point external collaborators use: status queries, tier
//! changes, hot-loads, and optimization all go through here. Synchronous
//! operations return in bounded time; tier changes return a job id
//! immediately and complete in the background.

use crate::admission::AdmissionController;
use crate::catalog::{ArtifactCatalog, ArtifactSnapshot, TierAssignment};
use crate::config::{ManagerConfig, OptimizerConfig};
use crate::error::{PlacementError, PlacementResult};
use crate::job::{JobId, JobSnapshot};
use crate::optimize::{self, OptimizeOutcome};
use crate::scheduler::{
    MigrationScheduler, PlacementEvent, SimulatedTransfer, TransferExecutor,
};
use crate::tier::{TierRegistry, TierUsage};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Combined per-tier and per-artifact view for status queries
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub tiers: Vec<TierUsage>,
    pub artifacts: Vec<ArtifactSnapshot>,
}

/// Tiered placement manager for model artifacts
pub struct PlacementManager {
    registry: Arc<TierRegistry>,
    catalog: Arc<ArtifactCatalog>,
    admission: Arc<AdmissionController>,
    scheduler: Arc<MigrationScheduler>,
    optimizer: OptimizerConfig,
}

impl PlacementManager {
    /// Build a manager with the simulated transfer executor
    ///
    /// Must be called within a Tokio runtime; the scheduler spawns its
    /// worker pool on construction.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_executor(config, Arc::new(SimulatedTransfer::new()))
    }

    /// Build a manager with a custom transfer executor
    pub fn with_executor(
        config: ManagerConfig,
        executor: Arc<dyn TransferExecutor>,
    ) -> Result<Self> {
        config.validate().context("Invalid manager configuration")?;

        let registry = Arc::new(TierRegistry::new(config.tiers));
        let catalog = Arc::new(ArtifactCatalog::new(registry.clone()));
        let admission = Arc::new(AdmissionController::new(registry.clone(), catalog.clone()));
        let scheduler = Arc::new(MigrationScheduler::new(
            admission.clone(),
            executor,
            config.scheduler.workers,
            Duration::from_secs(config.scheduler.job_retention_secs),
        ));

        let manager = Self {
            registry,
            catalog,
            admission,
            scheduler,
            optimizer: config.optimizer,
        };

        for seed in config.artifacts {
            manager.seed_artifact(&seed.name, seed.size_bytes, seed.tier_hint, seed.capabilities)?;
        }

        tracing::info!(
            tiers = manager.registry.tier_count(),
            artifacts = manager.catalog.len(),
            "Placement manager initialized"
        );

        Ok(manager)
    }

    /// Register a startup artifact and commit its initial tier directly
    ///
    /// Runs before any job can be in flight, so the placement bypasses the
    /// job machinery but uses the same capacity arithmetic. An artifact no
    /// tier can hold stays registered as unmanaged.
    fn seed_artifact(
        &self,
        name: &str,
        size_bytes: u64,
        tier_hint: Option<String>,
        capabilities: Vec<String>,
    ) -> Result<()> {
        let artifact = self
            .catalog
            .register(name, size_bytes, capabilities)
            .with_context(|| format!("Failed to seed artifact '{name}'"))?;

        if !self.registry.fits_any_tier(size_bytes) {
            return Ok(());
        }

        let mut candidates = Vec::new();
        if let Some(hint) = tier_hint {
            candidates.push(hint);
        }
        for id in self.registry.ids() {
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }

        for id in candidates {
            let Some(tier) = self.registry.get(&id) else {
                continue;
            };
            if !tier.accepts_artifact_size(size_bytes) {
                continue;
            }
            if self.registry.commit_seed(&id, size_bytes).is_ok() {
                artifact.set_tier(TierAssignment::Assigned(id.clone()));
                tracing::info!(artifact = %name, tier = %id, size_bytes, "Artifact seeded");
                return Ok(());
            }
        }

        tracing::warn!(
            artifact = %name,
            size_bytes,
            "No tier has room for seeded artifact; leaving unmanaged"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Synchronous queries
    // ------------------------------------------------------------------

    /// Per-tier utilization and per-artifact location
    pub fn status(&self) -> StatusReport {
        StatusReport {
            generated_at: Utc::now(),
            tiers: self.registry.usage_all(),
            artifacts: self.catalog.snapshot_all(),
        }
    }

    /// Catalog snapshot in registration order
    pub fn list_artifacts(&self) -> Vec<ArtifactSnapshot> {
        self.catalog.snapshot_all()
    }

    pub fn get_artifact(&self, name: &str) -> Option<ArtifactSnapshot> {
        self.catalog.get(name).map(|artifact| artifact.snapshot())
    }

    /// Committed tier of an artifact; `Ok(None)` means unmanaged, which
    /// callers must treat as "cannot serve"
    pub fn current_tier(&self, name: &str) -> PlacementResult<Option<String>> {
        self.catalog
            .get(name)
            .map(|artifact| artifact.current_tier())
            .ok_or_else(|| PlacementError::UnknownArtifact {
                name: name.to_string(),
            })
    }

    /// Bump an artifact's usage statistics; false if unknown
    ///
    /// Cheap and non-blocking so the serving path can call it on every use.
    pub fn record_access(&self, name: &str) -> bool {
        self.catalog.record_access(name)
    }

    /// Snapshot of a migration job; None once it expires from retention
    pub fn get_job(&self, id: JobId) -> Option<JobSnapshot> {
        self.scheduler.get_job(id)
    }

    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        self.scheduler.list_jobs()
    }

    /// Subscribe to job lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlacementEvent> {
        self.scheduler.subscribe_events()
    }

    /// Among artifacts carrying the capability tag, pick the best to serve
    ///
    /// Prefers the fastest tier, then the highest access count, then name.
    /// Unmanaged artifacts are returned only when nothing placed matches.
    pub fn find_for_capability(&self, tag: &str) -> Option<ArtifactSnapshot> {
        let mut matches: Vec<ArtifactSnapshot> = self
            .catalog
            .snapshot_all()
            .into_iter()
            .filter(|snap| snap.capabilities.iter().any(|c| c == tag))
            .collect();
        matches.sort_by(|a, b| {
            let rank = |snap: &ArtifactSnapshot| {
                snap.tier
                    .as_deref()
                    .and_then(|id| self.registry.rank(id))
                    .unwrap_or(usize::MAX)
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| b.access_count.cmp(&a.access_count))
                .then_with(|| a.name.cmp(&b.name))
        });
        matches.into_iter().next()
    }

    // ------------------------------------------------------------------
    // Asynchronous-triggering operations
    // ------------------------------------------------------------------

    /// Request a tier change; returns the job id or an immediate rejection
    pub fn move_artifact(&self, name: &str, destination: &str) -> PlacementResult<JobId> {
        let ticket = self.admission.admit(name, destination)?;
        Ok(self.scheduler.submit(ticket))
    }

    /// Register a new artifact at runtime and place it via a hot-load job
    ///
    /// With a tier hint only that tier is tried; otherwise tiers are tried
    /// fastest-first and the last rejection is returned if none admit. On
    /// rejection the artifact stays registered but unmanaged; a later
    /// `move_artifact` can still place it.
    pub fn hot_load(
        &self,
        name: &str,
        size_bytes: u64,
        tier_hint: Option<&str>,
        capabilities: Vec<String>,
    ) -> PlacementResult<JobId> {
        if let Some(hint) = tier_hint
            && self.registry.get(hint).is_none()
        {
            return Err(PlacementError::UnknownTier {
                id: hint.to_string(),
            });
        }

        self.catalog.register(name, size_bytes, capabilities)?;

        if let Some(hint) = tier_hint {
            return self.move_artifact(name, hint);
        }

        let mut result = Err(PlacementError::UnknownTier {
            id: "(none configured)".to_string(),
        });
        for id in self.registry.ids() {
            match self.move_artifact(name, &id) {
                Ok(job) => return Ok(job),
                Err(err) => result = Err(err),
            }
        }
        result
    }

    /// Convenience wrapper: request a move and poll the job to completion
    pub async fn move_and_wait(
        &self,
        name: &str,
        destination: &str,
        poll_interval: Duration,
    ) -> PlacementResult<JobSnapshot> {
        let id = self.move_artifact(name, destination)?;
        loop {
            let snapshot = self
                .get_job(id)
                .ok_or(PlacementError::JobNotFound { id })?;
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Re-optimize placement from observed access patterns
    ///
    /// Every proposal goes through the normal admission path; the outcome
    /// list carries the same accepts/rejects a manual caller would get.
    pub fn optimize(&self) -> Vec<OptimizeOutcome> {
        let actions = optimize::plan(&self.registry, &self.catalog, &self.optimizer);
        tracing::info!(proposals = actions.len(), "Optimization pass planned");

        actions
            .into_iter()
            .map(|action| {
                let result = self.move_artifact(&action.artifact, &action.destination);
                OptimizeOutcome { action, result }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Operations and lifecycle
    // ------------------------------------------------------------------

    /// Adjust a tier's capacity and margin at runtime
    pub fn update_tier_limits(
        &self,
        id: &str,
        new_capacity_bytes: u64,
        new_margin_bytes: u64,
    ) -> PlacementResult<()> {
        self.registry
            .update_limits(id, new_capacity_bytes, new_margin_bytes)
    }

    /// Stop background workers; pending jobs are abandoned
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        tracing::info!("Placement manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArtifactSeed, SchedulerConfig};
    use crate::job::JobStatus;
    use crate::scheduler::mocks::MockTransfer;
    use crate::tier::TierConfig;

    const GB: u64 = 1_000_000_000;
    const POLL: Duration = Duration::from_millis(10);

    fn tier(id: &str, capacity: u64, margin: u64, cost: f64) -> TierConfig {
        TierConfig {
            id: id.to_string(),
            capacity_bytes: capacity,
            reserved_margin_bytes: margin,
            cost_secs_per_gb: cost,
            max_artifact_bytes: None,
            capacity_floor_bytes: 0,
        }
    }

    fn seed(name: &str, size: u64, hint: Option<&str>, capabilities: &[&str]) -> ArtifactSeed {
        ArtifactSeed {
            name: name.to_string(),
            size_bytes: size,
            tier_hint: hint.map(str::to_string),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn base_config() -> ManagerConfig {
        ManagerConfig {
            tiers: vec![
                tier("fast", 6 * GB, GB, 0.1),
                tier("slow", 10 * GB, 0, 0.5),
            ],
            artifacts: vec![
                seed("m1", 2 * GB, Some("fast"), &["code-generation"]),
                seed("m2", 5 * GB, Some("slow"), &["speech-to-text"]),
            ],
            scheduler: SchedulerConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }

    fn mock_manager(config: ManagerConfig) -> (PlacementManager, Arc<MockTransfer>) {
        let executor = Arc::new(MockTransfer::new());
        let manager = PlacementManager::with_executor(config, executor.clone()).unwrap();
        (manager, executor)
    }

    async fn wait_terminal(manager: &PlacementManager, id: JobId) -> JobSnapshot {
        for _ in 0..1000 {
            if let Some(snapshot) = manager.get_job(id)
                && snapshot.status.is_terminal()
            {
                return snapshot;
            }
            tokio::time::sleep(POLL).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn test_seeding_honors_hints_and_capacity() {
        let (manager, _) = mock_manager(base_config());

        assert_eq!(manager.current_tier("m1").unwrap().as_deref(), Some("fast"));
        assert_eq!(manager.current_tier("m2").unwrap().as_deref(), Some("slow"));

        let status = manager.status();
        assert_eq!(status.tiers[0].committed_bytes, 2 * GB);
        assert_eq!(status.tiers[1].committed_bytes, 5 * GB);
        assert_eq!(status.artifacts.len(), 2);
    }

    #[tokio::test]
    async fn test_seed_falls_back_when_hint_is_full() {
        let mut config = base_config();
        // Hinted at fast (5 GB budget) but m1 already takes 2 GB there;
        // a 4 GB artifact must fall back to slow.
        config
            .artifacts
            .push(seed("m3", 4 * GB, Some("fast"), &[]));
        let (manager, _) = mock_manager(config);

        assert_eq!(manager.current_tier("m3").unwrap().as_deref(), Some("slow"));
    }

    #[tokio::test]
    async fn test_oversized_seed_left_unmanaged() {
        let mut config = base_config();
        config.artifacts.push(seed("m3", 20 * GB, None, &[]));
        let (manager, _) = mock_manager(config);

        assert_eq!(manager.current_tier("m3").unwrap(), None);
        // Unknown artifacts are a distinct condition
        assert_eq!(
            manager.current_tier("m4").unwrap_err().reason_code(),
            "unknown_artifact"
        );
    }

    #[tokio::test]
    async fn test_move_commits_only_on_success() {
        let (manager, _) = mock_manager(base_config());

        let job = manager.move_artifact("m1", "slow").unwrap();
        let snapshot = wait_terminal(&manager, job).await;

        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.progress, 1.0);
        assert_eq!(manager.current_tier("m1").unwrap().as_deref(), Some("slow"));

        let status = manager.status();
        assert_eq!(status.tiers[0].committed_bytes, 0);
        assert_eq!(status.tiers[1].committed_bytes, 7 * GB);
        assert_eq!(status.tiers[1].reserved_bytes, 0);
    }

    #[tokio::test]
    async fn test_failed_move_leaves_previous_state() {
        let (manager, executor) = mock_manager(base_config());
        executor.set_fail("storage unreachable");

        let job = manager.move_artifact("m1", "slow").unwrap();
        let snapshot = wait_terminal(&manager, job).await;

        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.error.as_deref().unwrap().contains("storage unreachable"));
        // Tier unchanged, reservation released
        assert_eq!(manager.current_tier("m1").unwrap().as_deref(), Some("fast"));
        let status = manager.status();
        assert_eq!(status.tiers[1].committed_bytes, 5 * GB);
        assert_eq!(status.tiers[1].reserved_bytes, 0);

        // The artifact is movable again after the failure
        executor.set_succeed();
        manager.move_artifact("m1", "slow").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_transfer_fails_at_three_times_estimate() {
        let (manager, executor) = mock_manager(base_config());
        executor.set_hang();

        // 2 GB at max(0.1, 0.5) s/GB = 1s estimate, 3s timeout
        let job = manager.move_artifact("m1", "slow").unwrap();
        let snapshot = wait_terminal(&manager, job).await;

        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(manager.current_tier("m1").unwrap().as_deref(), Some("fast"));
        assert_eq!(manager.status().tiers[1].reserved_bytes, 0);
    }

    #[tokio::test]
    async fn test_single_flight_per_artifact() {
        let (manager, executor) = mock_manager(base_config());
        executor.set_hang();

        let manager = Arc::new(manager);
        let (first, second) = std::thread::scope(|scope| {
            let a = {
                let manager = manager.clone();
                scope.spawn(move || manager.move_artifact("m1", "slow"))
            };
            let b = {
                let manager = manager.clone();
                scope.spawn(move || manager.move_artifact("m1", "slow"))
            };
            (a.join().unwrap(), b.join().unwrap())
        });

        let accepted = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        let rejection = [first, second]
            .into_iter()
            .find_map(|r| r.err())
            .unwrap();
        assert_eq!(
            rejection,
            PlacementError::AlreadyInProgress {
                name: "m1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_round_trip_preserves_artifact_fields() {
        let (manager, _) = mock_manager(base_config());
        manager.record_access("m1");
        manager.record_access("m1");
        let before = manager.get_artifact("m1").unwrap();

        let done = manager
            .move_and_wait("m1", "slow", POLL)
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        let done = manager
            .move_and_wait("m1", "fast", POLL)
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);

        let after = manager.get_artifact("m1").unwrap();
        assert_eq!(after.tier.as_deref(), Some("fast"));
        assert_eq!(after.size_bytes, before.size_bytes);
        assert_eq!(after.capabilities, before.capabilities);
        assert_eq!(after.access_count, before.access_count);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_hot_load_with_hint() {
        let (manager, _) = mock_manager(base_config());

        let job = manager
            .hot_load("m3", GB, Some("fast"), vec!["tool-calling".to_string()])
            .unwrap();
        // Visible immediately as unmanaged: the tier commits on success only
        assert_eq!(manager.current_tier("m3").unwrap(), None);

        let snapshot = wait_terminal(&manager, job).await;
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.kind, crate::job::JobKind::HotLoad);
        assert_eq!(manager.current_tier("m3").unwrap().as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn test_hot_load_falls_back_across_tiers() {
        let (manager, _) = mock_manager(base_config());

        // 4 GB does not fit fast's remaining 3 GB budget; slow admits it.
        let job = manager.hot_load("m3", 4 * GB, None, vec![]).unwrap();
        let snapshot = wait_terminal(&manager, job).await;
        assert_eq!(snapshot.destination, "slow");
        assert_eq!(manager.current_tier("m3").unwrap().as_deref(), Some("slow"));
    }

    #[tokio::test]
    async fn test_hot_load_rejections() {
        let (manager, _) = mock_manager(base_config());

        let err = manager.hot_load("m1", GB, None, vec![]).unwrap_err();
        assert_eq!(err.reason_code(), "duplicate_artifact");

        let err = manager.hot_load("m3", GB, Some("warp"), vec![]).unwrap_err();
        assert_eq!(err.reason_code(), "unknown_tier");

        // Nothing admits 20 GB; the artifact stays registered but unmanaged
        let err = manager.hot_load("m4", 20 * GB, None, vec![]).unwrap_err();
        assert_eq!(err.reason_code(), "capacity_exceeded");
        assert_eq!(manager.current_tier("m4").unwrap(), None);
    }

    #[tokio::test]
    async fn test_scenario_two_tier_shuffle() {
        // Tier "fast" 6 GB with 1 GB margin, tier "slow" 10 GB: m2 cannot
        // join m1 in fast (2 + 5 > 5), but after m1 moves out it can.
        let (manager, _) = mock_manager(base_config());

        let err = manager.move_artifact("m2", "fast").unwrap_err();
        assert_eq!(
            err,
            PlacementError::CapacityExceeded {
                tier: "fast".to_string(),
                requested_bytes: 5 * GB,
                available_bytes: 3 * GB,
            }
        );

        let done = manager.move_and_wait("m1", "slow", POLL).await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        let done = manager.move_and_wait("m2", "fast", POLL).await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);

        assert_eq!(manager.current_tier("m2").unwrap().as_deref(), Some("fast"));
        assert_eq!(manager.current_tier("m1").unwrap().as_deref(), Some("slow"));
        let status = manager.status();
        assert_eq!(status.tiers[0].committed_bytes, 5 * GB);
        assert_eq!(status.tiers[1].committed_bytes, 2 * GB);
    }

    #[tokio::test]
    async fn test_optimize_promotes_hot_artifact() {
        let (manager, _) = mock_manager(base_config());
        for _ in 0..10 {
            manager.record_access("m2");
        }
        // m2 (5 GB) cannot fit fast while m1 holds 2 GB; move m1 out first
        manager.move_and_wait("m1", "slow", POLL).await.unwrap();

        let outcomes = manager.optimize();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].action.artifact, "m2");
        assert_eq!(outcomes[0].action.destination, "fast");
        let job = outcomes[0].result.as_ref().unwrap();
        let snapshot = wait_terminal(&manager, *job).await;
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(manager.current_tier("m2").unwrap().as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn test_optimize_accepts_nothing_at_capacity() {
        // Both tiers filled to their exact budgets
        let config = ManagerConfig {
            tiers: vec![
                tier("fast", 6 * GB, GB, 0.1),
                tier("slow", 10 * GB, 0, 0.5),
            ],
            artifacts: vec![
                seed("a", 5 * GB, Some("fast"), &[]),
                seed("b", 6 * GB, Some("slow"), &[]),
                seed("c", 4 * GB, Some("slow"), &[]),
            ],
            scheduler: SchedulerConfig::default(),
            optimizer: OptimizerConfig::default(),
        };
        let (manager, _) = mock_manager(config);
        for _ in 0..20 {
            manager.record_access("b");
            manager.record_access("c");
        }

        let outcomes = manager.optimize();
        assert!(outcomes.iter().all(|o| o.result.is_err()));

        // The capacity invariant holds for every tier afterwards
        for usage in manager.status().tiers {
            assert!(usage.committed_bytes + usage.reserved_bytes <= usage.budget_bytes);
        }
    }

    #[tokio::test]
    async fn test_concurrent_moves_never_overflow_tier() {
        let config = ManagerConfig {
            tiers: vec![
                tier("fast", 6 * GB, GB, 0.1),
                tier("slow", 30 * GB, 0, 0.5),
            ],
            artifacts: (0..6)
                .map(|i| seed(&format!("m{i}"), 2 * GB, Some("slow"), &[]))
                .collect(),
            scheduler: SchedulerConfig::default(),
            optimizer: OptimizerConfig::default(),
        };
        let (manager, _) = mock_manager(config);
        let manager = Arc::new(manager);

        // fast's 5 GB budget admits at most two of the six 2 GB artifacts
        let accepted: Vec<JobId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|i| {
                    let manager = manager.clone();
                    scope.spawn(move || manager.move_artifact(&format!("m{i}"), "fast"))
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().unwrap().ok())
                .collect()
        });
        assert_eq!(accepted.len(), 2);

        for id in accepted {
            let snapshot = wait_terminal(&manager, id).await;
            assert_eq!(snapshot.status, JobStatus::Succeeded);
        }
        let usage = &manager.status().tiers[0];
        assert_eq!(usage.committed_bytes, 4 * GB);
        assert!(usage.committed_bytes + usage.reserved_bytes <= usage.budget_bytes);
    }

    #[tokio::test]
    async fn test_limit_update_serialized_with_admission() {
        let (manager, _) = mock_manager(base_config());

        // Shrinking below committed usage is rejected
        let err = manager.update_tier_limits("fast", GB, 0).unwrap_err();
        assert_eq!(err.reason_code(), "limit_below_committed");

        // Shrinking to exactly the committed usage is allowed, after which
        // a new admission sees the reduced budget
        manager.update_tier_limits("fast", 2 * GB, 0).unwrap();
        let err = manager.move_artifact("m2", "fast").unwrap_err();
        assert_eq!(err.reason_code(), "capacity_exceeded");
    }

    #[tokio::test]
    async fn test_events_follow_job_lifecycle() {
        let (manager, _) = mock_manager(base_config());
        let mut events = manager.subscribe_events();

        let job = manager.move_artifact("m1", "slow").unwrap();
        wait_terminal(&manager, job).await;

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(match event {
                PlacementEvent::JobAccepted { .. } => "accepted",
                PlacementEvent::JobStarted { .. } => "started",
                PlacementEvent::JobSucceeded { .. } => "succeeded",
                PlacementEvent::JobFailed { .. } => "failed",
            });
        }
        assert_eq!(kinds, vec!["accepted", "started", "succeeded"]);
    }

    #[tokio::test]
    async fn test_find_for_capability_prefers_fast_tier() {
        let mut config = base_config();
        config.artifacts.push(seed(
            "m3",
            GB,
            Some("slow"),
            &["code-generation"],
        ));
        let (manager, _) = mock_manager(config);
        for _ in 0..50 {
            manager.record_access("m3");
        }

        // m1 sits in the faster tier and wins despite fewer accesses
        let best = manager.find_for_capability("code-generation").unwrap();
        assert_eq!(best.name, "m1");

        assert_eq!(manager.find_for_capability("image-generation"), None);
    }

    #[tokio::test]
    async fn test_list_jobs_ordered_by_id() {
        let (manager, _) = mock_manager(base_config());

        let first = manager.move_artifact("m1", "slow").unwrap();
        wait_terminal(&manager, first).await;
        let second = manager.move_artifact("m1", "fast").unwrap();
        wait_terminal(&manager, second).await;

        let jobs = manager.list_jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, first);
        assert_eq!(jobs[1].id, second);
        assert!(jobs.iter().all(|j| j.status == JobStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_shutdown_fails_new_submissions_cleanly() {
        let (manager, _) = mock_manager(base_config());
        manager.shutdown();

        let job = manager.move_artifact("m1", "slow").unwrap();
        let snapshot = wait_terminal(&manager, job).await;
        assert_eq!(snapshot.status, JobStatus::Failed);
        // The reservation is not stranded
        assert_eq!(manager.status().tiers[1].reserved_bytes, 0);
    }
}
