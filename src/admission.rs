//! Admission control: the check-and-reserve step gating every tier change
//!
//! Capacity is reserved at acceptance time and released only when the job
//! reaches a terminal state, so committed plus in-flight usage per tier
//! never exceeds the tier's budget. At most one job per artifact may be in
//! flight; a second request is rejected rather than queued.

use crate::catalog::{ArtifactCatalog, TierAssignment};
use crate::error::{PlacementError, PlacementResult};
use crate::job::{JobKind, JobSource};
use crate::metrics;
use crate::scheduler::estimate_transfer_duration;
use crate::tier::TierRegistry;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Proof of a successful check-and-reserve, consumed by the scheduler
#[derive(Debug, Clone)]
pub struct AdmissionTicket {
    pub artifact: String,
    pub size_bytes: u64,
    pub source: JobSource,
    pub destination: String,
    pub kind: JobKind,
    pub estimated: Duration,
}

/// Validates and commits placement requests against capacity constraints
pub struct AdmissionController {
    registry: Arc<TierRegistry>,
    catalog: Arc<ArtifactCatalog>,
    in_flight: Mutex<HashSet<String>>,
}

impl AdmissionController {
    pub fn new(registry: Arc<TierRegistry>, catalog: Arc<ArtifactCatalog>) -> Self {
        Self {
            registry,
            catalog,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Validate a placement request and reserve destination capacity
    ///
    /// Rejection order: unknown artifact, unknown tier, already in tier,
    /// too large for the tier, already in progress, capacity exceeded.
    pub fn admit(&self, name: &str, destination: &str) -> PlacementResult<AdmissionTicket> {
        let result = self.admit_inner(name, destination);
        if let Err(err) = &result {
            metrics::record_admission_rejected(err.reason_code());
            tracing::debug!(
                artifact = %name,
                destination = %destination,
                reason = err.reason_code(),
                "Placement rejected"
            );
        }
        result
    }

    fn admit_inner(&self, name: &str, destination: &str) -> PlacementResult<AdmissionTicket> {
        let artifact = self
            .catalog
            .get(name)
            .ok_or_else(|| PlacementError::UnknownArtifact {
                name: name.to_string(),
            })?;
        let dest = self
            .registry
            .get(destination)
            .ok_or_else(|| PlacementError::UnknownTier {
                id: destination.to_string(),
            })?;

        let current = artifact.current_tier();
        if current.as_deref() == Some(destination) {
            return Err(PlacementError::ArtifactAlreadyInTier {
                name: name.to_string(),
                tier: destination.to_string(),
            });
        }
        if !dest.accepts_artifact_size(artifact.size_bytes) {
            return Err(PlacementError::ArtifactTooLargeForTier {
                name: name.to_string(),
                tier: destination.to_string(),
                size_bytes: artifact.size_bytes,
                max_artifact_bytes: dest.max_artifact_bytes.unwrap_or(0),
            });
        }

        // Claim the single-flight slot before touching the capacity ledger
        // so a losing racer leaves no reservation behind.
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(name.to_string()) {
                return Err(PlacementError::AlreadyInProgress {
                    name: name.to_string(),
                });
            }
        }

        if let Err(err) = self.registry.try_reserve(destination, artifact.size_bytes) {
            self.in_flight.lock().remove(name);
            return Err(err);
        }

        let (source, kind, source_cost) = match current {
            Some(tier_id) => {
                let kind = match (self.registry.rank(&tier_id), self.registry.rank(destination)) {
                    (Some(src), Some(dst)) if dst < src => JobKind::Promote,
                    _ => JobKind::Demote,
                };
                let cost = self.registry.get(&tier_id).map(|c| c.cost_secs_per_gb);
                (JobSource::Tier(tier_id), kind, cost)
            }
            None => (JobSource::External, JobKind::HotLoad, None),
        };

        let estimated =
            estimate_transfer_duration(artifact.size_bytes, source_cost, dest.cost_secs_per_gb);

        tracing::info!(
            artifact = %name,
            source = %source,
            destination = %destination,
            kind = kind.as_str(),
            size_bytes = artifact.size_bytes,
            "Placement admitted"
        );
        if let Some(usage) = self.registry.usage(destination) {
            metrics::update_tier_utilization(destination, usage.utilization);
        }

        Ok(AdmissionTicket {
            artifact: name.to_string(),
            size_bytes: artifact.size_bytes,
            source,
            destination: destination.to_string(),
            kind,
            estimated,
        })
    }

    /// Make a job's reservation permanent and commit the catalog tier
    pub(crate) fn commit(
        &self,
        artifact: &str,
        source: Option<&str>,
        destination: &str,
        size_bytes: u64,
    ) {
        self.registry.complete_move(source, destination, size_bytes);
        if let Some(entry) = self.catalog.get(artifact) {
            entry.set_tier(TierAssignment::Assigned(destination.to_string()));
        }
        self.in_flight.lock().remove(artifact);

        if let Some(usage) = self.registry.usage(destination) {
            metrics::update_tier_utilization(destination, usage.utilization);
        }
        if let Some(source) = source
            && let Some(usage) = self.registry.usage(source)
        {
            metrics::update_tier_utilization(source, usage.utilization);
        }
    }

    /// Hand a failed job's reservation back; the catalog tier is untouched
    pub(crate) fn release(&self, artifact: &str, destination: &str, size_bytes: u64) {
        self.registry.release_reservation(destination, size_bytes);
        self.in_flight.lock().remove(artifact);

        if let Some(usage) = self.registry.usage(destination) {
            metrics::update_tier_utilization(destination, usage.utilization);
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}
