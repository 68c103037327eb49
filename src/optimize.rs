//! Placement optimization from observed access patterns
//!
//! The planner is a pure, deterministic heuristic over a point-in-time
//! snapshot: hot artifacts in slower tiers are promoted one rank, cold
//! artifacts are demoted out of tiers under utilization pressure. It only
//! ever proposes actions; every proposal is submitted through the normal
//! admission path, so the optimizer can never bypass capacity checks.

use crate::catalog::{ArtifactCatalog, ArtifactSnapshot};
use crate::config::OptimizerConfig;
use crate::error::PlacementResult;
use crate::job::{JobId, JobKind};
use crate::tier::TierRegistry;
use serde::Serialize;
use std::collections::HashSet;

/// A proposed placement change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementAction {
    pub artifact: String,
    pub destination: String,
    pub kind: JobKind,
    /// Access count observed when the plan was computed
    pub access_count: u64,
}

/// Result of submitting one proposed action through admission
#[derive(Debug)]
pub struct OptimizeOutcome {
    pub action: PlacementAction,
    pub result: PlacementResult<JobId>,
}

/// Compute a promotion/demotion plan over the current catalog state
///
/// The plan simulates post-migration usage per tier so its proposals do
/// not jointly overflow a destination, but admission remains the
/// authority: a stale plan simply collects rejections.
pub fn plan(
    registry: &TierRegistry,
    catalog: &ArtifactCatalog,
    config: &OptimizerConfig,
) -> Vec<PlacementAction> {
    let usages = registry.usage_all();
    if usages.is_empty() {
        return Vec::new();
    }

    let budgets: Vec<u64> = usages.iter().map(|u| u.budget_bytes).collect();
    let mut sim_in_use: Vec<u64> = usages
        .iter()
        .map(|u| u.committed_bytes + u.reserved_bytes)
        .collect();
    let tier_ids: Vec<String> = usages.iter().map(|u| u.id.clone()).collect();
    let tier_configs: Vec<_> = tier_ids
        .iter()
        .filter_map(|id| registry.get(id))
        .collect();
    if tier_configs.len() != tier_ids.len() {
        return Vec::new();
    }

    let snapshots = catalog.snapshot_all();
    let rank_of = |tier: Option<&str>| tier.and_then(|id| tier_ids.iter().position(|t| t == id));

    let mut actions = Vec::new();
    let mut proposed: HashSet<String> = HashSet::new();

    // Promotions: hot artifacts move one rank faster, hottest first,
    // stopping per destination once it would be full.
    let mut hot: Vec<(&ArtifactSnapshot, usize)> = snapshots
        .iter()
        .filter_map(|snap| rank_of(snap.tier.as_deref()).map(|rank| (snap, rank)))
        .filter(|(snap, rank)| *rank >= 1 && snap.access_count >= config.promote_access_threshold)
        .collect();
    hot.sort_by(|(a, _), (b, _)| {
        b.access_count
            .cmp(&a.access_count)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut full = vec![false; tier_ids.len()];
    for (snap, rank) in hot {
        let dest = rank - 1;
        if full[dest] {
            continue;
        }
        if !tier_configs[dest].accepts_artifact_size(snap.size_bytes) {
            continue;
        }
        if sim_in_use[dest] + snap.size_bytes > budgets[dest] {
            full[dest] = true;
            continue;
        }
        sim_in_use[dest] += snap.size_bytes;
        proposed.insert(snap.name.clone());
        actions.push(PlacementAction {
            artifact: snap.name.clone(),
            destination: tier_ids[dest].clone(),
            kind: JobKind::Promote,
            access_count: snap.access_count,
        });
    }

    // Demotions: while a tier sits above the utilization threshold, move
    // its least-recently-used artifacts one rank slower. Ties go to the
    // lowest access count, then name, so the plan is deterministic.
    for rank in 0..tier_ids.len().saturating_sub(1) {
        let budget = budgets[rank];
        if budget == 0 {
            continue;
        }
        let over = |in_use: u64| in_use as f64 / budget as f64 > config.demote_utilization;
        if !over(sim_in_use[rank]) {
            continue;
        }

        let mut cold: Vec<&ArtifactSnapshot> = snapshots
            .iter()
            .filter(|snap| {
                rank_of(snap.tier.as_deref()) == Some(rank) && !proposed.contains(&snap.name)
            })
            .collect();
        cold.sort_by(|a, b| {
            let a_seen = a.last_access.map_or(i64::MIN, |t| t.timestamp_millis());
            let b_seen = b.last_access.map_or(i64::MIN, |t| t.timestamp_millis());
            a_seen
                .cmp(&b_seen)
                .then_with(|| a.access_count.cmp(&b.access_count))
                .then_with(|| a.name.cmp(&b.name))
        });

        let dest = rank + 1;
        for snap in cold {
            if !over(sim_in_use[rank]) {
                break;
            }
            if !tier_configs[dest].accepts_artifact_size(snap.size_bytes) {
                continue;
            }
            if sim_in_use[dest] + snap.size_bytes > budgets[dest] {
                continue;
            }
            sim_in_use[dest] += snap.size_bytes;
            sim_in_use[rank] = sim_in_use[rank].saturating_sub(snap.size_bytes);
            proposed.insert(snap.name.clone());
            actions.push(PlacementAction {
                artifact: snap.name.clone(),
                destination: tier_ids[dest].clone(),
                kind: JobKind::Demote,
                access_count: snap.access_count,
            });
        }
    }

    actions
}
