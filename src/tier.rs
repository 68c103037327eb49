//! Tier registry: static tier descriptions plus capacity bookkeeping
//!
//! Declaration order is speed order: index 0 is the fastest tier. All
//! capacity mutations for a tier go through the single lock held here, so
//! limit updates are serialized with admission checks on the same tier and
//! the check-and-reserve step is atomic with respect to concurrent
//! requests. The lock is held only for the arithmetic, never for the
//! duration of a migration.

use crate::error::{PlacementError, PlacementResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Static description of a storage tier
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TierConfig {
    pub id: String,
    pub capacity_bytes: u64,

    /// Capacity held back so the tier never runs at its hard limit
    #[serde(default)]
    pub reserved_margin_bytes: u64,

    /// Migration cost in seconds per gigabyte moved into this tier
    #[serde(default = "default_cost_secs_per_gb")]
    pub cost_secs_per_gb: f64,

    /// Largest single artifact this tier accepts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_artifact_bytes: Option<u64>,

    /// Hard minimum for runtime capacity decreases
    #[serde(default)]
    pub capacity_floor_bytes: u64,
}

fn default_cost_secs_per_gb() -> f64 {
    0.1
}

impl TierConfig {
    /// Bytes usable for placement once the safety margin is held back
    pub fn budget_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.reserved_margin_bytes)
    }

    /// Whether an artifact of this size passes the per-artifact maximum
    pub fn accepts_artifact_size(&self, size_bytes: u64) -> bool {
        self.max_artifact_bytes.is_none_or(|max| size_bytes <= max)
    }
}

/// Point-in-time capacity numbers for a tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierUsage {
    pub id: String,
    pub capacity_bytes: u64,
    pub reserved_margin_bytes: u64,
    /// Capacity minus margin
    pub budget_bytes: u64,
    /// Bytes of artifacts committed to the tier
    pub committed_bytes: u64,
    /// Bytes reserved for pending/running migration jobs
    pub reserved_bytes: u64,
    /// Budget left after committed and reserved usage
    pub available_bytes: u64,
    /// (committed + reserved) / budget
    pub utilization: f64,
}

#[derive(Debug)]
struct TierState {
    config: TierConfig,
    committed_bytes: u64,
    reserved_bytes: u64,
}

impl TierState {
    fn in_use(&self) -> u64 {
        self.committed_bytes + self.reserved_bytes
    }

    fn usage(&self) -> TierUsage {
        let budget = self.config.budget_bytes();
        let in_use = self.in_use();
        TierUsage {
            id: self.config.id.clone(),
            capacity_bytes: self.config.capacity_bytes,
            reserved_margin_bytes: self.config.reserved_margin_bytes,
            budget_bytes: budget,
            committed_bytes: self.committed_bytes,
            reserved_bytes: self.reserved_bytes,
            available_bytes: budget.saturating_sub(in_use),
            utilization: if budget == 0 {
                1.0
            } else {
                in_use as f64 / budget as f64
            },
        }
    }
}

/// Registry of configured tiers with reservation bookkeeping
pub struct TierRegistry {
    tiers: RwLock<Vec<TierState>>,
}

impl TierRegistry {
    /// Create a registry from validated tier configs, fastest first
    pub fn new(configs: Vec<TierConfig>) -> Self {
        let tiers = configs
            .into_iter()
            .map(|config| TierState {
                config,
                committed_bytes: 0,
                reserved_bytes: 0,
            })
            .collect();
        Self {
            tiers: RwLock::new(tiers),
        }
    }

    /// Look up a tier's static config
    pub fn get(&self, id: &str) -> Option<TierConfig> {
        let tiers = self.tiers.read();
        tiers
            .iter()
            .find(|t| t.config.id == id)
            .map(|t| t.config.clone())
    }

    /// Speed rank of a tier: 0 is fastest
    pub fn rank(&self, id: &str) -> Option<usize> {
        let tiers = self.tiers.read();
        tiers.iter().position(|t| t.config.id == id)
    }

    /// Tier config at the given speed rank
    pub fn tier_at(&self, rank: usize) -> Option<TierConfig> {
        let tiers = self.tiers.read();
        tiers.get(rank).map(|t| t.config.clone())
    }

    /// Tier ids in speed order, fastest first
    pub fn ids(&self) -> Vec<String> {
        let tiers = self.tiers.read();
        tiers.iter().map(|t| t.config.id.clone()).collect()
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.read().len()
    }

    /// Whether any tier's per-artifact maximum admits this size
    pub fn fits_any_tier(&self, size_bytes: u64) -> bool {
        let tiers = self.tiers.read();
        tiers
            .iter()
            .any(|t| t.config.accepts_artifact_size(size_bytes))
    }

    /// Usage numbers for a single tier
    pub fn usage(&self, id: &str) -> Option<TierUsage> {
        let tiers = self.tiers.read();
        tiers.iter().find(|t| t.config.id == id).map(TierState::usage)
    }

    /// Usage numbers for all tiers, fastest first
    pub fn usage_all(&self) -> Vec<TierUsage> {
        let tiers = self.tiers.read();
        tiers.iter().map(TierState::usage).collect()
    }

    /// Adjust a tier's capacity and margin at runtime
    ///
    /// Rejected if the new capacity falls below the configured floor, if
    /// the margin exceeds the capacity, or if the resulting budget could no
    /// longer hold the tier's committed plus reserved bytes. Callers must
    /// re-run admission checks after a successful change.
    pub fn update_limits(
        &self,
        id: &str,
        new_capacity_bytes: u64,
        new_margin_bytes: u64,
    ) -> PlacementResult<()> {
        let mut tiers = self.tiers.write();
        let state = tiers
            .iter_mut()
            .find(|t| t.config.id == id)
            .ok_or_else(|| PlacementError::UnknownTier { id: id.to_string() })?;

        if new_capacity_bytes < state.config.capacity_floor_bytes {
            return Err(PlacementError::LimitBelowFloor {
                tier: id.to_string(),
                floor_bytes: state.config.capacity_floor_bytes,
            });
        }
        if new_margin_bytes > new_capacity_bytes {
            return Err(PlacementError::MarginExceedsCapacity {
                tier: id.to_string(),
                margin_bytes: new_margin_bytes,
                capacity_bytes: new_capacity_bytes,
            });
        }
        let new_budget = new_capacity_bytes - new_margin_bytes;
        if new_budget < state.in_use() {
            return Err(PlacementError::LimitBelowCommitted {
                tier: id.to_string(),
                in_use_bytes: state.in_use(),
            });
        }

        tracing::info!(
            tier = %id,
            capacity_bytes = new_capacity_bytes,
            reserved_margin_bytes = new_margin_bytes,
            "Tier limits updated"
        );
        state.config.capacity_bytes = new_capacity_bytes;
        state.config.reserved_margin_bytes = new_margin_bytes;
        Ok(())
    }

    /// Atomically check capacity and reserve bytes for an in-flight job
    pub(crate) fn try_reserve(&self, id: &str, bytes: u64) -> PlacementResult<()> {
        let mut tiers = self.tiers.write();
        let state = tiers
            .iter_mut()
            .find(|t| t.config.id == id)
            .ok_or_else(|| PlacementError::UnknownTier { id: id.to_string() })?;

        let budget = state.config.budget_bytes();
        let in_use = state.in_use();
        if in_use + bytes > budget {
            return Err(PlacementError::CapacityExceeded {
                tier: id.to_string(),
                requested_bytes: bytes,
                available_bytes: budget.saturating_sub(in_use),
            });
        }
        state.reserved_bytes += bytes;
        Ok(())
    }

    /// Hand a failed or abandoned job's reservation back to the tier
    pub(crate) fn release_reservation(&self, id: &str, bytes: u64) {
        let mut tiers = self.tiers.write();
        if let Some(state) = tiers.iter_mut().find(|t| t.config.id == id) {
            state.reserved_bytes = state.reserved_bytes.saturating_sub(bytes);
        } else {
            tracing::warn!(tier = %id, "Released reservation against unknown tier");
        }
    }

    /// Convert a reservation into committed usage and vacate the source
    ///
    /// Both sides of the move are updated under one lock so no reader sees
    /// the bytes counted twice or not at all.
    pub(crate) fn complete_move(&self, source: Option<&str>, destination: &str, bytes: u64) {
        let mut tiers = self.tiers.write();
        if let Some(state) = tiers.iter_mut().find(|t| t.config.id == destination) {
            state.reserved_bytes = state.reserved_bytes.saturating_sub(bytes);
            state.committed_bytes += bytes;
        } else {
            tracing::warn!(tier = %destination, "Committed move into unknown tier");
        }
        if let Some(source) = source
            && let Some(state) = tiers.iter_mut().find(|t| t.config.id == source)
        {
            state.committed_bytes = state.committed_bytes.saturating_sub(bytes);
        }
    }

    /// Commit an initial placement directly, bypassing the job machinery
    ///
    /// Used only while seeding the catalog at startup, before any job can
    /// be in flight.
    pub(crate) fn commit_seed(&self, id: &str, bytes: u64) -> PlacementResult<()> {
        let mut tiers = self.tiers.write();
        let state = tiers
            .iter_mut()
            .find(|t| t.config.id == id)
            .ok_or_else(|| PlacementError::UnknownTier { id: id.to_string() })?;

        let budget = state.config.budget_bytes();
        let in_use = state.in_use();
        if in_use + bytes > budget {
            return Err(PlacementError::CapacityExceeded {
                tier: id.to_string(),
                requested_bytes: bytes,
                available_bytes: budget.saturating_sub(in_use),
            });
        }
        state.committed_bytes += bytes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1_000_000_000;

    fn two_tiers() -> TierRegistry {
        TierRegistry::new(vec![
            TierConfig {
                id: "fast".to_string(),
                capacity_bytes: 6 * GB,
                reserved_margin_bytes: GB,
                cost_secs_per_gb: 0.1,
                max_artifact_bytes: None,
                capacity_floor_bytes: 2 * GB,
            },
            TierConfig {
                id: "slow".to_string(),
                capacity_bytes: 10 * GB,
                reserved_margin_bytes: 0,
                cost_secs_per_gb: 0.5,
                max_artifact_bytes: Some(8 * GB),
                capacity_floor_bytes: 0,
            },
        ])
    }

    #[test]
    fn test_rank_follows_declaration_order() {
        let registry = two_tiers();
        assert_eq!(registry.rank("fast"), Some(0));
        assert_eq!(registry.rank("slow"), Some(1));
        assert_eq!(registry.rank("cold"), None);
        assert_eq!(registry.ids(), vec!["fast", "slow"]);
    }

    #[test]
    fn test_budget_subtracts_margin() {
        let registry = two_tiers();
        let fast = registry.get("fast").unwrap();
        assert_eq!(fast.budget_bytes(), 5 * GB);
        let slow = registry.get("slow").unwrap();
        assert_eq!(slow.budget_bytes(), 10 * GB);
    }

    #[test]
    fn test_reserve_respects_budget() {
        let registry = two_tiers();
        registry.try_reserve("fast", 3 * GB).unwrap();
        registry.try_reserve("fast", 2 * GB).unwrap();

        let err = registry.try_reserve("fast", 1).unwrap_err();
        assert_eq!(
            err,
            PlacementError::CapacityExceeded {
                tier: "fast".to_string(),
                requested_bytes: 1,
                available_bytes: 0,
            }
        );
    }

    #[test]
    fn test_release_returns_budget() {
        let registry = two_tiers();
        registry.try_reserve("fast", 5 * GB).unwrap();
        registry.release_reservation("fast", 5 * GB);

        let usage = registry.usage("fast").unwrap();
        assert_eq!(usage.reserved_bytes, 0);
        assert_eq!(usage.available_bytes, 5 * GB);
    }

    #[test]
    fn test_complete_move_shifts_committed_bytes() {
        let registry = two_tiers();
        registry.commit_seed("fast", 2 * GB).unwrap();
        registry.try_reserve("slow", 2 * GB).unwrap();
        registry.complete_move(Some("fast"), "slow", 2 * GB);

        let fast = registry.usage("fast").unwrap();
        assert_eq!(fast.committed_bytes, 0);
        assert_eq!(fast.reserved_bytes, 0);

        let slow = registry.usage("slow").unwrap();
        assert_eq!(slow.committed_bytes, 2 * GB);
        assert_eq!(slow.reserved_bytes, 0);
    }

    #[test]
    fn test_hot_load_commit_has_no_source() {
        let registry = two_tiers();
        registry.try_reserve("fast", GB).unwrap();
        registry.complete_move(None, "fast", GB);

        let fast = registry.usage("fast").unwrap();
        assert_eq!(fast.committed_bytes, GB);
        assert_eq!(fast.reserved_bytes, 0);
    }

    #[test]
    fn test_update_limits_below_floor_rejected() {
        let registry = two_tiers();
        let err = registry.update_limits("fast", GB, 0).unwrap_err();
        assert_eq!(err.reason_code(), "limit_below_floor");
    }

    #[test]
    fn test_update_limits_below_in_use_rejected() {
        let registry = two_tiers();
        registry.commit_seed("slow", 6 * GB).unwrap();
        registry.try_reserve("slow", 2 * GB).unwrap();

        let err = registry.update_limits("slow", 7 * GB, 0).unwrap_err();
        assert_eq!(
            err,
            PlacementError::LimitBelowCommitted {
                tier: "slow".to_string(),
                in_use_bytes: 8 * GB,
            }
        );

        // Room for committed + reserved is enough
        registry.update_limits("slow", 8 * GB, 0).unwrap();
        assert_eq!(registry.get("slow").unwrap().capacity_bytes, 8 * GB);
    }

    #[test]
    fn test_update_limits_margin_over_capacity_rejected() {
        let registry = two_tiers();
        let err = registry.update_limits("slow", 4 * GB, 5 * GB).unwrap_err();
        assert_eq!(err.reason_code(), "margin_exceeds_capacity");
    }

    #[test]
    fn test_update_limits_unknown_tier() {
        let registry = two_tiers();
        let err = registry.update_limits("cold", GB, 0).unwrap_err();
        assert_eq!(err.reason_code(), "unknown_tier");
    }

    #[test]
    fn test_utilization_counts_reservations() {
        let registry = two_tiers();
        registry.commit_seed("fast", 2 * GB).unwrap();
        registry.try_reserve("fast", GB).unwrap();

        let usage = registry.usage("fast").unwrap();
        assert_eq!(usage.budget_bytes, 5 * GB);
        assert_eq!(usage.available_bytes, 2 * GB);
        assert!((usage.utilization - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_per_artifact_maximum() {
        let registry = two_tiers();
        assert!(registry.fits_any_tier(9 * GB));
        let slow = registry.get("slow").unwrap();
        assert!(!slow.accepts_artifact_size(9 * GB));
        assert!(slow.accepts_artifact_size(8 * GB));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any interleaving of reserve/release/commit keeps
            /// committed + reserved within the budget.
            #[test]
            fn reservation_ledger_never_overflows(
                ops in prop::collection::vec((0u8..3, 1u64..=4 * GB), 1..64)
            ) {
                let registry = TierRegistry::new(vec![TierConfig {
                    id: "fast".to_string(),
                    capacity_bytes: 10 * GB,
                    reserved_margin_bytes: GB,
                    cost_secs_per_gb: 0.1,
                    max_artifact_bytes: None,
                    capacity_floor_bytes: 0,
                }]);
                let mut outstanding: Vec<u64> = Vec::new();

                for (op, bytes) in ops {
                    match op {
                        0 => {
                            if registry.try_reserve("fast", bytes).is_ok() {
                                outstanding.push(bytes);
                            }
                        }
                        1 => {
                            if let Some(bytes) = outstanding.pop() {
                                registry.release_reservation("fast", bytes);
                            }
                        }
                        _ => {
                            if let Some(bytes) = outstanding.pop() {
                                registry.complete_move(None, "fast", bytes);
                            }
                        }
                    }
                    let usage = registry.usage("fast").unwrap();
                    prop_assert!(
                        usage.committed_bytes + usage.reserved_bytes <= usage.budget_bytes
                    );
                }
            }
        }
    }
}
