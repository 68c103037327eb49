//! Configuration structures and loading logic
//!
//! The manager itself never reads files on its own initiative; the process
//! entry point (or another configuration loader) calls [`ManagerConfig::load`]
//! and hands the result to [`crate::manager::PlacementManager`].

use crate::tier::TierConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Main manager configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Tiers in speed order, fastest first
    pub tiers: Vec<TierConfig>,
    /// Artifacts known at startup
    pub artifacts: Vec<ArtifactSeed>,
    pub scheduler: SchedulerConfig,
    pub optimizer: OptimizerConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            artifacts: Vec::new(),
            scheduler: SchedulerConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(workers) = std::env::var("TIER_MANAGER_WORKERS") {
            config.scheduler.workers = workers
                .parse()
                .context("Invalid TIER_MANAGER_WORKERS value")?;
        }
        if let Ok(retention) = std::env::var("TIER_MANAGER_JOB_RETENTION_SECS") {
            config.scheduler.job_retention_secs = retention
                .parse()
                .context("Invalid TIER_MANAGER_JOB_RETENTION_SECS value")?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            anyhow::bail!("At least one tier must be configured");
        }

        let mut tier_ids = HashSet::new();
        for tier in &self.tiers {
            if tier.id.is_empty() {
                anyhow::bail!("Tier id cannot be empty");
            }
            if !tier_ids.insert(&tier.id) {
                anyhow::bail!("Duplicate tier id: {}", tier.id);
            }
            if tier.capacity_bytes == 0 {
                anyhow::bail!("Tier '{}' capacity must be non-zero", tier.id);
            }
            if tier.reserved_margin_bytes >= tier.capacity_bytes {
                anyhow::bail!(
                    "Tier '{}' reserved margin ({} bytes) must be smaller than its capacity ({} bytes)",
                    tier.id,
                    tier.reserved_margin_bytes,
                    tier.capacity_bytes
                );
            }
            if tier.capacity_floor_bytes > tier.capacity_bytes {
                anyhow::bail!(
                    "Tier '{}' capacity floor exceeds its capacity",
                    tier.id
                );
            }
            if tier.cost_secs_per_gb <= 0.0 || !tier.cost_secs_per_gb.is_finite() {
                anyhow::bail!(
                    "Tier '{}' migration cost must be a positive number of seconds per GB",
                    tier.id
                );
            }
        }

        let mut artifact_names = HashSet::new();
        for artifact in &self.artifacts {
            if artifact.name.is_empty() {
                anyhow::bail!("Artifact name cannot be empty");
            }
            if !artifact_names.insert(&artifact.name) {
                anyhow::bail!("Duplicate artifact name: {}", artifact.name);
            }
            if artifact.size_bytes == 0 {
                anyhow::bail!("Artifact '{}' size must be non-zero", artifact.name);
            }
            if let Some(hint) = &artifact.tier_hint
                && !tier_ids.contains(hint)
            {
                anyhow::bail!(
                    "Artifact '{}' references unknown tier '{}'",
                    artifact.name,
                    hint
                );
            }
        }

        if self.scheduler.workers == 0 {
            anyhow::bail!("Scheduler worker count must be non-zero");
        }
        if self.scheduler.job_retention_secs == 0 {
            anyhow::bail!("Job retention must be non-zero");
        }
        if self.optimizer.demote_utilization <= 0.0 || self.optimizer.demote_utilization > 1.0 {
            anyhow::bail!(
                "Optimizer demote utilization must be in (0, 1], got {}",
                self.optimizer.demote_utilization
            );
        }

        Ok(())
    }
}

/// An artifact known to the catalog at startup
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArtifactSeed {
    pub name: String,
    pub size_bytes: u64,

    /// Preferred tier; the seeder falls back to the fastest tier that fits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_hint: Option<String>,

    /// Opaque tags describing what the artifact is usable for
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Migration scheduler tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrent migration workers
    pub workers: usize,
    /// How long terminal jobs stay queryable
    pub job_retention_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            job_retention_secs: default_job_retention_secs(),
        }
    }
}

/// Optimizer heuristic thresholds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Accesses required before an artifact is proposed for promotion
    pub promote_access_threshold: u64,
    /// Tier utilization above which cold artifacts are demoted
    pub demote_utilization: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            promote_access_threshold: default_promote_access_threshold(),
            demote_utilization: default_demote_utilization(),
        }
    }
}

// Default functions
fn default_workers() -> usize {
    2
}
fn default_job_retention_secs() -> u64 {
    900
}
fn default_promote_access_threshold() -> u64 {
    5
}
fn default_demote_utilization() -> f64 {
    0.85
}
