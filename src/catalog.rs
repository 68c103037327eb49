//! Artifact catalog: the single source of truth for committed placement
//!
//! The catalog is a pure lookup/update store. It performs no capacity
//! arithmetic; tier-changing writes go through the admission controller,
//! while reads and access tracking are lock-free so the serving path is
//! never stalled by migration activity.

use crate::error::{PlacementError, PlacementResult};
use crate::tier::TierRegistry;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Where an artifact currently lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierAssignment {
    /// Committed to a configured tier
    Assigned(String),
    /// Registered but not resident in any tier (oversized, or a hot-load
    /// that has not yet succeeded)
    Unmanaged,
}

impl TierAssignment {
    pub fn as_option(&self) -> Option<&str> {
        match self {
            Self::Assigned(id) => Some(id),
            Self::Unmanaged => None,
        }
    }
}

/// A named, sized unit of placeable data
///
/// The name is immutable once created. The tier field is mutated only by
/// the admission controller when a migration job commits; access fields
/// are bumped by the usage tracker on every serve.
#[derive(Debug)]
pub struct Artifact {
    pub name: String,
    pub size_bytes: u64,
    pub capabilities: Vec<String>,
    pub created_at: DateTime<Utc>,
    tier: RwLock<TierAssignment>,
    access_count: AtomicU64,
    last_access_ms: AtomicI64,
}

impl Artifact {
    fn new(name: String, size_bytes: u64, capabilities: Vec<String>) -> Self {
        Self {
            name,
            size_bytes,
            capabilities,
            created_at: Utc::now(),
            tier: RwLock::new(TierAssignment::Unmanaged),
            access_count: AtomicU64::new(0),
            last_access_ms: AtomicI64::new(0),
        }
    }

    /// Committed tier, or None while unmanaged
    pub fn current_tier(&self) -> Option<String> {
        self.tier.read().as_option().map(str::to_owned)
    }

    pub(crate) fn set_tier(&self, assignment: TierAssignment) {
        *self.tier.write() = assignment;
    }

    /// Best-effort access bump; lost updates under extreme concurrency are
    /// acceptable, this is a heuristic signal rather than an audit log
    pub fn record_access(&self) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
        self.last_access_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        match self.last_access_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            name: self.name.clone(),
            size_bytes: self.size_bytes,
            tier: self.current_tier(),
            capabilities: self.capabilities.clone(),
            created_at: self.created_at,
            last_access: self.last_access(),
            access_count: self.access_count(),
        }
    }
}

/// Point-in-time view of an artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSnapshot {
    pub name: String,
    pub size_bytes: u64,
    /// None means unmanaged/rejected: the artifact cannot be served
    pub tier: Option<String>,
    pub capabilities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_access: Option<DateTime<Utc>>,
    pub access_count: u64,
}

/// Thread-safe catalog of registered artifacts
pub struct ArtifactCatalog {
    registry: Arc<TierRegistry>,
    artifacts: DashMap<String, Arc<Artifact>>,
    insertion_order: Mutex<Vec<String>>,
}

impl ArtifactCatalog {
    pub fn new(registry: Arc<TierRegistry>) -> Self {
        Self {
            registry,
            artifacts: DashMap::new(),
            insertion_order: Mutex::new(Vec::new()),
        }
    }

    /// Register a new artifact, initially unmanaged
    ///
    /// An artifact larger than every tier's per-artifact maximum is still
    /// registered (and logged) so callers can observe the rejected state;
    /// it simply never leaves `Unmanaged`.
    pub fn register(
        &self,
        name: &str,
        size_bytes: u64,
        capabilities: Vec<String>,
    ) -> PlacementResult<Arc<Artifact>> {
        let artifact = match self.artifacts.entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(PlacementError::DuplicateArtifact {
                    name: name.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                let artifact = Arc::new(Artifact::new(name.to_string(), size_bytes, capabilities));
                entry.insert(artifact.clone());
                artifact
            }
        };
        self.insertion_order.lock().push(name.to_string());

        if self.registry.fits_any_tier(size_bytes) {
            tracing::info!(artifact = %name, size_bytes, "Artifact registered");
        } else {
            tracing::warn!(
                artifact = %name,
                size_bytes,
                "Artifact exceeds every tier's per-artifact maximum; leaving unmanaged"
            );
        }

        Ok(artifact)
    }

    /// Get an artifact by name
    pub fn get(&self, name: &str) -> Option<Arc<Artifact>> {
        self.artifacts.get(name).map(|entry| entry.value().clone())
    }

    /// All artifacts in registration order
    pub fn list(&self) -> Vec<Arc<Artifact>> {
        let order = self.insertion_order.lock();
        order
            .iter()
            .filter_map(|name| self.artifacts.get(name).map(|e| e.value().clone()))
            .collect()
    }

    /// Snapshots of all artifacts in registration order
    pub fn snapshot_all(&self) -> Vec<ArtifactSnapshot> {
        self.list().iter().map(|a| a.snapshot()).collect()
    }

    /// Bump access statistics for an artifact; false if unknown
    pub fn record_access(&self, name: &str) -> bool {
        match self.artifacts.get(name) {
            Some(entry) => {
                entry.value().record_access();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
