//! Metrics emission for placement activity
//!
//! Counters and gauges go through the `metrics` facade; the embedding
//! process installs whatever recorder/exporter it wants.

/// Record an accepted migration job
pub fn record_job_accepted(kind: &str) {
    metrics::counter!("tier_manager_jobs_accepted_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a successfully completed migration job
pub fn record_job_succeeded(kind: &str) {
    metrics::counter!("tier_manager_jobs_succeeded_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a failed or timed-out migration job
pub fn record_job_failed(kind: &str) {
    metrics::counter!("tier_manager_jobs_failed_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a rejected admission request by reason code
pub fn record_admission_rejected(reason: &'static str) {
    metrics::counter!("tier_manager_admission_rejected_total",
        "reason" => reason
    )
    .increment(1);
}

/// Update a tier's utilization gauge (committed + reserved over budget)
pub fn update_tier_utilization(tier: &str, utilization: f64) {
    metrics::gauge!("tier_manager_tier_utilization",
        "tier" => tier.to_string()
    )
    .set(utilization);
}
