//! Aggregated health reporting.
//!
//! Combines the health of the scan queue and the result store into a
//! single [`DaemonHealth`] report. The overall status is the worst
//! status among all components.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use codewarden_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all components).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Jobs waiting in the scan queue.
    pub pending_scans: usize,
    /// Per-component health reports.
    pub components: Vec<ComponentHealth>,
}

/// Health status for a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g., "scan-queue", "result-store").
    pub name: String,
    /// Current health status of the component.
    pub status: HealthStatus,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Aggregate component health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Reasons from every non-healthy component at the worst level are joined.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let unhealthy: Vec<String> = components
        .iter()
        .filter_map(|c| match &c.status {
            HealthStatus::Unhealthy(reason) => Some(format!("{}: {}", c.name, reason)),
            _ => None,
        })
        .collect();
    if !unhealthy.is_empty() {
        return HealthStatus::Unhealthy(unhealthy.join("; "));
    }

    let degraded: Vec<String> = components
        .iter()
        .filter_map(|c| match &c.status {
            HealthStatus::Degraded(reason) => Some(format!("{}: {}", c.name, reason)),
            _ => None,
        })
        .collect();
    if !degraded.is_empty() {
        return HealthStatus::Degraded(degraded.join("; "));
    }

    HealthStatus::Healthy
}
