//! The tenant registry's data model.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a tenant's server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Registered but not yet confirmed running.
    Starting,
    /// Confirmed running and healthy.
    Running,
    /// Running but over a health warning threshold.
    Degraded,
    /// Exceeded a critical health threshold or failed to restart.
    Error,
    /// Cleanly shut down.
    Stopped,
}

/// A single tenant's entry in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Unique tenant identifier (usually the project root's canonical
    /// path, slugified).
    pub id: String,
    /// Absolute path to the tenant's project root.
    pub project_root: String,
    /// OS process id of the tenant's running server, if known.
    pub pid: Option<u32>,
    /// Current lifecycle status.
    pub status: TenantStatus,
    /// Last observed RSS, in megabytes.
    pub rss_mb: Option<f64>,
    /// Last observed CPU usage, as a percentage.
    pub cpu_percent: Option<f64>,
    /// Unix millis of the last activity (a tool call or heartbeat).
    pub last_activity_ms: i64,
    /// Unix millis this tenant was registered.
    pub registered_ms: i64,
    /// Number of restart attempts made since the last confirmed-healthy
    /// run.
    pub restart_attempts: u32,
}

impl TenantRecord {
    /// Creates a freshly registered tenant record in `Starting` status.
    #[must_use]
    pub fn new(id: impl Into<String>, project_root: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            project_root: project_root.into(),
            pid: None,
            status: TenantStatus::Starting,
            rss_mb: None,
            cpu_percent: None,
            last_activity_ms: now_ms,
            registered_ms: now_ms,
            restart_attempts: 0,
        }
    }
}
