//! Background health polling and auto-restart for tenant processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::error::TenantError;

use super::model::TenantStatus;
use super::registry::TenantRegistry;

/// The single canonical health threshold table shared by the health
/// monitor and the resource monitor.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    /// RSS, in megabytes, above which a tenant is `Degraded`.
    pub rss_warning_mb: f64,
    /// RSS, in megabytes, above which a tenant is `Error`.
    pub rss_critical_mb: f64,
    /// CPU percentage above which a tenant is `Degraded`.
    pub cpu_warning_percent: f64,
    /// CPU percentage above which a tenant is `Error`.
    pub cpu_critical_percent: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            rss_warning_mb: 300.0,
            rss_critical_mb: 500.0,
            cpu_warning_percent: 80.0,
            cpu_critical_percent: 95.0,
        }
    }
}

impl HealthThresholds {
    fn classify(&self, rss_mb: f64, cpu_percent: f64) -> TenantStatus {
        if rss_mb >= self.rss_critical_mb || cpu_percent >= self.cpu_critical_percent {
            TenantStatus::Error
        } else if rss_mb >= self.rss_warning_mb || cpu_percent >= self.cpu_warning_percent {
            TenantStatus::Degraded
        } else {
            TenantStatus::Running
        }
    }
}

/// Polls every registered tenant's process on an interval, sampling RSS and
/// CPU and writing the classification back into the registry.
pub struct BackgroundHealthMonitor {
    registry: Arc<TenantRegistry>,
    thresholds: HealthThresholds,
    interval: Duration,
}

impl BackgroundHealthMonitor {
    /// Creates a monitor polling every `interval_seconds` (30s by default
    /// if `None`).
    #[must_use]
    pub fn new(registry: Arc<TenantRegistry>, thresholds: HealthThresholds, interval_seconds: Option<u64>) -> Self {
        Self {
            registry,
            thresholds,
            interval: Duration::from_secs(interval_seconds.unwrap_or(30)),
        }
    }

    /// Runs the polling loop until the process exits. Each tick samples
    /// every currently-registered tenant with a known pid.
    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Samples every tenant once. Exposed separately from [`run`] so tests
    /// can drive single ticks without waiting on a real interval.
    pub async fn poll_once(&self) {
        let registry = Arc::clone(&self.registry);
        let thresholds = self.thresholds;
        let tenants = match tokio::task::spawn_blocking(move || registry.list_all()).await {
            Ok(Ok(tenants)) => tenants,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to list tenants for health poll");
                return;
            }
            Err(e) => {
                warn!(error = %e, "health poll task panicked");
                return;
            }
        };

        let mut system = System::new_all();
        system.refresh_all();
        for tenant in tenants {
            let Some(pid) = tenant.pid else { continue };
            let Some(process) = system.process(Pid::from_u32(pid)) else {
                continue;
            };
            let rss_mb = process.memory() as f64 / 1024.0 / 1024.0;
            let cpu_percent = f64::from(process.cpu_usage());
            let status = thresholds.classify(rss_mb, cpu_percent);

            let registry = Arc::clone(&self.registry);
            let id = tenant.id.clone();
            let _ = tokio::task::spawn_blocking(move || {
                let _ = registry.update_health(&id, rss_mb, cpu_percent);
                let _ = registry.update_status(&id, status);
            })
            .await;

            if status == TenantStatus::Error {
                error!(tenant = %tenant.id, rss_mb, cpu_percent, "tenant exceeded critical health threshold");
            } else if status == TenantStatus::Degraded {
                warn!(tenant = %tenant.id, rss_mb, cpu_percent, "tenant exceeded warning health threshold");
            }
        }
    }
}

/// Restarts tenants whose status has gone `Error`, up to a bounded number
/// of attempts.
pub struct AutoRestarter {
    registry: Arc<TenantRegistry>,
    attempts: Mutex<HashMap<String, u32>>,
    max_attempts: u32,
    restart_delay: Duration,
}

impl AutoRestarter {
    const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    const DEFAULT_DELAY: Duration = Duration::from_secs(10);

    /// Creates a restarter with the default retry policy (3 attempts, 10s
    /// delay between them).
    #[must_use]
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self {
            registry,
            attempts: Mutex::new(HashMap::new()),
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            restart_delay: Self::DEFAULT_DELAY,
        }
    }

    /// Attempts to restart `tenant_id` by spawning `command`/`args` (the
    /// same `start-server` invocation the CLI itself uses). Exhausts after
    /// [`AutoRestarter::DEFAULT_MAX_ATTEMPTS`] tries, leaving the tenant in
    /// `Error` status.
    ///
    /// ## Errors
    /// Returns [`TenantError::RestartExhausted`] once the attempt budget is
    /// spent.
    pub async fn restart(&self, tenant_id: &str, command: &str, args: &[String]) -> Result<(), TenantError> {
        let mut attempts = self.attempts.lock().await;
        let count = attempts.entry(tenant_id.to_string()).or_insert(0);
        if *count >= self.max_attempts {
            return Err(TenantError::RestartExhausted(self.max_attempts, tenant_id.to_string()));
        }
        *count += 1;
        let attempt_no = *count;
        drop(attempts);

        tokio::time::sleep(self.restart_delay).await;

        info!(tenant = %tenant_id, attempt = attempt_no, "restarting tenant");
        let child = tokio::process::Command::new(command)
            .args(args)
            .spawn()
            .map_err(TenantError::Io)?;
        let pid = child.id();

        let registry = Arc::clone(&self.registry);
        let id = tenant_id.to_string();
        let _ = tokio::task::spawn_blocking(move || {
            let _ = registry.update_status(&id, TenantStatus::Starting);
        })
        .await;

        if pid.is_some() {
            self.reset_attempts(tenant_id).await;
        }
        Ok(())
    }

    /// Resets the attempt counter for a tenant once it's confirmed healthy
    /// again.
    pub async fn reset_attempts(&self, tenant_id: &str) {
        self.attempts.lock().await.remove(tenant_id);
    }
}
