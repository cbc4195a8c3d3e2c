//! Self-process resource sampling with a bounded history and fire-once
//! threshold callbacks.

use std::collections::VecDeque;
use std::sync::Mutex;

use sysinfo::{Pid, System};

use crate::tenant::health::HealthThresholds;

const DEFAULT_HISTORY: usize = 100;

/// A single resource sample.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    /// Caller-supplied timestamp (milliseconds), since this module must
    /// not call `Instant::now`/`SystemTime::now` itself to stay
    /// deterministic in tests.
    pub timestamp_ms: i64,
    /// Resident set size, in megabytes.
    pub rss_mb: f64,
    /// CPU usage, as a percentage.
    pub cpu_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlarmState {
    Normal,
    Warning,
    Critical,
}

/// Samples the current process's own resource usage on demand, keeping a
/// bounded ring buffer of history and firing warning/critical callbacks
/// once per threshold crossing (not on every sample over threshold).
pub struct ResourceMonitor {
    system: Mutex<System>,
    history: Mutex<VecDeque<ResourceSnapshot>>,
    max_history: usize,
    thresholds: HealthThresholds,
    state: Mutex<AlarmState>,
    on_warning: Option<Box<dyn Fn(&ResourceSnapshot) + Send + Sync>>,
    on_critical: Option<Box<dyn Fn(&ResourceSnapshot) + Send + Sync>>,
}

impl ResourceMonitor {
    /// Creates a monitor with the default 100-sample history.
    #[must_use]
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            system: Mutex::new(System::new_all()),
            history: Mutex::new(VecDeque::with_capacity(DEFAULT_HISTORY)),
            max_history: DEFAULT_HISTORY,
            thresholds,
            state: Mutex::new(AlarmState::Normal),
            on_warning: None,
            on_critical: None,
        }
    }

    /// Registers a callback fired the moment usage first crosses the
    /// warning threshold (not repeated on subsequent samples still above
    /// it).
    #[must_use]
    pub fn on_warning(mut self, callback: impl Fn(&ResourceSnapshot) + Send + Sync + 'static) -> Self {
        self.on_warning = Some(Box::new(callback));
        self
    }

    /// Registers a callback fired the moment usage first crosses the
    /// critical threshold.
    #[must_use]
    pub fn on_critical(mut self, callback: impl Fn(&ResourceSnapshot) + Send + Sync + 'static) -> Self {
        self.on_critical = Some(Box::new(callback));
        self
    }

    /// Samples the current process's RSS and CPU usage, records it, and
    /// fires threshold callbacks on state transitions.
    pub fn sample(&self, timestamp_ms: i64) -> ResourceSnapshot {
        let pid = Pid::from_u32(std::process::id());
        let mut system = self.system.lock().unwrap();
        system.refresh_all();
        let (rss_mb, cpu_percent) = system
            .process(pid)
            .map(|p| (p.memory() as f64 / 1024.0 / 1024.0, f64::from(p.cpu_usage())))
            .unwrap_or((0.0, 0.0));
        drop(system);

        let snapshot = ResourceSnapshot {
            timestamp_ms,
            rss_mb,
            cpu_percent,
        };

        {
            let mut history = self.history.lock().unwrap();
            if history.len() == self.max_history {
                history.pop_front();
            }
            history.push_back(snapshot);
        }

        self.update_alarm(&snapshot);
        snapshot
    }

    fn update_alarm(&self, snapshot: &ResourceSnapshot) {
        let new_state = if snapshot.rss_mb >= self.thresholds.rss_critical_mb
            || snapshot.cpu_percent >= self.thresholds.cpu_critical_percent
        {
            AlarmState::Critical
        } else if snapshot.rss_mb >= self.thresholds.rss_warning_mb
            || snapshot.cpu_percent >= self.thresholds.cpu_warning_percent
        {
            AlarmState::Warning
        } else {
            AlarmState::Normal
        };

        let mut state = self.state.lock().unwrap();
        if new_state != *state {
            match new_state {
                AlarmState::Critical => {
                    if let Some(cb) = &self.on_critical {
                        cb(snapshot);
                    }
                }
                AlarmState::Warning => {
                    if let Some(cb) = &self.on_warning {
                        cb(snapshot);
                    }
                }
                AlarmState::Normal => {}
            }
            *state = new_state;
        }
    }

    /// Returns a snapshot of the recorded history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ResourceSnapshot> {
        self.history.lock().unwrap().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_history_bounded_to_max() {
        let monitor = ResourceMonitor::new(HealthThresholds::default());
        for i in 0..150 {
            monitor.sample(i);
        }
        assert_eq!(monitor.history().len(), DEFAULT_HISTORY);
    }

    #[test]
    fn test_warning_callback_fires_once_per_crossing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let mut thresholds = HealthThresholds::default();
        thresholds.rss_warning_mb = -1.0; // always "above" warning
        let monitor = ResourceMonitor::new(thresholds).on_warning(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        monitor.sample(0);
        monitor.sample(1);
        monitor.sample(2);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
