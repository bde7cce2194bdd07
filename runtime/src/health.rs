//! Application and per-component health.
//!
//! The orchestrator owns a [`HealthMonitor`] and updates it as components
//! start, fail and stop. Clones of the monitor are handed to whatever needs
//! to render health (the HTTP component) without giving it the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tally_core::environment::Clock;

/// Overall application status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    /// Orchestrator constructed, `init` not called yet.
    Initializing,
    /// `init` is running.
    Starting,
    /// Every component initialized.
    Running,
    /// `shutdown` is running.
    ShuttingDown,
    /// Shut down.
    Stopped,
    /// Startup failed.
    Error,
}

impl AppStatus {
    /// Whether the application can serve traffic.
    #[must_use]
    pub const fn is_serving(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Health of one registered component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Whether `init` completed.
    pub initialized: bool,
    /// How long `init` took, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_time_ms: Option<u64>,
    /// Last reported error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Mutable health state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Overall status.
    pub status: AppStatus,
    /// When the orchestrator was created.
    pub start_time: DateTime<Utc>,
    /// When health was last read.
    pub last_checked: DateTime<Utc>,
    /// Per-component entries, keyed by name.
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Point-in-time view returned by [`HealthMonitor::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Overall status.
    pub status: AppStatus,
    /// Seconds since the orchestrator was created.
    pub uptime_seconds: i64,
    /// Per-component entries.
    pub components: BTreeMap<String, ComponentHealth>,
    /// When this snapshot was taken.
    pub last_checked: DateTime<Utc>,
}

/// Shared handle to the health record.
#[derive(Clone)]
pub struct HealthMonitor {
    record: Arc<RwLock<HealthRecord>>,
    clock: Arc<dyn Clock>,
}

impl HealthMonitor {
    /// Starts a record at the clock's current time.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            record: Arc::new(RwLock::new(HealthRecord {
                status: AppStatus::Initializing,
                start_time: now,
                last_checked: now,
                components: BTreeMap::new(),
            })),
            clock,
        }
    }

    /// Reads health, refreshing `last_checked` and nothing else.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        let now = self.clock.now();
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        record.last_checked = now;
        HealthSnapshot {
            status: record.status,
            uptime_seconds: (now - record.start_time).num_seconds(),
            components: record.components.clone(),
            last_checked: now,
        }
    }

    /// Current overall status.
    #[must_use]
    pub fn status(&self) -> AppStatus {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    pub(crate) fn set_status(&self, status: AppStatus) {
        self.record
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .status = status;
    }

    pub(crate) fn track(&self, name: &str) {
        self.record
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .components
            .entry(name.to_string())
            .or_default();
    }

    pub(crate) fn record_init(&self, name: &str, elapsed: Duration) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        let entry = record.components.entry(name.to_string()).or_default();
        entry.initialized = true;
        entry.init_time_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        entry.error = None;
    }

    pub(crate) fn record_error(&self, name: &str, error: &str) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        record
            .components
            .entry(name.to_string())
            .or_default()
            .error = Some(error.to_string());
    }

    pub(crate) fn record_stopped(&self, name: &str) {
        if let Some(entry) = self
            .record
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .components
            .get_mut(name)
        {
            entry.initialized = false;
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
