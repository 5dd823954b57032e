//! Counters and health levels for the transaction shell.

use crate::session::SessionId;
use crate::validation::ValidationWarning;
use holdem_engine::player::ActionKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Error rate above which a session is critical.
pub const CRITICAL_ERROR_RATE: f64 = 0.05;
/// Duplicate-request rate above which a session needs attention.
pub const WARNING_DUPLICATE_RATE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    /// No requests seen yet
    Unknown,
    Healthy,
    Warning,
    Critical,
}

/// Totals for one session, or for all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub requests: u64,
    pub duplicates: u64,
    pub rejections: u64,
    pub rollbacks: u64,
    pub invariant_warnings: u64,
    pub chip_integrity_warnings: u64,
    pub actions: BTreeMap<ActionKind, u64>,
}

impl SessionMetrics {
    /// Share of requests that rolled back.
    pub fn error_rate(&self) -> f64 {
        ratio(self.rollbacks, self.requests)
    }

    pub fn duplicate_rate(&self) -> f64 {
        ratio(self.duplicates, self.requests)
    }

    pub fn health(&self) -> HealthLevel {
        if self.requests == 0 {
            HealthLevel::Unknown
        } else if self.error_rate() > CRITICAL_ERROR_RATE {
            HealthLevel::Critical
        } else if self.duplicate_rate() > WARNING_DUPLICATE_RATE || self.chip_integrity_warnings > 0 {
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Snapshot of the global counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub requests: u64,
    pub duplicates: u64,
    pub rejections: u64,
    pub rollbacks: u64,
    pub invariant_warnings: u64,
}

/// Global atomic counters plus per-session metrics.
#[derive(Debug, Default)]
pub struct GameMonitor {
    requests: AtomicU64,
    duplicates: AtomicU64,
    rejections: AtomicU64,
    rollbacks: AtomicU64,
    invariant_warnings: AtomicU64,
    sessions: Mutex<HashMap<SessionId, SessionMetrics>>,
}

impl GameMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SessionMetrics>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_session(&self, session_id: &SessionId, update: impl FnOnce(&mut SessionMetrics)) -> HealthLevel {
        let mut sessions = self.sessions();
        let metrics = sessions.entry(session_id.clone()).or_default();
        let before = metrics.health();
        update(metrics);
        let after = metrics.health();
        if after != before && matches!(after, HealthLevel::Warning | HealthLevel::Critical) {
            tracing::error!(
                session_id = %session_id,
                health = ?after,
                requests = metrics.requests,
                rollbacks = metrics.rollbacks,
                duplicates = metrics.duplicates,
                chip_integrity_warnings = metrics.chip_integrity_warnings,
                "session health degraded"
            );
        }
        after
    }

    /// A transition that was applied; `kind` is set for betting actions.
    pub fn record_success(
        &self,
        session_id: &SessionId,
        kind: Option<ActionKind>,
        warnings: &[ValidationWarning],
    ) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.invariant_warnings
            .fetch_add(warnings.len() as u64, Ordering::Relaxed);
        let integrity = warnings.iter().filter(|w| w.is_chip_integrity()).count() as u64;
        self.with_session(session_id, |m| {
            m.requests += 1;
            m.invariant_warnings += warnings.len() as u64;
            m.chip_integrity_warnings += integrity;
            if let Some(kind) = kind {
                *m.actions.entry(kind).or_default() += 1;
            }
        });
    }

    pub fn record_duplicate(&self, session_id: &SessionId) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.duplicates.fetch_add(1, Ordering::Relaxed);
        self.with_session(session_id, |m| {
            m.requests += 1;
            m.duplicates += 1;
        });
    }

    pub fn record_rejection(&self, session_id: &SessionId) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.rejections.fetch_add(1, Ordering::Relaxed);
        self.with_session(session_id, |m| {
            m.requests += 1;
            m.rejections += 1;
        });
    }

    /// A transition undone, either after an engine fault or a strict-mode audit failure.
    pub fn record_rollback(&self, session_id: &SessionId, warnings: &[ValidationWarning]) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        self.invariant_warnings
            .fetch_add(warnings.len() as u64, Ordering::Relaxed);
        let integrity = warnings.iter().filter(|w| w.is_chip_integrity()).count() as u64;
        self.with_session(session_id, |m| {
            m.requests += 1;
            m.rollbacks += 1;
            m.invariant_warnings += warnings.len() as u64;
            m.chip_integrity_warnings += integrity;
        });
    }

    pub fn session_metrics(&self, session_id: &SessionId) -> Option<SessionMetrics> {
        self.sessions().get(session_id).cloned()
    }

    pub fn health(&self, session_id: &SessionId) -> HealthLevel {
        self.sessions()
            .get(session_id)
            .map_or(HealthLevel::Unknown, SessionMetrics::health)
    }

    pub fn forget_session(&self, session_id: &SessionId) {
        self.sessions().remove(session_id);
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            invariant_warnings: self.invariant_warnings.load(Ordering::Relaxed),
        }
    }

    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            requests = snapshot.requests,
            duplicates = snapshot.duplicates,
            rejections = snapshot.rejections,
            rollbacks = snapshot.rollbacks,
            invariant_warnings = snapshot.invariant_warnings,
            sessions = self.sessions().len(),
            "shell metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        "session".to_string()
    }

    #[test]
    fn unknown_until_first_request() {
        let monitor = GameMonitor::new();
        assert_eq!(monitor.health(&sid()), HealthLevel::Unknown);
        monitor.record_success(&sid(), Some(ActionKind::Call), &[]);
        assert_eq!(monitor.health(&sid()), HealthLevel::Healthy);
        let metrics = monitor.session_metrics(&sid()).unwrap();
        assert_eq!(metrics.actions.get(&ActionKind::Call), Some(&1));
    }

    #[test]
    fn rejections_do_not_degrade_health() {
        let monitor = GameMonitor::new();
        for _ in 0..10 {
            monitor.record_rejection(&sid());
        }
        assert_eq!(monitor.health(&sid()), HealthLevel::Healthy);
        assert_eq!(monitor.snapshot().rejections, 10);
    }

    #[test]
    fn rollback_rate_above_five_percent_is_critical() {
        let monitor = GameMonitor::new();
        for _ in 0..19 {
            monitor.record_success(&sid(), None, &[]);
        }
        monitor.record_rollback(&sid(), &[]);
        // 1 of 20 is exactly 5%
        assert_eq!(monitor.health(&sid()), HealthLevel::Healthy);
        monitor.record_rollback(&sid(), &[]);
        assert_eq!(monitor.health(&sid()), HealthLevel::Critical);
    }

    #[test]
    fn duplicates_and_chip_warnings_raise_a_warning() {
        let monitor = GameMonitor::new();
        for _ in 0..10 {
            monitor.record_success(&sid(), None, &[]);
        }
        monitor.record_duplicate(&sid());
        assert_eq!(monitor.health(&sid()), HealthLevel::Healthy);
        monitor.record_duplicate(&sid());
        monitor.record_duplicate(&sid());
        assert_eq!(monitor.health(&sid()), HealthLevel::Warning);

        let other = "other".to_string();
        monitor.record_success(
            &other,
            None,
            &[ValidationWarning::ChipMismatch {
                expected: 10,
                actual: 9,
            }],
        );
        assert_eq!(monitor.health(&other), HealthLevel::Warning);
        assert_eq!(monitor.snapshot().invariant_warnings, 1);

        monitor.forget_session(&other);
        assert_eq!(monitor.health(&other), HealthLevel::Unknown);
    }
}
