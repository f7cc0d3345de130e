//! Communication health monitoring for a single device link
//!
//! This module provides the [`CommunicationMonitor`] which tracks:
//! - Time since the last line received from the device
//! - Heartbeats sent without any traffic in between (miss counter)
//! - Link status (unknown, ok, warning, error) derived from configurable thresholds
//!
//! The monitor holds no timers of its own. Drivers call [`CommunicationMonitor::record_traffic`]
//! for every received line and [`CommunicationMonitor::record_heartbeat`] /
//! [`CommunicationMonitor::evaluate`] from their poll task.

use crate::observable::Observable;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Link status as seen by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum MonitorStatus {
    /// No traffic seen since the link was (re)attached
    #[default]
    Unknown = 0,
    /// Traffic seen within the warning threshold
    Ok = 1,
    /// No traffic for longer than the warning threshold
    Warning = 2,
    /// No traffic for longer than the error threshold, or link closed
    Error = 3,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Unknown => write!(f, "UNKNOWN"),
            MonitorStatus::Ok => write!(f, "OK"),
            MonitorStatus::Warning => write!(f, "WARNING"),
            MonitorStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// A status transition reported by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: MonitorStatus,
    pub to: MonitorStatus,
}

impl StatusChange {
    /// True when the link came back after an outage (warning/error → ok).
    pub fn is_recovery(&self) -> bool {
        self.to == MonitorStatus::Ok
            && matches!(self.from, MonitorStatus::Warning | MonitorStatus::Error)
    }

    pub fn went_offline(&self) -> bool {
        self.from == MonitorStatus::Ok && self.to != MonitorStatus::Ok
    }
}

/// Configuration for the communication monitor
#[derive(Debug, Clone)]
pub struct CommunicationMonitorConfig {
    /// Interval between heartbeat commands
    pub poll_interval: Duration,
    /// Silence after which the link is considered degraded (offline)
    pub time_to_warning: Duration,
    /// Silence after which the link is considered failed
    pub time_to_error: Duration,
}

impl Default for CommunicationMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            time_to_warning: Duration::from_secs(180),
            time_to_error: Duration::from_secs(300),
        }
    }
}

/// Inner state for CommunicationMonitor
struct MonitorState {
    /// Last received line, or the reset time if nothing arrived yet
    last_traffic: Instant,
    misses: u32,
}

/// Communication monitor for one device connection
///
/// Tracks liveness so that a dead link is detected by aggregate silence
/// rather than by per-command timeouts.
///
/// # Example
/// ```no_run
/// use dsp_core::health::{CommunicationMonitor, CommunicationMonitorConfig};
///
/// let monitor = CommunicationMonitor::new(CommunicationMonitorConfig::default());
///
/// // Every received line
/// if let Some(change) = monitor.record_traffic() {
///     println!("link {} -> {}", change.from, change.to);
/// }
/// ```
pub struct CommunicationMonitor {
    config: CommunicationMonitorConfig,
    state: Mutex<MonitorState>,
    status: Observable<MonitorStatus>,
    online: Observable<bool>,
    missed_heartbeats: Observable<u32>,
}

impl CommunicationMonitor {
    /// Create a new monitor with the given configuration
    pub fn new(config: CommunicationMonitorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MonitorState {
                last_traffic: Instant::now(),
                misses: 0,
            }),
            status: Observable::new("status", MonitorStatus::Unknown),
            online: Observable::new("online", false),
            missed_heartbeats: Observable::new("missed_heartbeats", 0),
        }
    }

    pub fn config(&self) -> &CommunicationMonitorConfig {
        &self.config
    }

    /// Record a received line
    ///
    /// Resets the miss counter and moves the link to `Ok`. Returns the
    /// transition if the status changed.
    pub fn record_traffic(&self) -> Option<StatusChange> {
        {
            let mut state = self.state.lock();
            state.last_traffic = Instant::now();
            if state.misses != 0 {
                state.misses = 0;
                self.missed_heartbeats.set(0);
            }
        }
        self.transition(MonitorStatus::Ok)
    }

    /// Record a heartbeat command sent; returns the updated miss count
    pub fn record_heartbeat(&self) -> u32 {
        let mut state = self.state.lock();
        state.misses = state.misses.saturating_add(1);
        self.missed_heartbeats.set(state.misses);
        state.misses
    }

    /// Evaluate silence against the thresholds at `now`
    ///
    /// Only degrades the status; recovery happens through `record_traffic`.
    pub fn evaluate(&self, now: Instant) -> Option<StatusChange> {
        let silence = now.saturating_duration_since(self.state.lock().last_traffic);

        let target = if silence >= self.config.time_to_error {
            MonitorStatus::Error
        } else if silence >= self.config.time_to_warning {
            MonitorStatus::Warning
        } else {
            return None;
        };

        if target > self.status.get() || self.status.get() == MonitorStatus::Unknown {
            self.transition(target)
        } else {
            None
        }
    }

    /// Restart tracking for a freshly attached link
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            state.last_traffic = Instant::now();
            state.misses = 0;
        }
        self.missed_heartbeats.set(0);
        self.status.set(MonitorStatus::Unknown);
        self.online.set(false);
    }

    /// Mark the link as closed by the transport
    pub fn mark_disconnected(&self) -> Option<StatusChange> {
        self.transition(MonitorStatus::Error)
    }

    pub fn status(&self) -> MonitorStatus {
        self.status.get()
    }

    pub fn is_online(&self) -> bool {
        self.online.get()
    }

    pub fn missed_heartbeats(&self) -> u32 {
        self.state.lock().misses
    }

    /// Status feedback
    pub fn status_observable(&self) -> &Observable<MonitorStatus> {
        &self.status
    }

    /// Online/offline feedback
    pub fn online_observable(&self) -> &Observable<bool> {
        &self.online
    }

    pub fn missed_heartbeats_observable(&self) -> &Observable<u32> {
        &self.missed_heartbeats
    }

    fn transition(&self, to: MonitorStatus) -> Option<StatusChange> {
        let from = self.status.get();
        if from == to {
            return None;
        }
        self.status.set(to);
        let online = to == MonitorStatus::Ok;
        if self.online.get() != online {
            self.online.set(online);
        }
        Some(StatusChange { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CommunicationMonitorConfig {
        CommunicationMonitorConfig {
            poll_interval: Duration::from_millis(100),
            time_to_warning: Duration::from_millis(300),
            time_to_error: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_first_traffic_goes_online() {
        let monitor = CommunicationMonitor::new(test_config());
        assert_eq!(monitor.status(), MonitorStatus::Unknown);
        assert!(!monitor.is_online());

        let change = monitor.record_traffic().unwrap();
        assert_eq!(change.from, MonitorStatus::Unknown);
        assert_eq!(change.to, MonitorStatus::Ok);
        assert!(!change.is_recovery());
        assert!(monitor.is_online());

        // Further traffic is not a transition
        assert!(monitor.record_traffic().is_none());
    }

    #[tokio::test]
    async fn test_traffic_resets_miss_counter() {
        let monitor = CommunicationMonitor::new(test_config());
        assert_eq!(monitor.record_heartbeat(), 1);
        assert_eq!(monitor.record_heartbeat(), 2);
        assert_eq!(monitor.missed_heartbeats_observable().get(), 2);

        monitor.record_traffic();
        assert_eq!(monitor.missed_heartbeats(), 0);
        assert_eq!(monitor.missed_heartbeats_observable().get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_escalates_warning_then_error() {
        let monitor = CommunicationMonitor::new(test_config());
        monitor.record_traffic();

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(monitor.evaluate(Instant::now()).is_none());
        assert!(monitor.is_online());

        tokio::time::advance(Duration::from_millis(150)).await;
        let change = monitor.evaluate(Instant::now()).unwrap();
        assert_eq!(change.to, MonitorStatus::Warning);
        assert!(change.went_offline());
        assert!(!monitor.is_online());

        // Same status again is not reported twice
        assert!(monitor.evaluate(Instant::now()).is_none());

        tokio::time::advance(Duration::from_millis(200)).await;
        let change = monitor.evaluate(Instant::now()).unwrap();
        assert_eq!(change.from, MonitorStatus::Warning);
        assert_eq!(change.to, MonitorStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_after_outage() {
        let monitor = CommunicationMonitor::new(test_config());
        monitor.record_traffic();

        tokio::time::advance(Duration::from_millis(600)).await;
        monitor.evaluate(Instant::now());
        assert_eq!(monitor.status(), MonitorStatus::Error);

        let change = monitor.record_traffic().unwrap();
        assert!(change.is_recovery());
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_reset_returns_to_unknown() {
        let monitor = CommunicationMonitor::new(test_config());
        monitor.record_traffic();
        monitor.record_heartbeat();

        monitor.reset();
        assert_eq!(monitor.status(), MonitorStatus::Unknown);
        assert_eq!(monitor.missed_heartbeats(), 0);
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_disconnect_is_error() {
        let monitor = CommunicationMonitor::new(test_config());
        monitor.record_traffic();

        let change = monitor.mark_disconnected().unwrap();
        assert!(change.went_offline());
        assert_eq!(monitor.status(), MonitorStatus::Error);
    }
}
