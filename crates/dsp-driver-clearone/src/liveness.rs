//! Heartbeat polling.
//!
//! Sends `BOX <name> UNIT SN` every poll interval. Any received line counts as
//! traffic; a heartbeat that goes unanswered counts as a miss.

use crate::transmitter::CommandTransmitter;
use dsp_core::health::{CommunicationMonitor, StatusChange};
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};

/// Misses after which every further heartbeat logs a warning.
pub const MISSED_HEARTBEAT_WARNING: u32 = 5;

pub fn heartbeat_command(box_name: &str) -> String {
    format!("BOX {} UNIT SN", box_name)
}

/// Log a status change; returns it unchanged.
pub fn log_status_change(change: StatusChange) -> StatusChange {
    if change.went_offline() {
        tracing::warn!(from = %change.from, to = %change.to, "device communication degraded");
    } else {
        tracing::info!(from = %change.from, to = %change.to, "device communication status");
    }
    change
}

/// One heartbeat tick: evaluate silence, then send the next heartbeat.
pub fn heartbeat_tick(
    monitor: &CommunicationMonitor,
    transmitter: &CommandTransmitter,
    box_name: &str,
    now: Instant,
) -> Option<StatusChange> {
    let change = monitor.evaluate(now).map(log_status_change);

    let misses = monitor.record_heartbeat();
    if misses >= MISSED_HEARTBEAT_WARNING {
        tracing::warn!(box_name, misses, "heartbeat unanswered");
    }
    transmitter.send_line(heartbeat_command(box_name));
    change
}

/// Poll until the transmitter is detached.
pub async fn run_heartbeat(
    monitor: Arc<CommunicationMonitor>,
    transmitter: CommandTransmitter,
    box_name: String,
) {
    let mut interval = tokio::time::interval(monitor.config().poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let now = interval.tick().await;
        if !transmitter.is_connected() {
            tracing::debug!(box_name = %box_name, "heartbeat stopped, transport detached");
            break;
        }
        heartbeat_tick(&monitor, &transmitter, &box_name, now);
    }
}
