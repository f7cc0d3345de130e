//! Initial state synchronization.
//!
//! The unit has no "report everything" command, so every control point is
//! queried individually in a fixed order: gain bounds first (gain
//! normalization depends on them), then gains, mutes, and finally dialer
//! lines. Level queries are spaced by the settle delay. Answers arriving
//! mid-sequence are handled by the response pipeline as usual.

use crate::dialer::DialerLine;
use crate::level::LevelControlPoint;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    MinGain(usize),
    MaxGain(usize),
    Gain(usize),
    Mute(usize),
    /// VoIP notification registration
    Subscribe(usize),
    /// Hook and status polls
    Poll(usize),
}

impl BootstrapStep {
    /// Whether the settle delay follows this step.
    pub fn settles(&self) -> bool {
        matches!(
            self,
            Self::MinGain(_) | Self::MaxGain(_) | Self::Gain(_) | Self::Mute(_)
        )
    }
}

/// Ordered steps for the given control points. Indices refer to the slices.
///
/// Disabled level points are skipped entirely. Subscriptions go out before any
/// dialer poll so a poll answer is always the last word on hook state.
pub fn bootstrap_plan(levels: &[Arc<LevelControlPoint>], dialers: &[Arc<DialerLine>]) -> Vec<BootstrapStep> {
    let with_level: Vec<usize> = levels
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_enabled() && p.has_level())
        .map(|(i, _)| i)
        .collect();

    let mut plan = Vec::new();
    for &i in &with_level {
        plan.push(BootstrapStep::MinGain(i));
        plan.push(BootstrapStep::MaxGain(i));
    }
    plan.extend(with_level.iter().map(|&i| BootstrapStep::Gain(i)));
    plan.extend(
        levels
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_enabled() && p.has_mute())
            .map(|(i, _)| BootstrapStep::Mute(i)),
    );
    plan.extend((0..dialers.len()).map(BootstrapStep::Subscribe));
    plan.extend((0..dialers.len()).map(BootstrapStep::Poll));
    plan
}

/// Issue the full bootstrap sequence.
pub async fn run_bootstrap(
    levels: Vec<Arc<LevelControlPoint>>,
    dialers: Vec<Arc<DialerLine>>,
    settle: Duration,
) {
    let plan = bootstrap_plan(&levels, &dialers);
    tracing::info!(
        steps = plan.len(),
        levels = levels.len(),
        dialers = dialers.len(),
        "bootstrap started"
    );

    for step in plan {
        match step {
            BootstrapStep::MinGain(i) => levels[i].get_current_min(),
            BootstrapStep::MaxGain(i) => levels[i].get_current_max(),
            BootstrapStep::Gain(i) => levels[i].get_current_gain(),
            BootstrapStep::Mute(i) => levels[i].get_current_mute(),
            BootstrapStep::Subscribe(i) => dialers[i].subscribe_to_notifications(),
            BootstrapStep::Poll(i) => dialers[i].poll(),
        }
        if step.settles() {
            tokio::time::sleep(settle).await;
        }
    }

    tracing::info!("bootstrap complete");
}
