//! Feedback logging for the CLI host.
//!
//! Subscribes to every observable the driver exposes and logs each change, so
//! a headless session shows what a control surface would display.

use dsp_core::observable::{Observable, ObservableMetadata};
use dsp_driver_clearone::ConvergePro2Driver;
use std::fmt::Debug;
use tokio::task::JoinHandle;

fn log_changes<T>(observable: &Observable<T>) -> JoinHandle<()>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    let ObservableMetadata { name, description } = observable.metadata();
    let description = description.unwrap_or_default();
    let mut rx = observable.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let value = rx.borrow_and_update().clone();
            tracing::info!(feedback = %name, %description, ?value, "feedback");
        }
    })
}

/// Spawn one logging task per observable. Abort the handles to stop.
pub fn spawn_feedback_logging(driver: &ConvergePro2Driver) -> Vec<JoinHandle<()>> {
    let mut tasks = vec![
        log_changes(driver.monitor().status_observable()),
        log_changes(driver.online()),
        log_changes(driver.logged_in()),
    ];

    for level in driver.levels() {
        tasks.push(log_changes(level.muted().observable()));
        tasks.push(log_changes(level.volume().observable()));
    }

    for line in driver.dialers() {
        tasks.push(log_changes(line.off_hook().observable()));
        tasks.push(log_changes(line.incoming_call().observable()));
        tasks.push(log_changes(line.do_not_disturb().observable()));
        tasks.push(log_changes(line.auto_answer().observable()));
        tasks.push(log_changes(line.caller_id_number().observable()));
        tasks.push(log_changes(line.local_number().observable()));
        tasks.push(log_changes(line.dial_string().observable()));
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsp_core::driver::DriverFactory;
    use dsp_driver_clearone::ConvergePro2Factory;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_one_task_per_observable() {
        let device = toml::Value::Table(toml::toml! {
            box_name = "CP2"

            [level_controls.podium]
            channel_name = "MIC 101"

            [dialers.phone]
            channel_name = "TELCO 1"
        });
        let driver = ConvergePro2Factory.build(device).unwrap();

        let tasks = spawn_feedback_logging(&driver);
        assert_eq!(tasks.len(), 3 + 2 + 7);
        for task in tasks {
            task.abort();
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_change_logged_with_description() {
        let muted = Observable::new("podium.muted", false).with_description("Podium mute");
        let task = log_changes(&muted);
        tokio::task::yield_now().await;

        muted.set(true);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(logs_contain("podium.muted"));
        assert!(logs_contain("Podium mute"));
        task.abort();
    }
}
