//! Converge Pro 2 session tests
//!
//! Drives a full driver session over an in-memory duplex stream with the test
//! playing the device: it reads CR-terminated commands and writes LF-terminated
//! responses.
//!
//! Run with: `cargo test -p dsp-driver-clearone --test session_test`

use dsp_core::capabilities::{Dialer, VolumeControl};
use dsp_core::driver::DriverFactory;
use dsp_core::health::MonitorStatus;
use dsp_driver_clearone::{ConvergePro2Driver, ConvergePro2Factory, ReadOutcome};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

// =============================================================================
// Simulated device
// =============================================================================

struct Device {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Device {
    /// Next command sent by the driver, without its terminator.
    async fn next_command(&mut self) -> String {
        let mut buf = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(600),
            self.reader.read_until(b'\r', &mut buf),
        )
        .await
        .expect("timed out waiting for a command")
        .expect("read failed");
        String::from_utf8(buf).unwrap().trim().to_string()
    }

    /// Read commands until `command` arrives; returns everything read.
    async fn expect_command(&mut self, command: &str) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            let line = self.next_command().await;
            seen.push(line.clone());
            if line == command {
                return seen;
            }
        }
    }

    async fn send(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

fn build(config: &str) -> ConvergePro2Driver {
    let table: toml::Value = toml::from_str(config).unwrap();
    ConvergePro2Factory.build(table).unwrap()
}

fn attach(driver: &ConvergePro2Driver) -> (Device, JoinHandle<ReadOutcome>) {
    let (host, device) = tokio::io::duplex(16 * 1024);
    let session = tokio::spawn({
        let driver = driver.clone();
        async move { driver.run(host).await }
    });
    let (reader, writer) = tokio::io::split(device);
    (
        Device {
            reader: BufReader::new(reader),
            writer,
        },
        session,
    )
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

const LEVEL_CONFIG: &str = r#"
box_name = "CP2"

[level_controls.podium]
label = "Podium"
endpoint_type = "MIC"
endpoint_number = "101"
"#;

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test(start_paused = true)]
async fn bounds_are_answered_before_gain_is_queried() {
    let driver = build(LEVEL_CONFIG);
    let (mut device, _session) = attach(&driver);

    let mut seen = Vec::new();
    loop {
        let command = device.next_command().await;
        seen.push(command.clone());
        match command.as_str() {
            "EP MIC 101 LEVEL MIN_GAIN" => device.send("EP MIC 101 LEVEL MIN_GAIN -40.00\n").await,
            "EP MIC 101 LEVEL MAX_GAIN" => device.send("EP MIC 101 LEVEL MAX_GAIN 0.00\n").await,
            "EP MIC 101 LEVEL GAIN" => {
                let bounds = driver.level("podium").unwrap().bounds();
                assert_eq!((bounds.min_db, bounds.max_db), (-40.0, 0.0));
                break;
            }
            _ => {}
        }
    }

    let position = |c: &str| seen.iter().position(|s| s == c).unwrap();
    assert!(position("EP MIC 101 LEVEL MIN_GAIN") < position("EP MIC 101 LEVEL MAX_GAIN"));
    assert!(position("EP MIC 101 LEVEL MAX_GAIN") < position("EP MIC 101 LEVEL GAIN"));

    device.expect_command("EP MIC 101 LEVEL MUTE").await;
}

#[tokio::test(start_paused = true)]
async fn dialer_polls_follow_level_queries() {
    let driver = build(
        r#"
        box_name = "CP2"

        [level_controls.podium]
        channel_name = "MIC 101"

        [dialers.phone]
        channel_name = "TELCO 1"
        "#,
    );
    let (mut device, _session) = attach(&driver);

    let seen = device.expect_command("EP TELCO 1 INQUIRE HOOK").await;
    let bootstrap: Vec<&str> = seen
        .iter()
        .map(String::as_str)
        .filter(|c| c.starts_with("EP "))
        .collect();
    assert_eq!(
        bootstrap,
        vec![
            "EP MIC 101 LEVEL MIN_GAIN",
            "EP MIC 101 LEVEL MAX_GAIN",
            "EP MIC 101 LEVEL GAIN",
            "EP MIC 101 LEVEL MUTE",
            "EP TELCO 1 INQUIRE HOOK",
        ]
    );
    assert!(seen.contains(&"BOX CP2 UNIT SN".to_string()));
}

// =============================================================================
// End-to-end responses
// =============================================================================

#[tokio::test(start_paused = true)]
async fn absolute_gain_line_sets_volume_level() {
    let driver = build(
        r#"
        box_name = "CP2"

        [level_controls.mic]
        channel_name = "MIC101"
        use_absolute_value = true
        "#,
    );
    let (mut device, _session) = attach(&driver);

    device.send("EP MIC101 LEVEL GAIN -10.50\n").await;

    let expected = (((-10.50f64 - (-65.0)) * 65535.0) / (20.0 - (-65.0))).round() as u16;
    let mic = driver.level("mic").unwrap().clone();
    wait_until(|| mic.volume_level() == expected).await;
    assert_eq!(mic.volume_level(), 42020);
}

#[tokio::test(start_paused = true)]
async fn incoming_notification_leaves_hook_state() {
    let driver = build(
        r#"
        box_name = "CP2"

        [dialers.voip]
        channel_name = "UA101"
        is_voip = true
        "#,
    );
    let (mut device, _session) = attach(&driver);
    let line = driver.dialer("voip").unwrap().clone();

    device.send("EP UA101 KEY KEY_HOOK 1\n").await;
    wait_until(|| line.is_off_hook()).await;

    device
        .send("EP UA101 NOTIFICATION STATE_CHANGE PL 1;INCOMING:\"5551234\" <SIP:5551234@10.0.0.1>\n")
        .await;
    wait_until(|| line.is_incoming_call()).await;

    assert!(line.is_off_hook());
    assert_eq!(line.caller_id_number().get(), "5551234");
}

#[tokio::test(start_paused = true)]
async fn channel_match_is_exact() {
    let driver = build(
        r#"
        box_name = "CP2"

        [level_controls.a]
        channel_name = "MIC 101"
        use_absolute_value = true

        [level_controls.b]
        channel_name = "MIC 1012"
        use_absolute_value = true

        [level_controls.c]
        channel_name = "MIC 10"
        use_absolute_value = true
        "#,
    );
    let (mut device, _session) = attach(&driver);

    device.send("EP MIC 101 LEVEL MUTE 1\n").await;
    device.send("EP MIC 1012 LEVEL GAIN 20.00\n").await;

    let b = driver.level("b").unwrap().clone();
    wait_until(|| b.volume_level() == u16::MAX).await;

    assert!(driver.level("a").unwrap().is_muted());
    assert!(!b.is_muted());
    assert!(!driver.level("c").unwrap().is_muted());
    assert_eq!(driver.level("a").unwrap().volume_level(), 0);
    assert_eq!(driver.level("c").unwrap().volume_level(), 0);
}

#[tokio::test(start_paused = true)]
async fn set_volume_transmits_device_bounds_value() {
    let driver = build(LEVEL_CONFIG);
    let (mut device, _session) = attach(&driver);

    device.send("EP MIC 101 LEVEL MIN_GAIN -40.00\n").await;
    device.send("EP MIC 101 LEVEL MAX_GAIN 0.00\n").await;
    let podium = driver.level("podium").unwrap().clone();
    wait_until(|| podium.bounds().max_db == 0.0).await;

    podium.set_volume(0);
    device.expect_command("EP MIC 101 LEVEL GAIN -40.00").await;
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test(start_paused = true)]
async fn login_handshake_precedes_bootstrap() {
    let driver = build(
        r#"
        box_name = "CP2"

        [login]
        username = "clearone"
        password = "converge"

        [level_controls.podium]
        channel_name = "MIC 101"
        "#,
    );
    let (mut device, _session) = attach(&driver);

    device.send("ClearOne Converge Pro 2\r\nUsername: ").await;
    assert_eq!(device.next_command().await, "clearone");
    assert!(!driver.logged_in().get());

    device.send("Password: ").await;
    assert_eq!(device.next_command().await, "converge");

    device.send("\r\n=> ").await;
    let seen = device.expect_command("EP MIC 101 LEVEL MIN_GAIN").await;
    assert!(driver.logged_in().get());
    assert!(seen.iter().all(|c| c != "clearone" && c != "converge"));
}

// =============================================================================
// Liveness and reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn recovery_after_silence_resynchronizes() {
    let driver = build(LEVEL_CONFIG);
    let (mut device, _session) = attach(&driver);

    device.expect_command("EP MIC 101 LEVEL MUTE").await;
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(driver.monitor().status(), MonitorStatus::Warning);
    assert!(!driver.online().get());

    device.send("BOX CP2 UNIT SN 0123456789\n").await;
    device.expect_command("EP MIC 101 LEVEL MIN_GAIN").await;
    assert!(driver.online().get());
    assert_eq!(driver.monitor().missed_heartbeats(), 0);
}

#[tokio::test(start_paused = true)]
async fn reconnect_runs_a_fresh_bootstrap() {
    let driver = build(LEVEL_CONFIG);

    let (mut device, session) = attach(&driver);
    device.expect_command("EP MIC 101 LEVEL MIN_GAIN").await;
    device.send("EP MIC 101 LEVEL MUTE 1\n").await;
    drop(device);
    assert_eq!(session.await.unwrap(), ReadOutcome::Eof);
    assert!(!driver.is_connected());
    assert!(!driver.online().get());

    // Commands issued while detached are dropped
    driver.level("podium").unwrap().mute_off();

    let (mut device, _session) = attach(&driver);
    let seen = device.expect_command("EP MIC 101 LEVEL MIN_GAIN").await;
    assert!(seen.iter().all(|c| c != "EP MIC 101 LEVEL MUTE 0"));
    assert!(driver.level("podium").unwrap().is_muted());
}
