//! Host configuration loading tests
//!
//! Run with: `cargo test --test config_test`

use converge_dsp::config::{AppConfig, TransportConfig};
use dsp_core::driver::DriverFactory;
use dsp_driver_clearone::{ConvergePro2Config, ConvergePro2Factory};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn loads_full_configuration() {
    let file = write_config(
        r#"
        reconnect_delay_ms = 2500

        [application]
        name = "Boardroom"
        log_level = "debug"
        log_format = "json"

        [transport]
        kind = "serial"
        path = "/dev/ttyUSB0"

        [device]
        box_name = "CONVERGE1"

        [device.level_controls.podium]
        endpoint_type = "MIC"
        endpoint_number = "101"

        [device.dialers.voip]
        endpoint_type = "UA"
        endpoint_number = "101"
        is_voip = true

        [device.presets.day]
        preset = "1"
        "#,
    );

    let config = AppConfig::load_from(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.reconnect_delay_ms, 2500);
    assert_eq!(
        config.transport,
        TransportConfig::Serial {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 57_600,
        }
    );

    let device: ConvergePro2Config = config.device.clone().try_into().unwrap();
    assert_eq!(device.box_name, "CONVERGE1");
    assert_eq!(
        device.level_controls["podium"].channel_identifier().as_deref(),
        Some("MIC 101")
    );

    let driver = ConvergePro2Factory.build(config.device).unwrap();
    assert_eq!(driver.dialer("voip").unwrap().channel(), "UA 101");
    assert_eq!(driver.presets().len(), 1);
}

#[test]
fn shipped_example_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/converge.toml");
    let config = AppConfig::load_from(path).unwrap();
    config.validate().unwrap();
}

#[test]
fn rejects_level_control_without_channel() {
    let file = write_config(
        r#"
        [transport]
        kind = "tcp"
        host = "10.0.0.20"

        [device]
        box_name = "CONVERGE1"

        [device.level_controls.orphan]
        label = "No channel"
        "#,
    );

    let config = AppConfig::load_from(file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("orphan"));
}

#[test]
fn missing_transport_fails_to_load() {
    let file = write_config(
        r#"
        [device]
        box_name = "CONVERGE1"
        "#,
    );
    assert!(AppConfig::load_from(file.path()).is_err());
}
