//! Driver configuration.
//!
//! Deserialized from the host's `[device]` table. Maps preserve no order in TOML
//! semantics, so control points are ordered by key to keep bootstrap polling
//! deterministic.

use dsp_core::error::{DspError, DspResult};
use dsp_core::health::CommunicationMonitorConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level configuration for one Converge Pro 2 unit.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvergePro2Config {
    /// Unit name used by the heartbeat query (`BOX <box_name> UNIT SN`)
    pub box_name: String,

    #[serde(default)]
    pub communication_monitor: MonitorSettings,

    #[serde(default)]
    pub timing: TimingSettings,

    #[serde(default)]
    pub framing: FramingSettings,

    /// Credentials for transports that prompt before accepting commands
    #[serde(default)]
    pub login: Option<LoginSettings>,

    #[serde(default)]
    pub level_controls: BTreeMap<String, LevelControlConfig>,

    #[serde(default)]
    pub dialers: BTreeMap<String, DialerConfig>,

    #[serde(default)]
    pub presets: BTreeMap<String, PresetConfig>,
}

/// Heartbeat and liveness thresholds, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_ms: u64,
    pub time_to_warning_ms: u64,
    pub time_to_error_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            time_to_warning_ms: 180_000,
            time_to_error_ms: 300_000,
        }
    }
}

impl MonitorSettings {
    pub fn to_monitor_config(&self) -> CommunicationMonitorConfig {
        CommunicationMonitorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            time_to_warning: Duration::from_millis(self.time_to_warning_ms),
            time_to_error: Duration::from_millis(self.time_to_error_ms),
        }
    }
}

/// Device settle times.
///
/// The unit drops or reorders answers when queries arrive back to back, and
/// DTMF digits need a minimum press duration to register.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Gap between consecutive bootstrap queries
    pub bootstrap_settle_ms: u64,
    /// DTMF press to release
    pub keypad_press_ms: u64,
    /// DTMF release to digits-dialed inquiry
    pub keypad_poll_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            bootstrap_settle_ms: 250,
            keypad_press_ms: 500,
            keypad_poll_ms: 50,
        }
    }
}

impl TimingSettings {
    pub fn bootstrap_settle(&self) -> Duration {
        Duration::from_millis(self.bootstrap_settle_ms)
    }

    pub fn keypad_press(&self) -> Duration {
        Duration::from_millis(self.keypad_press_ms)
    }

    pub fn keypad_poll(&self) -> Duration {
        Duration::from_millis(self.keypad_poll_ms)
    }
}

/// Line delimiters and receive queue sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FramingSettings {
    /// Terminator of lines received from the device
    pub rx_delimiter: String,
    /// Terminator appended to every command
    pub tx_delimiter: String,
    /// Lines buffered between the reader and the response processor
    pub queue_capacity: usize,
    /// Longest unterminated line buffered before it is discarded, in bytes
    pub max_line_length: usize,
}

impl Default for FramingSettings {
    fn default() -> Self {
        Self {
            rx_delimiter: "\n".to_string(),
            tx_delimiter: "\r".to_string(),
            queue_capacity: 1024,
            max_line_length: crate::framer::DEFAULT_MAX_LINE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginSettings {
    pub username: String,
    pub password: String,
}

/// One gain/mute channel.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelControlConfig {
    #[serde(default)]
    pub label: String,
    /// Literal protocol channel name, e.g. `MIC 101` or `PROC201`
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub endpoint_type: Option<String>,
    #[serde(default)]
    pub endpoint_number: Option<String>,
    #[serde(default = "default_block_name")]
    pub block_name: String,
    #[serde(default = "default_level_parameter")]
    pub level_parameter: String,
    #[serde(default = "default_mute_parameter")]
    pub mute_parameter: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_true")]
    pub has_level: bool,
    #[serde(default = "default_true")]
    pub has_mute: bool,
    #[serde(default)]
    pub is_mic: bool,
    /// Normalize against the fixed [-65, +20] dB range instead of device bounds
    #[serde(default)]
    pub use_absolute_value: bool,
    /// Unmute before ramping up
    #[serde(default)]
    pub unmute_on_vol_change: bool,
}

impl LevelControlConfig {
    pub fn channel_identifier(&self) -> Option<String> {
        compose_channel(&self.channel_name, &self.endpoint_type, &self.endpoint_number)
    }
}

/// One telephone or VoIP line.
#[derive(Debug, Clone, Deserialize)]
pub struct DialerConfig {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub endpoint_type: Option<String>,
    #[serde(default)]
    pub endpoint_number: Option<String>,
    #[serde(default)]
    pub is_voip: bool,
    /// Clear the local dial string when this driver hangs up the line
    #[serde(default)]
    pub clear_on_hangup: bool,
}

impl DialerConfig {
    pub fn channel_identifier(&self) -> Option<String> {
        compose_channel(&self.channel_name, &self.endpoint_type, &self.endpoint_number)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    #[serde(default)]
    pub label: String,
    /// Device preset identifier sent with `MCCF`
    pub preset: String,
}

fn default_block_name() -> String {
    "LEVEL".to_string()
}

fn default_level_parameter() -> String {
    "GAIN".to_string()
}

fn default_mute_parameter() -> String {
    "MUTE".to_string()
}

fn default_true() -> bool {
    true
}

fn compose_channel(
    channel_name: &Option<String>,
    endpoint_type: &Option<String>,
    endpoint_number: &Option<String>,
) -> Option<String> {
    if let Some(name) = channel_name.as_deref().map(str::trim) {
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    match (endpoint_type.as_deref(), endpoint_number.as_deref()) {
        (Some(t), Some(n)) if !t.trim().is_empty() && !n.trim().is_empty() => {
            Some(format!("{} {}", t.trim(), n.trim()))
        }
        _ => None,
    }
}

impl ConvergePro2Config {
    /// Deserialize a `[device]` table and validate it.
    pub fn from_value(value: toml::Value) -> DspResult<Self> {
        let config: Self = value.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation run before a driver is built.
    pub fn validate(&self) -> DspResult<()> {
        if self.box_name.trim().is_empty() {
            return Err(DspError::Configuration("box_name must not be empty".into()));
        }

        let m = &self.communication_monitor;
        if m.poll_interval_ms == 0 {
            return Err(DspError::Configuration(
                "communication_monitor.poll_interval_ms must be positive".into(),
            ));
        }
        if m.time_to_warning_ms <= m.poll_interval_ms {
            return Err(DspError::Configuration(format!(
                "communication_monitor.time_to_warning_ms ({}) must exceed poll_interval_ms ({})",
                m.time_to_warning_ms, m.poll_interval_ms
            )));
        }
        if m.time_to_error_ms < m.time_to_warning_ms {
            return Err(DspError::Configuration(format!(
                "communication_monitor.time_to_error_ms ({}) must not be less than time_to_warning_ms ({})",
                m.time_to_error_ms, m.time_to_warning_ms
            )));
        }

        if self.framing.rx_delimiter.is_empty() || self.framing.tx_delimiter.is_empty() {
            return Err(DspError::Configuration(
                "framing delimiters must not be empty".into(),
            ));
        }
        if self.framing.queue_capacity == 0 {
            return Err(DspError::Configuration(
                "framing.queue_capacity must be positive".into(),
            ));
        }
        if self.framing.max_line_length == 0 {
            return Err(DspError::Configuration(
                "framing.max_line_length must be positive".into(),
            ));
        }

        for (key, level) in &self.level_controls {
            if level.channel_identifier().is_none() {
                return Err(DspError::Configuration(format!(
                    "level control '{}' needs channel_name or endpoint_type/endpoint_number",
                    key
                )));
            }
        }
        for (key, dialer) in &self.dialers {
            if dialer.channel_identifier().is_none() {
                return Err(DspError::Configuration(format!(
                    "dialer '{}' needs channel_name or endpoint_type/endpoint_number",
                    key
                )));
            }
        }
        for (key, preset) in &self.presets {
            if preset.preset.trim().is_empty() {
                return Err(DspError::Configuration(format!(
                    "preset '{}' has an empty device preset id",
                    key
                )));
            }
        }

        if let Some(login) = &self.login {
            if login.username.is_empty() {
                return Err(DspError::Configuration(
                    "login.username must not be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ConvergePro2Config {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(r#"box_name = "CONVERGE1""#);
        assert_eq!(cfg.communication_monitor.poll_interval_ms, 30_000);
        assert_eq!(cfg.communication_monitor.time_to_warning_ms, 180_000);
        assert_eq!(cfg.communication_monitor.time_to_error_ms, 300_000);
        assert_eq!(cfg.timing.bootstrap_settle_ms, 250);
        assert_eq!(cfg.timing.keypad_press_ms, 500);
        assert_eq!(cfg.timing.keypad_poll_ms, 50);
        assert_eq!(cfg.framing.rx_delimiter, "\n");
        assert_eq!(cfg.framing.tx_delimiter, "\r");
        assert_eq!(cfg.framing.max_line_length, 4096);
        assert!(cfg.login.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_from_value_reports_type_errors() {
        let value = toml::Value::Table(toml::toml! { box_name = 42 });
        assert!(matches!(
            ConvergePro2Config::from_value(value),
            Err(DspError::Toml(_))
        ));

        let value = toml::Value::Table(toml::toml! { box_name = " " });
        assert!(matches!(
            ConvergePro2Config::from_value(value),
            Err(DspError::Configuration(_))
        ));
    }

    #[test]
    fn test_level_control_defaults_and_channel() {
        let cfg = parse(
            r#"
            box_name = "CONVERGE1"
            [level_controls.mic1]
            label = "Lectern Mic"
            endpoint_type = "MIC"
            endpoint_number = "101"
            is_mic = true
            "#,
        );
        let mic = &cfg.level_controls["mic1"];
        assert_eq!(mic.block_name, "LEVEL");
        assert_eq!(mic.level_parameter, "GAIN");
        assert_eq!(mic.mute_parameter, "MUTE");
        assert!(mic.has_level && mic.has_mute);
        assert!(!mic.use_absolute_value);
        assert_eq!(mic.channel_identifier().as_deref(), Some("MIC 101"));
    }

    #[test]
    fn test_channel_name_wins() {
        let cfg = parse(
            r#"
            box_name = "CONVERGE1"
            [dialers.voip]
            channel_name = "UA101"
            endpoint_type = "UA"
            endpoint_number = "101"
            is_voip = true
            "#,
        );
        assert_eq!(
            cfg.dialers["voip"].channel_identifier().as_deref(),
            Some("UA101")
        );
    }

    #[test]
    fn test_validate_rejects_missing_channel() {
        let cfg = parse(
            r#"
            box_name = "CONVERGE1"
            [level_controls.bad]
            label = "No channel"
            "#,
        );
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("level control 'bad'"));
    }

    #[test]
    fn test_validate_rejects_empty_box_name() {
        let cfg = parse(r#"box_name = "  ""#);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_order() {
        let cfg = parse(
            r#"
            box_name = "CONVERGE1"
            [communication_monitor]
            poll_interval_ms = 1000
            time_to_warning_ms = 5000
            time_to_error_ms = 4000
            "#,
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_line_length() {
        let cfg = parse(
            r#"
            box_name = "CONVERGE1"
            [framing]
            max_line_length = 0
            "#,
        );
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_line_length"));
    }

    #[test]
    fn test_missing_box_name_fails_to_parse() {
        let result: Result<ConvergePro2Config, _> = toml::from_str("[presets]");
        assert!(result.is_err());
    }
}
