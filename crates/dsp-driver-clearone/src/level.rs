//! Gain/mute channels.
//!
//! A [`LevelControlPoint`] mirrors one gain block on the unit. Its state only
//! changes when the unit reports it: setters transmit and wait for the echo.
//!
//! Volume is exposed as a `u16` so hosts can bind it to a fader directly. The
//! dB reading is mapped linearly onto 0..=65535 over either the fixed range
//! [`ABSOLUTE_MIN_DB`]..=[`ABSOLUTE_MAX_DB`] or the bounds the unit reports for
//! the channel (`MIN_GAIN` / `MAX_GAIN`, or both at once as `MINMAX`).

use crate::config::LevelControlConfig;
use crate::response::{parse_decimal, ResponseLine};
use crate::router::LevelParam;
use crate::state::Confirmed;
use crate::tokenizer::tokenize;
use crate::transmitter::CommandTransmitter;
use dsp_core::capabilities::VolumeControl;
use dsp_core::error::DspError;
use parking_lot::RwLock;

pub const ABSOLUTE_MIN_DB: f64 = -65.0;
pub const ABSOLUTE_MAX_DB: f64 = 20.0;

/// `MUTE` value that toggles on the unit.
pub const MUTE_TOGGLE: &str = "2";

/// Relative gain step for one volume up/down press.
pub const RAMP_STEP_UP: &str = "+2";
pub const RAMP_STEP_DOWN: &str = "-2";

/// Map `db` onto 0..=65535 over `[min, max]`, saturating at both ends.
///
/// Returns `None` when the range is empty or inverted.
pub fn scale(db: f64, min: f64, max: f64) -> Option<u16> {
    if min >= max {
        return None;
    }
    if db <= min {
        return Some(u16::MIN);
    }
    if db >= max {
        return Some(u16::MAX);
    }
    let level = ((db - min) * f64::from(u16::MAX) / (max - min)).round();
    Some(level.clamp(0.0, f64::from(u16::MAX)) as u16)
}

/// Map a 0..=65535 level back onto `[min, max]`, rounded to hundredths of a dB.
pub fn unscale(level: u16, min: f64, max: f64) -> f64 {
    let db = f64::from(level) * (max - min) / f64::from(u16::MAX) + min;
    (db * 100.0).round() / 100.0
}

/// dB value as the unit expects it: two decimals, `.` separator.
pub fn format_db(db: f64) -> String {
    format!("{:.2}", db)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelType {
    Speaker,
    Microphone,
}

/// Device-reported gain bounds in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainBounds {
    pub min_db: f64,
    pub max_db: f64,
}

impl Default for GainBounds {
    fn default() -> Self {
        Self {
            min_db: ABSOLUTE_MIN_DB,
            max_db: ABSOLUTE_MAX_DB,
        }
    }
}

/// One gain/mute channel.
pub struct LevelControlPoint {
    key: String,
    label: String,
    channel: String,
    block: String,
    level_parameter: String,
    mute_parameter: String,
    enabled: bool,
    has_level: bool,
    has_mute: bool,
    level_type: LevelType,
    use_absolute_value: bool,
    unmute_on_volume_up: bool,
    bounds: RwLock<GainBounds>,
    muted: Confirmed<bool>,
    volume_level: Confirmed<u16>,
    transmitter: CommandTransmitter,
}

impl std::fmt::Debug for LevelControlPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelControlPoint")
            .field("key", &self.key)
            .field("channel", &self.channel)
            .field("muted", &self.muted.get())
            .field("volume_level", &self.volume_level.get())
            .finish_non_exhaustive()
    }
}

impl LevelControlPoint {
    /// Build from configuration. `channel` is the resolved channel identifier.
    pub fn new(
        key: impl Into<String>,
        channel: impl Into<String>,
        config: &LevelControlConfig,
        transmitter: CommandTransmitter,
    ) -> Self {
        let key = key.into();
        let label = if config.label.is_empty() {
            key.clone()
        } else {
            config.label.clone()
        };
        Self {
            muted: Confirmed::new(format!("{}.muted", key), false)
                .with_description(format!("{} mute", label)),
            volume_level: Confirmed::new(format!("{}.volume_level", key), 0)
                .with_description(format!("{} volume", label)),
            key,
            label,
            channel: channel.into(),
            block: config.block_name.clone(),
            level_parameter: config.level_parameter.clone(),
            mute_parameter: config.mute_parameter.clone(),
            enabled: !config.disabled,
            has_level: config.has_level,
            has_mute: config.has_mute,
            level_type: if config.is_mic {
                LevelType::Microphone
            } else {
                LevelType::Speaker
            },
            use_absolute_value: config.use_absolute_value,
            unmute_on_volume_up: config.unmute_on_vol_change,
            bounds: RwLock::new(GainBounds::default()),
            transmitter,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_level(&self) -> bool {
        self.has_level
    }

    pub fn has_mute(&self) -> bool {
        self.has_mute
    }

    pub fn level_type(&self) -> LevelType {
        self.level_type
    }

    pub fn level_parameter(&self) -> &str {
        &self.level_parameter
    }

    pub fn mute_parameter(&self) -> &str {
        &self.mute_parameter
    }

    pub fn bounds(&self) -> GainBounds {
        *self.bounds.read()
    }

    /// Mute feedback
    pub fn muted(&self) -> &Confirmed<bool> {
        &self.muted
    }

    /// Normalized volume feedback
    pub fn volume(&self) -> &Confirmed<u16> {
        &self.volume_level
    }

    /// Exact channel match; `MIC 101` never matches `MIC 1012`.
    pub fn matches(&self, channel: &str) -> bool {
        self.channel == channel
    }

    /// Normalization range currently in effect.
    fn active_range(&self) -> (f64, f64) {
        if self.use_absolute_value {
            (ABSOLUTE_MIN_DB, ABSOLUTE_MAX_DB)
        } else {
            let b = self.bounds.read();
            (b.min_db, b.max_db)
        }
    }

    /// Apply a routed response to this channel.
    pub fn apply(&self, param: LevelParam, response: &ResponseLine) {
        match param {
            LevelParam::Mute => {
                let muted = response.value.trim() == "1";
                tracing::debug!(key = %self.key, muted, "mute update");
                self.muted.confirm(muted);
            }
            LevelParam::Gain => {
                let db = match response.decimal() {
                    Ok(db) => db,
                    Err(e) => {
                        tracing::warn!(key = %self.key, error = %e, "gain update skipped");
                        return;
                    }
                };
                let (min, max) = self.active_range();
                match scale(db, min, max) {
                    Some(level) => {
                        tracing::debug!(key = %self.key, db, level, "gain update");
                        self.volume_level.confirm(level);
                    }
                    None => {
                        tracing::warn!(
                            key = %self.key,
                            min,
                            max,
                            "gain bounds invalid, normalization skipped"
                        );
                    }
                }
            }
            LevelParam::MinGain | LevelParam::MaxGain => {
                let db = match response.decimal() {
                    Ok(db) => db,
                    Err(e) => {
                        tracing::warn!(key = %self.key, error = %e, "gain bound update skipped");
                        return;
                    }
                };
                let mut bounds = self.bounds.write();
                if param == LevelParam::MinGain {
                    bounds.min_db = db;
                } else {
                    bounds.max_db = db;
                }
                tracing::debug!(
                    key = %self.key,
                    min = bounds.min_db,
                    max = bounds.max_db,
                    "gain bounds update"
                );
            }
            LevelParam::MinMax => {
                let fields = tokenize(&response.value, ' ');
                let parsed = match fields.as_slice() {
                    [min, max] => parse_decimal("MIN_GAIN", min)
                        .and_then(|min| parse_decimal("MAX_GAIN", max).map(|max| (min, max))),
                    _ => Err(DspError::malformed(
                        response.value.clone(),
                        "expected <min> <max>",
                    )),
                };
                let (min_db, max_db) = match parsed {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(key = %self.key, error = %e, "gain bound update skipped");
                        return;
                    }
                };
                *self.bounds.write() = GainBounds { min_db, max_db };
                tracing::debug!(key = %self.key, min = min_db, max = max_db, "gain bounds update");
            }
        }
    }

    fn send(&self, parameter: &str, value: Option<&str>) {
        if !self.enabled {
            tracing::debug!(key = %self.key, parameter, "level control disabled, command not sent");
            return;
        }
        self.transmitter
            .send_command(&self.channel, &self.block, parameter, value);
    }

    pub fn get_current_gain(&self) {
        self.send(&self.level_parameter, None);
    }

    pub fn get_current_mute(&self) {
        self.send(&self.mute_parameter, None);
    }

    pub fn get_current_min(&self) {
        self.send("MIN_GAIN", None);
    }

    pub fn get_current_max(&self) {
        self.send("MAX_GAIN", None);
    }

    pub fn get_current_min_max(&self) {
        self.get_current_min();
        self.get_current_max();
    }

    fn unmute_if_needed(&self) {
        if self.unmute_on_volume_up && self.muted.get() {
            self.mute_off();
        }
    }
}

impl VolumeControl for LevelControlPoint {
    fn set_volume(&self, level: u16) {
        self.unmute_if_needed();
        let (min, max) = self.active_range();
        if min >= max {
            tracing::warn!(key = %self.key, min, max, "gain bounds invalid, volume not set");
            return;
        }
        let db = unscale(level, min, max);
        tracing::debug!(key = %self.key, level, db, "set volume");
        self.send(&self.level_parameter, Some(&format_db(db)));
    }

    fn volume_up(&self, pressed: bool) {
        if !pressed {
            return;
        }
        self.unmute_if_needed();
        self.send(&self.level_parameter, Some(RAMP_STEP_UP));
    }

    fn volume_down(&self, pressed: bool) {
        if pressed {
            self.send(&self.level_parameter, Some(RAMP_STEP_DOWN));
        }
    }

    fn mute_on(&self) {
        self.send(&self.mute_parameter, Some("1"));
    }

    fn mute_off(&self) {
        self.send(&self.mute_parameter, Some("0"));
    }

    fn mute_toggle(&self) {
        self.send(&self.mute_parameter, Some(MUTE_TOGGLE));
    }

    fn volume_level(&self) -> u16 {
        self.volume_level.get()
    }

    fn is_muted(&self) -> bool {
        self.muted.get()
    }
}
