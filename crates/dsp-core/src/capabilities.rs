//! Control Point Capabilities
//!
//! Fine-grained capability traits that DSP control points implement. A gain
//! block implements [`VolumeControl`]; a telephone or VoIP line implements
//! [`Dialer`]; the device itself implements [`PresetRecall`].
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is synchronous: every operation queues a command and returns immediately
//! - Is thread-safe (requires Send + Sync)
//! - Never reports device state optimistically; feedback arrives through
//!   the implementor's observables once the device answers
//!
//! # Example
//!
//! ```rust,ignore
//! fn mute_all(points: &[Arc<dyn VolumeControl>]) {
//!     for point in points {
//!         point.mute_on();
//!     }
//! }
//! ```

use crate::error::{DspError, DspResult};

// =============================================================================
// VolumeControl - Gain and mute
// =============================================================================

/// Capability: gain and mute control with feedback
///
/// Volume levels are normalized to the full `u16` range so hosts can bind them
/// to faders without knowing the channel's dB range.
pub trait VolumeControl: Send + Sync {
    /// Set an absolute level (0..=65535 mapped onto the channel's dB range)
    fn set_volume(&self, level: u16);

    /// Ramp up while pressed
    fn volume_up(&self, pressed: bool);

    /// Ramp down while pressed
    fn volume_down(&self, pressed: bool);

    fn mute_on(&self);

    fn mute_off(&self);

    /// Toggle mute on the device side
    fn mute_toggle(&self);

    /// Last confirmed normalized level
    fn volume_level(&self) -> u16;

    /// Last confirmed mute state
    fn is_muted(&self) -> bool;
}

// =============================================================================
// Dialer - Telephone and VoIP lines
// =============================================================================

/// A key on a dialer keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypadKey {
    Digit(u8),
    Star,
    Pound,
    Clear,
    Backspace,
}

impl KeypadKey {
    /// The character transmitted for this key, if it is dialable.
    pub fn as_char(&self) -> Option<char> {
        match self {
            KeypadKey::Digit(d) if *d <= 9 => char::from_digit(u32::from(*d), 10),
            KeypadKey::Star => Some('*'),
            KeypadKey::Pound => Some('#'),
            _ => None,
        }
    }

    /// Parse a keypad label such as `5`, `*`, `#`, `clear` or `backspace`.
    pub fn parse(label: &str) -> DspResult<Self> {
        let trimmed = label.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "*" | "star" => Ok(KeypadKey::Star),
            "#" | "pound" => Ok(KeypadKey::Pound),
            "clear" => Ok(KeypadKey::Clear),
            "backspace" | "bksp" => Ok(KeypadKey::Backspace),
            s => match s.parse::<u8>() {
                Ok(d) if d <= 9 => Ok(KeypadKey::Digit(d)),
                _ => Err(DspError::invalid_number("keypad key", trimmed)),
            },
        }
    }
}

/// Capability: call control on one line
pub trait Dialer: Send + Sync {
    /// Dial a number, the buffered dial string, or seize the line.
    ///
    /// While off-hook this hangs up instead.
    fn dial(&self, number: Option<&str>);

    fn end_all_calls(&self);

    fn accept_call(&self);

    fn reject_call(&self);

    fn send_keypad(&self, key: KeypadKey);

    fn do_not_disturb_on(&self);

    fn do_not_disturb_off(&self);

    fn do_not_disturb_toggle(&self);

    fn auto_answer_on(&self);

    fn auto_answer_off(&self);

    fn auto_answer_toggle(&self);

    fn is_off_hook(&self) -> bool;

    fn is_incoming_call(&self) -> bool;
}

// =============================================================================
// PresetRecall
// =============================================================================

/// Capability: recall stored device presets
pub trait PresetRecall: Send + Sync {
    /// Recall by 1-based position in the configured preset list
    fn recall_preset(&self, index: u16);

    /// Recall by configured key or label
    fn recall_preset_named(&self, name: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_chars() {
        assert_eq!(KeypadKey::Digit(0).as_char(), Some('0'));
        assert_eq!(KeypadKey::Digit(9).as_char(), Some('9'));
        assert_eq!(KeypadKey::Star.as_char(), Some('*'));
        assert_eq!(KeypadKey::Pound.as_char(), Some('#'));
        assert_eq!(KeypadKey::Clear.as_char(), None);
        assert_eq!(KeypadKey::Backspace.as_char(), None);
        assert_eq!(KeypadKey::Digit(12).as_char(), None);
    }

    #[test]
    fn test_keypad_parse() {
        assert_eq!(KeypadKey::parse("7").unwrap(), KeypadKey::Digit(7));
        assert_eq!(KeypadKey::parse("*").unwrap(), KeypadKey::Star);
        assert_eq!(KeypadKey::parse("#").unwrap(), KeypadKey::Pound);
        assert_eq!(KeypadKey::parse("Clear").unwrap(), KeypadKey::Clear);
        assert_eq!(KeypadKey::parse(" backspace ").unwrap(), KeypadKey::Backspace);
        assert!(KeypadKey::parse("10").is_err());
        assert!(KeypadKey::parse("x").is_err());
    }
}
