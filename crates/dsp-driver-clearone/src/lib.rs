//! ClearOne Converge Pro 2 driver.
//!
//! Turns the unit's line-oriented ASCII protocol into typed control points:
//! - [`LevelControlPoint`]: gain/mute channels ([`dsp_core::capabilities::VolumeControl`])
//! - [`DialerLine`]: TELCO and VoIP lines ([`dsp_core::capabilities::Dialer`])
//! - presets on the driver itself ([`dsp_core::capabilities::PresetRecall`])
//!
//! # Usage
//!
//! ```rust,ignore
//! use dsp_core::driver::DriverFactory;
//! use dsp_driver_clearone::ConvergePro2Factory;
//!
//! let driver = ConvergePro2Factory.build(device_table)?;
//! let outcome = driver.run(stream).await;
//! ```

pub mod bootstrap;
pub mod config;
pub mod converge_pro2;
pub mod dialer;
pub mod framer;
pub mod level;
pub mod liveness;
pub mod login;
pub mod preset;
pub mod response;
pub mod router;
pub mod state;
pub mod tokenizer;
pub mod transmitter;

pub use config::ConvergePro2Config;
pub use converge_pro2::{ConvergePro2Driver, ConvergePro2Factory};
pub use dialer::{DialerLine, LineMode};
pub use framer::ReadOutcome;
pub use level::LevelControlPoint;

/// Force the linker to include this crate.
///
/// Call this function from main() to ensure the driver factory is linked
/// into the final binary and not stripped by the linker.
#[inline(never)]
pub fn link() {
    std::hint::black_box(std::any::TypeId::of::<ConvergePro2Factory>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_does_not_panic() {
        link();
    }
}
