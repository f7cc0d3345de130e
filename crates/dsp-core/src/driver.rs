//! Driver Factory Types
//!
//! Drivers implement [`DriverFactory`] so a host can validate and build them from
//! a TOML table without knowing their concrete configuration types.
//!
//! ```text
//!   host config [device] table
//!            │
//!            ▼
//!   DriverFactory::validate()  ── early, no side effects
//!            │
//!            ▼
//!   DriverFactory::build()     ── driver with control points, not yet attached
//!            │
//!            ▼
//!   driver.run(stream)         ── host supplies the byte stream
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Capabilities a driver type can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Gain/mute channels
    /// Corresponds to [`crate::capabilities::VolumeControl`]
    VolumeControl,

    /// Telephone or VoIP lines
    /// Corresponds to [`crate::capabilities::Dialer`]
    Dialer,

    /// Stored presets
    /// Corresponds to [`crate::capabilities::PresetRecall`]
    PresetRecall,
}

/// Factory that turns a TOML configuration table into a driver.
pub trait DriverFactory: Send + Sync + 'static {
    /// The driver this factory builds.
    type Driver;

    /// Stable identifier for logs and diagnostics.
    fn driver_type(&self) -> &'static str;

    /// Human-readable name for documentation and error messages.
    fn name(&self) -> &'static str;

    /// List of capabilities this driver type provides.
    fn capabilities(&self) -> &'static [Capability] {
        &[]
    }

    /// Validate configuration without instantiating.
    ///
    /// Called before `build()` to provide early error feedback.
    fn validate(&self, config: &toml::Value) -> Result<()>;

    /// Instantiate the driver. No I/O happens here; the transport is attached later.
    fn build(&self, config: toml::Value) -> Result<Self::Driver>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullFactory;

    impl DriverFactory for NullFactory {
        type Driver = ();

        fn driver_type(&self) -> &'static str {
            "null"
        }

        fn name(&self) -> &'static str {
            "Null Driver"
        }

        fn validate(&self, config: &toml::Value) -> Result<()> {
            config
                .as_table()
                .map(|_| ())
                .ok_or_else(|| anyhow::anyhow!("expected table"))
        }

        fn build(&self, config: toml::Value) -> Result<()> {
            self.validate(&config)
        }
    }

    #[test]
    fn test_default_capabilities_empty() {
        assert!(NullFactory.capabilities().is_empty());
    }

    #[test]
    fn test_validate_before_build() {
        let factory = NullFactory;
        assert!(factory.validate(&toml::Value::Integer(3)).is_err());
        assert!(factory
            .build(toml::Value::Table(toml::map::Map::new()))
            .is_ok());
    }
}
