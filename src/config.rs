//! Host configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `CONVERGE_DSP_`, nested keys
//!    separated by `__` (e.g. `CONVERGE_DSP_APPLICATION__LOG_LEVEL=debug`)
//!
//! The `[device]` table is passed untouched to the driver factory, which owns
//! its schema.
//!
//! # Example
//! ```no_run
//! use converge_dsp::config::AppConfig;
//!
//! let config = AppConfig::load_from("config/converge.toml")?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), figment::Error>(())
//! ```

use crate::logging::OutputFormat;
use anyhow::{anyhow, Context};
use dsp_core::driver::DriverFactory;
use dsp_driver_clearone::ConvergePro2Factory;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CONVERGE_DSP_";

/// Top-level host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub application: ApplicationConfig,
    /// How to reach the unit
    pub transport: TransportConfig,
    /// Wait between a dropped connection and the next attempt
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Driver configuration (see `ConvergePro2Config`)
    pub device: toml::Value,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "converge-dsp".to_string(),
            log_level: "info".to_string(),
            log_format: default_log_format(),
        }
    }
}

/// Byte-stream transport to the unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Telnet-style TCP session
    Tcp {
        host: String,
        #[serde(default = "default_tcp_port")]
        port: u16,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_ms: u64,
    },
    /// RS-232 (requires the `serial` feature)
    Serial {
        path: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

impl TransportConfig {
    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::Tcp { host, port, .. } => format!("tcp://{}:{}", host, port),
            Self::Serial { path, baud_rate } => format!("serial://{}@{}", path, baud_rate),
        }
    }
}

// Default value functions
fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_tcp_port() -> u16 {
    23
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_baud_rate() -> u32 {
    57_600
}

fn default_reconnect_delay() -> u64 {
    5000
}

impl AppConfig {
    /// Load configuration from a file plus `CONVERGE_DSP_` environment overrides
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// Provider stack used by [`AppConfig::load_from`]
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Validate configuration after loading, including the driver section
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(anyhow!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        self.application
            .log_format
            .parse::<OutputFormat>()
            .map_err(|e| anyhow!(e))?;

        match &self.transport {
            TransportConfig::Tcp { host, port, .. } => {
                if host.trim().is_empty() {
                    return Err(anyhow!("transport.host must not be empty"));
                }
                if *port == 0 {
                    return Err(anyhow!("transport.port must be non-zero"));
                }
            }
            TransportConfig::Serial { path, baud_rate } => {
                if path.trim().is_empty() {
                    return Err(anyhow!("transport.path must not be empty"));
                }
                if *baud_rate == 0 {
                    return Err(anyhow!("transport.baud_rate must be non-zero"));
                }
            }
        }

        if self.reconnect_delay_ms == 0 {
            return Err(anyhow!("reconnect_delay_ms must be positive"));
        }

        ConvergePro2Factory
            .validate(&self.device)
            .context("Invalid [device] section")
    }
}
