//! # Converge DSP host
//!
//! Library side of the `converge-dsp` binary. The protocol engine lives in
//! `dsp-driver-clearone`; this crate adds what a standalone host needs around it.
//!
//! - **`config`**: Figment-based loading of the host configuration (TOML file plus
//!   `CONVERGE_DSP_` environment overrides) and its validation.
//! - **`logging`**: `tracing-subscriber` setup with pretty, compact or JSON output.
//! - **`host`**: transport connectors, the reconnect loop and one-shot raw sends.
//! - **`feedback`**: logs every feedback change the driver publishes.

pub mod config;
pub mod feedback;
pub mod host;
pub mod logging;

pub use config::{AppConfig, TransportConfig};
