//! Core types and traits for Converge DSP drivers.
//!
//! - [`error`]: shared error taxonomy
//! - [`observable`]: watch-based feedback values
//! - [`capabilities`]: control point traits (`VolumeControl`, `Dialer`, `PresetRecall`)
//! - [`driver`]: the factory seam hosts build drivers through
//! - [`transport`]: byte-stream alias and connectors
//! - [`health`]: link liveness tracking

pub mod capabilities;
pub mod driver;
pub mod error;
pub mod health;
pub mod observable;
pub mod transport;

pub use error::{DspError, DspResult};
pub use observable::Observable;
