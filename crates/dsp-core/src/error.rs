//! Custom error types for Converge DSP drivers.
//!
//! `DspError` is the shared error type for the protocol engine. It is built with
//! `thiserror` so the `?` operator converts TOML deserialization errors.
//!
//! ## Error Hierarchy
//!
//! - **`Configuration`**: semantic errors in driver configuration (missing box name,
//!   unordered monitor thresholds, a channel without an identifier).
//! - **`Toml`**: a `[device]` table that does not deserialize.
//! - **`MalformedResponse`**: an inbound line that does not have the minimum shape of
//!   a device response. The response pipeline logs these and drops the line.
//! - **`InvalidNumber`**: a non-numeric value where a decimal was expected.
//! - **`NotConnected`** / **`Login`**: session state problems.
//!
//! Protocol-level errors never escape the receive pipeline; they exist as values so
//! parsing code stays testable with ordinary `Result` assertions.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type DspResult<T> = std::result::Result<T, DspError>;

/// Primary error type for the DSP protocol engine.
///
/// # Error Categories
///
/// 1. **Configuration Errors** - `Configuration`, `Toml`
///    - Occur while building a driver from its configuration
///    - The driver is not started; the host logs the full cause chain
///
/// 2. **Protocol Errors** - `MalformedResponse`, `InvalidNumber`
///    - Occur per received line
///    - Logged and dropped by the receive pipeline, never propagated
///
/// 3. **Session Errors** - `NotConnected`, `Login`
///    - Occur at the transport boundary
///    - The liveness monitor reports them as offline status
#[derive(Error, Debug)]
pub enum DspError {
    /// Configuration validation failed.
    ///
    /// Occurs when configuration values parse correctly but fail semantic validation
    /// (e.g., empty box name, warning threshold shorter than the poll interval).
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Driver configuration could not be deserialized.
    #[error("Invalid driver configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A received line did not match the minimum response shape.
    #[error("Malformed response {line:?}: {reason}")]
    MalformedResponse { line: String, reason: String },

    /// A numeric field could not be parsed.
    #[error("Invalid number for {field}: {value:?}")]
    InvalidNumber { field: String, value: String },

    /// A command was issued while no transport is attached.
    #[error("Not connected")]
    NotConnected,

    /// The device rejected or never completed the login handshake.
    #[error("Login failed: {0}")]
    Login(String),
}

impl DspError {
    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        DspError::MalformedResponse {
            line: line.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_number(field: impl Into<String>, value: impl Into<String>) -> Self {
        DspError::InvalidNumber {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_response_display() {
        let err = DspError::malformed("EP MIC", "expected at least 4 fields");
        assert_eq!(
            err.to_string(),
            "Malformed response \"EP MIC\": expected at least 4 fields"
        );
    }

    #[test]
    fn test_toml_error_converts() {
        fn fails() -> DspResult<u32> {
            Ok(toml::Value::String("x".into()).try_into()?)
        }
        assert!(matches!(fails(), Err(DspError::Toml(_))));
    }
}
