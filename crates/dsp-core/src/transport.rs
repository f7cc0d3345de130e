//! Byte-Stream Transport Abstractions
//!
//! Drivers never open connections themselves; the host hands them a duplex byte
//! stream. This module provides the trait alias those streams satisfy and the
//! connectors the CLI host uses to produce them.
//!
//! # Types
//!
//! - [`SerialPortIO`]: Trait alias combining AsyncRead + AsyncWrite
//! - [`DynSerial`]: Type-erased boxed stream
//!
//! # Connectors
//!
//! - [`connect_tcp`]: Telnet-style TCP session (Converge Pro 2 listens on port 23)
//! - [`open_serial_async`]: RS-232 port, behind the `serial` feature

use anyhow::Context;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

// =============================================================================
// Stream Trait
// =============================================================================

/// Trait alias for async duplex I/O.
///
/// Any type implementing `AsyncRead + AsyncWrite + Unpin + Send` can carry the
/// protocol. This includes:
/// - `tokio::net::TcpStream`
/// - `tokio_serial::SerialStream` (real hardware)
/// - `tokio::io::DuplexStream` (testing)
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}

// Blanket implementation for all types meeting the requirements
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased boxed stream.
pub type DynSerial = Box<dyn SerialPortIO>;

// =============================================================================
// Connectors
// =============================================================================

/// Open a TCP session to the device with a connect timeout.
///
/// Nagle is disabled: commands are short and latency matters more than packing.
pub async fn connect_tcp(host: &str, port: u16, timeout: Duration) -> anyhow::Result<DynSerial> {
    let addr = format!("{}:{}", host, port);
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .with_context(|| format!("Timed out connecting to {}", addr))?
        .with_context(|| format!("Failed to connect to {}", addr))?;
    stream
        .set_nodelay(true)
        .context("Failed to set TCP_NODELAY")?;
    tracing::info!(%addr, "TCP connection established");
    Ok(Box::new(stream))
}

/// Open a serial port asynchronously using spawn_blocking.
///
/// Standard settings are applied: 8N1, no flow control.
///
/// # Errors
///
/// Returns an error if the port cannot be opened or spawn_blocking fails.
#[cfg(feature = "serial")]
pub async fn open_serial_async(
    port_path: &str,
    baud_rate: u32,
    device_name: &str,
) -> anyhow::Result<DynSerial> {
    use tokio::task::spawn_blocking;
    use tokio_serial::SerialPortBuilderExt;

    let port_path_owned = port_path.to_string();
    let device_name_owned = device_name.to_string();

    let port = spawn_blocking(move || {
        tokio_serial::new(&port_path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .context(format!(
                "Failed to open {} serial port: {}",
                device_name_owned, port_path_owned
            ))
    })
    .await
    .context("spawn_blocking for serial port opening failed")??;

    Ok(Box::new(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_duplex_is_serial_port_io() {
        let (client, _server) = tokio::io::duplex(64);
        let _boxed: DynSerial = Box::new(client);
    }

    #[tokio::test]
    async fn test_connect_tcp_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = connect_tcp("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        stream.write_all(b"hello").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_connect_tcp_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect_tcp("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(result.is_err());
    }
}
