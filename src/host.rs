//! Connection management for the CLI host.
//!
//! The driver never opens connections itself. The host opens the configured
//! transport, hands the stream to [`ConvergePro2Driver::run`] and reconnects
//! after a delay whenever the session ends.

use crate::config::{AppConfig, TransportConfig};
use anyhow::{Context, Result};
use dsp_core::transport::{connect_tcp, DynSerial};
use dsp_driver_clearone::config::ConvergePro2Config;
use dsp_driver_clearone::framer::LineFramer;
use dsp_driver_clearone::login::{login_prompts, LoginAction, LoginHandshake};
use dsp_driver_clearone::ConvergePro2Driver;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Open the configured transport.
pub async fn connect(transport: &TransportConfig) -> Result<DynSerial> {
    match transport {
        TransportConfig::Tcp {
            host,
            port,
            connect_timeout_ms,
        } => connect_tcp(host, *port, Duration::from_millis(*connect_timeout_ms)).await,
        #[cfg(feature = "serial")]
        TransportConfig::Serial { path, baud_rate } => {
            dsp_core::transport::open_serial_async(path, *baud_rate, "Converge Pro 2").await
        }
        #[cfg(not(feature = "serial"))]
        TransportConfig::Serial { path, .. } => Err(anyhow::anyhow!(
            "serial transport '{}' requires the `serial` feature",
            path
        )),
    }
}

/// Connect, run, and reconnect until the future is dropped.
pub async fn run_forever(driver: &ConvergePro2Driver, config: &AppConfig) {
    let target = config.transport.describe();
    loop {
        match connect(&config.transport)
            .await
            .with_context(|| format!("Failed to connect to {}", target))
        {
            Ok(stream) => {
                tracing::info!(%target, "connected");
                let outcome = driver.run(stream).await;
                tracing::warn!(%target, ?outcome, "session ended");
            }
            Err(e) => {
                tracing::warn!(error = format!("{:#}", e), "connection attempt failed");
            }
        }
        tokio::time::sleep(config.reconnect_delay()).await;
    }
}

/// Send one raw line outside a driver session and collect replies for `window`.
///
/// Answers a login prompt first when the device section configures credentials.
pub async fn send_raw(config: &AppConfig, line: &str, window: Duration) -> Result<Vec<String>> {
    let device = ConvergePro2Config::from_value(config.device.clone())
        .context("Invalid [device] section")?;
    let mut stream = connect(&config.transport)
        .await
        .with_context(|| format!("Failed to connect to {}", config.transport.describe()))?;

    let tx_delimiter = device.framing.tx_delimiter.clone();
    let mut framer = LineFramer::new(device.framing.rx_delimiter.as_bytes())
        .with_max_line(device.framing.max_line_length);
    let mut login = device.login.clone().map(LoginHandshake::new);
    let prompts = if login.is_some() {
        login_prompts()
    } else {
        Vec::new()
    };

    let frame = |text: &str| format!("{}{}", text, tx_delimiter);
    if login.is_none() {
        stream.write_all(frame(line).as_bytes()).await?;
    }

    let mut replies = Vec::new();
    let mut chunk = [0u8; 1024];
    let deadline = tokio::time::Instant::now() + window;

    loop {
        let n = match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Err(_) => break,
            Ok(read) => read.context("Read failed")?,
        };
        if n == 0 {
            break;
        }

        let mut lines = framer.push(&chunk[..n]);
        lines.extend(framer.take_prompt(&prompts));

        for received in lines {
            if let Some(handshake) = login.as_mut().filter(|l| !l.is_logged_in()) {
                match handshake.on_line(&received) {
                    LoginAction::Respond(reply) => {
                        stream.write_all(frame(&reply).as_bytes()).await?;
                        continue;
                    }
                    LoginAction::Completed => {
                        stream.write_all(frame(line).as_bytes()).await?;
                        continue;
                    }
                    LoginAction::Rejected => {
                        return Err(dsp_core::DspError::Login("credentials rejected".into()).into());
                    }
                    LoginAction::None => {}
                }
            }
            replies.push(received);
        }
    }

    Ok(replies)
}
