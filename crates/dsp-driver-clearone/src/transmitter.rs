//! Outbound command path.
//!
//! All writes go through one [`CommandTransmitter`]. Callers enqueue lines
//! without blocking; a single writer task per connection appends the terminator
//! and writes them in order. Commands issued while no connection is attached are
//! dropped: state is re-polled by the bootstrap sequence after the next attach.

use dsp_core::error::{DspError, DspResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Format an endpoint command. A `None` value is the query form.
///
/// `EP MIC 103 LEVEL MUTE 1`, `EP MIC 103 LEVEL GAIN`
pub fn format_command(channel: &str, block: &str, parameter: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!("EP {} {} {} {}", channel, block, parameter, v),
        _ => format!("EP {} {} {}", channel, block, parameter),
    }
}

/// Cloneable handle that queues command lines for the current connection.
#[derive(Clone, Default)]
pub struct CommandTransmitter {
    sender: Arc<RwLock<Option<mpsc::UnboundedSender<String>>>>,
}

impl std::fmt::Debug for CommandTransmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTransmitter")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl CommandTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh queue for a new connection and return its receiving end.
    ///
    /// Anything still queued for the previous connection is discarded with it.
    pub fn connect(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.write() = Some(tx);
        rx
    }

    pub fn disconnect(&self) {
        self.sender.write().take();
    }

    pub fn is_connected(&self) -> bool {
        self.sender
            .read()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Queue one line, failing if no connection is attached.
    pub fn try_send_line(&self, line: impl Into<String>) -> DspResult<()> {
        let line = line.into();
        let guard = self.sender.read();
        let tx = guard.as_ref().ok_or(DspError::NotConnected)?;
        tracing::debug!(%line, "[TX]");
        tx.send(line).map_err(|_| DspError::NotConnected)
    }

    /// Queue one line; fire-and-forget.
    pub fn send_line(&self, line: impl Into<String>) {
        if let Err(e) = self.try_send_line(line) {
            tracing::debug!(error = %e, "[TX] command dropped");
        }
    }

    /// Queue an endpoint command (`None` value = query).
    pub fn send_command(&self, channel: &str, block: &str, parameter: &str, value: Option<&str>) {
        self.send_line(format_command(channel, block, parameter, value));
    }
}

/// Drain `commands` onto `writer`, appending `terminator` to each.
///
/// Returns when the queue is replaced or dropped, or on the first write error.
pub async fn write_commands<W>(
    mut writer: W,
    mut commands: mpsc::UnboundedReceiver<String>,
    terminator: String,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = commands.recv().await {
        let mut frame = Vec::with_capacity(line.len() + terminator.len());
        frame.extend_from_slice(line.as_bytes());
        frame.extend_from_slice(terminator.as_bytes());
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    Ok(())
}
