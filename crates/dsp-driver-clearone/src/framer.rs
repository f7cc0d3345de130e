//! Line framing and the receive queue.
//!
//! The reader task owns the read half of the transport. It frames bytes into
//! lines and pushes them onto a bounded queue drained by exactly one response
//! processor, so handlers never race each other on shared state.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

const READ_CHUNK: usize = 1024;

/// Longest unterminated line kept before it is discarded.
pub const DEFAULT_MAX_LINE: usize = 4096;

/// Splits an unframed byte stream on a delimiter.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    delimiter: Vec<u8>,
    max_line: usize,
    /// Inside an oversized line whose head was already dropped
    discarding: bool,
}

impl LineFramer {
    pub fn new(delimiter: impl Into<Vec<u8>>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_CHUNK),
            delimiter: delimiter.into(),
            max_line: DEFAULT_MAX_LINE,
            discarding: false,
        }
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line.max(1);
        self
    }

    /// Append a chunk and return every line it completed, in arrival order.
    ///
    /// Lines are trimmed of surrounding whitespace (including a stray `\r` when
    /// the device terminates with CRLF). Empty lines are discarded. A partial
    /// line that outgrows the maximum line length is dropped; framing resumes
    /// after the next delimiter.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        // Keep only a possible delimiter prefix while skipping an oversized line
        if self.discarding && find(&self.buffer, &self.delimiter).is_none() {
            let keep = self.delimiter.len().saturating_sub(1).min(self.buffer.len());
            let skip = self.buffer.len() - keep;
            self.buffer.advance(skip);
            return Vec::new();
        }

        let mut lines = Vec::new();
        while let Some(pos) = find(&self.buffer, &self.delimiter) {
            let raw = self.buffer.split_to(pos);
            self.buffer.advance(self.delimiter.len());
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        if self.buffer.len() > self.max_line {
            tracing::warn!(
                pending = self.buffer.len(),
                max_line = self.max_line,
                "[RX] no delimiter within line limit, discarding partial line"
            );
            self.buffer.clear();
            self.discarding = true;
        }

        lines
    }

    /// Bytes received after the last delimiter.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Emit an unterminated prompt (`Username:`, `Password:`, `=>`) as a line.
    ///
    /// Login prompts are not followed by a delimiter, so they would otherwise
    /// sit in the buffer until the next line arrives.
    pub fn take_prompt(&mut self, prompts: &[String]) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.buffer).trim_end().to_string();
        if prompts.iter().any(|p| !p.is_empty() && text.ends_with(p.as_str())) {
            self.buffer.clear();
            Some(text.trim().to_string())
        } else {
            None
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Why the reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The peer closed the stream
    Eof,
    /// A read failed
    Error(String),
    /// The response processor is gone
    QueueClosed,
}

/// Read until the stream ends, pushing framed lines onto `queue`.
///
/// Never awaits queue capacity: a full queue drops the line with a warning so
/// the transport read path is not blocked by slow processing.
pub async fn read_lines<R>(
    mut reader: R,
    mut framer: LineFramer,
    queue: mpsc::Sender<String>,
    prompts: Vec<String>,
) -> ReadOutcome
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                tracing::debug!("[RX] stream closed by peer");
                return ReadOutcome::Eof;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "[RX] read failed");
                return ReadOutcome::Error(e.to_string());
            }
        };

        let mut lines = framer.push(&chunk[..n]);
        if let Some(prompt) = framer.take_prompt(&prompts) {
            lines.push(prompt);
        }

        for line in lines {
            match queue.try_send(line) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(line)) => {
                    tracing::warn!(%line, "[RX] receive queue full, dropping line");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    return ReadOutcome::QueueClosed;
                }
            }
        }
    }
}
