//! Stateful frame decoder for the gateway's event stream.
//!
//! The gateway streams newline-delimited frames where each significant line
//! is `data: <json-or-sentinel>`. Chunks arrive at arbitrary byte boundaries
//! (providers flush mid-token, mid-JSON-object, mid-line, even mid-UTF-8
//! codepoint), so the decoder buffers raw bytes and only interprets text
//! once a full line is available. The trailing incomplete fragment is
//! carried over between `feed` calls; boundary alignment with the framing
//! delimiter is never assumed.

/// Terminal sentinel payload. Ends decoding; never yielded downstream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// Incremental decoder turning byte chunks into frame payloads.
///
/// Non-restartable: once the sentinel has been seen, all further input is
/// ignored.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Trailing fragment of the last chunk, carried to the next `feed`.
    buffer: Vec<u8>,
    /// Set when the `[DONE]` sentinel has been decoded.
    done: bool,
}

impl FrameDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sentinel has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk, returning every complete payload it unlocked.
    ///
    /// The last line fragment of the combined buffer is kept back until a
    /// newline (or [`flush`](Self::flush)) completes it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(payload) = self.decode_line(&line) {
                payloads.push(payload);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        payloads
    }

    /// Process the carry-over buffer as one final line at source exhaustion.
    ///
    /// A provider may close the stream without a trailing newline; the
    /// buffered fragment is then a complete line by definition.
    pub fn flush(&mut self) -> Option<String> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    /// Decode one complete line. Returns the payload for significant lines,
    /// None for everything else (blank lines, comments, other fields).
    fn decode_line(&mut self, line: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim();
        let payload = trimmed.strip_prefix(DATA_PREFIX)?.trim();

        if payload == DONE_SENTINEL {
            tracing::debug!("frame decoder reached sentinel");
            self.done = true;
            return None;
        }
        if payload.is_empty() {
            return None;
        }
        Some(payload.to_string())
    }
}
