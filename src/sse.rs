//! Incremental decoding of a server-sent-event body.
//!
//! ```text
//! bytes ──► Utf8Carry ──► LineBuffer ──► parse_line ──► SseLine
//! ```
//!
//! Both buffers carry state across chunk boundaries: a chunk may end in the
//! middle of a multi-byte character, or in the middle of a line.

use crate::api::StreamEnvelope;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";
pub const CONTENT_DELTA: &str = "content-delta";

// ---------------------------------------------------------------------------
// Utf8Carry
// ---------------------------------------------------------------------------

/// Byte-to-text decoder that holds an incomplete trailing UTF-8 sequence
/// until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes held back from the previous call.
    pub fn carried(&self) -> usize {
        self.pending.len()
    }

    /// Decode `chunk`, prefixed by whatever was carried over.
    ///
    /// Invalid sequences become U+FFFD; an incomplete sequence at the very end
    /// is held back instead.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut input: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&input[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid + bad..];
                        }
                        None => {
                            input = &input[valid..];
                            break;
                        }
                    }
                }
            }
        }

        let rest = input.to_vec();
        self.pending = rest;
        out
    }

    /// Flush at end of stream. A dangling partial sequence decodes to U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// LineBuffer
// ---------------------------------------------------------------------------

/// Splits decoded text on `\n`, keeping an unterminated tail for later.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and drain every complete line. Trailing `\r` is stripped.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);
            lines.push(line);
        }
        lines
    }

    /// Remaining unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Some(line.trim_end_matches('\r').to_string())
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Text to append to the pending assistant turn. May be empty.
    Fragment(String),
    /// The `[DONE]` terminal marker.
    Done,
    /// Anything else: blank lines, comments, other event types, malformed JSON.
    Ignored,
}

pub fn parse_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamEnvelope>(payload) {
        Ok(envelope) if envelope.event_type == CONTENT_DELTA => {
            // A content-delta without the nested text is a no-op fragment.
            SseLine::Fragment(envelope.text().unwrap_or_default().to_string())
        }
        Ok(envelope) => {
            tracing::trace!(
                target: "netpeek::sse",
                event_type = %envelope.event_type,
                "skipping non-content event"
            );
            SseLine::Ignored
        }
        Err(e) => {
            tracing::debug!(
                target: "netpeek::sse",
                error = %e,
                payload_len = payload.len(),
                "skipping malformed stream line"
            );
            SseLine::Ignored
        }
    }
}

// ---------------------------------------------------------------------------
// EventDecoder
// ---------------------------------------------------------------------------

/// Chunk-in, events-out composition of the two buffers and [`parse_line`].
#[derive(Debug, Default)]
pub struct EventDecoder {
    utf8: Utf8Carry,
    lines: LineBuffer,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseLine> {
        let text = self.utf8.decode(chunk);
        self.lines
            .push(&text)
            .iter()
            .map(|l| parse_line(l))
            .filter(|e| *e != SseLine::Ignored)
            .collect()
    }

    /// Flush both buffers once the body has ended.
    pub fn finish(&mut self) -> Vec<SseLine> {
        let tail = self.utf8.finish();
        let mut events: Vec<SseLine> = self.lines.push(&tail).iter().map(|l| parse_line(l)).collect();
        if let Some(rest) = self.lines.finish() {
            events.push(parse_line(&rest));
        }
        events.retain(|e| *e != SseLine::Ignored);
        events
    }
}
