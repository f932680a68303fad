//! `text/event-stream` framing
//!
//! Event frame:
//! ```text
//! id: 42\n            (omitted when the id is empty)
//! event: update\n     (omitted when the type is empty)
//! data: line one\n    (one field per payload line)
//! data: line two\n
//! \n                  (dispatches the event)
//! ```
//!
//! Comment frame (ignored by clients, keeps intermediaries from timing out):
//! ```text
//! : keep-alive\n
//! ```

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::broker::item::{Event, OutboundItem};

/// Encoder for `text/event-stream` frames
pub struct EventEncoder {
    buf: BytesMut,
}

impl EventEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Create encoder with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the encoded bytes and reset encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Get current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode one outbound item
    pub fn encode(&mut self, item: &OutboundItem) {
        match item {
            OutboundItem::Event(ev) => self.encode_event(ev),
            OutboundItem::Comment(text) => self.encode_comment(text),
        }
    }

    /// Encode an event frame
    pub fn encode_event(&mut self, ev: &Event) {
        if !ev.id.is_empty() {
            self.write_field(b"id", single_line(ev.id.as_bytes()));
        }
        if !ev.event.is_empty() {
            self.write_field(b"event", single_line(ev.event.as_bytes()));
        }

        for line in lines(&ev.data) {
            self.write_field(b"data", line);
        }

        self.buf.put_u8(b'\n');
    }

    /// Encode a comment frame
    pub fn encode_comment(&mut self, text: &str) {
        for line in lines(text.as_bytes()) {
            self.write_field(b"", line);
        }
    }

    /// Encode a reconnection delay hint
    pub fn encode_retry(&mut self, delay: Duration) {
        let millis = delay.as_millis().to_string();
        self.write_field(b"retry", millis.as_bytes());
        self.buf.put_u8(b'\n');
    }

    /// Write `name: value\n`
    fn write_field(&mut self, name: &[u8], value: &[u8]) {
        self.buf.put_slice(name);
        self.buf.put_slice(b": ");
        self.buf.put_slice(value);
        self.buf.put_u8(b'\n');
    }
}

impl Default for EventEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a single item into a standalone frame
pub fn encode(item: &OutboundItem) -> Bytes {
    let mut encoder = EventEncoder::new();
    encoder.encode(item);
    encoder.finish()
}

/// Split a payload into lines, dropping `\r` before each `\n`
///
/// An empty payload yields one empty line so the frame still carries data.
fn lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Cut a single-line field at the first line break
fn single_line(value: &[u8]) -> &[u8] {
    match value.iter().position(|b| *b == b'\n' || *b == b'\r') {
        Some(end) => &value[..end],
        None => value,
    }
}
