//! Incremental record framing over a chunked response body.
//!
//! Records are separated by a blank line (`\n\n`) and start with a fixed
//! marker (`data: ` by default) ahead of their JSON payload. Transport chunks
//! do not respect record boundaries, so the unterminated tail of every chunk
//! is held back until its delimiter arrives.

use tracing::trace;

use crate::error::FrameError;

/// Separator between two records.
pub const RECORD_DELIMITER: &[u8] = b"\n\n";

/// Marker expected in front of every record payload.
pub const DEFAULT_RECORD_MARKER: &str = "data: ";

/// A complete record extracted from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload text following the record marker.
    Record(String),
    /// A marked record that could not be decoded as text.
    Malformed(String),
}

/// Splits a growing byte stream into [`Frame`]s.
///
/// One decoder belongs to one session; a new session starts with a new
/// decoder so no bytes leak between requests.
#[derive(Debug)]
pub struct FrameDecoder {
    marker: String,
    max_buffered_bytes: usize,
    pending: Vec<u8>,
    /// Bytes of `pending` already scanned without finding a delimiter.
    scanned: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_MARKER, 8 * 1024 * 1024)
    }
}

impl FrameDecoder {
    pub fn new(marker: impl Into<String>, max_buffered_bytes: usize) -> Self {
        Self {
            marker: marker.into(),
            max_buffered_bytes,
            pending: Vec::new(),
            scanned: 0,
        }
    }

    /// Append a chunk and return every record it completes.
    ///
    /// The trailing, possibly incomplete segment stays buffered for the next
    /// call. Fails once the buffered tail grows past `max_buffered_bytes`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, FrameError> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0usize;
        // A delimiter may straddle the previous chunk boundary.
        let mut cursor = self.scanned.saturating_sub(RECORD_DELIMITER.len() - 1);

        while let Some(offset) = find_delimiter(&self.pending[cursor..]) {
            let end = cursor + offset;
            if let Some(frame) = classify(&self.marker, &self.pending[start..end]) {
                frames.push(frame);
            }
            start = end + RECORD_DELIMITER.len();
            cursor = start;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > self.max_buffered_bytes {
            return Err(FrameError::BufferOverflow {
                limit: self.max_buffered_bytes,
            });
        }
        Ok(frames)
    }

    /// Flush at end of stream: whatever is still buffered is treated as one
    /// last record.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        classify(&self.marker, &rest)
    }

    /// Number of bytes waiting for a delimiter.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(RECORD_DELIMITER.len())
        .position(|window| window == RECORD_DELIMITER)
}

/// Strip the marker from one segment. Unmarked segments are transport noise.
fn classify(marker: &str, segment: &[u8]) -> Option<Frame> {
    let segment = segment.trim_ascii();
    if segment.is_empty() {
        return None;
    }

    let payload = segment
        .strip_prefix(marker.as_bytes())
        .or_else(|| segment.strip_prefix(marker.trim_end().as_bytes()));
    let Some(payload) = payload else {
        trace!(bytes = segment.len(), "Discarding unmarked segment");
        return None;
    };

    match std::str::from_utf8(payload.trim_ascii()) {
        Ok(text) => Some(Frame::Record(text.to_string())),
        Err(e) => Some(Frame::Malformed(e.to_string())),
    }
}
