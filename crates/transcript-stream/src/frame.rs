//! Splits a chunked `text/event-stream` body into complete records.

use tracing::trace;

use crate::errors::StreamError;

const DATA_FIELD: &str = "data:";
const EVENT_FIELD: &str = "event:";

/// One complete, blank-line delimited unit of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Value of the `event:` field, when the frame carried one.
    pub event: Option<String>,
    /// Remainder of the `data:` line(s), joined with `\n`.
    pub payload: String,
}

impl Record {
    /// Creates a record with no event name.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            event: None,
            payload: payload.into(),
        }
    }
}

/// Stateful record splitter.
///
/// Bytes are buffered until a full delimiter (`\n\n` or `\r\n\r\n`) has been
/// seen, so records and UTF-8 sequences may straddle chunk boundaries.
#[derive(Debug, Default)]
pub struct FrameParser {
    buf: Vec<u8>,
    // Delimiters cannot start before this offset in the current buffer.
    scan_from: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the records it completes, in arrival order.
    ///
    /// Records are extracted lazily as the iterator is advanced; anything not
    /// pulled stays buffered and is returned by the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Records<'_> {
        self.buf.extend_from_slice(chunk);
        Records { parser: self }
    }

    /// Ends the stream, discarding any incomplete trailing record.
    pub fn finish(&mut self) -> Option<StreamError> {
        let discarded_bytes = self.buf.len();
        self.reset();
        (discarded_bytes > 0).then_some(StreamError::TruncatedStream { discarded_bytes })
    }

    /// Drops all buffered bytes without reporting them.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scan_from = 0;
    }

    /// Number of bytes waiting for a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    fn next_record(&mut self) -> Option<Record> {
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf, self.scan_from) {
            let frame_bytes: Vec<u8> = self.buf.drain(..idx + delim_len).take(idx).collect();
            self.scan_from = 0;
            if let Some(record) = parse_frame(&frame_bytes) {
                return Some(record);
            }
            trace!(frame_len = frame_bytes.len(), "skipping frame without data");
        }
        // A 4-byte delimiter may begin in the last three bytes.
        self.scan_from = self.buf.len().saturating_sub(3);
        None
    }
}

/// Lazy iterator over the records completed by a [`FrameParser::feed`] call.
pub struct Records<'a> {
    parser: &'a mut FrameParser,
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.parser.next_record()
    }
}

fn find_frame_delimiter(buf: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_frame(bytes: &[u8]) -> Option<Record> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix(DATA_FIELD) {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if let Some(rest) = line.strip_prefix(EVENT_FIELD) {
            event = Some(rest.trim().to_string());
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(Record {
        event,
        payload: data_lines.join("\n"),
    })
}
