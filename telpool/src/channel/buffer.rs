//! Receive buffer with consume-on-match pattern search.
//!
//! Incoming bytes accumulate here between reads; a pattern match drains
//! everything up to and including the match and hands it to the caller.
//! Consumed bytes are never re-scanned, so a login prompt matched once
//! cannot satisfy a later wait.
//!
//! Prompt search is bounded to the last `search_depth` bytes (scrapli's
//! tail-search optimization): for large outputs only the tail can hold
//! the trailing prompt, and scanning a full `show tech` for every read
//! would be quadratic.

use bytes::BytesMut;
use regex::bytes::Regex;

use super::ansi::AnsiFilter;

/// Bytes drained from the buffer by a successful pattern match.
#[derive(Debug, Clone)]
pub struct Captured {
    /// Everything up to and including the matched pattern.
    pub data: Vec<u8>,

    /// Offset of the match within `data`; bytes before it are output,
    /// bytes from it onward are the matched prompt text.
    pub match_start: usize,
}

impl Captured {
    /// The bytes preceding the match.
    pub fn output(&self) -> &[u8] {
        &self.data[..self.match_start]
    }

    /// The matched pattern bytes.
    pub fn matched(&self) -> &[u8] {
        &self.data[self.match_start..]
    }

    /// Full captured segment as a string (lossy UTF-8).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Accumulating receive buffer for one session.
pub struct PatternBuffer {
    buffer: BytesMut,
    search_depth: usize,
    ansi: AnsiFilter,
}

impl PatternBuffer {
    /// Create a buffer searching the last `search_depth` bytes for patterns.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth: search_depth.max(1),
            ansi: AnsiFilter::new(),
        }
    }

    /// Append freshly-read bytes, stripping ANSI escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = self.ansi.feed(data);
        self.buffer.extend_from_slice(&cleaned);
    }

    /// Search the tail for `pattern`; on match, drain and return everything
    /// up to and including the match. Unmatched trailing bytes stay
    /// buffered for the next call.
    pub fn find_consume(&mut self, pattern: &Regex) -> Option<Captured> {
        let tail_start = self.buffer.len().saturating_sub(self.search_depth);
        let m = pattern.find(&self.buffer[tail_start..])?;

        let match_start = tail_start + m.start();
        let match_end = tail_start + m.end();

        let data = self.buffer.split_to(match_end).to_vec();
        Some(Captured { data, match_start })
    }

    /// Whether the tail currently contains a match, without consuming.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        let tail_start = self.buffer.len().saturating_sub(self.search_depth);
        pattern.is_match(&self.buffer[tail_start..])
    }

    /// Unconsumed buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl std::fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}
