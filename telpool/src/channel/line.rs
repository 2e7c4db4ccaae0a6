//! Line channel: transport plus receive buffer with pattern-bounded reads.

use std::time::Duration;

use log::trace;
use regex::bytes::Regex;

use super::buffer::{Captured, PatternBuffer};
use crate::error::{ChannelError, Error, Result, TransportError};
use crate::transport::TcpTransport;

/// One interactive text channel to a device.
///
/// Pairs the transport with the session's receive buffer and implements
/// the wait primitive everything else is built on: poll the transport,
/// append to the buffer, re-test the pattern, until match or deadline.
/// This replaces fixed-delay waiting; command boundaries are determined
/// by protocol evidence, not a guessed sleep.
pub struct LineChannel {
    transport: TcpTransport,
    buffer: PatternBuffer,
}

impl LineChannel {
    pub fn new(transport: TcpTransport, search_depth: usize) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(search_depth),
        }
    }

    /// Send one line, CR LF terminated.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.transport.send_line(line).await
    }

    /// Wait until `pattern` appears in the accumulated buffer.
    ///
    /// On match, bytes up to and including the match are consumed and
    /// returned; trailing bytes stay buffered. Fails with
    /// [`ChannelError::PatternTimeout`] if no match appears within
    /// `timeout` — never a false match, never an unbounded wait.
    pub async fn await_pattern(&mut self, pattern: &Regex, timeout: Duration) -> Result<Captured> {
        self.await_any(&[pattern], timeout).await.map(|(_, c)| c)
    }

    /// Wait until any of `patterns` matches; returns the index of the
    /// first pattern to match along with the captured segment. Patterns
    /// are tested in order after every read, so earlier entries win ties.
    pub async fn await_any(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
    ) -> Result<(usize, Captured)> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            for (index, pattern) in patterns.iter().enumerate() {
                if let Some(captured) = self.buffer.find_consume(pattern) {
                    trace!("pattern {:?} matched, {} bytes captured", pattern.as_str(), captured.data.len());
                    return Ok((index, captured));
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(self.timeout_error(patterns, timeout));
            }

            match self.transport.read_chunk(deadline - now).await {
                // May be empty if the read was all negotiation traffic.
                Ok(chunk) => self.buffer.extend(&chunk),
                Err(Error::Transport(TransportError::ReadTimeout(_))) => {
                    return Err(self.timeout_error(patterns, timeout));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn timeout_error(&self, patterns: &[&Regex], timeout: Duration) -> Error {
        let names: Vec<&str> = patterns.iter().map(|p| p.as_str()).collect();
        ChannelError::PatternTimeout {
            pattern: names.join("|"),
            timeout,
        }
        .into()
    }

    /// Unconsumed buffered bytes (for diagnostics).
    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Drop any buffered bytes.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// The peer address.
    pub fn peer(&self) -> &str {
        self.transport.peer()
    }

    /// Close the underlying transport.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}
