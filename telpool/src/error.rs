//! Error types for telpool.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for telpool operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (TCP connect, read, write)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors (pattern matching)
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors (authentication, state machine)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// Whether this error is a pattern-match timeout.
    pub fn is_pattern_timeout(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::PatternTimeout { .. }))
    }

    /// Whether this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Session(SessionError::Cancelled))
    }
}

/// Transport layer errors (TCP connection, stream I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection was refused by the peer
    #[error("Connection refused by {host}:{port}")]
    ConnectionRefused { host: String, port: u16 },

    /// Connection attempt did not complete in time
    #[error("Connect to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// Failed to connect to host for another reason
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Write failed (broken pipe, reset)
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    /// Read failed
    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    /// No bytes arrived within the read timeout
    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// Peer closed the connection
    #[error("Connection disconnected")]
    Disconnected,
}

/// Channel layer errors (pattern matching over the receive buffer).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Expected pattern never appeared within the timeout
    #[error("Pattern {pattern:?} not found within {timeout:?}")]
    PatternTimeout { pattern: String, timeout: Duration },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Channel closed (no transport attached)
    #[error("Channel closed")]
    Closed,
}

/// Session layer errors (authentication handshake, state machine misuse).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Authentication handshake failed
    #[error("Authentication failed for user '{user}': {reason}")]
    AuthenticationFailed { user: String, reason: String },

    /// Operation attempted in the wrong state
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Command was sent but the session went away before completion
    #[error("Command {command:?} aborted: {reason}")]
    CommandAborted { command: String, reason: String },

    /// Session was cancelled by the orchestrator
    #[error("Session cancelled")]
    Cancelled,
}

/// Result type alias using telpool's Error.
pub type Result<T> = std::result::Result<T, Error>;
