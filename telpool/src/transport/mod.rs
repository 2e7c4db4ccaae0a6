//! TCP/Telnet transport layer.
//!
//! This module provides the low-level stream connection management:
//! connect with timeout, send, receive with timeout, and close, plus the
//! Telnet option negotiation filter every read passes through.

pub mod config;
mod negotiation;
mod tcp;

pub use config::{DEFAULT_TELNET_PORT, DeviceEndpoint};
pub use negotiation::TelnetNegotiator;
pub use tcp::TcpTransport;
