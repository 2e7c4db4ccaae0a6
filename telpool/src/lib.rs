//! # telpool
//!
//! Async multi-device Telnet session engine for network device automation.
//!
//! telpool drives many interactive device shells concurrently, one
//! per-device state machine each: connect, authenticate against the
//! login/password prompts, then execute commands in order — detecting
//! every stage boundary by prompt pattern with a bounded timeout instead
//! of fixed sleeps.
//!
//! ## Features
//!
//! - Async TCP/Telnet sessions via tokio, with IAC option negotiation
//!   answered transparently
//! - Pattern buffer with consume-on-match semantics and tail-bounded
//!   prompt search
//! - Per-device state machine with wrong-credential detection
//! - Session pool with partial-failure batches: one device's failure
//!   never aborts the others
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use telpool::{DeviceEndpoint, SessionConfig, SessionPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), telpool::Error> {
//!     let devices = vec![
//!         DeviceEndpoint::new("192.168.1.10", "admin", "secret"),
//!         DeviceEndpoint::new("192.168.1.11", "admin", "secret"),
//!     ];
//!
//!     let mut pool = SessionPool::open_all(devices, SessionConfig::default()).await;
//!     let report = pool.run_batch(&["term len 0", "show ip inter bri"]).await;
//!
//!     for (device, result) in report.iter() {
//!         println!("=== {} ===", device);
//!         for record in &result.records {
//!             println!("{}", record.output);
//!         }
//!     }
//!
//!     pool.close_all().await.ok();
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod pool;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use config::SessionConfig;
pub use error::{ChannelError, Error, Result, SessionError, TransportError};
pub use pool::{
    BatchReport, CloseErrors, DeviceId, DeviceReport, FailureKind, SessionCanceller,
    SessionFailure, SessionPool,
};
pub use session::{CommandOutcome, CommandRecord, Session, SessionState};
pub use transport::{DeviceEndpoint, TcpTransport};
