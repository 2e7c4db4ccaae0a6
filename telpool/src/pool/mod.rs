//! Session pool and batch orchestration.
//!
//! The pool owns one [`Session`] per device, keyed by device identity.
//! Opening, command batches, and closing all run with one independent
//! worker per device: a failure on one endpoint is recorded in that
//! device's slot and never aborts the others.

mod report;

pub use report::{BatchReport, DeviceReport, FailureKind, SessionFailure};

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::SessionConfig;
use crate::error::{Error, Result, SessionError};
use crate::session::{CommandRecord, Session, SessionState};
use crate::transport::DeviceEndpoint;

/// Stable identity of one device in the pool: `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&DeviceEndpoint> for DeviceId {
    fn from(endpoint: &DeviceEndpoint) -> Self {
        Self(endpoint.socket_addr())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors collected while closing the pool. Every session is closed
/// regardless; this only reports which closes complained.
#[derive(Debug, Error)]
#[error("{} session(s) reported errors while closing", .0.len())]
pub struct CloseErrors(pub Vec<(DeviceId, Error)>);

/// Handle for cancelling one session from outside the batch worker.
#[derive(Clone)]
pub struct SessionCanceller {
    signal: Arc<watch::Sender<bool>>,
}

impl SessionCanceller {
    /// Request cancellation. In-flight reads are interrupted promptly,
    /// not only between commands.
    pub fn cancel(&self) {
        let _ = self.signal.send(true);
    }
}

struct PoolEntry {
    session: Option<Session>,
    failure: Option<SessionFailure>,
    cancel: Arc<watch::Sender<bool>>,
}

/// Mapping from device identity to session, owned by the orchestrator.
///
/// Populated by [`open_all`](Self::open_all), drained by
/// [`close_all`](Self::close_all); no entry outlives its session's
/// `Closed` transition.
pub struct SessionPool {
    entries: IndexMap<DeviceId, PoolEntry>,
    config: SessionConfig,
}

impl SessionPool {
    /// Establish sessions to every endpoint concurrently.
    ///
    /// Partial-failure semantics: each endpoint is opened independently;
    /// a refused connection or failed login is recorded in that device's
    /// entry and the rest of the pool opens normally. Duplicate device
    /// identities are skipped with a warning.
    pub async fn open_all(endpoints: Vec<DeviceEndpoint>, config: SessionConfig) -> Self {
        let mut entries: IndexMap<DeviceId, PoolEntry> = IndexMap::new();
        let mut seen: HashSet<DeviceId> = HashSet::new();
        let mut set: JoinSet<(DeviceId, Result<Session>)> = JoinSet::new();

        for endpoint in endpoints {
            let id = DeviceId::from(&endpoint);
            if !seen.insert(id.clone()) {
                warn!("{}: duplicate endpoint skipped", id);
                continue;
            }

            let (cancel_tx, _) = watch::channel(false);
            let cancel_tx = Arc::new(cancel_tx);
            let mut cancel_rx = cancel_tx.subscribe();
            entries.insert(
                id.clone(),
                PoolEntry {
                    session: None,
                    failure: None,
                    cancel: cancel_tx,
                },
            );

            let session_config = config.clone();
            set.spawn(async move {
                let mut session = match Session::new(endpoint, session_config) {
                    Ok(s) => s,
                    Err(e) => return (id, Err(e)),
                };

                let opened = tokio::select! {
                    biased;
                    _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                        Err(Error::Session(SessionError::Cancelled))
                    }
                    result = session.open() => result,
                };

                match opened {
                    Ok(()) => (id, Ok(session)),
                    Err(e) => {
                        let _ = session.close().await;
                        (id, Err(e))
                    }
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, Ok(session))) => {
                    debug!("{}: session ready", id);
                    if let Some(entry) = entries.get_mut(&id) {
                        entry.session = Some(session);
                    }
                }
                Ok((id, Err(e))) => {
                    warn!("{}: open failed: {}", id, e);
                    if let Some(entry) = entries.get_mut(&id) {
                        entry.failure = Some(SessionFailure::from_error(&e));
                    }
                }
                Err(join_error) => warn!("open worker panicked: {}", join_error),
            }
        }

        Self { entries, config }
    }

    /// Number of devices in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Device identities in pool order.
    pub fn ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.entries.keys()
    }

    /// Devices whose session is currently `Ready`.
    pub fn ready_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.session.as_ref().is_some_and(|s| s.is_ready()))
            .count()
    }

    /// Current state of one device's session, if it exists.
    pub fn state(&self, id: &DeviceId) -> Option<SessionState> {
        self.entries.get(id)?.session.as_ref().map(|s| s.state())
    }

    /// The recorded terminal failure for one device, if any.
    pub fn failure(&self, id: &DeviceId) -> Option<&SessionFailure> {
        self.entries.get(id)?.failure.as_ref()
    }

    /// Borrow one device's session.
    pub fn session(&self, id: &DeviceId) -> Option<&Session> {
        self.entries.get(id)?.session.as_ref()
    }

    /// Mutably borrow one device's session (e.g. for a reconnect).
    pub fn session_mut(&mut self, id: &DeviceId) -> Option<&mut Session> {
        self.entries.get_mut(id)?.session.as_mut()
    }

    /// Get a cancellation handle for one device.
    pub fn canceller(&self, id: &DeviceId) -> Option<SessionCanceller> {
        self.entries.get(id).map(|e| SessionCanceller {
            signal: e.cancel.clone(),
        })
    }

    /// The pool's session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run a command batch against every session in the pool.
    ///
    /// Per device, commands run strictly in the order given; command N
    /// is not sent before command N-1's prompt returned. Across devices,
    /// execution is concurrent and unordered. A device whose session
    /// fails mid-batch gets a partial log: the failing command is marked
    /// failed and everything after it `NotAttempted` — no automatic
    /// retry. Devices that never reached `Ready` report every command as
    /// `NotAttempted` alongside their recorded failure.
    pub async fn run_batch(&mut self, commands: &[&str]) -> BatchReport {
        let batch: Arc<Vec<String>> =
            Arc::new(commands.iter().map(|c| c.to_string()).collect());

        type WorkerOutput = (DeviceId, Session, Vec<CommandRecord>, Option<SessionFailure>);
        let mut set: JoinSet<WorkerOutput> = JoinSet::new();
        let mut dispatched: HashSet<DeviceId> = HashSet::new();

        for (id, entry) in self.entries.iter_mut() {
            if !entry.session.as_ref().is_some_and(|s| s.is_ready()) {
                continue;
            }
            let Some(mut session) = entry.session.take() else {
                continue;
            };

            // Reset any stale cancel request from a previous batch.
            let _ = entry.cancel.send(false);
            let mut cancel_rx = entry.cancel.subscribe();

            let id = id.clone();
            let commands = batch.clone();
            dispatched.insert(id.clone());

            set.spawn(async move {
                let mut records = Vec::with_capacity(commands.len());
                let mut failure = None;

                for (index, command) in commands.iter().enumerate() {
                    let result = tokio::select! {
                        biased;
                        _ = cancel_rx.wait_for(|cancelled| *cancelled) => {
                            Err(Error::Session(SessionError::Cancelled))
                        }
                        result = session.run(command) => result,
                    };

                    match result {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            failure = Some(SessionFailure::from_error(&e));
                            if e.is_cancelled() {
                                records.push(CommandRecord::failed(
                                    command,
                                    "",
                                    std::time::Duration::ZERO,
                                    "cancelled before completion",
                                ));
                                let _ = session.close().await;
                            } else if let Some(last) = session
                                .log()
                                .last()
                                .filter(|r| r.command == *command && !r.is_success())
                            {
                                records.push(last.clone());
                            }
                            for remaining in &commands[index + 1..] {
                                records.push(CommandRecord::not_attempted(remaining));
                            }
                            break;
                        }
                    }
                }

                (id, session, records, failure)
            });
        }

        let mut collected: IndexMap<DeviceId, DeviceReport> = IndexMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, session, records, failure)) => {
                    if let Some(entry) = self.entries.get_mut(&id) {
                        if failure.is_some() {
                            entry.failure = failure.clone();
                        }
                        entry.session = Some(session);
                    }
                    collected.insert(id, DeviceReport { records, failure });
                }
                Err(join_error) => warn!("batch worker panicked: {}", join_error),
            }
        }

        // Assemble in pool order; devices that were never dispatched (or
        // whose worker panicked) still get a full slate of entries.
        let mut report = BatchReport::default();
        for (id, entry) in &self.entries {
            if let Some(device_report) = collected.shift_remove(id) {
                report.insert(id.clone(), device_report);
                continue;
            }

            let failure = entry.failure.clone().or_else(|| {
                if dispatched.contains(id) {
                    Some(SessionFailure::new(
                        FailureKind::Command,
                        "session worker panicked",
                    ))
                } else {
                    Some(SessionFailure::new(
                        FailureKind::Command,
                        "session was not ready when the batch started",
                    ))
                }
            });
            let records = batch.iter().map(CommandRecord::not_attempted).collect();
            report.insert(id.clone(), DeviceReport { records, failure });
        }

        report
    }

    /// Request cancellation of one device's session. Returns `false` if
    /// the device is not in the pool.
    pub fn cancel(&self, id: &DeviceId) -> bool {
        match self.entries.get(id) {
            Some(entry) => {
                let _ = entry.cancel.send(true);
                true
            }
            None => false,
        }
    }

    /// Close every session, even those in `Failed` state, concurrently.
    ///
    /// Close errors are aggregated, never suppressed, and never prevent
    /// the remaining sessions from closing. The pool is consumed: no
    /// entry outlives its session's `Closed` transition.
    pub async fn close_all(self) -> std::result::Result<(), CloseErrors> {
        let mut set: JoinSet<(DeviceId, Result<()>)> = JoinSet::new();

        for (id, entry) in self.entries {
            if let Some(mut session) = entry.session {
                set.spawn(async move { (id, session.close().await) });
            }
        }

        let mut errors = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(e))) => {
                    warn!("{}: close failed: {}", id, e);
                    errors.push((id, e));
                }
                Err(join_error) => warn!("close worker panicked: {}", join_error),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CloseErrors(errors))
        }
    }
}
