//! Batch result aggregation.

use indexmap::IndexMap;
use serde::Serialize;

use super::DeviceId;
use crate::error::{ChannelError, Error, SessionError, TransportError};
use crate::session::CommandRecord;

/// Classification of a terminal session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, unreachable, or connect timeout.
    Connect,
    /// Authentication handshake failed.
    Auth,
    /// An expected pattern never appeared in time.
    PatternTimeout,
    /// Mid-session read/write failure.
    Transport,
    /// Command sent but the session went away before completion.
    Command,
    /// Cancelled by the orchestrator.
    Cancelled,
}

/// Terminal error descriptor for one device, carried in its report so
/// the caller never sees a silent drop.
#[derive(Debug, Clone, Serialize)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SessionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an engine error into a report entry.
    pub fn from_error(error: &Error) -> Self {
        let kind = match error {
            Error::Transport(
                TransportError::ConnectionRefused { .. }
                | TransportError::ConnectTimeout { .. }
                | TransportError::ConnectionFailed { .. },
            ) => FailureKind::Connect,
            Error::Transport(_) => FailureKind::Transport,
            Error::Channel(ChannelError::PatternTimeout { .. }) => FailureKind::PatternTimeout,
            Error::Channel(_) => FailureKind::Transport,
            Error::Session(SessionError::AuthenticationFailed { .. }) => FailureKind::Auth,
            Error::Session(SessionError::Cancelled) => FailureKind::Cancelled,
            Error::Session(_) => FailureKind::Command,
        };
        Self::new(kind, error.to_string())
    }
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Everything one batch produced for one device: a complete ordered
/// result log, or a partial log plus the terminal failure.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DeviceReport {
    pub records: Vec<CommandRecord>,
    pub failure: Option<SessionFailure>,
}

impl DeviceReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.records.iter().all(|r| r.is_success())
    }
}

/// Per-device results for one command batch, in pool order.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(transparent)]
pub struct BatchReport {
    devices: IndexMap<DeviceId, DeviceReport>,
}

impl BatchReport {
    pub(crate) fn insert(&mut self, id: DeviceId, report: DeviceReport) {
        self.devices.insert(id, report);
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceReport> {
        self.devices.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &DeviceReport)> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices whose report carries a terminal failure.
    pub fn failed_devices(&self) -> impl Iterator<Item = (&DeviceId, &SessionFailure)> {
        self.devices
            .iter()
            .filter_map(|(id, r)| r.failure.as_ref().map(|f| (id, f)))
    }

    pub fn into_inner(self) -> IndexMap<DeviceId, DeviceReport> {
        self.devices
    }
}
