//! Per-device session state machine.
//!
//! One `Session` drives one device through the authentication handshake
//! and a sequence of commands, detecting every stage boundary by prompt
//! pattern rather than fixed delay:
//!
//! ```text
//! Connecting -> Authenticating -> Ready <-> Executing
//!                                   |
//!                                Closing -> Closed
//! ```
//!
//! `Failed` is terminal and reachable from any state on unrecoverable
//! error. A session only moves forward; the sole path back into
//! `Authenticating` is [`Session::reconnect`], which first returns it
//! fully to `Connecting`.

mod record;

pub use record::{CommandOutcome, CommandRecord};

use std::time::Instant;

use log::{debug, warn};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::channel::{Captured, LineChannel, PromptSet};
use crate::config::SessionConfig;
use crate::error::{ChannelError, Error, Result, SessionError};
use crate::transport::{DeviceEndpoint, TcpTransport};

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Authenticating,
    Ready,
    Executing,
    Closing,
    Closed,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Executing => "executing",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One authenticated interactive connection to a single device.
///
/// Owned exclusively by its worker: nothing else mutates the receive
/// buffer or state, so no locking is involved.
pub struct Session {
    endpoint: DeviceEndpoint,
    config: SessionConfig,
    prompts: PromptSet,
    channel: Option<LineChannel>,
    state: SessionState,
    log: Vec<CommandRecord>,
}

impl Session {
    /// Create a session in `Connecting` state. Fails if a configured
    /// prompt pattern is not a valid regex.
    pub fn new(endpoint: DeviceEndpoint, config: SessionConfig) -> Result<Self> {
        let prompts = PromptSet::from_config(&config)
            .map_err(|e| Error::Channel(ChannelError::InvalidPattern(e)))?;
        Ok(Self {
            endpoint,
            config,
            prompts,
            channel: None,
            state: SessionState::Connecting,
            log: Vec::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The session's result log so far.
    pub fn log(&self) -> &[CommandRecord] {
        &self.log
    }

    /// Take the result log, leaving it empty.
    pub fn take_log(&mut self) -> Vec<CommandRecord> {
        std::mem::take(&mut self.log)
    }

    fn transition(&mut self, next: SessionState) {
        debug!("{}: {} -> {}", self.endpoint, self.state, next);
        self.state = next;
    }

    fn channel_mut(&mut self) -> Result<&mut LineChannel> {
        self.channel
            .as_mut()
            .ok_or_else(|| ChannelError::Closed.into())
    }

    fn auth_error(&self, reason: impl Into<String>) -> Error {
        SessionError::AuthenticationFailed {
            user: self.endpoint.username.clone(),
            reason: reason.into(),
        }
        .into()
    }

    /// Connect and authenticate, leaving the session `Ready`.
    ///
    /// Any failure along the way moves the session to `Failed`; the
    /// transport, if it was opened, is released.
    pub async fn open(&mut self) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState {
                operation: "open",
                state: self.state.to_string(),
            }
            .into());
        }

        let transport = match TcpTransport::connect(&self.endpoint, self.config.connect_timeout).await
        {
            Ok(t) => t,
            Err(e) => {
                self.transition(SessionState::Failed);
                return Err(e);
            }
        };

        self.channel = Some(LineChannel::new(transport, self.config.search_depth));
        self.transition(SessionState::Authenticating);

        if let Err(e) = self.authenticate().await {
            self.transition(SessionState::Failed);
            if let Some(channel) = self.channel.take() {
                let _ = channel.close().await;
            }
            return Err(e);
        }

        self.transition(SessionState::Ready);
        Ok(())
    }

    /// Drive the login prompt exchange.
    async fn authenticate(&mut self) -> Result<()> {
        let timeout = self.config.read_timeout;
        let username = self.endpoint.username.clone();
        let password = self.endpoint.password.clone();
        let prompts = self.prompts.clone();

        let login = self.channel_mut()?.await_pattern(&prompts.login, timeout).await;
        match login {
            Ok(_) => {}
            Err(e) if e.is_pattern_timeout() => {
                return Err(self.auth_error("login prompt never appeared"));
            }
            Err(e) => return Err(e),
        }
        self.channel_mut()?.send_line(&username).await?;

        let password_prompt = self
            .channel_mut()?
            .await_pattern(&prompts.password, timeout)
            .await;
        match password_prompt {
            Ok(_) => {}
            Err(e) if e.is_pattern_timeout() => {
                return Err(self.auth_error("password prompt never appeared"));
            }
            Err(e) => return Err(e),
        }
        self.channel_mut()?.send_line(password.expose_secret()).await?;

        // The device either presents a command prompt (success) or loops
        // back to the login prompt (credentials rejected). Test the
        // command prompt first so a banner containing "username" in
        // running text does not shadow a real prompt.
        let outcome = self
            .channel_mut()?
            .await_any(&[&prompts.command, &prompts.login], timeout)
            .await;
        match outcome {
            Ok((0, _)) => Ok(()),
            Ok(_) => Err(self.auth_error("device re-requested username; credentials rejected")),
            Err(e) if e.is_pattern_timeout() => {
                Err(self.auth_error("no command prompt after password submission"))
            }
            Err(e) => Err(e),
        }
    }

    /// Execute one command: `Ready -> Executing -> Ready`.
    ///
    /// The returned record is also appended to the session log. On error
    /// the session moves to `Failed` and a failed record is logged; the
    /// caller decides what to do with queued commands that never ran.
    pub async fn run(&mut self, command: &str) -> Result<CommandRecord> {
        if self.state != SessionState::Ready {
            return Err(SessionError::InvalidState {
                operation: "run a command",
                state: self.state.to_string(),
            }
            .into());
        }

        self.transition(SessionState::Executing);
        let start = Instant::now();
        let retries = self.config.pattern_retries;
        let timeout = self.config.read_timeout;
        let prompt_pattern = self.prompts.command.clone();
        let peer = self.endpoint.to_string();

        let result: Result<Captured> = async {
            let channel = self.channel_mut()?;
            channel.send_line(command).await?;

            let mut attempt = 0;
            loop {
                match channel.await_pattern(&prompt_pattern, timeout).await {
                    Ok(captured) => return Ok(captured),
                    Err(e) if e.is_pattern_timeout() && attempt < retries => {
                        attempt += 1;
                        warn!("{}: prompt wait timed out, retry {}/{}", peer, attempt, retries);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        .await;

        let elapsed = start.elapsed();
        match result {
            Ok(captured) => {
                let prompt = String::from_utf8_lossy(captured.matched()).trim().to_string();
                let output = normalize_output(command, captured.output());
                let record = CommandRecord::success(command, output, prompt, elapsed);
                self.log.push(record.clone());
                self.transition(SessionState::Ready);
                Ok(record)
            }
            Err(e) => {
                self.log
                    .push(CommandRecord::failed(command, "", elapsed, e.to_string()));
                self.transition(SessionState::Failed);
                Err(e)
            }
        }
    }

    /// Execute commands strictly in order, stopping at the first failure.
    pub async fn run_all(&mut self, commands: &[&str]) -> Result<Vec<CommandRecord>> {
        let mut records = Vec::with_capacity(commands.len());
        for command in commands {
            records.push(self.run(command).await?);
        }
        Ok(records)
    }

    /// Close the session, releasing the transport.
    ///
    /// Runs from any state, including `Failed`, and always ends in
    /// `Closed` — a close error is reported but the socket is released
    /// regardless.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        self.transition(SessionState::Closing);
        let result = match self.channel.take() {
            Some(channel) => channel.close().await,
            None => Ok(()),
        };
        self.transition(SessionState::Closed);
        result
    }

    /// Tear the session down and run the connect/authenticate handshake
    /// again. The only way back into `Authenticating`: the session first
    /// returns fully to `Connecting`. The result log is preserved.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.close().await?;
        self.transition(SessionState::Connecting);
        self.open().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("log_entries", &self.log.len())
            .finish()
    }
}

/// Strip the echoed command line and surrounding blank space from a
/// captured segment, leaving only the device's response text.
fn normalize_output(command: &str, raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut body = text.trim_start_matches(['\r', '\n']);

    if let Some((first, rest)) = body.split_once('\n') {
        if first.trim_end_matches('\r').trim_end() == command.trim_end() {
            body = rest;
        }
    } else if body.trim() == command.trim() {
        body = "";
    }

    // A bare terminator pattern like `[#>]\s*$` matches only the prompt's
    // last character; whatever follows the final newline is the prompt's
    // leading text (the hostname), not command output.
    if let Some(i) = body.rfind('\n') {
        body = &body[..=i];
    }

    body.trim_matches(['\r', '\n']).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_echo_and_padding() {
        let raw = b"show ip inter bri\r\nInterface   IP-Address\r\nVlan1  10.0.0.2\r\n";
        assert_eq!(
            normalize_output("show ip inter bri", raw),
            "Interface   IP-Address\r\nVlan1  10.0.0.2"
        );
    }

    #[test]
    fn test_normalize_echo_only() {
        assert_eq!(normalize_output("term len 0", b"term len 0\r\n"), "");
    }

    #[test]
    fn test_normalize_keeps_unechoed_output() {
        assert_eq!(normalize_output("show clock", b"12:00:00 UTC\r\n"), "12:00:00 UTC");
    }

    #[test]
    fn test_new_session_rejects_bad_pattern() {
        let endpoint = DeviceEndpoint::new("10.0.0.1", "admin", "pw");
        let config = SessionConfig {
            command_prompt_pattern: "[unclosed".to_string(),
            ..SessionConfig::default()
        };
        assert!(Session::new(endpoint, config).is_err());
    }

    #[test]
    fn test_new_session_starts_connecting() {
        let endpoint = DeviceEndpoint::new("10.0.0.1", "admin", "pw");
        let session = Session::new(endpoint, SessionConfig::default()).unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.log().is_empty());
    }
}
