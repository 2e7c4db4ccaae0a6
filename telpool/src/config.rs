//! Session engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default command prompt: a shell terminator (`#` for enable mode,
/// `>` for user mode) at the end of the buffer.
pub const DEFAULT_COMMAND_PROMPT: &str = r"[#>]\s*$";

/// Default login prompt fragment, matching both "Username:" and "username:".
pub const DEFAULT_LOGIN_PROMPT: &str = "sername";

/// Default password prompt fragment, matching "Password:" and "password:".
pub const DEFAULT_PASSWORD_PROMPT: &str = "assword";

/// Tunable knobs shared by every session the pool opens.
///
/// All fields have defaults matching a typical Telnet-managed switch;
/// override only what the target devices need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,

    /// Timeout for each prompt/pattern wait. This bounds every read:
    /// a pattern that has not appeared within this window is a failure,
    /// never an indefinite hang.
    pub read_timeout: Duration,

    /// Pattern announcing the login prompt.
    pub login_prompt_pattern: String,

    /// Pattern announcing the password prompt.
    pub password_prompt_pattern: String,

    /// Pattern announcing the command prompt. Anchored to the end of the
    /// buffer if no anchor is given.
    pub command_prompt_pattern: String,

    /// How many bytes from the end of the buffer to search for the
    /// command prompt. Bounds the per-read scan cost on large outputs.
    pub search_depth: usize,

    /// Extra pattern-wait attempts per command before the session fails.
    /// The core performs no automatic command retry; this only extends
    /// the prompt wait in whole `read_timeout` units.
    pub pattern_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            login_prompt_pattern: DEFAULT_LOGIN_PROMPT.to_string(),
            password_prompt_pattern: DEFAULT_PASSWORD_PROMPT.to_string(),
            command_prompt_pattern: DEFAULT_COMMAND_PROMPT.to_string(),
            search_depth: 1000,
            pattern_retries: 0,
        }
    }
}

impl SessionConfig {
    /// Set both timeouts at once.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.read_timeout = timeout;
        self
    }

    /// Override the command prompt pattern.
    pub fn with_command_prompt(mut self, pattern: impl Into<String>) -> Self {
        self.command_prompt_pattern = pattern.into();
        self
    }

    /// Override the search depth.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }
}
