//! Per-command execution records.

use std::time::Duration;

use serde::Serialize;

/// Outcome of one command within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Command ran and the prompt returned.
    Success,

    /// Command failed; the detail names the error.
    Failed { detail: String },

    /// Session failed before this command was sent.
    NotAttempted,
}

/// One entry in a session's result log.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    /// The command that was (or would have been) executed.
    pub command: String,

    /// Captured output, with the echoed command and trailing prompt removed.
    pub output: String,

    /// The prompt text that terminated the command.
    pub prompt: String,

    /// Time from send to prompt detection.
    pub elapsed: Duration,

    /// How the command ended.
    pub outcome: CommandOutcome,
}

impl CommandRecord {
    /// Record a completed command.
    pub fn success(
        command: impl Into<String>,
        output: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            prompt: prompt.into(),
            elapsed,
            outcome: CommandOutcome::Success,
        }
    }

    /// Record a command that failed mid-flight.
    pub fn failed(
        command: impl Into<String>,
        output: impl Into<String>,
        elapsed: Duration,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            prompt: String::new(),
            elapsed,
            outcome: CommandOutcome::Failed {
                detail: detail.into(),
            },
        }
    }

    /// Record a command that was never sent.
    pub fn not_attempted(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: String::new(),
            prompt: String::new(),
            elapsed: Duration::ZERO,
            outcome: CommandOutcome::NotAttempted,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CommandOutcome::Success)
    }

    /// Output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }
}

impl std::fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_predicates() {
        let ok = CommandRecord::success("show ver", "IOS 15.2", "switch>", Duration::from_millis(40));
        assert!(ok.is_success());

        let failed = CommandRecord::failed("show run", "", Duration::ZERO, "read timed out");
        assert!(!failed.is_success());

        let skipped = CommandRecord::not_attempted("reload");
        assert_eq!(skipped.outcome, CommandOutcome::NotAttempted);
        assert!(skipped.output.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let rec = CommandRecord::failed("show run", "", Duration::ZERO, "boom");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["command"], "show run");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["detail"], "boom");
    }
}
