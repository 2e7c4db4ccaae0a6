//! Prompt pattern compilation.

use regex::bytes::Regex;

use crate::config::SessionConfig;

/// The three protocol-stage markers one session watches for.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Login prompt (e.g. text containing "sername").
    pub login: Regex,

    /// Password prompt (e.g. text containing "assword").
    pub password: Regex,

    /// Command-ready prompt, anchored to the end of the buffer.
    pub command: Regex,
}

impl PromptSet {
    /// Compile the patterns from a session configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            login: Regex::new(&config.login_prompt_pattern)?,
            password: Regex::new(&config.password_prompt_pattern)?,
            command: compile_prompt_pattern(&config.command_prompt_pattern)?,
        })
    }
}

/// Compile a command-prompt pattern, anchoring it to the end of the
/// buffer if no anchor was given. Prompts only count when nothing
/// follows them; mid-output `>` characters must not terminate a command.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}
