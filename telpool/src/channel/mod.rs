//! Channel layer: buffered pattern matching over a transport.
//!
//! This module turns the raw byte stream into protocol-stage events:
//! bytes accumulate in a buffer, ANSI escapes are stripped, and callers
//! wait for named prompt patterns with a bounded timeout.

mod ansi;
mod buffer;
mod line;
mod patterns;

pub use ansi::AnsiFilter;
pub use buffer::{Captured, PatternBuffer};
pub use line::LineChannel;
pub use patterns::{PromptSet, compile_prompt_pattern};
