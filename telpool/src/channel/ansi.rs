//! ANSI escape filtering via vte.
//!
//! Network devices decorate output with color codes and cursor movement;
//! prompt patterns must match the plain text. The filter keeps printable
//! characters plus the line-structure controls (CR, LF, TAB) and discards
//! every escape sequence.
//!
//! The vte parser is kept per buffer so sequences split across TCP reads
//! are handled correctly.

use vte::{Params, Parser, Perform};

/// Stateful ANSI stripper.
#[derive(Default)]
pub struct AnsiFilter {
    parser: Parser,
}

impl AnsiFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning only the plain-text bytes.
    pub fn feed(&mut self, data: &[u8]) -> Vec<u8> {
        let mut sink = PlainText {
            out: Vec::with_capacity(data.len()),
        };
        self.parser.advance(&mut sink, data);
        sink.out
    }
}

impl std::fmt::Debug for AnsiFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiFilter").finish_non_exhaustive()
    }
}

/// vte performer that collects printable text and line controls.
struct PlainText {
    out: Vec<u8>,
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}
