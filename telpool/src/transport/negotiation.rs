//! Minimal Telnet option negotiation (RFC 854).
//!
//! Devices send IAC option requests before and during the login banner.
//! The engine is a pure NVT client: every `DO` is refused with `WONT`,
//! every `WILL` with `DONT`, and subnegotiations are dropped. Escaped
//! `IAC IAC` bytes are unescaped into the data stream.
//!
//! The parser is stateful because an IAC sequence can be split across
//! TCP reads.

use memchr::memchr;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParseState {
    /// Plain data bytes.
    #[default]
    Data,
    /// Saw IAC, expecting a command byte.
    Command,
    /// Saw IAC + DO/DONT/WILL/WONT, expecting an option byte.
    Option(u8),
    /// Inside IAC SB ... IAC SE.
    Subnegotiation,
    /// Saw IAC inside a subnegotiation.
    SubnegotiationIac,
}

/// Stateful IAC filter for one connection.
#[derive(Debug, Default)]
pub struct TelnetNegotiator {
    state: ParseState,
}

impl TelnetNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one received chunk.
    ///
    /// Returns `(data, reply)`: the user-visible bytes with all IAC
    /// sequences removed, and the refusal bytes to write back to the peer.
    /// Either may be empty.
    pub fn absorb(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        // Fast path: mid-stream chunk with no IAC byte at all.
        if self.state == ParseState::Data && memchr(IAC, input).is_none() {
            return (input.to_vec(), Vec::new());
        }

        let mut data = Vec::with_capacity(input.len());
        let mut reply = Vec::new();

        for &byte in input {
            match self.state {
                ParseState::Data => {
                    if byte == IAC {
                        self.state = ParseState::Command;
                    } else {
                        data.push(byte);
                    }
                }
                ParseState::Command => match byte {
                    IAC => {
                        // Escaped literal 0xFF.
                        data.push(IAC);
                        self.state = ParseState::Data;
                    }
                    DO | DONT | WILL | WONT => {
                        self.state = ParseState::Option(byte);
                    }
                    SB => {
                        self.state = ParseState::Subnegotiation;
                    }
                    _ => {
                        // NOP, GA, AYT, ... nothing to answer.
                        self.state = ParseState::Data;
                    }
                },
                ParseState::Option(command) => {
                    match command {
                        DO => reply.extend_from_slice(&[IAC, WONT, byte]),
                        WILL => reply.extend_from_slice(&[IAC, DONT, byte]),
                        // DONT/WONT acknowledge our own refusals.
                        _ => {}
                    }
                    self.state = ParseState::Data;
                }
                ParseState::Subnegotiation => {
                    if byte == IAC {
                        self.state = ParseState::SubnegotiationIac;
                    }
                }
                ParseState::SubnegotiationIac => {
                    if byte == SE {
                        self.state = ParseState::Data;
                    } else {
                        // Escaped IAC or stray byte inside SB; stay inside.
                        self.state = ParseState::Subnegotiation;
                    }
                }
            }
        }

        (data, reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_data_passthrough() {
        let mut neg = TelnetNegotiator::new();
        let (data, reply) = neg.absorb(b"Username: ");
        assert_eq!(data, b"Username: ");
        assert!(reply.is_empty());
    }

    #[test]
    fn test_do_is_refused_with_wont() {
        let mut neg = TelnetNegotiator::new();
        // IAC DO ECHO followed by banner text
        let (data, reply) = neg.absorb(&[IAC, DO, 1, b'h', b'i']);
        assert_eq!(data, b"hi");
        assert_eq!(reply, vec![IAC, WONT, 1]);
    }

    #[test]
    fn test_will_is_refused_with_dont() {
        let mut neg = TelnetNegotiator::new();
        let (_, reply) = neg.absorb(&[IAC, WILL, 3]);
        assert_eq!(reply, vec![IAC, DONT, 3]);
    }

    #[test]
    fn test_escaped_iac_is_unescaped() {
        let mut neg = TelnetNegotiator::new();
        let (data, reply) = neg.absorb(&[b'a', IAC, IAC, b'b']);
        assert_eq!(data, vec![b'a', IAC, b'b']);
        assert!(reply.is_empty());
    }

    #[test]
    fn test_sequence_split_across_chunks() {
        let mut neg = TelnetNegotiator::new();
        let (data, reply) = neg.absorb(&[b'x', IAC]);
        assert_eq!(data, b"x");
        assert!(reply.is_empty());

        let (data, reply) = neg.absorb(&[DO]);
        assert!(data.is_empty());
        assert!(reply.is_empty());

        let (data, reply) = neg.absorb(&[24, b'y']);
        assert_eq!(data, b"y");
        assert_eq!(reply, vec![IAC, WONT, 24]);
    }

    #[test]
    fn test_subnegotiation_is_dropped() {
        let mut neg = TelnetNegotiator::new();
        let (data, reply) = neg.absorb(&[IAC, SB, 24, 1, 2, 3, IAC, SE, b'o', b'k']);
        assert_eq!(data, b"ok");
        assert!(reply.is_empty());
    }
}
