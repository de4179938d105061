//! Minimal telnet option handling (RFC 854).
//!
//! The console login only needs a clean byte stream, so every option the
//! server offers or requests is refused and subnegotiations are dropped.

const SE: u8 = 240;
const SB: u8 = 250;
const WILL: u8 = 251;
const WONT: u8 = 252;
const DO: u8 = 253;
const DONT: u8 = 254;
const IAC: u8 = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Output of feeding raw bytes through a [`TelnetFilter`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Application data with all telnet commands removed.
    pub data: Vec<u8>,
    /// Refusals to send back to the server.
    pub replies: Vec<u8>,
}

/// Incremental telnet command stripper. Commands split across reads are
/// carried over to the next [`TelnetFilter::feed`].
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: State,
}

impl TelnetFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip telnet commands from `input`.
    pub fn feed(&mut self, input: &[u8]) -> Filtered {
        let mut out = Filtered::default();

        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, b) => {
                    out.data.push(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    out.data.push(IAC);
                    State::Data
                }
                (State::Iac, verb @ (WILL | WONT | DO | DONT)) => State::Negotiate(verb),
                (State::Iac, SB) => State::Subnegotiation,
                (State::Iac, _) => State::Data,
                (State::Negotiate(verb), option) => {
                    match verb {
                        DO => out.replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL => out.replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    State::Data
                }
                (State::Subnegotiation, IAC) => State::SubnegotiationIac,
                (State::Subnegotiation, _) => State::Subnegotiation,
                (State::SubnegotiationIac, SE) => State::Data,
                (State::SubnegotiationIac, _) => State::Subnegotiation,
            };
        }

        out
    }
}

/// Double every IAC byte in outgoing data.
#[must_use]
pub fn escape_outgoing(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
    out
}
