//! Wire message framing
//!
//! An incremental state machine that turns an arbitrarily chunked byte
//! stream into checksummed messages, then hands each payload to the
//! per-command decoders in [`crate::network`].
//!
//! Envelope layout (all fixed-width fields little-endian):
//!
//! | offset | size | field    |
//! |--------|------|----------|
//! | 0      | 4    | magic    |
//! | 4      | 12   | command, NUL padded |
//! | 16     | 4    | length   |
//! | 20     | 4    | checksum, first 4 bytes of dsha256(payload) |

use crate::constants::{COMMAND_SIZE, MESSAGE_HEADER_SIZE};
use crate::error::{DecodeError, FrameError};
use crate::hash::checksum;
use crate::network::{decode_payload, Payload};
use crate::params::NetworkParams;

/// Where the framer is in the envelope cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserState {
    /// Needs 24 header bytes
    WaitingHeader,
    /// Header accepted, needs `length` payload bytes
    WaitingPayload {
        command: String,
        length: usize,
        checksum: u32,
    },
    /// A fatal error tore the stream down
    Closed,
}

/// One framed message, decoded or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message { command: String, payload: Payload },
    /// The envelope was sound but the body did not decode. The stream continues.
    Malformed { command: String, error: DecodeError },
}

impl Event {
    pub fn command(&self) -> &str {
        match self {
            Event::Message { command, .. } | Event::Malformed { command, .. } => command,
        }
    }
}

/// Incremental framer for one connection
#[derive(Debug)]
pub struct Parser {
    params: &'static NetworkParams,
    backlog: Vec<u8>,
    state: ParserState,
    completed: Vec<Event>,
}

impl Parser {
    pub fn new(params: &'static NetworkParams) -> Self {
        Self {
            params,
            backlog: Vec::new(),
            state: ParserState::WaitingHeader,
            completed: Vec::new(),
        }
    }

    pub fn params(&self) -> &'static NetworkParams {
        self.params
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ParserState::Closed
    }

    /// Bytes buffered but not yet consumed
    pub fn buffered(&self) -> usize {
        self.backlog.len()
    }

    fn waiting(&self) -> usize {
        match &self.state {
            ParserState::WaitingPayload { length, .. } => *length,
            _ => MESSAGE_HEADER_SIZE,
        }
    }

    /// Append `data` and frame as many messages as the backlog allows.
    ///
    /// On a fatal error the parser closes and the error is returned. Events
    /// completed earlier in the same call stay available through
    /// [`Parser::take_completed`].
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Event>, FrameError> {
        if self.is_closed() {
            return Err(FrameError::Closed);
        }

        self.backlog.extend_from_slice(data);

        while self.backlog.len() >= self.waiting() {
            let needed = self.waiting();
            let chunk: Vec<u8> = self.backlog.drain(..needed).collect();
            if let Err(err) = self.advance(&chunk) {
                log::warn!("Closing stream on {}: {}", self.params.network, err);
                self.state = ParserState::Closed;
                self.backlog.clear();
                return Err(err);
            }
        }

        Ok(std::mem::take(&mut self.completed))
    }

    /// Events framed before the fatal error that closed the parser
    pub fn take_completed(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.completed)
    }

    fn advance(&mut self, chunk: &[u8]) -> Result<(), FrameError> {
        match std::mem::replace(&mut self.state, ParserState::WaitingHeader) {
            ParserState::WaitingHeader => {
                self.state = self.parse_header(chunk)?;
                Ok(())
            }
            ParserState::WaitingPayload {
                command,
                checksum: expected,
                ..
            } => {
                let actual = u32::from_le_bytes(checksum(chunk));
                if actual != expected {
                    return Err(FrameError::ChecksumMismatch { expected, actual });
                }
                let event = match decode_payload(&command, chunk) {
                    Ok(payload) => Event::Message { command, payload },
                    Err(error) => {
                        log::warn!("Dropping malformed {} payload: {}", command, error);
                        Event::Malformed { command, error }
                    }
                };
                self.completed.push(event);
                Ok(())
            }
            ParserState::Closed => Err(FrameError::Closed),
        }
    }

    fn parse_header(&self, header: &[u8]) -> Result<ParserState, FrameError> {
        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if magic != self.params.magic {
            return Err(FrameError::BadMagic(magic));
        }

        let field = &header[4..4 + COMMAND_SIZE];
        let end = field
            .iter()
            .position(|&b| b == 0)
            .ok_or(FrameError::UnterminatedCommand)?;
        let command = String::from_utf8_lossy(&field[..end]).into_owned();

        let length = u32::from_le_bytes([header[16], header[17], header[18], header[19]]) as usize;
        if length > self.params.max_message_size {
            return Err(FrameError::PayloadTooLarge {
                length,
                max: self.params.max_message_size,
            });
        }

        let checksum = u32::from_le_bytes([header[20], header[21], header[22], header[23]]);

        Ok(ParserState::WaitingPayload {
            command,
            length,
            checksum,
        })
    }
}

/// Wrap `payload` in an envelope for `params`' network
pub fn frame_message(
    params: &NetworkParams,
    command: &str,
    payload: &[u8],
) -> Result<Vec<u8>, FrameError> {
    // One byte is reserved for the terminating NUL
    if command.is_empty() || command.len() >= COMMAND_SIZE {
        return Err(FrameError::InvalidCommand(command.to_string()));
    }
    if !command.bytes().all(|b| b.is_ascii() && b != 0) {
        return Err(FrameError::InvalidCommand(command.to_string()));
    }
    if payload.len() > params.max_message_size {
        return Err(FrameError::PayloadTooLarge {
            length: payload.len(),
            max: params.max_message_size,
        });
    }

    let mut out = Vec::with_capacity(MESSAGE_HEADER_SIZE + payload.len());
    out.extend_from_slice(&params.magic.to_le_bytes());
    let mut field = [0u8; COMMAND_SIZE];
    field[..command.len()].copy_from_slice(command.as_bytes());
    out.extend_from_slice(&field);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&checksum(payload));
    out.extend_from_slice(payload);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MAIN, TESTNET};

    fn ping(nonce: u64) -> Vec<u8> {
        frame_message(&MAIN, "ping", &nonce.to_le_bytes()).unwrap()
    }

    #[test]
    fn test_single_message() {
        let mut parser = Parser::new(&MAIN);
        let events = parser.feed(&ping(7)).unwrap();
        assert_eq!(
            events,
            vec![Event::Message {
                command: "ping".into(),
                payload: Payload::Ping(7)
            }]
        );
        assert_eq!(parser.state(), &ParserState::WaitingHeader);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_byte_by_byte_matches_whole() {
        let raw = ping(42);
        let mut whole = Parser::new(&MAIN);
        let expected = whole.feed(&raw).unwrap();

        let mut parser = Parser::new(&MAIN);
        let mut events = Vec::new();
        for byte in &raw {
            events.extend(parser.feed(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(events, expected);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_two_messages_one_chunk() {
        let mut raw = ping(1);
        raw.extend(ping(2));
        let mut parser = Parser::new(&MAIN);
        let events = parser.feed(&raw).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_empty_payload() {
        let raw = frame_message(&MAIN, "verack", &[]).unwrap();
        assert_eq!(raw.len(), MESSAGE_HEADER_SIZE);
        let mut parser = Parser::new(&MAIN);
        let events = parser.feed(&raw).unwrap();
        assert_eq!(
            events,
            vec![Event::Message {
                command: "verack".into(),
                payload: Payload::Raw(vec![])
            }]
        );
    }

    #[test]
    fn test_header_wait_state() {
        let raw = ping(3);
        let mut parser = Parser::new(&MAIN);
        assert!(parser.feed(&raw[..MESSAGE_HEADER_SIZE]).unwrap().is_empty());
        match parser.state() {
            ParserState::WaitingPayload { command, length, .. } => {
                assert_eq!(command, "ping");
                assert_eq!(*length, 8);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_oversize_length_is_fatal() {
        let mut raw = ping(1);
        let too_big = (MAIN.max_message_size as u32 + 1).to_le_bytes();
        raw[16..20].copy_from_slice(&too_big);

        let mut parser = Parser::new(&MAIN);
        let err = parser.feed(&raw[..MESSAGE_HEADER_SIZE]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(parser.is_closed());
        assert_eq!(parser.feed(&[0]).unwrap_err(), FrameError::Closed);
    }

    #[test]
    fn test_checksum_mismatch_is_fatal() {
        let mut raw = ping(1);
        raw[20] ^= 0xff;
        let mut parser = Parser::new(&MAIN);
        assert!(matches!(
            parser.feed(&raw),
            Err(FrameError::ChecksumMismatch { .. })
        ));
        assert!(parser.is_closed());
    }

    #[test]
    fn test_bad_magic() {
        let raw = frame_message(&TESTNET, "ping", &[0; 8]).unwrap();
        let mut parser = Parser::new(&MAIN);
        assert_eq!(
            parser.feed(&raw).unwrap_err(),
            FrameError::BadMagic(TESTNET.magic)
        );
    }

    #[test]
    fn test_unterminated_command() {
        let mut raw = ping(1);
        raw[4..16].copy_from_slice(b"abcdefghijkl");
        let mut parser = Parser::new(&MAIN);
        assert_eq!(
            parser.feed(&raw).unwrap_err(),
            FrameError::UnterminatedCommand
        );
    }

    #[test]
    fn test_malformed_payload_recovers() {
        let mut raw = frame_message(&MAIN, "ping", &[1, 2, 3]).unwrap();
        raw.extend(ping(9));
        let mut parser = Parser::new(&MAIN);
        let events = parser.feed(&raw).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Event::Malformed { command, error: DecodeError::Truncated { .. } } if command == "ping"
        ));
        assert_eq!(events[1].command(), "ping");
        assert!(!parser.is_closed());
    }

    #[test]
    fn test_completed_kept_before_fatal() {
        let mut raw = ping(5);
        let mut bad = ping(6);
        bad[0] ^= 1;
        raw.extend(bad);
        let mut parser = Parser::new(&MAIN);
        assert!(parser.feed(&raw).is_err());
        let kept = parser.take_completed();
        assert_eq!(
            kept,
            vec![Event::Message {
                command: "ping".into(),
                payload: Payload::Ping(5)
            }]
        );
    }

    #[test]
    fn test_frame_rejects_bad_commands() {
        assert!(matches!(
            frame_message(&MAIN, "", &[]),
            Err(FrameError::InvalidCommand(_))
        ));
        assert!(matches!(
            frame_message(&MAIN, "twelve_chars", &[]),
            Err(FrameError::InvalidCommand(_))
        ));
        assert!(matches!(
            frame_message(&MAIN, "pïng", &[]),
            Err(FrameError::InvalidCommand(_))
        ));
        assert!(frame_message(&MAIN, "eleven_char", &[]).is_ok());
    }

    #[test]
    fn test_frame_layout() {
        let raw = frame_message(&MAIN, "ping", &[0; 8]).unwrap();
        assert_eq!(&raw[0..4], &MAIN.magic.to_le_bytes());
        assert_eq!(&raw[4..8], b"ping");
        assert!(raw[8..16].iter().all(|&b| b == 0));
        assert_eq!(&raw[16..20], &8u32.to_le_bytes());
        assert_eq!(&raw[20..24], &checksum(&[0; 8]));
    }
}
