//! # Frame synchronisation
//!
//! Serial links deliver an unstructured stream of bytes. A [`Framer`] accumulates these bytes,
//! finds the start of each frame, validates its length and checksum and hands out complete
//! frames. Bytes which cannot start a valid frame are discarded one at a time so that the framer
//! resynchronises on the next sync marker.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use super::Framing;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// First byte of every board frame.
pub const BOARD_SYNC: u8 = 0xAA;

/// Largest payload a board frame may carry.
pub const MAX_BOARD_PAYLOAD: usize = 244;

/// Bytes in a board frame besides the payload (sync, type, length, checksum).
const BOARD_OVERHEAD: usize = 4;

/// Sync marker of a navigation sensor record.
pub const NAV_SYNC: [u8; 2] = [0x7D, 0x00];

/// Total length of a navigation sensor record.
pub const NAV_FRAME_LEN: usize = 40;

/// Length of the payload of a navigation sensor record.
pub const NAV_PAYLOAD_LEN: usize = 34;

/// Message type given to navigation records, which carry the second sync byte as their ID.
pub const NAV_MSG_TYPE: u8 = 0x00;

/// Upper bound on the bytes a framer buffers while waiting for a frame to complete.
const MAX_BUFFERED: usize = 4096;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Reassembles frames from a byte stream.
pub trait Framer: Send {
    /// Add newly received bytes to the framer.
    fn extend(&mut self, bytes: &[u8]);

    /// Pop the next complete and valid frame, if there is one.
    fn next_frame(&mut self) -> Option<RawFrame>;

    /// Number of bytes discarded while resynchronising.
    fn num_dropped_bytes(&self) -> u64;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A validated frame whose payload has not yet been decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

/// Framer for `[0xAA][type][len][payload][checksum]` board frames.
///
/// The checksum is the wrapping sum of the type, length and payload bytes.
#[derive(Debug, Default)]
pub struct BoardFramer {
    buffer: Vec<u8>,
    dropped: u64,
}

/// Framer for the navigation sensor's fixed length records.
///
/// A record is `[0x7D][0x00][len: u16][payload: 34 bytes][checksum: u16]`, all little-endian,
/// where `len` is the total record length and the checksum is the wrapping 16 bit sum of every
/// preceding byte.
#[derive(Debug, Default)]
pub struct NavFramer {
    buffer: Vec<u8>,
    dropped: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("A payload of {0} bytes is longer than the board frame maximum")]
    PayloadTooLong(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Framing {
    /// Create a new framer for this framing.
    pub fn framer(&self) -> Box<dyn Framer> {
        match self {
            Framing::Board => Box::new(BoardFramer::default()),
            Framing::Nav => Box::new(NavFramer::default()),
        }
    }
}

impl BoardFramer {
    /// Build a board frame around the given payload.
    pub fn encode(msg_type: u8, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        if payload.len() > MAX_BOARD_PAYLOAD {
            return Err(EncodeError::PayloadTooLong(payload.len()));
        }

        let mut frame = Vec::with_capacity(BOARD_OVERHEAD + payload.len());
        frame.push(BOARD_SYNC);
        frame.push(msg_type);
        frame.push(payload.len() as u8);
        frame.extend_from_slice(payload);
        frame.push(byte_checksum(&frame[1..]));

        Ok(frame)
    }

    fn drop_byte(&mut self) {
        self.buffer.remove(0);
        self.dropped += 1;
    }
}

impl Framer for BoardFramer {
    fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.dropped += trim_buffer(&mut self.buffer);
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            // Skip to the next sync byte
            let sync_pos = match self.buffer.iter().position(|&b| b == BOARD_SYNC) {
                Some(p) => p,
                None => {
                    self.dropped += self.buffer.len() as u64;
                    self.buffer.clear();
                    return None;
                }
            };
            if sync_pos > 0 {
                self.buffer.drain(0..sync_pos);
                self.dropped += sync_pos as u64;
            }

            if self.buffer.len() < BOARD_OVERHEAD {
                return None;
            }

            let len = self.buffer[2] as usize;
            if len > MAX_BOARD_PAYLOAD {
                self.drop_byte();
                continue;
            }

            let frame_len = BOARD_OVERHEAD + len;
            if self.buffer.len() < frame_len {
                return None;
            }

            if self.buffer[3 + len] != byte_checksum(&self.buffer[1..3 + len]) {
                self.drop_byte();
                continue;
            }

            let frame = RawFrame {
                msg_type: self.buffer[1],
                payload: self.buffer[3..3 + len].to_vec(),
            };
            self.buffer.drain(0..frame_len);

            return Some(frame);
        }
    }

    fn num_dropped_bytes(&self) -> u64 {
        self.dropped
    }
}

impl NavFramer {
    /// Build a navigation record around the given payload.
    pub fn encode(payload: &[u8; NAV_PAYLOAD_LEN]) -> Vec<u8> {
        let mut frame = vec![0u8; NAV_FRAME_LEN];
        frame[0..2].copy_from_slice(&NAV_SYNC);
        LittleEndian::write_u16(&mut frame[2..4], NAV_FRAME_LEN as u16);
        frame[4..4 + NAV_PAYLOAD_LEN].copy_from_slice(payload);

        let checksum = word_checksum(&frame[..NAV_FRAME_LEN - 2]);
        LittleEndian::write_u16(&mut frame[NAV_FRAME_LEN - 2..], checksum);

        frame
    }

    fn drop_byte(&mut self) {
        self.buffer.remove(0);
        self.dropped += 1;
    }
}

impl Framer for NavFramer {
    fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.dropped += trim_buffer(&mut self.buffer);
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            let sync_pos = match self.buffer.iter().position(|&b| b == NAV_SYNC[0]) {
                Some(p) => p,
                None => {
                    self.dropped += self.buffer.len() as u64;
                    self.buffer.clear();
                    return None;
                }
            };
            if sync_pos > 0 {
                self.buffer.drain(0..sync_pos);
                self.dropped += sync_pos as u64;
            }

            if self.buffer.len() < 4 {
                return None;
            }

            if self.buffer[1] != NAV_SYNC[1]
                || LittleEndian::read_u16(&self.buffer[2..4]) as usize != NAV_FRAME_LEN
            {
                self.drop_byte();
                continue;
            }

            if self.buffer.len() < NAV_FRAME_LEN {
                return None;
            }

            let checksum = LittleEndian::read_u16(&self.buffer[NAV_FRAME_LEN - 2..NAV_FRAME_LEN]);
            if checksum != word_checksum(&self.buffer[..NAV_FRAME_LEN - 2]) {
                self.drop_byte();
                continue;
            }

            let frame = RawFrame {
                msg_type: NAV_MSG_TYPE,
                payload: self.buffer[4..4 + NAV_PAYLOAD_LEN].to_vec(),
            };
            self.buffer.drain(0..NAV_FRAME_LEN);

            return Some(frame);
        }
    }

    fn num_dropped_bytes(&self) -> u64 {
        self.dropped
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn byte_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn word_checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Discard the oldest bytes of a buffer which has grown beyond its limit, returning the number of
/// bytes discarded.
fn trim_buffer(buffer: &mut Vec<u8>) -> u64 {
    if buffer.len() > MAX_BUFFERED {
        let excess = buffer.len() - MAX_BUFFERED;
        buffer.drain(0..excess);
        excess as u64
    } else {
        0
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
