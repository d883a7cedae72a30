//! # Power board frames and commands

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{check_len, DecodeError};

/// Board message type of a power status frame.
pub const MSG_TYPE: u8 = 0x03;

/// Board message type of a dirty power command.
pub const CMD_MSG_TYPE: u8 = 0x31;

const PAYLOAD_LEN: usize = 5;

/// One status report from the power board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerFrame {
    /// True if the dirty power rail is energised
    pub status: bool,

    /// Units: amps
    pub battery1_a: f64,

    /// Units: amps
    pub battery2_a: f64,
}

impl PowerFrame {
    /// The larger of the two battery currents.
    pub fn max_current_a(&self) -> f64 {
        self.battery1_a.max(self.battery2_a)
    }
}

/// Decode a power payload: u8 status, u16 battery 1 current (mA), u16 battery 2 current (mA).
pub fn decode(payload: &[u8]) -> Result<PowerFrame, DecodeError> {
    check_len(payload, PAYLOAD_LEN)?;

    Ok(PowerFrame {
        status: payload[0] != 0,
        battery1_a: LittleEndian::read_u16(&payload[1..3]) as f64 * 0.001,
        battery2_a: LittleEndian::read_u16(&payload[3..5]) as f64 * 0.001,
    })
}

/// Payload of a dirty power command.
pub fn encode_cmd(energised: bool) -> [u8; 1] {
    [energised as u8]
}
