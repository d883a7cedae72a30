//! # Joystick frames

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{check_len, DecodeError};
use crate::console::RawAxes;

/// Board message type of a joystick frame.
pub const MSG_TYPE: u8 = 0x04;

const PAYLOAD_LEN: usize = 14;

/// Full scale of a joystick axis.
const AXIS_FULL_SCALE: f64 = 32767.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JoystickFrame {
    /// Axis demands in `[-1, 1]`
    pub axes: RawAxes,

    /// Button bitfield
    pub buttons: u16,
}

/// Decode a joystick payload: six i16 axes (x, y, z, pitch, yaw, roll) then a u16 button field.
pub fn decode(payload: &[u8]) -> Result<JoystickFrame, DecodeError> {
    check_len(payload, PAYLOAD_LEN)?;

    let axis = |i: usize| {
        let v = LittleEndian::read_i16(&payload[2 * i..2 * i + 2]) as f64 / AXIS_FULL_SCALE;
        v.max(-1.0).min(1.0)
    };

    Ok(JoystickFrame {
        axes: RawAxes {
            x: axis(0),
            y: axis(1),
            z: axis(2),
            pitch: axis(3),
            yaw: axis(4),
            roll: axis(5),
        },
        buttons: LittleEndian::read_u16(&payload[12..14]),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_joystick() {
        let mut p = [0u8; PAYLOAD_LEN];
        LittleEndian::write_i16(&mut p[0..2], 32767);
        LittleEndian::write_i16(&mut p[4..6], -32768);
        LittleEndian::write_u16(&mut p[12..14], 0b101);

        let f = decode(&p).unwrap();
        assert_eq!(f.axes.x, 1.0);
        assert_eq!(f.axes.y, 0.0);
        assert_eq!(f.axes.z, -1.0);
        assert_eq!(f.buttons, 5);
    }
}
