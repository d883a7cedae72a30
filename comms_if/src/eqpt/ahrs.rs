//! # Orientation sensor frames

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{check_len, nav::CENTIDEG_TO_DEG, DecodeError, Orientation};

/// Board message type of an orientation frame.
pub const MSG_TYPE: u8 = 0x01;

const PAYLOAD_LEN: usize = 6;

/// One orientation reading from an AHRS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AhrsFrame {
    pub heading_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

impl From<AhrsFrame> for Orientation {
    fn from(f: AhrsFrame) -> Self {
        Orientation {
            yaw_deg: f.heading_deg,
            pitch_deg: f.pitch_deg,
            roll_deg: f.roll_deg,
        }
    }
}

/// Decode an orientation payload: u16 heading, i16 pitch, i16 roll, all in centidegrees.
pub fn decode(payload: &[u8]) -> Result<AhrsFrame, DecodeError> {
    check_len(payload, PAYLOAD_LEN)?;

    let heading_deg = LittleEndian::read_u16(&payload[0..2]) as f64 * CENTIDEG_TO_DEG;
    if heading_deg >= 360.0 {
        return Err(DecodeError::OutOfRange("heading"));
    }

    Ok(AhrsFrame {
        heading_deg,
        pitch_deg: LittleEndian::read_i16(&payload[2..4]) as f64 * CENTIDEG_TO_DEG,
        roll_deg: LittleEndian::read_i16(&payload[4..6]) as f64 * CENTIDEG_TO_DEG,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_ahrs() {
        // 123.45, -12.34, 0.5
        let f = decode(&[0x39, 0x30, 0x2E, 0xFB, 0x32, 0x00]).unwrap();

        assert!((f.heading_deg - 123.45).abs() < 1e-9);
        assert!((f.pitch_deg + 12.34).abs() < 1e-9);
        assert!((f.roll_deg - 0.5).abs() < 1e-9);

        assert!(decode(&[0x00; 5]).is_err());
        assert_eq!(
            decode(&[0xFF, 0xFF, 0, 0, 0, 0]),
            Err(DecodeError::OutOfRange("heading"))
        );
    }
}
