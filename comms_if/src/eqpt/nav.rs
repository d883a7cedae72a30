//! # Navigation sensor records

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{check_len, frame::NAV_PAYLOAD_LEN, DecodeError, Orientation};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Millimeters to feet.
pub const MM_TO_FT: f64 = 0.00328084;

/// Centidegrees to degrees.
pub const CENTIDEG_TO_DEG: f64 = 0.01;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One record from the navigation sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NavFrame {
    /// Units: feet
    pub north_ft: f64,

    /// Units: feet
    pub east_ft: f64,

    /// Units: feet
    pub up_ft: f64,

    /// Estimated error of the position solution
    ///
    /// Units: feet
    pub position_error_ft: f64,

    /// Velocity in the sensor frame as `[x, y, z]`
    ///
    /// Units: feet/second
    pub velocity_fps: [f64; 3],

    /// Units: degrees, `[0, 360)`
    pub heading_deg: f64,

    /// Units: degrees
    pub pitch_deg: f64,

    /// Units: degrees
    pub roll_deg: f64,

    /// Units: feet
    pub depth_ft: f64,

    /// Sensor status word
    pub misc: u16,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavFrame {
    pub fn orientation(&self) -> Orientation {
        Orientation {
            yaw_deg: self.heading_deg,
            pitch_deg: self.pitch_deg,
            roll_deg: self.roll_deg,
        }
    }

    /// Position as `[east, up, north]` in feet.
    pub fn position_ft(&self) -> [f64; 3] {
        [self.east_ft, self.up_ft, self.north_ft]
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decode the payload of a navigation record.
///
/// | Offset | Field | Type |
/// |---|---|---|
/// | 0 | north | i32 mm |
/// | 4 | east | i32 mm |
/// | 8 | up | i32 mm |
/// | 12 | position error | u32 mm |
/// | 16 | velocity x, y, z | 3 x i16 mm/s |
/// | 22 | heading | u16 centideg |
/// | 24 | pitch | i16 centideg |
/// | 26 | roll | i16 centideg |
/// | 28 | depth | i32 mm |
/// | 32 | misc | u16 |
pub fn decode(payload: &[u8]) -> Result<NavFrame, DecodeError> {
    check_len(payload, NAV_PAYLOAD_LEN)?;

    let mm =
        |offset: usize| LittleEndian::read_i32(&payload[offset..offset + 4]) as f64 * MM_TO_FT;
    let mm_s =
        |offset: usize| LittleEndian::read_i16(&payload[offset..offset + 2]) as f64 * MM_TO_FT;
    let cdeg = |offset: usize| {
        LittleEndian::read_i16(&payload[offset..offset + 2]) as f64 * CENTIDEG_TO_DEG
    };

    let heading_deg = LittleEndian::read_u16(&payload[22..24]) as f64 * CENTIDEG_TO_DEG;
    if heading_deg >= 360.0 {
        return Err(DecodeError::OutOfRange("heading"));
    }

    Ok(NavFrame {
        north_ft: mm(0),
        east_ft: mm(4),
        up_ft: mm(8),
        position_error_ft: LittleEndian::read_u32(&payload[12..16]) as f64 * MM_TO_FT,
        velocity_fps: [mm_s(16), mm_s(18), mm_s(20)],
        heading_deg,
        pitch_deg: cdeg(24),
        roll_deg: cdeg(26),
        depth_ft: mm(28),
        misc: LittleEndian::read_u16(&payload[32..34]),
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn payload() -> [u8; NAV_PAYLOAD_LEN] {
        let mut p = [0u8; NAV_PAYLOAD_LEN];
        LittleEndian::write_i32(&mut p[0..4], 3048);
        LittleEndian::write_i32(&mut p[4..8], -1524);
        LittleEndian::write_i32(&mut p[8..12], 0);
        LittleEndian::write_u32(&mut p[12..16], 100);
        LittleEndian::write_i16(&mut p[16..18], 305);
        LittleEndian::write_i16(&mut p[18..20], -305);
        LittleEndian::write_i16(&mut p[20..22], 0);
        LittleEndian::write_u16(&mut p[22..24], 35_000);
        LittleEndian::write_i16(&mut p[24..26], -250);
        LittleEndian::write_i16(&mut p[26..28], 1_000);
        LittleEndian::write_i32(&mut p[28..32], 6096);
        LittleEndian::write_u16(&mut p[32..34], 0xBEEF);
        p
    }

    #[test]
    fn test_decode_nav() {
        let f = decode(&payload()).unwrap();

        assert!((f.north_ft - 10.0).abs() < 1e-3);
        assert!((f.east_ft + 5.0).abs() < 1e-3);
        assert_eq!(f.up_ft, 0.0);
        assert!((f.velocity_fps[0] - 1.0).abs() < 1e-3);
        assert!((f.velocity_fps[1] + 1.0).abs() < 1e-3);
        assert!((f.heading_deg - 350.0).abs() < 1e-9);
        assert!((f.pitch_deg + 2.5).abs() < 1e-9);
        assert!((f.roll_deg - 10.0).abs() < 1e-9);
        assert!((f.depth_ft - 20.0).abs() < 1e-3);
        assert_eq!(f.misc, 0xBEEF);
        assert_eq!(f.position_ft()[0], f.east_ft);
    }

    #[test]
    fn test_decode_nav_errors() {
        assert_eq!(
            decode(&[0u8; 10]),
            Err(DecodeError::WrongLength {
                expected: NAV_PAYLOAD_LEN,
                found: 10
            })
        );

        let mut p = payload();
        LittleEndian::write_u16(&mut p[22..24], 36_000);
        assert_eq!(decode(&p), Err(DecodeError::OutOfRange("heading")));
    }
}
