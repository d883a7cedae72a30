//! # Housekeeping board frames

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{check_len, nav::MM_TO_FT, DecodeError};

/// Board message type of a housekeeping frame.
pub const MSG_TYPE: u8 = 0x02;

const PAYLOAD_LEN: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HkFrame {
    /// Internal hull temperature
    ///
    /// Units: degrees Celsius
    pub temperature_c: f64,

    /// External pressure
    ///
    /// Units: pascals
    pub pressure_pa: f64,

    /// Depth from the pressure sensor
    ///
    /// Units: feet
    pub depth_ft: f64,
}

/// Decode a housekeeping payload: i16 temperature (centi-degrees C), u32 pressure (Pa),
/// i32 depth (mm).
pub fn decode(payload: &[u8]) -> Result<HkFrame, DecodeError> {
    check_len(payload, PAYLOAD_LEN)?;

    Ok(HkFrame {
        temperature_c: LittleEndian::read_i16(&payload[0..2]) as f64 * 0.01,
        pressure_pa: LittleEndian::read_u32(&payload[2..6]) as f64,
        depth_ft: LittleEndian::read_i32(&payload[6..10]) as f64 * MM_TO_FT,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_hk() {
        let mut p = [0u8; PAYLOAD_LEN];
        LittleEndian::write_i16(&mut p[0..2], 2150);
        LittleEndian::write_u32(&mut p[2..6], 150_000);
        LittleEndian::write_i32(&mut p[6..10], 3048);

        let f = decode(&p).unwrap();
        assert!((f.temperature_c - 21.5).abs() < 1e-9);
        assert_eq!(f.pressure_pa, 150_000.0);
        assert!((f.depth_ft - 10.0).abs() < 1e-3);
    }
}
