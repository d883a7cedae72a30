//! # Equipment Interface
//!
//! This module defines the binary frames exchanged with the vehicle's onboard equipment and the
//! pure functions which decode them into typed records.
//!
//! Bytes read from a device are first passed through a [`frame::Framer`], which finds and
//! validates complete frames, and then decoded by [`DeviceKind::decode`] according to which device
//! they came from.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod ahrs;
pub mod aux;
pub mod frame;
pub mod hk;
pub mod joystick;
pub mod nav;
pub mod power;
pub mod thruster;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::{
    ahrs::AhrsFrame, frame::RawFrame, hk::HkFrame, joystick::JoystickFrame, nav::NavFrame,
    power::PowerFrame,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An orientation in degrees.
///
/// Yaw is in `[0, 360)`, pitch and roll are in `[-180, 180]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The physical devices attached to the core by serial links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    Nav,
    Ahrs0,
    Ahrs1,
    Ahrs2,
    ThrusterBoard0,
    ThrusterBoard1,
    Power,
    Housekeeping,
    Acoustic,
    Aux,
    Joystick,
}

/// The framing used on a device's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `[0xAA][type][len][payload][checksum]` frames used by the vehicle's own boards
    Board,

    /// Fixed length records produced by the navigation sensor
    Nav,
}

/// A decoded frame from one device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceFrame {
    Nav(NavFrame),
    Ahrs(AhrsFrame),
    Hk(HkFrame),
    Power(PowerFrame),
    Joystick(JoystickFrame),

    /// A frame from a board whose replies are only logged
    Raw(RawFrame),
}

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Expected a payload of {expected} bytes, found {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("{device:?} does not send messages of type {msg_type:#04x}")]
    UnexpectedType { device: DeviceKind, msg_type: u8 },

    #[error("Field {0} is out of range")]
    OutOfRange(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DeviceKind {
    /// The three redundant orientation sensors, in source order.
    pub const AHRS: [DeviceKind; 3] = [DeviceKind::Ahrs0, DeviceKind::Ahrs1, DeviceKind::Ahrs2];

    /// Framing used on this device's link.
    pub fn framing(&self) -> Framing {
        match self {
            DeviceKind::Nav => Framing::Nav,
            _ => Framing::Board,
        }
    }

    /// Index of this device among the orientation sensors, if it is one.
    pub fn ahrs_index(&self) -> Option<usize> {
        DeviceKind::AHRS.iter().position(|d| d == self)
    }

    /// Decode a complete frame received from this device.
    pub fn decode(&self, raw: &RawFrame) -> Result<DeviceFrame, DecodeError> {
        match self {
            DeviceKind::Nav => nav::decode(&raw.payload).map(DeviceFrame::Nav),
            DeviceKind::Ahrs0 | DeviceKind::Ahrs1 | DeviceKind::Ahrs2 => {
                self.expect_type(raw, ahrs::MSG_TYPE)?;
                ahrs::decode(&raw.payload).map(DeviceFrame::Ahrs)
            }
            DeviceKind::Housekeeping => {
                self.expect_type(raw, hk::MSG_TYPE)?;
                hk::decode(&raw.payload).map(DeviceFrame::Hk)
            }
            DeviceKind::Power => {
                self.expect_type(raw, power::MSG_TYPE)?;
                power::decode(&raw.payload).map(DeviceFrame::Power)
            }
            DeviceKind::Joystick => {
                self.expect_type(raw, joystick::MSG_TYPE)?;
                joystick::decode(&raw.payload).map(DeviceFrame::Joystick)
            }
            DeviceKind::ThrusterBoard0
            | DeviceKind::ThrusterBoard1
            | DeviceKind::Acoustic
            | DeviceKind::Aux => Ok(DeviceFrame::Raw(raw.clone())),
        }
    }

    fn expect_type(&self, raw: &RawFrame, msg_type: u8) -> Result<(), DecodeError> {
        if raw.msg_type == msg_type {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedType {
                device: *self,
                msg_type: raw.msg_type,
            })
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check the length of a fixed size payload.
fn check_len(payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() == expected {
        Ok(())
    } else {
        Err(DecodeError::WrongLength {
            expected,
            found: payload.len(),
        })
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_dispatch() {
        let ahrs = RawFrame {
            msg_type: ahrs::MSG_TYPE,
            payload: vec![0x10, 0x27, 0, 0, 0, 0],
        };

        match DeviceKind::Ahrs1.decode(&ahrs) {
            Ok(DeviceFrame::Ahrs(f)) => assert_eq!(f.heading_deg, 100.0),
            r => panic!("Unexpected decode result {:?}", r),
        }

        // An AHRS frame arriving on the power board link is rejected
        assert_eq!(
            DeviceKind::Power.decode(&ahrs),
            Err(DecodeError::UnexpectedType {
                device: DeviceKind::Power,
                msg_type: ahrs::MSG_TYPE
            })
        );

        // Boards which are only logged pass their frames through
        assert_eq!(
            DeviceKind::Acoustic.decode(&ahrs),
            Ok(DeviceFrame::Raw(ahrs.clone()))
        );
    }

    #[test]
    fn test_ahrs_index() {
        assert_eq!(DeviceKind::Ahrs2.ahrs_index(), Some(2));
        assert_eq!(DeviceKind::Nav.ahrs_index(), None);
    }
}
