//! Movement control module
//!
//! Converts a desired pose, or operator demands, into thruster duty cycles. Three controller
//! families share the same thruster allocation:
//!
//! - [`MovementController`] drives to a waypoint, transforming the world-frame position error into
//!   the body frame.
//! - [`JoystickMovementController`] takes body-frame x and z demands directly from the operator
//!   and holds depth and attitude.
//! - [`LockedController`] holds a pose while letting the operator nudge individual axes.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod advanced;
mod joystick;
mod locked;
mod params;
mod pid;
mod thrusters;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use advanced::*;
pub use joystick::*;
pub use locked::*;
pub use params::*;
pub use pid::*;
pub use thrusters::*;

#[cfg(test)]
pub(crate) use thrusters::test::vehicle_specs;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position and orientation of the vehicle.
///
/// Positions are in feet relative to the navigation origin, angles in degrees with yaw in
/// `[0, 360)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    pub east_ft: f64,
    pub up_ft: f64,
    pub north_ft: f64,
}

/// The six body-frame signals fed to the thruster allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BodySignals {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Signed errors on each axis.
///
/// Position errors are world-frame `desired - current`, angle errors are the shortest signed path
/// in `(-180, 180]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AxisErrors {
    pub east: f64,
    pub up: f64,
    pub north: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Axes on which the operator's raw input replaced the controller output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Overrides {
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub pitch: bool,
    pub yaw: bool,
    pub roll: bool,
}

/// Output of one controller step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MoveOutput {
    /// Duty cycle of each thruster, in ID order
    pub duty_cycles: Vec<f64>,

    pub errors: AxisErrors,

    /// Position error in the body frame as `[x, y, z]`, the input to the position PIDs
    pub body_error_ft: [f64; 3],

    /// The yaw the controller steered towards, after any facing override
    pub desired_yaw_deg: f64,

    pub overrides: Overrides,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the vehicle faces its target while driving to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrivingMode {
    /// Face the target
    Forward,

    /// Face away from the target, using the backward yaw gains
    Reverse,

    /// Face the target, turning clockwise when far off heading
    SpinCw,

    /// Face the target, turning counter-clockwise when far off heading
    SpinCcw,
}

/// Possible errors that can occur during movement control.
#[derive(Debug, thiserror::Error)]
pub enum MoveCtrlError {
    #[error("The vehicle has no thrusters")]
    NoThrusters,

    #[error("Thruster {0} is invalid: {1}")]
    InvalidThrusterSpec(u8, String),

    #[error("The movement control parameters are invalid")]
    InvalidParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DrivingMode {
    fn default() -> Self {
        DrivingMode::Forward
    }
}

impl Overrides {
    pub fn any(&self) -> bool {
        self.x || self.y || self.z || self.pitch || self.yaw || self.roll
    }
}

