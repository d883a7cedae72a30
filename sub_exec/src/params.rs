//! # Sub Executable Parameters
//!
//! This module provides parameters for the sub executable, loaded from `sub_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::NetParams;
use serde::Deserialize;

use crate::serial::SerialParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SubExecParams {
    /// If true per-cycle records are written to the session's archive directory
    #[serde(default)]
    pub archive: bool,

    /// Parameters of the control loop itself
    pub nav_loop: NavLoopParams,

    /// Serial devices
    pub serial: SerialParams,

    /// Console link
    pub net: NetParams,
}

/// Parameters of the control loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavLoopParams {
    /// Target period of one cycle
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// A device which has sent nothing for this long is reported stale and its data is no longer
    /// used.
    ///
    /// Units: seconds
    pub stale_timeout_s: f64,

    /// Battery current at which dirty power is cut.
    ///
    /// Units: amps
    pub max_battery_current_a: f64,

    /// If no console command is received for this long the manual axes are zeroed.
    ///
    /// Units: seconds
    pub console_lost_timeout_s: f64,

    /// Controller used in manual mode
    pub manual_style: ManualStyle,

    /// Depth target offset per unit of raw y input in joystick style
    ///
    /// Units: feet
    pub joystick_depth_nudge_ft: f64,

    /// Yaw target offset per unit of raw yaw input in joystick style
    ///
    /// Units: degrees
    pub joystick_yaw_nudge_deg: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Which controller drives the vehicle in manual mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ManualStyle {
    /// Hold the pose, operator input overrides individual axes
    Locked,

    /// Operator drives x and z directly, depth and attitude are held
    Joystick,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SubExecParams {
    pub fn are_valid(&self) -> bool {
        self.nav_loop.are_valid()
            && self.serial.queue_capacity > 0
            && self.net.console_recv_timeout_ms >= 0
    }
}

impl NavLoopParams {
    pub fn are_valid(&self) -> bool {
        self.cycle_period_s > 0.0
            && self.stale_timeout_s > 0.0
            && self.max_battery_current_a > 0.0
            && self.console_lost_timeout_s > 0.0
            && self.joystick_depth_nudge_ft.is_finite()
            && self.joystick_yaw_nudge_deg.is_finite()
    }
}

impl Default for NavLoopParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.1,
            stale_timeout_s: 1.0,
            max_battery_current_a: 18.0,
            console_lost_timeout_s: 2.0,
            manual_style: ManualStyle::Locked,
            joystick_depth_nudge_ft: 1.0,
            joystick_yaw_nudge_deg: 15.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
