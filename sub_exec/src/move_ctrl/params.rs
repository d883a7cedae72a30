//! Parameters structures for the movement controllers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::ThrusterSpec;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the movement controllers, loaded from `move_ctrl.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveCtrlParams {
    /// Horizontal distance beyond which the vehicle turns to face its target before translating.
    ///
    /// Units: feet
    pub orientation_bubble_ft: f64,

    /// Yaw error beyond which `SpinCw` and `SpinCcw` force the direction of rotation.
    ///
    /// Units: degrees
    pub spin_force_threshold_deg: f64,

    /// Yaw error beyond which translation is damped while outside the bubble.
    ///
    /// Units: degrees
    pub yaw_damping_threshold_deg: f64,

    /// Factor applied to the x and z signals while damping.
    pub translation_damping: f64,

    /// Raw manual input magnitude above which an axis bypasses its controller.
    pub raw_deadband: f64,

    /// Scale applied to position errors before they reach the PIDs.
    pub position_error_scale: f64,

    /// Scale applied to angle errors before they reach the PIDs.
    pub angle_error_scale: f64,

    /// Minimum interval between two commands to the same thruster.
    ///
    /// Units: seconds
    pub min_send_interval_s: f64,
}

/// Vehicle geometry, loaded from `vehicle.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleParams {
    pub thrusters: Vec<ThrusterSpec>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MoveCtrlParams {
    /// Check that the parameters are usable.
    pub fn are_valid(&self) -> bool {
        self.orientation_bubble_ft >= 0.0
            && (0.0..=180.0).contains(&self.spin_force_threshold_deg)
            && (0.0..=180.0).contains(&self.yaw_damping_threshold_deg)
            && (0.0..=1.0).contains(&self.translation_damping)
            && (0.0..1.0).contains(&self.raw_deadband)
            && self.position_error_scale.is_finite()
            && self.angle_error_scale.is_finite()
            && self.min_send_interval_s >= 0.0
    }
}

impl Default for MoveCtrlParams {
    fn default() -> Self {
        Self {
            orientation_bubble_ft: 3.5,
            spin_force_threshold_deg: 90.0,
            yaw_damping_threshold_deg: 30.0,
            translation_damping: 0.85,
            raw_deadband: 0.2,
            position_error_scale: 1.0,
            angle_error_scale: 1.0,
            min_send_interval_s: 0.05,
        }
    }
}
