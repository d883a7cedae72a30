//! # Joystick movement controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::gains::ControllerGains;
use util::maths::{ang_dist_deg, clamp};

use super::{
    AxisErrors, BodySignals, MoveCtrlError, MoveCtrlParams, MoveOutput, MovementController,
    Overrides, Pose, ThrusterSpec,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Operator-driven controller.
///
/// The operator supplies body-frame x and z signals directly, there is no world to body
/// transform. Depth, pitch, yaw and roll are held at the target through the joystick gain set.
#[derive(Debug, Clone)]
pub struct JoystickMovementController {
    inner: MovementController,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl JoystickMovementController {
    pub fn new(specs: Vec<ThrusterSpec>, params: MoveCtrlParams) -> Result<Self, MoveCtrlError> {
        Ok(Self {
            inner: MovementController::new(specs, params)?,
        })
    }

    /// Move with operator x/z signals while holding the target's depth and attitude.
    ///
    /// The east and north components of `target` are ignored.
    pub fn joystick_move(
        &mut self,
        pose: &Pose,
        x_signal: f64,
        z_signal: f64,
        target: &Pose,
        gains: &ControllerGains,
        time_s: f64,
    ) -> MoveOutput {
        let max = self.inner.thrusters.max_duty_cycle();
        let p = &self.inner.params;
        let pids = &mut self.inner.pids;

        let up_err = target.up_ft - pose.up_ft;
        let yaw_err = ang_dist_deg(pose.yaw_deg, target.yaw_deg);
        let pitch_err = ang_dist_deg(pose.pitch_deg, target.pitch_deg);
        let roll_err = ang_dist_deg(pose.roll_deg, target.roll_deg);

        let signals = BodySignals {
            x: clamp(x_signal, -max, max),
            y: clamp(
                pids.depth
                    .update(&gains.depth, up_err, p.position_error_scale, time_s),
                -max,
                max,
            ),
            z: clamp(z_signal, -max, max),
            pitch: clamp(
                pids.pitch
                    .update(&gains.pitch, pitch_err, p.angle_error_scale, time_s),
                -max,
                max,
            ),
            yaw: clamp(
                pids.yaw_fwd
                    .update(&gains.yaw_fwd, yaw_err, p.angle_error_scale, time_s),
                -max,
                max,
            ),
            roll: clamp(
                pids.roll
                    .update(&gains.roll, roll_err, p.angle_error_scale, time_s),
                -max,
                max,
            ),
        };

        MoveOutput {
            duty_cycles: self.inner.thrusters.move_signals(&signals),
            errors: AxisErrors {
                east: 0.0,
                up: up_err,
                north: 0.0,
                pitch: pitch_err,
                yaw: yaw_err,
                roll: roll_err,
            },
            body_error_ft: [0.0, up_err, 0.0],
            desired_yaw_deg: target.yaw_deg,
            overrides: Overrides::default(),
        }
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn max_duty_cycle(&self) -> f64 {
        self.inner.thrusters.max_duty_cycle()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
