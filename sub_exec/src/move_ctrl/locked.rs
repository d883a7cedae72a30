//! # Position-holding controller with operator override

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{console::RawAxes, gains::ControllerGains};

use super::{
    DrivingMode, MoveCtrlError, MoveCtrlParams, MoveOutput, MovementController, Overrides, Pose,
    ThrusterSpec,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds a pose using the locked gain set while letting the operator nudge individual axes.
///
/// Any axis whose raw input exceeds the deadband is driven open loop at `raw * max_duty_cycle`,
/// and is reported in the output's overrides so the caller can re-lock that axis at the pose the
/// vehicle ends up in.
#[derive(Debug, Clone)]
pub struct LockedController {
    inner: MovementController,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LockedController {
    pub fn new(specs: Vec<ThrusterSpec>, params: MoveCtrlParams) -> Result<Self, MoveCtrlError> {
        Ok(Self {
            inner: MovementController::new(specs, params)?,
        })
    }

    pub fn locked_move(
        &mut self,
        pose: &Pose,
        target: &Pose,
        raw: &RawAxes,
        gains: &ControllerGains,
        time_s: f64,
    ) -> MoveOutput {
        let law = self
            .inner
            .control_law(pose, target, DrivingMode::Forward, gains, time_s);

        let max = self.inner.thrusters.max_duty_cycle();
        let deadband = self.inner.params.raw_deadband;
        let mut signals = law.signals;
        let mut overrides = Overrides::default();

        let axes = [
            (raw.x, &mut signals.x, &mut overrides.x),
            (raw.y, &mut signals.y, &mut overrides.y),
            (raw.z, &mut signals.z, &mut overrides.z),
            (raw.pitch, &mut signals.pitch, &mut overrides.pitch),
            (raw.yaw, &mut signals.yaw, &mut overrides.yaw),
            (raw.roll, &mut signals.roll, &mut overrides.roll),
        ];

        for (value, signal, overridden) in axes {
            if value.is_finite() && value.abs() > deadband {
                *signal = value.max(-1.0).min(1.0) * max;
                *overridden = true;
            }
        }

        MoveOutput {
            duty_cycles: self.inner.thrusters.move_signals(&signals),
            errors: law.errors,
            body_error_ft: law.body_error_ft,
            desired_yaw_deg: law.desired_yaw_deg,
            overrides,
        }
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
