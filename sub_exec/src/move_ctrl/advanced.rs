//! # Waypoint movement controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::gains::ControllerGains;
use log::trace;
use nalgebra::{Rotation3, Translation3, Vector3};
use util::maths::{ang_dist_deg, clamp, rem_euclid, wrap_360};

use super::{
    AxisErrors, BodySignals, DrivingMode, MoveCtrlError, MoveCtrlParams, MoveOutput, Overrides,
    PidController, Pose, ThrusterArray, ThrusterSpec,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One PID controller per axis.
#[derive(Debug, Default, Clone)]
pub struct AxisPids {
    pub yaw_fwd: PidController,
    pub yaw_bwd: PidController,
    pub pitch: PidController,
    pub roll: PidController,
    pub depth: PidController,
    pub east: PidController,
    pub north: PidController,
}

/// Drives the vehicle towards a target pose.
#[derive(Debug, Clone)]
pub struct MovementController {
    pub(super) thrusters: ThrusterArray,
    pub(super) params: MoveCtrlParams,
    pub(super) pids: AxisPids,
}

/// Intermediate result of the waypoint control law, before allocation.
#[derive(Debug, Clone, Copy)]
pub(super) struct ControlLaw {
    pub signals: BodySignals,
    pub errors: AxisErrors,
    pub body_error_ft: [f64; 3],
    pub desired_yaw_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AxisPids {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl MovementController {
    /// Create a new controller, which takes its own copy of the thruster specs.
    pub fn new(specs: Vec<ThrusterSpec>, params: MoveCtrlParams) -> Result<Self, MoveCtrlError> {
        if !params.are_valid() {
            return Err(MoveCtrlError::InvalidParams);
        }

        Ok(Self {
            thrusters: ThrusterArray::new(specs)?,
            params,
            pids: AxisPids::default(),
        })
    }

    /// Drive towards `target` from `pose`.
    ///
    /// The world-frame position error is transformed into the body frame and each component fed
    /// through its PID. While the target is further than the orientation bubble away the vehicle
    /// is turned to face it (or face away from it in `Reverse`), with translation damped while the
    /// heading error is large.
    pub fn advanced_move(
        &mut self,
        pose: &Pose,
        target: &Pose,
        mode: DrivingMode,
        gains: &ControllerGains,
        time_s: f64,
    ) -> MoveOutput {
        let law = self.control_law(pose, target, mode, gains, time_s);

        MoveOutput {
            duty_cycles: self.thrusters.move_signals(&law.signals),
            errors: law.errors,
            body_error_ft: law.body_error_ft,
            desired_yaw_deg: law.desired_yaw_deg,
            overrides: Overrides::default(),
        }
    }

    /// Set all thrusters to zero and clear the controller state.
    pub fn neutral(&mut self) -> Vec<f64> {
        self.pids.reset();
        self.thrusters.neutral()
    }

    pub fn reset(&mut self) {
        self.pids.reset();
    }

    pub fn thrusters(&self) -> &ThrusterArray {
        &self.thrusters
    }

    pub fn params(&self) -> &MoveCtrlParams {
        &self.params
    }

    /// Compute the body-frame signals for a target pose.
    pub(super) fn control_law(
        &mut self,
        pose: &Pose,
        target: &Pose,
        mode: DrivingMode,
        gains: &ControllerGains,
        time_s: f64,
    ) -> ControlLaw {
        let max = self.thrusters.max_duty_cycle();
        let p = &self.params;

        // World-frame error, then body-frame error
        let world_err = Vector3::new(
            target.east_ft - pose.east_ft,
            target.up_ft - pose.up_ft,
            target.north_ft - pose.north_ft,
        );
        let body_err = world_to_body(pose.yaw_deg, &world_err);

        let mut x = clamp(
            self.pids
                .east
                .update(&gains.east, body_err.x, p.position_error_scale, time_s),
            -max,
            max,
        );
        let y = clamp(
            self.pids
                .depth
                .update(&gains.depth, body_err.y, p.position_error_scale, time_s),
            -max,
            max,
        );
        let mut z = clamp(
            self.pids
                .north
                .update(&gains.north, body_err.z, p.position_error_scale, time_s),
            -max,
            max,
        );

        // Face the target while outside the bubble
        let outside_bubble = world_err.x.hypot(world_err.z) > p.orientation_bubble_ft;

        let mut desired_yaw_deg = wrap_360(target.yaw_deg);
        if outside_bubble {
            desired_yaw_deg = wrap_360(world_err.x.atan2(world_err.z).to_degrees());

            if mode == DrivingMode::Reverse {
                desired_yaw_deg = wrap_360(desired_yaw_deg + 180.0);
            }
        }

        let yaw_err = ang_dist_deg(pose.yaw_deg, desired_yaw_deg);

        // The PID sees the forced spin direction, telemetry sees the shortest path
        let yaw_demand = if outside_bubble && yaw_err.abs() > p.spin_force_threshold_deg {
            match mode {
                DrivingMode::SpinCw => rem_euclid(yaw_err, 360.0),
                DrivingMode::SpinCcw => rem_euclid(yaw_err, 360.0) - 360.0,
                _ => yaw_err,
            }
        } else {
            yaw_err
        };

        let yaw = match mode {
            DrivingMode::Reverse => {
                self.pids
                    .yaw_bwd
                    .update(&gains.yaw_bwd, yaw_demand, p.angle_error_scale, time_s)
            }
            _ => self
                .pids
                .yaw_fwd
                .update(&gains.yaw_fwd, yaw_demand, p.angle_error_scale, time_s),
        };
        let yaw = clamp(yaw, -max, max);

        let pitch_err = ang_dist_deg(pose.pitch_deg, target.pitch_deg);
        let roll_err = ang_dist_deg(pose.roll_deg, target.roll_deg);

        let pitch = clamp(
            self.pids
                .pitch
                .update(&gains.pitch, pitch_err, p.angle_error_scale, time_s),
            -max,
            max,
        );
        let roll = clamp(
            self.pids
                .roll
                .update(&gains.roll, roll_err, p.angle_error_scale, time_s),
            -max,
            max,
        );

        // Don't fight the rotation
        if outside_bubble && yaw_err.abs() > p.yaw_damping_threshold_deg {
            x *= p.translation_damping;
            z *= p.translation_damping;
        }

        trace!(
            "Body error: [{:.3}, {:.3}, {:.3}] ft, yaw error: {:.2} deg (desired {:.2})",
            body_err.x,
            body_err.y,
            body_err.z,
            yaw_err,
            desired_yaw_deg
        );

        ControlLaw {
            signals: BodySignals {
                x,
                y,
                z,
                pitch,
                yaw,
                roll,
            },
            errors: AxisErrors {
                east: world_err.x,
                up: world_err.y,
                north: world_err.z,
                pitch: pitch_err,
                yaw: yaw_err,
                roll: roll_err,
            },
            body_error_ft: [body_err.x, body_err.y, body_err.z],
            desired_yaw_deg,
        }
    }
}

/// Express a world-frame `[east, up, north]` vector in the body frame of a vehicle with the given
/// yaw.
///
/// Builds `T = Rot(yaw)^-1 * Translate(v) * Rot(yaw)` and returns its translation, where `Rot` is
/// the rotation taking body axes (x starboard, y up, z forward) onto the world axes
/// (east, up, north). Yaw is positive clockwise seen from above, which is a positive rotation
/// about +y in this frame.
pub fn world_to_body(yaw_deg: f64, world: &Vector3<f64>) -> Vector3<f64> {
    let rot = Rotation3::from_axis_angle(&Vector3::y_axis(), yaw_deg.to_radians());

    let t = rot.inverse().to_homogeneous()
        * Translation3::new(world.x, world.y, world.z).to_homogeneous()
        * rot.to_homogeneous();

    Vector3::new(t[(0, 3)], t[(1, 3)], t[(2, 3)])
}

/// Express a body-frame `[x, y, z]` vector in the world frame, the inverse of [`world_to_body`].
pub fn body_to_world(yaw_deg: f64, body: &Vector3<f64>) -> Vector3<f64> {
    world_to_body(-yaw_deg, body)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::move_ctrl::vehicle_specs;
    use comms_if::gains::PidGains;

    fn p_gains() -> ControllerGains {
        let g = PidGains {
            k_p: 10.0,
            ..Default::default()
        };

        ControllerGains {
            yaw_fwd: g,
            yaw_bwd: g,
            pitch: g,
            roll: g,
            depth: g,
            east: g,
            north: g,
        }
    }

    fn controller() -> MovementController {
        MovementController::new(vehicle_specs(), MoveCtrlParams::default()).unwrap()
    }

    #[test]
    fn test_world_to_body() {
        let v = Vector3::new(0.0, 0.0, 10.0);

        // Facing north the target is straight ahead
        let b = world_to_body(0.0, &v);
        assert!((b.z - 10.0).abs() < 1e-9 && b.x.abs() < 1e-9);

        // Facing east the northern target is to port
        let b = world_to_body(90.0, &v);
        assert!((b.x + 10.0).abs() < 1e-9 && b.z.abs() < 1e-9);

        // Facing west it is to starboard
        let b = world_to_body(270.0, &v);
        assert!((b.x - 10.0).abs() < 1e-9 && b.z.abs() < 1e-9);

        // Depth is unaffected by yaw
        let b = world_to_body(123.0, &Vector3::new(0.0, -4.0, 0.0));
        assert!((b.y + 4.0).abs() < 1e-12);

        // Ahead of a vehicle facing east is east
        let w = body_to_world(90.0, &Vector3::new(0.0, 0.0, 3.0));
        assert!((w.x - 3.0).abs() < 1e-9 && w.z.abs() < 1e-9);
        let back = world_to_body(37.0, &body_to_world(37.0, &Vector3::new(1.0, 2.0, 3.0)));
        assert!((back - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-9);
    }

    #[test]
    fn test_zero_error_any_yaw() {
        let mut ctrl = controller();
        let gains = p_gains();

        for yaw in 0..360 {
            let pose = Pose {
                yaw_deg: yaw as f64,
                east_ft: 3.0,
                up_ft: -2.0,
                north_ft: 7.0,
                ..Default::default()
            };

            let out = ctrl.advanced_move(&pose, &pose, DrivingMode::Forward, &gains, yaw as f64);
            assert_eq!(out.body_error_ft, [0.0, 0.0, 0.0]);
            assert_eq!(out.errors.yaw, 0.0);
        }
    }

    #[test]
    fn test_target_to_the_east() {
        let mut ctrl = controller();
        let pose = Pose::default();
        let target = Pose {
            east_ft: 5.0,
            ..Default::default()
        };

        let out = ctrl.advanced_move(&pose, &target, DrivingMode::Forward, &p_gains(), 0.0);

        assert!((out.body_error_ft[0] - 5.0).abs() < 1e-12);
        assert!(out.body_error_ft[2].abs() < 1e-12);
        assert_eq!(out.errors.east, 5.0);

        // 5 ft is outside the bubble so the vehicle turns to face east
        assert!((out.desired_yaw_deg - 90.0).abs() < 1e-9);
        assert!((out.errors.yaw - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_inside_bubble_keeps_requested_yaw() {
        let mut ctrl = controller();
        let pose = Pose {
            yaw_deg: 350.0,
            ..Default::default()
        };
        let target = Pose {
            east_ft: 2.0,
            yaw_deg: 10.0,
            ..Default::default()
        };

        let out = ctrl.advanced_move(&pose, &target, DrivingMode::Forward, &p_gains(), 0.0);

        assert_eq!(out.desired_yaw_deg, 10.0);
        assert!((out.errors.yaw - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_reverse_faces_away() {
        let mut ctrl = controller();
        let target = Pose {
            north_ft: 20.0,
            ..Default::default()
        };

        let out = ctrl.advanced_move(
            &Pose::default(),
            &target,
            DrivingMode::Reverse,
            &p_gains(),
            0.0,
        );

        assert!((out.desired_yaw_deg - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_spin_direction_forced() {
        let gains = p_gains();
        let pose = Pose::default();

        // Target to the south west, shortest turn is counter-clockwise
        let target = Pose {
            east_ft: -20.0,
            north_ft: -5.0,
            ..Default::default()
        };

        let mut ctrl = controller();
        let fwd = ctrl.advanced_move(&pose, &target, DrivingMode::Forward, &gains, 0.0);

        let mut ctrl = controller();
        let cw = ctrl.advanced_move(&pose, &target, DrivingMode::SpinCw, &gains, 0.0);

        // The reported error is the shortest path for both
        assert!(fwd.errors.yaw < -90.0);
        assert_eq!(fwd.errors.yaw, cw.errors.yaw);

        // Forced clockwise needs a turn of more than 180 degrees so the yaw signal flips sign,
        // which shows up as a different allocation
        assert_ne!(fwd.duty_cycles, cw.duty_cycles);
    }

    #[test]
    fn test_yaw_error_normalised() {
        let mut ctrl = controller();
        let gains = p_gains();

        for current in (0..360).step_by(7) {
            for desired in (0..360).step_by(11) {
                let pose = Pose {
                    yaw_deg: current as f64,
                    ..Default::default()
                };
                let target = Pose {
                    yaw_deg: desired as f64,
                    ..Default::default()
                };

                let out = ctrl.advanced_move(&pose, &target, DrivingMode::Forward, &gains, 0.0);
                assert!(out.errors.yaw > -180.0 && out.errors.yaw <= 180.0);
                assert!(out.duty_cycles.iter().all(|d| d.abs() <= 204.0));
            }
        }
    }
}
