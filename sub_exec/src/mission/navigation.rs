//! # Navigation mission
//!
//! Drive to a recorded waypoint and hold it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{console::MissionOutcome, gains::ControllerGains};
use log::{info, warn};

use super::{MissionStatus, MissionStep, NavigationParams};
use crate::move_ctrl::{AxisErrors, MovementController, Pose};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Navigation {
    params: NavigationParams,
    target: Pose,
    started_s: Option<f64>,
    within_since_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Navigation {
    /// Create the mission, with the target already looked up from the waypoint store.
    pub fn new(params: NavigationParams, target: Pose) -> Self {
        Self {
            params,
            target,
            started_s: None,
            within_since_s: None,
        }
    }

    pub fn step(
        &mut self,
        pose: &Pose,
        ctrl: &mut MovementController,
        gains: &ControllerGains,
        time_s: f64,
    ) -> MissionStep {
        let started_s = *self.started_s.get_or_insert(time_s);

        if time_s - started_s >= self.params.timeout_s {
            warn!(
                "Navigation to {:?} timed out after {:.1} s",
                self.params.waypoint, self.params.timeout_s
            );
            return MissionStep::complete(MissionOutcome::TimedOut);
        }

        let output = ctrl.advanced_move(
            pose,
            &self.target,
            self.params.driving_mode,
            gains,
            time_s,
        );

        let mut step_status = MissionStatus::Running;

        if self.within_tolerance(&output.errors) {
            let since_s = *self.within_since_s.get_or_insert(time_s);

            if time_s - since_s >= self.params.hold_time_s {
                info!("Reached waypoint {:?}", self.params.waypoint);
                step_status = MissionStatus::Complete(MissionOutcome::Succeeded);
            }
        } else {
            self.within_since_s = None;
        }

        // Report the yaw actually being steered to
        let desired = Pose {
            yaw_deg: output.desired_yaw_deg,
            ..self.target
        };

        let mut step = MissionStep::driving(output, desired);
        step.status = step_status;
        step
    }

    fn within_tolerance(&self, e: &AxisErrors) -> bool {
        let p = &self.params;

        let position = e.east.abs() < p.position_tolerance_ft
            && e.up.abs() < p.position_tolerance_ft
            && e.north.abs() < p.position_tolerance_ft;

        let orientation = p.ignore_orientation
            || (e.pitch.abs() < p.orientation_tolerance_deg
                && e.yaw.abs() < p.orientation_tolerance_deg
                && e.roll.abs() < p.orientation_tolerance_deg);

        position && orientation
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
