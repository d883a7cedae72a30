//! # Path mission
//!
//! Centre the path marker in the downward camera, then turn onto the heading it points along.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::{ang_dist_deg, wrap_360};

use super::{
    target::{CommitStep, Committed},
    PathParams,
};
use crate::move_ctrl::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Hold position over the marker and rotate onto its heading.
#[derive(Debug, Clone)]
pub struct Align {
    tolerance_deg: f64,
    hold_s: f64,
    aligned_since_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Align {
    pub fn new(params: &PathParams) -> Self {
        Self {
            tolerance_deg: params.align_tolerance_deg,
            hold_s: params.align_hold_s,
            aligned_since_s: None,
        }
    }

    pub(super) fn step(&mut self, pose: &Pose, committed: &Committed, time_s: f64) -> CommitStep {
        // The marker angle is measured clockwise from the top of the image, which is straight
        // ahead for the downward camera
        let marker_yaw_deg = wrap_360(committed.pose.yaw_deg + committed.obs.angle_deg);

        let target = Pose {
            yaw_deg: marker_yaw_deg,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            ..committed.pose
        };

        let done = if ang_dist_deg(pose.yaw_deg, marker_yaw_deg).abs() < self.tolerance_deg {
            let since_s = *self.aligned_since_s.get_or_insert(time_s);
            time_s - since_s >= self.hold_s
        } else {
            self.aligned_since_s = None;
            false
        };

        CommitStep {
            target,
            actuation: None,
            done,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
