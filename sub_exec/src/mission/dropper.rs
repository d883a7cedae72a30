//! # Dropper mission
//!
//! Centre the bin in the downward camera, run the descent chain and release a marker.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::aux::Actuation;
use log::{info, warn};

use super::{
    target::{offset_pose, CommitStep, Committed},
    ChainStep, DropperParams,
};
use crate::move_ctrl::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Visit a chain of offsets from the commit pose then drop the marker.
#[derive(Debug, Clone)]
pub struct DropChain {
    chain: Vec<ChainStep>,
    tolerance_ft: f64,
    leg_timeout_s: f64,
    leg: usize,
    leg_started_s: Option<f64>,
    reached_since_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DropChain {
    pub fn new(params: &DropperParams) -> Self {
        Self {
            chain: params.chain.clone(),
            tolerance_ft: params.position_tolerance_ft,
            leg_timeout_s: params.leg_timeout_s,
            leg: 0,
            leg_started_s: None,
            reached_since_s: None,
        }
    }

    pub(super) fn step(&mut self, pose: &Pose, committed: &Committed, time_s: f64) -> CommitStep {
        let leg = match self.chain.get(self.leg) {
            Some(l) => *l,
            None => return self.release(committed.pose),
        };

        let target = offset_pose(&committed.pose, committed.pose.yaw_deg, leg.offset_ft);
        let started_s = *self.leg_started_s.get_or_insert(time_s);

        let dist_ft = ((target.east_ft - pose.east_ft).powi(2)
            + (target.up_ft - pose.up_ft).powi(2)
            + (target.north_ft - pose.north_ft).powi(2))
        .sqrt();

        let mut advance = false;

        if dist_ft < self.tolerance_ft {
            let since_s = *self.reached_since_s.get_or_insert(time_s);
            advance = time_s - since_s >= leg.hold_s;
        } else {
            self.reached_since_s = None;
        }

        if !advance && time_s - started_s >= self.leg_timeout_s {
            warn!("Dropper leg {} not reached, moving on", self.leg);
            advance = true;
        }

        if advance {
            self.leg += 1;
            self.leg_started_s = None;
            self.reached_since_s = None;

            if self.leg == self.chain.len() {
                return self.release(target);
            }
        }

        CommitStep {
            target,
            actuation: None,
            done: false,
        }
    }

    fn release(&self, hold: Pose) -> CommitStep {
        info!("Releasing marker");
        CommitStep {
            target: hold,
            actuation: Some(Actuation::DropMarker),
            done: true,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
