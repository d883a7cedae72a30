//! # Torpedo mission
//!
//! Centre the target in the forward camera, hold the aim, fire and back off.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::aux::Actuation;
use log::info;

use super::{
    target::{offset_pose, CommitStep, Committed},
    TorpedoParams,
};
use crate::move_ctrl::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Fire {
    aim_hold_s: f64,
    backoff_time_s: f64,
    drive_step_ft: f64,
    fired_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Fire {
    pub fn new(params: &TorpedoParams) -> Self {
        Self {
            aim_hold_s: params.aim_hold_s,
            backoff_time_s: params.backoff_time_s,
            drive_step_ft: params.drive_step_ft,
            fired_s: None,
        }
    }

    pub(super) fn step(&mut self, pose: &Pose, committed: &Committed, time_s: f64) -> CommitStep {
        let aim = Pose {
            pitch_deg: 0.0,
            roll_deg: 0.0,
            ..committed.pose
        };

        match self.fired_s {
            None if time_s - committed.time_s < self.aim_hold_s => CommitStep {
                target: aim,
                actuation: None,
                done: false,
            },
            None => {
                info!("Firing torpedo");
                self.fired_s = Some(time_s);
                CommitStep {
                    target: aim,
                    actuation: Some(Actuation::FireTorpedo),
                    done: false,
                }
            }
            Some(fired_s) => {
                let backing_off = time_s - fired_s < self.backoff_time_s;
                let forward_ft = if backing_off { -self.drive_step_ft } else { 0.0 };

                let mut target = offset_pose(pose, committed.pose.yaw_deg, [0.0, 0.0, forward_ft]);
                target.up_ft = committed.pose.up_ft;

                CommitStep {
                    target,
                    actuation: None,
                    done: !backing_off,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::console::TargetObs;

    #[test]
    fn test_fire_once() {
        let mut fire = Fire::new(&TorpedoParams::default());
        let c = Committed {
            pose: Pose {
                yaw_deg: 180.0,
                north_ft: 10.0,
                ..Default::default()
            },
            obs: TargetObs::default(),
            time_s: 5.0,
        };

        let s = fire.step(&c.pose, &c, 5.0);
        assert_eq!(s.actuation, None);
        assert_eq!(s.target.north_ft, 10.0);

        let s = fire.step(&c.pose, &c, 7.0);
        assert_eq!(s.actuation, Some(Actuation::FireTorpedo));
        assert!(!s.done);

        // Backing off while facing south is moving north
        let s = fire.step(&c.pose, &c, 7.5);
        assert_eq!(s.actuation, None);
        assert!((s.target.north_ft - 12.0).abs() < 1e-9);
        assert!(!s.done);

        assert!(fire.step(&c.pose, &c, 10.0).done);
    }
}
