//! # Buoy mission
//!
//! Centre the buoy in the forward camera, then ram it and back off.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{
    target::{offset_pose, CommitStep, Committed},
    BuoyParams,
};
use crate::move_ctrl::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive straight ahead for a fixed time then reverse for a fixed time.
#[derive(Debug, Clone)]
pub struct Ram {
    ram_time_s: f64,
    backoff_time_s: f64,
    drive_step_ft: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Ram {
    pub fn new(params: &BuoyParams) -> Self {
        Self {
            ram_time_s: params.ram_time_s,
            backoff_time_s: params.backoff_time_s,
            drive_step_ft: params.drive_step_ft,
        }
    }

    pub(super) fn step(&mut self, pose: &Pose, committed: &Committed, time_s: f64) -> CommitStep {
        let elapsed_s = time_s - committed.time_s;

        let (forward_ft, done) = if elapsed_s < self.ram_time_s {
            (self.drive_step_ft, false)
        } else if elapsed_s < self.ram_time_s + self.backoff_time_s {
            (-self.drive_step_ft, false)
        } else {
            (0.0, true)
        };

        let mut target = offset_pose(pose, committed.pose.yaw_deg, [0.0, 0.0, forward_ft]);
        target.up_ft = committed.pose.up_ft;

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

#[cfg(test)]
mod test {
    use super::*;
    use crate::mission::{
        target::{Commit, TargetMission},
        test_controller, MissionStatus,
    };
    use comms_if::{
        console::{ImageProcValues, MissionKind, MissionOutcome, TargetObs},
        gains::ControllerGains,
    };

    fn buoy_mission() -> TargetMission {
        let params = BuoyParams::default();
        TargetMission::new(
            MissionKind::Buoy,
            params.tracker.clone(),
            Commit::Ram(Ram::new(&params)),
        )
    }

    fn image(buoy: Option<TargetObs>) -> ImageProcValues {
        ImageProcValues {
            frame_width: 300.0,
            frame_height: 300.0,
            buoy,
            ..Default::default()
        }
    }

    #[test]
    fn test_ram_sequence() {
        let mut ctrl = test_controller();
        let gains = ControllerGains::default();
        let mut mission = buoy_mission();
        let pose = Pose::default();
        let img = image(Some(TargetObs {
            x: 150.0,
            y: 150.0,
            radius: 20.0,
            angle_deg: 0.0,
        }));

        let s = mission.step(&pose, &img, &mut ctrl, &gains, 0.0);
        assert_eq!(s.status, MissionStatus::Running);
        assert!(!mission.is_committed());

        // Centred for the hold time, commit and ram forward
        let s = mission.step(&pose, &img, &mut ctrl, &gains, 1.0);
        assert!(mission.is_committed());
        assert!((s.desired.unwrap().north_ft - 2.0).abs() < 1e-9);

        // Back off, even if the buoy is no longer visible
        let s = mission.step(&pose, &image(None), &mut ctrl, &gains, 5.5);
        assert!((s.desired.unwrap().north_ft + 2.0).abs() < 1e-9);
        assert_eq!(s.status, MissionStatus::Running);

        let s = mission.step(&pose, &image(None), &mut ctrl, &gains, 8.1);
        assert_eq!(s.status, MissionStatus::Complete(MissionOutcome::Succeeded));
    }

    #[test]
    fn test_timeout() {
        let mut ctrl = test_controller();
        let gains = ControllerGains::default();
        let mut mission = buoy_mission();
        let pose = Pose::default();

        let s = mission.step(&pose, &image(None), &mut ctrl, &gains, 10.0);
        assert_eq!(s.status, MissionStatus::Running);

        let s = mission.step(&pose, &image(None), &mut ctrl, &gains, 100.0);
        assert_eq!(s.status, MissionStatus::Complete(MissionOutcome::TimedOut));
        assert!(s.move_output.is_none());
    }
}
