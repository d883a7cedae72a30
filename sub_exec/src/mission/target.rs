//! # Target tracking
//!
//! All visual missions share the same approach to their target. The camera frame is divided into a
//! 3x3 grid and the target's cell drives a small state machine:
//!
//! - `Search` - the target has not been seen, or was lost for too long. The vehicle holds its
//!   position and sweeps its heading.
//! - `Approach` - the target is visible. The vehicle steers proportionally to the target's offset
//!   from the image centre. Once the target has stayed in the middle cell for the hold time the
//!   mission commits.
//! - `Lost` - the target disappeared. The vehicle keeps steering towards where it was last seen
//!   for a while before falling back to `Search`.
//!
//! What a mission does once committed is described by its [`Commit`] behaviour.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    console::{ImageProcValues, MissionKind, MissionOutcome, TargetObs},
    eqpt::aux::Actuation,
    gains::ControllerGains,
};
use log::{debug, info, warn};
use nalgebra::Vector3;
use util::maths::{clamp, wrap_360};

use super::{
    buoy::Ram, dropper::DropChain, path::Align, torpedo::Fire, Camera, MissionStatus, MissionStep,
    TrackerParams,
};
use crate::move_ctrl::{body_to_world, DrivingMode, MovementController, Pose};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Where the target sits in the camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub region: Region,

    /// Offset of the target from the image centre as `[x, y]`, each in `[-1, 1]`
    pub offset: [f64; 2],

    /// Radius of the target as a fraction of the frame width
    pub radius_frac: f64,
}

/// Follows a target through the camera frame until the mission can commit.
#[derive(Debug, Clone)]
pub struct TargetTracker {
    params: TrackerParams,
    state: Option<TrackState>,
    last_offset: [f64; 2],
}

/// The pose and observation at the moment a mission committed.
#[derive(Debug, Clone, Copy)]
pub struct Committed {
    pub pose: Pose,
    pub obs: TargetObs,
    pub time_s: f64,
}

/// Output of one step of a commit behaviour.
#[derive(Debug, Clone, Copy)]
pub struct CommitStep {
    pub target: Pose,
    pub actuation: Option<Actuation>,
    pub done: bool,
}

/// A visual mission: a tracker followed by a commit behaviour.
#[derive(Debug, Clone)]
pub struct TargetMission {
    kind: MissionKind,
    tracker: TargetTracker,
    commit: Commit,
    committed: Option<Committed>,
    started_s: Option<f64>,
    timeout_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Cell classes of the 3x3 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    NotInSight,
    Corner,
    Edge,
    Middle,
}

#[derive(Debug, Clone, Copy)]
enum TrackState {
    Search {
        since_s: f64,
        start_yaw_deg: f64,
        hold: Pose,
    },
    Approach {
        centred_since_s: Option<f64>,
    },
    Lost {
        since_s: f64,
    },
}

/// Result of a tracker step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackStep {
    /// Drive towards this pose
    Drive(Pose),

    /// The target has been held in the middle of the frame, commit from this pose
    Commit(Pose),
}

/// What a mission does once it has committed to its target.
#[derive(Debug, Clone)]
pub enum Commit {
    Ram(Ram),
    Align(Align),
    WaypointChain(DropChain),
    Fire(Fire),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TargetTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            state: None,
            last_offset: [0.0; 2],
        }
    }

    pub fn step(&mut self, pose: &Pose, sighting: &Sighting, time_s: f64) -> TrackStep {
        let state = self
            .state
            .take()
            .unwrap_or_else(|| search_from(pose, time_s));

        let (next, step) = match (state, sighting.region) {
            (TrackState::Approach { .. }, Region::NotInSight) => {
                debug!("Target lost");
                (
                    TrackState::Lost { since_s: time_s },
                    TrackStep::Drive(self.steer(pose, self.last_offset, true)),
                )
            }
            (TrackState::Lost { since_s }, Region::NotInSight) => {
                if time_s - since_s < self.params.lost_recover_s {
                    (
                        TrackState::Lost { since_s },
                        TrackStep::Drive(self.steer(pose, self.last_offset, true)),
                    )
                } else {
                    debug!("Target not recovered, searching");
                    let search = search_from(pose, time_s);
                    let target = self.sweep(&search, time_s);
                    (search, TrackStep::Drive(target))
                }
            }
            (search @ TrackState::Search { .. }, Region::NotInSight) => {
                (search, TrackStep::Drive(self.sweep(&search, time_s)))
            }
            (state, Region::Middle) => {
                self.last_offset = sighting.offset;

                let centred_since_s = match state {
                    TrackState::Approach {
                        centred_since_s: Some(t),
                    } => t,
                    _ => time_s,
                };

                let next = TrackState::Approach {
                    centred_since_s: Some(centred_since_s),
                };

                if time_s - centred_since_s >= self.params.center_hold_s
                    && sighting.radius_frac >= self.params.min_commit_radius_frac
                {
                    (next, TrackStep::Commit(*pose))
                } else {
                    (next, TrackStep::Drive(self.steer(pose, sighting.offset, true)))
                }
            }
            (_, region) => {
                self.last_offset = sighting.offset;
                (
                    TrackState::Approach {
                        centred_since_s: None,
                    },
                    TrackStep::Drive(self.steer(pose, sighting.offset, region == Region::Edge)),
                )
            }
        };

        self.state = Some(next);
        step
    }

    /// Pose which moves the target towards the centre of the image.
    fn steer(&self, pose: &Pose, offset: [f64; 2], advance: bool) -> Pose {
        let p = &self.params;

        match p.camera {
            Camera::Forward => {
                let forward_ft = if advance {
                    p.approach_step_ft * (1.0 - offset[0].abs())
                } else {
                    0.0
                };

                let mut target = offset_pose(pose, pose.yaw_deg, [0.0, 0.0, forward_ft]);
                target.yaw_deg = wrap_360(pose.yaw_deg + offset[0] * p.steer_gain_deg);
                target.up_ft = pose.up_ft - offset[1] * p.depth_gain_ft;
                target
            }
            Camera::Downward => offset_pose(
                pose,
                pose.yaw_deg,
                [
                    offset[0] * p.approach_step_ft,
                    0.0,
                    -offset[1] * p.approach_step_ft,
                ],
            ),
        }
    }

    fn sweep(&self, search: &TrackState, time_s: f64) -> Pose {
        match *search {
            TrackState::Search {
                since_s,
                start_yaw_deg,
                hold,
            } => Pose {
                yaw_deg: wrap_360(
                    start_yaw_deg + self.params.sweep_rate_deg_s * (time_s - since_s),
                ),
                pitch_deg: 0.0,
                roll_deg: 0.0,
                ..hold
            },
            _ => Pose::default(),
        }
    }
}

impl Commit {
    fn step(&mut self, pose: &Pose, committed: &Committed, time_s: f64) -> CommitStep {
        match self {
            Commit::Ram(c) => c.step(pose, committed, time_s),
            Commit::Align(c) => c.step(pose, committed, time_s),
            Commit::WaypointChain(c) => c.step(pose, committed, time_s),
            Commit::Fire(c) => c.step(pose, committed, time_s),
        }
    }
}

impl TargetMission {
    pub fn new(kind: MissionKind, tracker: TrackerParams, commit: Commit) -> Self {
        Self {
            kind,
            timeout_s: tracker.timeout_s,
            tracker: TargetTracker::new(tracker),
            commit,
            committed: None,
            started_s: None,
        }
    }

    pub fn step(
        &mut self,
        pose: &Pose,
        image: &ImageProcValues,
        ctrl: &mut MovementController,
        gains: &ControllerGains,
        time_s: f64,
    ) -> MissionStep {
        let started_s = *self.started_s.get_or_insert(time_s);

        if time_s - started_s >= self.timeout_s {
            warn!("{} mission timed out after {:.1} s", self.kind, self.timeout_s);
            return MissionStep::complete(MissionOutcome::TimedOut);
        }

        let obs = image.target(self.kind);

        let committed = match self.committed {
            Some(c) => c,
            None => {
                let sighting = classify(obs, image.frame_width, image.frame_height);

                match self.tracker.step(pose, &sighting, time_s) {
                    TrackStep::Drive(target) => {
                        return MissionStep::driving(
                            ctrl.advanced_move(pose, &target, DrivingMode::Forward, gains, time_s),
                            target,
                        )
                    }
                    TrackStep::Commit(commit_pose) => {
                        info!("{} mission committing", self.kind);
                        let c = Committed {
                            pose: commit_pose,
                            obs: obs.copied().unwrap_or_default(),
                            time_s,
                        };
                        self.committed = Some(c);
                        c
                    }
                }
            }
        };

        let step = self.commit.step(pose, &committed, time_s);

        let mut out = MissionStep::driving(
            ctrl.advanced_move(pose, &step.target, DrivingMode::Forward, gains, time_s),
            step.target,
        );
        out.actuation = step.actuation;
        if step.done {
            out.status = MissionStatus::Complete(MissionOutcome::Succeeded);
        }

        out
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Classify an observation into the 3x3 grid of the camera frame.
pub fn classify(obs: Option<&TargetObs>, frame_width: f64, frame_height: f64) -> Sighting {
    let obs = match obs {
        Some(o) if frame_width > 0.0 && frame_height > 0.0 => o,
        _ => {
            return Sighting {
                region: Region::NotInSight,
                offset: [0.0; 2],
                radius_frac: 0.0,
            }
        }
    };

    let col = grid_cell(obs.x, frame_width);
    let row = grid_cell(obs.y, frame_height);

    let region = match (col == 1, row == 1) {
        (true, true) => Region::Middle,
        (false, false) => Region::Corner,
        _ => Region::Edge,
    };

    let half_w = 0.5 * frame_width;
    let half_h = 0.5 * frame_height;

    Sighting {
        region,
        offset: [
            clamp((obs.x - half_w) / half_w, -1.0, 1.0),
            clamp((obs.y - half_h) / half_h, -1.0, 1.0),
        ],
        radius_frac: obs.radius / frame_width,
    }
}

/// A level pose displaced from `base` by a body-frame offset taken at `yaw_deg`.
pub(super) fn offset_pose(base: &Pose, yaw_deg: f64, body_ft: [f64; 3]) -> Pose {
    let world = body_to_world(yaw_deg, &Vector3::new(body_ft[0], body_ft[1], body_ft[2]));

    Pose {
        yaw_deg: wrap_360(yaw_deg),
        pitch_deg: 0.0,
        roll_deg: 0.0,
        east_ft: base.east_ft + world.x,
        up_ft: base.up_ft + world.y,
        north_ft: base.north_ft + world.z,
    }
}

fn grid_cell(value: f64, size: f64) -> i64 {
    clamp((3.0 * value / size).floor(), 0.0, 2.0) as i64
}

fn search_from(pose: &Pose, time_s: f64) -> TrackState {
    TrackState::Search {
        since_s: time_s,
        start_yaw_deg: pose.yaw_deg,
        hold: *pose,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn obs(x: f64, y: f64) -> TargetObs {
        TargetObs {
            x,
            y,
            radius: 30.0,
            angle_deg: 0.0,
        }
    }

    fn seen(x: f64, y: f64) -> Sighting {
        classify(Some(&obs(x, y)), 300.0, 300.0)
    }

    fn not_seen() -> Sighting {
        classify(None, 300.0, 300.0)
    }

    #[test]
    fn test_classify() {
        assert_eq!(seen(150.0, 150.0).region, Region::Middle);
        assert_eq!(seen(10.0, 10.0).region, Region::Corner);
        assert_eq!(seen(299.0, 290.0).region, Region::Corner);
        assert_eq!(seen(150.0, 10.0).region, Region::Edge);
        assert_eq!(seen(10.0, 150.0).region, Region::Edge);
        assert_eq!(not_seen().region, Region::NotInSight);

        // Off-frame coordinates are clamped to the border cells
        let s = seen(400.0, -20.0);
        assert_eq!(s.region, Region::Corner);
        assert_eq!(s.offset, [1.0, -1.0]);

        assert!((seen(150.0, 150.0).radius_frac - 0.1).abs() < 1e-12);
        assert_eq!(
            classify(Some(&obs(1.0, 1.0)), 0.0, 300.0).region,
            Region::NotInSight
        );
    }

    #[test]
    fn test_search_sweeps_heading() {
        let mut tracker = TargetTracker::new(TrackerParams::default());
        let pose = Pose {
            yaw_deg: 355.0,
            ..Default::default()
        };

        let _ = tracker.step(&pose, &not_seen(), 0.0);
        match tracker.step(&pose, &not_seen(), 1.0) {
            TrackStep::Drive(t) => assert!((t.yaw_deg - 5.0).abs() < 1e-9),
            s => panic!("Unexpected step {:?}", s),
        }
    }

    #[test]
    fn test_commit_after_hold() {
        let mut tracker = TargetTracker::new(TrackerParams {
            center_hold_s: 1.0,
            ..Default::default()
        });
        let pose = Pose::default();

        // Right edge, steer right
        match tracker.step(&pose, &seen(280.0, 150.0), 0.0) {
            TrackStep::Drive(t) => assert!(t.yaw_deg > 0.0 && t.yaw_deg < 20.0),
            s => panic!("Unexpected step {:?}", s),
        }

        assert!(matches!(
            tracker.step(&pose, &seen(150.0, 150.0), 1.0),
            TrackStep::Drive(_)
        ));
        assert!(matches!(
            tracker.step(&pose, &seen(150.0, 150.0), 1.5),
            TrackStep::Drive(_)
        ));
        assert_eq!(
            tracker.step(&pose, &seen(150.0, 150.0), 2.0),
            TrackStep::Commit(pose)
        );
    }

    #[test]
    fn test_leaving_middle_restarts_hold() {
        let mut tracker = TargetTracker::new(TrackerParams::default());
        let pose = Pose::default();

        let _ = tracker.step(&pose, &seen(150.0, 150.0), 0.0);
        let _ = tracker.step(&pose, &seen(10.0, 150.0), 0.9);
        assert!(matches!(
            tracker.step(&pose, &seen(150.0, 150.0), 1.0),
            TrackStep::Drive(_)
        ));
        assert!(matches!(
            tracker.step(&pose, &seen(150.0, 150.0), 2.0),
            TrackStep::Commit(_)
        ));
    }

    #[test]
    fn test_lost_then_search() {
        let mut tracker = TargetTracker::new(TrackerParams {
            lost_recover_s: 2.0,
            ..Default::default()
        });
        let pose = Pose {
            yaw_deg: 90.0,
            ..Default::default()
        };

        // Last seen to the left
        let _ = tracker.step(&pose, &seen(10.0, 150.0), 0.0);

        // While lost keep turning left
        for t in [0.5, 1.5].iter() {
            match tracker.step(&pose, &not_seen(), *t) {
                TrackStep::Drive(target) => assert!(target.yaw_deg < 90.0),
                s => panic!("Unexpected step {:?}", s),
            }
        }

        // Recovery time over, the sweep starts from the current heading
        match tracker.step(&pose, &not_seen(), 2.6) {
            TrackStep::Drive(target) => assert!((target.yaw_deg - 90.0).abs() < 1e-9),
            s => panic!("Unexpected step {:?}", s),
        }
        match tracker.step(&pose, &not_seen(), 3.6) {
            TrackStep::Drive(target) => assert!((target.yaw_deg - 100.0).abs() < 1e-9),
            s => panic!("Unexpected step {:?}", s),
        }
    }

    #[test]
    fn test_downward_steer() {
        let mut tracker = TargetTracker::new(TrackerParams {
            camera: Camera::Downward,
            approach_step_ft: 2.0,
            ..Default::default()
        });

        // Facing north, target at the top edge of the image is ahead
        match tracker.step(&Pose::default(), &seen(150.0, 0.0), 0.0) {
            TrackStep::Drive(t) => {
                assert!((t.north_ft - 2.0).abs() < 1e-9);
                assert!(t.east_ft.abs() < 1e-9);
                assert_eq!(t.yaw_deg, 0.0);
            }
            s => panic!("Unexpected step {:?}", s),
        }
    }

    #[test]
    fn test_offset_pose() {
        let base = Pose {
            east_ft: 1.0,
            up_ft: -3.0,
            north_ft: 2.0,
            yaw_deg: 10.0,
            ..Default::default()
        };

        // Ahead of a vehicle facing east
        let p = offset_pose(&base, 90.0, [0.0, -1.0, 2.0]);
        assert!((p.east_ft - 3.0).abs() < 1e-9);
        assert!((p.north_ft - 2.0).abs() < 1e-9);
        assert!((p.up_ft + 4.0).abs() < 1e-9);
        assert_eq!(p.yaw_deg, 90.0);
    }
}
