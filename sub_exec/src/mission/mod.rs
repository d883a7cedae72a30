//! # Mission planner
//!
//! The planner runs an ordered list of missions supplied by the console. Exactly one mission is
//! active at a time. A mission's runtime state is created the first time it is stepped and dropped
//! when it completes, at which point the next mission in the list becomes active. Once the list is
//! exhausted the planner holds the thrusters at neutral and reports [`NO_MISSION_NAME`].
//!
//! Missions are one of:
//!
//! - `Navigation` - drive to a recorded waypoint.
//! - `Buoy` - centre the buoy and ram it.
//! - `Path` - centre the path marker and align with it.
//! - `Dropper` - centre the bin, descend and drop a marker.
//! - `Torpedo` - centre the target and fire.
//!
//! The four visual missions share one [`TargetTracker`] and differ only by their [`Commit`]
//! behaviour.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod buoy;
mod dropper;
mod navigation;
mod params;
mod path;
mod target;
mod torpedo;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    console::{ImageProcValues, MissionKind, MissionOutcome, MissionSpec, NO_MISSION_NAME},
    eqpt::{aux::Actuation, Orientation},
    gains::ControllerGains,
};
use log::{info, warn};

pub use self::{
    buoy::Ram,
    dropper::DropChain,
    navigation::Navigation,
    params::*,
    path::Align,
    target::{classify, Commit, Region, Sighting, TargetMission, TargetTracker, TrackStep},
    torpedo::Fire,
};
use crate::{
    move_ctrl::{AxisErrors, MoveOutput, MovementController, Pose},
    waypoints::WaypointStore,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything a mission may need from the current tick.
#[derive(Debug, Clone, Copy)]
pub struct MissionInput<'a> {
    pub time_s: f64,
    pub pose: Option<Pose>,
    pub image: Option<&'a ImageProcValues>,
}

/// Output of one planner step.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerOutput {
    /// Duty cycle of each thruster, in ID order
    pub duty_cycles: Vec<f64>,

    /// Name of the mission active after this step
    pub mission_name: String,

    /// Orientation the active mission is steering to
    pub desired_orientation: Option<Orientation>,

    /// Controller errors, if a controller ran
    pub errors: Option<AxisErrors>,

    /// One-shot actuation requested this step
    pub actuation: Option<Actuation>,

    /// True if the active mission could not run for lack of data
    pub no_data: bool,

    /// Set on the step a mission completes
    pub outcome: Option<(MissionKind, MissionOutcome)>,
}

/// Sequences the missions loaded from the console.
#[derive(Debug)]
pub struct MissionPlanner {
    params: MissionParams,
    missions: Vec<MissionConfig>,
    index: usize,
    active: Option<ActiveMission>,

    /// Time the current mission was first stepped, its timeout runs from here even on ticks
    /// without data
    started_s: Option<f64>,
}

/// Output of a single mission step.
#[derive(Debug, Clone)]
pub struct MissionStep {
    /// Controller output, `None` for neutral thrusters
    pub move_output: Option<MoveOutput>,

    /// Pose the mission is steering to
    pub desired: Option<Pose>,

    pub actuation: Option<Actuation>,

    pub status: MissionStatus,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStatus {
    Running,
    Complete(MissionOutcome),
}

/// A loaded mission, with its parameters resolved.
#[derive(Debug, Clone)]
enum MissionConfig {
    Navigation(NavigationParams, Pose),
    Buoy(BuoyParams),
    Path(PathParams),
    Dropper(DropperParams),
    Torpedo(TorpedoParams),
}

/// Runtime state of the active mission.
#[derive(Debug, Clone)]
enum ActiveMission {
    Navigation(Navigation),
    Target(TargetMission),
}

#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("Mission {index} ({kind}) refers to unknown waypoint {label:?}")]
    UnknownWaypoint {
        index: usize,
        kind: MissionKind,
        label: String,
    },

    #[error("Mission {index} ({kind}) has invalid parameters: {source}")]
    InvalidParams {
        index: usize,
        kind: MissionKind,
        source: ParamMergeError,
    },

    #[error("Mission {index} ({kind}) has out of range parameters")]
    OutOfRange { index: usize, kind: MissionKind },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MissionStep {
    pub fn driving(output: MoveOutput, desired: Pose) -> Self {
        Self {
            move_output: Some(output),
            desired: Some(desired),
            actuation: None,
            status: MissionStatus::Running,
        }
    }

    pub fn complete(outcome: MissionOutcome) -> Self {
        Self {
            move_output: None,
            desired: None,
            actuation: None,
            status: MissionStatus::Complete(outcome),
        }
    }
}

impl MissionConfig {
    fn kind(&self) -> MissionKind {
        match self {
            MissionConfig::Navigation(..) => MissionKind::Navigation,
            MissionConfig::Buoy(_) => MissionKind::Buoy,
            MissionConfig::Path(_) => MissionKind::Path,
            MissionConfig::Dropper(_) => MissionKind::Dropper,
            MissionConfig::Torpedo(_) => MissionKind::Torpedo,
        }
    }

    fn timeout_s(&self) -> f64 {
        match self {
            MissionConfig::Navigation(p, _) => p.timeout_s,
            MissionConfig::Buoy(p) => p.tracker.timeout_s,
            MissionConfig::Path(p) => p.tracker.timeout_s,
            MissionConfig::Dropper(p) => p.tracker.timeout_s,
            MissionConfig::Torpedo(p) => p.tracker.timeout_s,
        }
    }

    fn start(&self) -> ActiveMission {
        match self {
            MissionConfig::Navigation(p, target) => {
                ActiveMission::Navigation(Navigation::new(p.clone(), *target))
            }
            MissionConfig::Buoy(p) => ActiveMission::Target(TargetMission::new(
                MissionKind::Buoy,
                p.tracker.clone(),
                Commit::Ram(Ram::new(p)),
            )),
            MissionConfig::Path(p) => ActiveMission::Target(TargetMission::new(
                MissionKind::Path,
                p.tracker.clone(),
                Commit::Align(Align::new(p)),
            )),
            MissionConfig::Dropper(p) => ActiveMission::Target(TargetMission::new(
                MissionKind::Dropper,
                p.tracker.clone(),
                Commit::WaypointChain(DropChain::new(p)),
            )),
            MissionConfig::Torpedo(p) => ActiveMission::Target(TargetMission::new(
                MissionKind::Torpedo,
                p.tracker.clone(),
                Commit::Fire(Fire::new(p)),
            )),
        }
    }
}

impl MissionPlanner {
    pub fn new(params: MissionParams) -> Self {
        Self {
            params,
            missions: Vec::new(),
            index: 0,
            active: None,
            started_s: None,
        }
    }

    /// Replace the mission list.
    ///
    /// Every mission is parsed up front. If any of them is invalid the whole list is rejected and
    /// the planner is left idle.
    pub fn load(
        &mut self,
        specs: &[MissionSpec],
        waypoints: &WaypointStore,
    ) -> Result<(), MissionError> {
        self.abort();

        let missions = specs
            .iter()
            .enumerate()
            .map(|(i, s)| self.parse(i, s, waypoints))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Loaded {} missions: {:?}",
            missions.len(),
            missions.iter().map(|m| m.kind()).collect::<Vec<_>>()
        );
        self.missions = missions;

        Ok(())
    }

    /// Drop the mission list.
    pub fn abort(&mut self) {
        if self.active.is_some() {
            info!("Mission list aborted");
        }
        self.missions.clear();
        self.index = 0;
        self.active = None;
        self.started_s = None;
    }

    /// Step the active mission.
    pub fn step(
        &mut self,
        input: &MissionInput,
        ctrl: &mut MovementController,
        gains: &ControllerGains,
    ) -> PlannerOutput {
        let (kind, timeout_s) = match self.missions.get(self.index) {
            Some(c) => (c.kind(), c.timeout_s()),
            None => return self.idle(ctrl, false),
        };

        let started_s = *self.started_s.get_or_insert(input.time_s);
        let has_data =
            input.pose.is_some() && (kind == MissionKind::Navigation || input.image.is_some());

        if input.time_s - started_s >= timeout_s {
            warn!(
                "Mission {} ({}) timed out after {:.1} s",
                self.index, kind, timeout_s
            );
            return self.complete(kind, MissionOutcome::TimedOut, ctrl, !has_data);
        }

        let pose = match input.pose {
            Some(p) if has_data => p,
            _ => return self.idle(ctrl, true),
        };

        if self.active.is_none() {
            if let Some(config) = self.missions.get(self.index) {
                info!("Starting mission {} ({})", self.index, kind);
                self.active = Some(config.start());
            }
        }

        let step = match self.active.as_mut() {
            Some(ActiveMission::Navigation(m)) => m.step(&pose, ctrl, gains, input.time_s),
            Some(ActiveMission::Target(m)) => match input.image {
                Some(img) => m.step(&pose, img, ctrl, gains, input.time_s),
                None => return self.idle(ctrl, true),
            },
            None => return self.idle(ctrl, false),
        };

        let outcome = match step.status {
            MissionStatus::Running => None,
            MissionStatus::Complete(outcome) => {
                self.advance(kind, outcome);
                Some((kind, outcome))
            }
        };

        let (duty_cycles, errors) = match step.move_output {
            Some(o) if outcome.is_none() => (o.duty_cycles, Some(o.errors)),
            Some(o) => (ctrl.neutral(), Some(o.errors)),
            None => (ctrl.neutral(), None),
        };

        PlannerOutput {
            duty_cycles,
            mission_name: self.current_mission_name(),
            desired_orientation: step.desired.map(|d| Orientation {
                yaw_deg: d.yaw_deg,
                pitch_deg: d.pitch_deg,
                roll_deg: d.roll_deg,
            }),
            errors,
            actuation: step.actuation,
            no_data: false,
            outcome,
        }
    }

    /// Name of the active mission, or [`NO_MISSION_NAME`] once the list is exhausted.
    pub fn current_mission_name(&self) -> String {
        match self.missions.get(self.index) {
            Some(m) => m.kind().to_string(),
            None => NO_MISSION_NAME.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    /// True if there is no mission left to run.
    pub fn is_idle(&self) -> bool {
        self.index >= self.missions.len()
    }

    /// Move on to the next mission.
    fn advance(&mut self, kind: MissionKind, outcome: MissionOutcome) {
        info!("Mission {} ({}) complete: {:?}", self.index, kind, outcome);
        self.active = None;
        self.started_s = None;
        self.index += 1;
    }

    /// Force-complete the current mission, holding the thrusters at neutral.
    fn complete(
        &mut self,
        kind: MissionKind,
        outcome: MissionOutcome,
        ctrl: &mut MovementController,
        no_data: bool,
    ) -> PlannerOutput {
        self.advance(kind, outcome);

        PlannerOutput {
            outcome: Some((kind, outcome)),
            ..self.idle(ctrl, no_data)
        }
    }

    fn idle(&self, ctrl: &mut MovementController, no_data: bool) -> PlannerOutput {
        PlannerOutput {
            duty_cycles: ctrl.neutral(),
            mission_name: self.current_mission_name(),
            desired_orientation: None,
            errors: None,
            actuation: None,
            no_data,
            outcome: None,
        }
    }

    fn parse(
        &self,
        index: usize,
        spec: &MissionSpec,
        waypoints: &WaypointStore,
    ) -> Result<MissionConfig, MissionError> {
        let kind = spec.kind;
        let invalid = |source| MissionError::InvalidParams {
            index,
            kind,
            source,
        };

        let config = match kind {
            MissionKind::Navigation => {
                let p: NavigationParams =
                    merge_overrides(&self.params.navigation, &spec.params).map_err(invalid)?;

                let target = match waypoints.get(&p.waypoint) {
                    Some(w) => w.pose(),
                    None => {
                        warn!("Mission {} refers to unknown waypoint {:?}", index, p.waypoint);
                        return Err(MissionError::UnknownWaypoint {
                            index,
                            kind,
                            label: p.waypoint,
                        });
                    }
                };

                if p.position_tolerance_ft <= 0.0 || p.timeout_s <= 0.0 || p.hold_time_s < 0.0 {
                    return Err(MissionError::OutOfRange { index, kind });
                }

                MissionConfig::Navigation(p, target)
            }
            MissionKind::Buoy => MissionConfig::Buoy(
                merge_overrides(&self.params.buoy, &spec.params).map_err(invalid)?,
            ),
            MissionKind::Path => MissionConfig::Path(
                merge_overrides(&self.params.path, &spec.params).map_err(invalid)?,
            ),
            MissionKind::Dropper => MissionConfig::Dropper(
                merge_overrides(&self.params.dropper, &spec.params).map_err(invalid)?,
            ),
            MissionKind::Torpedo => MissionConfig::Torpedo(
                merge_overrides(&self.params.torpedo, &spec.params).map_err(invalid)?,
            ),
        };

        let tracker_valid = match config {
            MissionConfig::Navigation(..) => true,
            MissionConfig::Buoy(ref p) => p.tracker.are_valid(),
            MissionConfig::Path(ref p) => p.tracker.are_valid(),
            MissionConfig::Dropper(ref p) => p.tracker.are_valid(),
            MissionConfig::Torpedo(ref p) => p.tracker.are_valid(),
        };
        if !tracker_valid {
            return Err(MissionError::OutOfRange { index, kind });
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) fn test_controller() -> MovementController {
    MovementController::new(
        crate::move_ctrl::vehicle_specs(),
        crate::move_ctrl::MoveCtrlParams::default(),
    )
    .unwrap()
}
