//! # Console messages
//!
//! The core and the operator console exchange exactly one message in each direction per control
//! cycle. Both messages are JSON objects with named fields and carry a `schema_version`, so that
//! adding a field to one side cannot silently shift the meaning of another.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{eqpt::Orientation, gains::ControlGains};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Version of the message schema defined in this module.
pub const SCHEMA_VERSION: u32 = 1;

/// Name reported for the current mission when no mission is running.
pub const NO_MISSION_NAME: &str = "None";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A command message from the console to the core.
///
/// Every field is optional on the wire; missing fields take their default value, which for the
/// flags is `false` and for the requests is "no request".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleCmd {
    pub schema_version: u32,

    /// The console is ready to receive the next telemetry message.
    pub console_ready: bool,

    /// Enable autonomous execution of the loaded mission list.
    pub start_vehicle: bool,

    /// De-energise the dirty power rail.
    pub kill_dirty_power: bool,

    /// Operator controls the vehicle instead of the mission planner.
    pub manual_mode: bool,

    /// A new mission list to load, replacing the current one.
    pub missions: Option<Vec<MissionSpec>>,

    /// The latest output of the target detection pipeline.
    pub image_proc: Option<ImageProcValues>,

    /// Record the current pose as a waypoint with this label.
    pub set_waypoint: Option<String>,

    /// Remove the waypoint with this label.
    pub remove_waypoint: Option<String>,

    /// Rename a waypoint.
    pub rename_waypoint: Option<RenameWaypoint>,

    /// Make the current navigation position the new origin.
    pub reset_nav_origin: bool,

    /// A full replacement gain table.
    pub pid_gains: Option<ControlGains>,

    /// Manual axis demands from the console, used when no joystick board is fitted.
    pub manual_axes: Option<RawAxes>,

    /// Stop all activity and shut the core down.
    pub kill: bool,
}

/// One mission in a mission list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSpec {
    pub kind: MissionKind,

    /// Mission parameters, parsed into the typed parameter struct of the mission kind when the
    /// list is loaded.
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameWaypoint {
    pub from: String,
    pub to: String,
}

/// Output of the external target detection pipeline for one camera frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageProcValues {
    /// Width of the camera frame
    ///
    /// Units: pixels
    pub frame_width: f64,

    /// Height of the camera frame
    ///
    /// Units: pixels
    pub frame_height: f64,

    #[serde(default)]
    pub buoy: Option<TargetObs>,

    #[serde(default)]
    pub path: Option<TargetObs>,

    #[serde(default)]
    pub dropper: Option<TargetObs>,

    #[serde(default)]
    pub torpedo: Option<TargetObs>,
}

/// A single observed target in the camera frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetObs {
    /// Horizontal position of the target centre, from the left edge
    ///
    /// Units: pixels
    pub x: f64,

    /// Vertical position of the target centre, from the top edge
    ///
    /// Units: pixels
    pub y: f64,

    /// Apparent radius of the target
    ///
    /// Units: pixels
    #[serde(default)]
    pub radius: f64,

    /// Apparent heading of an elongated target (the path marker) relative to the frame's vertical
    ///
    /// Units: degrees, positive clockwise
    #[serde(default)]
    pub angle_deg: f64,
}

/// Raw manual axis demands in the range `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAxes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// A telemetry message from the core to the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreTm {
    pub schema_version: u32,

    /// Session time at which this message was built
    ///
    /// Units: seconds
    pub time_s: f64,

    pub housekeeping: Option<HousekeepingTm>,

    /// Fused orientation of the vehicle
    pub orientation: Option<Orientation>,

    /// Duty cycle of each thruster, ordered by thruster ID
    pub thruster_duty_cycles: Vec<f64>,

    /// Echo of the joystick demands
    pub joystick: Option<JoystickTm>,

    pub power: Option<PowerTm>,

    pub nav: Option<NavTm>,

    /// Name of the running mission, or `"None"`
    pub current_mission: String,

    /// Label of the waypoint recorded this cycle
    pub set_waypoint_ack: Option<String>,

    /// Label of the waypoint removed this cycle
    pub remove_waypoint_ack: Option<String>,

    /// Orientation the running mission is steering towards
    pub desired_orientation: Option<Orientation>,

    pub safe: bool,

    pub safe_cause: Option<String>,

    /// Devices which have not produced a frame recently
    pub stale_devices: Vec<String>,

    /// Outcome of the most recently completed mission
    pub last_outcome: Option<MissionOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HousekeepingTm {
    pub temperature_c: f64,
    pub pressure_pa: f64,
    pub depth_ft: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerTm {
    /// Dirty power rail status reported by the power board
    pub status: bool,
    pub battery1_a: f64,
    pub battery2_a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoystickTm {
    pub axes: RawAxes,
    pub buttons: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavTm {
    /// Position relative to the navigation origin as `[east, up, north]`
    ///
    /// Units: feet
    pub position_ft: [f64; 3],

    /// Units: feet
    pub position_error_ft: f64,

    /// Velocity in the sensor frame as `[x, y, z]`
    ///
    /// Units: feet/second
    pub velocity_fps: [f64; 3],

    pub orientation: Orientation,

    /// Units: feet
    pub depth_ft: f64,

    pub misc: u16,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The kinds of mission the planner can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionKind {
    Navigation,
    Buoy,
    Path,
    Dropper,
    Torpedo,
}

/// How a mission finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionOutcome {
    /// The mission's completion condition was met
    Succeeded,

    /// The mission ran out of time and was force-completed
    TimedOut,
}

/// Errors that can occur while parsing a console message.
#[derive(Debug, Error)]
pub enum ConsoleMsgError {
    #[error("Message contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Message has schema version {found} but {expected} is expected")]
    SchemaMismatch { expected: u32, found: u32 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConsoleCmd {
    /// Parse a command from a JSON string, rejecting messages from a different schema version.
    pub fn from_json(json_str: &str) -> Result<Self, ConsoleMsgError> {
        let cmd: Self = serde_json::from_str(json_str).map_err(ConsoleMsgError::InvalidJson)?;

        if cmd.schema_version != SCHEMA_VERSION {
            return Err(ConsoleMsgError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: cmd.schema_version,
            });
        }

        Ok(cmd)
    }
}

impl Default for ConsoleCmd {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            console_ready: false,
            start_vehicle: false,
            kill_dirty_power: false,
            manual_mode: false,
            missions: None,
            image_proc: None,
            set_waypoint: None,
            remove_waypoint: None,
            rename_waypoint: None,
            reset_nav_origin: false,
            pid_gains: None,
            manual_axes: None,
            kill: false,
        }
    }
}

impl CoreTm {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Default for CoreTm {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            time_s: 0.0,
            housekeeping: None,
            orientation: None,
            thruster_duty_cycles: Vec::new(),
            joystick: None,
            power: None,
            nav: None,
            current_mission: NO_MISSION_NAME.into(),
            set_waypoint_ack: None,
            remove_waypoint_ack: None,
            desired_orientation: None,
            safe: false,
            safe_cause: None,
            stale_devices: Vec::new(),
            last_outcome: None,
        }
    }
}

impl std::fmt::Display for MissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ImageProcValues {
    /// The observation relevant to a mission kind, if that target was detected.
    pub fn target(&self, kind: MissionKind) -> Option<&TargetObs> {
        match kind {
            MissionKind::Navigation => None,
            MissionKind::Buoy => self.buoy.as_ref(),
            MissionKind::Path => self.path.as_ref(),
            MissionKind::Dropper => self.dropper.as_ref(),
            MissionKind::Torpedo => self.torpedo.as_ref(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_cmd() {
        let cmd = ConsoleCmd::from_json(r#"{"schema_version": 1, "console_ready": true}"#).unwrap();

        assert!(cmd.console_ready);
        assert!(!cmd.kill);
        assert!(cmd.missions.is_none());
    }

    #[test]
    fn test_mission_list() {
        let json = r#"{
            "schema_version": 1,
            "start_vehicle": true,
            "missions": [
                {"kind": "Navigation", "params": {"waypoint": "gate", "timeout_s": 30.0}},
                {"kind": "Buoy"}
            ]
        }"#;

        let cmd = ConsoleCmd::from_json(json).unwrap();
        let missions = cmd.missions.unwrap();

        assert_eq!(missions.len(), 2);
        assert_eq!(missions[0].kind, MissionKind::Navigation);
        assert_eq!(missions[0].params["waypoint"], "gate");
        assert!(missions[1].params.is_empty());
    }

    #[test]
    fn test_schema_mismatch() {
        match ConsoleCmd::from_json(r#"{"schema_version": 7}"#) {
            Err(ConsoleMsgError::SchemaMismatch { expected, found }) => {
                assert_eq!(expected, SCHEMA_VERSION);
                assert_eq!(found, 7);
            }
            r => panic!("Expected a schema mismatch, got {:?}", r),
        }

        assert!(matches!(
            ConsoleCmd::from_json("not json"),
            Err(ConsoleMsgError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_tm_fields_named() {
        let tm = CoreTm::default();
        let v: Value = serde_json::from_str(&tm.to_json().unwrap()).unwrap();

        assert_eq!(v["schema_version"], SCHEMA_VERSION);
        assert_eq!(v["current_mission"], NO_MISSION_NAME);
        assert!(v["nav"].is_null());
    }
}
