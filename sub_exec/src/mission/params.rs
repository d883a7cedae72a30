//! Parameters of the missions
//!
//! `mission.toml` holds the defaults for every mission kind. Each mission in a list may override
//! any of them through its own parameter map, which is merged over the defaults when the list is
//! loaded.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::move_ctrl::DrivingMode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Default parameters of every mission kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionParams {
    pub navigation: NavigationParams,
    pub buoy: BuoyParams,
    pub path: PathParams,
    pub dropper: DropperParams,
    pub torpedo: TorpedoParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationParams {
    /// Label of the waypoint to drive to
    pub waypoint: String,

    /// Units: feet
    pub position_tolerance_ft: f64,

    /// Units: degrees
    pub orientation_tolerance_deg: f64,

    /// If true only the position must be within tolerance
    pub ignore_orientation: bool,

    /// Time the vehicle must stay within tolerance
    ///
    /// Units: seconds
    pub hold_time_s: f64,

    /// Units: seconds
    pub timeout_s: f64,

    pub driving_mode: DrivingMode,
}

/// Which camera a target is observed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Camera {
    /// Image x is starboard, image y is down
    Forward,

    /// Image x is starboard, image y is aft
    Downward,
}

/// Parameters shared by every target tracking mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    pub camera: Camera,

    /// Time the target must stay in the middle of the image before committing
    ///
    /// Units: seconds
    pub center_hold_s: f64,

    /// Smallest target radius, as a fraction of the frame width, at which the vehicle may commit
    pub min_commit_radius_frac: f64,

    /// Time spent steering towards the last known target position after losing it
    ///
    /// Units: seconds
    pub lost_recover_s: f64,

    /// Units: degrees per second
    pub sweep_rate_deg_s: f64,

    /// Yaw change demanded by a target at the edge of the image
    ///
    /// Units: degrees
    pub steer_gain_deg: f64,

    /// Depth change demanded by a target at the edge of the image
    ///
    /// Units: feet
    pub depth_gain_ft: f64,

    /// Distance of the intermediate target placed ahead of the vehicle while approaching. Must be
    /// less than the orientation bubble for the steering yaw to be used.
    ///
    /// Units: feet
    pub approach_step_ft: f64,

    /// Total time allowed for the mission, commit included
    ///
    /// Units: seconds
    pub timeout_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuoyParams {
    #[serde(flatten)]
    pub tracker: TrackerParams,

    /// Units: seconds
    pub ram_time_s: f64,

    /// Units: seconds
    pub backoff_time_s: f64,

    /// Distance of the intermediate target while ramming or backing off
    ///
    /// Units: feet
    pub drive_step_ft: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathParams {
    #[serde(flatten)]
    pub tracker: TrackerParams,

    /// Units: degrees
    pub align_tolerance_deg: f64,

    /// Time the vehicle must stay aligned with the marker
    ///
    /// Units: seconds
    pub align_hold_s: f64,
}

/// One leg of the dropper's waypoint chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
    /// Offset from the commit pose as body-frame `[x, y, z]`
    ///
    /// Units: feet
    pub offset_ft: [f64; 3],

    /// Time to hold this leg once reached
    ///
    /// Units: seconds
    pub hold_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropperParams {
    #[serde(flatten)]
    pub tracker: TrackerParams,

    pub chain: Vec<ChainStep>,

    /// Units: feet
    pub position_tolerance_ft: f64,

    /// Time after which a leg is abandoned even if not reached
    ///
    /// Units: seconds
    pub leg_timeout_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TorpedoParams {
    #[serde(flatten)]
    pub tracker: TrackerParams,

    /// Units: seconds
    pub aim_hold_s: f64,

    /// Units: seconds
    pub backoff_time_s: f64,

    /// Units: feet
    pub drive_step_ft: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParamMergeError {
    #[error("Unknown parameter {0:?}")]
    UnknownKey(String),

    #[error("{0}")]
    Invalid(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            waypoint: String::new(),
            position_tolerance_ft: 1.0,
            orientation_tolerance_deg: 5.0,
            ignore_orientation: false,
            hold_time_s: 2.0,
            timeout_s: 60.0,
            driving_mode: DrivingMode::Forward,
        }
    }
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            camera: Camera::Forward,
            center_hold_s: 1.0,
            min_commit_radius_frac: 0.0,
            lost_recover_s: 3.0,
            sweep_rate_deg_s: 10.0,
            steer_gain_deg: 15.0,
            depth_gain_ft: 1.0,
            approach_step_ft: 2.0,
            timeout_s: 90.0,
        }
    }
}

impl Default for BuoyParams {
    fn default() -> Self {
        Self {
            tracker: TrackerParams::default(),
            ram_time_s: 4.0,
            backoff_time_s: 3.0,
            drive_step_ft: 2.0,
        }
    }
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            tracker: TrackerParams {
                camera: Camera::Downward,
                ..Default::default()
            },
            align_tolerance_deg: 5.0,
            align_hold_s: 2.0,
        }
    }
}

impl Default for DropperParams {
    fn default() -> Self {
        Self {
            tracker: TrackerParams {
                camera: Camera::Downward,
                ..Default::default()
            },
            chain: vec![
                ChainStep {
                    offset_ft: [0.0, -2.0, 0.0],
                    hold_s: 2.0,
                },
                ChainStep {
                    offset_ft: [0.0, -2.0, 0.0],
                    hold_s: 1.0,
                },
            ],
            position_tolerance_ft: 0.5,
            leg_timeout_s: 15.0,
        }
    }
}

impl Default for TorpedoParams {
    fn default() -> Self {
        Self {
            tracker: TrackerParams::default(),
            aim_hold_s: 2.0,
            backoff_time_s: 3.0,
            drive_step_ft: 2.0,
        }
    }
}

impl TrackerParams {
    pub fn are_valid(&self) -> bool {
        self.center_hold_s >= 0.0
            && self.min_commit_radius_frac >= 0.0
            && self.lost_recover_s >= 0.0
            && self.sweep_rate_deg_s.is_finite()
            && self.approach_step_ft >= 0.0
            && self.timeout_s > 0.0
    }
}

/// Merge a mission's parameter overrides over the defaults for its kind.
///
/// Keys which are not parameters of the kind are rejected so that a typo cannot silently leave a
/// default in place.
pub fn merge_overrides<P>(
    defaults: &P,
    overrides: &Map<String, Value>,
) -> Result<P, ParamMergeError>
where
    P: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(defaults).map_err(ParamMergeError::Invalid)?;

    if let Value::Object(ref mut map) = merged {
        for (key, value) in overrides.iter() {
            if !map.contains_key(key) {
                return Err(ParamMergeError::UnknownKey(key.clone()));
            }
            map.insert(key.clone(), value.clone());
        }
    }

    serde_json::from_value(merged).map_err(ParamMergeError::Invalid)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
