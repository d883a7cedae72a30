//! # Waypoint store
//!
//! Named poses recorded by the operator. The store is loaded at startup and written back to its
//! TOML file after every mutation so a restart never loses a waypoint.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::move_ctrl::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A recorded pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Position as `[east, up, north]`
    ///
    /// Units: feet
    pub position_ft: [f64; 3],

    /// Orientation as `[yaw, pitch, roll]`
    ///
    /// Units: degrees
    pub orientation_deg: [f64; 3],

    /// Depth reported by the navigation sensor when recorded
    ///
    /// Units: feet
    pub depth_ft: f64,

    /// Navigation position error when recorded
    ///
    /// Units: feet
    #[serde(default)]
    pub position_error_ft: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

/// Layout of the waypoint file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WaypointFile {
    #[serde(default)]
    waypoints: BTreeMap<String, Waypoint>,
}

/// Label to waypoint map, optionally backed by a file.
#[derive(Debug, Default)]
pub struct WaypointStore {
    path: Option<PathBuf>,
    waypoints: BTreeMap<String, Waypoint>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WaypointError {
    #[error("Could not load the waypoints: {0}")]
    LoadError(util::params::LoadError),

    #[error("Could not save the waypoints: {0}")]
    SaveError(util::params::SaveError),

    #[error("No waypoint is labelled {0:?}")]
    NotFound(String),

    #[error("A waypoint labelled {0:?} already exists")]
    AlreadyExists(String),

    #[error("Waypoint labels cannot be empty")]
    EmptyLabel,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    /// Record a waypoint at the given pose.
    pub fn from_pose(
        pose: &Pose,
        depth_ft: f64,
        position_error_ft: f64,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            position_ft: [pose.east_ft, pose.up_ft, pose.north_ft],
            orientation_deg: [pose.yaw_deg, pose.pitch_deg, pose.roll_deg],
            depth_ft,
            position_error_ft,
            created: Some(created),
        }
    }

    /// The pose this waypoint describes.
    pub fn pose(&self) -> Pose {
        Pose {
            east_ft: self.position_ft[0],
            up_ft: self.position_ft[1],
            north_ft: self.position_ft[2],
            yaw_deg: self.orientation_deg[0],
            pitch_deg: self.orientation_deg[1],
            roll_deg: self.orientation_deg[2],
        }
    }
}

impl WaypointStore {
    /// Load the store from a file, or start an empty store backed by that file if it does not
    /// exist yet.
    pub fn load(path: PathBuf) -> Result<Self, WaypointError> {
        let waypoints = if path.exists() {
            let file: WaypointFile =
                util::params::load_path(&path).map_err(WaypointError::LoadError)?;
            file.waypoints
        } else {
            info!("No waypoint file at {:?}, starting empty", path);
            BTreeMap::new()
        };

        info!("Loaded {} waypoints", waypoints.len());

        Ok(Self {
            path: Some(path),
            waypoints,
        })
    }

    /// A store which is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&Waypoint> {
        self.waypoints.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &String> {
        self.waypoints.keys()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Add a waypoint, replacing any existing waypoint with the same label.
    pub fn add(&mut self, label: &str, waypoint: Waypoint) -> Result<(), WaypointError> {
        if label.is_empty() {
            return Err(WaypointError::EmptyLabel);
        }

        if self.waypoints.insert(label.into(), waypoint).is_some() {
            info!("Waypoint {:?} replaced", label);
        } else {
            info!("Waypoint {:?} added", label);
        }

        self.save()
    }

    pub fn remove(&mut self, label: &str) -> Result<Waypoint, WaypointError> {
        let wp = self
            .waypoints
            .remove(label)
            .ok_or_else(|| WaypointError::NotFound(label.into()))?;

        info!("Waypoint {:?} removed", label);
        self.save()?;

        Ok(wp)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), WaypointError> {
        if to.is_empty() {
            return Err(WaypointError::EmptyLabel);
        }
        if self.waypoints.contains_key(to) {
            return Err(WaypointError::AlreadyExists(to.into()));
        }

        let wp = self
            .waypoints
            .remove(from)
            .ok_or_else(|| WaypointError::NotFound(from.into()))?;
        self.waypoints.insert(to.into(), wp);

        info!("Waypoint {:?} renamed to {:?}", from, to);
        self.save()
    }

    fn save(&self) -> Result<(), WaypointError> {
        match self.path {
            Some(ref p) => util::params::save_path(
                &WaypointFile {
                    waypoints: self.waypoints.clone(),
                },
                p,
            )
            .map_err(WaypointError::SaveError),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn waypoint(east_ft: f64) -> Waypoint {
        Waypoint {
            position_ft: [east_ft, -3.0, 4.0],
            orientation_deg: [90.0, 0.0, 0.0],
            depth_ft: 3.0,
            position_error_ft: 0.1,
            created: None,
        }
    }

    #[test]
    fn test_mutations() {
        let mut store = WaypointStore::in_memory();

        store.add("gate", waypoint(1.0)).unwrap();
        store.add("buoy", waypoint(2.0)).unwrap();
        assert_eq!(store.len(), 2);

        assert!(matches!(
            store.rename("gate", "buoy"),
            Err(WaypointError::AlreadyExists(_))
        ));
        store.rename("gate", "start").unwrap();
        assert!(store.get("gate").is_none());
        assert_eq!(store.get("start").unwrap().position_ft[0], 1.0);

        assert!(matches!(
            store.remove("gate"),
            Err(WaypointError::NotFound(_))
        ));
        store.remove("buoy").unwrap();
        assert_eq!(store.labels().collect::<Vec<_>>(), vec!["start"]);

        assert!(matches!(
            store.add("", waypoint(0.0)),
            Err(WaypointError::EmptyLabel)
        ));
    }

    #[test]
    fn test_persisted() {
        let path = std::env::temp_dir().join(format!("waypoints_{}.toml", std::process::id()));
        let _ = std::fs::remove_file(&path);

        {
            let mut store = WaypointStore::load(path.clone()).unwrap();
            assert!(store.is_empty());
            store
                .add(
                    "gate",
                    Waypoint::from_pose(
                        &Pose {
                            east_ft: 1.5,
                            up_ft: -2.0,
                            north_ft: 7.0,
                            yaw_deg: 45.0,
                            ..Default::default()
                        },
                        2.0,
                        0.2,
                        Utc::now(),
                    ),
                )
                .unwrap();
        }

        let store = WaypointStore::load(path.clone()).unwrap();
        let pose = store.get("gate").unwrap().pose();
        assert_eq!(pose.east_ft, 1.5);
        assert_eq!(pose.north_ft, 7.0);
        assert_eq!(pose.yaw_deg, 45.0);
        assert!(store.get("gate").unwrap().created.is_some());

        let _ = std::fs::remove_file(&path);
    }
}
