//! # Data Store
//!
//! Aggregate state of the vehicle, rebuilt from the device frames drained each cycle. Frames
//! overwrite the previous value of their device, so a device which stops talking keeps its last
//! good value until it is reported stale.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    console::ImageProcValues,
    eqpt::{
        AhrsFrame, DeviceFrame, DeviceKind, HkFrame, JoystickFrame, NavFrame, Orientation,
        PowerFrame,
    },
};
use log::{info, trace, warn};

use crate::{fusion, move_ctrl::Pose};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Gives the reason the vehicle has been put into safe mode
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SafeModeCause {
    /// A battery current reached the safety limit
    OverCurrent,

    /// The console asked for dirty power to be cut
    ConsoleKillPower,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Last value received from a device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceState<T> {
    value: Option<T>,
    last_update_s: Option<f64>,
}

/// Global data store for the executable.
#[derive(Debug, Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session time at the start of this cycle
    pub time_s: f64,

    // Safe mode variables
    /// Determines if the vehicle is in safe mode.
    pub safe: bool,

    /// Gives the reason for the vehicle being in safe mode.
    pub safe_cause: Option<SafeModeCause>,

    // Devices
    pub nav: DeviceState<NavFrame>,
    pub ahrs: [DeviceState<AhrsFrame>; 3],
    pub hk: DeviceState<HkFrame>,
    pub power: DeviceState<PowerFrame>,
    pub joystick: DeviceState<JoystickFrame>,

    /// Number of frames received from boards whose replies are only logged
    pub num_raw_frames: u64,

    // Navigation
    /// Navigation position subtracted from every pose, as `[east, up, north]`
    pub nav_origin_ft: [f64; 3],

    /// Orientation fused from the AHRS this cycle
    pub fused_orientation: Option<Orientation>,

    /// Pose of the vehicle this cycle
    pub pose: Option<Pose>,

    /// Latest target detection values from the console
    pub image: Option<ImageProcValues>,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl<T> Default for DeviceState<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_update_s: None,
        }
    }
}

impl<T: Copy> DeviceState<T> {
    /// Overwrite the held value.
    pub fn fold(&mut self, value: T, time_s: f64) {
        self.value = Some(value);
        self.last_update_s = Some(time_s);
    }

    /// The last value received, however old.
    pub fn get(&self) -> Option<T> {
        self.value
    }

    /// The last value received, if it is not stale.
    pub fn fresh(&self, time_s: f64, stale_timeout_s: f64) -> Option<T> {
        if self.is_stale(time_s, stale_timeout_s) {
            None
        } else {
            self.value
        }
    }

    /// True if nothing has been received within the timeout, or nothing was ever received.
    pub fn is_stale(&self, time_s: f64, stale_timeout_s: f64) -> bool {
        match self.last_update_s {
            Some(t) => time_s - t > stale_timeout_s,
            None => true,
        }
    }
}

impl DataStore {
    /// Puts the vehicle into safe mode with the given cause.
    pub fn make_safe(&mut self, cause: SafeModeCause) {
        if !self.safe {
            warn!("Make safe requested, cause: {:?}", cause);
            self.safe = true;
            self.safe_cause = Some(cause);
        }
    }

    /// Attempts to disable the safe mode by clearing the given cause.
    ///
    /// Returns `Ok(())` if this cause was cleared and safe mode was disabled, or `Err(())`
    /// otherwise. To remove safe mode the provided cause must match the initial reason for safe
    /// mode being enabled.
    ///
    /// If safe mode was not enabled `Ok(())` is returned
    pub fn make_unsafe(&mut self, cause: SafeModeCause) -> Result<(), ()> {
        if !self.safe {
            return Ok(());
        }

        match self.safe_cause {
            Some(root_cause) if cause == root_cause => {
                self.safe = false;
                self.safe_cause = None;
                info!("Make unsafe requested, root cause match, safe mode disabled");
                Ok(())
            }
            Some(_) => Err(()),
            None => Ok(()),
        }
    }

    /// Perform actions required at the start of a cycle.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64, time_s: f64) {
        let cycles_per_s = (cycle_frequency_hz as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;
        self.time_s = time_s;
    }

    /// Fold a decoded frame into the device states.
    pub fn fold_frame(&mut self, device: DeviceKind, frame: DeviceFrame) {
        let t = self.time_s;

        match frame {
            DeviceFrame::Nav(f) => self.nav.fold(f, t),
            DeviceFrame::Ahrs(f) => match device.ahrs_index() {
                Some(i) => self.ahrs[i].fold(f, t),
                None => warn!("Orientation frame from non-AHRS device {}", device),
            },
            DeviceFrame::Hk(f) => self.hk.fold(f, t),
            DeviceFrame::Power(f) => self.power.fold(f, t),
            DeviceFrame::Joystick(f) => self.joystick.fold(f, t),
            DeviceFrame::Raw(r) => {
                self.num_raw_frames += 1;
                trace!(
                    "{} reply type {:#04x}: {:02x?}",
                    device,
                    r.msg_type,
                    r.payload
                );
            }
        }
    }

    /// Fuse the fresh orientation sources and combine them with the navigation position.
    ///
    /// Without any fresh AHRS the navigation sensor's own orientation is used. Without a fresh
    /// navigation frame there is no pose.
    pub fn update_pose(&mut self, stale_timeout_s: f64) {
        let t = self.time_s;

        let sources = [
            self.ahrs[0].fresh(t, stale_timeout_s).map(Orientation::from),
            self.ahrs[1].fresh(t, stale_timeout_s).map(Orientation::from),
            self.ahrs[2].fresh(t, stale_timeout_s).map(Orientation::from),
        ];

        let nav = self.nav.fresh(t, stale_timeout_s);

        self.fused_orientation = fusion::fuse(&sources).or_else(|| nav.map(|n| n.orientation()));

        self.pose = match (nav, self.fused_orientation) {
            (Some(n), Some(o)) => {
                let p = n.position_ft();
                Some(Pose {
                    yaw_deg: o.yaw_deg,
                    pitch_deg: o.pitch_deg,
                    roll_deg: o.roll_deg,
                    east_ft: p[0] - self.nav_origin_ft[0],
                    up_ft: p[1] - self.nav_origin_ft[1],
                    north_ft: p[2] - self.nav_origin_ft[2],
                })
            }
            _ => None,
        };
    }

    /// Make the current navigation position the origin of all poses.
    pub fn reset_nav_origin(&mut self) {
        match self.nav.get() {
            Some(n) => {
                self.nav_origin_ft = n.position_ft();
                info!("Navigation origin reset to {:?}", self.nav_origin_ft);
            }
            None => warn!("Cannot reset the navigation origin without navigation data"),
        }
    }

    /// Devices among those given which have gone quiet.
    pub fn stale_devices(
        &self,
        devices: impl Iterator<Item = DeviceKind>,
        stale_timeout_s: f64,
    ) -> Vec<DeviceKind> {
        let t = self.time_s;

        devices
            .filter(|d| {
                let stale = match d {
                    DeviceKind::Nav => self.nav.is_stale(t, stale_timeout_s),
                    DeviceKind::Housekeeping => self.hk.is_stale(t, stale_timeout_s),
                    DeviceKind::Power => self.power.is_stale(t, stale_timeout_s),
                    DeviceKind::Joystick => self.joystick.is_stale(t, stale_timeout_s),
                    d => match d.ahrs_index() {
                        Some(i) => self.ahrs[i].is_stale(t, stale_timeout_s),
                        // Boards which only reply to commands are never stale
                        None => false,
                    },
                };
                stale
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn nav_frame(east_ft: f64, heading_deg: f64) -> NavFrame {
        NavFrame {
            east_ft,
            north_ft: 2.0,
            up_ft: -1.0,
            heading_deg,
            ..Default::default()
        }
    }

    fn ahrs(heading_deg: f64) -> DeviceFrame {
        DeviceFrame::Ahrs(AhrsFrame {
            heading_deg,
            pitch_deg: 1.0,
            roll_deg: 0.0,
        })
    }

    #[test]
    fn test_safe_mode_root_cause() {
        let mut ds = DataStore::default();

        ds.make_safe(SafeModeCause::OverCurrent);
        ds.make_safe(SafeModeCause::ConsoleKillPower);
        assert_eq!(ds.safe_cause, Some(SafeModeCause::OverCurrent));

        assert!(ds.make_unsafe(SafeModeCause::ConsoleKillPower).is_err());
        assert!(ds.safe);
        assert!(ds.make_unsafe(SafeModeCause::OverCurrent).is_ok());
        assert!(!ds.safe);
        assert!(ds.make_unsafe(SafeModeCause::OverCurrent).is_ok());
    }

    #[test]
    fn test_pose_from_fusion_and_origin() {
        let mut ds = DataStore::default();
        ds.cycle_start(10.0, 1.0);

        ds.fold_frame(DeviceKind::Nav, DeviceFrame::Nav(nav_frame(5.0, 300.0)));
        ds.fold_frame(DeviceKind::Ahrs0, ahrs(10.0));
        ds.fold_frame(DeviceKind::Ahrs1, ahrs(200.0));
        ds.fold_frame(DeviceKind::Ahrs2, ahrs(12.0));

        ds.update_pose(0.5);
        let pose = ds.pose.unwrap();
        assert!(pose.yaw_deg == 10.0 || pose.yaw_deg == 12.0);
        assert_eq!(pose.east_ft, 5.0);

        ds.reset_nav_origin();
        ds.update_pose(0.5);
        let pose = ds.pose.unwrap();
        assert_eq!(pose.east_ft, 0.0);
        assert_eq!(pose.north_ft, 0.0);
    }

    #[test]
    fn test_stale_sources() {
        let mut ds = DataStore::default();
        ds.cycle_start(10.0, 0.0);
        ds.fold_frame(DeviceKind::Ahrs0, ahrs(90.0));
        ds.fold_frame(DeviceKind::Nav, DeviceFrame::Nav(nav_frame(0.0, 45.0)));

        // AHRS goes quiet, the navigation sensor keeps talking
        ds.cycle_start(10.0, 2.0);
        ds.fold_frame(DeviceKind::Nav, DeviceFrame::Nav(nav_frame(1.0, 45.0)));
        ds.update_pose(0.5);

        assert_eq!(ds.pose.unwrap().yaw_deg, 45.0);
        assert_eq!(
            ds.stale_devices(
                vec![DeviceKind::Nav, DeviceKind::Ahrs0, DeviceKind::Power, DeviceKind::Aux]
                    .into_iter(),
                0.5
            ),
            vec![DeviceKind::Ahrs0, DeviceKind::Power]
        );

        // Everything quiet, no pose but the last values are kept
        ds.cycle_start(10.0, 5.0);
        ds.update_pose(0.5);
        assert!(ds.pose.is_none());
        assert_eq!(ds.nav.get().unwrap().east_ft, 1.0);
    }

    #[test]
    fn test_raw_frames_counted() {
        let mut ds = DataStore::default();
        ds.fold_frame(
            DeviceKind::ThrusterBoard0,
            DeviceFrame::Raw(comms_if::eqpt::RawFrame {
                msg_type: 0x21,
                payload: vec![1, 2],
            }),
        );
        assert_eq!(ds.num_raw_frames, 1);
    }
}
