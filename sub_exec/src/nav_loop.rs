//! # Navigation loop
//!
//! One cycle of the control process, independent of the serial and network I/O around it so it
//! can be driven directly in tests. Each call to [`NavLoop::tick`] runs, in order:
//!
//! 1. Aggregate the frames drained from the device readers and fuse the pose
//! 2. Safety checks (battery current, console link)
//! 3. Gain sync, applying any gains received from the console on the previous cycle
//! 4. Manual controllers or the mission planner
//! 5. Thruster bus rate limiting
//! 6. Archive
//! 7. Outbound telemetry, if flow control allows it
//!
//! The inbound console command is then passed to [`NavLoop::handle_cmd`] at the end of the cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::Utc;
use comms_if::{
    console::{
        ConsoleCmd, CoreTm, HousekeepingTm, JoystickTm, MissionOutcome, NavTm, PowerTm, RawAxes,
        RenameWaypoint, SCHEMA_VERSION,
    },
    eqpt::{
        aux::{self, Actuation},
        power, thruster, DeviceFrame, DeviceKind, Orientation,
    },
    gains::ControlGains,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use util::{archive::Archiver, maths::wrap_360};

use crate::{
    console_link::FlowControl,
    data_store::{DataStore, SafeModeCause},
    mission::{MissionInput, MissionParams, MissionPlanner},
    move_ctrl::{
        AxisErrors, BoardCmds, JoystickMovementController, LockedController, MoveCtrlError,
        MoveCtrlParams, MovementController, Overrides, Pose, ThrusterBus, VehicleParams,
    },
    params::{ManualStyle, NavLoopParams},
    serial::{self, Devices},
    waypoints::{Waypoint, WaypointStore},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything the process must write out after a cycle.
#[derive(Debug, Default)]
pub struct TickOutput {
    /// Thruster commands, keyed by board index
    pub board_cmds: BoardCmds,

    /// New dirty power state, only present when it changes
    pub power_cmd: Option<bool>,

    /// Actuations requested by the missions this cycle
    pub actuations: Vec<Actuation>,

    /// Telemetry for the console, if flow control allows it
    pub tm: Option<CoreTm>,
}

/// The control loop.
pub struct NavLoop {
    params: NavLoopParams,
    ds: DataStore,

    /// Devices which are expected to report, used for the stale list
    devices: Vec<DeviceKind>,

    gains: ControlGains,
    pending_gains: Option<ControlGains>,

    advanced: MovementController,
    joystick: JoystickMovementController,
    locked: LockedController,
    bus: ThrusterBus,

    planner: MissionPlanner,
    waypoints: WaypointStore,

    flow: FlowControl,
    last_cmd_s: Option<f64>,
    console_lost: bool,

    /// True while the console asks for the vehicle to run
    started: bool,
    manual: ManualState,
    power_commanded: Option<bool>,
    kill_requested: bool,

    // Outputs of the last cycle
    duty_cycles: Vec<f64>,
    errors: Option<AxisErrors>,
    desired_orientation: Option<Orientation>,
    current_mission: String,
    last_outcome: Option<MissionOutcome>,
    set_waypoint_ack: Option<String>,
    remove_waypoint_ack: Option<String>,

    archiver: Archiver,
}

#[derive(Debug, Default)]
struct ManualState {
    enabled: bool,

    /// Axes last received from the console
    axes: RawAxes,

    /// Pose being held, locked when manual mode is entered
    target: Option<Pose>,
}

/// Flat per-cycle archive record.
#[derive(Serialize)]
struct CycleRecord {
    time_s: f64,
    safe: bool,
    manual: bool,
    mission: String,
    yaw_deg: Option<f64>,
    pitch_deg: Option<f64>,
    roll_deg: Option<f64>,
    east_ft: Option<f64>,
    up_ft: Option<f64>,
    north_ft: Option<f64>,
    err_east_ft: Option<f64>,
    err_up_ft: Option<f64>,
    err_north_ft: Option<f64>,
    err_yaw_deg: Option<f64>,
    err_pitch_deg: Option<f64>,
    err_roll_deg: Option<f64>,
    duty_cycles: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NavLoopError {
    #[error("Could not create the movement controllers: {0}")]
    MoveCtrlError(MoveCtrlError),

    #[error("The controller gains are invalid")]
    InvalidGains,

    #[error("The loop parameters are invalid")]
    InvalidParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TickOutput {
    /// Write this cycle's commands to the boards.
    ///
    /// Write failures are logged and do not stop the remaining commands.
    pub fn write(&self, devices: &mut Devices) {
        write_board_cmds(devices, &self.board_cmds);

        if let Some(energise) = self.power_cmd {
            write_power(devices, energise);
        }

        for actuation in self.actuations.iter() {
            info!("Actuating {:?}", actuation);
            send(
                devices,
                DeviceKind::Aux,
                aux::CMD_MSG_TYPE,
                &actuation.encode_cmd(),
            );
        }
    }
}

impl NavLoop {
    pub fn new(
        params: NavLoopParams,
        vehicle: VehicleParams,
        move_params: MoveCtrlParams,
        gains: ControlGains,
        mission_params: MissionParams,
        waypoints: WaypointStore,
        devices: Vec<DeviceKind>,
    ) -> Result<Self, NavLoopError> {
        if !params.are_valid() {
            return Err(NavLoopError::InvalidParams);
        }
        if !gains.are_valid() {
            return Err(NavLoopError::InvalidGains);
        }

        let advanced = MovementController::new(vehicle.thrusters.clone(), move_params.clone())
            .map_err(NavLoopError::MoveCtrlError)?;
        let joystick =
            JoystickMovementController::new(vehicle.thrusters.clone(), move_params.clone())
                .map_err(NavLoopError::MoveCtrlError)?;
        let locked = LockedController::new(vehicle.thrusters, move_params.clone())
            .map_err(NavLoopError::MoveCtrlError)?;

        let num_thrusters = advanced.thrusters().len();
        let planner = MissionPlanner::new(mission_params);
        let current_mission = planner.current_mission_name();

        Ok(Self {
            params,
            ds: DataStore::default(),
            devices,
            gains,
            pending_gains: None,
            advanced,
            joystick,
            locked,
            bus: ThrusterBus::new(num_thrusters, move_params.min_send_interval_s),
            planner,
            waypoints,
            flow: FlowControl::default(),
            last_cmd_s: None,
            console_lost: false,
            started: false,
            manual: ManualState::default(),
            power_commanded: None,
            kill_requested: false,
            duty_cycles: vec![0.0; num_thrusters],
            errors: None,
            desired_orientation: None,
            current_mission,
            last_outcome: None,
            set_waypoint_ack: None,
            remove_waypoint_ack: None,
            archiver: Archiver::default(),
        })
    }

    /// Attach an archiver for the per-cycle records.
    pub fn set_archiver(&mut self, archiver: Archiver) {
        self.archiver = archiver;
    }

    /// Run one cycle on the frames received since the last one.
    pub fn tick(&mut self, frames: Vec<(DeviceKind, DeviceFrame)>, time_s: f64) -> TickOutput {
        // ---- AGGREGATE ----

        self.ds.cycle_start(1.0 / self.params.cycle_period_s, time_s);

        for (device, frame) in frames {
            self.ds.fold_frame(device, frame);
        }

        self.ds.update_pose(self.params.stale_timeout_s);

        // ---- SAFETY ----

        self.check_battery_current();
        self.check_console_link();

        // ---- GAIN SYNC ----

        if let Some(gains) = self.pending_gains.take() {
            self.gains = gains;
            info!("Controller gains updated");
        }

        // ---- CONTROL ----

        let mut actuations = Vec::new();

        self.duty_cycles = if self.ds.safe || !self.started {
            self.errors = None;
            self.desired_orientation = None;
            self.advanced.neutral()
        } else if self.manual.enabled {
            self.manual_step()
        } else {
            let (duty_cycles, actuation) = self.autonomy_step();
            actuations.extend(actuation);
            duty_cycles
        };

        self.current_mission = self.planner.current_mission_name();

        // ---- BUS ----

        let board_cmds = self
            .bus
            .commands(self.advanced.thrusters().specs(), &self.duty_cycles, time_s);

        let power_cmd = self.power_cmd();

        // ---- ARCHIVE ----

        if let Err(e) = self.archiver.serialise(&self.cycle_record()) {
            warn!("Could not archive cycle record: {}", e);
        }

        // ---- TELEMETRY ----

        let tm = if self.flow.may_send() {
            Some(self.build_tm())
        } else {
            None
        };

        self.ds.num_cycles += 1;

        TickOutput {
            board_cmds,
            power_cmd,
            actuations,
            tm,
        }
    }

    /// Process a command received from the console.
    pub fn handle_cmd(&mut self, cmd: ConsoleCmd) {
        self.last_cmd_s = Some(self.ds.time_s);
        self.flow.on_cmd(&cmd);

        if cmd.kill && !self.kill_requested {
            info!("Shutdown requested by the console");
            self.kill_requested = true;
        }

        // ---- POWER AND START ----

        if cmd.kill_dirty_power {
            self.ds.make_safe(SafeModeCause::ConsoleKillPower);
        } else {
            self.ds.make_unsafe(SafeModeCause::ConsoleKillPower).ok();
        }

        if cmd.start_vehicle != self.started {
            if cmd.start_vehicle {
                info!("Vehicle started");
                self.clear_over_current();
            } else {
                info!("Vehicle stopped");
            }
            self.started = cmd.start_vehicle;
        }

        // ---- MANUAL ----

        self.set_manual_mode(cmd.manual_mode);

        if let Some(axes) = cmd.manual_axes {
            self.manual.axes = axes;
        }

        // ---- GAINS ----

        if let Some(gains) = cmd.pid_gains {
            if gains.are_valid() {
                debug!("New controller gains staged");
                self.pending_gains = Some(gains);
            } else {
                warn!("Rejected invalid controller gains from the console");
            }
        }

        // ---- AUTONOMY ----

        if let Some(image) = cmd.image_proc {
            self.ds.image = Some(image);
        }

        if let Some(missions) = cmd.missions {
            if let Err(e) = self.planner.load(&missions, &self.waypoints) {
                error!("Mission list rejected: {}", e);
            }
        }

        // ---- WAYPOINTS ----

        if let Some(label) = cmd.set_waypoint {
            self.set_waypoint(label);
        }

        if let Some(label) = cmd.remove_waypoint {
            match self.waypoints.remove(&label) {
                Ok(_) => self.remove_waypoint_ack = Some(label),
                Err(e) => warn!("Could not remove waypoint: {}", e),
            }
        }

        if let Some(RenameWaypoint { from, to }) = cmd.rename_waypoint {
            if let Err(e) = self.waypoints.rename(&from, &to) {
                warn!("Could not rename waypoint: {}", e);
            }
        }

        if cmd.reset_nav_origin {
            self.ds.reset_nav_origin();
        }
    }

    /// Commands zeroing every thruster, bypassing the bus rate limit.
    pub fn shutdown_cmds(&mut self, time_s: f64) -> BoardCmds {
        self.duty_cycles = self.advanced.neutral();
        self.bus
            .force_all(self.advanced.thrusters().specs(), &self.duty_cycles, time_s)
    }

    /// True once the console has asked for the process to stop.
    pub fn kill_requested(&self) -> bool {
        self.kill_requested
    }

    pub fn data_store(&self) -> &DataStore {
        &self.ds
    }

    pub fn data_store_mut(&mut self) -> &mut DataStore {
        &mut self.ds
    }

    pub fn gains(&self) -> &ControlGains {
        &self.gains
    }

    pub fn planner(&self) -> &MissionPlanner {
        &self.planner
    }

    pub fn waypoints(&self) -> &WaypointStore {
        &self.waypoints
    }

    pub fn duty_cycles(&self) -> &[f64] {
        &self.duty_cycles
    }

    // ---- SAFETY ----

    fn check_battery_current(&mut self) {
        let power = match self
            .ds
            .power
            .fresh(self.ds.time_s, self.params.stale_timeout_s)
        {
            Some(p) => p,
            None => return,
        };

        let current_a = power.max_current_a();

        if current_a >= self.params.max_battery_current_a
            && self.ds.safe_cause != Some(SafeModeCause::OverCurrent)
        {
            error!(
                "Battery current {:.1} A at or above the {:.1} A limit, cutting dirty power",
                current_a, self.params.max_battery_current_a
            );
            self.ds.make_safe(SafeModeCause::OverCurrent);
        }
    }

    /// Restarting the vehicle clears an over current cut once the current is back under the
    /// limit.
    fn clear_over_current(&mut self) {
        if self.ds.safe_cause != Some(SafeModeCause::OverCurrent) {
            return;
        }

        let below_limit = self
            .ds
            .power
            .fresh(self.ds.time_s, self.params.stale_timeout_s)
            .map(|p| p.max_current_a() < self.params.max_battery_current_a)
            .unwrap_or(false);

        if below_limit {
            self.ds.make_unsafe(SafeModeCause::OverCurrent).ok();
        } else {
            warn!("Cannot clear the over current cut, battery current unknown or still too high");
        }
    }

    fn check_console_link(&mut self) {
        let lost = match self.last_cmd_s {
            Some(t) => self.ds.time_s - t > self.params.console_lost_timeout_s,
            None => false,
        };

        if lost && !self.console_lost {
            warn!(
                "No command from the console for {:.1} s, manual input zeroed",
                self.params.console_lost_timeout_s
            );
        } else if !lost && self.console_lost {
            info!("Console link recovered");
        }

        if lost {
            self.manual.axes = RawAxes::default();
        }
        self.console_lost = lost;
    }

    fn power_cmd(&mut self) -> Option<bool> {
        let energise = self.started && !self.ds.safe;

        if self.power_commanded == Some(energise) {
            return None;
        }

        info!(
            "Dirty power {}",
            if energise { "energised" } else { "de-energised" }
        );
        self.power_commanded = Some(energise);
        Some(energise)
    }

    // ---- CONTROL ----

    fn set_manual_mode(&mut self, enabled: bool) {
        if enabled == self.manual.enabled {
            return;
        }

        info!(
            "Manual mode {} ({:?})",
            if enabled { "on" } else { "off" },
            self.params.manual_style
        );

        self.manual.enabled = enabled;
        self.manual.target = None;
        self.locked.reset();
        self.joystick.reset();
        self.advanced.reset();
    }

    fn autonomy_step(&mut self) -> (Vec<f64>, Option<Actuation>) {
        let input = MissionInput {
            time_s: self.ds.time_s,
            pose: self.ds.pose,
            image: self.ds.image.as_ref(),
        };

        let output = self
            .planner
            .step(&input, &mut self.advanced, &self.gains.advanced);

        if output.no_data {
            debug!("No data for mission {}", output.mission_name);
        }

        if let Some((_, outcome)) = output.outcome {
            self.last_outcome = Some(outcome);
        }

        self.errors = output.errors;
        self.desired_orientation = output.desired_orientation;

        (output.duty_cycles, output.actuation)
    }

    fn manual_step(&mut self) -> Vec<f64> {
        let time_s = self.ds.time_s;

        let pose = match self.ds.pose {
            Some(p) => p,
            None => {
                self.manual.target = None;
                self.errors = None;
                self.desired_orientation = None;
                self.locked.reset();
                self.joystick.reset();
                return self.advanced.neutral();
            }
        };

        // A fresh joystick takes precedence over the console's axes
        let axes = match self.ds.joystick.fresh(time_s, self.params.stale_timeout_s) {
            Some(j) => j.axes,
            None => self.manual.axes,
        };

        let deadband = self.advanced.params().raw_deadband;
        let target = self.manual.target.get_or_insert(pose);

        let output = match self.params.manual_style {
            ManualStyle::Locked => {
                let output =
                    self.locked
                        .locked_move(&pose, target, &axes, &self.gains.locked, time_s);
                relock(target, &pose, &output.overrides);
                output
            }
            ManualStyle::Joystick => {
                if axes.y.abs() > deadband {
                    target.up_ft = pose.up_ft + axes.y * self.params.joystick_depth_nudge_ft;
                }
                if axes.yaw.abs() > deadband {
                    target.yaw_deg =
                        wrap_360(pose.yaw_deg + axes.yaw * self.params.joystick_yaw_nudge_deg);
                }

                let max = self.joystick.max_duty_cycle();
                self.joystick.joystick_move(
                    &pose,
                    axes.x * max,
                    axes.z * max,
                    target,
                    &self.gains.joystick,
                    time_s,
                )
            }
        };

        self.errors = Some(output.errors);
        self.desired_orientation = Some(Orientation {
            yaw_deg: target.yaw_deg,
            pitch_deg: target.pitch_deg,
            roll_deg: target.roll_deg,
        });

        output.duty_cycles
    }

    // ---- WAYPOINTS ----

    fn set_waypoint(&mut self, label: String) {
        let pose = match self.ds.pose {
            Some(p) => p,
            None => {
                warn!("Cannot set waypoint {:?} without a pose", label);
                return;
            }
        };

        let nav = self.ds.nav.get();
        let depth_ft = self
            .ds
            .hk
            .get()
            .map(|h| h.depth_ft)
            .or_else(|| nav.map(|n| n.depth_ft))
            .unwrap_or(-pose.up_ft);
        let position_error_ft = nav.map(|n| n.position_error_ft).unwrap_or(0.0);

        let waypoint = Waypoint::from_pose(&pose, depth_ft, position_error_ft, Utc::now());

        match self.waypoints.add(&label, waypoint) {
            Ok(()) => {
                info!("Waypoint {:?} set at {:?}", label, pose);
                self.set_waypoint_ack = Some(label);
            }
            Err(e) => warn!("Could not set waypoint {:?}: {}", label, e),
        }
    }

    // ---- OUTPUTS ----

    fn build_tm(&mut self) -> CoreTm {
        let ds = &self.ds;

        CoreTm {
            schema_version: SCHEMA_VERSION,
            time_s: ds.time_s,
            housekeeping: ds.hk.get().map(|h| HousekeepingTm {
                temperature_c: h.temperature_c,
                pressure_pa: h.pressure_pa,
                depth_ft: h.depth_ft,
            }),
            orientation: ds.fused_orientation,
            thruster_duty_cycles: self.duty_cycles.clone(),
            joystick: ds.joystick.get().map(|j| JoystickTm {
                axes: j.axes,
                buttons: j.buttons,
            }),
            power: ds.power.get().map(|p| PowerTm {
                status: p.status,
                battery1_a: p.battery1_a,
                battery2_a: p.battery2_a,
            }),
            nav: ds.nav.get().map(|n| NavTm {
                position_ft: n.position_ft(),
                position_error_ft: n.position_error_ft,
                velocity_fps: n.velocity_fps,
                orientation: n.orientation(),
                depth_ft: n.depth_ft,
                misc: n.misc,
            }),
            current_mission: self.current_mission.clone(),
            set_waypoint_ack: self.set_waypoint_ack.take(),
            remove_waypoint_ack: self.remove_waypoint_ack.take(),
            desired_orientation: self.desired_orientation,
            safe: ds.safe,
            safe_cause: ds.safe_cause.map(|c| format!("{:?}", c)),
            stale_devices: ds
                .stale_devices(self.devices.iter().copied(), self.params.stale_timeout_s)
                .iter()
                .map(|d| d.to_string())
                .collect(),
            last_outcome: self.last_outcome,
        }
    }

    fn cycle_record(&self) -> CycleRecord {
        let pose = self.ds.pose;
        let errors = self.errors;

        CycleRecord {
            time_s: self.ds.time_s,
            safe: self.ds.safe,
            manual: self.manual.enabled,
            mission: self.current_mission.clone(),
            yaw_deg: pose.map(|p| p.yaw_deg),
            pitch_deg: pose.map(|p| p.pitch_deg),
            roll_deg: pose.map(|p| p.roll_deg),
            east_ft: pose.map(|p| p.east_ft),
            up_ft: pose.map(|p| p.up_ft),
            north_ft: pose.map(|p| p.north_ft),
            err_east_ft: errors.map(|e| e.east),
            err_up_ft: errors.map(|e| e.up),
            err_north_ft: errors.map(|e| e.north),
            err_yaw_deg: errors.map(|e| e.yaw),
            err_pitch_deg: errors.map(|e| e.pitch),
            err_roll_deg: errors.map(|e| e.roll),
            duty_cycles: self
                .duty_cycles
                .iter()
                .map(|d| format!("{:.1}", d))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Move the held target to the current pose on every axis the operator is driving.
fn relock(target: &mut Pose, pose: &Pose, overrides: &Overrides) {
    // Body x and z both map onto east and north
    if overrides.x || overrides.z {
        target.east_ft = pose.east_ft;
        target.north_ft = pose.north_ft;
    }
    if overrides.y {
        target.up_ft = pose.up_ft;
    }
    if overrides.pitch {
        target.pitch_deg = pose.pitch_deg;
    }
    if overrides.yaw {
        target.yaw_deg = pose.yaw_deg;
    }
    if overrides.roll {
        target.roll_deg = pose.roll_deg;
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Send thruster commands to their boards.
pub fn write_board_cmds(devices: &mut Devices, cmds: &BoardCmds) {
    for (board, board_cmds) in cmds.iter() {
        let device = match serial::thruster_board(*board) {
            Some(d) => d,
            None => {
                warn!("No thruster board with index {}", board);
                continue;
            }
        };

        for payload in thruster::encode_cmds(board_cmds) {
            send(devices, device, thruster::CMD_MSG_TYPE, &payload);
        }
    }
}

/// Switch dirty power.
pub fn write_power(devices: &mut Devices, energise: bool) {
    send(
        devices,
        DeviceKind::Power,
        power::CMD_MSG_TYPE,
        &power::encode_cmd(energise),
    );
}

fn send(devices: &mut Devices, device: DeviceKind, msg_type: u8, payload: &[u8]) {
    if !devices.is_open(device) {
        debug!("{} not open, {:#04x} message dropped", device, msg_type);
        return;
    }

    if let Err(e) = devices.send(device, msg_type, payload) {
        warn!("Could not write to {}: {}", device, e);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        move_ctrl::vehicle_specs,
        serial::{SerialReader, SerialWriter},
    };
    use comms_if::{
        console::{ImageProcValues, MissionKind, MissionSpec, TargetObs},
        eqpt::{frame::BoardFramer, AhrsFrame, NavFrame, PowerFrame},
    };
    use std::{
        io::{Cursor, Write},
        sync::{Arc, Mutex},
    };

    /// Records everything written to a board.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<u8>>>);

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn nav_loop() -> NavLoop {
        NavLoop::new(
            NavLoopParams::default(),
            VehicleParams {
                thrusters: vehicle_specs(),
            },
            MoveCtrlParams::default(),
            ControlGains::default(),
            MissionParams::default(),
            WaypointStore::in_memory(),
            vec![DeviceKind::Nav, DeviceKind::Ahrs0, DeviceKind::Power],
        )
        .unwrap()
    }

    fn started(console_ready: bool) -> ConsoleCmd {
        ConsoleCmd {
            console_ready,
            start_vehicle: true,
            ..Default::default()
        }
    }

    fn power(current_a: f64) -> (DeviceKind, DeviceFrame) {
        (
            DeviceKind::Power,
            DeviceFrame::Power(PowerFrame {
                status: true,
                battery1_a: 2.0,
                battery2_a: current_a,
            }),
        )
    }

    fn pose_frames(east_ft: f64, heading_deg: f64) -> Vec<(DeviceKind, DeviceFrame)> {
        vec![
            (
                DeviceKind::Nav,
                DeviceFrame::Nav(NavFrame {
                    east_ft,
                    heading_deg,
                    ..Default::default()
                }),
            ),
            (
                DeviceKind::Ahrs0,
                DeviceFrame::Ahrs(AhrsFrame {
                    heading_deg,
                    pitch_deg: 0.0,
                    roll_deg: 0.0,
                }),
            ),
        ]
    }

    #[test]
    fn test_over_current_cuts_power() {
        let mut nl = nav_loop();
        nl.handle_cmd(started(true));

        let out = nl.tick(vec![power(10.0)], 0.1);
        assert_eq!(out.power_cmd, Some(true));
        assert!(!nl.data_store().safe);

        // No change, nothing sent
        let out = nl.tick(vec![power(10.0)], 0.2);
        assert_eq!(out.power_cmd, None);

        let out = nl.tick(vec![power(19.0)], 0.3);
        assert_eq!(out.power_cmd, Some(false));
        assert_eq!(
            nl.data_store().safe_cause,
            Some(SafeModeCause::OverCurrent)
        );
        assert!(nl.duty_cycles().iter().all(|d| *d == 0.0));

        let tm = out.tm.unwrap();
        assert!(tm.safe);
        assert_eq!(tm.safe_cause.as_deref(), Some("OverCurrent"));

        // The console cannot clear it without restarting the vehicle
        nl.handle_cmd(started(true));
        let out = nl.tick(vec![power(5.0)], 0.4);
        assert_eq!(out.power_cmd, None);
        assert!(nl.data_store().safe);

        let stop = ConsoleCmd {
            console_ready: true,
            ..Default::default()
        };
        nl.handle_cmd(stop);
        nl.tick(vec![power(5.0)], 0.5);
        nl.handle_cmd(started(true));
        let out = nl.tick(vec![power(5.0)], 0.6);
        assert!(!nl.data_store().safe);
        assert_eq!(out.power_cmd, Some(true));
    }

    #[test]
    fn test_console_kill_power() {
        let mut nl = nav_loop();
        nl.handle_cmd(started(false));
        assert_eq!(nl.tick(vec![], 0.1).power_cmd, Some(true));

        nl.handle_cmd(ConsoleCmd {
            kill_dirty_power: true,
            ..started(false)
        });
        assert_eq!(nl.tick(vec![], 0.2).power_cmd, Some(false));

        nl.handle_cmd(started(false));
        assert_eq!(nl.tick(vec![], 0.3).power_cmd, Some(true));
    }

    #[test]
    fn test_flow_control() {
        let mut nl = nav_loop();

        // Not ready until the console says so
        assert!(nl.tick(vec![], 0.1).tm.is_none());

        nl.handle_cmd(started(true));
        assert!(nl.tick(vec![], 0.2).tm.is_some());

        nl.handle_cmd(started(false));
        assert!(nl.tick(vec![], 0.3).tm.is_none());
        assert!(nl.tick(vec![], 0.4).tm.is_none());

        nl.handle_cmd(started(true));
        let tm = nl.tick(vec![], 0.5).tm.unwrap();
        assert_eq!(tm.time_s, 0.5);
        assert_eq!(tm.thruster_duty_cycles.len(), 8);
        assert_eq!(tm.current_mission, "None");
    }

    #[test]
    fn test_gain_sync_next_tick() {
        let mut nl = nav_loop();

        let mut gains = ControlGains::default();
        gains.advanced.east.k_p = 3.0;

        nl.handle_cmd(ConsoleCmd {
            pid_gains: Some(gains),
            ..Default::default()
        });
        assert_eq!(nl.gains().advanced.east.k_p, 0.0);

        nl.tick(vec![], 0.1);
        assert_eq!(nl.gains().advanced.east.k_p, 3.0);

        // Inverted integrator range
        gains.locked.depth.integrator_min = 10.0;
        gains.locked.depth.integrator_max = -10.0;
        nl.handle_cmd(ConsoleCmd {
            pid_gains: Some(gains),
            ..Default::default()
        });
        nl.tick(vec![], 0.2);
        assert_eq!(nl.gains().locked.depth.integrator_min, -1000.0);
    }

    #[test]
    fn test_waypoint_acks() {
        let mut nl = nav_loop();

        // Without a pose nothing is recorded
        nl.handle_cmd(ConsoleCmd {
            console_ready: true,
            set_waypoint: Some("gate".into()),
            ..Default::default()
        });
        assert!(nl.waypoints().is_empty());

        nl.tick(pose_frames(4.0, 90.0), 0.1);
        nl.handle_cmd(ConsoleCmd {
            console_ready: true,
            set_waypoint: Some("gate".into()),
            ..Default::default()
        });

        let tm = nl.tick(pose_frames(4.0, 90.0), 0.2).tm.unwrap();
        assert_eq!(tm.set_waypoint_ack.as_deref(), Some("gate"));
        assert_eq!(nl.waypoints().get("gate").unwrap().position_ft[0], 4.0);

        // Acks are sent once
        let tm = nl.tick(pose_frames(4.0, 90.0), 0.3).tm.unwrap();
        assert!(tm.set_waypoint_ack.is_none());

        nl.handle_cmd(ConsoleCmd {
            console_ready: true,
            remove_waypoint: Some("gate".into()),
            ..Default::default()
        });
        let tm = nl.tick(pose_frames(4.0, 90.0), 0.4).tm.unwrap();
        assert_eq!(tm.remove_waypoint_ack.as_deref(), Some("gate"));
        assert!(nl.waypoints().is_empty());
    }

    #[test]
    fn test_missions_run_when_started() {
        let mut nl = nav_loop();
        nl.tick(pose_frames(0.0, 0.0), 0.1);

        nl.handle_cmd(ConsoleCmd {
            console_ready: true,
            set_waypoint: Some("here".into()),
            ..Default::default()
        });
        nl.tick(pose_frames(0.0, 0.0), 0.2);

        let mut params = serde_json::Map::new();
        params.insert("waypoint".into(), "here".into());
        params.insert("hold_time_s".into(), 0.0.into());

        nl.handle_cmd(ConsoleCmd {
            console_ready: true,
            missions: Some(vec![MissionSpec {
                kind: MissionKind::Navigation,
                params,
            }]),
            ..Default::default()
        });
        assert_eq!(nl.planner().len(), 1);

        // Loaded but the vehicle is not started
        let tm = nl.tick(pose_frames(0.0, 0.0), 0.3).tm.unwrap();
        assert_eq!(tm.current_mission, "Navigation");

        nl.handle_cmd(started(true));
        let tm = nl.tick(pose_frames(0.0, 0.0), 0.4).tm.unwrap();
        assert_eq!(tm.current_mission, "None");
        assert_eq!(tm.last_outcome, Some(MissionOutcome::Succeeded));
    }

    #[test]
    fn test_locked_manual_override() {
        let mut nl = nav_loop();
        nl.handle_cmd(ConsoleCmd {
            manual_mode: true,
            manual_axes: Some(RawAxes {
                z: 1.0,
                ..Default::default()
            }),
            ..started(true)
        });

        let out = nl.tick(pose_frames(0.0, 0.0), 0.1);
        let duty = nl.duty_cycles();

        // Forward thrust on the vectored thrusters only
        assert!(duty[..4].iter().all(|d| d.abs() < 1e-9));
        assert!(duty[4..].iter().all(|d| d.abs() > 100.0));
        assert!(!out.board_cmds.is_empty());

        // Console goes quiet, the axes are zeroed
        nl.tick(pose_frames(0.0, 0.0), 3.0);
        assert!(nl.duty_cycles().iter().all(|d| d.abs() < 1e-9));
    }

    #[test]
    fn test_no_pose_is_neutral() {
        let mut nl = nav_loop();
        nl.handle_cmd(ConsoleCmd {
            manual_mode: true,
            manual_axes: Some(RawAxes {
                x: 1.0,
                ..Default::default()
            }),
            ..started(true)
        });

        nl.tick(vec![], 0.1);
        assert!(nl.duty_cycles().iter().all(|d| *d == 0.0));
    }

    #[test]
    fn test_kill_zeroes_all_thrusters() {
        let mut nl = nav_loop();
        nl.handle_cmd(ConsoleCmd {
            kill: true,
            ..Default::default()
        });
        assert!(nl.kill_requested());

        let cmds = nl.shutdown_cmds(0.1);
        let all: Vec<_> = cmds.values().flatten().collect();
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|c| c.magnitude == 0));

        // Forced again even though nothing changed
        assert_eq!(nl.shutdown_cmds(0.1).values().flatten().count(), 8);
    }

    #[test]
    fn test_stale_devices_reported() {
        let mut nl = nav_loop();
        nl.handle_cmd(started(true));

        let tm = nl.tick(pose_frames(0.0, 0.0), 0.1).tm.unwrap();
        assert_eq!(tm.stale_devices, vec!["Power".to_string()]);
        assert!(tm.orientation.is_some());
    }

    #[test]
    fn test_torpedo_fires_through_aux_board() {
        let mut nl = nav_loop();

        let mut params = serde_json::Map::new();
        params.insert("center_hold_s".into(), 0.0.into());
        params.insert("aim_hold_s".into(), 0.5.into());

        nl.handle_cmd(ConsoleCmd {
            missions: Some(vec![MissionSpec {
                kind: MissionKind::Torpedo,
                params,
            }]),
            image_proc: Some(ImageProcValues {
                frame_width: 300.0,
                frame_height: 300.0,
                torpedo: Some(TargetObs {
                    x: 150.0,
                    y: 150.0,
                    radius: 30.0,
                    angle_deg: 0.0,
                }),
                ..Default::default()
            }),
            ..started(true)
        });

        let aux_board = Recorder::default();
        let mut devices = Devices::default();
        devices.add(
            SerialReader::spawn(DeviceKind::Aux, Box::new(Cursor::new(Vec::new())), 1).unwrap(),
            Some(SerialWriter::new(DeviceKind::Aux, Box::new(aux_board.clone()))),
        );

        let mut actuations = Vec::new();
        for i in 1..=50 {
            let out = nl.tick(pose_frames(0.0, 0.0), i as f64 * 0.1);
            out.write(&mut devices);
            actuations.extend(out.actuations);
        }

        // Fired exactly once, then backed off and completed
        assert_eq!(actuations, vec![Actuation::FireTorpedo]);
        assert!(nl.planner().is_idle());
        assert_eq!(nl.last_outcome, Some(MissionOutcome::Succeeded));

        assert_eq!(
            *aux_board.0.lock().unwrap(),
            BoardFramer::encode(aux::CMD_MSG_TYPE, &[0x02]).unwrap()
        );

        devices.stop_readers();
    }
}
