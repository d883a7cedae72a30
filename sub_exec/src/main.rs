//! Main vehicle-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Open the serial devices, each read by its own background thread
//!     - Main loop:
//!         - Drain the frames received from every device
//!         - Run one `NavLoop` cycle:
//!             - Sensor aggregation and fusion
//!             - Safety checks
//!             - Gain sync
//!             - Manual control or mission processing
//!             - Thruster bus rate limiting
//!             - Archiving
//!         - Write thruster, power and actuation commands to the boards
//!         - Send telemetry to the console
//!         - Wait for the console's next command
//!     - Shutdown: stop the readers, zero every thruster, cut dirty power

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{error, info, trace, warn};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use comms_if::{eqpt::DeviceKind, gains::ControlGains};
use sub_lib::{
    console_link::{ConsoleLink, ConsoleLinkError},
    mission::MissionParams,
    move_ctrl::{MoveCtrlParams, VehicleParams},
    nav_loop::{write_board_cmds, write_power, NavLoop},
    params::SubExecParams,
    serial::Devices,
    waypoints::WaypointStore,
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive cycle overruns after which an error is logged.
const CYCLE_OVERRUN_ERROR_LIMIT: u64 = 50;

/// Parameter files recorded in the session directory at startup.
const PARAM_FILES: [&str; 6] = [
    "sub_exec.toml",
    "vehicle.toml",
    "move_ctrl.toml",
    "gains.toml",
    "mission.toml",
    "waypoints.toml",
];

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "sub_exec", about = "Vehicle motion control core")]
struct Opt {
    /// Minimum level of the log (info, debug or trace)
    #[structopt(short, long, default_value = "debug")]
    log_level: LevelFilter,

    /// Run without opening any serial device
    #[structopt(long)]
    no_devices: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("sub_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Sub Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: SubExecParams =
        util::params::load("sub_exec.toml").wrap_err("Could not load exec params")?;
    if !exec_params.are_valid() {
        return Err(eyre!("The exec params are invalid"));
    }

    let vehicle_params: VehicleParams =
        util::params::load("vehicle.toml").wrap_err("Could not load vehicle params")?;
    let move_ctrl_params: MoveCtrlParams =
        util::params::load("move_ctrl.toml").wrap_err("Could not load movement control params")?;
    let gains: ControlGains =
        util::params::load("gains.toml").wrap_err("Could not load controller gains")?;
    let mission_params: MissionParams =
        util::params::load("mission.toml").wrap_err("Could not load mission params")?;

    let waypoints_path = util::params::param_path("waypoints.toml")
        .ok_or_else(|| eyre!("Cannot find the waypoint file, is SUB_SW_ROOT set?"))?;
    let waypoints = WaypointStore::load(waypoints_path).wrap_err("Could not load waypoints")?;

    info!(
        "Exec parameters loaded, {} thrusters and {} waypoints",
        vehicle_params.thrusters.len(),
        waypoints.len()
    );

    let snapshot: Vec<_> = PARAM_FILES
        .iter()
        .filter_map(|f| util::params::param_path(f))
        .collect();
    if let Err(e) = session.snapshot_files(&snapshot) {
        warn!("Could not copy the parameters into the session: {}", e);
    }

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let device_kinds = exec_params.serial.devices.iter().map(|d| d.kind).collect();

    let mut nav_loop = NavLoop::new(
        exec_params.nav_loop.clone(),
        vehicle_params,
        move_ctrl_params,
        gains,
        mission_params,
        waypoints,
        device_kinds,
    )
    .wrap_err("Failed to initialise the NavLoop")?;

    if exec_params.archive {
        nav_loop.set_archiver(
            Archiver::from_path(&session, "nav_loop.csv")
                .wrap_err("Failed to create the NavLoop archive")?,
        );
        info!("Archiving enabled");
    }

    info!("Module initialisation complete\n");

    // ---- INITIALISE DEVICES ----

    let mut devices = if opt.no_devices {
        warn!("Running without serial devices");
        Devices::default()
    } else {
        let d = Devices::open(&exec_params.serial).wrap_err("Failed to open the serial devices")?;
        info!("Serial devices open");
        d
    };

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let console = ConsoleLink::new(&zmq_ctx, &exec_params.net)
        .wrap_err("Failed to initialise the ConsoleLink")?;
    info!("ConsoleLink initialised");

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.nav_loop.cycle_period_s);
    let mut stopped_readers: Vec<DeviceKind> = Vec::new();
    let mut console_connected = false;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();
        let time_s = session::get_elapsed_seconds();

        // ---- DATA INPUT ----

        let frames = devices.drain_all();

        for device in devices.stopped_readers() {
            if !stopped_readers.contains(&device) {
                error!("The {} reader has stopped", device);
                stopped_readers.push(device);
            }
        }

        // ---- PROCESSING ----

        let output = nav_loop.tick(frames, time_s);

        // ---- EQUIPMENT OUTPUT ----

        output.write(&mut devices);

        // ---- TELEMETRY ----

        if console.is_connected() != console_connected {
            console_connected = !console_connected;
            match console_connected {
                true => info!("Console connected"),
                false => warn!("Console disconnected"),
            }
        }

        if let Some(ref tm) = output.tm {
            match console.send_tm(tm) {
                Ok(()) => (),
                Err(ConsoleLinkError::NotConnected) => trace!("Console not connected"),
                Err(e) => warn!("Could not send telemetry: {}", e),
            }
        }

        // ---- CONSOLE COMMANDS ----

        match console.recv_cmd() {
            Ok(Some(cmd)) => nav_loop.handle_cmd(cmd),
            Ok(None) => (),
            Err(e) => warn!("Could not receive console command: {}", e),
        }

        if nav_loop.kill_requested() {
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;
        let ds = nav_loop.data_store_mut();

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;

                if ds.num_consec_cycle_overruns == CYCLE_OVERRUN_ERROR_LIMIT {
                    error!(
                        "{} consecutive cycle overruns, the cycle period is too short",
                        CYCLE_OVERRUN_ERROR_LIMIT
                    );
                }
            }
        }
    }

    // ---- SHUTDOWN ----

    info!("Shutting down");

    devices.stop_readers();

    let shutdown_cmds = nav_loop.shutdown_cmds(session::get_elapsed_seconds());
    write_board_cmds(&mut devices, &shutdown_cmds);
    info!("Thrusters zeroed");

    write_power(&mut devices, false);
    info!("Dirty power de-energised");

    info!("End of execution");

    Ok(())
}
