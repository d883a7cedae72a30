//! # Sub library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the sub crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Console link - sends telemetry to and receives commands from the operator console
pub mod console_link;

/// Global data store - aggregate state of the vehicle rebuilt every cycle
pub mod data_store;

/// Sensor fusion - combines the redundant orientation sensors
pub mod fusion;

/// Mission planner - sequences the operator's missions into one running behaviour
pub mod mission;

/// Movement control module - converts desired poses and operator demands into thruster duty
/// cycles
pub mod move_ctrl;

/// Navigation loop - one cycle of the control process
pub mod nav_loop;

/// Executable parameters
pub mod params;

/// Serial device links - background readers and command writers
pub mod serial;

/// Waypoint store - labelled poses recorded by the operator
pub mod waypoints;
