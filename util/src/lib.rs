//! # Utility library
//!
//! Support shared by the vehicle executables: sessions and logging, parameter files, CSV archives
//! and small maths and time helpers.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// CSV archiving of per-cycle records
pub mod archive;

/// Information about the machine the software runs on
pub mod host;

/// `fern` logger setup
pub mod logger;

pub mod maths;

/// Loading and saving of TOML parameter files
pub mod params;

/// Per-run session directories and the session clock
pub mod session;

pub mod time;
