//! Session management
//!
//! A session is one run of an executable. It owns a directory under the software root holding the
//! log file, the CSV archives and a copy of the parameter files the run was started with, so a
//! dive can be reviewed with exactly the configuration it used.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Time the session was created, the zero of every session time.
static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the timestamp in session directory names, see `chrono::format::strftime`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the directory inside the session holding copies of the parameter files.
const PARAMS_DIR: &str = "params";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Directories and files belonging to the current session.
#[derive(Clone, Debug)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The software root environment variable (SUB_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started by this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("The session epoch has not been set")]
    CannotGetEpoch,

    #[error("Cannot copy {0:?} into the session: {1}")]
    CannotCopyFile(PathBuf, std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory of the software root.
    ///
    /// The session directory is named `{exec_name}_{timestamp}`. Only one session may be started
    /// per process, as it fixes the epoch used by [`get_elapsed_seconds`].
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        let timestamp = epoch()
            .ok_or(SessionError::CannotGetEpoch)?
            .format(TIMESTAMP_FORMAT);

        let root = crate::host::get_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        Self::create(
            root.join(sessions_dir)
                .join(format!("{}_{}", exec_name, timestamp)),
            exec_name,
        )
    }

    /// Copy files, usually the parameter files loaded at startup, into the session.
    pub fn snapshot_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<(), SessionError> {
        let dir = self.session_root.join(PARAMS_DIR);
        fs::create_dir_all(&dir).map_err(SessionError::CannotCreateDir)?;

        for path in paths.iter().map(|p| p.as_ref()) {
            // A file which doesn't exist yet (an empty waypoint store) has nothing to record
            if !path.exists() {
                continue;
            }

            let name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("unnamed"));

            fs::copy(path, dir.join(name))
                .map_err(|e| SessionError::CannotCopyFile(path.to_path_buf(), e))?;
        }

        Ok(())
    }

    fn create(session_root: PathBuf, exec_name: &str) -> Result<Self, SessionError> {
        let arch_root = session_root.join("arch");
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            arch_root,
            session_root,
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// Returns `NAN` if no session has been started yet.
pub fn get_elapsed_seconds() -> f64 {
    match epoch() {
        Some(e) => time::duration_to_seconds(Utc::now() - *e).unwrap_or(std::f64::NAN),
        None => std::f64::NAN,
    }
}

/// The session's epoch, if a session has been started.
pub fn epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_snapshot_files() {
        let root = std::env::temp_dir().join(format!("session_test_{}", std::process::id()));
        let session = Session::create(root.clone(), "test_exec").unwrap();

        assert!(session.arch_root.is_dir());
        assert_eq!(session.log_file_path, root.join("test_exec.log"));

        let src = root.join("gains.toml");
        fs::write(&src, "k_p = 1.0\n").unwrap();

        session
            .snapshot_files(&[src.clone(), root.join("missing.toml")])
            .unwrap();

        let copied = fs::read_to_string(root.join(PARAMS_DIR).join("gains.toml")).unwrap();
        assert_eq!(copied, "k_p = 1.0\n");
        assert!(!root.join(PARAMS_DIR).join("missing.toml").exists());

        fs::remove_dir_all(root).ok();
    }
}
