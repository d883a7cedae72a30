//! Generic parameters functions
//!
//! All parameter documents are TOML files deserialised straight into typed structs. Nothing in a
//! parameter file is ever executed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{read_to_string, write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (SUB_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file {0:?}: {1}")]
    DeserialiseError(PathBuf, toml::de::Error),
}

/// An error that occurs while saving a parameter file.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Cannot serialise the parameters: {0}")]
    SerialiseError(toml::ser::Error),

    #[error("Cannot write the parameter file {0:?}: {1}")]
    FileWriteError(PathBuf, std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the full path to a parameter file.
///
/// The file path is relative to the `$SUB_SW_ROOT/params` directory
pub fn param_path(param_file_path: &str) -> Option<PathBuf> {
    let mut path = crate::host::get_sw_root().ok()?;
    path.push("params");
    path.push(param_file_path);
    Some(path)
}

/// Load a parameter file
///
/// The file path is relative to the `$SUB_SW_ROOT/params` directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let path = param_path(param_file_path).ok_or(LoadError::SwRootNotSet)?;
    load_path(path)
}

/// Load a parameter file from an explicit path.
pub fn load_path<P, A>(path: A) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    A: AsRef<Path>,
{
    let path = path.as_ref().to_path_buf();

    // Load the file into a string
    let params_str = match read_to_string(&path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(path, e)),
    };

    from_str(&params_str).map_err(|e| LoadError::DeserialiseError(path, e))
}

/// Parse a parameter document held in a string.
pub fn from_str<P>(params_str: &str) -> Result<P, toml::de::Error>
where
    P: DeserializeOwned,
{
    toml::from_str(params_str)
}

/// Save a parameter document to an explicit path, replacing the file.
pub fn save_path<P, A>(params: &P, path: A) -> Result<(), SaveError>
where
    P: Serialize,
    A: AsRef<Path>,
{
    let params_str = toml::to_string_pretty(params).map_err(SaveError::SerialiseError)?;

    write(path.as_ref(), params_str)
        .map_err(|e| SaveError::FileWriteError(path.as_ref().to_path_buf(), e))
}
