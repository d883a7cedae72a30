//! CSV archives
//!
//! One file per archived stream, one row per record. Rows are appended and flushed as they are
//! written, so an archive survives the process being killed mid dive.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Writer of one CSV archive.
///
/// A default archiver has no file attached and discards records, so the owner can archive every
/// cycle whether or not archiving was enabled.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("Could not serialise the record: {0}")]
    SerialiseError(csv::Error),

    #[error("Could not flush the archive: {0}")]
    FlushError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Open an archive at `path`, relative to the session's archive directory.
    pub fn from_path<P: AsRef<Path>>(session: &Session, path: P) -> Result<Self, ArchiveError> {
        Self::create(session.arch_root.join(path))
    }

    /// Open an archive at an explicit path, creating the parent directories.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ArchiveError::CreateError)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(ArchiveError::CreateError)?;

        Ok(Self {
            writer: Some(WriterBuilder::new().has_headers(true).from_writer(file)),
        })
    }

    /// Returns true if this archiver is attached to a file.
    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }

    /// Append one record.
    ///
    /// Records must be flat, CSV has no way to represent nested structs or sequences.
    pub fn serialise<T: Serialize>(&mut self, record: &T) -> Result<(), ArchiveError> {
        if let Some(ref mut w) = self.writer {
            w.serialize(record).map_err(ArchiveError::SerialiseError)?;
            w.flush().map_err(ArchiveError::FlushError)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        time_s: f64,
        depth_ft: f64,
    }

    #[test]
    fn test_archive_rows() {
        let dir = std::env::temp_dir().join(format!("archive_test_{}", std::process::id()));
        let path = dir.join("nested").join("rows.csv");

        let mut archiver = Archiver::create(&path).unwrap();
        assert!(archiver.is_active());

        archiver
            .serialise(&Row {
                time_s: 0.1,
                depth_ft: 2.5,
            })
            .unwrap();
        archiver
            .serialise(&Row {
                time_s: 0.2,
                depth_ft: 3.0,
            })
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["time_s,depth_ft", "0.1,2.5", "0.2,3.0"]);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_default_discards() {
        let mut archiver = Archiver::default();
        assert!(!archiver.is_active());
        assert!(archiver
            .serialise(&Row {
                time_s: 0.0,
                depth_ft: 0.0
            })
            .is_ok());
    }
}
