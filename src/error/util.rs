//! Utility functions for error handling
//!
//! Thin wrappers over filesystem calls that attach the path and purpose to
//! the error, so a failed run says which extract or artifact was involved.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.exists() {
        return Err(PipelineError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found, needed for: {purpose}"),
            ),
        ));
    }

    if !path.is_file() {
        return Err(PipelineError::io(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a file, expected a file for: {purpose}"),
            ),
        ));
    }

    fs::File::open(path).map_err(|e| PipelineError::io(path, e))
}

/// Read a whole file into memory
pub fn read_bytes(path: &Path, purpose: &str) -> Result<Vec<u8>> {
    let mut file = safe_open_file(path, purpose)?;
    let mut buffer = Vec::new();
    io::Read::read_to_end(&mut file, &mut buffer).map_err(|e| PipelineError::io(path, e))?;
    Ok(buffer)
}

/// Create a directory (and parents) if it does not exist yet
pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PipelineError::io(path, e))
}

/// Write a string to a file, replacing its contents
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }
    fs::write(path, contents).map_err(|e| PipelineError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reports_path() {
        let err = safe_open_file(Path::new("/definitely/not/here.csv"), "births extract")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("/definitely/not/here.csv"));
        assert!(message.contains("births extract"));
    }

    #[test]
    fn test_write_string_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        write_string(&path, "hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }
}
