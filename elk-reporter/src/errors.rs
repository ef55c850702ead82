// Copyright (c) The elk-reporter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by elk-reporter.
//!
//! Reporting itself is best-effort and never surfaces transport failures as
//! errors; the types here cover the seams where a failure does concern the
//! caller.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// An error that occurred while writing slice manifest files.
#[derive(Debug, Error)]
#[error("error writing slice manifest at `{path}`")]
pub struct SliceFileError {
    path: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl SliceFileError {
    pub(crate) fn new(path: impl AsRef<Utf8Path>, error: std::io::Error) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            error,
        }
    }

    /// The path that failed.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_file_error_display_names_the_path() {
        let error = SliceFileError::new(
            Utf8Path::new("/tmp/slices/include_000.txt"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            error.to_string(),
            "error writing slice manifest at `/tmp/slices/include_000.txt`"
        );
        assert_eq!(error.path().as_str(), "/tmp/slices/include_000.txt");
    }
}
