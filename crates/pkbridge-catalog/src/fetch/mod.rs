//! Retrieval of package archives for `download-packages`.

use std::fs;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;


/// A package archive could not be retrieved.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The distfile path has no file name to reuse in the target directory.
    #[error("distfile {distfile} has no file name")]
    MissingFileName {
        /// Offending distfile path.
        distfile: Utf8PathBuf,
    },
    /// The target directory does not exist.
    #[error("download directory {directory} does not exist")]
    MissingDirectory {
        /// Requested directory.
        directory: Utf8PathBuf,
    },
    /// Copying the archive failed.
    #[error("failed to copy {distfile} to {target}: {source}")]
    Copy {
        /// Archive being copied.
        distfile: Utf8PathBuf,
        /// Destination path.
        target: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Places a package archive into a download directory.
pub trait Fetcher {
    /// Fetches `distfile` into `directory` and returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the archive cannot be placed.
    fn fetch(&self, distfile: &Utf8Path, directory: &Utf8Path)
    -> Result<Utf8PathBuf, FetchError>;
}

/// Copies archives from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyFetcher;

impl Fetcher for CopyFetcher {
    fn fetch(
        &self,
        distfile: &Utf8Path,
        directory: &Utf8Path,
    ) -> Result<Utf8PathBuf, FetchError> {
        if !directory.is_dir() {
            return Err(FetchError::MissingDirectory {
                directory: directory.to_path_buf(),
            });
        }
        let Some(file_name) = distfile.file_name() else {
            return Err(FetchError::MissingFileName {
                distfile: distfile.to_path_buf(),
            });
        };
        let target = directory.join(file_name);
        fs::copy(distfile, &target).map_err(|source| FetchError::Copy {
            distfile: distfile.to_path_buf(),
            target: target.clone(),
            source: Arc::new(source),
        })?;
        Ok(target)
    }
}
