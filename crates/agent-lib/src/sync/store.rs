//! Fitted model persistence
//!
//! Artifacts are written to a temporary sibling and renamed into place, so
//! a reader never observes a partially written model.

use crate::error::PersistenceError;
use crate::forecast::FittedModel;
use crate::models::Metric;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of a successful save
#[derive(Debug, Clone, PartialEq)]
pub struct StoredModel {
    pub path: PathBuf,
    pub bytes: usize,
    pub checksum: String,
}

/// Destination for fitted model artifacts
pub trait ModelStore: Send + Sync {
    fn save(&self, metric: Metric, model: &dyn FittedModel) -> Result<StoredModel, PersistenceError>;
}

/// Stores one model artifact at a fixed path
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn write_atomic(&self, contents: &[u8]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, e))?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(|e| Self::io_error(&temp_path, e))?;
        file.write_all(contents)
            .and_then(|_| file.sync_all())
            .map_err(|e| Self::io_error(&temp_path, e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| Self::io_error(&self.path, e))
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, metric: Metric, model: &dyn FittedModel) -> Result<StoredModel, PersistenceError> {
        let json = model.to_json()?;
        self.write_atomic(json.as_bytes())?;

        let stored = StoredModel {
            path: self.path.clone(),
            bytes: json.len(),
            checksum: compute_checksum(json.as_bytes()),
        };
        debug!(metric = %metric, path = %stored.path.display(), "Model artifact written");
        Ok(stored)
    }
}

/// SHA-256 of the artifact, hex encoded
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_checksum() {
        assert_eq!(
            compute_checksum(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
