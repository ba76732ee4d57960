//! The `FileSystem` facade: small wrappers over the host filesystem.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ExtractError;
use crate::zip;

/// Stateless entry point for the filesystem helpers.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystem;

impl FileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Whether anything exists at `path`. Errors (e.g. permission denied)
    /// count as "does not exist".
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// Names of the entries in a directory, in the order the OS returns them.
    pub fn read_directory(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let entries = std::fs::read_dir(path)
            .with_context(|| format!("failed to read directory {}", path.display()))?;

        entries
            .map(|entry| {
                let entry =
                    entry.with_context(|| format!("failed to read directory {}", path.display()))?;
                Ok(entry.file_name().to_string_lossy().into_owned())
            })
            .collect()
    }

    /// Read a file and deserialize its JSON content.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let content = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("failed to parse JSON from {}", path.display()))
    }

    /// Extract the ZIP archive at `archive` into `output_dir`, creating
    /// parent directories as needed. Returns the number of files written.
    pub async fn extract_zip(
        &self,
        archive: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> std::result::Result<usize, ExtractError> {
        zip::extract(archive.as_ref(), output_dir.as_ref()).await
    }
}
