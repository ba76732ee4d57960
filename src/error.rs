//! Error types for archive reading and extraction.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias over [`ZipError`].
pub type Result<T> = std::result::Result<T, ZipError>;

/// Problems with the archive itself or with reading it.
#[derive(Debug, Error)]
pub enum ZipError {
    #[error("I/O error while reading archive: {0}")]
    Io(#[from] io::Error),

    #[error("not a valid ZIP file (end of central directory not found)")]
    InvalidEocd,

    #[error("invalid ZIP64 end of central directory")]
    InvalidZip64,

    #[error("invalid central directory file header")]
    InvalidCentralHeader,

    #[error("invalid local file header")]
    InvalidLocalHeader,

    #[error("unsupported compression method: {0} (only STORED and DEFLATE are supported)")]
    UnsupportedCompression(u16),

    #[error("corrupt deflate stream: {0}")]
    Inflate(String),

    #[error("CRC-32 mismatch (expected {expected:#010x}, got {actual:#010x})")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("archive ended before the entry data was complete")]
    UnexpectedEof,
}

/// Failures of a whole-archive extraction.
///
/// Every variant that happens while handling a specific entry carries the
/// entry's name so the caller can tell which one broke.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to open archive {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("failed to read entry '{entry}'")]
    Stream {
        entry: String,
        #[source]
        source: ZipError,
    },

    #[error("failed to create directory {} for entry '{entry}'", .path.display())]
    CreateDir {
        entry: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write entry '{entry}' to {}", .path.display())]
    Write {
        entry: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to extract entry '{entry}': path climbs above the output directory")]
    UnsafePath { entry: String },
}

impl ExtractError {
    /// Name of the entry being processed when the error happened, if any.
    pub fn entry(&self) -> Option<&str> {
        match self {
            ExtractError::Open { .. } => None,
            ExtractError::Stream { entry, .. }
            | ExtractError::CreateDir { entry, .. }
            | ExtractError::Write { entry, .. }
            | ExtractError::UnsafePath { entry } => Some(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_names_entry() {
        let err = ExtractError::Stream {
            entry: "sub/b.txt".to_string(),
            source: ZipError::UnsupportedCompression(12),
        };
        assert_eq!(err.entry(), Some("sub/b.txt"));
        assert_eq!(err.to_string(), "failed to read entry 'sub/b.txt'");
    }

    #[test]
    fn open_error_has_no_entry() {
        let err = ExtractError::Open {
            path: PathBuf::from("missing.zip"),
            source: ZipError::InvalidEocd,
        };
        assert!(err.entry().is_none());
        assert!(err.to_string().contains("missing.zip"));
    }
}
