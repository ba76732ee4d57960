//! # fswrap
//!
//! Small filesystem helpers: existence checks, directory listing, JSON file
//! reading and ZIP archive extraction.
//!
//! Extraction walks the archive one entry at a time. Directory markers are
//! skipped; every file's parent directories are created before it is
//! written. Errors name the entry that failed.
//!
//! ## Example
//!
//! ```no_run
//! use fswrap::FileSystem;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fs = FileSystem::new();
//!
//!     if fs.exists("bundle.zip") {
//!         let files = fs.extract_zip("bundle.zip", "out").await?;
//!         println!("extracted {files} files");
//!     }
//!
//!     for name in fs.read_directory("out")? {
//!         println!("{name}");
//!     }
//!
//!     let manifest: serde_json::Value = fs.read_json("out/manifest.json")?;
//!     println!("{manifest}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod fs;
pub mod io;
pub mod logging;
pub mod zip;

pub use cli::Cli;
pub use error::{ExtractError, ZipError};
pub use fs::FileSystem;
pub use io::{LocalFileReader, ReadAt};
pub use zip::{ZipExtractor, ZipFileEntry};
