//! ZIP archive parsing and extraction.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (EOCD, ZIP64 EOCD, header constants) and [`ZipFileEntry`]
//! - [`parser`]: locates the central directory and yields entries lazily
//! - [`entry`]: per-entry streaming reader with DEFLATE and CRC-32 checking
//! - [`extractor`]: writes entries to disk, one at a time in archive order
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first (from the end of the file), then the Central
//! Directory, so entries can be enumerated without scanning the data.
//!
//! ## Limitations
//!
//! - Only STORED and DEFLATE compression
//! - No encryption support
//! - No multi-disk archive support

pub mod entry;
pub mod extractor;
pub mod parser;
pub mod structures;

pub use entry::EntryReader;
pub use extractor::{ZipExtractor, extract};
pub use parser::{Entries, ZipParser};
pub use structures::*;
