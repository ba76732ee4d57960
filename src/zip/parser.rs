//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory into memory in one go
//! 4. Hand out entries one at a time through an [`Entries`] cursor
//! 5. For extraction, read each file's Local File Header and data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// ZIP64 extended information extra field id.
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Low-level ZIP file parser.
///
/// Generic over the reader type so tests can parse archives held in memory.
/// Typically used through [`ZipExtractor`](super::ZipExtractor) rather than
/// directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// for entry in parser.entries().await? {
///     let entry = entry?;
///     let offset = parser.get_data_offset(&entry).await?;
///     // Read file data from offset...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// Returns the record and its offset in the file.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Common case first: no archive comment, EOCD is the last 22 bytes.
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;

            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        if self.size < EndOfCentralDirectory::SIZE as u64 {
            return Err(ZipError::InvalidEocd);
        }

        // The EOCD sits before a comment of up to 64 KiB.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length must account for exactly the bytes left.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(ZipError::InvalidEocd)
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has fields saturated to 0xFFFF or
    /// 0xFFFFFFFF. The locator sits immediately before the regular EOCD.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or(ZipError::InvalidZip64)?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Locate and load the Central Directory, returning a cursor that
    /// yields one entry per call.
    ///
    /// The directory is fetched with a single read; entries are decoded
    /// lazily as the cursor advances.
    pub async fn entries(&self) -> Result<Entries> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        // Don't trust the sizes before allocating for them.
        let cd_end = cd_offset.checked_add(cd_size).ok_or(ZipError::InvalidEocd)?;
        if cd_end > self.size || total_entries.saturating_mul(CDFH_MIN_SIZE as u64) > cd_size {
            return Err(ZipError::InvalidEocd);
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        Ok(Entries {
            cursor: Cursor::new(cd_data),
            remaining: total_entries,
        })
    }

    /// List all entries in the archive.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.entries().await?.collect()
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header has variable-length fields (filename, extra
    /// field) that may differ from the Central Directory entry, so it has
    /// to be read to find where the data begins.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await
            .map_err(|_| ZipError::InvalidLocalHeader)?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ZipError::InvalidLocalHeader);
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset.saturating_add(entry.compressed_size) > self.size {
            return Err(ZipError::UnexpectedEof);
        }

        Ok(data_offset)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Lazy cursor over the Central Directory.
///
/// Yields entries in archive order. After the first error it yields
/// nothing more.
#[derive(Debug)]
pub struct Entries {
    cursor: Cursor<Vec<u8>>,
    remaining: u64,
}

impl Entries {
    /// Number of entries not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for Entries {
    type Item = Result<ZipFileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let parsed = parse_cdfh(&mut self.cursor).map_err(|e| match e {
            // A short read inside the in-memory directory means a truncated record.
            ZipError::Io(_) => ZipError::InvalidCentralHeader,
            other => other,
        });
        if parsed.is_err() {
            self.remaining = 0;
        }
        Some(parsed)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (0, Some(n))
    }
}

/// Parse a Central Directory File Header from a cursor.
fn parse_cdfh(cursor: &mut Cursor<Vec<u8>>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(ZipError::InvalidCentralHeader);
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();
    let is_directory = is_directory_name(&file_name);

    let extra_field_end = cursor.position() + extra_field_length as u64;
    if extra_field_end > cursor.get_ref().len() as u64 {
        return Err(ZipError::InvalidCentralHeader);
    }

    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        let field_end = (cursor.position() + field_size as u64).min(extra_field_end);

        if header_id == ZIP64_EXTRA_ID {
            // Only the saturated header fields are present, in this order.
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end);
    }

    cursor.set_position(extra_field_end + file_comment_length as u64);

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        last_mod_time,
        last_mod_date,
        is_directory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_archive(comment: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.add_directory("sub/", options).unwrap();
        writer.start_file("a.txt", options).unwrap();
        writer.write_all(b"hi").unwrap();
        writer.start_file("sub/b.txt", options).unwrap();
        writer.write_all(b"bye").unwrap();
        writer.set_comment(comment);
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn entries_come_out_in_archive_order() {
        let parser = ZipParser::new(Arc::new(build_archive("")));
        let mut entries = parser.entries().await.unwrap();
        assert_eq!(entries.remaining(), 3);

        let first = entries.next().unwrap().unwrap();
        assert_eq!(first.file_name, "sub/");
        assert!(first.is_directory);
        assert_eq!(entries.remaining(), 2);

        let names: Vec<_> = entries.map(|e| e.unwrap().file_name).collect();
        assert_eq!(names, ["a.txt", "sub/b.txt"]);
    }

    #[tokio::test]
    async fn finds_eocd_behind_comment() {
        let parser = ZipParser::new(Arc::new(build_archive("some archive comment")));
        let files = parser.list_files().await.unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[2].uncompressed_size, 3);
    }

    #[tokio::test]
    async fn data_offset_points_at_content() {
        let data = build_archive("");
        let parser = ZipParser::new(Arc::new(data.clone()));
        let files = parser.list_files().await.unwrap();
        let a = files.iter().find(|e| e.file_name == "a.txt").unwrap();

        let offset = parser.get_data_offset(a).await.unwrap() as usize;
        assert_eq!(&data[offset..offset + 2], b"hi");
    }

    #[tokio::test]
    async fn garbage_is_not_a_zip() {
        let parser = ZipParser::new(Arc::new(vec![0x42u8; 512]));
        assert!(matches!(parser.entries().await, Err(ZipError::InvalidEocd)));
    }

    #[tokio::test]
    async fn tiny_input_is_not_a_zip() {
        let parser = ZipParser::new(Arc::new(b"PK".to_vec()));
        assert!(matches!(parser.entries().await, Err(ZipError::InvalidEocd)));
    }

    #[tokio::test]
    async fn corrupt_central_header_stops_the_cursor() {
        let mut data = build_archive("");

        // Break the signature of the second central directory record.
        let second_cdfh = data
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == CDFH_SIGNATURE)
            .map(|(i, _)| i)
            .nth(1)
            .unwrap();
        data[second_cdfh] = b'X';

        let parser = ZipParser::new(Arc::new(data));
        let mut entries = parser.entries().await.unwrap();
        assert!(entries.next().unwrap().is_ok());
        assert!(matches!(
            entries.next(),
            Some(Err(ZipError::InvalidCentralHeader))
        ));
        assert!(entries.next().is_none());
    }

    /// One central directory record whose sizes and offset are saturated
    /// and carried in a ZIP64 extra field, followed by a plain EOCD.
    fn zip64_central_directory() -> Vec<u8> {
        let name = b"huge.bin";
        let mut extra = Vec::new();
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&24u16.to_le_bytes());
        extra.extend_from_slice(&0x1_2345_6789u64.to_le_bytes()); // uncompressed
        extra.extend_from_slice(&0x1_0000_0000u64.to_le_bytes()); // compressed
        extra.extend_from_slice(&0x2_0000_0000u64.to_le_bytes()); // local header offset

        let mut cd = Vec::from(CDFH_SIGNATURE);
        cd.extend_from_slice(&45u16.to_le_bytes()); // version made by
        cd.extend_from_slice(&45u16.to_le_bytes()); // version needed
        cd.extend_from_slice(&0u16.to_le_bytes()); // flags
        cd.extend_from_slice(&8u16.to_le_bytes()); // deflate
        cd.extend_from_slice(&0u16.to_le_bytes()); // time
        cd.extend_from_slice(&0u16.to_le_bytes()); // date
        cd.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        cd.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        cd.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        cd.extend_from_slice(&(name.len() as u16).to_le_bytes());
        cd.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        cd.extend_from_slice(&0u16.to_le_bytes()); // comment
        cd.extend_from_slice(&0u16.to_le_bytes()); // disk start
        cd.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        cd.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        cd.extend_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        cd.extend_from_slice(name);
        cd.extend_from_slice(&extra);

        let mut data = cd.clone();
        data.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&(cd.len() as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data
    }

    #[tokio::test]
    async fn zip64_extra_field_replaces_saturated_values() {
        let parser = ZipParser::new(Arc::new(zip64_central_directory()));
        let entry = parser.list_files().await.unwrap().remove(0);

        assert_eq!(entry.file_name, "huge.bin");
        assert_eq!(entry.compression_method, CompressionMethod::Deflate);
        assert_eq!(entry.crc32, 0xDEADBEEF);
        assert_eq!(entry.uncompressed_size, 0x1_2345_6789);
        assert_eq!(entry.compressed_size, 0x1_0000_0000);
        assert_eq!(entry.lfh_offset, 0x2_0000_0000);
        assert!(!entry.is_directory);
    }
}
