//! Streaming access to a single entry's content.

use flate2::{Crc, Decompress, FlushDecompress, Status};

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::structures::{CompressionMethod, ZipFileEntry};

/// Size of each compressed read from the underlying source.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Decompressing reader over one entry's data.
///
/// Pulls compressed bytes from the archive in [`READ_CHUNK_SIZE`] pieces,
/// so memory stays bounded regardless of entry size. The CRC-32 and the
/// uncompressed size are checked when the stream reaches its end.
pub struct EntryReader<'a, R: ReadAt> {
    reader: &'a R,
    offset: u64,
    compressed_left: u64,
    inflater: Option<Decompress>,
    inflate_done: bool,
    in_buf: Vec<u8>,
    in_pos: usize,
    crc: Crc,
    produced: u64,
    expected_crc: u32,
    expected_size: u64,
    finished: bool,
}

impl<'a, R: ReadAt> EntryReader<'a, R> {
    /// Open a reader for `entry`, whose data begins at `data_offset`.
    ///
    /// Fails for compression methods other than STORED and DEFLATE.
    pub fn new(reader: &'a R, entry: &ZipFileEntry, data_offset: u64) -> Result<Self> {
        let inflater = match entry.compression_method {
            CompressionMethod::Stored => None,
            // Raw deflate, no zlib header
            CompressionMethod::Deflate => Some(Decompress::new(false)),
            CompressionMethod::Unknown(method) => {
                return Err(ZipError::UnsupportedCompression(method));
            }
        };

        Ok(Self {
            reader,
            offset: data_offset,
            compressed_left: entry.compressed_size,
            inflater,
            inflate_done: false,
            in_buf: Vec::new(),
            in_pos: 0,
            crc: Crc::new(),
            produced: 0,
            expected_crc: entry.crc32,
            expected_size: entry.uncompressed_size,
            finished: false,
        })
    }

    /// Read the next piece of decompressed data into `out`.
    ///
    /// Returns `Ok(0)` once the entry is exhausted and verified.
    pub async fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.finished || out.is_empty() {
            return Ok(0);
        }

        let n = if self.inflater.is_some() {
            self.read_deflated(out).await?
        } else {
            self.read_stored(out).await?
        };

        if n == 0 {
            self.finish()?;
        } else {
            self.crc.update(&out[..n]);
            self.produced += n as u64;
        }
        Ok(n)
    }

    /// Read the whole entry into memory.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.expected_size.min(READ_CHUNK_SIZE as u64) as usize);
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = self.read_chunk(&mut buf).await?;
            if n == 0 {
                return Ok(data);
            }
            data.extend_from_slice(&buf[..n]);
        }
    }

    async fn read_stored(&mut self, out: &mut [u8]) -> Result<usize> {
        let len = (out.len() as u64).min(self.compressed_left) as usize;
        if len == 0 {
            return Ok(0);
        }
        self.reader.read_exact_at(self.offset, &mut out[..len]).await?;
        self.offset += len as u64;
        self.compressed_left -= len as u64;
        Ok(len)
    }

    async fn read_deflated(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.inflate_done || (self.in_buf.is_empty() && self.compressed_left == 0) {
            return Ok(0);
        }
        loop {
            if self.in_pos == self.in_buf.len() && self.compressed_left > 0 {
                self.refill().await?;
            }

            let input = &self.in_buf[self.in_pos..];
            let Some(inflater) = self.inflater.as_mut() else {
                return Ok(0);
            };

            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            // Never Finish: it demands the whole output fit in `out`.
            let status = inflater
                .decompress(input, out, FlushDecompress::None)
                .map_err(|e| ZipError::Inflate(e.to_string()))?;
            let consumed = (inflater.total_in() - before_in) as usize;
            let written = (inflater.total_out() - before_out) as usize;
            self.in_pos += consumed;
            if status == Status::StreamEnd {
                self.inflate_done = true;
            }

            if written > 0 {
                return Ok(written);
            }
            if self.inflate_done {
                return Ok(0);
            }
            if consumed == 0 && self.in_pos == self.in_buf.len() && self.compressed_left == 0 {
                return Err(ZipError::UnexpectedEof);
            }
        }
    }

    async fn refill(&mut self) -> Result<()> {
        let len = self.compressed_left.min(READ_CHUNK_SIZE as u64) as usize;
        self.in_buf.resize(len, 0);
        self.reader.read_exact_at(self.offset, &mut self.in_buf).await?;
        self.offset += len as u64;
        self.compressed_left -= len as u64;
        self.in_pos = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        if self.produced != self.expected_size {
            return Err(ZipError::UnexpectedEof);
        }
        let actual = self.crc.sum();
        if actual != self.expected_crc {
            return Err(ZipError::CrcMismatch {
                expected: self.expected_crc,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipParser;
    use std::io::{Cursor, Write};
    use std::sync::Arc;
    use zip::write::SimpleFileOptions;

    fn single_entry(method: zip::CompressionMethod, data: &[u8]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(method);
        writer.start_file("data.bin", options).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap().into_inner()
    }

    async fn read_only_entry(archive: Vec<u8>) -> Result<Vec<u8>> {
        let parser = ZipParser::new(Arc::new(archive));
        let entry = parser.list_files().await?.remove(0);
        let offset = parser.get_data_offset(&entry).await?;
        let reader = parser.reader().clone();
        EntryReader::new(&*reader, &entry, offset)?.read_to_end().await
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 ^ (i / 7) as u8).collect()
    }

    #[tokio::test]
    async fn stored_entry() {
        let data = sample(1000);
        let archive = single_entry(zip::CompressionMethod::Stored, &data);
        assert_eq!(read_only_entry(archive).await.unwrap(), data);
    }

    #[tokio::test]
    async fn deflated_entry_spanning_several_chunks() {
        let data = sample(3 * READ_CHUNK_SIZE + 17);
        let archive = single_entry(zip::CompressionMethod::Deflated, &data);
        assert_eq!(read_only_entry(archive).await.unwrap(), data);
    }

    #[tokio::test]
    async fn empty_deflated_entry() {
        let archive = single_entry(zip::CompressionMethod::Deflated, b"");
        assert!(read_only_entry(archive).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn crc_mismatch_is_reported() {
        let mut archive = single_entry(zip::CompressionMethod::Stored, b"hello");
        let pos = archive.windows(5).position(|w| w == b"hello").unwrap();
        archive[pos] = b'j';

        let err = read_only_entry(archive).await.unwrap_err();
        assert!(matches!(err, ZipError::CrcMismatch { .. }));
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let archive = single_entry(zip::CompressionMethod::Stored, b"x");
        let parser = ZipParser::new(Arc::new(archive));
        let mut entry = parser.list_files().await.unwrap().remove(0);
        entry.compression_method = CompressionMethod::Unknown(12);

        let reader = parser.reader().clone();
        let err = EntryReader::new(&*reader, &entry, 0).err().unwrap();
        assert!(matches!(err, ZipError::UnsupportedCompression(12)));
    }
}
