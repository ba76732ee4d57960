mod local;

pub use local::LocalFileReader;

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer, returning the
    /// number of bytes read. A short read is only allowed at end of data.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill `buf` completely from `offset`, failing with
    /// [`io::ErrorKind::UnexpectedEof`] if the source is too short.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("expected {} bytes at offset {}, got {}", buf.len(), offset, filled),
                ));
            }
            filled += n;
        }
        Ok(())
    }
}

#[async_trait]
impl ReadAt for Vec<u8> {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_exact_at_fills_buffer() {
        let data: Vec<u8> = (0u8..32).collect();
        let mut buf = [0u8; 4];
        data.read_exact_at(10, &mut buf).await.unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);
    }

    #[tokio::test]
    async fn read_exact_at_past_end_is_eof() {
        let data = vec![1u8, 2, 3];
        let mut buf = [0u8; 4];
        let err = data.read_exact_at(1, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn read_at_offset_beyond_end_reads_nothing() {
        let data = vec![1u8, 2, 3];
        let mut buf = [0u8; 2];
        assert_eq!(data.read_at(100, &mut buf).await.unwrap(), 0);
    }
}
