use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result, ZipError};
use crate::io::{LocalFileReader, ReadAt};

use super::entry::{EntryReader, READ_CHUNK_SIZE};
use super::parser::{Entries, ZipParser};
use super::structures::ZipFileEntry;

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
    source: PathBuf,
}

/// Why copying an entry's content stopped.
enum CopyError {
    Read(ZipError),
    Write(io::Error),
}

impl ZipExtractor<LocalFileReader> {
    /// Open the archive at `path`.
    pub fn open(path: &Path) -> std::result::Result<Self, ExtractError> {
        let reader = LocalFileReader::new(path).map_err(|e| ExtractError::Open {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Ok(Self {
            parser: ZipParser::new(Arc::new(reader)),
            source: path.to_path_buf(),
        })
    }
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
            source: PathBuf::new(),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Lazy cursor over the archive's entries
    pub async fn entries(&self) -> Result<Entries> {
        self.parser.entries().await
    }

    /// Open a decompressing reader for one entry
    pub async fn open_entry(&self, entry: &ZipFileEntry) -> Result<EntryReader<'_, R>> {
        let data_offset = self.parser.get_data_offset(entry).await?;
        EntryReader::new(self.parser.reader().as_ref(), entry, data_offset)
    }

    /// Extract file data to memory
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        self.open_entry(entry).await?.read_to_end().await
    }

    /// Extract a file entry to `output_path`, creating its parent
    /// directories first. An existing file is truncated.
    pub async fn extract_to_file(
        &self,
        entry: &ZipFileEntry,
        output_path: &Path,
    ) -> std::result::Result<u64, ExtractError> {
        let mut reader = self
            .open_entry(entry)
            .await
            .map_err(|source| stream_error(entry, source))?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| ExtractError::CreateDir {
                        entry: entry.file_name.clone(),
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let write_error = |source| ExtractError::Write {
            entry: entry.file_name.clone(),
            path: output_path.to_path_buf(),
            source,
        };

        let mut file = fs::File::create(output_path).await.map_err(write_error)?;
        let written = match copy_entry(&mut reader, &mut file).await {
            Ok(n) => n,
            Err(CopyError::Read(source)) => return Err(stream_error(entry, source)),
            Err(CopyError::Write(source)) => return Err(write_error(source)),
        };

        debug!(entry = %entry.file_name, path = %output_path.display(), bytes = written, "extracted");
        Ok(written)
    }

    /// Extract file to stdout
    pub async fn extract_to_stdout(&self, entry: &ZipFileEntry) -> std::result::Result<u64, ExtractError> {
        let mut reader = self
            .open_entry(entry)
            .await
            .map_err(|source| stream_error(entry, source))?;

        let mut stdout = tokio::io::stdout();
        match copy_entry(&mut reader, &mut stdout).await {
            Ok(n) => Ok(n),
            Err(CopyError::Read(source)) => Err(stream_error(entry, source)),
            Err(CopyError::Write(source)) => Err(ExtractError::Write {
                entry: entry.file_name.clone(),
                path: PathBuf::from("-"),
                source,
            }),
        }
    }

    /// Extract every file entry under `output_dir`, one at a time in
    /// archive order. Returns the number of files written.
    ///
    /// Directory markers are skipped; directories come into existence as
    /// parents of the files below them. The first failure aborts the run
    /// and files already written are left in place.
    pub async fn extract_all(&self, output_dir: &Path) -> std::result::Result<usize, ExtractError> {
        let entries = self
            .entries()
            .await
            .map_err(|source| self.open_error(source))?;

        let mut files = 0;
        for entry in entries {
            let entry = entry.map_err(|source| self.open_error(source))?;

            if entry.is_directory {
                debug!(entry = %entry.file_name, "skipping directory marker");
                continue;
            }

            let Some(relative) = entry.relative_path() else {
                warn!(entry = %entry.file_name, "entry path climbs above the output directory");
                return Err(ExtractError::UnsafePath {
                    entry: entry.file_name,
                });
            };

            self.extract_to_file(&entry, &output_dir.join(relative)).await?;
            files += 1;
        }

        info!(
            archive = %self.source.display(),
            output = %output_dir.display(),
            files,
            "extraction complete"
        );
        Ok(files)
    }

    fn open_error(&self, source: ZipError) -> ExtractError {
        ExtractError::Open {
            path: self.source.clone(),
            source,
        }
    }
}

/// Extract the ZIP archive at `archive_path` into `output_dir`.
///
/// Returns the number of files written.
pub async fn extract(archive_path: &Path, output_dir: &Path) -> std::result::Result<usize, ExtractError> {
    ZipExtractor::open(archive_path)?.extract_all(output_dir).await
}

fn stream_error(entry: &ZipFileEntry, source: ZipError) -> ExtractError {
    ExtractError::Stream {
        entry: entry.file_name.clone(),
        source,
    }
}

async fn copy_entry<R, W>(reader: &mut EntryReader<'_, R>, out: &mut W) -> std::result::Result<u64, CopyError>
where
    R: ReadAt,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read_chunk(&mut buf).await.map_err(CopyError::Read)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).await.map_err(CopyError::Write)?;
        total += n as u64;
    }
    out.flush().await.map_err(CopyError::Write)?;
    Ok(total)
}
