//! Main entry point for the fswrap CLI application.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;

use fswrap::cli::Command;
use fswrap::{Cli, FileSystem, ZipExtractor, logging};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.log_level());

    let fs = FileSystem::new();

    match cli.command {
        Command::Exists { path } => {
            let exists = fs.exists(&path);
            println!("{exists}");
            if !exists {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Ls { dir } => {
            for name in fs.read_directory(&dir)? {
                println!("{name}");
            }
        }
        Command::Json { file } => {
            let value: serde_json::Value = fs.read_json(&file)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Unzip {
            archive,
            extract_dir,
            list,
            verbose,
            pipe,
        } => {
            let archive = Path::new(&archive);
            if list || verbose {
                list_files(archive, verbose).await?;
            } else if pipe {
                pipe_files(archive).await?;
            } else {
                fs.extract_zip(archive, &extract_dir).await?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// List entries in the archive.
///
/// Plain mode prints one name per line. Verbose mode prints a table with
/// sizes, compression ratio and timestamps, followed by a totals line.
async fn list_files(archive: &Path, verbose: bool) -> Result<()> {
    let extractor = ZipExtractor::open(archive)?;

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in extractor.entries().await? {
        let entry = entry?;
        if !verbose {
            println!("{}", entry.file_name);
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Space saved by compression, as a right-aligned percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 || compressed >= uncompressed {
        return "  0%".to_string();
    }
    format!("{:>4}%", 100 - compressed * 100 / uncompressed)
}

/// Write the content of every file entry to stdout, in archive order.
async fn pipe_files(archive: &Path) -> Result<()> {
    let extractor = ZipExtractor::open(archive)?;
    for entry in extractor.entries().await? {
        let entry = entry?;
        if entry.is_directory {
            continue;
        }
        extractor.extract_to_stdout(&entry).await?;
    }
    Ok(())
}
