use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fswrap")]
#[command(version)]
#[command(about = "Small filesystem helpers: exists, ls, json, unzip", long_about = None)]
#[command(after_help = "Examples:\n  \
  fswrap exists ./config.json        exit status 0 if the path exists\n  \
  fswrap json package.json           pretty-print a JSON file\n  \
  fswrap unzip data.zip -d out       extract data.zip into out/")]
pub struct Cli {
    /// Only log warnings and errors (RUST_LOG overrides)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether a path exists
    Exists {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// List the entries of a directory
    Ls {
        #[arg(value_name = "DIR")]
        dir: String,
    },

    /// Read and pretty-print a JSON file
    Json {
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Extract a ZIP archive
    Unzip {
        /// ZIP file path
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        extract_dir: String,

        /// List entries instead of extracting
        #[arg(short = 'l', conflicts_with = "pipe")]
        list: bool,

        /// List verbosely (sizes, ratio, timestamps)
        #[arg(short = 'v', conflicts_with = "pipe")]
        verbose: bool,

        /// Extract files to stdout
        #[arg(short = 'p')]
        pipe: bool,
    },
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.quiet { "warn" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unzip_defaults_to_current_dir() {
        let cli = Cli::parse_from(["fswrap", "unzip", "a.zip"]);
        match &cli.command {
            Command::Unzip {
                archive,
                extract_dir,
                list,
                verbose,
                pipe,
            } => {
                assert_eq!(archive, "a.zip");
                assert_eq!(extract_dir, ".");
                assert!(!*list && !*verbose && !*pipe);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn quiet_is_global() {
        let cli = Cli::parse_from(["fswrap", "ls", "/tmp", "-q"]);
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn list_and_pipe_conflict() {
        assert!(Cli::try_parse_from(["fswrap", "unzip", "a.zip", "-l", "-p"]).is_err());
    }
}
