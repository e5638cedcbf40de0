//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Download every tagged release archive of a repository.
///
/// Downhub walks the repository's paginated tag listing, collects every
/// `.zip` and `.tar.gz` release archive, downloads them concurrently, and
/// records what it found in `output-{repo}.json`.
#[derive(Parser, Debug)]
#[command(name = "downhub")]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Repository URL, e.g. https://github.com/owner/repo
    pub url: Option<String>,

    #[command(flatten)]
    pub run: RunArgs,
}

impl Cli {
    /// Returns true when neither a URL nor a subcommand was given.
    pub fn is_empty_invocation(&self) -> bool {
        self.command.is_none() && self.url.is_none()
    }
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Forward proxy for page and archive requests (http or https)
    #[arg(short = 'p', long, global = true)]
    pub proxy: Option<String>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Base data directory (overrides `base_data_dir`)
    #[arg(short = 'o', long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip the site reachability check
    #[arg(long, global = true)]
    pub skip_check: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Process every repository listed in a file, one URL per line
    Batch {
        /// Repository list file
        #[arg(value_name = "FILE", conflicts_with = "file_flag")]
        file: Option<PathBuf>,

        /// Repository list file
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file_flag: Option<PathBuf>,
    },
    /// Process the `[[repositories]]` entries of the configuration
    Common,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

impl Command {
    /// List file of a `batch` invocation, from either spelling.
    pub fn batch_file(&self) -> Option<&PathBuf> {
        match self {
            Self::Batch { file, file_flag } => file.as_ref().or(file_flag.as_ref()),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
}
