//! CLI entry point for downhub.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

mod app;
mod app_config;
mod cli;
mod commands;

use cli::Cli;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything succeeded, or there was nothing to do.
    Success,
    /// Some assets or repositories failed.
    Partial,
    /// The run could not start (configuration, proxy, reachability).
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    if cli.is_empty_invocation() {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    match app::runtime::run_downhub(cli).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
