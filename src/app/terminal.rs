//! Terminal capabilities and tracing subscriber setup.

use std::io::IsTerminal;

use downhub::ProgressMode;

use crate::cli::RunArgs;

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_disable_color(
    no_color_flag: bool,
    no_color_env: bool,
    dumb_terminal: bool,
) -> bool {
    no_color_flag || no_color_env || dumb_terminal
}

pub(crate) fn is_no_color_requested(args: &RunArgs) -> bool {
    should_disable_color(args.no_color, no_color_env_requested(), is_dumb_terminal())
}

pub(crate) fn should_draw_progress(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

pub(crate) fn progress_mode(args: &RunArgs) -> ProgressMode {
    if should_draw_progress(std::io::stderr().is_terminal(), args.quiet, is_dumb_terminal()) {
        ProgressMode::Bars
    } else {
        ProgressMode::Hidden
    }
}

/// Picks the default filter level.
///
/// Priority below `RUST_LOG`: `-q`, then `-v`/`-vv`, then the configured
/// level, then `info`.
pub(crate) fn resolve_log_level<'a>(
    verbose: u8,
    quiet: bool,
    configured: Option<&'a str>,
) -> &'a str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => configured.unwrap_or("info"),
        1 => "debug",
        _ => "trace",
    }
}

pub(crate) fn init_tracing(default_level: &str, no_color: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .try_init();
}
