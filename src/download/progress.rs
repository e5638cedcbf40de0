//! Per-asset progress bars.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Width reserved for the file name column.
const NAME_WIDTH: usize = 30;

const BAR_TEMPLATE: &str =
    "{prefix:30!} [{bar:60}] {percent:>3}% {binary_bytes:>10} / {binary_total_bytes:<10} {msg}";

const SPINNER_TEMPLATE: &str = "{prefix:30!} {spinner} {binary_bytes:>10} ({binary_bytes_per_sec}) {msg}";

const BAR_CHARS: &str = "⠿⠿⠶";

/// Whether progress bars are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Draw bars on stderr.
    Bars,
    /// Track progress without drawing anything.
    Hidden,
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars(BAR_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// The set of bars for one download run.
#[derive(Debug)]
pub(crate) struct ProgressBoard {
    multi: MultiProgress,
    mode: ProgressMode,
    bars: Mutex<Vec<ProgressBar>>,
}

impl ProgressBoard {
    pub(crate) fn new(mode: ProgressMode) -> Self {
        let target = match mode {
            ProgressMode::Bars => ProgressDrawTarget::stderr(),
            ProgressMode::Hidden => ProgressDrawTarget::hidden(),
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            mode,
            bars: Mutex::new(Vec::new()),
        }
    }

    /// Adds a bar for `name`. It starts as a length-less spinner until the
    /// response announces a size.
    pub(crate) fn add(&self, name: &str) -> AssetProgress {
        let bar = self.multi.add(ProgressBar::no_length());
        bar.set_style(spinner_style());
        bar.set_prefix(truncate_name(name));
        if let Ok(mut bars) = self.bars.lock() {
            bars.push(bar.clone());
        }
        AssetProgress {
            bar,
            animate: self.mode == ProgressMode::Bars,
        }
    }

    /// Settles the board: any bar left unfinished (a worker that never
    /// reported) is abandoned so the terminal is left in a final state.
    pub(crate) fn finish(&self) {
        let Ok(bars) = self.bars.lock() else {
            return;
        };
        for bar in bars.iter().filter(|bar| !bar.is_finished()) {
            bar.abandon_with_message("not finished");
        }
    }
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() <= NAME_WIDTH {
        return name.to_string();
    }
    let kept: String = name.chars().take(NAME_WIDTH - 1).collect();
    format!("{kept}…")
}

/// Progress handle for one asset.
#[derive(Debug, Clone)]
pub(crate) struct AssetProgress {
    bar: ProgressBar,
    animate: bool,
}

impl AssetProgress {
    /// Marks the transfer as started.
    pub(crate) fn start(&self) {
        if self.animate {
            self.bar.enable_steady_tick(Duration::from_millis(120));
        }
    }

    /// Switches to a byte bar with a known total.
    pub(crate) fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_style(bar_style());
    }

    pub(crate) fn inc(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    pub(crate) fn succeed(&self) {
        if self.bar.length().is_none() {
            self.bar.set_length(self.bar.position());
        }
        self.bar.finish_with_message("done");
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.bar.abandon_with_message(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_board_tracks_progress() {
        let board = ProgressBoard::new(ProgressMode::Hidden);
        let progress = board.add("v1.0.zip");
        progress.start();
        progress.set_total(10);
        progress.inc(4);
        progress.inc(6);
        assert_eq!(progress.bar.position(), 10);
        progress.succeed();
        board.finish();
    }

    #[test]
    fn test_unknown_length_success_does_not_panic() {
        let board = ProgressBoard::new(ProgressMode::Hidden);
        let progress = board.add("v1.0.tar.gz");
        progress.inc(1234);
        progress.succeed();
        assert_eq!(progress.bar.position(), 1234);
    }

    #[test]
    fn test_finish_abandons_unreported_bars() {
        let board = ProgressBoard::new(ProgressMode::Hidden);
        let progress = board.add("v2.zip");
        board.finish();
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn test_truncate_name_limits_width() {
        let long = "a".repeat(40);
        assert_eq!(truncate_name(&long).chars().count(), NAME_WIDTH);
        assert_eq!(truncate_name("short.zip"), "short.zip");
    }
}
