//! Terminal progress display for transfers
//!
//! One byte-level progress bar per archive, stacked in a shared
//! [`MultiProgress`]. When stderr is not a terminal, or progress bars are
//! disabled, bars are hidden and completed transfers are logged instead.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info};

use crate::app::{ProgressCallback, ProgressFactory, TransferProgress};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:30!} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix:30!} {bytes} {bytes_per_sec}";

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Remove each bar once its transfer completes
    pub clear_on_complete: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            clear_on_complete: false,
        }
    }
}

impl ProgressConfig {
    /// Progress bars unless quiet mode was requested
    pub fn for_quiet(quiet: bool) -> Self {
        Self {
            enable_progress_bars: !quiet,
            ..Default::default()
        }
    }
}

/// Creates a progress bar for each transfer of a run
pub struct ProgressDisplay {
    config: ProgressConfig,
    multi: MultiProgress,
    is_terminal: bool,
}

impl ProgressDisplay {
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let multi = if config.enable_progress_bars && is_terminal {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        Self {
            config,
            multi,
            is_terminal,
        }
    }

    /// Whether bars are actually drawn
    pub fn is_visible(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    fn styled(bar: &ProgressBar, known_length: bool) {
        let template = if known_length {
            BAR_TEMPLATE
        } else {
            SPINNER_TEMPLATE
        };
        match ProgressStyle::default_bar().template(template) {
            Ok(style) => bar.set_style(style.progress_chars("##-")),
            Err(e) => debug!("Progress bar template error: {}", e),
        }
    }
}

impl ProgressFactory for ProgressDisplay {
    fn for_transfer(&self, label: &str) -> Box<dyn ProgressCallback> {
        let bar = self.multi.add(ProgressBar::new_spinner());
        Self::styled(&bar, false);
        bar.set_prefix(label.to_string());

        Box::new(BarProgress {
            bar,
            label: label.to_string(),
            clear_on_complete: self.config.clear_on_complete,
            log_completion: !self.is_visible(),
        })
    }
}

/// Progress callback backed by a single indicatif bar
struct BarProgress {
    bar: ProgressBar,
    label: String,
    clear_on_complete: bool,
    log_completion: bool,
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, progress: &TransferProgress) {
        if let Some(total) = progress.total_bytes {
            if self.bar.length() != Some(total) {
                self.bar.set_length(total);
                ProgressDisplay::styled(&self.bar, true);
            }
        }
        self.bar.set_position(progress.bytes_transferred);
    }

    fn on_complete(&self, progress: &TransferProgress) {
        self.bar.set_position(progress.bytes_transferred);
        if self.clear_on_complete {
            self.bar.finish_and_clear();
        } else {
            self.bar.finish();
        }

        if self.log_completion {
            info!(
                "{}: {} transferred",
                self.label,
                format_bytes(progress.bytes_transferred)
            );
        }
    }
}

/// Human-readable byte count using binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
