//! Console logging and the quiet-mode progress spinner.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

const LEVELS: [LevelFilter; 6] = [
    LevelFilter::Off,
    LevelFilter::Error,
    LevelFilter::Warn,
    LevelFilter::Info,
    LevelFilter::Debug,
    LevelFilter::Trace,
];

/// Level from the config file (default `info`), moved one step per `-v`
/// or `-q`.
pub(crate) fn level_filter(verbose: u8, quiet: u8, configured: Option<&str>) -> LevelFilter {
    let base = configured
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    let index = LEVELS.iter().position(|&l| l == base).unwrap_or(3) as i32;
    let index = (index + i32::from(verbose) - i32::from(quiet)).clamp(0, 5);
    LEVELS[index as usize]
}

/// Initialize env_logger on stderr. `RUST_LOG` overrides the computed level.
pub(crate) fn init_logging(verbose: u8, quiet: u8, configured: Option<&str>) {
    let _ = env_logger::Builder::new()
        .filter_level(level_filter(verbose, quiet, configured))
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}

pub(crate) fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("tuning");
    pb
}
