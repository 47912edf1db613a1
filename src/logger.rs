//! Diagnostics on standard error, through a `tracing` fmt subscriber.

use std::fmt;
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::FmtSubscriber;

/// Common Log Format (CLF) formatted date in local timezone.
struct ClfDate(SystemTime);

impl fmt::Display for ClfDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let datetime = DateTime::<Local>::from(self.0);
        write!(f, "{}", datetime.format("[%d/%b/%Y:%H:%M:%S %z]"))
    }
}

/// Stamps each event with the current [`ClfDate`].
struct ClfTimer;

impl FormatTime for ClfTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", ClfDate(SystemTime::now()))
    }
}

/// Install the stderr subscriber for the whole process.
pub fn init(level: LevelFilter) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_timer(ClfTimer)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to install logger")
}
