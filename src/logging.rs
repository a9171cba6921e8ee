use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, Level};
use tracing_subscriber::{filter::filter_fn, fmt, prelude::*};

use crate::config::LogConfig;

/// Install the process-wide subscriber.
///
/// Interactive runs (stdout attached to a terminal) get a colorized console
/// sink at the configured level, plus an optional plain-text file sink.
/// Non-interactive runs split plain-text output instead: everything below
/// WARN goes to stdout and WARN or above goes to stderr, so schedulers can
/// separate the two streams. The file sink is only wired up for interactive
/// runs.
///
/// Initializing twice is an error rather than a silent replacement of the
/// already-installed sinks.
pub(crate) fn init(config: &LogConfig) -> Result<()> {
    let interactive = io::stdout().is_terminal();
    if interactive {
        init_interactive(config)?;
    } else {
        init_batch(config)?;
    }
    info!(
        "Logging initialized at level: {}, interactive={}",
        config.level, interactive
    );
    Ok(())
}

fn init_interactive(config: &LogConfig) -> Result<()> {
    let console = fmt::layer().with_ansi(true).with_filter(config.level);

    let file = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(open_log_file(path)?))
                .with_filter(config.level),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("a global subscriber has already been installed")
}

fn init_batch(config: &LogConfig) -> Result<()> {
    let level = config.level;
    let stdout = fmt::layer()
        .with_ansi(false)
        .with_writer(io::stdout)
        .with_filter(filter_fn(move |meta| {
            !is_warn_or_above(meta.level()) && level >= *meta.level()
        }));

    let level = config.level;
    let stderr = fmt::layer()
        .with_ansi(false)
        .with_writer(io::stderr)
        .with_filter(filter_fn(move |meta| {
            is_warn_or_above(meta.level()) && level >= *meta.level()
        }));

    tracing_subscriber::registry()
        .with(stdout)
        .with(stderr)
        .try_init()
        .context("a global subscriber has already been installed")
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))
}

// tracing orders levels by verbosity: ERROR is the least, TRACE the greatest.
fn is_warn_or_above(level: &Level) -> bool {
    *level <= Level::WARN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_severity_split() {
        assert!(is_warn_or_above(&Level::ERROR));
        assert!(is_warn_or_above(&Level::WARN));
        assert!(!is_warn_or_above(&Level::INFO));
        assert!(!is_warn_or_above(&Level::DEBUG));
        assert!(!is_warn_or_above(&Level::TRACE));
    }
}
