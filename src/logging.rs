//! tracing subscriber setup.
//!
//! Console output goes to stderr so command output on stdout stays clean.
//! `RUST_LOG` overrides the default level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

/// Base name of rotated log files.
const LOG_FILE_PREFIX: &str = "triage.log";

/// Keeps the file writer flushing. Hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "info"
    }
}

/// Install the global subscriber.
pub fn init(format: LogFormat, directory: Option<&Path>, verbose: bool) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let (json_console, pretty_console) = match format {
        LogFormat::Json => (
            Some(fmt::layer().json().with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        ),
    };

    let (file_layer, file_guard) = match directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_console)
        .with(pretty_console)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).starts_with("debug"));
    }

    #[test]
    fn test_directives_parse() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(default_directive(verbose)).is_ok());
        }
    }
}
