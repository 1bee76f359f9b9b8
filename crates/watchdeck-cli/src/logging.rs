use anyhow::{anyhow, Result};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Default filter for a `-v` count. `-v` keeps HTTP internals quiet, `-vv` shows everything.
fn filter_directive(verbose_level: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose_level {
        0 => "info",
        1 => "debug,hyper=warn,reqwest=info,tokio_cron_scheduler=info",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the verbosity flags except in quiet mode. Output is
/// JSON when stdout is not a terminal or `RUST_LOG_JSON=true`. With a
/// `log_file` the output goes to a daily-rotated file next to it instead of stderr.
pub fn init_logging(verbose_level: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let directive = filter_directive(verbose_level, quiet);
    let filter = if quiet {
        EnvFilter::new(directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
    };

    let json = std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal());

    let registry = Registry::default().with(filter);

    let Some(log_path) = log_file else {
        let layer = fmt::layer().with_timer(ChronoUtc::rfc_3339()).with_writer(io::stderr);
        if json {
            registry.with(layer.json()).init();
        } else {
            registry.with(layer).init();
        }
        return Ok(());
    };

    let log_dir = log_path
        .parent()
        .ok_or_else(|| anyhow!("Log file path has no parent directory"))?;
    std::fs::create_dir_all(log_dir)?;
    let log_filename = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid log filename"))?;
    // watchdeck.log rotates into watchdeck.2026-01-17 and so on
    let log_prefix = log_filename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(log_filename);
    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, log_prefix);

    let layer = fmt::layer()
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false)
        .with_writer(appender);
    if json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
    Ok(())
}
