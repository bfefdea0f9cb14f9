//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output plus optional daily-rotated file output. The protocol
//! stack logs lifecycle transitions at `info` and wire traffic at
//! `debug`; the filter built here keeps the per-frame targets from
//! drowning everything else when a bare `trace` is requested.

use std::path::Path;

use tracing::Subscriber;
use tracing_appender::rolling;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::SioResult;

/// Targets that dump per-frame wire traffic once allowed past `debug`.
pub const WIRE_TARGETS: &[&str] = &["sockeye_transport::ws", "sockeye_transport::http"];

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Build the level filter for a requested level.
///
/// Unparseable levels fall back to `info`. A bare `trace` keeps the
/// wire targets at `debug` so frame dumps stay opt-in; name a target
/// explicitly (e.g. `trace,sockeye_transport::ws=trace`) to see them.
pub fn filter_for(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if level == "trace" {
        for target in WIRE_TARGETS {
            if let Ok(directive) = format!("{target}=debug").parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

fn console_layer<S>() -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer().with_target(true).compact().boxed()
}

/// Initialize the global tracing subscriber with console and file output.
///
/// # Arguments
/// * `level` - Filter string passed to [`filter_for`]
/// * `log_dir` - Directory for daily-rotated log files
/// * `json_output` - If true, the file layer writes JSON lines
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> SioResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "sockeye.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    let file_layer = if json_output {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(console_layer())
        .with(file_layer)
        .init();

    tracing::info!("logging initialized at level={level}, dir={}", log_dir.display());
    Ok(LogGuard { _guard: guard })
}

/// Initialize a minimal console-only logger for tests or simple usage.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter_for(level))
        .with(console_layer())
        .try_init();
}
