//! Structured logging for backend processes.
//!
//! Standard output is the signal stream read by the controller, so log events
//! only ever go to standard error. [`initialise`] installs the process-wide
//! subscriber; [`subscriber`] builds the formatting layer for any writer.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use pkbridge_config::{Config, LogFormat};
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};

#[cfg(test)]
mod tests;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The tracing subscriber could not be installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber, writing to standard error, on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the global
/// subscriber again.
///
/// ```rust
/// use pkbridge::telemetry;
/// use pkbridge_config::Config;
///
/// # fn main() -> Result<(), pkbridge::telemetry::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// drop((first, second));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another global
/// subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| {
            let filter = parse_filter(config.log_filter())?;
            // Never stdout: a log line there would reach the controller as a
            // malformed signal.
            let format = config.log_format();
            let installed = subscriber(
                format,
                filter,
                io::stderr,
                format.colours(io::stderr().is_terminal()),
            );
            tracing::subscriber::set_global_default(installed).map_err(TelemetryError::Subscriber)
        })
        .map(|()| TelemetryHandle)
}

/// Parses a `tracing` filter expression such as `info,pkbridge::dispatch=debug`.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the expression does not parse.
pub fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter(error.to_string()))
}

/// Builds the formatting subscriber for `format`, writing through `writer`.
///
/// Events carry their target, level, thread name and an RFC 3339 UTC
/// timestamp, so lines from the interrupt watcher can be told apart from the
/// dispatch loop. JSON events are flattened so fields sit beside `message`.
#[must_use]
pub fn subscriber<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
    ansi: bool,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    }
}
