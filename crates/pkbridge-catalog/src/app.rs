//! Process wiring for the `pkbridge-catalog` binary.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use pkbridge::dispatch::DispatchError;
use pkbridge::lifecycle::{Invocation, InterruptWatcher, LifecycleError};
use pkbridge::telemetry::{self, TelemetryError};
use pkbridge::{BackendLock, Dispatcher, RunOutcome, fault};
use pkbridge_config::Config;
use thiserror::Error;
use tracing::{error, info};

use crate::backend::CatalogBackend;
use crate::catalog::CatalogStore;

const APP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::app");

/// Failures that stop the backend process outside the line protocol.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration layers could not be merged.
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<OrthoError>),
    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The interrupt watcher could not be started.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// The controller's streams failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Runs the catalog backend over the given streams.
///
/// Returns exit status 0 when the session ends normally and 1 after a fatal
/// error or when the process cannot start.
#[must_use]
pub fn run<I, R, W, E>(args: I, input: &mut R, output: W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let arguments: Vec<OsString> = args.into_iter().collect();
    match serve(&arguments, input, output) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(failure) => {
            error!(target: APP_TARGET, error = %failure, "backend stopped");
            // Nowhere left to report a failing stderr.
            drop(writeln!(stderr, "pkbridge-catalog: {failure}"));
            ExitCode::FAILURE
        }
    }
}

fn serve<R, W>(arguments: &[OsString], input: &mut R, output: W) -> Result<RunOutcome, AppError>
where
    R: BufRead,
    W: Write,
{
    let invocation = Invocation::parse(arguments);
    let config = Config::load_from_iter(invocation.config_arguments().iter().cloned())
        .map_err(AppError::LoadConfiguration)?;
    let _telemetry = telemetry::initialise(&config)?;
    fault::install_panic_hook();

    let lock = config
        .lock_file()
        .map_or_else(BackendLock::in_memory, BackendLock::with_file);
    let watcher = InterruptWatcher::spawn(lock.clone())?;
    info!(
        target: APP_TARGET,
        catalog = %config.catalog_path(),
        helper = invocation.is_helper(),
        "catalog backend ready"
    );

    let backend = CatalogBackend::new(CatalogStore::new(config.catalog_path()));
    let mut dispatcher = Dispatcher::new(backend, output).with_lock(lock);
    let outcome = dispatcher.run(invocation.initial(), input);
    watcher.shutdown();
    Ok(outcome?)
}
