//! Process-level plumbing around the dispatcher.
//!
//! [`Invocation::parse`] works out how the process was started: as a helper
//! script named after a command, or as a long-lived backend whose argument
//! vector holds configuration flags followed by an optional initial command.
//! [`InterruptWatcher`] releases the backend lock and exits when the
//! controller interrupts the process.

use std::ffi::{OsStr, OsString, c_int};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use pkbridge_config::CONFIG_CLI_FLAGS;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use crate::codec::CommandLine;
use crate::dispatch::lookup;
use crate::lock::BackendLock;


const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Signals that end the backend process.
pub const TERMINATION_SIGNALS: [c_int; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Exit status used when the process is interrupted.
pub const INTERRUPTED_EXIT_CODE: i32 = 1;

/// Errors raised while setting up the process.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The watcher thread could not be started.
    #[error("failed to start interrupt watcher: {source}")]
    Thread {
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// How the process was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    config_arguments: Vec<OsString>,
    initial: Option<CommandLine>,
    helper: bool,
}

impl Invocation {
    /// Interprets the full argument vector, program name included.
    ///
    /// When the program name without its extension is a command name, the
    /// process runs as a helper script: every remaining argument belongs to
    /// that command and no configuration flags are read. Otherwise leading
    /// configuration flags are separated from the command tokens; the first
    /// token names the initial command.
    ///
    /// Configuration flags must precede command tokens. A configuration flag
    /// after the command name is passed to the command as an argument.
    #[must_use]
    pub fn parse(args: &[OsString]) -> Self {
        let Some((program, rest)) = args.split_first() else {
            return Self {
                config_arguments: Vec::new(),
                initial: None,
                helper: false,
            };
        };

        if let Some(command) = helper_command(program) {
            return Self {
                config_arguments: vec![program.clone()],
                initial: Some(CommandLine::new(command, lossy_all(rest))),
                helper: true,
            };
        }

        let mut config_arguments = vec![program.clone()];
        let mut remaining = rest.iter().peekable();
        while let Some(flag) = remaining.next_if(|argument| config_flag(argument).is_some()) {
            config_arguments.push(flag.clone());
            if config_flag(flag) == Some(true)
                && let Some(value) = remaining.next()
            {
                config_arguments.push(value.clone());
            }
        }

        let mut tokens = lossy_all(remaining).into_iter();
        let initial = tokens
            .next()
            .map(|name| CommandLine::new(name, tokens.collect()));
        Self {
            config_arguments,
            initial,
            helper: false,
        }
    }

    /// Returns the arguments destined for the configuration loader.
    #[must_use]
    pub fn config_arguments(&self) -> &[OsString] {
        &self.config_arguments
    }

    /// Returns the command to run before reading standard input.
    #[must_use]
    pub const fn initial(&self) -> Option<&CommandLine> {
        self.initial.as_ref()
    }

    /// Returns `true` when the program was invoked under a command name.
    #[must_use]
    pub const fn is_helper(&self) -> bool {
        self.helper
    }
}

/// Returns `Some(needs_value)` when `argument` is a configuration flag.
fn config_flag(argument: &OsStr) -> Option<bool> {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return None;
    }
    let mut parts = text.splitn(2, '=');
    let flag = parts.next().unwrap_or_default();
    let has_inline_value = parts.next().is_some();
    CONFIG_CLI_FLAGS
        .contains(&flag)
        .then_some(!has_inline_value)
}

fn helper_command(program: &OsStr) -> Option<String> {
    let stem = Path::new(program).file_stem()?.to_str()?;
    lookup(stem).map(|_| stem.to_owned())
}

fn lossy_all<'a>(values: impl IntoIterator<Item = &'a OsString>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.to_string_lossy().into_owned())
        .collect()
}

/// Background thread that releases the lock when the process is interrupted.
#[derive(Debug)]
pub struct InterruptWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl InterruptWatcher {
    /// Watches [`TERMINATION_SIGNALS`]; on delivery the lock is released and
    /// the process exits with [`INTERRUPTED_EXIT_CODE`].
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the handlers or the thread cannot be
    /// set up.
    pub fn spawn(lock: BackendLock) -> Result<Self, LifecycleError> {
        Self::spawn_with(lock, &TERMINATION_SIGNALS, |_| {
            std::process::exit(INTERRUPTED_EXIT_CODE)
        })
    }

    /// Watches `signals`; on the first delivery the lock is released and
    /// `on_interrupt` runs with the signal number.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the handlers or the thread cannot be
    /// set up.
    pub fn spawn_with<F>(
        lock: BackendLock,
        signals: &[c_int],
        on_interrupt: F,
    ) -> Result<Self, LifecycleError>
    where
        F: FnOnce(c_int) + Send + 'static,
    {
        let mut listener = Signals::new(signals).map_err(|source| LifecycleError::Signals {
            source: Arc::new(source),
        })?;
        let handle = listener.handle();
        let thread = thread::Builder::new()
            .name(String::from("interrupt-watcher"))
            .spawn(move || {
                if let Some(signal) = listener.forever().next() {
                    info!(target: LIFECYCLE_TARGET, signal, "interrupt received");
                    if lock.release() {
                        info!(target: LIFECYCLE_TARGET, "released backend lock");
                    }
                    on_interrupt(signal);
                }
            })
            .map_err(|source| LifecycleError::Thread {
                source: Arc::new(source),
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Stops watching and waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: LIFECYCLE_TARGET, "interrupt watcher panicked");
        }
    }
}

impl Drop for InterruptWatcher {
    fn drop(&mut self) {
        self.handle.close();
    }
}
