//! Command dispatcher: one command in, a stream of signals out, then
//! `finished`.
//!
//! The dispatcher moves through three states. It is [`DispatchState::Idle`]
//! while waiting for a line, [`DispatchState::Executing`] while a capability
//! runs and may stream signals, and [`DispatchState::Draining`] while it closes
//! the command with `finished` before returning to idle.
//!
//! Outcomes per command:
//!
//! - success: `finished`, keep reading;
//! - unknown name or wrong arity: a non-fatal `error`, `finished`, keep reading;
//! - unsupported capability, fatal error, panic or unexpected error: one
//!   `error` line, lock released, `finished`, stop with exit status 1.

mod command;

#[cfg(test)]
mod tests;

use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

pub use self::command::{
    Arg, ArgKind, Args, COMMANDS, CommandSpec, ProtocolError, lookup, resolve,
};
use crate::backend::{Backend, BackendError, Job};
use crate::codec::{CommandLine, Inbound, decode_line};
use crate::emitter::{EmitError, SignalEmitter};
use crate::fault::Fault;
use crate::lock::BackendLock;
use crate::signal::{ErrorCode, Signal};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Where the dispatcher is within the current command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Waiting for the next command.
    #[default]
    Idle,
    /// A capability is running.
    Executing,
    /// Closing the current command.
    Draining,
}

/// Result of dispatching one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command finished; more commands may follow.
    Continue,
    /// The command failed fatally; the process must stop.
    Fatal,
}

/// Result of a whole dispatch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Input ended or `exit` was received.
    Completed,
    /// A command failed fatally.
    Failed,
}

impl RunOutcome {
    /// Returns the process exit status for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Failed => 1,
        }
    }
}

/// The controller can no longer be reached.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Writing a signal failed.
    #[error("failed to write to the controller: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Reading a command failed.
    #[error("failed to read from the controller: {source}")]
    Input {
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl From<EmitError> for DispatchError {
    fn from(failure: EmitError) -> Self {
        Self::Output {
            source: failure.into_source(),
        }
    }
}

/// Runs commands against a backend and writes their signals.
#[derive(Debug)]
pub struct Dispatcher<B, W> {
    backend: B,
    output: W,
    lock: BackendLock,
    state: DispatchState,
}

impl<B: Backend, W: Write> Dispatcher<B, W> {
    /// Creates a dispatcher with an in-memory lock.
    pub fn new(backend: B, output: W) -> Self {
        Self {
            backend,
            output,
            lock: BackendLock::in_memory(),
            state: DispatchState::Idle,
        }
    }

    /// Replaces the lock shared with capabilities.
    #[must_use]
    pub fn with_lock(mut self, lock: BackendLock) -> Self {
        self.lock = lock;
        self
    }

    /// Returns the lock shared with capabilities.
    #[must_use]
    pub const fn lock(&self) -> &BackendLock {
        &self.lock
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> DispatchState {
        self.state
    }

    /// Returns the backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend and the output stream.
    pub fn into_parts(self) -> (B, W) {
        (self.backend, self.output)
    }

    /// Runs an optional initial command, then every command read from
    /// `input` until `exit`, an empty line or end of input.
    ///
    /// The lock is released before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the input or output stream fails.
    pub fn run(
        &mut self,
        initial: Option<&CommandLine>,
        input: &mut impl BufRead,
    ) -> Result<RunOutcome, DispatchError> {
        let outcome = self.serve(initial, input);
        if self.lock.release() {
            debug!(target: DISPATCH_TARGET, "released lock at end of session");
        }
        self.state = DispatchState::Idle;
        outcome
    }

    fn serve(
        &mut self,
        initial: Option<&CommandLine>,
        input: &mut impl BufRead,
    ) -> Result<RunOutcome, DispatchError> {
        if let Some(command) = initial
            && self.dispatch(command)? == CommandOutcome::Fatal
        {
            return Ok(RunOutcome::Failed);
        }
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let read = input
                .read_until(b'\n', &mut raw)
                .map_err(|source| DispatchError::Input {
                    source: Arc::new(source),
                })?;
            if read == 0 {
                debug!(target: DISPATCH_TARGET, "end of input");
                return Ok(RunOutcome::Completed);
            }
            // Undecodable bytes become U+FFFD and the line is rejected as an
            // unknown command.
            let line = String::from_utf8_lossy(&raw);
            let Inbound::Command(command) = decode_line(&line) else {
                debug!(target: DISPATCH_TARGET, "exit requested");
                return Ok(RunOutcome::Completed);
            };
            if self.dispatch(&command)? == CommandOutcome::Fatal {
                return Ok(RunOutcome::Failed);
            }
        }
    }

    /// Dispatches one command and closes it with `finished`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Output`] when a signal cannot be written. The
    /// lock is released first.
    pub fn dispatch(&mut self, command: &CommandLine) -> Result<CommandOutcome, DispatchError> {
        let result = self.dispatch_command(command);
        if let Err(error) = &result {
            error!(
                target: DISPATCH_TARGET,
                command = command.name(),
                %error,
                "controller unreachable"
            );
            self.lock.release();
            self.state = DispatchState::Idle;
        }
        result
    }

    fn dispatch_command(
        &mut self,
        command: &CommandLine,
    ) -> Result<CommandOutcome, DispatchError> {
        let (spec, args) = match resolve(command) {
            Ok(resolved) => resolved,
            Err(protocol) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = command.name(),
                    error = %protocol,
                    "rejected command"
                );
                self.emit(&Signal::Error {
                    code: ErrorCode::InternalError,
                    description: protocol.to_string(),
                })?;
                self.drain()?;
                return Ok(CommandOutcome::Continue);
            }
        };

        debug!(target: DISPATCH_TARGET, command = spec.name(), "dispatching command");
        self.state = DispatchState::Executing;
        let outcome = self.execute(spec, &args)?;
        if outcome == CommandOutcome::Fatal && self.lock.release() {
            debug!(
                target: DISPATCH_TARGET,
                command = spec.name(),
                "released lock after fatal error"
            );
        }
        self.drain()?;
        debug!(target: DISPATCH_TARGET, command = spec.name(), ?outcome, "command finished");
        Ok(outcome)
    }

    fn execute(
        &mut self,
        spec: &CommandSpec,
        args: &Args,
    ) -> Result<CommandOutcome, DispatchError> {
        let backend: &mut dyn Backend = &mut self.backend;
        let mut job = Job::new(&mut self.output, &self.lock);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            spec.invoke(&mut *backend, &mut job, args)
        }));

        let fault = match result {
            Ok(Ok(())) => return Ok(CommandOutcome::Continue),
            Ok(Err(BackendError::NotSupported)) => {
                warn!(target: DISPATCH_TARGET, command = spec.name(), "capability not supported");
                let description = BackendError::NotSupported.to_string();
                report(&mut job, ErrorCode::NotSupported, &description)?;
                return Ok(CommandOutcome::Fatal);
            }
            Ok(Err(BackendError::Fatal { code, message })) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = spec.name(),
                    %code,
                    %message,
                    "capability failed"
                );
                report(&mut job, code, &message)?;
                return Ok(CommandOutcome::Fatal);
            }
            Ok(Err(BackendError::Emit(failure))) => return Err(failure.into()),
            Ok(Err(unexpected @ BackendError::Internal { .. })) => Fault::from_error(&unexpected),
            Err(payload) => Fault::from_panic(payload.as_ref()),
        };

        error!(target: DISPATCH_TARGET, command = spec.name(), %fault, "capability fault");
        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            backend.handle_fault(&mut job, &fault)
        }))
        .unwrap_or_else(|payload| {
            let second = Fault::from_panic(payload.as_ref());
            error!(target: DISPATCH_TARGET, fault = %second, "fault handler panicked");
            false
        });
        if !handled {
            report(&mut job, ErrorCode::InternalError, &fault.to_string())?;
        }
        Ok(CommandOutcome::Fatal)
    }

    fn drain(&mut self) -> Result<(), DispatchError> {
        self.state = DispatchState::Draining;
        self.emit(&Signal::Finished)?;
        self.state = DispatchState::Idle;
        Ok(())
    }

    fn emit(&mut self, signal: &Signal) -> Result<(), DispatchError> {
        SignalEmitter::new(&mut self.output)
            .emit(signal)
            .map_err(DispatchError::from)
    }
}

fn report(job: &mut Job<'_>, code: ErrorCode, description: &str) -> Result<(), DispatchError> {
    job.signals()
        .error(code, description)
        .map_err(DispatchError::from)
}
