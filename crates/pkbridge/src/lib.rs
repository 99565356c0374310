//! Core of a line-protocol package-manager backend.
//!
//! A backend process reads tab-delimited commands from standard input and
//! answers with tab-delimited signals on standard output. This crate provides
//! everything that is common to every backend:
//!
//! - [`codec`]: the line format, its delimiters and field sanitisation;
//! - [`signal`] and [`emitter`]: the closed set of outbound signals and a
//!   writer that flushes each one as it is produced;
//! - [`backend`]: the [`Backend`] capability trait, defaulting every
//!   capability to "not supported";
//! - [`dispatch`]: the command table and the [`Dispatcher`] loop that
//!   guarantees one `finished` per command;
//! - [`fault`], [`lock`] and [`lifecycle`]: fault reporting, the exclusive
//!   lock and process start-up and interruption.
//!
//! A concrete backend implements [`Backend`] and hands it to a
//! [`Dispatcher`]:
//!
//! ```no_run
//! use std::io;
//!
//! use pkbridge::{Backend, Dispatcher};
//!
//! struct Empty;
//! impl Backend for Empty {}
//!
//! # fn main() -> Result<(), pkbridge::DispatchError> {
//! let stdout = io::stdout();
//! let mut dispatcher = Dispatcher::new(Empty, stdout.lock());
//! let outcome = dispatcher.run(None, &mut io::stdin().lock())?;
//! std::process::exit(i32::from(outcome.exit_code()));
//! # }
//! ```

pub mod backend;
pub mod codec;
pub mod dispatch;
pub mod emitter;
pub mod fault;
pub mod lifecycle;
pub mod lock;
pub mod package_id;
pub mod signal;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use backend::{Backend, BackendError, BackendResult, Job, Signals};
pub use dispatch::{DispatchError, Dispatcher, RunOutcome};
pub use lock::{BackendLock, LockError};
pub use package_id::PackageId;
