//! Helpers for driving a dispatcher from tests.

use std::io::Cursor;

use crate::backend::Backend;
use crate::dispatch::{DispatchError, Dispatcher, RunOutcome};
use crate::lock::BackendLock;

/// Everything a dispatch session wrote, plus how it ended.
#[derive(Debug)]
pub struct Transcript {
    result: Result<RunOutcome, DispatchError>,
    output: String,
}

impl Transcript {
    /// Returns the session result.
    #[must_use]
    pub const fn result(&self) -> &Result<RunOutcome, DispatchError> {
        &self.result
    }

    /// Returns the raw output.
    #[must_use]
    pub const fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Returns the output split into lines.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    /// Returns the lines whose kind is `kind`.
    #[must_use]
    pub fn lines_of(&self, kind: &str) -> Vec<&str> {
        self.output
            .lines()
            .filter(|line| line.split('\t').next() == Some(kind))
            .collect()
    }

    /// Returns the exit status the session would produce.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.result
            .as_ref()
            .map_or(1, |outcome| outcome.exit_code())
    }
}

/// Runs `input` through a dispatcher over `backend` sharing `lock`.
///
/// Returns the backend so tests can inspect its state afterwards.
pub fn run_script<B: Backend>(backend: B, lock: &BackendLock, input: &str) -> (B, Transcript) {
    let mut dispatcher = Dispatcher::new(backend, Vec::new()).with_lock(lock.clone());
    let result = dispatcher.run(None, &mut Cursor::new(input.as_bytes()));
    let (backend_after, output) = dispatcher.into_parts();
    let transcript = Transcript {
        result,
        output: String::from_utf8_lossy(&output).into_owned(),
    };
    (backend_after, transcript)
}
