//! The capability contract every concrete backend implements.
//!
//! [`Backend`] has one method per protocol command. Each method has a default
//! body returning [`BackendError::NotSupported`], so a backend implements only
//! the capabilities its package manager offers and the dispatcher reports the
//! rest as unsupported.
//!
//! Capability methods receive a [`Job`] through which they stream signals and
//! take the exclusive lock. List arguments arrive already split; identifiers
//! arrive as raw text so a backend can report a malformed one and carry on with
//! the rest of the batch. Flag arguments arrive untouched; use
//! [`text_to_bool`](crate::codec::text_to_bool) to interpret them.

use std::error::Error as StdError;
use std::io::{self, Write};

use thiserror::Error;

use crate::emitter::{EmitError, SignalEmitter};
use crate::fault::Fault;
use crate::lock::{BackendLock, LockError};
use crate::signal::ErrorCode;


/// Emitter handed to capability methods.
pub type Signals<'a> = SignalEmitter<&'a mut dyn Write>;

/// Result returned by every capability method.
pub type BackendResult = Result<(), BackendError>;

/// Ways a capability can end other than success.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend does not implement this capability.
    #[error("This function is not implemented in this backend")]
    NotSupported,
    /// An anticipated failure that aborts the command with a specific code.
    #[error("{code}: {message}")]
    Fatal {
        /// Error class reported to the controller.
        code: ErrorCode,
        /// Description reported to the controller.
        message: String,
    },
    /// Writing a signal failed; the controller can no longer be reached.
    #[error(transparent)]
    Emit(#[from] EmitError),
    /// An unanticipated failure, reported as an internal fault.
    #[error("{message}")]
    Internal {
        /// Summary of the failure.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl BackendError {
    /// Builds a fatal error with the given code.
    #[must_use]
    pub fn fatal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Fatal {
            code,
            message: message.into(),
        }
    }

    /// Builds an internal error wrapping an underlying cause.
    #[must_use]
    pub fn internal(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Any I/O failure a capability propagates with `?` is unanticipated and is
/// reported as an internal fault. Signal write failures arrive as
/// [`EmitError`] instead.
impl From<io::Error> for BackendError {
    fn from(source: io::Error) -> Self {
        Self::internal("I/O operation failed", source)
    }
}

impl From<LockError> for BackendError {
    fn from(error: LockError) -> Self {
        Self::fatal(ErrorCode::CannotGetLock, error.to_string())
    }
}

/// Per-command context passed to capability methods.
pub struct Job<'a> {
    signals: Signals<'a>,
    lock: &'a BackendLock,
}

impl<'a> Job<'a> {
    /// Creates a job writing to `output` and sharing `lock`.
    pub const fn new(output: &'a mut dyn Write, lock: &'a BackendLock) -> Self {
        Self {
            signals: SignalEmitter::new(output),
            lock,
        }
    }

    /// Returns the emitter for this command's signals.
    pub const fn signals(&mut self) -> &mut Signals<'a> {
        &mut self.signals
    }

    /// Returns the process-wide backend lock.
    #[must_use]
    pub const fn lock(&self) -> &BackendLock {
        self.lock
    }
}

/// A concrete package-manager backend.
///
/// Filters are opaque strings: the dispatcher forwards them verbatim and
/// their grammar belongs to the implementation.
#[expect(unused_variables, reason = "default bodies ignore their arguments")]
pub trait Backend {
    /// Searches package names.
    fn search_name(&mut self, job: &mut Job<'_>, filters: &str, search: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Searches package descriptions.
    fn search_details(&mut self, job: &mut Job<'_>, filters: &str, search: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists packages in a group.
    fn search_group(&mut self, job: &mut Job<'_>, filters: &str, group: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Finds packages owning a file.
    fn search_file(&mut self, job: &mut Job<'_>, filters: &str, path: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Describes pending updates.
    fn get_update_detail(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists what the packages depend on.
    fn get_depends(
        &mut self,
        job: &mut Job<'_>,
        filters: &str,
        package_ids: &[String],
        recursive: &str,
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists packages matching the filters.
    fn get_packages(&mut self, job: &mut Job<'_>, filters: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists what depends on the packages.
    fn get_requires(
        &mut self,
        job: &mut Job<'_>,
        filters: &str,
        package_ids: &[String],
        recursive: &str,
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Finds packages providing a capability.
    fn what_provides(
        &mut self,
        job: &mut Job<'_>,
        filters: &str,
        provides: &str,
        search: &str,
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Applies every available update.
    fn update_system(&mut self, job: &mut Job<'_>) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Refreshes repository metadata.
    fn refresh_cache(&mut self, job: &mut Job<'_>) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Installs packages.
    fn install_packages(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Installs a package signing key.
    fn install_signature(
        &mut self,
        job: &mut Job<'_>,
        sig_type: &str,
        key_id: &str,
        package_id: &str,
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Installs local package files.
    fn install_files(
        &mut self,
        job: &mut Job<'_>,
        trusted: &str,
        files: &[String],
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Maps names to package identifiers.
    fn resolve(&mut self, job: &mut Job<'_>, filters: &str, names: &[String]) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Removes packages.
    fn remove_packages(
        &mut self,
        job: &mut Job<'_>,
        allow_deps: &str,
        package_ids: &[String],
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Updates the given packages.
    fn update_packages(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Describes packages.
    fn get_details(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists files shipped by packages.
    fn get_files(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists available updates.
    fn get_updates(&mut self, job: &mut Job<'_>, filters: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists available distribution upgrades.
    fn get_distro_upgrades(&mut self, job: &mut Job<'_>) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Enables or disables a repository.
    fn repo_enable(&mut self, job: &mut Job<'_>, repo_id: &str, enabled: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Sets a repository parameter.
    fn repo_set_data(
        &mut self,
        job: &mut Job<'_>,
        repo_id: &str,
        parameter: &str,
        value: &str,
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists configured repositories.
    fn get_repo_list(&mut self, job: &mut Job<'_>, filters: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Accepts the signature of the repository providing a package.
    fn repo_signature_install(&mut self, job: &mut Job<'_>, package_id: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Downloads packages into a directory without installing them.
    fn download_packages(
        &mut self,
        job: &mut Job<'_>,
        directory: &str,
        package_ids: &[String],
    ) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Sets the locale used for translated text.
    fn set_locale(&mut self, job: &mut Job<'_>, locale: &str) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Lists package categories.
    fn get_categories(&mut self, job: &mut Job<'_>) -> BackendResult {
        Err(BackendError::NotSupported)
    }

    /// Gives the backend first refusal on an unexpected fault.
    ///
    /// Returning `true` means the backend has reported the fault itself and
    /// the generic `ERROR_INTERNAL_ERROR` line is suppressed. The command still
    /// ends fatally either way.
    fn handle_fault(&mut self, job: &mut Job<'_>, fault: &Fault) -> bool {
        false
    }
}
