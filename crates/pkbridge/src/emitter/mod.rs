//! Typed writer for outbound signals.
//!
//! [`SignalEmitter`] exposes one method per signal kind and writes each line
//! atomically followed by an immediate flush: the controller may be blocked
//! on our stdout waiting for a status update, so nothing may sit in a buffer.

use std::io::{self, Write};
use std::sync::Arc;

use thiserror::Error;

use crate::package_id::PackageId;
use crate::signal::{
    DistroUpgradeKind, ErrorCode, Info, MessageKind, PackageDetails, RepoSignature, Restart,
    Signal, Status, UpdateDetail,
};


/// The controller's stream rejected a signal.
///
/// Kept apart from other I/O failures: once a write to the controller fails
/// no `error` or `finished` line can reach it either.
#[derive(Debug, Clone, Error)]
#[error("failed to write signal: {source}")]
pub struct EmitError {
    #[source]
    source: Arc<io::Error>,
}

impl EmitError {
    /// Returns the kind of the underlying write failure.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }

    /// Returns the underlying write failure.
    #[must_use]
    pub fn into_source(self) -> Arc<io::Error> {
        self.source
    }
}

/// Result of writing one signal.
pub type EmitResult = Result<(), EmitError>;

/// Writes protocol signals to an output stream.
#[derive(Debug)]
pub struct SignalEmitter<W> {
    writer: W,
}

impl<W: Write> SignalEmitter<W> {
    /// Wraps an output stream.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes one signal as a single line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream rejects the write or the flush.
    pub fn emit(&mut self, signal: &Signal) -> EmitResult {
        let mut line = signal.encode();
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|source| EmitError {
                source: Arc::new(source),
            })
    }

    /// Reports overall progress, or that none is available when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn percentage(&mut self, percent: Option<u8>) -> EmitResult {
        self.emit(&Signal::Percentage(percent))
    }

    /// Reports progress of the current sub-task.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn sub_percentage(&mut self, percent: u8) -> EmitResult {
        self.emit(&Signal::SubPercentage(percent))
    }

    /// Reports a change of activity.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn status(&mut self, status: Status) -> EmitResult {
        self.emit(&Signal::Status(status))
    }

    /// Declares whether the current operation may be interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn allow_cancel(&mut self, allow: bool) -> EmitResult {
        self.emit(&Signal::AllowCancel(allow))
    }

    /// Reports one package result.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn package(
        &mut self,
        info: Info,
        package_id: &PackageId,
        summary: &str,
    ) -> EmitResult {
        self.emit(&Signal::Package {
            info,
            package_id: package_id.clone(),
            summary: summary.to_owned(),
        })
    }

    /// Reports extended package details.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn details(&mut self, details: PackageDetails) -> EmitResult {
        self.emit(&Signal::Details(Box::new(details)))
    }

    /// Reports the files shipped by a package.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn files(&mut self, package_id: &PackageId, files: Vec<String>) -> EmitResult {
        self.emit(&Signal::Files {
            package_id: package_id.clone(),
            files,
        })
    }

    /// Reports one configured repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn repo_detail(&mut self, repo_id: &str, name: &str, enabled: bool) -> EmitResult {
        self.emit(&Signal::RepoDetail {
            repo_id: repo_id.to_owned(),
            name: name.to_owned(),
            enabled,
        })
    }

    /// Reports one package category.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn category(
        &mut self,
        parent_id: &str,
        cat_id: &str,
        name: &str,
        summary: &str,
        icon: &str,
    ) -> EmitResult {
        self.emit(&Signal::Category {
            parent_id: parent_id.to_owned(),
            cat_id: cat_id.to_owned(),
            name: name.to_owned(),
            summary: summary.to_owned(),
            icon: icon.to_owned(),
        })
    }

    /// Reports an available distribution upgrade.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn distro_upgrade(
        &mut self,
        kind: DistroUpgradeKind,
        name: &str,
        summary: &str,
    ) -> EmitResult {
        self.emit(&Signal::DistroUpgrade {
            kind,
            name: name.to_owned(),
            summary: summary.to_owned(),
        })
    }

    /// Reports the details of one update.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn update_detail(&mut self, detail: UpdateDetail) -> EmitResult {
        self.emit(&Signal::UpdateDetail(Box::new(detail)))
    }

    /// Asks the controller to accept a repository key.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn repo_signature_required(&mut self, signature: RepoSignature) -> EmitResult {
        self.emit(&Signal::RepoSignatureRequired(Box::new(signature)))
    }

    /// Sends an informational message.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn message(&mut self, kind: MessageKind, text: &str) -> EmitResult {
        self.emit(&Signal::Message {
            kind,
            text: text.to_owned(),
        })
    }

    /// Requests a restart once the operation completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn require_restart(&mut self, restart: Restart, details: &str) -> EmitResult {
        self.emit(&Signal::RequireRestart {
            restart,
            details: details.to_owned(),
        })
    }

    /// Writes an `error` line.
    ///
    /// This only reports; it neither emits `finished` nor stops the process.
    /// Capabilities that must abort return
    /// [`BackendError::Fatal`](crate::backend::BackendError::Fatal) instead and
    /// the dispatcher closes the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn error(&mut self, code: ErrorCode, description: &str) -> EmitResult {
        self.emit(&Signal::Error {
            code,
            description: description.to_owned(),
        })
    }

    /// Names the item currently being worked on.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn data(&mut self, data: &str) -> EmitResult {
        self.emit(&Signal::Data(data.to_owned()))
    }

    /// Closes the output of the current command.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be written.
    pub fn finished(&mut self) -> EmitResult {
        self.emit(&Signal::Finished)
    }
}
