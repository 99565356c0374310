//! The closed set of outbound signals and their wire shapes.
//!
//! Each [`Signal`] variant corresponds to exactly one line kind with a fixed
//! field count and order. [`Signal::encode`] is the only place where that
//! shape is decided; the emitter and the dispatcher never assemble lines by
//! hand.

mod vocabulary;


use crate::codec::{FILES_PAYLOAD_DELIMITER, Field, encode_signal};
use crate::package_id::PackageId;

pub use self::vocabulary::{
    DistroUpgradeKind, ErrorCode, Group, Info, MessageKind, Restart, SigType, Status,
    UnknownToken, UpdateState,
};

/// Payload of the `details` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDetails {
    /// Package being described.
    pub package_id: PackageId,
    /// License expression.
    pub license: String,
    /// Package group.
    pub group: Group,
    /// Free-form description; line breaks are flattened on the wire.
    pub description: String,
    /// Upstream homepage.
    pub url: String,
    /// Size in bytes.
    pub size: u64,
}

/// Payload of the `update-detail` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDetail {
    /// Update being described.
    pub package_id: PackageId,
    /// Packages this update replaces.
    pub updates: String,
    /// Packages this update obsoletes.
    pub obsoletes: String,
    /// Vendor advisory URL.
    pub vendor_url: String,
    /// Bug tracker URL.
    pub bugzilla_url: String,
    /// CVE URL.
    pub cve_url: String,
    /// Restart required after applying the update.
    pub restart: Restart,
    /// Update description.
    pub update_text: String,
    /// Changelog excerpt.
    pub changelog: String,
    /// Release state.
    pub state: UpdateState,
    /// Issue date.
    pub issued: String,
    /// Last modification date.
    pub updated: String,
}

/// Payload of the `repo-signature-required` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSignature {
    /// Package that needs the signature.
    pub package_id: PackageId,
    /// Repository name.
    pub repo_name: String,
    /// URL where the key can be verified.
    pub key_url: String,
    /// Key user id.
    pub key_userid: String,
    /// Key id.
    pub key_id: String,
    /// Full key fingerprint.
    pub key_fingerprint: String,
    /// Key creation timestamp.
    pub key_timestamp: String,
    /// Signature scheme.
    pub sig_type: SigType,
}

/// One outbound line of the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Overall progress; `None` means no percentage updates are available.
    Percentage(Option<u8>),
    /// Progress of the current sub-task.
    SubPercentage(u8),
    /// Coarse activity change.
    Status(Status),
    /// Whether the controller may interrupt the current operation.
    AllowCancel(bool),
    /// One package result.
    Package {
        /// Package state.
        info: Info,
        /// Package identifier.
        package_id: PackageId,
        /// One-line summary.
        summary: String,
    },
    /// Extended package description.
    Details(Box<PackageDetails>),
    /// Files shipped by a package.
    Files {
        /// Package identifier.
        package_id: PackageId,
        /// File paths, joined with `;` on the wire.
        files: Vec<String>,
    },
    /// One configured repository.
    RepoDetail {
        /// Repository id.
        repo_id: String,
        /// Human readable name.
        name: String,
        /// Whether the repository is enabled.
        enabled: bool,
    },
    /// One package category.
    Category {
        /// Parent category id, empty for top-level categories.
        parent_id: String,
        /// Category id.
        cat_id: String,
        /// Display name.
        name: String,
        /// Summary.
        summary: String,
        /// Icon name.
        icon: String,
    },
    /// An available distribution upgrade.
    DistroUpgrade {
        /// Upgrade stability.
        kind: DistroUpgradeKind,
        /// Distribution name.
        name: String,
        /// Summary.
        summary: String,
    },
    /// Detailed description of an update.
    UpdateDetail(Box<UpdateDetail>),
    /// A repository key must be accepted before continuing.
    RepoSignatureRequired(Box<RepoSignature>),
    /// Informational message that does not stop the operation.
    Message {
        /// Message class.
        kind: MessageKind,
        /// Text.
        text: String,
    },
    /// A restart is needed once the operation completes.
    RequireRestart {
        /// Restart scope.
        restart: Restart,
        /// Free-form details.
        details: String,
    },
    /// An error report.
    Error {
        /// Error class.
        code: ErrorCode,
        /// Description.
        description: String,
    },
    /// The item currently being worked on.
    Data(String),
    /// Terminates the output of one command.
    Finished,
}

impl Signal {
    /// Returns the line kind written as the first field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Percentage(Some(_)) => "percentage",
            Self::Percentage(None) => "no-percentage-updates",
            Self::SubPercentage(_) => "subpercentage",
            Self::Status(_) => "status",
            Self::AllowCancel(_) => "allow-cancel",
            Self::Package { .. } => "package",
            Self::Details(_) => "details",
            Self::Files { .. } => "files",
            Self::RepoDetail { .. } => "repo-detail",
            Self::Category { .. } => "category",
            Self::DistroUpgrade { .. } => "distro-upgrade",
            Self::UpdateDetail(_) => "update-detail",
            Self::RepoSignatureRequired(_) => "repo-signature-required",
            Self::Message { .. } => "message",
            Self::RequireRestart { .. } => "require-restart",
            Self::Error { .. } => "error",
            Self::Data(_) => "data",
            Self::Finished => "finished",
        }
    }

    /// Encodes the signal as one protocol line, without the trailing newline.
    ///
    /// ```
    /// use pkbridge::package_id::PackageId;
    /// use pkbridge::signal::{Info, Signal};
    ///
    /// let signal = Signal::Package {
    ///     info: Info::Available,
    ///     package_id: PackageId::new("foo", "1.0", "amd64", "gentoo"),
    ///     summary: String::from("The foo tool"),
    /// };
    /// assert_eq!(
    ///     signal.encode(),
    ///     "package\tINFO_AVAILABLE\tfoo;1.0;amd64;gentoo\tThe foo tool"
    /// );
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        encode_signal(self.kind(), &self.fields())
    }

    fn fields(&self) -> Vec<Field<'_>> {
        match self {
            Self::Percentage(Some(percent)) => vec![Field::from((*percent).min(100))],
            Self::Percentage(None) | Self::Finished => Vec::new(),
            Self::SubPercentage(percent) => vec![Field::from((*percent).min(100))],
            Self::Status(status) => vec![Field::from(status.as_str())],
            Self::AllowCancel(allow) => vec![Field::from(*allow)],
            Self::Package {
                info,
                package_id,
                summary,
            } => vec![
                Field::from(info.as_str()),
                Field::from(package_id.to_string()),
                Field::from(summary),
            ],
            Self::Details(details) => vec![
                Field::from(details.package_id.to_string()),
                Field::from(&details.license),
                Field::from(details.group.as_str()),
                Field::from(&details.description),
                Field::from(&details.url),
                Field::from(details.size),
            ],
            Self::Files { package_id, files } => vec![
                Field::from(package_id.to_string()),
                Field::from(join_files(files)),
            ],
            Self::RepoDetail {
                repo_id,
                name,
                enabled,
            } => vec![
                Field::from(repo_id),
                Field::from(name),
                Field::from(*enabled),
            ],
            Self::Category {
                parent_id,
                cat_id,
                name,
                summary,
                icon,
            } => vec![
                Field::from(parent_id),
                Field::from(cat_id),
                Field::from(name),
                Field::from(summary),
                Field::from(icon),
            ],
            Self::DistroUpgrade {
                kind,
                name,
                summary,
            } => vec![
                Field::from(kind.as_str()),
                Field::from(name),
                Field::from(summary),
            ],
            Self::UpdateDetail(detail) => vec![
                Field::from(detail.package_id.to_string()),
                Field::from(&detail.updates),
                Field::from(&detail.obsoletes),
                Field::from(&detail.vendor_url),
                Field::from(&detail.bugzilla_url),
                Field::from(&detail.cve_url),
                Field::from(detail.restart.as_str()),
                Field::from(&detail.update_text),
                Field::from(&detail.changelog),
                Field::from(detail.state.as_str()),
                Field::from(&detail.issued),
                Field::from(&detail.updated),
            ],
            Self::RepoSignatureRequired(signature) => vec![
                Field::from(signature.package_id.to_string()),
                Field::from(&signature.repo_name),
                Field::from(&signature.key_url),
                Field::from(&signature.key_userid),
                Field::from(&signature.key_id),
                Field::from(&signature.key_fingerprint),
                Field::from(&signature.key_timestamp),
                Field::from(signature.sig_type.as_str()),
            ],
            Self::Message { kind, text } => vec![Field::from(kind.as_str()), Field::from(text)],
            Self::RequireRestart { restart, details } => {
                vec![Field::from(restart.as_str()), Field::from(details)]
            }
            Self::Error { code, description } => {
                vec![Field::from(code.as_str()), Field::from(description)]
            }
            Self::Data(data) => vec![Field::from(data)],
        }
    }
}

fn join_files(files: &[String]) -> String {
    let separator = FILES_PAYLOAD_DELIMITER.to_string();
    files.join(separator.as_str())
}
