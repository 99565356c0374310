//! Closed token sets carried inside signal fields.
//!
//! Every enumeration renders to a stable upper-case wire token
//! (`ERROR_NOT_SUPPORTED`, `STATUS_QUERY`, ...) and parses back from it, so
//! controllers and backends share one vocabulary checked at compile time.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A wire token did not belong to the expected vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {vocabulary} token '{token}'")]
pub struct UnknownToken {
    /// Vocabulary that was being parsed.
    pub vocabulary: &'static str,
    /// Offending token.
    pub token: String,
}

macro_rules! wire_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $($(#[$variant_meta:meta])* $variant:ident => $token:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
        }

        impl $name {
            /// Every member of the vocabulary, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Returns the wire token for this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownToken;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($token => Ok(Self::$variant),)+
                    other => Err(UnknownToken {
                        vocabulary: $label,
                        token: other.to_owned(),
                    }),
                }
            }
        }
    };
}

wire_vocabulary! {
    /// Error classes reported through the `error` signal.
    ErrorCode ("error code") {
        /// No network connection is available.
        NoNetwork => "ERROR_NO_NETWORK",
        /// The capability is not implemented by this backend.
        NotSupported => "ERROR_NOT_SUPPORTED",
        /// An unexpected fault or protocol violation.
        InternalError => "ERROR_INTERNAL_ERROR",
        /// Signature verification failed.
        GpgFailure => "ERROR_GPG_FAILURE",
        /// A package identifier could not be parsed.
        PackageIdInvalid => "ERROR_PACKAGE_ID_INVALID",
        /// The package is not installed.
        PackageNotInstalled => "ERROR_PACKAGE_NOT_INSTALLED",
        /// The package does not exist in any repository.
        PackageNotFound => "ERROR_PACKAGE_NOT_FOUND",
        /// The package is already installed.
        PackageAlreadyInstalled => "ERROR_PACKAGE_ALREADY_INSTALLED",
        /// Fetching the package failed.
        PackageDownloadFailed => "ERROR_PACKAGE_DOWNLOAD_FAILED",
        /// The requested group does not exist.
        GroupNotFound => "ERROR_GROUP_NOT_FOUND",
        /// Dependency resolution failed.
        DepResolutionFailed => "ERROR_DEP_RESOLUTION_FAILED",
        /// The filter expression is not understood.
        FilterInvalid => "ERROR_FILTER_INVALID",
        /// The underlying transaction failed.
        TransactionError => "ERROR_TRANSACTION_ERROR",
        /// The transaction was cancelled.
        TransactionCancelled => "ERROR_TRANSACTION_CANCELLED",
        /// No package cache is available.
        NoCache => "ERROR_NO_CACHE",
        /// The repository does not exist.
        RepoNotFound => "ERROR_REPO_NOT_FOUND",
        /// The package is part of the base system.
        CannotRemoveSystemPackage => "ERROR_CANNOT_REMOVE_SYSTEM_PACKAGE",
        /// The backend process was killed.
        ProcessKill => "ERROR_PROCESS_KILL",
        /// Backend initialisation failed.
        FailedInitialization => "ERROR_FAILED_INITIALIZATION",
        /// Backend finalisation failed.
        FailedFinalise => "ERROR_FAILED_FINALISE",
        /// The package manager configuration could not be parsed.
        FailedConfigParsing => "ERROR_FAILED_CONFIG_PARSING",
        /// The operation cannot be cancelled.
        CannotCancel => "ERROR_CANNOT_CANCEL",
        /// The exclusive lock is held elsewhere.
        CannotGetLock => "ERROR_CANNOT_GET_LOCK",
        /// Nothing to update.
        NoPackagesToUpdate => "ERROR_NO_PACKAGES_TO_UPDATE",
        /// Repository configuration could not be written.
        CannotWriteRepoConfig => "ERROR_CANNOT_WRITE_REPO_CONFIG",
        /// Installing a local file failed.
        LocalInstallFailed => "ERROR_LOCAL_INSTALL_FAILED",
        /// A signature was present but invalid.
        BadGpgSignature => "ERROR_BAD_GPG_SIGNATURE",
        /// A required signature was absent.
        MissingGpgSignature => "ERROR_MISSING_GPG_SIGNATURE",
        /// The repository configuration is broken.
        RepoConfigurationError => "ERROR_REPO_CONFIGURATION_ERROR",
        /// Two packages ship conflicting files.
        FileConflicts => "ERROR_FILE_CONFLICTS",
        /// Two packages conflict.
        PackageConflicts => "ERROR_PACKAGE_CONFLICTS",
        /// The repository is unreachable.
        RepoNotAvailable => "ERROR_REPO_NOT_AVAILABLE",
        /// A local package file is not valid.
        InvalidPackageFile => "ERROR_INVALID_PACKAGE_FILE",
        /// A file could not be found.
        FileNotFound => "ERROR_FILE_NOT_FOUND",
        /// No upgrade data is available for the distribution.
        NoDistroUpgradeData => "ERROR_NO_DISTRO_UPGRADE_DATA",
        /// The package targets another architecture.
        IncompatibleArchitecture => "ERROR_INCOMPATIBLE_ARCHITECTURE",
        /// The target device is full.
        NoSpaceOnDevice => "ERROR_NO_SPACE_ON_DEVICE",
        /// The caller lacks the required privileges.
        NotAuthorized => "ERROR_NOT_AUTHORIZED",
        /// The update could not be found.
        UpdateNotFound => "ERROR_UPDATE_NOT_FOUND",
    }
}

wire_vocabulary! {
    /// Coarse backend activity reported through the `status` signal.
    Status ("status") {
        /// Unknown activity.
        Unknown => "STATUS_UNKNOWN",
        /// Waiting for a resource.
        Wait => "STATUS_WAIT",
        /// Preparing the operation.
        Setup => "STATUS_SETUP",
        /// Running a generic operation.
        Running => "STATUS_RUNNING",
        /// Querying the package database.
        Query => "STATUS_QUERY",
        /// Collecting package information.
        Info => "STATUS_INFO",
        /// Removing packages.
        Remove => "STATUS_REMOVE",
        /// Refreshing repository metadata.
        RefreshCache => "STATUS_REFRESH_CACHE",
        /// Downloading packages.
        Download => "STATUS_DOWNLOAD",
        /// Installing packages.
        Install => "STATUS_INSTALL",
        /// Updating packages.
        Update => "STATUS_UPDATE",
        /// Cleaning up.
        Cleanup => "STATUS_CLEANUP",
        /// Obsoleting packages.
        Obsolete => "STATUS_OBSOLETE",
        /// Resolving dependencies.
        DepResolve => "STATUS_DEP_RESOLVE",
        /// Checking signatures.
        SigCheck => "STATUS_SIG_CHECK",
        /// Testing the transaction.
        TestCommit => "STATUS_TEST_COMMIT",
        /// Committing the transaction.
        Commit => "STATUS_COMMIT",
        /// Requesting data.
        Request => "STATUS_REQUEST",
        /// Finished.
        Finished => "STATUS_FINISHED",
        /// Cancelling.
        Cancel => "STATUS_CANCEL",
        /// Downloading repository metadata.
        DownloadRepository => "STATUS_DOWNLOAD_REPOSITORY",
        /// Downloading the package list.
        DownloadPackagelist => "STATUS_DOWNLOAD_PACKAGELIST",
        /// Downloading file lists.
        DownloadFilelist => "STATUS_DOWNLOAD_FILELIST",
        /// Downloading changelogs.
        DownloadChangelog => "STATUS_DOWNLOAD_CHANGELOG",
        /// Downloading group data.
        DownloadGroup => "STATUS_DOWNLOAD_GROUP",
        /// Downloading update information.
        DownloadUpdateinfo => "STATUS_DOWNLOAD_UPDATEINFO",
        /// Loading the package cache.
        LoadingCache => "STATUS_LOADING_CACHE",
        /// Generating the package list.
        GeneratePackageList => "STATUS_GENERATE_PACKAGE_LIST",
    }
}

wire_vocabulary! {
    /// Per-package state carried by the `package` signal.
    Info ("info") {
        /// Installed on the system.
        Installed => "INFO_INSTALLED",
        /// Available from a repository.
        Available => "INFO_AVAILABLE",
        /// Low priority update.
        Low => "INFO_LOW",
        /// Enhancement update.
        Enhancement => "INFO_ENHANCEMENT",
        /// Normal update.
        Normal => "INFO_NORMAL",
        /// Bug fix update.
        Bugfix => "INFO_BUGFIX",
        /// Important update.
        Important => "INFO_IMPORTANT",
        /// Security update.
        Security => "INFO_SECURITY",
        /// Update blocked by policy.
        Blocked => "INFO_BLOCKED",
        /// Being downloaded.
        Downloading => "INFO_DOWNLOADING",
        /// Being updated.
        Updating => "INFO_UPDATING",
        /// Being installed.
        Installing => "INFO_INSTALLING",
        /// Being removed.
        Removing => "INFO_REMOVING",
        /// Being cleaned up.
        Cleanup => "INFO_CLEANUP",
        /// Being obsoleted.
        Obsoleting => "INFO_OBSOLETING",
        /// Finished processing.
        Finished => "INFO_FINISHED",
        /// Being reinstalled.
        Reinstalling => "INFO_REINSTALLING",
        /// Being downgraded.
        Downgrading => "INFO_DOWNGRADING",
    }
}

wire_vocabulary! {
    /// Classes of the informational `message` signal.
    MessageKind ("message kind") {
        /// A mirror is broken.
        BrokenMirror => "MESSAGE_BROKEN_MIRROR",
        /// A connection was refused.
        ConnectionRefused => "MESSAGE_CONNECTION_REFUSED",
        /// A parameter was invalid.
        ParameterInvalid => "MESSAGE_PARAMETER_INVALID",
        /// A priority value was invalid.
        PriorityInvalid => "MESSAGE_PRIORITY_INVALID",
        /// Generic backend diagnostic.
        BackendError => "MESSAGE_BACKEND_ERROR",
        /// Generic daemon diagnostic.
        DaemonError => "MESSAGE_DAEMON_ERROR",
        /// The package cache is being rebuilt.
        CacheBeingRebuilt => "MESSAGE_CACHE_BEING_REBUILT",
        /// A package is untrusted.
        UntrustedPackage => "MESSAGE_UNTRUSTED_PACKAGE",
        /// A newer package exists.
        NewerPackageExists => "MESSAGE_NEWER_PACKAGE_EXISTS",
        /// A requested package could not be found.
        CouldNotFindPackage => "MESSAGE_COULD_NOT_FIND_PACKAGE",
        /// Configuration files changed.
        ConfigFilesChanged => "MESSAGE_CONFIG_FILES_CHANGED",
        /// The package is already installed.
        PackageAlreadyInstalled => "MESSAGE_PACKAGE_ALREADY_INSTALLED",
        /// Automatic removal was skipped.
        AutoremoveIgnored => "MESSAGE_AUTOREMOVE_IGNORED",
        /// Repository metadata could not be fetched.
        RepoMetadataDownloadFailed => "MESSAGE_REPO_METADATA_DOWNLOAD_FAILED",
        /// The repository targets developers.
        RepoForDevelopersOnly => "MESSAGE_REPO_FOR_DEVELOPERS_ONLY",
    }
}

wire_vocabulary! {
    /// Scope of a restart requested after an operation.
    Restart ("restart") {
        /// No restart needed.
        None => "RESTART_NONE",
        /// Restart the application.
        Application => "RESTART_APPLICATION",
        /// Restart the session.
        Session => "RESTART_SESSION",
        /// Restart the system.
        System => "RESTART_SYSTEM",
        /// Restart the session for a security update.
        SecuritySession => "RESTART_SECURITY_SESSION",
        /// Restart the system for a security update.
        SecuritySystem => "RESTART_SECURITY_SYSTEM",
    }
}

wire_vocabulary! {
    /// Package groups used by `details` and `search-group`.
    Group ("group") {
        /// Accessibility tools.
        Accessibility => "GROUP_ACCESSIBILITY",
        /// Accessories.
        Accessories => "GROUP_ACCESSORIES",
        /// Administration tools.
        AdminTools => "GROUP_ADMIN_TOOLS",
        /// Communication.
        Communication => "GROUP_COMMUNICATION",
        /// GNOME desktop.
        DesktopGnome => "GROUP_DESKTOP_GNOME",
        /// KDE desktop.
        DesktopKde => "GROUP_DESKTOP_KDE",
        /// Other desktops.
        DesktopOther => "GROUP_DESKTOP_OTHER",
        /// Xfce desktop.
        DesktopXfce => "GROUP_DESKTOP_XFCE",
        /// Education.
        Education => "GROUP_EDUCATION",
        /// Fonts.
        Fonts => "GROUP_FONTS",
        /// Games.
        Games => "GROUP_GAMES",
        /// Graphics.
        Graphics => "GROUP_GRAPHICS",
        /// Internet.
        Internet => "GROUP_INTERNET",
        /// Legacy software.
        Legacy => "GROUP_LEGACY",
        /// Localization.
        Localization => "GROUP_LOCALIZATION",
        /// Multimedia.
        Multimedia => "GROUP_MULTIMEDIA",
        /// Networking.
        Network => "GROUP_NETWORK",
        /// Office.
        Office => "GROUP_OFFICE",
        /// Everything else.
        Other => "GROUP_OTHER",
        /// Power management.
        PowerManagement => "GROUP_POWER_MANAGEMENT",
        /// Programming.
        Programming => "GROUP_PROGRAMMING",
        /// Publishing.
        Publishing => "GROUP_PUBLISHING",
        /// Repository definitions.
        Repos => "GROUP_REPOS",
        /// Security.
        Security => "GROUP_SECURITY",
        /// Servers.
        Servers => "GROUP_SERVERS",
        /// System.
        System => "GROUP_SYSTEM",
        /// Virtualization.
        Virtualization => "GROUP_VIRTUALIZATION",
        /// Science.
        Science => "GROUP_SCIENCE",
        /// Documentation.
        Documentation => "GROUP_DOCUMENTATION",
        /// Electronics.
        Electronics => "GROUP_ELECTRONICS",
        /// Group is not known.
        Unknown => "GROUP_UNKNOWN",
    }
}

wire_vocabulary! {
    /// Stability of an advertised distribution upgrade.
    DistroUpgradeKind ("distro upgrade kind") {
        /// Stable release.
        Stable => "DISTRO_UPGRADE_STABLE",
        /// Unstable or pre-release.
        Unstable => "DISTRO_UPGRADE_UNSTABLE",
    }
}

wire_vocabulary! {
    /// Release state of an update described by `update-detail`.
    UpdateState ("update state") {
        /// Stable update.
        Stable => "UPDATE_STATE_STABLE",
        /// Unstable update.
        Unstable => "UPDATE_STATE_UNSTABLE",
        /// Update in testing.
        Testing => "UPDATE_STATE_TESTING",
    }
}

wire_vocabulary! {
    /// Signature schemes for `repo-signature-required`.
    SigType ("signature type") {
        /// OpenPGP signature.
        Gpg => "SIGTYPE_GPG",
    }
}
