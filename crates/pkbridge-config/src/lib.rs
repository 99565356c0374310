//! Shared configuration for pkbridge backend processes.
//!
//! Configuration is layered with `ortho_config`: built-in defaults are
//! overridden by a configuration file (`--config-path`), then by
//! `PKBRIDGE_*` environment variables, then by command-line flags. Backend
//! binaries only consume the flags listed in [`CONFIG_CLI_FLAGS`]; every other
//! token on the command line belongs to the line protocol.

mod defaults;
mod logging;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CATALOG_PATH, DEFAULT_LOG_FILTER, default_catalog_path, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Command-line flags recognised by the configuration loader.
///
/// Configuration flags must appear before any command tokens. Keep this list
/// in sync with the fields of [`Config`].
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--lock-file",
    "--catalog-path",
];

/// Runtime configuration shared by every backend binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PKBRIDGE")]
pub struct Config {
    /// `tracing` filter expression applied to stderr logging.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    log_filter: String,
    /// Output format for stderr logging.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    log_format: LogFormat,
    /// Lock file created while the backend holds exclusive access.
    #[serde(default)]
    lock_file: Option<Utf8PathBuf>,
    /// Package catalog consumed by the catalog backend.
    #[serde(default = "default_catalog_path")]
    #[ortho_config(default = default_catalog_path())]
    catalog_path: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            lock_file: None,
            catalog_path: default_catalog_path(),
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the lock file path, when one is configured.
    #[must_use]
    pub fn lock_file(&self) -> Option<&Utf8Path> {
        self.lock_file.as_deref()
    }

    /// Returns the catalog database path.
    #[must_use]
    pub fn catalog_path(&self) -> &Utf8Path {
        self.catalog_path.as_path()
    }

    /// Returns a copy of the configuration using a different catalog path.
    #[must_use]
    pub fn with_catalog_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.catalog_path = path.into();
        self
    }

    /// Returns a copy of the configuration using the given lock file.
    #[must_use]
    pub fn with_lock_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }
}
