use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the backend binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default location of the catalog backend database.
pub const DEFAULT_CATALOG_PATH: &str = "/var/lib/pkbridge/catalog.json";

/// Default log filter expression used by the backend binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the backend binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default catalog database path.
#[must_use]
pub fn default_catalog_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CATALOG_PATH)
}
