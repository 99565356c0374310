//! Four-part package identifiers: `name;version;arch;origin`.
//!
//! The origin is either a repository name or the [`INSTALLED_ORIGIN`]
//! sentinel, which distinguishes an installed copy from the same version
//! still available in a repository.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;


/// Separates the four package identifier fields.
pub const PACKAGE_ID_SEPARATOR: char = ';';

/// Origin sentinel marking an installed package.
pub const INSTALLED_ORIGIN: &str = "installed";

/// A package identifier string was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageIdError {
    /// The identifier did not contain exactly four fields.
    #[error("package id '{raw}' has {found} field(s), expected 4")]
    FieldCount {
        /// Identifier as received.
        raw: String,
        /// Number of fields found.
        found: usize,
    },
    /// The name field was empty.
    #[error("package id '{raw}' has an empty name")]
    EmptyName {
        /// Identifier as received.
        raw: String,
    },
}

/// Composite key naming one package, version and provenance.
///
/// # Example
///
/// ```
/// use pkbridge::package_id::PackageId;
///
/// let id: PackageId = "app-editors/vim;9.0.1;amd64;installed".parse()?;
/// assert_eq!(id.name(), "app-editors/vim");
/// assert!(id.is_installed());
/// assert_eq!(id.to_string(), "app-editors/vim;9.0.1;amd64;installed");
/// # Ok::<(), pkbridge::package_id::PackageIdError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    name: String,
    version: String,
    arch: String,
    origin: String,
}

impl PackageId {
    /// Builds an identifier from its four fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
            origin: origin.into(),
        }
    }

    /// Builds an identifier for an installed package.
    #[must_use]
    pub fn installed(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self::new(name, version, arch, INSTALLED_ORIGIN)
    }

    /// Parses an identifier, requiring exactly four fields and a name.
    ///
    /// # Errors
    ///
    /// Returns [`PackageIdError`] when the string is malformed.
    pub fn parse(raw: &str) -> Result<Self, PackageIdError> {
        let fields: Vec<&str> = raw.split(PACKAGE_ID_SEPARATOR).collect();
        let [name, version, arch, origin] = fields.as_slice() else {
            return Err(PackageIdError::FieldCount {
                raw: raw.to_owned(),
                found: fields.len(),
            });
        };
        if name.is_empty() {
            return Err(PackageIdError::EmptyName {
                raw: raw.to_owned(),
            });
        }
        Ok(Self::new(*name, *version, *arch, *origin))
    }

    /// Returns the package name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the package version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the architecture or keyword field.
    #[must_use]
    pub const fn arch(&self) -> &str {
        self.arch.as_str()
    }

    /// Returns the origin: a repository name or `installed`.
    #[must_use]
    pub const fn origin(&self) -> &str {
        self.origin.as_str()
    }

    /// Returns `true` when the origin is the installed sentinel.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.origin == INSTALLED_ORIGIN
    }

    /// Returns the same package with a different origin.
    #[must_use]
    pub fn with_origin(&self, origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.name,
            self.version,
            self.arch,
            self.origin,
            sep = PACKAGE_ID_SEPARATOR
        )
    }
}

impl FromStr for PackageId {
    type Err = PackageIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}
