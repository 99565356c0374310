//! On-disk package catalog and its persistence.
//!
//! The catalog is a single JSON document listing repositories and package
//! entries. An entry is either installed or available from a repository;
//! several entries may share a name when a newer version is on offer.

use std::cmp::Ordering;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use pkbridge::PackageId;
use pkbridge::package_id::INSTALLED_ORIGIN;
use pkbridge::signal::{Group, Info};
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use thiserror::Error;


/// Errors raised while reading or writing the catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Read {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
    /// The catalog file is not valid catalog JSON.
    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Underlying JSON failure.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The catalog could not be serialised.
    #[error("failed to serialise catalog: {source}")]
    Serialise {
        /// Underlying JSON failure.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The catalog could not be written back.
    #[error("failed to write catalog {path}: {source}")]
    Write {
        /// Catalog location.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
}

/// A configured package source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository id, used as the origin of available packages.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Disabled repositories hide their available packages.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

/// One package version known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPackage {
    /// Package name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Architecture.
    #[serde(default)]
    pub arch: String,
    /// Repository offering this version.
    #[serde(default)]
    pub repo: String,
    /// Whether this version is installed.
    #[serde(default)]
    pub installed: bool,
    /// One-line summary.
    #[serde(default)]
    pub summary: String,
    /// License expression.
    #[serde(default)]
    pub license: String,
    /// Group name such as `programming` or `admin-tools`.
    #[serde(default)]
    pub group: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Upstream homepage.
    #[serde(default)]
    pub url: String,
    /// Installed size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Files shipped by the package.
    #[serde(default)]
    pub files: Vec<String>,
    /// Names of the packages this one depends on.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Archive that `download-packages` copies, relative to the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distfile: Option<Utf8PathBuf>,
}

impl CatalogPackage {
    /// Returns the identifier under which this entry is reported.
    #[must_use]
    pub fn package_id(&self) -> PackageId {
        if self.installed {
            PackageId::installed(&self.name, &self.version, &self.arch)
        } else {
            PackageId::new(&self.name, &self.version, &self.arch, &self.repo)
        }
    }

    /// Returns the `info` token for package lines.
    #[must_use]
    pub const fn info(&self) -> Info {
        if self.installed {
            Info::Installed
        } else {
            Info::Available
        }
    }

    /// Returns the package group, or [`Group::Unknown`] when unrecognised.
    #[must_use]
    pub fn group(&self) -> Group {
        parse_group(&self.group).unwrap_or(Group::Unknown)
    }

    /// Returns `true` when `id` names this entry.
    ///
    /// Name, version and arch must match. An `installed` origin requires an
    /// installed entry; any other non-empty origin must be the repository.
    #[must_use]
    pub fn matches(&self, id: &PackageId) -> bool {
        if self.name != id.name() || self.version != id.version() || self.arch != id.arch() {
            return false;
        }
        match id.origin() {
            "" => true,
            INSTALLED_ORIGIN => self.installed,
            origin => self.repo == origin,
        }
    }
}

/// Parses a group name such as `admin-tools`, `programming` or
/// `GROUP_PROGRAMMING`.
#[must_use]
pub fn parse_group(raw: &str) -> Option<Group> {
    let normalised = raw.trim().replace('-', "_").to_ascii_uppercase();
    let token = if normalised.starts_with("GROUP_") {
        normalised
    } else {
        format!("GROUP_{normalised}")
    };
    token.parse().ok()
}

/// The whole catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Configured repositories.
    #[serde(default)]
    pub repos: Vec<Repository>,
    /// Known package versions.
    #[serde(default)]
    pub packages: Vec<CatalogPackage>,
}

impl Catalog {
    /// Returns `true` unless `repo` is listed and disabled.
    #[must_use]
    pub fn is_repo_enabled(&self, repo: &str) -> bool {
        self.repos
            .iter()
            .find(|candidate| candidate.id == repo)
            .is_none_or(|candidate| candidate.enabled)
    }

    /// Returns a repository by id.
    pub fn repository_mut(&mut self, id: &str) -> Option<&mut Repository> {
        self.repos.iter_mut().find(|repo| repo.id == id)
    }

    /// Iterates over installed entries and entries from enabled repositories.
    pub fn visible(&self) -> impl Iterator<Item = &CatalogPackage> {
        self.packages
            .iter()
            .filter(|package| package.installed || self.is_repo_enabled(&package.repo))
    }

    /// Finds the entry named by `id`.
    #[must_use]
    pub fn find(&self, id: &PackageId) -> Option<&CatalogPackage> {
        self.packages.iter().find(|package| package.matches(id))
    }

    /// Returns the installed version of `name`, if any.
    #[must_use]
    pub fn installed(&self, name: &str) -> Option<&CatalogPackage> {
        self.packages
            .iter()
            .find(|package| package.installed && package.name == name)
    }

    /// Returns the preferred entry for `name`: the installed one, otherwise
    /// the newest visible version.
    #[must_use]
    pub fn preferred(&self, name: &str) -> Option<&CatalogPackage> {
        self.installed(name).or_else(|| {
            self.visible()
                .filter(|package| package.name == name)
                .max_by(|left, right| compare_versions(&left.version, &right.version))
        })
    }

    /// Returns the newest available version of `name` that is newer than
    /// `version`.
    #[must_use]
    pub fn newer_than(&self, name: &str, version: &str) -> Option<&CatalogPackage> {
        self.visible()
            .filter(|package| {
                !package.installed
                    && package.name == name
                    && compare_versions(&package.version, version) == Ordering::Greater
            })
            .max_by(|left, right| compare_versions(&left.version, &right.version))
    }

    /// Returns the installed entries that depend on `name`.
    pub fn installed_dependents<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a CatalogPackage> + 'a {
        self.packages.iter().filter(move |package| {
            package.installed && package.depends.iter().any(|dependency| dependency == name)
        })
    }
}

/// Orders version strings segment by segment.
///
/// Segments are split on `.`, `-` and `_`; numeric segments compare
/// numerically, others lexically, and a version with extra segments is newer.
#[must_use]
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut left_segments = left.split(['.', '-', '_']);
    let mut right_segments = right.split(['.', '-', '_']);
    loop {
        match (left_segments.next(), right_segments.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(left_segment), Some(right_segment)) => {
                let ordering = match (
                    left_segment.parse::<u64>(),
                    right_segment.parse::<u64>(),
                ) {
                    (Ok(left_number), Ok(right_number)) => left_number.cmp(&right_number),
                    _ => left_segment.cmp(right_segment),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Reads and atomically rewrites the catalog file.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: Utf8PathBuf,
}

impl CatalogStore {
    /// Creates a store for the catalog at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the catalog location.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_path()
    }

    /// Resolves a distfile path relative to the catalog's directory.
    #[must_use]
    pub fn resolve_distfile(&self, distfile: &Utf8Path) -> Utf8PathBuf {
        if distfile.is_absolute() {
            return distfile.to_path_buf();
        }
        self.directory().join(distfile)
    }

    /// Loads the catalog from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the file is unreadable or malformed.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| CatalogError::Read {
            path: self.path.clone(),
            source: Arc::new(source),
        })?;
        serde_json::from_str(&contents).map_err(|source| CatalogError::Parse {
            path: self.path.clone(),
            source: Arc::new(source),
        })
    }

    /// Writes the catalog through a temporary file renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when serialisation or any file step fails.
    pub fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let mut contents = serde_json::to_vec_pretty(catalog).map_err(|source| {
            CatalogError::Serialise {
                source: Arc::new(source),
            }
        })?;
        contents.push(b'\n');
        self.write_atomically(&contents)
            .map_err(|source| CatalogError::Write {
                path: self.path.clone(),
                source: Arc::new(source),
            })
    }

    fn directory(&self) -> &Utf8Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    fn write_atomically(&self, contents: &[u8]) -> io::Result<()> {
        let mut builder = Builder::new();
        builder.prefix(self.path.file_name().unwrap_or("catalog"));
        builder.suffix(".tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o644));
        }
        let mut file = builder.tempfile_in(self.directory())?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}
