//! Filter expressions understood by the catalog backend.
//!
//! A filter is a `;`-separated list of tokens. Only the installation state
//! restricts results; `none` and tokens this backend does not model are
//! accepted and ignored.

use thiserror::Error;

use crate::catalog::CatalogPackage;


/// A filter expression asked for contradictory restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("filter '{raw}' requires both installed and not installed packages")]
pub struct FilterError {
    /// Filter as received.
    pub raw: String,
}

/// Parsed filter restrictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filters {
    installed: Option<bool>,
}

impl Filters {
    /// Parses a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when `installed` and `~installed` are both
    /// present.
    ///
    /// # Example
    ///
    /// ```
    /// use pkbridge_catalog::filter::Filters;
    ///
    /// let filters = Filters::parse("~installed;newest")?;
    /// assert_eq!(filters.installed(), Some(false));
    /// # Ok::<(), pkbridge_catalog::filter::FilterError>(())
    /// ```
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        let mut installed = None;
        for token in raw.split(';').map(str::trim) {
            let wanted = match token {
                "installed" => true,
                "~installed" => false,
                _ => continue,
            };
            if installed.is_some_and(|previous| previous != wanted) {
                return Err(FilterError {
                    raw: raw.to_owned(),
                });
            }
            installed = Some(wanted);
        }
        Ok(Self { installed })
    }

    /// Returns the required installation state, if any.
    #[must_use]
    pub const fn installed(self) -> Option<bool> {
        self.installed
    }

    /// Returns `true` when `package` passes every restriction.
    #[must_use]
    pub fn accepts(self, package: &CatalogPackage) -> bool {
        self.installed
            .is_none_or(|installed| package.installed == installed)
    }
}
