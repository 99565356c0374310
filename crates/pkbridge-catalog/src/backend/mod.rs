//! [`Backend`] implementation serving the JSON package catalog.
//!
//! Queries start with a status, `allow-cancel true` and
//! `no-percentage-updates`, then report results. Problems with a single item
//! are reported inline and the remaining items are still processed; only
//! problems with the whole request end the command.

use std::collections::HashSet;

use camino::Utf8Path;
use pkbridge::codec::text_to_bool;
use pkbridge::emitter::{EmitError, EmitResult};
use pkbridge::signal::{ErrorCode, Info, MessageKind, PackageDetails, Status};
use pkbridge::{Backend, BackendError, BackendResult, Job, PackageId, Signals};
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogPackage, CatalogStore, compare_versions, parse_group};
use crate::fetch::{CopyFetcher, Fetcher};
use crate::filter::Filters;

#[cfg(test)]
mod tests;

const BACKEND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::backend");

/// Backend answering protocol commands from a catalog file.
///
/// The catalog is read on first use and kept in memory until
/// `refresh-cache`. Every mutation holds the backend lock while it rewrites
/// the file.
#[derive(Debug)]
pub struct CatalogBackend<F = CopyFetcher> {
    store: CatalogStore,
    catalog: Option<Catalog>,
    fetcher: F,
    locale: Option<String>,
}

impl CatalogBackend {
    /// Creates a backend that copies distfiles from the local filesystem.
    #[must_use]
    pub const fn new(store: CatalogStore) -> Self {
        Self::with_fetcher(store, CopyFetcher)
    }
}

impl<F> CatalogBackend<F> {
    /// Creates a backend using `fetcher` for `download-packages`.
    #[must_use]
    pub const fn with_fetcher(store: CatalogStore, fetcher: F) -> Self {
        Self {
            store,
            catalog: None,
            fetcher,
            locale: None,
        }
    }

    /// Returns the catalog store.
    #[must_use]
    pub const fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Returns the locale last set by the controller.
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }
}

impl<F: Fetcher> Backend for CatalogBackend<F> {
    fn search_name(&mut self, job: &mut Job<'_>, filters: &str, search: &str) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Query)?;
        let wanted = parse_filters(filters)?;
        let pattern = search_pattern(search)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for package in catalog
            .visible()
            .filter(|package| wanted.accepts(package) && pattern.is_match(&package.name))
        {
            emit_package(signals, package)?;
        }
        Ok(())
    }

    fn search_details(&mut self, job: &mut Job<'_>, filters: &str, search: &str) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Query)?;
        let wanted = parse_filters(filters)?;
        let pattern = search_pattern(search)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for package in catalog.visible().filter(|package| {
            wanted.accepts(package)
                && [&package.name, &package.summary, &package.description]
                    .into_iter()
                    .any(|text| pattern.is_match(text))
        }) {
            emit_package(signals, package)?;
        }
        Ok(())
    }

    fn search_group(&mut self, job: &mut Job<'_>, filters: &str, group: &str) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Query)?;
        let wanted = parse_filters(filters)?;
        let Some(wanted_group) = parse_group(group) else {
            return Err(BackendError::fatal(
                ErrorCode::GroupNotFound,
                format!("Group {group} is not known"),
            ));
        };
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for package in catalog
            .visible()
            .filter(|package| wanted.accepts(package) && package.group() == wanted_group)
        {
            emit_package(signals, package)?;
        }
        Ok(())
    }

    fn search_file(&mut self, job: &mut Job<'_>, filters: &str, path: &str) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Query)?;
        let wanted = parse_filters(filters)?;
        let pattern = search_pattern(path)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        // Only installed packages have a trustworthy file list.
        for package in catalog.packages.iter().filter(|package| {
            package.installed
                && wanted.accepts(package)
                && package.files.iter().any(|file| pattern.is_match(file))
        }) {
            emit_package(signals, package)?;
        }
        Ok(())
    }

    fn get_depends(
        &mut self,
        job: &mut Job<'_>,
        filters: &str,
        package_ids: &[String],
        recursive: &str,
    ) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Info)?;
        let wanted = parse_filters(filters)?;
        let follow = text_to_bool(recursive);
        let catalog = loaded(&mut self.catalog, &self.store)?;
        let mut seen: HashSet<&str> = HashSet::new();
        for raw in package_ids {
            let Some(id) = parse_id(signals, raw)? else {
                continue;
            };
            let Some(package) = catalog.find(&id) else {
                could_not_find(signals, raw)?;
                continue;
            };
            seen.insert(package.name.as_str());
            let mut pending: Vec<&str> = package.depends.iter().map(String::as_str).collect();
            while let Some(name) = pending.pop() {
                if !seen.insert(name) {
                    continue;
                }
                let Some(dependency) = catalog.preferred(name) else {
                    could_not_find(signals, name)?;
                    continue;
                };
                if wanted.accepts(dependency) {
                    emit_package(signals, dependency)?;
                }
                if follow {
                    pending.extend(dependency.depends.iter().map(String::as_str));
                }
            }
        }
        Ok(())
    }

    fn get_packages(&mut self, job: &mut Job<'_>, filters: &str) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Query)?;
        let wanted = parse_filters(filters)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for package in catalog.visible().filter(|package| wanted.accepts(package)) {
            emit_package(signals, package)?;
        }
        Ok(())
    }

    fn get_requires(
        &mut self,
        job: &mut Job<'_>,
        filters: &str,
        package_ids: &[String],
        recursive: &str,
    ) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Running)?;
        let wanted = parse_filters(filters)?;
        let follow = text_to_bool(recursive);
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for raw in package_ids {
            let Some(id) = parse_id(signals, raw)? else {
                continue;
            };
            let Some(package) = catalog.find(&id).filter(|package| package.installed) else {
                signals.error(
                    ErrorCode::PackageNotInstalled,
                    &format!("Package {raw} is not installed"),
                )?;
                continue;
            };
            for name in dependents(catalog, &package.name, follow) {
                if let Some(dependent) = catalog.installed(&name)
                    && wanted.accepts(dependent)
                {
                    emit_package(signals, dependent)?;
                }
            }
        }
        Ok(())
    }

    fn refresh_cache(&mut self, job: &mut Job<'_>) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::RefreshCache)?;
        self.catalog = None;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        debug!(
            target: BACKEND_TARGET,
            packages = catalog.packages.len(),
            repos = catalog.repos.len(),
            "catalog reloaded"
        );
        signals.percentage(Some(100))?;
        Ok(())
    }

    fn install_packages(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        job.lock().acquire()?;
        let signals = job.signals();
        begin_change(signals, Status::Running)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        let mut changed = false;
        for raw in package_ids {
            let Some(id) = parse_id(signals, raw)? else {
                continue;
            };
            let Some(target) = catalog.visible().find(|package| package.matches(&id)) else {
                signals.error(
                    ErrorCode::PackageNotFound,
                    &format!("Package {raw} was not found"),
                )?;
                continue;
            };
            if target.installed {
                signals.message(
                    MessageKind::PackageAlreadyInstalled,
                    &format!("Package {raw} is already installed"),
                )?;
                continue;
            }
            let name = target.name.clone();
            for package in &mut catalog.packages {
                if package.name == name {
                    package.installed = package.matches(&id);
                }
            }
            if let Some(installed) = catalog.installed(&name) {
                signals.package(Info::Installing, &installed.package_id(), &installed.summary)?;
                info!(target: BACKEND_TARGET, package = %id, "package installed");
            }
            changed = true;
        }
        if changed {
            persist(&self.store, catalog)?;
        }
        job.lock().release();
        Ok(())
    }

    fn resolve(&mut self, job: &mut Job<'_>, filters: &str, names: &[String]) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Query)?;
        let wanted = parse_filters(filters)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for name in names {
            let pattern = search_pattern(name)?;
            let mut matched: Vec<&str> = Vec::new();
            for package in catalog.visible().filter(|package| pattern.is_match(&package.name)) {
                if !matched.contains(&package.name.as_str()) {
                    matched.push(package.name.as_str());
                }
            }
            for matched_name in matched {
                if let Some(best) = best_match(catalog, matched_name, wanted) {
                    emit_package(signals, best)?;
                }
            }
        }
        Ok(())
    }

    fn remove_packages(
        &mut self,
        job: &mut Job<'_>,
        allow_deps: &str,
        package_ids: &[String],
    ) -> BackendResult {
        job.lock().acquire()?;
        let signals = job.signals();
        begin_change(signals, Status::Running)?;
        let cascade = text_to_bool(allow_deps);
        let catalog = loaded(&mut self.catalog, &self.store)?;
        let mut changed = false;
        for raw in package_ids {
            let Some(id) = parse_id(signals, raw)? else {
                continue;
            };
            let Some(target) = catalog.find(&id) else {
                signals.error(
                    ErrorCode::PackageNotFound,
                    &format!("Package {raw} was not found"),
                )?;
                continue;
            };
            if !target.installed {
                signals.error(
                    ErrorCode::PackageNotInstalled,
                    &format!("Package {raw} is not installed"),
                )?;
                continue;
            }
            let name = target.name.clone();
            let required_by = dependents(catalog, &name, true);
            if !cascade && !required_by.is_empty() {
                signals.error(
                    ErrorCode::DepResolutionFailed,
                    &format!("Package {raw} is required by {}", required_by.join(", ")),
                )?;
                continue;
            }
            let mut removals = required_by;
            removals.push(name);
            for package in catalog
                .packages
                .iter_mut()
                .filter(|package| package.installed && removals.contains(&package.name))
            {
                signals.package(Info::Removing, &package.package_id(), &package.summary)?;
                package.installed = false;
                info!(target: BACKEND_TARGET, package = %package.name, "package removed");
            }
            changed = true;
        }
        if changed {
            persist(&self.store, catalog)?;
        }
        job.lock().release();
        Ok(())
    }

    fn get_details(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Info)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for raw in package_ids {
            let Some(id) = parse_id(signals, raw)? else {
                continue;
            };
            let Some(package) = catalog.find(&id) else {
                could_not_find(signals, raw)?;
                continue;
            };
            signals.details(PackageDetails {
                package_id: package.package_id(),
                license: package.license.clone(),
                group: package.group(),
                description: package.description.clone(),
                url: package.url.clone(),
                size: package.size,
            })?;
        }
        Ok(())
    }

    fn get_files(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Info)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for raw in package_ids {
            let Some(id) = parse_id(signals, raw)? else {
                continue;
            };
            let Some(package) = catalog.find(&id) else {
                signals.error(
                    ErrorCode::PackageNotFound,
                    &format!("Package {raw} was not found"),
                )?;
                continue;
            };
            if !package.installed {
                signals.message(
                    MessageKind::CouldNotFindPackage,
                    &format!("Package {raw} is not installed"),
                )?;
                continue;
            }
            let mut files = package.files.clone();
            files.sort();
            signals.files(&package.package_id(), files)?;
        }
        Ok(())
    }

    fn get_updates(&mut self, job: &mut Job<'_>, filters: &str) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Info)?;
        parse_filters(filters)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for installed in catalog.packages.iter().filter(|package| package.installed) {
            if let Some(update) = catalog.newer_than(&installed.name, &installed.version) {
                signals.package(Info::Normal, &update.package_id(), &update.summary)?;
            }
        }
        Ok(())
    }

    fn repo_enable(&mut self, job: &mut Job<'_>, repo_id: &str, enabled: &str) -> BackendResult {
        job.lock().acquire()?;
        let signals = job.signals();
        begin_change(signals, Status::Setup)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        let Some(repository) = catalog.repository_mut(repo_id) else {
            return Err(BackendError::fatal(
                ErrorCode::RepoNotFound,
                format!("Repository {repo_id} was not found"),
            ));
        };
        repository.enabled = text_to_bool(enabled);
        info!(
            target: BACKEND_TARGET,
            repo = repo_id,
            enabled = repository.enabled,
            "repository toggled"
        );
        persist(&self.store, catalog)?;
        job.lock().release();
        Ok(())
    }

    fn get_repo_list(&mut self, job: &mut Job<'_>, filters: &str) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Info)?;
        parse_filters(filters)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        for repository in &catalog.repos {
            signals.repo_detail(&repository.id, &repository.name, repository.enabled)?;
        }
        Ok(())
    }

    fn download_packages(
        &mut self,
        job: &mut Job<'_>,
        directory: &str,
        package_ids: &[String],
    ) -> BackendResult {
        let signals = job.signals();
        begin(signals, Status::Download)?;
        let catalog = loaded(&mut self.catalog, &self.store)?;
        let target_directory = Utf8Path::new(directory);
        for raw in package_ids {
            let Some(id) = parse_id(signals, raw)? else {
                continue;
            };
            let Some(package) = catalog.visible().find(|package| package.matches(&id)) else {
                could_not_find(signals, raw)?;
                continue;
            };
            let Some(distfile) = package.distfile.as_deref() else {
                signals.message(
                    MessageKind::BackendError,
                    &format!("Package {raw} has no distfile"),
                )?;
                continue;
            };
            let source = self.store.resolve_distfile(distfile);
            match self.fetcher.fetch(&source, target_directory) {
                Ok(written) => signals.files(&package.package_id(), vec![written.into_string()])?,
                Err(error) => {
                    warn!(target: BACKEND_TARGET, package = raw, %error, "download failed");
                    signals.message(
                        MessageKind::BackendError,
                        &format!("Could not download {raw}: {error}"),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn set_locale(&mut self, _job: &mut Job<'_>, locale: &str) -> BackendResult {
        debug!(target: BACKEND_TARGET, locale, "locale set");
        self.locale = Some(locale.to_owned());
        Ok(())
    }
}

/// Returns the cached catalog, loading it on first use.
fn loaded<'a>(
    cache: &'a mut Option<Catalog>,
    store: &CatalogStore,
) -> Result<&'a mut Catalog, BackendError> {
    let current = cache
        .take()
        .map_or_else(|| store.load(), Ok)
        .map_err(|error| {
            BackendError::fatal(
                ErrorCode::NoCache,
                format!("The package catalog could not be loaded: {error}"),
            )
        })?;
    Ok(cache.insert(current))
}

fn persist(store: &CatalogStore, catalog: &Catalog) -> BackendResult {
    store
        .save(catalog)
        .map_err(|error| BackendError::internal("failed to persist the package catalog", error))
}

fn begin(signals: &mut Signals<'_>, status: Status) -> EmitResult {
    signals.status(status)?;
    signals.allow_cancel(true)?;
    signals.percentage(None)
}

fn begin_change(signals: &mut Signals<'_>, status: Status) -> EmitResult {
    signals.status(status)?;
    signals.allow_cancel(false)?;
    signals.percentage(None)
}

fn parse_filters(raw: &str) -> Result<Filters, BackendError> {
    Filters::parse(raw)
        .map_err(|error| BackendError::fatal(ErrorCode::FilterInvalid, error.to_string()))
}

/// Case-insensitive pattern; terms that are not valid expressions match
/// literally.
fn search_pattern(term: &str) -> Result<Regex, BackendError> {
    let build = |source: &str| RegexBuilder::new(source).case_insensitive(true).build();
    build(term)
        .or_else(|_| build(&regex::escape(term)))
        .map_err(|error| BackendError::internal("search term could not be compiled", error))
}

fn parse_id(signals: &mut Signals<'_>, raw: &str) -> Result<Option<PackageId>, EmitError> {
    match PackageId::parse(raw) {
        Ok(id) => Ok(Some(id)),
        Err(error) => {
            signals.error(ErrorCode::PackageIdInvalid, &error.to_string())?;
            Ok(None)
        }
    }
}

fn could_not_find(signals: &mut Signals<'_>, what: &str) -> EmitResult {
    signals.message(
        MessageKind::CouldNotFindPackage,
        &format!("Could not find the package {what}"),
    )
}

fn emit_package(signals: &mut Signals<'_>, package: &CatalogPackage) -> EmitResult {
    signals.package(package.info(), &package.package_id(), &package.summary)
}

/// Installed entry when the filters allow it, otherwise the newest visible
/// version passing the filters.
fn best_match<'a>(catalog: &'a Catalog, name: &str, wanted: Filters) -> Option<&'a CatalogPackage> {
    catalog
        .installed(name)
        .filter(|package| wanted.accepts(package))
        .or_else(|| {
            catalog
                .visible()
                .filter(|package| package.name == name && wanted.accepts(package))
                .max_by(|left, right| compare_versions(&left.version, &right.version))
        })
}

/// Names of installed packages depending on `name`, directly or, when
/// `transitive`, through other installed packages.
fn dependents(catalog: &Catalog, name: &str, transitive: bool) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut pending = vec![name.to_owned()];
    while let Some(current) = pending.pop() {
        for dependent in catalog.installed_dependents(&current) {
            if dependent.name == name || found.contains(&dependent.name) {
                continue;
            }
            found.push(dependent.name.clone());
            if transitive {
                pending.push(dependent.name.clone());
            }
        }
    }
    found
}
