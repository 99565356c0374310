//! Unit tests for the catalog backend, driven through a real dispatcher.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use mockall::mock;
use pkbridge::BackendLock;
use pkbridge::test_support::{Transcript, run_script};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::fetch::FetchError;

mock! {
    Fetch {}
    impl Fetcher for Fetch {
        fn fetch(
            &self,
            distfile: &Utf8Path,
            directory: &Utf8Path,
        ) -> Result<Utf8PathBuf, FetchError>;
    }
}

const CATALOG: &str = r#"{
  "repos": [
    { "id": "gentoo", "name": "Gentoo", "enabled": true },
    { "id": "guru", "name": "GURU", "enabled": false }
  ],
  "packages": [
    { "name": "app-shells/bash", "version": "5.1", "arch": "amd64", "repo": "gentoo",
      "installed": true, "summary": "The GNU Bourne Again shell", "group": "system",
      "license": "GPL-3", "url": "https://www.gnu.org/software/bash/", "size": 7340032,
      "description": "Bash is the GNU shell.\nIt is sh-compatible.",
      "files": ["/etc/bash/bashrc", "/bin/bash"],
      "depends": ["sys-libs/ncurses", "sys-libs/readline"] },
    { "name": "app-shells/bash", "version": "5.2", "arch": "amd64", "repo": "gentoo",
      "summary": "The GNU Bourne Again shell", "group": "system",
      "distfile": "distfiles/bash-5.2.tar.gz" },
    { "name": "sys-libs/ncurses", "version": "6.4", "arch": "amd64", "repo": "gentoo",
      "installed": true, "summary": "Console display library" },
    { "name": "sys-libs/readline", "version": "8.2", "arch": "amd64", "repo": "gentoo",
      "installed": true, "summary": "GNU readline", "depends": ["sys-libs/ncurses"] },
    { "name": "app-editors/vim", "version": "9.0", "arch": "amd64", "repo": "gentoo",
      "summary": "Vim, an improved vi-style text editor", "group": "accessories",
      "depends": ["sys-libs/ncurses"], "distfile": "distfiles/vim-9.0.tar.gz" },
    { "name": "app-misc/neofetch", "version": "7.1.0", "arch": "amd64", "repo": "guru",
      "summary": "System information script" }
  ]
}"#;

const BASH_INSTALLED: &str = "app-shells/bash;5.1;amd64;installed";
const BASH_UPDATE: &str = "app-shells/bash;5.2;amd64;gentoo";
const VIM: &str = "app-editors/vim;9.0;amd64;gentoo";
const NCURSES: &str = "sys-libs/ncurses;6.4;amd64;installed";

struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
    store: CatalogStore,
}

impl Workspace {
    fn backend(&self) -> CatalogBackend {
        CatalogBackend::new(self.store.clone())
    }

    fn reload(&self) -> Catalog {
        self.store.load().expect("catalog should reload")
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("create temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
    let path = root.join("catalog.json");
    fs::write(&path, CATALOG).expect("write catalog");
    Workspace {
        _dir: dir,
        root,
        store: CatalogStore::new(path),
    }
}

fn session<B: Backend>(backend: B, input: &str) -> Transcript {
    let (_, transcript) = run_script(backend, &BackendLock::in_memory(), input);
    transcript
}

#[rstest]
fn name_searches_are_case_insensitive_and_preceded_by_the_preamble(workspace: Workspace) {
    let transcript = session(workspace.backend(), "search-name\tnone\tBASH\n");
    assert_eq!(
        transcript.lines(),
        vec![
            "status\tSTATUS_QUERY",
            "allow-cancel\ttrue",
            "no-percentage-updates",
            "package\tINFO_INSTALLED\tapp-shells/bash;5.1;amd64;installed\tThe GNU Bourne Again shell",
            "package\tINFO_AVAILABLE\tapp-shells/bash;5.2;amd64;gentoo\tThe GNU Bourne Again shell",
            "finished",
        ]
    );
}

#[rstest]
#[case::installed("installed", 3)]
#[case::available("~installed", 2)]
#[case::everything("none", 5)]
fn package_listings_honour_filters(
    workspace: Workspace,
    #[case] filters: &str,
    #[case] expected: usize,
) {
    let transcript = session(workspace.backend(), &format!("get-packages\t{filters}\n"));
    assert_eq!(transcript.lines_of("package").len(), expected);
    assert_eq!(transcript.exit_code(), 0);
}

#[rstest]
fn contradictory_filters_end_the_session(workspace: Workspace) {
    let transcript = session(
        workspace.backend(),
        "get-packages\tinstalled;~installed\nget-packages\tnone\n",
    );
    assert_eq!(transcript.lines_of("error").len(), 1);
    assert!(
        transcript.lines_of("error")
            .iter()
            .all(|line| line.starts_with("error\tERROR_FILTER_INVALID\t"))
    );
    assert_eq!(transcript.lines_of("package").len(), 0);
    assert_eq!(transcript.exit_code(), 1);
}

#[rstest]
fn group_searches_map_group_names(workspace: Workspace) {
    let transcript = session(workspace.backend(), "search-group\tnone\taccessories\n");
    assert_eq!(
        transcript.lines_of("package"),
        vec!["package\tINFO_AVAILABLE\tapp-editors/vim;9.0;amd64;gentoo\tVim, an improved vi-style text editor"]
    );

    let unknown = session(workspace.backend(), "search-group\tnone\tjuggling\n");
    assert_eq!(
        unknown.lines_of("error"),
        vec!["error\tERROR_GROUP_NOT_FOUND\tGroup juggling is not known"]
    );
    assert_eq!(unknown.exit_code(), 1);
}

#[rstest]
fn file_searches_only_see_installed_packages(workspace: Workspace) {
    let transcript = session(workspace.backend(), "search-file\tnone\t/bin/bash\n");
    assert_eq!(
        transcript.lines_of("package"),
        vec!["package\tINFO_INSTALLED\tapp-shells/bash;5.1;amd64;installed\tThe GNU Bourne Again shell"]
    );
}

#[rstest]
fn details_searches_look_at_descriptions(workspace: Workspace) {
    let transcript = session(workspace.backend(), "search-details\tnone\tsh-compatible\n");
    assert_eq!(transcript.lines_of("package").len(), 1);
}

#[rstest]
fn resolve_reports_the_best_version_per_name(workspace: Workspace) {
    let transcript = session(
        workspace.backend(),
        "resolve\t~installed\tapp-shells/bash&app-editors/vim\n",
    );
    assert_eq!(
        transcript.lines_of("package"),
        vec![
            "package\tINFO_AVAILABLE\tapp-shells/bash;5.2;amd64;gentoo\tThe GNU Bourne Again shell",
            "package\tINFO_AVAILABLE\tapp-editors/vim;9.0;amd64;gentoo\tVim, an improved vi-style text editor",
        ]
    );
}

#[rstest]
fn details_flatten_descriptions_and_skip_missing_packages(workspace: Workspace) {
    let input = format!("get-details\t{BASH_INSTALLED}&app-misc/nope;1.0;amd64;gentoo\n");
    let transcript = session(workspace.backend(), &input);
    assert_eq!(
        transcript.lines_of("details"),
        vec![
            "details\tapp-shells/bash;5.1;amd64;installed\tGPL-3\tGROUP_SYSTEM\t\
             Bash is the GNU shell.;It is sh-compatible.\thttps://www.gnu.org/software/bash/\t7340032"
        ]
    );
    assert_eq!(
        transcript.lines_of("message"),
        vec![
            "message\tMESSAGE_COULD_NOT_FIND_PACKAGE\tCould not find the package app-misc/nope;1.0;amd64;gentoo"
        ]
    );
    assert_eq!(transcript.exit_code(), 0);
}

#[rstest]
fn invalid_ids_are_reported_and_skipped(workspace: Workspace) {
    let input = format!("get-details\tnot-an-id&{BASH_INSTALLED}\n");
    let transcript = session(workspace.backend(), &input);
    assert_eq!(
        transcript.lines_of("error"),
        vec!["error\tERROR_PACKAGE_ID_INVALID\tpackage id 'not-an-id' has 1 field(s), expected 4"]
    );
    assert_eq!(transcript.lines_of("details").len(), 1);
    assert_eq!(transcript.lines().last().copied(), Some("finished"));
}

#[rstest]
fn file_lists_are_sorted_and_need_an_installed_package(workspace: Workspace) {
    let input = format!("get-files\t{BASH_INSTALLED}&{VIM}&app-misc/nope;1;amd64;gentoo\n");
    let transcript = session(workspace.backend(), &input);
    assert_eq!(
        transcript.lines_of("files"),
        vec!["files\tapp-shells/bash;5.1;amd64;installed\t/bin/bash;/etc/bash/bashrc"]
    );
    assert_eq!(
        transcript.lines_of("message"),
        vec![format!("message\tMESSAGE_COULD_NOT_FIND_PACKAGE\tPackage {VIM} is not installed").as_str()]
    );
    assert_eq!(
        transcript.lines_of("error"),
        vec!["error\tERROR_PACKAGE_NOT_FOUND\tPackage app-misc/nope;1;amd64;gentoo was not found"]
    );
    assert_eq!(transcript.exit_code(), 0);
}

#[rstest]
#[case::direct("false", 2)]
#[case::recursive("true", 2)]
fn dependencies_are_reported_once(
    workspace: Workspace,
    #[case] recursive: &str,
    #[case] expected: usize,
) {
    let input = format!("get-depends\tnone\t{BASH_INSTALLED}\t{recursive}\n");
    let transcript = session(workspace.backend(), &input);
    assert_eq!(transcript.lines_of("package").len(), expected);
    assert_eq!(transcript.lines().first().copied(), Some("status\tSTATUS_INFO"));
}

#[rstest]
fn reverse_dependencies_follow_installed_packages(workspace: Workspace) {
    let direct = session(
        workspace.backend(),
        &format!("get-requires\tnone\t{NCURSES}\tfalse\n"),
    );
    assert_eq!(direct.lines_of("package").len(), 2);

    let not_installed = session(
        workspace.backend(),
        &format!("get-requires\tnone\t{VIM}\tfalse\n"),
    );
    assert_eq!(
        not_installed.lines_of("error"),
        vec![format!("error\tERROR_PACKAGE_NOT_INSTALLED\tPackage {VIM} is not installed").as_str()]
    );
    assert_eq!(not_installed.exit_code(), 0);
}

#[rstest]
fn updates_list_newer_versions_of_installed_packages(workspace: Workspace) {
    let transcript = session(workspace.backend(), "get-updates\tnone\n");
    assert_eq!(
        transcript.lines_of("package"),
        vec![format!("package\tINFO_NORMAL\t{BASH_UPDATE}\tThe GNU Bourne Again shell").as_str()]
    );
}

#[rstest]
fn installing_persists_and_survives_a_refresh(workspace: Workspace) {
    let input = format!("install-packages\t{VIM}\nrefresh-cache\nget-packages\tinstalled\n");
    let lock = BackendLock::in_memory();
    let (_, transcript) = run_script(workspace.backend(), &lock, &input);

    assert!(transcript.lines().contains(
        &"package\tINFO_INSTALLING\tapp-editors/vim;9.0;amd64;installed\tVim, an improved vi-style text editor"
    ));
    assert_eq!(transcript.lines_of("finished").len(), 3);
    assert_eq!(transcript.lines_of("package").len(), 5);
    assert!(!lock.is_locked());

    let catalog = workspace.reload();
    assert!(catalog.installed("app-editors/vim").is_some());
}

#[rstest]
fn installing_a_newer_version_replaces_the_old_one(workspace: Workspace) {
    let transcript = session(workspace.backend(), &format!("install-packages\t{BASH_UPDATE}\n"));
    assert_eq!(transcript.exit_code(), 0);
    let catalog = workspace.reload();
    let bash = catalog.installed("app-shells/bash").expect("bash stays installed");
    assert_eq!(bash.version, "5.2");
}

#[rstest]
fn installing_twice_is_only_a_message(workspace: Workspace) {
    let transcript = session(
        workspace.backend(),
        &format!("install-packages\t{BASH_INSTALLED}\n"),
    );
    assert_eq!(
        transcript.lines_of("message"),
        vec![format!("message\tMESSAGE_PACKAGE_ALREADY_INSTALLED\tPackage {BASH_INSTALLED} is already installed").as_str()]
    );
    assert_eq!(transcript.exit_code(), 0);
}

#[rstest]
fn a_foreign_lock_file_blocks_mutations(workspace: Workspace) {
    let lock_path = workspace.root.join("backend.lock");
    fs::write(&lock_path, b"4242\n").expect("write foreign lock");
    let lock = BackendLock::with_file(lock_path.clone());

    let (_, transcript) = run_script(
        workspace.backend(),
        &lock,
        &format!("install-packages\t{VIM}\n"),
    );

    let errors = transcript.lines_of("error");
    assert_eq!(errors.len(), 1);
    assert!(errors.iter().all(|line| line.starts_with("error\tERROR_CANNOT_GET_LOCK\t")));
    assert_eq!(transcript.exit_code(), 1);
    assert!(lock_path.exists(), "the other owner's lock file must survive");
    assert!(workspace.reload().installed("app-editors/vim").is_none());
}

#[rstest]
fn removal_refuses_packages_others_depend_on(workspace: Workspace) {
    let transcript = session(
        workspace.backend(),
        &format!("remove-packages\tfalse\t{NCURSES}\n"),
    );
    assert_eq!(
        transcript.lines_of("error"),
        vec![format!(
            "error\tERROR_DEP_RESOLUTION_FAILED\tPackage {NCURSES} is required by \
             app-shells/bash, sys-libs/readline"
        )
        .as_str()]
    );
    assert!(workspace.reload().installed("sys-libs/ncurses").is_some());
}

#[rstest]
fn removal_with_dependencies_takes_dependents_along(workspace: Workspace) {
    let transcript = session(
        workspace.backend(),
        &format!("remove-packages\ttrue\t{NCURSES}\n"),
    );
    assert_eq!(transcript.lines_of("package").len(), 3);
    let catalog = workspace.reload();
    assert!(catalog.packages.iter().all(|package| !package.installed));
}

#[rstest]
fn removing_a_package_that_is_not_installed_continues(workspace: Workspace) {
    let transcript = session(
        workspace.backend(),
        &format!("remove-packages\tfalse\t{VIM}\nget-packages\tinstalled\n"),
    );
    assert_eq!(
        transcript.lines_of("error"),
        vec![format!("error\tERROR_PACKAGE_NOT_INSTALLED\tPackage {VIM} is not installed").as_str()]
    );
    assert_eq!(transcript.lines_of("package").len(), 3);
    assert_eq!(transcript.exit_code(), 0);
}

#[rstest]
fn repositories_are_listed_and_toggled(workspace: Workspace) {
    let transcript = session(
        workspace.backend(),
        "get-repo-list\tnone\nrepo-enable\tguru\ttrue\nsearch-name\tnone\tneofetch\n",
    );
    assert_eq!(
        transcript.lines_of("repo-detail"),
        vec!["repo-detail\tgentoo\tGentoo\ttrue", "repo-detail\tguru\tGURU\tfalse"]
    );
    assert_eq!(transcript.lines_of("package").len(), 1);
    let catalog = workspace.reload();
    assert!(catalog.is_repo_enabled("guru"));
}

#[rstest]
fn unknown_repositories_end_the_session(workspace: Workspace) {
    let lock_path = workspace.root.join("backend.lock");
    let lock = BackendLock::with_file(lock_path.clone());
    let (_, transcript) = run_script(workspace.backend(), &lock, "repo-enable\tnope\ttrue\n");
    assert_eq!(
        transcript.lines_of("error"),
        vec!["error\tERROR_REPO_NOT_FOUND\tRepository nope was not found"]
    );
    assert_eq!(transcript.exit_code(), 1);
    assert!(!lock.is_locked());
    assert!(!lock_path.exists(), "the lock file is removed after a fatal error");
}

#[rstest]
fn downloads_continue_past_failed_items(workspace: Workspace) {
    let downloads = workspace.root.join("downloads");
    let mut fetcher = MockFetch::new();
    fetcher
        .expect_fetch()
        .withf(|distfile, _| distfile.as_str().ends_with("bash-5.2.tar.gz"))
        .once()
        .returning(|distfile, _| {
            Err(FetchError::MissingFileName {
                distfile: distfile.to_path_buf(),
            })
        });
    fetcher
        .expect_fetch()
        .withf(|distfile, _| distfile.as_str().ends_with("vim-9.0.tar.gz"))
        .once()
        .returning(|_, directory| Ok(directory.join("vim-9.0.tar.gz")));
    let backend = CatalogBackend::with_fetcher(workspace.store.clone(), fetcher);

    let input = format!(
        "download-packages\t{downloads}\t{BASH_UPDATE}&{VIM}&{NCURSES}\n"
    );
    let transcript = session(backend, &input);

    assert_eq!(transcript.lines().first().copied(), Some("status\tSTATUS_DOWNLOAD"));
    assert_eq!(
        transcript.lines_of("files"),
        vec![format!("files\t{VIM}\t{downloads}/vim-9.0.tar.gz").as_str()]
    );
    let messages = transcript.lines_of("message");
    assert_eq!(messages.len(), 2, "one fetch failure and one missing distfile");
    assert!(
        messages
            .first()
            .is_some_and(|line| line.contains(&format!("Could not download {BASH_UPDATE}")))
    );
    assert_eq!(
        messages.last().copied(),
        Some(format!("message\tMESSAGE_BACKEND_ERROR\tPackage {NCURSES} has no distfile").as_str())
    );
    assert_eq!(transcript.exit_code(), 0);
}

#[rstest]
fn a_missing_catalog_is_reported_as_no_cache(workspace: Workspace) {
    let backend = CatalogBackend::new(CatalogStore::new(workspace.root.join("absent.json")));
    let transcript = session(backend, "get-packages\tnone\n");
    let errors = transcript.lines_of("error");
    assert_eq!(errors.len(), 1);
    assert!(errors.iter().all(|line| line.starts_with("error\tERROR_NO_CACHE\t")));
    assert_eq!(transcript.exit_code(), 1);
}

#[rstest]
fn locales_are_remembered(workspace: Workspace) {
    let (backend, transcript) = run_script(
        workspace.backend(),
        &BackendLock::in_memory(),
        "set-locale\ten_GB.UTF-8\n",
    );
    assert_eq!(transcript.lines(), vec!["finished"]);
    assert_eq!(backend.locale(), Some("en_GB.UTF-8"));
}

#[rstest]
fn unimplemented_capabilities_fall_back_to_not_supported(workspace: Workspace) {
    let transcript = session(workspace.backend(), "get-distro-upgrades\n");
    assert_eq!(
        transcript.lines(),
        vec![
            "error\tERROR_NOT_SUPPORTED\tThis function is not implemented in this backend",
            "finished",
        ]
    );
}
