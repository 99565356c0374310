//! Unit tests for the command dispatcher.

use std::fs;
use std::io::{self, Cursor, Write};

use rstest::{fixture, rstest};

use super::*;
use crate::backend::BackendResult;
use crate::codec::encode_command;
use crate::package_id::PackageId;
use crate::signal::{Info, MessageKind};

/// Backend with a fixed package list and a few deliberately broken
/// capabilities.
#[derive(Default)]
struct Scripted {
    packages: Vec<(PackageId, String)>,
    claims_faults: bool,
    calls: Vec<String>,
}

impl Scripted {
    fn with_package(mut self, name: &str, summary: &str) -> Self {
        self.packages
            .push((PackageId::new(name, "1.0", "amd64", "gentoo"), summary.to_owned()));
        self
    }
}

impl Backend for Scripted {
    fn resolve(&mut self, job: &mut Job<'_>, _filters: &str, names: &[String]) -> BackendResult {
        self.calls.push(format!("resolve {}", names.join(",")));
        for name in names {
            for (id, summary) in self.packages.iter().filter(|(id, _)| id.name() == name) {
                job.signals().package(Info::Available, id, summary)?;
            }
        }
        Ok(())
    }

    #[expect(clippy::panic_in_result_fn, reason = "exercises the fault bridge")]
    fn get_details(&mut self, _job: &mut Job<'_>, _package_ids: &[String]) -> BackendResult {
        panic!("details exploded");
    }

    fn get_updates(&mut self, job: &mut Job<'_>, _filters: &str) -> BackendResult {
        job.signals().percentage(Some(10))?;
        Err(BackendError::internal(
            "update metadata unreadable",
            io::Error::new(io::ErrorKind::InvalidData, "truncated index"),
        ))
    }

    fn get_packages(&mut self, _job: &mut Job<'_>, _filters: &str) -> BackendResult {
        let _database = fs::read("/nonexistent/pkbridge/packages.db")?;
        Ok(())
    }

    fn install_packages(&mut self, job: &mut Job<'_>, package_ids: &[String]) -> BackendResult {
        self.calls.push(format!("install {}", package_ids.join(",")));
        job.lock().acquire()?;
        Err(BackendError::fatal(
            ErrorCode::DepResolutionFailed,
            "blocked by app-misc/bar",
        ))
    }

    fn install_files(
        &mut self,
        _job: &mut Job<'_>,
        trusted: &str,
        files: &[String],
    ) -> BackendResult {
        self.calls.push(format!("install-files {trusted} {}", files.join(",")));
        Ok(())
    }

    fn repo_signature_install(&mut self, _job: &mut Job<'_>, package_id: &str) -> BackendResult {
        self.calls.push(format!("signature {package_id}"));
        Ok(())
    }

    fn handle_fault(&mut self, job: &mut Job<'_>, fault: &Fault) -> bool {
        if !self.claims_faults {
            return false;
        }
        job.signals()
            .message(MessageKind::BackendError, fault.value())
            .is_ok()
    }
}

struct Session {
    result: Result<RunOutcome, DispatchError>,
    output: String,
    lock: BackendLock,
    backend: Scripted,
}

impl Session {
    fn outcome(&self) -> RunOutcome {
        *self.result.as_ref().expect("session should run")
    }

    fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    fn finished_count(&self) -> usize {
        self.lines().iter().filter(|line| **line == "finished").count()
    }
}

fn run_session(backend: Scripted, initial: Option<&CommandLine>, input: &str) -> Session {
    run_raw_session(backend, initial, input.as_bytes())
}

fn run_raw_session(backend: Scripted, initial: Option<&CommandLine>, input: &[u8]) -> Session {
    let lock = BackendLock::in_memory();
    let mut dispatcher = Dispatcher::new(backend, Vec::new()).with_lock(lock.clone());
    let result = dispatcher.run(initial, &mut Cursor::new(input));
    assert_eq!(dispatcher.state(), DispatchState::Idle);
    let (backend_after, output) = dispatcher.into_parts();
    Session {
        result,
        output: String::from_utf8(output).expect("utf8 output"),
        lock,
        backend: backend_after,
    }
}

#[fixture]
fn catalogue() -> Scripted {
    Scripted::default()
        .with_package("foo", "The foo tool")
        .with_package("bar", "The bar library")
}

#[rstest]
fn resolve_emits_one_package_then_finished(catalogue: Scripted) {
    let session = run_session(catalogue, None, "resolve\tnone\tfoo\n");

    assert_eq!(session.outcome(), RunOutcome::Completed);
    assert_eq!(
        session.lines(),
        [
            "package\tINFO_AVAILABLE\tfoo;1.0;amd64;gentoo\tThe foo tool",
            "finished",
        ]
    );
}

#[rstest]
fn unknown_command_is_reported_and_the_loop_continues(catalogue: Scripted) {
    let session = run_session(catalogue, None, "bogus-command\nresolve\tnone\tbar\n");

    assert_eq!(session.outcome(), RunOutcome::Completed);
    assert_eq!(
        session.lines(),
        [
            "error\tERROR_INTERNAL_ERROR\tcommand 'bogus-command' is not known",
            "finished",
            "package\tINFO_AVAILABLE\tbar;1.0;amd64;gentoo\tThe bar library",
            "finished",
        ]
    );
}

#[rstest]
#[case::too_few("resolve\tnone\n", 1)]
#[case::too_many("resolve\tnone\tfoo\textra\n", 3)]
fn arity_mismatch_is_not_fatal(catalogue: Scripted, #[case] input: &str, #[case] found: usize) {
    let session = run_session(catalogue, None, input);

    assert_eq!(session.outcome(), RunOutcome::Completed);
    assert_eq!(
        session.lines(),
        [
            format!("error\tERROR_INTERNAL_ERROR\tcommand 'resolve' expects 2 argument(s), got {found}")
                .as_str(),
            "finished",
        ]
    );
    assert!(session.backend.calls.is_empty());
}

#[rstest]
fn panicking_capability_ends_the_session(catalogue: Scripted) {
    let session = run_session(
        catalogue,
        None,
        "get-details\tfoo;1.0;amd64;gentoo\nresolve\tnone\tfoo\n",
    );

    assert_eq!(session.outcome(), RunOutcome::Failed);
    assert_eq!(RunOutcome::Failed.exit_code(), 1);
    let lines = session.lines();
    assert_eq!(lines.len(), 2, "unexpected output {lines:?}");
    let error = lines.first().expect("error line");
    assert!(
        error.starts_with("error\tERROR_INTERNAL_ERROR\tError Type: panic;Error Value: details exploded;"),
        "unexpected error line {error}"
    );
    assert_eq!(lines.last(), Some(&"finished"));
    assert!(session.backend.calls.is_empty(), "no command may run after a fatal one");
}

#[rstest]
fn unexpected_errors_report_their_cause(catalogue: Scripted) {
    let session = run_session(catalogue, None, "get-updates\tnone\n");

    assert_eq!(session.outcome(), RunOutcome::Failed);
    assert_eq!(
        session.lines(),
        [
            "percentage\t10",
            "error\tERROR_INTERNAL_ERROR\tError Type: BackendError;Error Value: update metadata unreadable;  Caused by : truncated index;",
            "finished",
        ]
    );
}

#[rstest]
fn propagated_io_errors_are_internal_faults(catalogue: Scripted) {
    let session = run_session(catalogue, None, "get-packages\tnone\nresolve\tnone\tfoo\n");

    assert_eq!(session.outcome(), RunOutcome::Failed);
    let lines = session.lines();
    assert_eq!(lines.len(), 2, "unexpected output {lines:?}");
    let error = lines.first().expect("error line");
    assert!(
        error.starts_with(
            "error\tERROR_INTERNAL_ERROR\tError Type: BackendError;Error Value: I/O operation failed;  Caused by : "
        ),
        "unexpected error line {error}"
    );
    assert_eq!(lines.last(), Some(&"finished"));
    assert!(session.backend.calls.is_empty());
}

#[rstest]
fn undecodable_lines_are_rejected_and_the_loop_continues(catalogue: Scripted) {
    let session = run_raw_session(catalogue, None, b"bogus\xff\nresolve\tnone\tfoo\n");

    assert_eq!(session.outcome(), RunOutcome::Completed);
    assert_eq!(
        session.lines(),
        [
            "error\tERROR_INTERNAL_ERROR\tcommand 'bogus\u{fffd}' is not known",
            "finished",
            "package\tINFO_AVAILABLE\tfoo;1.0;amd64;gentoo\tThe foo tool",
            "finished",
        ]
    );
    assert_eq!(session.backend.calls, ["resolve foo"]);
}

#[rstest]
fn fatal_errors_release_the_lock(catalogue: Scripted) {
    let session = run_session(catalogue, None, "install-packages\tfoo;1.0;amd64;gentoo\n");

    assert_eq!(session.outcome(), RunOutcome::Failed);
    assert!(!session.lock.is_locked());
    assert_eq!(
        session.lines(),
        [
            "error\tERROR_DEP_RESOLUTION_FAILED\tblocked by app-misc/bar",
            "finished",
        ]
    );
}

#[rstest]
fn unsupported_capabilities_are_fatal(catalogue: Scripted) {
    let session = run_session(catalogue, None, "refresh-cache\n");

    assert_eq!(session.outcome(), RunOutcome::Failed);
    assert_eq!(
        session.lines(),
        [
            "error\tERROR_NOT_SUPPORTED\tThis function is not implemented in this backend",
            "finished",
        ]
    );
}

#[rstest]
fn claimed_faults_suppress_the_generic_error(catalogue: Scripted) {
    let backend = Scripted {
        claims_faults: true,
        ..catalogue
    };
    let session = run_session(backend, None, "get-details\tfoo;1.0;amd64;gentoo\n");

    assert_eq!(session.outcome(), RunOutcome::Failed);
    assert_eq!(
        session.lines(),
        ["message\tMESSAGE_BACKEND_ERROR\tdetails exploded", "finished"]
    );
}

#[rstest]
fn initial_command_runs_before_the_loop(catalogue: Scripted) {
    let initial = CommandLine::new("resolve", vec![String::from("none"), String::from("foo")]);
    let session = run_session(catalogue, Some(&initial), "resolve\tnone\tbar\n");

    assert_eq!(session.outcome(), RunOutcome::Completed);
    assert_eq!(session.backend.calls, ["resolve foo", "resolve bar"]);
    assert_eq!(session.finished_count(), 2);
}

#[rstest]
#[case::exit_line("resolve\tnone\tfoo\nexit\nresolve\tnone\tbar\n")]
#[case::empty_line("resolve\tnone\tfoo\n\nresolve\tnone\tbar\n")]
fn terminators_stop_the_loop(catalogue: Scripted, #[case] input: &str) {
    let session = run_session(catalogue, None, input);

    assert_eq!(session.outcome(), RunOutcome::Completed);
    assert_eq!(session.backend.calls, ["resolve foo"]);
}

#[test]
fn every_known_command_finishes_exactly_once() {
    for spec in COMMANDS {
        let args = vec![String::from("x"); spec.arity()];
        let input = format!("{}\n", encode_command(spec.name(), &args));
        let session = run_session(Scripted::default(), None, &input);

        assert!(session.result.is_ok(), "{} failed to run", spec.name());
        assert_eq!(session.finished_count(), 1, "{} output {:?}", spec.name(), session.output);
        assert_eq!(
            session.lines().last(),
            Some(&"finished"),
            "{} must end with finished",
            spec.name()
        );
    }
}

#[rstest]
fn list_arguments_are_split_and_flags_kept_raw(catalogue: Scripted) {
    let session = run_session(
        catalogue,
        None,
        "install-files\tyes\t/tmp/a.tbz2|/tmp/b.tbz2\nsignature-install\tfoo;1.0;amd64;gentoo\n",
    );

    assert_eq!(session.outcome(), RunOutcome::Completed);
    assert_eq!(
        session.backend.calls,
        [
            "install-files yes /tmp/a.tbz2,/tmp/b.tbz2",
            "signature foo;1.0;amd64;gentoo",
        ]
    );
}

#[test]
fn package_id_lists_split_on_ampersand() {
    let command = CommandLine::new(
        "get-depends",
        vec![
            String::from("installed"),
            String::from("a;1;x;r&b;2;x;r"),
            String::from("false"),
        ],
    );
    let (spec, args) = resolve(&command).expect("known command");

    assert_eq!(spec.name(), "get-depends");
    assert_eq!(
        args.values(),
        [
            Arg::Text(String::from("installed")),
            Arg::List(vec![String::from("a;1;x;r"), String::from("b;2;x;r")]),
            Arg::Text(String::from("false")),
        ]
    );
}

#[test]
fn command_table_has_unique_names() {
    for (index, spec) in COMMANDS.iter().enumerate() {
        assert!(
            COMMANDS.iter().skip(index + 1).all(|other| other.name() != spec.name()),
            "duplicate command {}",
            spec.name()
        );
    }
    assert_eq!(COMMANDS.len(), 28);
}

struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "controller exited"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn broken_output_releases_the_lock() {
    let lock = BackendLock::in_memory();
    let mut dispatcher = Dispatcher::new(catalogue(), ClosedPipe).with_lock(lock.clone());

    let result = dispatcher.run(
        None,
        &mut Cursor::new("install-packages\tfoo;1.0;amd64;gentoo\n".as_bytes()),
    );

    assert!(matches!(result, Err(DispatchError::Output { .. })));
    assert!(!lock.is_locked());
}
