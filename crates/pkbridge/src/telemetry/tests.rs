//! Unit tests for log formatting.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use rstest::rstest;

use super::*;

/// Writer collecting everything the subscriber formats.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        let bytes = self.0.lock().expect("capture lock").clone();
        String::from_utf8(bytes).expect("utf8 log output")
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("capture lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn log_dispatch(format: LogFormat, filter: &str) -> String {
    let sink = Captured::default();
    let installed = subscriber(
        format,
        parse_filter(filter).expect("valid filter"),
        sink.clone(),
        false,
    );
    tracing::subscriber::with_default(installed, || {
        tracing::debug!(target: "pkbridge::dispatch", command = "resolve", "dispatching command");
    });
    sink.contents()
}

#[test]
fn json_events_flatten_fields_beside_the_message() {
    let output = log_dispatch(LogFormat::Json, "debug");

    assert!(output.contains("\"message\":\"dispatching command\""), "{output}");
    assert!(output.contains("\"command\":\"resolve\""), "{output}");
    assert!(output.contains("\"target\":\"pkbridge::dispatch\""), "{output}");
    assert_eq!(output.lines().count(), 1);
}

#[test]
fn compact_events_carry_no_colour_codes() {
    let output = log_dispatch(LogFormat::Compact, "debug");

    assert!(output.contains("dispatching command"), "{output}");
    assert!(!output.contains('\u{1b}'), "{output}");
}

#[rstest]
#[case::global("info")]
#[case::per_target("pkbridge::dispatch=info")]
fn filters_drop_events_below_their_level(#[case] filter: &str) {
    assert!(log_dispatch(LogFormat::Json, filter).is_empty());
}

#[test]
fn malformed_filters_are_rejected() {
    assert!(matches!(
        parse_filter("pkbridge=loud"),
        Err(TelemetryError::Filter(_))
    ));
}
