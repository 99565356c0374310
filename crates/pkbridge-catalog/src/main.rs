//! Command-line entry point for the catalog backend.
//!
//! Commands arrive on stdin, or as the trailing arguments when the binary is
//! invoked with a single command; signals go to stdout and logs to stderr.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin = io::stdin();
    pkbridge_catalog::run(
        std::env::args_os(),
        &mut stdin.lock(),
        io::stdout().lock(),
        &mut io::stderr().lock(),
    )
}
