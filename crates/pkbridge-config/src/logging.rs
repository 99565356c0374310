//! Log output formats for backend processes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log events are rendered on standard error.
///
/// Standard output belongs to the signal stream, so both formats write one
/// event per line to standard error.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for the controller's journal.
    #[default]
    Json,
    /// Single-line text for an operator running a backend by hand.
    Compact,
}

impl LogFormat {
    /// Returns whether events may carry terminal colour codes.
    ///
    /// JSON output never does; compact output only when standard error is a
    /// terminal.
    #[must_use]
    pub const fn colours(self, stderr_is_terminal: bool) -> bool {
        match self {
            Self::Json => false,
            Self::Compact => stderr_is_terminal,
        }
    }
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
