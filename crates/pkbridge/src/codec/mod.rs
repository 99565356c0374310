//! Tab-delimited line protocol shared by every backend.
//!
//! Inbound lines carry one command each: the command name followed by its
//! positional arguments, separated by [`FIELD_DELIMITER`]. Outbound lines carry
//! one signal each: the signal kind followed by its fields. List-valued
//! arguments pack several logical values into a single field using
//! [`PACKAGE_IDS_DELIMITER`] or [`FILENAME_DELIMITER`].

use std::borrow::Cow;
use std::fmt;


/// Separates the command name, arguments, signal kind and signal fields.
pub const FIELD_DELIMITER: char = '\t';

/// Separates package identifiers inside a single argument field.
pub const PACKAGE_IDS_DELIMITER: char = '&';

/// Separates file paths inside a single argument field.
pub const FILENAME_DELIMITER: char = '|';

/// Joins file paths inside the payload of a `files` signal.
pub const FILES_PAYLOAD_DELIMITER: char = ';';

/// Inbound line that ends the dispatch loop.
pub const EXIT_COMMAND: &str = "exit";

/// A decoded inbound command: its name and raw positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    name: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line from a name and its raw arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Returns the command name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the raw positional arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Splits the command line into its name and arguments.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.name, self.args)
    }
}

/// Classification of one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An empty line or the literal `exit`: stop reading commands.
    Exit,
    /// A command to dispatch.
    Command(CommandLine),
}

/// Decodes one inbound line, recognising the loop terminators.
///
/// # Example
///
/// ```
/// use pkbridge::codec::{Inbound, decode_line};
///
/// assert_eq!(decode_line("exit\n"), Inbound::Exit);
/// assert_eq!(decode_line(""), Inbound::Exit);
/// let Inbound::Command(command) = decode_line("resolve\tnone\tfoo\n") else {
///     panic!("expected a command");
/// };
/// assert_eq!(command.name(), "resolve");
/// assert_eq!(command.args(), ["none", "foo"]);
/// ```
#[must_use]
pub fn decode_line(line: &str) -> Inbound {
    let trimmed = strip_line_terminator(line);
    if trimmed.is_empty() || trimmed == EXIT_COMMAND {
        Inbound::Exit
    } else {
        Inbound::Command(decode_command(trimmed))
    }
}

/// Splits a line into the command name and its positional arguments.
#[must_use]
pub fn decode_command(line: &str) -> CommandLine {
    let mut fields = strip_line_terminator(line).split(FIELD_DELIMITER);
    let name = fields.next().unwrap_or_default().to_owned();
    let args = fields.map(str::to_owned).collect();
    CommandLine { name, args }
}

/// Encodes a command name and arguments as one inbound line (without newline).
#[must_use]
pub fn encode_command<S: AsRef<str>>(name: &str, args: &[S]) -> String {
    let mut line = String::from(name);
    for arg in args {
        line.push(FIELD_DELIMITER);
        line.push_str(arg.as_ref());
    }
    line
}

/// Splits one argument field into its logical values.
///
/// A field without the delimiter yields a single value; an empty field yields
/// no values at all.
///
/// ```
/// use pkbridge::codec::split_list;
///
/// assert_eq!(split_list("a&b&c", '&'), ["a", "b", "c"]);
/// assert_eq!(split_list("a", '&'), ["a"]);
/// assert!(split_list("", '&').is_empty());
/// ```
#[must_use]
pub fn split_list(value: &str, delimiter: char) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(delimiter).map(str::to_owned).collect()
}

/// One outbound signal field before coercion to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<'a> {
    /// Free text; tabs and line breaks are neutralised on encode.
    Text(Cow<'a, str>),
    /// Unsigned integer rendered in decimal.
    Integer(u64),
    /// Boolean rendered as `true` or `false`.
    Flag(bool),
}

impl<'a> From<&'a str> for Field<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

impl From<String> for Field<'_> {
    fn from(value: String) -> Self {
        Self::Text(Cow::Owned(value))
    }
}

impl<'a> From<&'a String> for Field<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(Cow::Borrowed(value.as_str()))
    }
}

impl From<u64> for Field<'_> {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

impl From<u8> for Field<'_> {
    fn from(value: u8) -> Self {
        Self::Integer(u64::from(value))
    }
}

impl From<bool> for Field<'_> {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(&sanitise_field(text)),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Flag(value) => f.write_str(if *value { "true" } else { "false" }),
        }
    }
}

/// Encodes a signal kind and its fields as one outbound line (without newline).
///
/// ```
/// use pkbridge::codec::{Field, encode_signal};
///
/// let line = encode_signal("allow-cancel", &[Field::from(true)]);
/// assert_eq!(line, "allow-cancel\ttrue");
/// ```
#[must_use]
pub fn encode_signal(kind: &str, fields: &[Field<'_>]) -> String {
    let mut line = String::from(kind);
    for field in fields {
        line.push(FIELD_DELIMITER);
        line.push_str(&field.to_string());
    }
    line
}

/// Replaces characters that would break line framing inside a field.
///
/// Tabs become spaces and line breaks become `;` so multi-line descriptions
/// and formatted faults stay on a single protocol line.
#[must_use]
pub fn sanitise_field(value: &str) -> Cow<'_, str> {
    if !value.contains(['\t', '\n', '\r']) {
        return Cow::Borrowed(value);
    }
    let cleaned = value
        .replace("\r\n", "\n")
        .replace('\r', "")
        .replace('\t', " ")
        .replace('\n', ";");
    Cow::Owned(cleaned)
}

/// Interprets a boolean-ish text flag the way controllers send them.
///
/// `true`, `yes`, `on` and `1` are true (case-insensitive); anything else is
/// false. The dispatcher never calls this: flags reach capabilities as raw
/// text and each capability decides.
#[must_use]
pub fn text_to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

fn strip_line_terminator(line: &str) -> &str {
    let without_newline = line.strip_suffix('\n').unwrap_or(line);
    without_newline
        .strip_suffix('\r')
        .unwrap_or(without_newline)
}
