//! Conversion of unexpected failures into reportable faults.
//!
//! Capability calls run under [`std::panic::catch_unwind`]; whatever escapes,
//! a panic payload or an unanticipated error, is turned into a [`Fault`]
//! whose [`Display`](fmt::Display) form is the single-line description sent
//! with `ERROR_INTERNAL_ERROR`.
//!
//! [`install_panic_hook`] wraps the existing panic hook so the fault can also
//! report the source location of a panic and the stack that led to it, one
//! `File : ..., line ..., in ...;` entry per frame, followed by the source
//! text of that line when the file is readable.

use std::any::{Any, type_name};
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::panic::{self, Location};
use std::sync::Once;

use crate::codec::sanitise_field;


static PANIC_HOOK: Once = Once::new();

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicContext>> = const { RefCell::new(None) };
}

/// What the hook records about the most recent panic on this thread.
#[derive(Debug, Default)]
struct PanicContext {
    site: Option<SourceSite>,
    frames: Vec<StackFrame>,
}

/// Source location where a panic was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSite {
    file: String,
    line: u32,
    column: u32,
}

impl SourceSite {
    /// Returns the source file.
    #[must_use]
    pub const fn file(&self) -> &str {
        self.file.as_str()
    }

    /// Returns the line number.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }
}

impl From<&Location<'_>> for SourceSite {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_owned(),
            line: location.line(),
            column: location.column(),
        }
    }
}

/// One resolved frame of the stack captured at a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    function: String,
    file: String,
    line: u32,
    source: Option<String>,
}

impl StackFrame {
    /// Returns the demangled function name.
    #[must_use]
    pub const fn function(&self) -> &str {
        self.function.as_str()
    }

    /// Returns the source file.
    #[must_use]
    pub const fn file(&self) -> &str {
        self.file.as_str()
    }

    /// Returns the line number.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Returns the text of the source line, when the file was readable.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn load_source(&mut self) {
        self.source = read_source_line(&self.file, self.line);
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  File : {}, line {}, in {};", self.file, self.line, self.function)?;
        if let Some(source) = &self.source {
            write!(f, "    {source};")?;
        }
        Ok(())
    }
}

fn read_source_line(file: &str, line: u32) -> Option<String> {
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    let contents = fs::read_to_string(file).ok()?;
    let text = contents.lines().nth(index)?.trim();
    (!text.is_empty()).then(|| sanitise_field(text).into_owned())
}

/// Extracts the frames that carry a source location from a rendered
/// backtrace.
///
/// Frames are rendered as a `N: function` line followed by an
/// `at file:line:column` line; inlined callers repeat the pair without the
/// index. Frames without debug information are skipped.
fn resolved_frames(rendered: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut function: Option<&str> = None;
    for entry in rendered.lines().map(str::trim) {
        if let Some(location) = entry.strip_prefix("at ") {
            if let Some(name) = function.take()
                && let Some((file, line)) = split_location(location)
            {
                frames.push(StackFrame {
                    function: sanitise_field(name).into_owned(),
                    file: sanitise_field(file).into_owned(),
                    line,
                    source: None,
                });
            }
        } else if !entry.is_empty() {
            let name = entry
                .split_once(": ")
                .filter(|(index, _)| index.chars().all(|c| c.is_ascii_digit()))
                .map_or(entry, |(_, name)| name);
            function = Some(name);
        }
    }
    frames
}

/// Splits `file:line:column` from the right so paths may contain colons.
fn split_location(location: &str) -> Option<(&str, u32)> {
    let mut parts = location.rsplitn(3, ':');
    let _column = parts.next()?;
    let line = parts.next()?.parse().ok()?;
    let file = parts.next()?;
    Some((file, line))
}

/// An unexpected failure caught while running a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    kind: String,
    value: String,
    causes: Vec<String>,
    site: Option<SourceSite>,
    frames: Vec<StackFrame>,
}

impl Fault {
    /// Builds a fault from a bare description.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            kind: String::from("Fault"),
            value: message.into(),
            causes: Vec::new(),
            site: None,
            frames: Vec::new(),
        }
    }

    /// Builds a fault from an error and its chain of sources.
    #[must_use]
    pub fn from_error<E>(error: &E) -> Self
    where
        E: StdError + ?Sized,
    {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: short_type_name::<E>().to_owned(),
            value: error.to_string(),
            causes,
            site: None,
            frames: Vec::new(),
        }
    }

    /// Builds a fault from a panic payload.
    ///
    /// The source location and stack frames are taken from the panic hook
    /// when [`install_panic_hook`] has run on this process.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let context = LAST_PANIC.with(RefCell::take).unwrap_or_default();
        Self {
            kind: String::from("panic"),
            value: panic_message(payload),
            causes: Vec::new(),
            site: context.site,
            frames: context.frames,
        }
    }

    /// Returns the fault class.
    #[must_use]
    pub const fn kind(&self) -> &str {
        self.kind.as_str()
    }

    /// Returns the primary description.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.value.as_str()
    }

    /// Returns the descriptions of the underlying causes, outermost first.
    #[must_use]
    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    /// Returns where a panic was raised, when known.
    #[must_use]
    pub const fn site(&self) -> Option<&SourceSite> {
        self.site.as_ref()
    }

    /// Returns the stack frames captured at a panic, innermost first.
    #[must_use]
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error Type: {};Error Value: {};", self.kind, self.value)?;
        for cause in &self.causes {
            write!(f, "  Caused by : {cause};")?;
        }
        if let Some(site) = &self.site {
            write!(
                f,
                "  File : {}, line {}, column {};",
                site.file, site.line, site.column
            )?;
        }
        for frame in &self.frames {
            write!(f, "{frame}")?;
        }
        Ok(())
    }
}

/// Records the location and stack of every panic before the previous hook
/// reports it.
///
/// Only the first call installs the hook.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let mut frames = resolved_frames(&Backtrace::force_capture().to_string());
            frames.iter_mut().for_each(StackFrame::load_source);
            let context = PanicContext {
                site: info.location().map(SourceSite::from),
                frames,
            };
            LAST_PANIC.with(|last| *last.borrow_mut() = Some(context));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}
