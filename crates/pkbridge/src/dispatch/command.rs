//! Static table of protocol commands and their argument contracts.

use std::fmt;

use thiserror::Error;

use crate::backend::{Backend, BackendResult, Job};
use crate::codec::{CommandLine, FILENAME_DELIMITER, PACKAGE_IDS_DELIMITER, split_list};

use self::ArgKind::{Files, Flag, PackageIds, Scalar};

/// How one positional argument is decoded before reaching a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Passed through as text.
    Scalar,
    /// Boolean-ish text, passed through for the capability to interpret.
    Flag,
    /// Package identifiers separated by `&`.
    PackageIds,
    /// File paths separated by `|`.
    Files,
}

/// A decoded argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A scalar or flag argument.
    Text(String),
    /// A list argument.
    List(Vec<String>),
}

/// Arguments decoded according to a command's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    values: Vec<Arg>,
}

impl Args {
    fn decode(schema: &[ArgKind], raw: &[String]) -> Self {
        let values = schema
            .iter()
            .zip(raw)
            .map(|(kind, value)| match kind {
                ArgKind::Scalar | ArgKind::Flag => Arg::Text(value.clone()),
                ArgKind::PackageIds => Arg::List(split_list(value, PACKAGE_IDS_DELIMITER)),
                ArgKind::Files => Arg::List(split_list(value, FILENAME_DELIMITER)),
            })
            .collect();
        Self { values }
    }

    /// Returns the decoded values in order.
    #[must_use]
    pub fn values(&self) -> &[Arg] {
        &self.values
    }

    fn text(&self, index: usize) -> &str {
        match self.values.get(index) {
            Some(Arg::Text(text)) => text,
            _ => "",
        }
    }

    fn list(&self, index: usize) -> &[String] {
        match self.values.get(index) {
            Some(Arg::List(values)) => values,
            _ => &[],
        }
    }
}

type Invoke = fn(&mut dyn Backend, &mut Job<'_>, &Args) -> BackendResult;

/// One entry of the command table.
pub struct CommandSpec {
    name: &'static str,
    schema: &'static [ArgKind],
    invoke: Invoke,
}

impl CommandSpec {
    /// Returns the wire name of the command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the argument schema.
    #[must_use]
    pub const fn schema(&self) -> &'static [ArgKind] {
        self.schema
    }

    /// Returns the number of positional arguments the command takes.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.schema.len()
    }

    pub(crate) fn invoke(
        &self,
        backend: &mut dyn Backend,
        job: &mut Job<'_>,
        args: &Args,
    ) -> BackendResult {
        (self.invoke)(backend, job, args)
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Every command the dispatcher understands.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "download-packages",
        schema: &[Scalar, PackageIds],
        invoke: |backend, job, args| backend.download_packages(job, args.text(0), args.list(1)),
    },
    CommandSpec {
        name: "get-categories",
        schema: &[],
        invoke: |backend, job, _| backend.get_categories(job),
    },
    CommandSpec {
        name: "get-depends",
        schema: &[Scalar, PackageIds, Flag],
        invoke: |backend, job, args| {
            backend.get_depends(job, args.text(0), args.list(1), args.text(2))
        },
    },
    CommandSpec {
        name: "get-details",
        schema: &[PackageIds],
        invoke: |backend, job, args| backend.get_details(job, args.list(0)),
    },
    CommandSpec {
        name: "get-distro-upgrades",
        schema: &[],
        invoke: |backend, job, _| backend.get_distro_upgrades(job),
    },
    CommandSpec {
        name: "get-files",
        schema: &[PackageIds],
        invoke: |backend, job, args| backend.get_files(job, args.list(0)),
    },
    CommandSpec {
        name: "get-packages",
        schema: &[Scalar],
        invoke: |backend, job, args| backend.get_packages(job, args.text(0)),
    },
    CommandSpec {
        name: "get-repo-list",
        schema: &[Scalar],
        invoke: |backend, job, args| backend.get_repo_list(job, args.text(0)),
    },
    CommandSpec {
        name: "get-requires",
        schema: &[Scalar, PackageIds, Flag],
        invoke: |backend, job, args| {
            backend.get_requires(job, args.text(0), args.list(1), args.text(2))
        },
    },
    CommandSpec {
        name: "get-update-detail",
        schema: &[PackageIds],
        invoke: |backend, job, args| backend.get_update_detail(job, args.list(0)),
    },
    CommandSpec {
        name: "get-updates",
        schema: &[Scalar],
        invoke: |backend, job, args| backend.get_updates(job, args.text(0)),
    },
    CommandSpec {
        name: "install-files",
        schema: &[Flag, Files],
        invoke: |backend, job, args| backend.install_files(job, args.text(0), args.list(1)),
    },
    CommandSpec {
        name: "install-packages",
        schema: &[PackageIds],
        invoke: |backend, job, args| backend.install_packages(job, args.list(0)),
    },
    CommandSpec {
        name: "install-signature",
        schema: &[Scalar, Scalar, Scalar],
        invoke: |backend, job, args| {
            backend.install_signature(job, args.text(0), args.text(1), args.text(2))
        },
    },
    CommandSpec {
        name: "refresh-cache",
        schema: &[],
        invoke: |backend, job, _| backend.refresh_cache(job),
    },
    CommandSpec {
        name: "remove-packages",
        schema: &[Flag, PackageIds],
        invoke: |backend, job, args| backend.remove_packages(job, args.text(0), args.list(1)),
    },
    CommandSpec {
        name: "repo-enable",
        schema: &[Scalar, Flag],
        invoke: |backend, job, args| backend.repo_enable(job, args.text(0), args.text(1)),
    },
    CommandSpec {
        name: "repo-set-data",
        schema: &[Scalar, Scalar, Scalar],
        invoke: |backend, job, args| {
            backend.repo_set_data(job, args.text(0), args.text(1), args.text(2))
        },
    },
    CommandSpec {
        name: "repo-signature-install",
        schema: &[Scalar],
        invoke: |backend, job, args| backend.repo_signature_install(job, args.text(0)),
    },
    CommandSpec {
        name: "resolve",
        schema: &[Scalar, PackageIds],
        invoke: |backend, job, args| backend.resolve(job, args.text(0), args.list(1)),
    },
    CommandSpec {
        name: "search-details",
        schema: &[Scalar, Scalar],
        invoke: |backend, job, args| backend.search_details(job, args.text(0), args.text(1)),
    },
    CommandSpec {
        name: "search-file",
        schema: &[Scalar, Scalar],
        invoke: |backend, job, args| backend.search_file(job, args.text(0), args.text(1)),
    },
    CommandSpec {
        name: "search-group",
        schema: &[Scalar, Scalar],
        invoke: |backend, job, args| backend.search_group(job, args.text(0), args.text(1)),
    },
    CommandSpec {
        name: "search-name",
        schema: &[Scalar, Scalar],
        invoke: |backend, job, args| backend.search_name(job, args.text(0), args.text(1)),
    },
    CommandSpec {
        name: "set-locale",
        schema: &[Scalar],
        invoke: |backend, job, args| backend.set_locale(job, args.text(0)),
    },
    CommandSpec {
        name: "update-packages",
        schema: &[PackageIds],
        invoke: |backend, job, args| backend.update_packages(job, args.list(0)),
    },
    CommandSpec {
        name: "update-system",
        schema: &[],
        invoke: |backend, job, _| backend.update_system(job),
    },
    CommandSpec {
        name: "what-provides",
        schema: &[Scalar, Scalar, Scalar],
        invoke: |backend, job, args| {
            backend.what_provides(job, args.text(0), args.text(1), args.text(2))
        },
    },
];

/// Older helper names still accepted on the wire.
const ALIASES: &[(&str, &str)] = &[("signature-install", "repo-signature-install")];

/// Finds a command by exact name, honouring aliases.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    let canonical = ALIASES
        .iter()
        .find_map(|(alias, target)| (*alias == name).then_some(*target))
        .unwrap_or(name);
    COMMANDS.iter().find(|spec| spec.name == canonical)
}

/// A command line that violates the protocol contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// No command has this name.
    #[error("command '{name}' is not known")]
    UnknownCommand {
        /// Name as received.
        name: String,
    },
    /// The command received the wrong number of arguments.
    #[error("command '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        /// Name as received.
        name: String,
        /// Arguments required.
        expected: usize,
        /// Arguments supplied.
        found: usize,
    },
}

/// Looks up a command and decodes its arguments.
///
/// # Errors
///
/// Returns [`ProtocolError`] for unknown names and arity mismatches.
pub fn resolve(command: &CommandLine) -> Result<(&'static CommandSpec, Args), ProtocolError> {
    let spec = lookup(command.name()).ok_or_else(|| ProtocolError::UnknownCommand {
        name: command.name().to_owned(),
    })?;
    let found = command.args().len();
    if found != spec.arity() {
        return Err(ProtocolError::Arity {
            name: command.name().to_owned(),
            expected: spec.arity(),
            found,
        });
    }
    Ok((spec, Args::decode(spec.schema, command.args())))
}
