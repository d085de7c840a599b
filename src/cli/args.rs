//! Shared CLI parser and global flags
//!
//! The parser is built with the clap builder API so command modules can
//! attach their own sub-commands at runtime:
//!
//! - aeroctl [--debug] [--config <path>] <command> ...
//! - aeroctl version

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};

/// Binary name
pub const APP_NAME: &str = "aeroctl";

/// Environment variable carrying the base64 configuration string
pub const CONFIG_ENVAR: &str = "AEROCTL_CONFIG";

/// The built-in version command
pub const VERSION_COMMAND: &str = "version";

const GLOBAL_HELP: &str = "Admin tool for the AeroDB control-plane service.";

const ARG_DEBUG: &str = "debug";
const ARG_CONFIG: &str = "config";
const ARG_CONFIG_STRING: &str = "config-string";

/// CLI flags that apply to every command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalFlags {
    pub debug: bool,
    pub config_file: Option<PathBuf>,
    pub config_string: Option<String>,
}

impl GlobalFlags {
    /// Read the global flags from the matches of the selected command.
    ///
    /// Global arguments are propagated to every sub-command, so the leaf
    /// matches see them wherever they were given on the command line.
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            debug: matches
                .try_get_one::<bool>(ARG_DEBUG)
                .ok()
                .flatten()
                .copied()
                .unwrap_or(false),
            config_file: matches
                .try_get_one::<PathBuf>(ARG_CONFIG)
                .ok()
                .flatten()
                .cloned(),
            config_string: matches
                .try_get_one::<String>(ARG_CONFIG_STRING)
                .ok()
                .flatten()
                .cloned(),
        }
    }
}

/// Create the empty shared parser
pub fn new_parser() -> Command {
    Command::new(APP_NAME)
        .about(GLOBAL_HELP)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .disable_version_flag(true)
}

/// Attach the flags shared by all commands
pub fn add_global_flags(app: Command) -> Command {
    app.arg(
        Arg::new(ARG_DEBUG)
            .long("debug")
            .short('d')
            .help("Enable verbose logging to stderr")
            .action(ArgAction::SetTrue)
            .global(true),
    )
    .arg(
        Arg::new(ARG_CONFIG)
            .long("config")
            .short('c')
            .value_name("PATH")
            .help(format!(
                "Path to a configuration file [{}]",
                crate::config::DEFAULT_CONFIG_PATH
            ))
            .value_parser(clap::value_parser!(PathBuf))
            .global(true),
    )
    .arg(
        Arg::new(ARG_CONFIG_STRING)
            .long("config-string")
            .value_name("BASE64")
            .help("Base64 encoded configuration string")
            .env(CONFIG_ENVAR)
            .hide(true)
            .hide_env_values(true)
            .global(true),
    )
}

/// Attach the always-available version command
pub fn add_version_command(app: Command) -> Command {
    app.subcommand(Command::new(VERSION_COMMAND).about("Print the version."))
}

/// The command selected on the command line
#[derive(Debug, Clone)]
pub struct SelectedCommand {
    name: String,
    matches: ArgMatches,
}

impl SelectedCommand {
    /// Walk the sub-command chain of `matches` down to the leaf.
    ///
    /// The name is the space-separated path, e.g. `tokens ls`.
    pub fn from_matches(matches: &ArgMatches) -> Option<Self> {
        let (first, mut current) = matches.subcommand()?;
        let mut path = vec![first.to_string()];
        while let Some((name, sub)) = current.subcommand() {
            path.push(name.to_string());
            current = sub;
        }
        Some(Self {
            name: path.join(" "),
            matches: current.clone(),
        })
    }

    /// Full command name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Matches of the leaf command
    pub fn matches(&self) -> &ArgMatches {
        &self.matches
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Parse `args` (including the binary name) with `app`
pub fn parse<I, T>(app: Command, args: I) -> Result<ArgMatches, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    app.try_get_matches_from(args)
}
