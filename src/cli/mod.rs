//! CLI module for aeroctl
//!
//! One invocation runs in a fixed order:
//! 1. Every command module binds its sub-commands to the shared parser
//! 2. Arguments are parsed once; `version` is answered right away
//! 3. Configuration is resolved (file, string, flags, host uuid)
//! 4. Offline commands run without a connection
//! 5. The control-plane connection is established and probed
//! 6. The selected command is dispatched against that connection
//!
//! Every step returns `CliResult`; only `main` exits the process.

mod args;
mod errors;
mod io;
mod registry;

use std::ffi::OsString;

use clap::error::ErrorKind;

use crate::client::{connect_to_auth_service, Dialer, TcpDialer};
use crate::config::{ConfigResolver, RuntimeConfig};

pub use args::{
    add_global_flags, add_version_command, new_parser, parse, GlobalFlags, SelectedCommand,
    APP_NAME, CONFIG_ENVAR, VERSION_COMMAND,
};
pub use errors::{CliError, CliErrorCode, CliResult, ErrorStage};
pub use io::{write_json, write_text, Table};
pub use registry::{CommandModule, CommandRegistry};

/// Distribution name printed by `version`
pub const DISTRIBUTION: &str = "AeroDB";

/// Text printed by the `version` command
pub fn version_string(distribution: &str) -> String {
    format!("{} {} v{}", distribution, APP_NAME, env!("CARGO_PKG_VERSION"))
}

/// What an invocation produced, besides command output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `version` was selected; nothing else ran
    Version(String),
    /// Help was requested; nothing else ran
    Help(String),
    /// The named command ran to completion
    Executed(String),
}

/// The assembled CLI: modules, configuration resolver and dialer
pub struct App {
    distribution: String,
    registry: CommandRegistry,
    resolver: ConfigResolver,
    dialer: Box<dyn Dialer>,
}

impl App {
    pub fn new(distribution: impl Into<String>, modules: Vec<Box<dyn CommandModule>>) -> Self {
        Self {
            distribution: distribution.into(),
            registry: CommandRegistry::new(modules),
            resolver: ConfigResolver::default(),
            dialer: Box::new(TcpDialer),
        }
    }

    /// Replace the dialer used to reach the control plane
    pub fn with_dialer(mut self, dialer: Box<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Replace the configuration resolver (default config path)
    pub fn with_resolver(mut self, resolver: ConfigResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run one invocation; `args` includes the binary name
    pub fn run_from<I, T>(&mut self, args: I) -> CliResult<Outcome>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cfg = RuntimeConfig::default();

        let app = self.registry.initialize(new_parser(), &mut cfg);
        let app = add_version_command(add_global_flags(app));

        let matches = match parse(app, args) {
            Ok(matches) => matches,
            Err(e) => {
                return match e.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                        Ok(Outcome::Help(e.render().to_string()))
                    }
                    _ => Err(CliError::usage(e.render().to_string())),
                }
            }
        };

        let selected = SelectedCommand::from_matches(&matches)
            .ok_or_else(|| CliError::usage("no command given"))?;

        if selected.is(VERSION_COMMAND) {
            return Ok(Outcome::Version(version_string(&self.distribution)));
        }

        let flags = GlobalFlags::from_matches(selected.matches());
        self.resolver.apply_config(&flags, &mut cfg)?;

        if self.registry.try_run_offline(&selected, &cfg)? {
            return Ok(Outcome::Executed(selected.name().to_string()));
        }

        let client = connect_to_auth_service(&mut cfg, self.dialer.as_ref())?;
        self.registry.dispatch(&selected, &client)?;

        Ok(Outcome::Executed(selected.name().to_string()))
    }
}

/// Run the CLI with the process arguments and print what it produced
pub fn run(modules: Vec<Box<dyn CommandModule>>) -> CliResult<()> {
    let mut app = App::new(DISTRIBUTION, modules);
    match app.run_from(std::env::args_os())? {
        Outcome::Version(text) | Outcome::Help(text) => write_text(&text),
        Outcome::Executed(_) => Ok(()),
    }
}
