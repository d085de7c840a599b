//! Command modules and dispatch
//!
//! A command module contributes its sub-commands to the shared parser
//! and later claims the command the user selected. Modules never see
//! each other; the registry offers every selection to them in
//! registration order and the first claim wins.

use clap::Command;

use super::args::SelectedCommand;
use super::errors::{CliError, CliResult};
use crate::client::Client;
use crate::config::RuntimeConfig;
use crate::observability::{log_event_with_fields, trace_event, Event};

/// A pluggable set of CLI commands
pub trait CommandModule {
    /// Attach sub-commands and flags to `app`.
    ///
    /// Called exactly once, before parsing. A module may record its own
    /// defaults in `cfg`, and must leave fields owned by other modules alone.
    fn initialize(&mut self, app: Command, cfg: &mut RuntimeConfig) -> Command;

    /// Run `selected` if it belongs to this module.
    ///
    /// Returns `Ok(false)` when the command is not ours.
    fn try_run(&mut self, selected: &SelectedCommand, client: &Client) -> CliResult<bool>;

    /// Run `selected` without a control-plane connection.
    ///
    /// Offered after configuration is resolved and before any identity is
    /// loaded. Only commands that work entirely locally claim it here.
    fn try_run_offline(
        &mut self,
        _selected: &SelectedCommand,
        _cfg: &RuntimeConfig,
    ) -> CliResult<bool> {
        Ok(false)
    }
}

/// Ordered collection of command modules
#[derive(Default)]
pub struct CommandRegistry {
    modules: Vec<Box<dyn CommandModule>>,
}

impl CommandRegistry {
    pub fn new(modules: Vec<Box<dyn CommandModule>>) -> Self {
        Self { modules }
    }

    /// Append a module; it is offered commands after all earlier ones
    pub fn register(&mut self, module: Box<dyn CommandModule>) {
        self.modules.push(module);
    }

    /// Let every module bind its commands to the shared parser
    pub fn initialize(&mut self, app: Command, cfg: &mut RuntimeConfig) -> Command {
        self.modules
            .iter_mut()
            .fold(app, |app, module| module.initialize(app, cfg))
    }

    /// Offer `selected` to the modules' offline hooks.
    ///
    /// Returns whether a module ran it.
    pub fn try_run_offline(
        &mut self,
        selected: &SelectedCommand,
        cfg: &RuntimeConfig,
    ) -> CliResult<bool> {
        for module in self.modules.iter_mut() {
            let claimed = module
                .try_run_offline(selected, cfg)
                .map_err(|e| failed(selected, e))?;
            if claimed {
                log_event_with_fields(
                    Event::CommandDispatched,
                    &[("command", selected.name()), ("mode", "offline")],
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run `selected` on the first module that claims it.
    ///
    /// Every selectable command came from some module's `initialize`, so
    /// a selection nobody claims is a bug in that module.
    pub fn dispatch(&mut self, selected: &SelectedCommand, client: &Client) -> CliResult<()> {
        for module in self.modules.iter_mut() {
            let claimed = module
                .try_run(selected, client)
                .map_err(|e| failed(selected, e))?;
            if claimed {
                log_event_with_fields(
                    Event::CommandDispatched,
                    &[("command", selected.name()), ("mode", "connected")],
                );
                return Ok(());
            }
        }
        Err(CliError::unclaimed_command(selected.name()))
    }
}

fn failed(selected: &SelectedCommand, err: CliError) -> CliError {
    trace_event(
        Event::CommandFailed,
        &[("command", selected.name()), ("error", err.message())],
    );
    err.in_command(selected.name())
}
