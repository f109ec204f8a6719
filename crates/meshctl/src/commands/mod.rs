//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod dimmers;
pub mod network;
pub mod nodes;
pub mod sensors;
pub mod util;

use meshctl_core::{Controller, StartOutcome};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a network-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    outcome: StartOutcome,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Network(args) => network::handle(controller, outcome, args, global),
        Command::Nodes(args) => nodes::handle(controller, args, global).await,
        Command::Sensors(args) => sensors::handle(controller, args, global),
        Command::Dimmers(args) => dimmers::handle(controller, args, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need a running network".into(),
        )),
    }
}
