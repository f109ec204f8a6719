//! Dimmer command handlers.

use serde::Serialize;

use meshctl_core::{Controller, DimmerControl, DimmerReading, NodeId, ValueData};

use crate::cli::{DimmersArgs, DimmersCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(r: &DimmerReading) -> String {
    output::detail_block(&[
        ("Dimmer", r.dimmer.to_string()),
        ("Controller", r.controller.clone()),
        ("Location", r.location.clone()),
        ("Level", r.value.to_string()),
    ])
}

#[derive(Serialize)]
struct LevelChange {
    dimmer: NodeId,
    previous: ValueData,
    level: u8,
}

pub fn handle(
    controller: &Controller,
    args: DimmersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DimmersCommand::List => {
            let entries = util::listing_entries(controller, controller.list_dimmers());
            util::print_listing(&entries, global);
            Ok(())
        }

        DimmersCommand::Get { node } => {
            let reading = controller.dimmer_level(util::node_id(node)?)?;
            let out = output::render_single(&global.output, &reading, detail, |r| {
                r.value.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DimmersCommand::Set { node, level } => {
            let id = util::node_id(node)?;
            let previous = controller.set_dimmer_level(id, level)?;
            let change = LevelChange {
                dimmer: id,
                previous,
                level,
            };
            let out = output::render_single(
                &global.output,
                &change,
                |c| format!("Dimmer {}: {} -> {}", c.dimmer, c.previous, c.level),
                |c| c.previous.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
