//! Node command handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use meshctl_core::{
    Controller, NodeConfiguration, NodeDetail, NodeFilter, NodeId, NodeRecord, NodeValue,
};

use crate::cli::{GlobalOpts, NodesArgs, NodesCommand, ParamCommand};
use crate::error::CliError;
use crate::output;

use super::network::join_ids;
use super::util::{self, ListingEntry};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Index")]
    index: u8,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Units")]
    units: String,
}

impl From<&NodeValue> for ParameterRow {
    fn from(v: &NodeValue) -> Self {
        Self {
            node: v.node.to_string(),
            index: v.index,
            label: v.label.clone(),
            value: v.data.to_string(),
            units: v.units.clone(),
        }
    }
}

fn detail(d: &NodeDetail) -> String {
    output::detail_block(&[
        ("ID", d.id.to_string()),
        ("Ready", d.ready.to_string()),
        ("Type", d.node_type.clone()),
        ("Product", d.product_name.clone()),
        ("Location", d.location.clone()),
        ("Name", d.name.clone()),
        ("Neighbors", join_ids(&d.neighbors)),
        ("Last update", util::timestamp(d.last_update)),
    ])
}

fn record_detail(r: &NodeRecord) -> String {
    output::detail_block(&[
        ("ID", r.id.to_string()),
        ("Ready", r.ready.to_string()),
        ("Type", r.node_type.clone()),
        ("Product", r.product_name.clone()),
    ])
}

fn configuration_detail(config: &BTreeMap<NodeId, NodeConfiguration>) -> String {
    let rows: Vec<ParameterRow> = config
        .values()
        .flat_map(|c| c.values.iter().map(ParameterRow::from))
        .collect();
    tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string()
}

/// Before/after pair printed by the location and name setters.
#[derive(Serialize)]
struct FieldChange {
    node: NodeId,
    field: &'static str,
    previous: String,
    current: String,
}

fn change_detail(c: &FieldChange) -> String {
    format!(
        "Node {} {}: '{}' -> '{}'",
        c.node, c.field, c.previous, c.current
    )
}

fn filtered_entries(controller: &Controller, filter: NodeFilter) -> Vec<ListingEntry> {
    let keep: Vec<NodeId> = controller
        .nodes()
        .with_filter(filter)
        .current()
        .iter()
        .map(|r| r.id)
        .collect();
    let listing = controller
        .list_nodes()
        .into_iter()
        .filter(|(id, _)| keep.contains(id))
        .collect();
    util::listing_entries(controller, listing)
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(
    controller: &Controller,
    args: NodesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        NodesCommand::List { filter } => {
            let entries = filtered_entries(controller, filter.into());
            util::print_listing(&entries, global);
            Ok(())
        }

        NodesCommand::Get { node } => {
            let d = controller.node_detail(util::node_id(node)?)?;
            let out = output::render_single(&global.output, &d, detail, |d| d.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodesCommand::Add => {
            let spinner = output::spinner(global, "Inclusion mode: activate the new device");
            let result = controller.add_node().await;
            spinner.finish_and_clear();
            print_record(&result?, "joined", global);
            Ok(())
        }

        NodesCommand::Remove => {
            let spinner = output::spinner(global, "Exclusion mode: activate the device to remove");
            let result = controller.remove_node().await;
            spinner.finish_and_clear();
            print_record(&result?, "left", global);
            Ok(())
        }

        NodesCommand::Location { node, value } => {
            let id = util::node_id(node)?;
            match value {
                None => {
                    let location = controller.node_location(id)?;
                    output::print_output(&location, global.quiet);
                }
                Some(location) => {
                    let previous = controller.set_node_location(id, &location)?;
                    print_change(
                        &FieldChange {
                            node: id,
                            field: "location",
                            previous,
                            current: location,
                        },
                        global,
                    );
                }
            }
            Ok(())
        }

        NodesCommand::Name { node, value } => {
            let id = util::node_id(node)?;
            match value {
                None => {
                    let name = controller.node_name(id)?;
                    output::print_output(&name, global.quiet);
                }
                Some(name) => {
                    let previous = controller.set_node_name(id, &name)?;
                    print_change(
                        &FieldChange {
                            node: id,
                            field: "name",
                            previous,
                            current: name,
                        },
                        global,
                    );
                }
            }
            Ok(())
        }

        NodesCommand::Neighbors { node } => {
            let neighbors = controller.neighbors(util::node_id(node)?)?;
            let out = output::render_single(
                &global.output,
                &neighbors,
                |n| join_ids(n),
                |n| {
                    n.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodesCommand::Timestamp { node } => {
            let id = util::node_id(node)?;
            // Existence first: an unknown node and a silent one both have no timestamp.
            controller.node(id)?;
            let at = controller.node_timestamp(id);
            let out = output::render_single(
                &global.output,
                &at.map(|t| t.timestamp()),
                |_| util::timestamp(at),
                |t| t.map(|s| s.to_string()).unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodesCommand::Config => {
            let config = controller.nodes_configuration();
            let out = output::render_single(
                &global.output,
                &config,
                configuration_detail,
                |c| {
                    c.keys()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodesCommand::Param(args) => match args.command {
            ParamCommand::Get { node, index } => {
                let value = controller.node_parameter(util::node_id(node)?, index)?;
                let out = output::render_list(
                    &global.output,
                    std::slice::from_ref(&value),
                    |v| ParameterRow::from(v),
                    |v| v.data.to_string(),
                );
                output::print_output(&out, global.quiet);
                Ok(())
            }

            ParamCommand::Set {
                node,
                index,
                value,
                size,
            } => {
                let id = util::node_id(node)?;
                if !controller.set_node_parameter(id, index, value, size)? {
                    return Err(CliError::Rejected {
                        operation: format!("parameter {index} on node {id}"),
                        reason: "refused by driver".into(),
                    });
                }
                util::notice(global, &format!("Parameter {index} on node {id} set to {value}"));
                Ok(())
            }
        },
    }
}

fn print_record(record: &Arc<NodeRecord>, verb: &str, global: &GlobalOpts) {
    util::notice(global, &format!("Node {} {verb} the network", record.id));
    let out = output::render_single(&global.output, record.as_ref(), record_detail, |r| {
        r.id.to_string()
    });
    output::print_output(&out, global.quiet);
}

fn print_change(change: &FieldChange, global: &GlobalOpts) {
    let out = output::render_single(&global.output, change, change_detail, |c| {
        c.previous.clone()
    });
    output::print_output(&out, global.quiet);
}
