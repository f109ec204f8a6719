//! Network command handlers.

use serde::Serialize;
use tabled::Tabled;

use meshctl_core::{Controller, NetworkInfo, NetworkStatus, NodeDetail, StartOutcome};

use crate::cli::{GlobalOpts, NetworkArgs, NetworkCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NodeDetailRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Type")]
    node_type: String,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Neighbors")]
    neighbors: String,
    #[tabled(rename = "Last update")]
    last_update: String,
}

impl NodeDetailRow {
    fn new(d: &NodeDetail, color: bool) -> Self {
        Self {
            id: d.id.to_string(),
            ready: output::ready_label(d.ready, color),
            node_type: d.node_type.clone(),
            product: d.product_name.clone(),
            location: d.location.clone(),
            neighbors: join_ids(&d.neighbors),
            last_update: util::timestamp(d.last_update),
        }
    }
}

pub(super) fn join_ids(ids: &[meshctl_core::NodeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn info_detail(info: &NetworkInfo, color: bool) -> String {
    let header = output::detail_block(&[
        ("Home id", info.home_id.to_string()),
        ("Status", output::status_label(info.status, color)),
        ("Controller", info.controller.clone()),
        ("Nodes", info.nodes.len().to_string()),
    ]);
    let rows: Vec<NodeDetailRow> = info
        .nodes
        .iter()
        .map(|d| NodeDetailRow::new(d, color))
        .collect();
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    format!("{header}\n\n{table}")
}

#[derive(Serialize)]
struct StartReport {
    status: NetworkStatus,
    #[serde(flatten)]
    outcome: StartOutcome,
}

fn start_detail(report: &StartReport, color: bool) -> String {
    let status = output::status_label(report.status, color);
    match report.outcome {
        StartOutcome::Ready { after, polls } => format!(
            "Network {status} after {} ({polls} readiness checks)",
            humantime::format_duration(after)
        ),
        StartOutcome::TimedOutButRunning { waited } => format!(
            "Network not ready after {}; status {status}, still starting in the background",
            humantime::format_duration(waited)
        ),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    outcome: StartOutcome,
    args: NetworkArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    match args.command {
        NetworkCommand::Start => {
            let report = StartReport {
                status: controller.status(),
                outcome,
            };
            let out = output::render_single(
                &global.output,
                &report,
                |r| start_detail(r, color),
                |r| r.status.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworkCommand::Info => {
            let info = controller.network_info();
            let out = output::render_single(
                &global.output,
                &info,
                |i| info_detail(i, color),
                |i| i.home_id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NetworkCommand::HardReset { force } => {
            if !util::confirm(
                "Erase the controller's network? Included nodes will have to be re-included.",
                "network hard-reset",
                global.yes,
            )? {
                return Ok(());
            }
            let status = controller.hard_reset(force)?;
            util::notice(global, &format!("Network reset ({status})"));
            Ok(())
        }

        NetworkCommand::SoftReset => {
            let status = controller.soft_reset()?;
            util::notice(global, &format!("Controller restarting ({status})"));
            Ok(())
        }
    }
}
