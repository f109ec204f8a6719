//! Sensor command handlers.

use std::collections::BTreeMap;

use tabled::Tabled;

use meshctl_core::{Controller, NodeId, ParameterOutcome, SensorReading, SensorReadings};

use crate::cli::{GlobalOpts, SensorsArgs, SensorsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&SensorReading> for ReadingRow {
    fn from(r: &SensorReading) -> Self {
        Self {
            sensor: r.sensor.to_string(),
            location: r.location.clone(),
            kind: r.kind.to_string(),
            value: r.value.to_string(),
            updated: util::timestamp(r.update_time),
        }
    }
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "Accepted")]
    accepted: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn outcomes_detail(outcomes: &BTreeMap<NodeId, ParameterOutcome>, color: bool) -> String {
    if outcomes.is_empty() {
        return "No sensors in the network".into();
    }
    let rows: Vec<OutcomeRow> = outcomes
        .iter()
        .map(|(id, o)| OutcomeRow {
            sensor: id.to_string(),
            accepted: output::ready_label(o.accepted, color),
            reason: o.reason.clone(),
        })
        .collect();
    tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    args: SensorsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SensorsCommand::List => {
            let entries = util::listing_entries(controller, controller.list_sensors());
            util::print_listing(&entries, global);
            Ok(())
        }

        SensorsCommand::Read { node, kind } => {
            let id = util::node_id(node)?;
            let readings = match kind {
                Some(kind) => vec![controller.sensor_reading(id, kind)?],
                None => controller.sensor_readings(id)?,
            };
            let out = output::render_list(
                &global.output,
                &readings,
                |r| ReadingRow::from(r),
                |r| r.value.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SensorsCommand::SetParam { index, value, size } => {
            let outcomes = controller.set_sensors_parameter(index, value, size)?;
            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &outcomes,
                |o| outcomes_detail(o, color),
                |o| {
                    o.iter()
                        .map(|(id, outcome)| format!("{id} {}", outcome.reason))
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
