//! Shared helpers for command handlers.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tabled::Tabled;

use meshctl_core::{Controller, NodeId, NodeListing, NodeRecord};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Validate a node id typed on the command line.
pub fn node_id(raw: u8) -> Result<NodeId, CliError> {
    if raw == 0 {
        return Err(CliError::Validation {
            field: "node".into(),
            reason: "node ids start at 1".into(),
        });
    }
    Ok(NodeId::new(raw))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to prompt on, refuses with
/// [`CliError::NonInteractiveRequiresYes`].
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Status line on stderr, suppressed by `--quiet`.
pub fn notice(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("{message}");
    }
}

pub fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "never".into(),
        |t| t.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

// ── Listings ────────────────────────────────────────────────────────

/// One row of a node, sensor or dimmer listing.
#[derive(Debug, Serialize)]
pub struct ListingEntry {
    pub id: NodeId,
    pub label: NodeListing,
    pub location: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct ListingRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Node")]
    label: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Last update")]
    last_update: String,
}

impl From<&ListingEntry> for ListingRow {
    fn from(e: &ListingEntry) -> Self {
        Self {
            id: e.id.to_string(),
            label: e.label.to_string(),
            location: e.location.clone(),
            name: e.name.clone(),
            last_update: timestamp(e.last_update),
        }
    }
}

/// Join an id-ordered listing with the records it was built from.
pub fn listing_entries(
    controller: &Controller,
    listing: BTreeMap<NodeId, NodeListing>,
) -> Vec<ListingEntry> {
    listing
        .into_iter()
        .map(|(id, label)| {
            let record: Option<Arc<NodeRecord>> = controller.node(id).ok();
            ListingEntry {
                id,
                label,
                location: record
                    .as_ref()
                    .map(|r| r.location.clone())
                    .unwrap_or_default(),
                name: record.as_ref().map(|r| r.name.clone()).unwrap_or_default(),
                last_update: record.and_then(|r| r.last_update),
            }
        })
        .collect()
}

pub fn print_listing(entries: &[ListingEntry], global: &GlobalOpts) {
    let out = output::render_list(
        &global.output,
        entries,
        |e| ListingRow::from(e),
        |e| e.id.to_string(),
    );
    output::print_output(&out, global.quiet);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_zero_is_rejected() {
        assert!(matches!(node_id(0), Err(CliError::Validation { .. })));
        assert_eq!(node_id(5).ok(), Some(NodeId::new(5)));
    }

    #[test]
    fn missing_timestamp_reads_never() {
        assert_eq!(timestamp(None), "never");
    }
}
