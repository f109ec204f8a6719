// ── Node domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::identity::NodeId;
use super::value::NodeValue;

/// Placeholder shown in listings for nodes whose query sequence has not
/// completed yet.
pub const NOT_READY_LABEL: &str = "[not ready]";

/// Capability tags derived from a node's reported type string.
///
/// The two flags are independent: a node can match neither pattern, one of
/// them, or (degenerate but legal) both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeClass {
    pub sensor: bool,
    pub dimmer: bool,
}

impl NodeClass {
    pub const NONE: Self = Self {
        sensor: false,
        dimmer: false,
    };
}

/// Static node fields as reported by the driver at query time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    /// Device type string, e.g. `"Routing Multilevel Sensor"`.
    pub node_type: String,
    pub product_name: String,
    pub location: String,
    pub name: String,
    /// Driver-side readiness: the node's query sequence completed.
    pub ready: bool,
}

/// Registry-owned view of one node.
///
/// Records are immutable once published; the registry replaces the whole
/// `Arc<NodeRecord>` on every mutation, so a reader never observes a
/// half-applied update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub ready: bool,
    /// Time of the last value update, seconds since the epoch on the wire.
    #[serde(with = "chrono::serde::ts_seconds_option", default)]
    pub last_update: Option<DateTime<Utc>>,
    pub class: NodeClass,
    pub node_type: String,
    pub product_name: String,
    pub location: String,
    pub name: String,
}

impl NodeRecord {
    /// A bare record for a node the driver has not described yet.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            ready: false,
            last_update: None,
            class: NodeClass::NONE,
            node_type: String::new(),
            product_name: String::new(),
            location: String::new(),
            name: String::new(),
        }
    }

    pub fn from_info(info: &NodeInfo, class: NodeClass) -> Self {
        Self {
            id: info.id,
            ready: info.ready,
            last_update: None,
            class,
            node_type: info.node_type.clone(),
            product_name: info.product_name.clone(),
            location: info.location.clone(),
            name: info.name.clone(),
        }
    }

    /// At least one value update has been observed for this node.
    pub fn has_history(&self) -> bool {
        self.last_update.is_some()
    }

    /// Usable for reading-specific operations: the driver flagged it ready,
    /// or it already delivered a reading.
    pub fn is_queryable(&self) -> bool {
        self.ready || self.has_history()
    }

    pub fn is_sensor(&self) -> bool {
        self.class.sensor
    }

    pub fn is_dimmer(&self) -> bool {
        self.class.dimmer
    }
}

/// Per-node detail returned by network info and `nodes show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDetail {
    pub id: NodeId,
    pub ready: bool,
    pub neighbors: Vec<NodeId>,
    pub location: String,
    pub name: String,
    pub node_type: String,
    pub product_name: String,
    #[serde(with = "chrono::serde::ts_seconds_option", default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl NodeDetail {
    pub fn from_record(record: &NodeRecord, neighbors: Vec<NodeId>) -> Self {
        Self {
            id: record.id,
            ready: record.ready,
            neighbors,
            location: record.location.clone(),
            name: record.name.clone(),
            node_type: record.node_type.clone(),
            product_name: record.product_name.clone(),
            last_update: record.last_update,
        }
    }
}

/// Configuration-genre values of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfiguration {
    pub node_type: String,
    pub values: Vec<NodeValue>,
}

/// One row of an identity-ordered listing.
///
/// Serializes as a bare string: the label for ready nodes, `"[not ready]"`
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeListing {
    Ready(String),
    NotReady,
}

impl NodeListing {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Display for NodeListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(label) => f.write_str(label),
            Self::NotReady => f.write_str(NOT_READY_LABEL),
        }
    }
}

impl Serialize for NodeListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn readiness_and_history_are_independent() {
        let mut record = NodeRecord::new(NodeId::new(4));
        assert!(!record.is_queryable());

        record.last_update = Some(Utc::now());
        assert!(!record.ready);
        assert!(record.has_history());
        assert!(record.is_queryable());
    }

    #[test]
    fn record_serializes_timestamp_as_epoch_seconds() {
        let mut record = NodeRecord::new(NodeId::new(2));
        record.last_update = Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["last_update"], 1_700_000_000);
        assert_eq!(json["id"], 2);
    }

    #[test]
    fn listing_serializes_as_string() {
        let ready = serde_json::to_string(&NodeListing::Ready("MultiSensor 6".into())).unwrap();
        let pending = serde_json::to_string(&NodeListing::NotReady).unwrap();
        assert_eq!(ready, "\"MultiSensor 6\"");
        assert_eq!(pending, "\"[not ready]\"");
    }
}
