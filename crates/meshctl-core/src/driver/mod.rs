// ── Hardware driver boundary ──
//
// The driver talks to the physical controller. Commands are synchronous
// calls that only *submit* work; the outcome arrives later as a
// notification pushed through the `NotificationSink` the driver was given.

pub mod sim;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::{HomeId, NodeId, NodeInfo, NodeValue, ValueData, ValueId, ValueQuery};

pub use sim::{SimCounters, SimulatedDriver, SimulatedNode, SimulationProfile};

/// Errors raised synchronously by a driver call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {node} has no value {value}")]
    UnknownValue { node: NodeId, value: ValueId },

    #[error("network is not running")]
    NotRunning,

    #[error("{command} rejected: {reason}")]
    Rejected { command: String, reason: String },

    #[error("{0}")]
    Io(String),
}

/// Lifecycle notifications emitted by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NetworkStarted { home_id: HomeId, node_count: usize },
    NetworkReady { home_id: HomeId, node_count: usize },
    NetworkReset { home_id: HomeId, node_count: usize },
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    ValueUpdated { node: NodeId, value: NodeValue },
}

impl Notification {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkStarted { .. } => "network_started",
            Self::NetworkReady { .. } => "network_ready",
            Self::NetworkReset { .. } => "network_reset",
            Self::NodeAdded(_) => "node_added",
            Self::NodeRemoved(_) => "node_removed",
            Self::ValueUpdated { .. } => "value_updated",
        }
    }

    /// Node the notification concerns, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::NodeAdded(id) | Self::NodeRemoved(id) => Some(*id),
            Self::ValueUpdated { node, .. } => Some(*node),
            _ => None,
        }
    }
}

/// A notification stamped with the wall-clock time it was observed.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub observed_at: DateTime<Utc>,
    pub notification: Notification,
}

/// Write half of the notification queue, handed to the driver.
///
/// Cloneable and usable from any thread. Pushing after the controller shut
/// down is silently ignored.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl NotificationSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    /// Build a sink together with its receiving half.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn push(&self, notification: Notification) {
        let envelope = Envelope {
            observed_at: Utc::now(),
            notification,
        };
        if self.tx.send(envelope).is_err() {
            tracing::trace!("notification dropped, dispatcher gone");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Synchronous command surface of a mesh controller driver.
///
/// Implementations must be callable from any task. Commands that start a
/// physical action (`add_node`, `remove_node`) return `Ok(true)` when the
/// controller accepted them; completion is reported via notifications.
pub trait MeshDriver: Send + Sync + 'static {
    /// Install the sink notifications are pushed into. Called once by the
    /// controller before `start`.
    fn set_sink(&self, sink: NotificationSink);

    fn start(&self) -> Result<(), DriverError>;
    fn stop(&self) -> Result<(), DriverError>;

    /// Synchronous readiness predicate polled during network start.
    fn is_ready(&self) -> bool;

    fn home_id(&self) -> HomeId;
    fn nodes_count(&self) -> usize;
    fn node_ids(&self) -> Result<Vec<NodeId>, DriverError>;

    fn hard_reset(&self) -> Result<(), DriverError>;
    fn soft_reset(&self) -> Result<(), DriverError>;

    fn add_node(&self) -> Result<bool, DriverError>;
    fn remove_node(&self) -> Result<bool, DriverError>;
    fn cancel_command(&self) -> Result<(), DriverError>;

    // ── Per-node accessors ───────────────────────────────────────────

    fn node_info(&self, node: NodeId) -> Option<NodeInfo>;
    fn neighbors(&self, node: NodeId) -> Result<Vec<NodeId>, DriverError>;
    fn set_node_location(&self, node: NodeId, location: &str) -> Result<(), DriverError>;
    fn set_node_name(&self, node: NodeId, name: &str) -> Result<(), DriverError>;

    // ── Values ───────────────────────────────────────────────────────

    fn values(&self, node: NodeId, query: &ValueQuery) -> Result<Vec<NodeValue>, DriverError>;
    fn set_value(&self, node: NodeId, value: ValueId, data: ValueData) -> Result<(), DriverError>;

    /// Ask the node to report all its configuration parameters.
    fn request_config_params(&self, node: NodeId) -> Result<(), DriverError>;

    /// Push one configuration parameter. `Ok(false)` if the command was not
    /// queued.
    fn set_config_param(
        &self,
        node: NodeId,
        index: u8,
        value: i64,
        size: u8,
    ) -> Result<bool, DriverError>;
}
