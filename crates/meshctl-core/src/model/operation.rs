// ── Outstanding physical-action waits ──

use serde::Serialize;
use strum::{Display, EnumString};
use tokio::time::Instant;

use super::identity::NodeId;

/// The three timeout-bounded waits a controller can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    AwaitNetworkReady,
    AwaitNodeAdded,
    AwaitNodeRemoved,
}

impl OperationKind {
    /// Human-facing verb used in timeout errors and logs.
    pub fn verb(self) -> &'static str {
        match self {
            Self::AwaitNetworkReady => "network start",
            Self::AwaitNodeAdded => "node inclusion",
            Self::AwaitNodeRemoved => "node exclusion",
        }
    }
}

/// One outstanding wait.
///
/// `sentinel` is the id of the most recently added/removed record observed
/// when the wait began (`None` if there was none, and always `None` for
/// network-ready waits). `generation` distinguishes a wait from the one that
/// overwrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub deadline: Instant,
    pub sentinel: Option<NodeId>,
    pub generation: u64,
}
