// ── Domain model ──
//
// Canonical representation of the mesh network as the controller sees it:
// node identities and records, network status, command-class values and
// the readings derived from them.

pub mod identity;
pub mod network;
pub mod node;
pub mod operation;
pub mod reading;
pub mod value;

// ── Re-exports ──────────────────────────────────────────────────────

pub use identity::{HomeId, NodeId};
pub use network::{NetworkInfo, NetworkStatus, StartOutcome};
pub use node::{
    NOT_READY_LABEL, NodeClass, NodeConfiguration, NodeDetail, NodeInfo, NodeListing, NodeRecord,
};
pub use operation::{OperationKind, PendingOperation};
pub use reading::{DimmerReading, ParameterOutcome, ReadingKind, SensorReading};
pub use value::{NodeValue, ValueData, ValueGenre, ValueId, ValueQuery, command_class};
