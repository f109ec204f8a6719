//! Notification-to-state reconciliation engine for a mesh network controller.
//!
//! The hardware driver emits lifecycle notifications in no particular order
//! and from any thread. This crate turns that feed into a consistent view of
//! the network and into synchronous, timeout-bounded client operations:
//!
//! - **[`Controller`]**: cloneable facade owning one network instance.
//!   [`start_network()`](Controller::start_network) starts the driver and
//!   waits for readiness; [`add_node()`](Controller::add_node) and
//!   [`remove_node()`](Controller::remove_node) wait for a physical
//!   inclusion or exclusion. [`Controller::oneshot()`] wraps a single CLI
//!   invocation.
//!
//! - **Node registry**: `DashMap` of [`NodeRecord`]s plus `tokio::sync::watch`
//!   channels publishing ordered snapshots and the most recently added and
//!   removed records. A single dispatcher task is its only writer on the
//!   notification path.
//!
//! - **[`NodeStream`]**: subscription handle exposing `current()` /
//!   `latest()` / `changed()` and a `Stream` adapter.
//!
//! - **Capabilities**: [`SensorReadings`] and [`DimmerControl`] add
//!   per-reading accessors to the controller.
//!
//! - **Drivers** ([`driver`]): the [`MeshDriver`] trait and the in-memory
//!   [`SimulatedDriver`].

pub mod capability;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
mod events;
mod lifecycle;
pub mod model;
mod query;
mod status;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use capability::{DimmerControl, MAX_DIMMER_LEVEL, SensorReadings};
pub use config::{ControllerConfig, NodeClassifier};
pub use controller::Controller;
pub use driver::{
    DriverError, Envelope, MeshDriver, Notification, NotificationSink, SimulatedDriver,
    SimulatedNode, SimulationProfile,
};
pub use error::CoreError;
pub use store::NodeSnapshot;
pub use stream::{NodeFilter, NodeStream, NodeWatchStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    DimmerReading, HomeId, NetworkInfo, NetworkStatus, NodeClass, NodeConfiguration, NodeDetail,
    NodeId, NodeInfo, NodeListing, NodeRecord, NodeValue, OperationKind, ParameterOutcome,
    PendingOperation, ReadingKind, SensorReading, StartOutcome, ValueData, ValueGenre, ValueId,
    ValueQuery,
};
