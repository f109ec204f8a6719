// ── Controller abstraction ──
//
// Full lifecycle management for one mesh network controller instance.
// Wires the driver's notification sink to the dispatcher, owns the node
// registry and network status, and exposes the lifecycle waits and
// read-side queries as one cloneable handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ControllerConfig;
use crate::driver::{Envelope, MeshDriver, NotificationSink};
use crate::error::CoreError;
use crate::events::{EventBus, dispatcher_task};
use crate::lifecycle::LifecycleCoordinator;
use crate::model::{
    NetworkInfo, NetworkStatus, NodeConfiguration, NodeDetail, NodeId, NodeListing, NodeRecord,
    NodeValue, PendingOperation, StartOutcome,
};
use crate::query::QueryFacade;
use crate::status::StatusCell;
use crate::store::{NodeRegistry, NodeSnapshot};
use crate::stream::NodeStream;

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Each instance owns its own
/// status, registry and dispatcher; several instances in one process do
/// not share state.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    registry: Arc<NodeRegistry>,
    status: StatusCell,
    bus: Arc<EventBus>,
    lifecycle: LifecycleCoordinator,
    query: QueryFacade,
    cancel: CancellationToken,
    /// Taken by the dispatcher on the first network start.
    notification_rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller around `driver`. Validates the configuration and
    /// installs the notification sink, but does NOT start the network --
    /// call [`start_network()`](Self::start_network).
    pub fn new(config: ControllerConfig, driver: Arc<dyn MeshDriver>) -> Result<Self, CoreError> {
        config.validate()?;
        let classifier = config.classifier()?;

        let registry = Arc::new(NodeRegistry::new(classifier, config.controller_node));
        let status = StatusCell::new();
        let (sink, notification_rx) = NotificationSink::channel();
        driver.set_sink(sink);

        let bus = Arc::new(EventBus::new(
            Arc::clone(&driver),
            Arc::clone(&registry),
            status.clone(),
        ));
        let lifecycle = LifecycleCoordinator::new(
            Arc::clone(&driver),
            Arc::clone(&registry),
            status.clone(),
            &config,
        );
        let query = QueryFacade::new(
            driver,
            Arc::clone(&registry),
            status.clone(),
            config.controller_name.clone(),
        );

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                registry,
                status,
                bus,
                lifecycle,
                query,
                cancel: CancellationToken::new(),
                notification_rx: Mutex::new(Some(notification_rx)),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub(crate) fn query(&self) -> &QueryFacade {
        &self.inner.query
    }

    // ── Network lifecycle ────────────────────────────────────────

    /// Start the network and wait (bounded) for it to become ready.
    ///
    /// A deadline miss is reported as
    /// [`StartOutcome::TimedOutButRunning`], not as an error.
    pub async fn start_network(&self) -> Result<StartOutcome, CoreError> {
        self.ensure_dispatcher().await;
        self.inner.lifecycle.start_network().await
    }

    /// Stop the network. Node state is dropped; the instance can be
    /// started again.
    pub async fn stop_network(&self) -> Result<NetworkStatus, CoreError> {
        let status = self.inner.lifecycle.stop_network()?;
        self.inner.bus.disarm();
        Ok(status)
    }

    /// Erase the controller's network. Refused with
    /// [`CoreError::NetworkNotEmpty`] while nodes are included, unless
    /// `force` is set.
    pub fn hard_reset(&self, force: bool) -> Result<NetworkStatus, CoreError> {
        self.inner.lifecycle.hard_reset(force)
    }

    pub fn soft_reset(&self) -> Result<NetworkStatus, CoreError> {
        self.inner.lifecycle.soft_reset()
    }

    /// Put the controller in inclusion mode and wait for a node to join.
    pub async fn add_node(&self) -> Result<Arc<NodeRecord>, CoreError> {
        self.inner.lifecycle.add_node().await
    }

    /// Put the controller in exclusion mode and wait for a node to leave.
    pub async fn remove_node(&self) -> Result<Arc<NodeRecord>, CoreError> {
        self.inner.lifecycle.remove_node().await
    }

    /// Outstanding lifecycle waits, earliest deadline first.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.lifecycle.pending_operations()
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        debug!("controller shut down");
    }

    async fn ensure_dispatcher(&self) {
        let Some(rx) = self.inner.notification_rx.lock().await.take() else {
            return;
        };
        let bus = Arc::clone(&self.inner.bus);
        let cancel = self.inner.cancel.child_token();
        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(dispatcher_task(bus, rx, cancel)));
        debug!("notification dispatcher spawned");
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: start the network, run closure, stop, shut down.
    ///
    /// Used by the CLI, where every invocation is a single command against
    /// a freshly started network. A start that times out is not fatal; the
    /// closure still runs and receives the outcome.
    pub async fn oneshot<F, Fut, T, E>(
        config: ControllerConfig,
        driver: Arc<dyn MeshDriver>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Controller, StartOutcome) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let controller = Controller::new(config, driver)?;
        let result = match controller.start_network().await {
            Ok(outcome) => {
                debug!(?outcome, "oneshot network start");
                f(controller.clone(), outcome).await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = controller.stop_network().await {
            warn!(error = %e, "network stop failed (non-fatal)");
        }
        controller.shutdown().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn status(&self) -> NetworkStatus {
        self.inner.status.get()
    }

    /// Subscribe to network status changes.
    pub fn status_changes(&self) -> watch::Receiver<NetworkStatus> {
        self.inner.status.subscribe()
    }

    /// Subscribe to registry snapshots.
    pub fn nodes(&self) -> NodeStream {
        NodeStream::new(self.inner.registry.subscribe())
    }

    pub fn nodes_snapshot(&self) -> NodeSnapshot {
        self.inner.registry.snapshot_ordered()
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Every node by ascending id: its type string, or `"[not ready]"`.
    pub fn list_nodes(&self) -> BTreeMap<NodeId, NodeListing> {
        self.inner.query.list_nodes()
    }

    pub fn list_sensors(&self) -> BTreeMap<NodeId, NodeListing> {
        self.inner.query.list_sensors()
    }

    pub fn list_dimmers(&self) -> BTreeMap<NodeId, NodeListing> {
        self.inner.query.list_dimmers()
    }

    pub fn node(&self, id: NodeId) -> Result<Arc<NodeRecord>, CoreError> {
        self.inner.query.node(id)
    }

    pub fn node_detail(&self, id: NodeId) -> Result<NodeDetail, CoreError> {
        self.inner.query.node_detail(id)
    }

    pub fn network_info(&self) -> NetworkInfo {
        self.inner.query.network_info()
    }

    pub fn node_timestamp(&self, id: NodeId) -> Option<DateTime<Utc>> {
        self.inner.query.node_timestamp(id)
    }

    pub fn has_history(&self, id: NodeId) -> bool {
        self.inner.registry.has_history(id)
    }

    pub fn neighbors(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        self.inner.query.neighbors(id)
    }

    pub fn node_location(&self, id: NodeId) -> Result<String, CoreError> {
        self.inner.query.location(id)
    }

    pub fn node_name(&self, id: NodeId) -> Result<String, CoreError> {
        self.inner.query.name(id)
    }

    /// Set a node's location, returning the previous one.
    pub fn set_node_location(&self, id: NodeId, location: &str) -> Result<String, CoreError> {
        self.inner.query.set_location(id, location)
    }

    /// Set a node's name, returning the previous one.
    pub fn set_node_name(&self, id: NodeId, name: &str) -> Result<String, CoreError> {
        self.inner.query.set_name(id, name)
    }

    pub fn nodes_configuration(&self) -> BTreeMap<NodeId, NodeConfiguration> {
        self.inner.query.nodes_configuration()
    }

    pub fn node_parameter(&self, id: NodeId, index: u8) -> Result<NodeValue, CoreError> {
        self.inner.query.node_parameter(id, index)
    }

    pub fn set_node_parameter(
        &self,
        id: NodeId,
        index: u8,
        value: i64,
        size: u8,
    ) -> Result<bool, CoreError> {
        self.inner.query.set_node_parameter(id, index, value, size)
    }
}
