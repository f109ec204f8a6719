// ── Notification dispatch ──
//
// The driver pushes notifications into a single unbounded queue from any
// thread. One dispatcher task drains it serially and applies each
// notification to the registry and network status, so node state has a
// single writer on the notification path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::{Envelope, MeshDriver, Notification};
use crate::error::CoreError;
use crate::model::{NetworkStatus, NodeId};
use crate::status::StatusCell;
use crate::store::NodeRegistry;

/// Applies driver notifications to controller state.
pub(crate) struct EventBus {
    driver: Arc<dyn MeshDriver>,
    registry: Arc<NodeRegistry>,
    status: StatusCell,
    /// Node-level handlers run only between NetworkReady and the next
    /// reset/stop.
    armed: AtomicBool,
}

impl EventBus {
    pub(crate) fn new(
        driver: Arc<dyn MeshDriver>,
        registry: Arc<NodeRegistry>,
        status: StatusCell,
    ) -> Self {
        Self {
            driver,
            registry,
            status,
            armed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub(crate) fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Apply one notification. Handlers never block; the log line is the
    /// last thing each one does.
    pub(crate) fn apply(&self, envelope: &Envelope) -> Result<(), CoreError> {
        if envelope.notification.node().is_none() && self.status.get() == NetworkStatus::NotStarted
        {
            debug!(
                kind = envelope.notification.kind(),
                "network notification while stopped, ignored"
            );
            return Ok(());
        }

        match &envelope.notification {
            Notification::NetworkStarted {
                home_id,
                node_count,
            } => {
                self.status.advance(NetworkStatus::Started);
                let controller = self.registry.controller();
                if self.registry.get(controller).is_none() {
                    let info = self.driver.node_info(controller);
                    self.registry.seed(&[(controller, info)]);
                }
                info!(%home_id, node_count, "network started");
            }
            Notification::NetworkReady {
                home_id,
                node_count,
            } => {
                // Seed and arm before publishing Ready so status waiters
                // never observe an unseeded registry.
                self.seed_from_driver()?;
                self.armed.store(true, Ordering::Release);
                self.status.advance(NetworkStatus::Ready);
                info!(%home_id, node_count, "network ready, node handlers armed");
            }
            Notification::NetworkReset {
                home_id,
                node_count,
            } => {
                self.status.set(NetworkStatus::Resetting);
                self.disarm();
                self.registry.clear_except_controller();
                self.status.advance(NetworkStatus::Starting);
                info!(%home_id, node_count, "network reset");
            }
            Notification::NodeAdded(node) => {
                if !self.accepting(envelope) {
                    return Ok(());
                }
                let info = self.driver.node_info(*node);
                let record = self.registry.upsert_on_add(*node, info.as_ref());
                info!(
                    node = %node,
                    node_type = %record.node_type,
                    ready = record.ready,
                    "node added"
                );
            }
            Notification::NodeRemoved(node) => {
                if !self.accepting(envelope) {
                    return Ok(());
                }
                match self.registry.remove_on_removed(*node) {
                    Some(_) => info!(node = %node, "node removed"),
                    None => debug!(node = %node, "removal of unknown node ignored"),
                }
            }
            Notification::ValueUpdated { node, value } => {
                if !self.accepting(envelope) {
                    return Ok(());
                }
                if self
                    .registry
                    .touch_on_value_update(*node, envelope.observed_at)
                    .is_none()
                {
                    debug!(node = %node, label = %value.label, "value update for unknown node");
                    return Ok(());
                }
                // Readiness often flips while values stream in.
                if let Some(info) = self.driver.node_info(*node) {
                    self.registry.refresh(&info);
                }
                debug!(node = %node, label = %value.label, data = %value.data, "value updated");
            }
        }
        Ok(())
    }

    fn accepting(&self, envelope: &Envelope) -> bool {
        let armed = self.is_armed();
        if !armed {
            debug!(
                kind = envelope.notification.kind(),
                node = ?envelope.notification.node(),
                "node notification before network ready, dropped"
            );
        }
        armed
    }

    fn seed_from_driver(&self) -> Result<(), CoreError> {
        let ids = self
            .driver
            .node_ids()
            .map_err(|e| CoreError::Internal(format!("cannot enumerate nodes: {e}")))?;
        let nodes: Vec<(NodeId, _)> = ids
            .into_iter()
            .map(|id| (id, self.driver.node_info(id)))
            .collect();
        self.registry.seed(&nodes);
        Ok(())
    }
}

/// Drain the notification queue until cancelled or every sink is dropped.
pub(crate) async fn dispatcher_task(
    bus: Arc<EventBus>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                if let Err(e) = bus.apply(&envelope) {
                    warn!(
                        error = %e,
                        kind = envelope.notification.kind(),
                        "notification handler failed"
                    );
                }
            }
        }
    }
    debug!("notification dispatcher stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::ControllerConfig;
    use crate::driver::{SimulatedDriver, SimulatedNode, SimulationProfile};
    use crate::model::{HomeId, NodeValue, ValueData, ValueGenre, ValueId};

    struct Harness {
        driver: SimulatedDriver,
        registry: Arc<NodeRegistry>,
        status: StatusCell,
        bus: EventBus,
    }

    fn harness() -> Harness {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        let classifier = ControllerConfig::default().classifier().unwrap();
        let registry = Arc::new(NodeRegistry::new(classifier, NodeId::CONTROLLER));
        let status = StatusCell::new();
        let bus = EventBus::new(
            Arc::new(driver.clone()),
            Arc::clone(&registry),
            status.clone(),
        );
        Harness {
            driver,
            registry,
            status,
            bus,
        }
    }

    fn envelope(notification: Notification) -> Envelope {
        Envelope {
            observed_at: Utc::now(),
            notification,
        }
    }

    fn value(node: u8) -> NodeValue {
        NodeValue {
            id: ValueId::new(1),
            node: NodeId::new(node),
            command_class: 0x31,
            index: 1,
            genre: ValueGenre::User,
            label: "Temperature".into(),
            units: "C".into(),
            data: ValueData::Decimal(20.0),
            read_only: true,
        }
    }

    fn bring_up(h: &Harness) {
        h.status.begin_start().unwrap();
        let home_id = HomeId::new(1);
        h.bus
            .apply(&envelope(Notification::NetworkStarted {
                home_id,
                node_count: 3,
            }))
            .unwrap();
        h.bus
            .apply(&envelope(Notification::NetworkReady {
                home_id,
                node_count: 3,
            }))
            .unwrap();
    }

    #[test]
    fn node_notifications_before_ready_are_dropped() {
        let h = harness();
        h.bus
            .apply(&envelope(Notification::NodeAdded(NodeId::new(9))))
            .unwrap();
        assert!(h.registry.get(NodeId::new(9)).is_none());
    }

    #[test]
    fn ready_seeds_registry_and_arms() {
        let h = harness();
        bring_up(&h);

        assert!(h.bus.is_armed());
        assert_eq!(h.status.get(), NetworkStatus::Ready);
        let ids: Vec<u8> = h
            .registry
            .snapshot_ordered()
            .iter()
            .map(|r| r.id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!h.registry.subscribe_added().has_changed().unwrap());
    }

    #[test]
    fn value_update_for_unknown_node_changes_nothing() {
        let h = harness();
        bring_up(&h);
        let before = h.registry.len();

        h.bus
            .apply(&envelope(Notification::ValueUpdated {
                node: NodeId::new(42),
                value: value(42),
            }))
            .unwrap();
        assert_eq!(h.registry.len(), before);
    }

    #[test]
    fn reset_clears_nodes_and_disarms() {
        let h = harness();
        bring_up(&h);

        h.bus
            .apply(&envelope(Notification::NetworkReset {
                home_id: HomeId::new(1),
                node_count: 1,
            }))
            .unwrap();
        assert!(!h.bus.is_armed());
        assert_eq!(h.status.get(), NetworkStatus::Starting);
        assert_eq!(h.registry.len(), 1);
        assert!(h.registry.get(NodeId::CONTROLLER).is_some());
    }

    #[test]
    fn added_node_is_classified_from_driver_info() {
        let h = harness();
        bring_up(&h);
        h.driver.insert_node(SimulatedNode::dimmer(6));

        h.bus
            .apply(&envelope(Notification::NodeAdded(NodeId::new(6))))
            .unwrap();
        let record = h.registry.lookup(NodeId::new(6)).unwrap();
        assert!(record.is_dimmer());
        assert!(!record.is_sensor());
        assert_eq!(record.product_name, "Micro Dimmer");
    }
}
