// ── Node registry ──
//
// Authoritative node state. Concurrent storage with O(1) lookups and
// push-based change notification via `watch` channels: every mutation
// republishes an id-ordered snapshot, and inclusion/exclusion additionally
// publish the affected record on their own "most recent" channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::NodeClassifier;
use crate::error::CoreError;
use crate::model::{NodeId, NodeInfo, NodeRecord};

/// Id-ordered registry snapshot.
pub type NodeSnapshot = Arc<Vec<Arc<NodeRecord>>>;

/// Most recent added/removed record, compared by reference.
pub(crate) type Sentinel = Option<Arc<NodeRecord>>;

pub(crate) struct NodeRegistry {
    by_id: DashMap<NodeId, Arc<NodeRecord>>,

    /// Full snapshot ordered by id, rebuilt on mutation.
    snapshot: watch::Sender<NodeSnapshot>,

    /// Record created by the most recent node-added notification.
    last_added: watch::Sender<Sentinel>,

    /// Record deleted by the most recent node-removed notification.
    last_removed: watch::Sender<Sentinel>,

    classifier: NodeClassifier,
    controller: NodeId,
}

impl NodeRegistry {
    pub(crate) fn new(classifier: NodeClassifier, controller: NodeId) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (last_added, _) = watch::channel(None);
        let (last_removed, _) = watch::channel(None);

        Self {
            by_id: DashMap::new(),
            snapshot,
            last_added,
            last_removed,
            classifier,
            controller,
        }
    }

    pub(crate) fn controller(&self) -> NodeId {
        self.controller
    }

    // ── Notification-driven mutations ────────────────────────────────

    /// Create or refresh the record for an added node, clearing its
    /// timestamp, and publish it as the most recently added record.
    pub(crate) fn upsert_on_add(&self, id: NodeId, info: Option<&NodeInfo>) -> Arc<NodeRecord> {
        let record = Arc::new(self.build(id, info));
        let replaced = self.by_id.insert(id, Arc::clone(&record)).is_some();
        self.rebuild_snapshot();
        self.last_added.send_replace(Some(Arc::clone(&record)));

        debug!(node = %id, replaced, "registry: node added");
        record
    }

    /// Delete the record for a removed node and publish it as the most
    /// recently removed record. Returns `None` for unknown ids, and for the
    /// controller, whose record lives as long as the network.
    pub(crate) fn remove_on_removed(&self, id: NodeId) -> Option<Arc<NodeRecord>> {
        if id == self.controller {
            warn!(node = %id, "ignoring removal of the controller record");
            return None;
        }
        let (_, removed) = self.by_id.remove(&id)?;
        self.rebuild_snapshot();
        self.last_removed.send_replace(Some(Arc::clone(&removed)));

        debug!(node = %id, "registry: node removed");
        Some(removed)
    }

    /// Stamp a value update. The stored timestamp never moves backwards.
    /// No-op for unknown ids.
    pub(crate) fn touch_on_value_update(
        &self,
        id: NodeId,
        observed_at: DateTime<Utc>,
    ) -> Option<Arc<NodeRecord>> {
        let updated = {
            let mut slot = self.by_id.get_mut(&id)?;
            let mut record = NodeRecord::clone(&slot);
            let stamped = record
                .last_update
                .map_or(observed_at, |prev| prev.max(observed_at));
            record.last_update = Some(stamped);
            let record = Arc::new(record);
            *slot = Arc::clone(&record);
            record
        };
        self.rebuild_snapshot();
        Some(updated)
    }

    /// Refresh driver-reported metadata (readiness, type, names) for a known
    /// node, keeping its timestamp. Returns `false` for unknown ids.
    pub(crate) fn refresh(&self, info: &NodeInfo) -> bool {
        let changed = {
            let Some(mut slot) = self.by_id.get_mut(&info.id) else {
                return false;
            };
            let mut record = self.build(info.id, Some(info));
            record.last_update = slot.last_update;
            let changed = record != **slot;
            if changed {
                *slot = Arc::new(record);
            }
            changed
        };
        if changed {
            self.rebuild_snapshot();
        }
        true
    }

    /// Reconcile with the driver's node list without touching the
    /// "most recent" channels. Existing timestamps survive; ids the driver
    /// no longer reports are dropped (except the controller).
    pub(crate) fn seed(&self, nodes: &[(NodeId, Option<NodeInfo>)]) {
        for (id, info) in nodes {
            match self.by_id.entry(*id) {
                Entry::Occupied(mut slot) => {
                    let mut record = self.build(*id, info.as_ref());
                    record.last_update = slot.get().last_update;
                    slot.insert(Arc::new(record));
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(self.build(*id, info.as_ref())));
                }
            }
        }
        self.by_id.retain(|id, _| {
            *id == self.controller || nodes.iter().any(|(seeded, _)| seeded == id)
        });
        self.rebuild_snapshot();
        debug!(count = self.by_id.len(), "registry: seeded from driver");
    }

    /// Drop every record except the controller's.
    pub(crate) fn clear_except_controller(&self) {
        self.by_id.retain(|id, _| *id == self.controller);
        self.rebuild_snapshot();
    }

    /// Drop every record.
    pub(crate) fn clear(&self) {
        self.by_id.clear();
        self.rebuild_snapshot();
    }

    // ── Façade mutations ─────────────────────────────────────────────

    /// Replace a node's location, returning the previous one.
    pub(crate) fn set_location(&self, id: NodeId, location: &str) -> Result<String, CoreError> {
        self.replace_field(id, |record| std::mem::replace(&mut record.location, location.into()))
    }

    /// Replace a node's name, returning the previous one.
    pub(crate) fn set_name(&self, id: NodeId, name: &str) -> Result<String, CoreError> {
        self.replace_field(id, |record| std::mem::replace(&mut record.name, name.into()))
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub(crate) fn get(&self, id: NodeId) -> Option<Arc<NodeRecord>> {
        self.by_id.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn lookup(&self, id: NodeId) -> Result<Arc<NodeRecord>, CoreError> {
        self.get(id).ok_or(CoreError::NodeNotFound { node: id })
    }

    pub(crate) fn has_history(&self, id: NodeId) -> bool {
        self.by_id.get(&id).is_some_and(|r| r.has_history())
    }

    /// All records by ascending id (cheap `Arc` clone).
    pub(crate) fn snapshot_ordered(&self) -> NodeSnapshot {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<NodeSnapshot> {
        self.snapshot.subscribe()
    }

    pub(crate) fn subscribe_added(&self) -> watch::Receiver<Sentinel> {
        self.last_added.subscribe()
    }

    pub(crate) fn subscribe_removed(&self) -> watch::Receiver<Sentinel> {
        self.last_removed.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn build(&self, id: NodeId, info: Option<&NodeInfo>) -> NodeRecord {
        match info {
            Some(info) => NodeRecord::from_info(info, self.classifier.classify(&info.node_type)),
            None => NodeRecord::new(id),
        }
    }

    fn replace_field<F>(&self, id: NodeId, edit: F) -> Result<String, CoreError>
    where
        F: FnOnce(&mut NodeRecord) -> String,
    {
        let previous = {
            let mut slot = self
                .by_id
                .get_mut(&id)
                .ok_or(CoreError::NodeNotFound { node: id })?;
            let mut record = NodeRecord::clone(&slot);
            let previous = edit(&mut record);
            *slot = Arc::new(record);
            previous
        };
        self.rebuild_snapshot();
        Ok(previous)
    }

    /// Collect all records into an id-ordered vec and broadcast it. The
    /// collection runs under the channel's write lock so concurrent
    /// rebuilds publish in order.
    fn rebuild_snapshot(&self) {
        self.snapshot.send_modify(|snap| {
            let mut values: Vec<Arc<NodeRecord>> =
                self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
            values.sort_unstable_by_key(|r| r.id);
            *snap = Arc::new(values);
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::config::ControllerConfig;
    use pretty_assertions::assert_eq;

    fn registry() -> NodeRegistry {
        NodeRegistry::new(ControllerConfig::default().classifier().unwrap(), NodeId::CONTROLLER)
    }

    fn info(id: u8, node_type: &str) -> NodeInfo {
        NodeInfo {
            id: NodeId::new(id),
            node_type: node_type.into(),
            product_name: format!("product {id}"),
            location: String::new(),
            name: String::new(),
            ready: true,
        }
    }

    fn ids(reg: &NodeRegistry) -> Vec<u8> {
        reg.snapshot_ordered().iter().map(|r| r.id.get()).collect()
    }

    #[test]
    fn add_then_remove_leaves_nothing() {
        let reg = registry();
        let n = NodeId::new(5);
        reg.upsert_on_add(n, None);
        reg.touch_on_value_update(n, Utc::now());

        let removed = reg.remove_on_removed(n).unwrap();
        assert!(removed.has_history());
        assert!(reg.get(n).is_none());
        assert!(!reg.has_history(n));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_add_keeps_one_record_and_clears_timestamp() {
        let reg = registry();
        let n = NodeId::new(5);
        reg.upsert_on_add(n, Some(&info(5, "Routing Multilevel Sensor")));
        reg.touch_on_value_update(n, Utc::now());

        let again = reg.upsert_on_add(n, Some(&info(5, "Routing Multilevel Sensor")));
        assert_eq!(reg.len(), 1);
        assert!(again.last_update.is_none());
        assert!(again.is_sensor());
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let reg = registry();
        for id in [3, 1, 2] {
            reg.upsert_on_add(NodeId::new(id), None);
        }
        assert_eq!(ids(&reg), vec![1, 2, 3]);
    }

    #[test]
    fn value_update_for_unknown_node_is_noop() {
        let reg = registry();
        reg.upsert_on_add(NodeId::new(2), None);
        assert!(reg.touch_on_value_update(NodeId::new(9), Utc::now()).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn timestamp_never_moves_backwards() {
        let reg = registry();
        let n = NodeId::new(2);
        reg.upsert_on_add(n, None);

        let now = Utc::now();
        reg.touch_on_value_update(n, now);
        let after = reg.touch_on_value_update(n, now - Duration::seconds(30)).unwrap();
        assert_eq!(after.last_update, Some(now));
    }

    #[test]
    fn duplicate_removal_is_tolerated() {
        let reg = registry();
        let n = NodeId::new(4);
        reg.upsert_on_add(n, None);
        assert!(reg.remove_on_removed(n).is_some());
        assert!(reg.remove_on_removed(n).is_none());
    }

    #[test]
    fn controller_record_survives_removal_and_reset() {
        let reg = registry();
        reg.seed(&[(NodeId::CONTROLLER, None), (NodeId::new(2), None)]);
        assert!(reg.remove_on_removed(NodeId::CONTROLLER).is_none());

        reg.clear_except_controller();
        assert_eq!(ids(&reg), vec![1]);
    }

    #[test]
    fn seeding_does_not_publish_sentinels() {
        let reg = registry();
        let added = reg.subscribe_added();
        reg.seed(&[(NodeId::new(2), Some(info(2, "Multilevel Power Switch")))]);

        assert!(!added.has_changed().unwrap());
        assert!(reg.lookup(NodeId::new(2)).unwrap().is_dimmer());
    }

    #[test]
    fn seeding_keeps_history_and_prunes_stale_ids() {
        let reg = registry();
        let now = Utc::now();
        reg.upsert_on_add(NodeId::new(2), None);
        reg.upsert_on_add(NodeId::new(7), None);
        reg.touch_on_value_update(NodeId::new(2), now);

        reg.seed(&[(NodeId::new(2), Some(info(2, "Routing Multilevel Sensor")))]);
        assert_eq!(ids(&reg), vec![2]);
        assert_eq!(reg.lookup(NodeId::new(2)).unwrap().last_update, Some(now));
    }

    #[test]
    fn add_publishes_distinct_record_each_time() {
        let reg = registry();
        let mut rx = reg.subscribe_added();
        let first = reg.upsert_on_add(NodeId::new(5), None);
        let seen = rx.borrow_and_update().clone().unwrap();
        assert!(Arc::ptr_eq(&first, &seen));

        reg.upsert_on_add(NodeId::new(5), None);
        assert!(rx.has_changed().unwrap());
        let second = rx.borrow_and_update().clone().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn set_location_returns_previous() {
        let reg = registry();
        let n = NodeId::new(7);
        reg.upsert_on_add(n, None);

        assert_eq!(reg.set_location(n, "Lab").unwrap(), "");
        assert_eq!(reg.set_location(n, "Office").unwrap(), "Lab");
        assert_eq!(reg.lookup(n).unwrap().location, "Office");

        assert!(matches!(
            reg.set_name(NodeId::new(8), "x"),
            Err(CoreError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn refresh_keeps_timestamp() {
        let reg = registry();
        let n = NodeId::new(3);
        let mut pending = info(3, "Multilevel Power Switch");
        pending.ready = false;
        reg.upsert_on_add(n, Some(&pending));
        let now = Utc::now();
        reg.touch_on_value_update(n, now);

        assert!(reg.refresh(&info(3, "Multilevel Power Switch")));
        let record = reg.lookup(n).unwrap();
        assert!(record.ready);
        assert_eq!(record.last_update, Some(now));
        assert!(!reg.refresh(&info(9, "Whatever")));
    }

    #[test]
    fn refresh_without_changes_publishes_nothing() {
        let reg = registry();
        let n = NodeId::new(2);
        reg.upsert_on_add(n, Some(&info(2, "Routing Multilevel Sensor")));
        let before = reg.lookup(n).unwrap();
        let mut rx = reg.subscribe();
        rx.borrow_and_update();

        assert!(reg.refresh(&info(2, "Routing Multilevel Sensor")));
        assert!(!rx.has_changed().unwrap());
        assert!(Arc::ptr_eq(&before, &reg.lookup(n).unwrap()));

        assert!(reg.refresh(&info(2, "Routing Binary Sensor")));
        assert!(rx.has_changed().unwrap());
        assert_eq!(reg.lookup(n).unwrap().node_type, "Routing Binary Sensor");
    }
}
