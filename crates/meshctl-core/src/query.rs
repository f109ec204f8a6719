// ── Read-side projections ──
//
// Listings and per-node views built from registry snapshots, plus the few
// driver queries (neighbors, command-class values) the registry does not
// mirror. Location and name setters write through to the driver first,
// then to the registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::driver::MeshDriver;
use crate::error::CoreError;
use crate::model::{
    NetworkInfo, NetworkStatus, NodeConfiguration, NodeDetail, NodeId, NodeListing, NodeRecord,
    NodeValue, ReadingKind, ValueGenre, ValueQuery, command_class,
};
use crate::status::StatusCell;
use crate::store::NodeRegistry;

pub(crate) struct QueryFacade {
    driver: Arc<dyn MeshDriver>,
    registry: Arc<NodeRegistry>,
    status: StatusCell,
    controller_name: String,
}

impl QueryFacade {
    pub(crate) fn new(
        driver: Arc<dyn MeshDriver>,
        registry: Arc<NodeRegistry>,
        status: StatusCell,
        controller_name: String,
    ) -> Self {
        Self {
            driver,
            registry,
            status,
            controller_name,
        }
    }

    pub(crate) fn controller_name(&self) -> &str {
        &self.controller_name
    }

    pub(crate) fn driver(&self) -> &dyn MeshDriver {
        self.driver.as_ref()
    }

    pub(crate) fn status(&self) -> NetworkStatus {
        self.status.get()
    }

    // ── Listings ─────────────────────────────────────────────────────

    /// Every node by ascending id, labelled with its type string.
    pub(crate) fn list_nodes(&self) -> BTreeMap<NodeId, NodeListing> {
        self.listing(|_| true, |r| r.node_type.clone())
    }

    /// Sensor nodes by ascending id, labelled with their product name.
    pub(crate) fn list_sensors(&self) -> BTreeMap<NodeId, NodeListing> {
        self.listing(NodeRecord::is_sensor, |r| r.product_name.clone())
    }

    /// Dimmer nodes by ascending id, labelled with their product name.
    pub(crate) fn list_dimmers(&self) -> BTreeMap<NodeId, NodeListing> {
        self.listing(NodeRecord::is_dimmer, |r| r.product_name.clone())
    }

    fn listing<F, L>(&self, include: F, label: L) -> BTreeMap<NodeId, NodeListing>
    where
        F: Fn(&NodeRecord) -> bool,
        L: Fn(&NodeRecord) -> String,
    {
        self.registry
            .snapshot_ordered()
            .iter()
            .filter(|r| include(r))
            .map(|r| {
                let entry = if r.ready {
                    NodeListing::Ready(label(r))
                } else {
                    NodeListing::NotReady
                };
                (r.id, entry)
            })
            .collect()
    }

    // ── Per-node views ───────────────────────────────────────────────

    pub(crate) fn node(&self, id: NodeId) -> Result<Arc<NodeRecord>, CoreError> {
        self.registry.lookup(id)
    }

    pub(crate) fn node_detail(&self, id: NodeId) -> Result<NodeDetail, CoreError> {
        let record = self.registry.lookup(id)?;
        let neighbors = self.driver.neighbors(id)?;
        Ok(NodeDetail::from_record(&record, neighbors))
    }

    pub(crate) fn network_info(&self) -> NetworkInfo {
        let nodes = self
            .registry
            .snapshot_ordered()
            .iter()
            .map(|r| {
                let neighbors = self.driver.neighbors(r.id).unwrap_or_else(|e| {
                    debug!(node = %r.id, error = %e, "neighbors unavailable");
                    Vec::new()
                });
                NodeDetail::from_record(r, neighbors)
            })
            .collect();

        NetworkInfo {
            home_id: self.driver.home_id(),
            status: self.status.get(),
            controller: self.controller_name.clone(),
            nodes,
        }
    }

    /// Time of the node's last value update. Unknown nodes and nodes that
    /// never reported both yield `None`.
    pub(crate) fn node_timestamp(&self, id: NodeId) -> Option<DateTime<Utc>> {
        self.registry.get(id).and_then(|r| r.last_update)
    }

    pub(crate) fn neighbors(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        self.registry.lookup(id)?;
        Ok(self.driver.neighbors(id)?)
    }

    pub(crate) fn location(&self, id: NodeId) -> Result<String, CoreError> {
        Ok(self.registry.lookup(id)?.location.clone())
    }

    pub(crate) fn name(&self, id: NodeId) -> Result<String, CoreError> {
        Ok(self.registry.lookup(id)?.name.clone())
    }

    pub(crate) fn set_location(&self, id: NodeId, location: &str) -> Result<String, CoreError> {
        self.registry.lookup(id)?;
        self.driver.set_node_location(id, location)?;
        self.registry.set_location(id, location)
    }

    pub(crate) fn set_name(&self, id: NodeId, name: &str) -> Result<String, CoreError> {
        self.registry.lookup(id)?;
        self.driver.set_node_name(id, name)?;
        self.registry.set_name(id, name)
    }

    // ── Configuration parameters ─────────────────────────────────────

    /// Config-genre values of every ready node except the controller.
    pub(crate) fn nodes_configuration(&self) -> BTreeMap<NodeId, NodeConfiguration> {
        let config_values = ValueQuery::new().genre(ValueGenre::Config);
        let controller = self.registry.controller();
        let mut out = BTreeMap::new();

        for record in self.registry.snapshot_ordered().iter() {
            if !record.ready || record.id == controller {
                continue;
            }
            if let Err(e) = self.driver.request_config_params(record.id) {
                warn!(node = %record.id, error = %e, "config parameter refresh failed");
            }
            match self.driver.values(record.id, &config_values) {
                Ok(values) => {
                    out.insert(
                        record.id,
                        NodeConfiguration {
                            node_type: record.node_type.clone(),
                            values,
                        },
                    );
                }
                Err(e) => warn!(node = %record.id, error = %e, "config values unavailable"),
            }
        }
        out
    }

    pub(crate) fn node_parameter(&self, id: NodeId, index: u8) -> Result<NodeValue, CoreError> {
        self.registry.lookup(id)?;
        self.driver.request_config_params(id)?;
        let query = ValueQuery::new()
            .command_class(command_class::CONFIGURATION)
            .index(index);
        self.driver
            .values(id, &query)?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::ValueNotFound {
                node: id,
                label: format!("parameter #{index}"),
            })
    }

    /// Push a configuration parameter. `Ok(false)` when the driver did not
    /// queue the command; there is no confirmation that the node applied it.
    pub(crate) fn set_node_parameter(
        &self,
        id: NodeId,
        index: u8,
        value: i64,
        size: u8,
    ) -> Result<bool, CoreError> {
        self.registry.lookup(id)?;
        Ok(self.driver.set_config_param(id, index, value, size)?)
    }

    // ── Capability lookups ───────────────────────────────────────────

    /// Existence, then readiness, then the sensor tag.
    pub(crate) fn lookup_sensor(&self, id: NodeId) -> Result<Arc<NodeRecord>, CoreError> {
        let record = self.lookup_queryable(id)?;
        if record.is_sensor() {
            Ok(record)
        } else {
            Err(CoreError::NotASensor { node: id })
        }
    }

    /// Existence, then readiness, then the dimmer tag.
    pub(crate) fn lookup_dimmer(&self, id: NodeId) -> Result<Arc<NodeRecord>, CoreError> {
        let record = self.lookup_queryable(id)?;
        if record.is_dimmer() {
            Ok(record)
        } else {
            Err(CoreError::NotADimmer { node: id })
        }
    }

    fn lookup_queryable(&self, id: NodeId) -> Result<Arc<NodeRecord>, CoreError> {
        let record = self.registry.lookup(id)?;
        if record.is_queryable() {
            Ok(record)
        } else {
            Err(CoreError::NotReady { node: id })
        }
    }

    /// The user-genre value published under `kind`'s label. Several
    /// matches are logged and the first one wins.
    pub(crate) fn reading_value(
        &self,
        id: NodeId,
        kind: ReadingKind,
    ) -> Result<NodeValue, CoreError> {
        let mut query = ValueQuery::new().genre(ValueGenre::User).label(kind.label());
        if let Some(class) = kind.command_class() {
            query = query.command_class(class);
        }

        let mut values = self.driver.values(id, &query)?.into_iter();
        let first = values.next().ok_or_else(|| CoreError::ValueNotFound {
            node: id,
            label: kind.label().to_owned(),
        })?;
        let extra = values.count();
        if extra > 0 {
            warn!(node = %id, %kind, extra, "several values share the label, using the first");
        }
        Ok(first)
    }

    /// Sensor nodes currently in the registry, in id order.
    pub(crate) fn sensor_records(&self) -> Vec<Arc<NodeRecord>> {
        self.registry
            .snapshot_ordered()
            .iter()
            .filter(|r| r.is_sensor())
            .cloned()
            .collect()
    }
}
