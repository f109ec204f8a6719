// ── Loopback driver ──
//
// An in-memory network scripted by a `SimulationProfile`. Physical actions
// (network start, inclusion, exclusion) complete after configurable delays
// on the tokio clock, so tests can drive them with paused time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DriverError, MeshDriver, Notification, NotificationSink};
use crate::model::{
    HomeId, NodeId, NodeInfo, NodeValue, ValueData, ValueGenre, ValueId, ValueQuery,
    command_class,
};

// ── Scripted nodes ──────────────────────────────────────────────────

/// One node of the simulated network.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedNode {
    pub id: NodeId,
    pub node_type: String,
    pub product_name: String,
    pub location: String,
    pub name: String,
    pub ready: bool,
    pub neighbors: Vec<NodeId>,
    pub values: Vec<NodeValue>,
}

impl SimulatedNode {
    pub fn new(id: u8, node_type: &str, product_name: &str) -> Self {
        Self {
            id: NodeId::new(id),
            node_type: node_type.into(),
            product_name: product_name.into(),
            location: String::new(),
            name: String::new(),
            ready: true,
            neighbors: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Primary controller stick.
    pub fn controller(id: u8) -> Self {
        Self::new(id, "Static PC Controller", "Z-Stick Gen5")
    }

    /// Six-in-one multilevel sensor reporting in Fahrenheit.
    pub fn multisensor(id: u8) -> Self {
        use command_class::{BATTERY, CONFIGURATION, SENSOR_MULTILEVEL};

        let values = [
            (SENSOR_MULTILEVEL, 1, "Temperature", "F", ValueData::Decimal(71.6)),
            (SENSOR_MULTILEVEL, 5, "Relative Humidity", "%", ValueData::Decimal(41.0)),
            (SENSOR_MULTILEVEL, 3, "Luminance", "lux", ValueData::Decimal(120.0)),
            (SENSOR_MULTILEVEL, 27, "Ultraviolet", "", ValueData::Decimal(0.0)),
            (SENSOR_MULTILEVEL, 0, "Sensor", "", ValueData::Bool(false)),
            (BATTERY, 0, "Battery Level", "%", ValueData::Int(100)),
        ];
        let node = values.into_iter().fold(
            Self::new(id, "Routing Multilevel Sensor", "MultiSensor 6"),
            |node, (class, index, label, units, data)| {
                node.with_value(class, index, ValueGenre::User, label, units, data)
            },
        );
        node.with_value(CONFIGURATION, 3, ValueGenre::Config, "PIR Time", "s", ValueData::Int(240))
            .with_value(
                CONFIGURATION,
                111,
                ValueGenre::Config,
                "Group 1 Interval",
                "s",
                ValueData::Int(3600),
            )
    }

    /// In-wall multilevel dimmer.
    pub fn dimmer(id: u8) -> Self {
        use command_class::{CONFIGURATION, SWITCH_MULTILEVEL};

        Self::new(id, "Multilevel Power Switch", "Micro Dimmer")
            .with_value(SWITCH_MULTILEVEL, 0, ValueGenre::User, "Level", "", ValueData::Int(0))
            .with_value(
                CONFIGURATION,
                20,
                ValueGenre::Config,
                "Dimmer Ramp Time",
                "",
                ValueData::Int(3),
            )
    }

    pub fn with_location(mut self, location: &str) -> Self {
        location.clone_into(&mut self.location);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        name.clone_into(&mut self.name);
        self
    }

    pub fn with_neighbors(mut self, neighbors: &[u8]) -> Self {
        self.neighbors = neighbors.iter().copied().map(NodeId::new).collect();
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn with_value(
        mut self,
        class: u8,
        index: u8,
        genre: ValueGenre,
        label: &str,
        units: &str,
        data: ValueData,
    ) -> Self {
        let id = value_id(self.id, class, index);
        self.values.push(NodeValue {
            id,
            node: self.id,
            command_class: class,
            index,
            genre,
            label: label.into(),
            units: units.into(),
            data,
            read_only: genre == ValueGenre::User && class != command_class::SWITCH_MULTILEVEL,
        });
        self
    }

    fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            node_type: self.node_type.clone(),
            product_name: self.product_name.clone(),
            location: self.location.clone(),
            name: self.name.clone(),
            ready: self.ready,
        }
    }
}

fn value_id(node: NodeId, class: u8, index: u8) -> ValueId {
    let raw = (u64::from(node.get()) << 32) | (u64::from(class) << 16) | (u64::from(index) << 8);
    ValueId::new(raw)
}

// ── Profile ─────────────────────────────────────────────────────────

/// Script for a simulated network.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationProfile {
    pub home_id: HomeId,
    pub controller: SimulatedNode,
    /// Nodes already included when the network starts.
    pub nodes: Vec<SimulatedNode>,
    /// Time from `start` until the driver reports ready.
    pub ready_after: Duration,
    /// Node that joins after an inclusion command.
    pub inclusion_candidate: Option<SimulatedNode>,
    pub inclusion_delay: Duration,
    /// Node that leaves after an exclusion command.
    pub exclusion_target: Option<NodeId>,
    pub exclusion_delay: Duration,
    /// Every command fails synchronously.
    pub reject_commands: bool,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            home_id: HomeId::new(0xc0ff_ee01),
            controller: SimulatedNode::controller(1),
            nodes: Vec::new(),
            ready_after: Duration::from_secs(2),
            inclusion_candidate: None,
            inclusion_delay: Duration::from_secs(3),
            exclusion_target: None,
            exclusion_delay: Duration::from_secs(3),
            reject_commands: false,
        }
    }
}

impl SimulationProfile {
    /// A small lab network: one sensor, one dimmer, a second sensor waiting
    /// to be included, and the dimmer as exclusion target.
    pub fn lab() -> Self {
        Self {
            controller: SimulatedNode::controller(1).with_neighbors(&[2, 3]),
            nodes: vec![
                SimulatedNode::multisensor(2)
                    .with_location("Lab")
                    .with_neighbors(&[1, 3]),
                SimulatedNode::dimmer(3)
                    .with_location("Hallway")
                    .with_neighbors(&[1, 2]),
            ],
            inclusion_candidate: Some(SimulatedNode::multisensor(4).with_neighbors(&[1])),
            exclusion_target: Some(NodeId::new(3)),
            ..Self::default()
        }
    }
}

// ── Counters ────────────────────────────────────────────────────────

/// Commands the simulated controller received so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCounters {
    pub start: u32,
    pub add: u32,
    pub remove: u32,
    pub cancel: u32,
    pub ready_checks: u32,
}

#[derive(Default)]
struct AtomicCounters {
    start: AtomicU32,
    add: AtomicU32,
    remove: AtomicU32,
    cancel: AtomicU32,
    ready_checks: AtomicU32,
}

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// ── Driver ──────────────────────────────────────────────────────────

/// In-memory [`MeshDriver`]. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct SimulatedDriver {
    inner: Arc<SimInner>,
}

struct SimInner {
    profile: SimulationProfile,
    nodes: DashMap<NodeId, SimulatedNode>,
    sink: ArcSwapOption<NotificationSink>,
    started_at: ArcSwapOption<Instant>,
    running: AtomicBool,
    candidate_used: AtomicBool,
    /// Cancelled on stop/reset; parent of every pending physical action.
    session: ArcSwap<CancellationToken>,
    /// The one outstanding inclusion/exclusion, if any.
    command: ArcSwapOption<CancellationToken>,
    counters: AtomicCounters,
}

impl SimulatedDriver {
    pub fn new(profile: SimulationProfile) -> Self {
        let nodes = DashMap::new();
        nodes.insert(profile.controller.id, profile.controller.clone());
        for node in &profile.nodes {
            nodes.insert(node.id, node.clone());
        }

        Self {
            inner: Arc::new(SimInner {
                profile,
                nodes,
                sink: ArcSwapOption::empty(),
                started_at: ArcSwapOption::empty(),
                running: AtomicBool::new(false),
                candidate_used: AtomicBool::new(false),
                session: ArcSwap::from_pointee(CancellationToken::new()),
                command: ArcSwapOption::empty(),
                counters: AtomicCounters::default(),
            }),
        }
    }

    pub fn profile(&self) -> &SimulationProfile {
        &self.inner.profile
    }

    pub fn counters(&self) -> SimCounters {
        let c = &self.inner.counters;
        SimCounters {
            start: c.start.load(Ordering::Relaxed),
            add: c.add.load(Ordering::Relaxed),
            remove: c.remove.load(Ordering::Relaxed),
            cancel: c.cancel.load(Ordering::Relaxed),
            ready_checks: c.ready_checks.load(Ordering::Relaxed),
        }
    }

    /// Push an arbitrary notification, as if the hardware emitted it.
    pub fn emit(&self, notification: Notification) {
        self.inner.push(notification);
    }

    /// Put a node on the network without announcing it.
    pub fn insert_node(&self, node: SimulatedNode) {
        self.inner.nodes.insert(node.id, node);
    }

    /// Change a value on the device and report it.
    pub fn report_value(
        &self,
        node: NodeId,
        label: &str,
        data: ValueData,
    ) -> Result<(), DriverError> {
        let value = {
            let mut entry = self
                .inner
                .nodes
                .get_mut(&node)
                .ok_or(DriverError::UnknownNode(node))?;
            let value = entry
                .values
                .iter_mut()
                .find(|v| v.label == label)
                .ok_or_else(|| DriverError::Io(format!("node {node} has no '{label}' value")))?;
            value.data = data;
            value.clone()
        };
        self.inner.push(Notification::ValueUpdated { node, value });
        Ok(())
    }

    /// Run `action` after `delay` unless `token` is cancelled first.
    fn spawn_after<F>(
        &self,
        delay: Duration,
        token: CancellationToken,
        action: F,
    ) -> Result<(), DriverError>
    where
        F: FnOnce(&SimInner) + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|e| DriverError::Io(e.to_string()))?;
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => action(&inner),
            }
        });
        Ok(())
    }

    fn check_accepting(&self, command: &str) -> Result<(), DriverError> {
        if self.inner.profile.reject_commands {
            return Err(DriverError::Rejected {
                command: command.into(),
                reason: "controller busy".into(),
            });
        }
        Ok(())
    }

    fn check_running(&self) -> Result<(), DriverError> {
        if self.inner.running.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DriverError::NotRunning)
        }
    }

    /// Arm a fresh command token, cancelling whatever was outstanding.
    fn begin_command(&self) -> CancellationToken {
        let token = self.inner.session.load().child_token();
        if let Some(previous) = self.inner.command.swap(Some(Arc::new(token.clone()))) {
            previous.cancel();
        }
        token
    }

    /// Start (or restart) the announce sequence: started now, ready later.
    fn boot(&self) -> Result<(), DriverError> {
        let session = CancellationToken::new();
        self.inner.session.swap(Arc::new(session.clone())).cancel();
        self.inner.started_at.store(Some(Arc::new(Instant::now())));
        self.inner.running.store(true, Ordering::Release);

        let home_id = self.inner.profile.home_id;
        self.inner.push(Notification::NetworkStarted {
            home_id,
            node_count: self.inner.nodes.len(),
        });
        self.spawn_after(self.inner.profile.ready_after, session, move |inner| {
            inner.push(Notification::NetworkReady {
                home_id,
                node_count: inner.nodes.len(),
            });
        })
    }
}

impl SimInner {
    fn push(&self, notification: Notification) {
        if let Some(sink) = self.sink.load().as_ref() {
            sink.push(notification);
        }
    }
}

impl MeshDriver for SimulatedDriver {
    fn set_sink(&self, sink: NotificationSink) {
        self.inner.sink.store(Some(Arc::new(sink)));
    }

    fn start(&self) -> Result<(), DriverError> {
        bump(&self.inner.counters.start);
        self.check_accepting("start")?;
        debug!(home_id = %self.inner.profile.home_id, "simulated network starting");
        self.boot()
    }

    fn stop(&self) -> Result<(), DriverError> {
        self.inner.running.store(false, Ordering::Release);
        self.inner.started_at.store(None);
        self.inner.session.load().cancel();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        bump(&self.inner.counters.ready_checks);
        let ready_after = self.inner.profile.ready_after;
        self.inner.running.load(Ordering::Acquire)
            && self
                .inner
                .started_at
                .load()
                .as_ref()
                .is_some_and(|at| at.elapsed() >= ready_after)
    }

    fn home_id(&self) -> HomeId {
        self.inner.profile.home_id
    }

    fn nodes_count(&self) -> usize {
        self.inner.nodes.len()
    }

    fn node_ids(&self) -> Result<Vec<NodeId>, DriverError> {
        let mut ids: Vec<NodeId> = self.inner.nodes.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn hard_reset(&self) -> Result<(), DriverError> {
        self.check_accepting("hard reset")?;
        self.check_running()?;
        let controller = self.inner.profile.controller.id;
        self.inner.nodes.retain(|id, _| *id == controller);
        self.inner.push(Notification::NetworkReset {
            home_id: self.inner.profile.home_id,
            node_count: self.inner.nodes.len(),
        });
        self.boot()
    }

    fn soft_reset(&self) -> Result<(), DriverError> {
        self.check_accepting("soft reset")?;
        self.check_running()
    }

    fn add_node(&self) -> Result<bool, DriverError> {
        bump(&self.inner.counters.add);
        self.check_accepting("add node")?;
        self.check_running()?;
        let token = self.begin_command();

        let candidate = if self.inner.candidate_used.load(Ordering::Acquire) {
            None
        } else {
            self.inner.profile.inclusion_candidate.clone()
        };
        let Some(node) = candidate else {
            debug!("inclusion mode entered, nothing to include");
            return Ok(true);
        };

        self.spawn_after(self.inner.profile.inclusion_delay, token, move |inner| {
            let id = node.id;
            inner.candidate_used.store(true, Ordering::Release);
            inner.nodes.insert(id, node);
            inner.push(Notification::NodeAdded(id));
        })?;
        Ok(true)
    }

    fn remove_node(&self) -> Result<bool, DriverError> {
        bump(&self.inner.counters.remove);
        self.check_accepting("remove node")?;
        self.check_running()?;
        let token = self.begin_command();

        let Some(target) = self.inner.profile.exclusion_target else {
            debug!("exclusion mode entered, nothing to exclude");
            return Ok(true);
        };

        self.spawn_after(self.inner.profile.exclusion_delay, token, move |inner| {
            if inner.nodes.remove(&target).is_some() {
                inner.push(Notification::NodeRemoved(target));
            }
        })?;
        Ok(true)
    }

    fn cancel_command(&self) -> Result<(), DriverError> {
        bump(&self.inner.counters.cancel);
        if let Some(token) = self.inner.command.swap(None) {
            token.cancel();
        }
        Ok(())
    }

    fn node_info(&self, node: NodeId) -> Option<NodeInfo> {
        self.inner.nodes.get(&node).map(|n| n.info())
    }

    fn neighbors(&self, node: NodeId) -> Result<Vec<NodeId>, DriverError> {
        self.inner
            .nodes
            .get(&node)
            .map(|n| n.neighbors.clone())
            .ok_or(DriverError::UnknownNode(node))
    }

    fn set_node_location(&self, node: NodeId, location: &str) -> Result<(), DriverError> {
        let mut entry = self
            .inner
            .nodes
            .get_mut(&node)
            .ok_or(DriverError::UnknownNode(node))?;
        location.clone_into(&mut entry.location);
        Ok(())
    }

    fn set_node_name(&self, node: NodeId, name: &str) -> Result<(), DriverError> {
        let mut entry = self
            .inner
            .nodes
            .get_mut(&node)
            .ok_or(DriverError::UnknownNode(node))?;
        name.clone_into(&mut entry.name);
        Ok(())
    }

    fn values(&self, node: NodeId, query: &ValueQuery) -> Result<Vec<NodeValue>, DriverError> {
        let entry = self
            .inner
            .nodes
            .get(&node)
            .ok_or(DriverError::UnknownNode(node))?;
        Ok(entry
            .values
            .iter()
            .filter(|v| query.matches(v))
            .cloned()
            .collect())
    }

    fn set_value(&self, node: NodeId, value: ValueId, data: ValueData) -> Result<(), DriverError> {
        self.check_accepting("set value")?;
        let updated = {
            let mut entry = self
                .inner
                .nodes
                .get_mut(&node)
                .ok_or(DriverError::UnknownNode(node))?;
            let slot = entry
                .values
                .iter_mut()
                .find(|v| v.id == value)
                .ok_or(DriverError::UnknownValue { node, value })?;
            slot.data = data;
            slot.clone()
        };
        self.inner.push(Notification::ValueUpdated {
            node,
            value: updated,
        });
        Ok(())
    }

    fn request_config_params(&self, node: NodeId) -> Result<(), DriverError> {
        if self.inner.nodes.contains_key(&node) {
            Ok(())
        } else {
            Err(DriverError::UnknownNode(node))
        }
    }

    fn set_config_param(
        &self,
        node: NodeId,
        index: u8,
        value: i64,
        size: u8,
    ) -> Result<bool, DriverError> {
        self.check_accepting("set config param")?;
        if !matches!(size, 1 | 2 | 4) {
            return Ok(false);
        }
        let updated = {
            let mut entry = self
                .inner
                .nodes
                .get_mut(&node)
                .ok_or(DriverError::UnknownNode(node))?;
            let existing = entry
                .values
                .iter()
                .position(|v| v.command_class == command_class::CONFIGURATION && v.index == index);
            let position = if let Some(pos) = existing {
                pos
            } else {
                let id = value_id(node, command_class::CONFIGURATION, index);
                entry.values.push(NodeValue {
                    id,
                    node,
                    command_class: command_class::CONFIGURATION,
                    index,
                    genre: ValueGenre::Config,
                    label: format!("Parameter #{index}"),
                    units: String::new(),
                    data: ValueData::Int(0),
                    read_only: false,
                });
                entry.values.len() - 1
            };
            let Some(slot) = entry.values.get_mut(position) else {
                return Ok(false);
            };
            slot.data = ValueData::Int(value);
            slot.clone()
        };
        self.inner.push(Notification::ValueUpdated {
            node,
            value: updated,
        });
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::Envelope;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<Envelope>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(env) = rx.try_recv() {
            out.push(env.notification);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn start_announces_started_then_ready() {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        let (sink, mut rx) = NotificationSink::channel();
        driver.set_sink(sink);

        driver.start().unwrap();
        assert!(!driver.is_ready());
        let first = drain(&mut rx);
        assert!(matches!(
            first.as_slice(),
            [Notification::NetworkStarted { node_count: 3, .. }]
        ));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(driver.is_ready());
        let later = drain(&mut rx);
        assert!(matches!(later.as_slice(), [Notification::NetworkReady { .. }]));
        assert_eq!(driver.counters().ready_checks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_pending_inclusion() {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        let (sink, mut rx) = NotificationSink::channel();
        driver.set_sink(sink);
        driver.start().unwrap();

        assert!(driver.add_node().unwrap());
        driver.cancel_command().unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let seen = drain(&mut rx);
        assert!(!seen.iter().any(|n| matches!(n, Notification::NodeAdded(_))));
        assert_eq!(driver.nodes_count(), 3);
        assert_eq!(driver.counters().cancel, 1);
    }

    #[tokio::test]
    async fn commands_fail_before_start() {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        assert_eq!(driver.add_node(), Err(DriverError::NotRunning));
        assert_eq!(driver.counters().add, 1);
    }

    #[test]
    fn config_param_rejects_bad_size() {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        assert!(!driver.set_config_param(NodeId::new(2), 3, 60, 3).unwrap());
        assert!(driver.set_config_param(NodeId::new(2), 3, 60, 2).unwrap());

        let query = ValueQuery::new()
            .command_class(command_class::CONFIGURATION)
            .index(3);
        let values = driver.values(NodeId::new(2), &query).unwrap();
        assert_eq!(values[0].data, ValueData::Int(60));
    }
}
