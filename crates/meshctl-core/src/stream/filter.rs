// ── Filter predicates for node streams ──
//
// Used by subscribers to narrow registry snapshots without re-querying.

use std::sync::Arc;

use crate::model::NodeRecord;

/// Filter predicate for node snapshots.
pub enum NodeFilter {
    All,
    Sensors,
    Dimmers,
    Ready,
    NotReady,
    /// Nodes that delivered at least one value update.
    WithHistory,
    Custom(Box<dyn Fn(&NodeRecord) -> bool + Send + Sync>),
}

impl NodeFilter {
    pub fn matches(&self, node: &NodeRecord) -> bool {
        match self {
            Self::All => true,
            Self::Sensors => node.is_sensor(),
            Self::Dimmers => node.is_dimmer(),
            Self::Ready => node.ready,
            Self::NotReady => !node.ready,
            Self::WithHistory => node.has_history(),
            Self::Custom(f) => f(node),
        }
    }

    pub fn apply(&self, nodes: &[Arc<NodeRecord>]) -> Vec<Arc<NodeRecord>> {
        nodes.iter().filter(|n| self.matches(n)).cloned().collect()
    }
}

impl std::fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::All => "All",
            Self::Sensors => "Sensors",
            Self::Dimmers => "Dimmers",
            Self::Ready => "Ready",
            Self::NotReady => "NotReady",
            Self::WithHistory => "WithHistory",
            Self::Custom(_) => "Custom(..)",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeClass, NodeId};

    fn node(id: u8, ready: bool, class: NodeClass) -> Arc<NodeRecord> {
        let mut record = NodeRecord::new(NodeId::new(id));
        record.ready = ready;
        record.class = class;
        Arc::new(record)
    }

    #[test]
    fn filters_by_class_and_readiness() {
        let sensor = NodeClass {
            sensor: true,
            dimmer: false,
        };
        let nodes = vec![
            node(1, true, NodeClass::NONE),
            node(2, true, sensor),
            node(3, false, sensor),
        ];

        let ids = |f: NodeFilter| -> Vec<u8> {
            f.apply(&nodes).iter().map(|n| n.id.get()).collect()
        };
        assert_eq!(ids(NodeFilter::Sensors), vec![2, 3]);
        assert_eq!(ids(NodeFilter::NotReady), vec![3]);
        assert_eq!(ids(NodeFilter::Custom(Box::new(|n: &NodeRecord| n.id.get() > 1))), vec![2, 3]);
        assert!(ids(NodeFilter::Dimmers).is_empty());
    }
}
