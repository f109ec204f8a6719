// ── Runtime controller configuration ──
//
// These types describe *how* a controller instance behaves: identity,
// wait budgets and node classification. They never touch disk; the CLI
// builds a `ControllerConfig` (usually via `meshctl-config`) and hands it in.

use std::time::Duration;

use regex::{Regex, RegexBuilder};

use crate::error::CoreError;
use crate::model::{NodeClass, NodeId};

/// Default pattern a node type string must match to count as a sensor.
pub const DEFAULT_SENSOR_PATTERN: &str = "sensor";

/// Default pattern a node type string must match to count as a dimmer.
pub const DEFAULT_DIMMER_PATTERN: &str = r"multilevel\s+(power\s+)?switch|dimmer";

/// Configuration for a single controller instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Name stamped on every reading (e.g. `"Pi lab1"`).
    pub controller_name: String,
    /// Id the controller itself occupies in the network.
    pub controller_node: NodeId,
    /// Budget for the network-ready wait.
    pub network_ready_timeout: Duration,
    /// Budget for node inclusion/exclusion waits.
    pub operation_timeout: Duration,
    /// How often the network-start wait re-checks driver readiness.
    pub poll_interval: Duration,
    /// Case-insensitive regex for sensor type strings.
    pub sensor_pattern: String,
    /// Case-insensitive regex for dimmer type strings.
    pub dimmer_pattern: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_name: "meshctl".into(),
            controller_node: NodeId::CONTROLLER,
            network_ready_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_secs(1),
            sensor_pattern: DEFAULT_SENSOR_PATTERN.into(),
            dimmer_pattern: DEFAULT_DIMMER_PATTERN.into(),
        }
    }
}

impl ControllerConfig {
    /// Reject values no controller could run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.network_ready_timeout.is_zero() || self.operation_timeout.is_zero() {
            return Err(CoreError::Config {
                message: "timeouts must be greater than zero".into(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::Config {
                message: "poll interval must be greater than zero".into(),
            });
        }
        if self.poll_interval > self.network_ready_timeout {
            return Err(CoreError::Config {
                message: format!(
                    "poll interval ({}ms) exceeds the network ready timeout ({}ms)",
                    self.poll_interval.as_millis(),
                    self.network_ready_timeout.as_millis()
                ),
            });
        }
        NodeClassifier::new(&self.sensor_pattern, &self.dimmer_pattern)?;
        Ok(())
    }

    pub fn classifier(&self) -> Result<NodeClassifier, CoreError> {
        NodeClassifier::new(&self.sensor_pattern, &self.dimmer_pattern)
    }
}

/// Derives [`NodeClass`] tags from a node's type string.
#[derive(Debug, Clone)]
pub struct NodeClassifier {
    sensor: Regex,
    dimmer: Regex,
}

impl NodeClassifier {
    pub fn new(sensor: &str, dimmer: &str) -> Result<Self, CoreError> {
        Ok(Self {
            sensor: compile("sensor", sensor)?,
            dimmer: compile("dimmer", dimmer)?,
        })
    }

    pub fn classify(&self, node_type: &str) -> NodeClass {
        NodeClass {
            sensor: self.sensor.is_match(node_type),
            dimmer: self.dimmer.is_match(node_type),
        }
    }
}

fn compile(what: &str, pattern: &str) -> Result<Regex, CoreError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| CoreError::Config {
            message: format!("invalid {what} pattern '{pattern}': {e}"),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_poll_interval_above_timeout() {
        let config = ControllerConfig {
            poll_interval: Duration::from_secs(60),
            ..ControllerConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn rejects_bad_pattern() {
        let config = ControllerConfig {
            dimmer_pattern: "(unclosed".into(),
            ..ControllerConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn classification_is_case_insensitive_and_independent() {
        let classifier = ControllerConfig::default().classifier().unwrap();

        let sensor = classifier.classify("Routing Multilevel SENSOR");
        assert!(sensor.sensor);
        assert!(!sensor.dimmer);

        let dimmer = classifier.classify("Multilevel Power Switch");
        assert!(dimmer.dimmer);
        assert!(!dimmer.sensor);

        assert_eq!(classifier.classify("Static PC Controller"), NodeClass::NONE);

        let both = NodeClassifier::new("sensor", "sensor")
            .map(|c| c.classify("Binary Sensor"))
            .ok();
        assert_eq!(
            both,
            Some(NodeClass {
                sensor: true,
                dimmer: true
            })
        );
    }
}
