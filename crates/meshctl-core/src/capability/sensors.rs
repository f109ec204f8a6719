use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::controller::Controller;
use crate::error::CoreError;
use crate::model::{
    NodeId, ParameterOutcome, ReadingKind, SensorReading, reading::normalize_temperature,
};

/// Readings from nodes classified as sensors.
pub trait SensorReadings {
    /// One reading of `kind` from `node`. Temperatures are reported in
    /// Celsius whatever unit the device uses.
    fn sensor_reading(&self, node: NodeId, kind: ReadingKind)
    -> Result<SensorReading, CoreError>;

    /// Every sensor kind the node reports. Kinds the node has no value for
    /// are skipped.
    fn sensor_readings(&self, node: NodeId) -> Result<Vec<SensorReading>, CoreError>;

    /// Push one configuration parameter to every sensor node.
    fn set_sensors_parameter(
        &self,
        index: u8,
        value: i64,
        size: u8,
    ) -> Result<BTreeMap<NodeId, ParameterOutcome>, CoreError>;
}

impl SensorReadings for Controller {
    fn sensor_reading(
        &self,
        node: NodeId,
        kind: ReadingKind,
    ) -> Result<SensorReading, CoreError> {
        if !kind.is_sensor_kind() {
            return Err(CoreError::Validation {
                message: format!("{kind} is not a sensor reading"),
            });
        }
        let query = self.query();
        let record = query.lookup_sensor(node)?;
        let value = query.reading_value(node, kind)?;

        let data = if kind == ReadingKind::Temperature {
            normalize_temperature(&value.data, &value.units)
        } else {
            value.data
        };

        Ok(SensorReading {
            controller: query.controller_name().to_owned(),
            sensor: node,
            location: record.location.clone(),
            kind,
            update_time: record.last_update,
            value: data,
        })
    }

    fn sensor_readings(&self, node: NodeId) -> Result<Vec<SensorReading>, CoreError> {
        self.query().lookup_sensor(node)?;

        let mut readings = Vec::new();
        for kind in ReadingKind::SENSOR_KINDS {
            match self.sensor_reading(node, kind) {
                Ok(reading) => readings.push(reading),
                Err(CoreError::ValueNotFound { .. }) => {
                    debug!(node = %node, %kind, "sensor does not report this kind");
                }
                Err(e) => return Err(e),
            }
        }

        if readings.is_empty() {
            return Err(CoreError::ValueNotFound {
                node,
                label: "any sensor reading".into(),
            });
        }
        Ok(readings)
    }

    fn set_sensors_parameter(
        &self,
        index: u8,
        value: i64,
        size: u8,
    ) -> Result<BTreeMap<NodeId, ParameterOutcome>, CoreError> {
        let query = self.query();
        if !query.status().is_running() {
            return Err(CoreError::NetworkDown);
        }

        let mut outcomes = BTreeMap::new();
        for record in query.sensor_records() {
            let outcome = if !record.ready {
                ParameterOutcome {
                    accepted: false,
                    reason: "node not ready".into(),
                }
            } else {
                match query.driver().set_config_param(record.id, index, value, size) {
                    Ok(true) => ParameterOutcome {
                        accepted: true,
                        reason: "queued".into(),
                    },
                    Ok(false) => ParameterOutcome {
                        accepted: false,
                        reason: "refused by driver".into(),
                    },
                    Err(e) => ParameterOutcome {
                        accepted: false,
                        reason: e.to_string(),
                    },
                }
            };
            outcomes.insert(record.id, outcome);
        }

        let accepted = outcomes.values().filter(|o| o.accepted).count();
        info!(index, value, size, accepted, total = outcomes.len(), "sensor parameter pushed");
        Ok(outcomes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::ControllerConfig;
    use crate::driver::{SimulatedDriver, SimulationProfile};
    use crate::model::ValueData;

    async fn started() -> (Controller, SimulatedDriver) {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        let controller =
            Controller::new(ControllerConfig::default(), Arc::new(driver.clone())).unwrap();
        let outcome = controller.start_network().await.unwrap();
        assert!(outcome.is_ready());
        // let the dispatcher apply NetworkReady
        tokio::time::sleep(Duration::from_millis(10)).await;
        (controller, driver)
    }

    #[tokio::test(start_paused = true)]
    async fn temperature_is_reported_in_celsius() {
        let (controller, _driver) = started().await;

        let reading = controller
            .sensor_reading(NodeId::new(2), ReadingKind::Temperature)
            .unwrap();
        assert_eq!(reading.value, ValueData::Decimal(22.0));
        assert_eq!(reading.location, "Lab");
        assert_eq!(reading.controller, "meshctl");
        assert_eq!(reading.sensor, NodeId::new(2));
    }

    #[tokio::test(start_paused = true)]
    async fn checks_classification_after_existence() {
        let (controller, _driver) = started().await;

        assert!(matches!(
            controller.sensor_reading(NodeId::new(3), ReadingKind::Humidity),
            Err(CoreError::NotASensor { .. })
        ));
        assert!(matches!(
            controller.sensor_reading(NodeId::new(99), ReadingKind::Humidity),
            Err(CoreError::NodeNotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn all_readings_cover_every_reported_kind() {
        let (controller, _driver) = started().await;

        let kinds: Vec<ReadingKind> = controller
            .sensor_readings(NodeId::new(2))
            .unwrap()
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(kinds, ReadingKind::SENSOR_KINDS.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn value_update_stamps_reading_time() {
        let (controller, driver) = started().await;
        let id = NodeId::new(2);
        assert!(controller.sensor_reading(id, ReadingKind::Humidity).unwrap().update_time.is_none());

        driver
            .report_value(id, "Relative Humidity", ValueData::Decimal(48.0))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let reading = controller.sensor_reading(id, ReadingKind::Humidity).unwrap();
        assert_eq!(reading.value, ValueData::Decimal(48.0));
        assert!(reading.update_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn parameter_push_reports_per_sensor() {
        let (controller, _driver) = started().await;

        let outcomes = controller.set_sensors_parameter(3, 240, 2).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[&NodeId::new(2)].accepted);

        let refused = controller.set_sensors_parameter(3, 240, 3).unwrap();
        assert!(!refused[&NodeId::new(2)].accepted);
    }

    #[tokio::test]
    async fn parameter_push_requires_running_network() {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        let controller = Controller::new(ControllerConfig::default(), Arc::new(driver)).unwrap();
        assert!(matches!(
            controller.set_sensors_parameter(3, 240, 2),
            Err(CoreError::NetworkDown)
        ));
    }
}
