use tracing::info;

use crate::controller::Controller;
use crate::error::CoreError;
use crate::model::{DimmerReading, NodeId, ReadingKind, ValueData};

/// Highest level a multilevel switch accepts; 0 is off.
pub const MAX_DIMMER_LEVEL: u8 = 99;

/// Level control for nodes classified as dimmers.
pub trait DimmerControl {
    fn dimmer_level(&self, node: NodeId) -> Result<DimmerReading, CoreError>;

    /// Set the level, returning the previous one.
    fn set_dimmer_level(&self, node: NodeId, level: u8) -> Result<ValueData, CoreError>;
}

impl DimmerControl for Controller {
    fn dimmer_level(&self, node: NodeId) -> Result<DimmerReading, CoreError> {
        let query = self.query();
        let record = query.lookup_dimmer(node)?;
        let value = query.reading_value(node, ReadingKind::Level)?;

        Ok(DimmerReading {
            controller: query.controller_name().to_owned(),
            dimmer: node,
            location: record.location.clone(),
            kind: ReadingKind::Level,
            value: value.data,
        })
    }

    fn set_dimmer_level(&self, node: NodeId, level: u8) -> Result<ValueData, CoreError> {
        let query = self.query();
        query.lookup_dimmer(node)?;
        if level > MAX_DIMMER_LEVEL {
            return Err(CoreError::Validation {
                message: format!("dimmer level must be 0..={MAX_DIMMER_LEVEL}, got {level}"),
            });
        }

        let value = query.reading_value(node, ReadingKind::Level)?;
        query
            .driver()
            .set_value(node, value.id, ValueData::Int(i64::from(level)))?;
        info!(node = %node, level, previous = %value.data, "dimmer level set");
        Ok(value.data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::capability::SensorReadings;
    use crate::config::ControllerConfig;
    use crate::driver::{SimulatedDriver, SimulationProfile};

    async fn started() -> Controller {
        let driver = SimulatedDriver::new(SimulationProfile::lab());
        let controller = Controller::new(ControllerConfig::default(), Arc::new(driver)).unwrap();
        controller.start_network().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller
    }

    #[tokio::test(start_paused = true)]
    async fn set_level_returns_previous() {
        let controller = started().await;
        let id = NodeId::new(3);

        assert_eq!(controller.dimmer_level(id).unwrap().value, ValueData::Int(0));
        assert_eq!(controller.set_dimmer_level(id, 40).unwrap(), ValueData::Int(0));

        let reading = controller.dimmer_level(id).unwrap();
        assert_eq!(reading.value, ValueData::Int(40));
        assert_eq!(reading.location, "Hallway");
        assert_eq!(reading.kind, ReadingKind::Level);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_out_of_range_level() {
        let controller = started().await;
        assert!(matches!(
            controller.set_dimmer_level(NodeId::new(3), 100),
            Err(CoreError::Validation { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_is_not_a_dimmer() {
        let controller = started().await;
        assert!(matches!(
            controller.dimmer_level(NodeId::new(2)),
            Err(CoreError::NotADimmer { .. })
        ));
        assert!(matches!(
            controller.sensor_reading(NodeId::new(3), ReadingKind::Level),
            Err(CoreError::Validation { .. })
        ));
    }
}
