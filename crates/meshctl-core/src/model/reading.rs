// ── Per-kind readings ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::identity::NodeId;
use super::value::{ValueData, command_class};

/// Kind of measurement a reading carries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReadingKind {
    Temperature,
    Humidity,
    Luminance,
    Ultraviolet,
    Motion,
    Battery,
    Level,
}

impl ReadingKind {
    /// Sensor kinds, in the order `sensorReadings` reports them.
    pub const SENSOR_KINDS: [Self; 6] = [
        Self::Temperature,
        Self::Humidity,
        Self::Luminance,
        Self::Ultraviolet,
        Self::Motion,
        Self::Battery,
    ];

    /// Driver label the value is published under.
    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Relative Humidity",
            Self::Luminance => "Luminance",
            Self::Ultraviolet => "Ultraviolet",
            Self::Motion => "Sensor",
            Self::Battery => "Battery Level",
            Self::Level => "Level",
        }
    }

    /// Command class to restrict the lookup to. Battery level is searched
    /// in every class.
    pub fn command_class(self) -> Option<u8> {
        match self {
            Self::Battery => None,
            Self::Level => Some(command_class::SWITCH_MULTILEVEL),
            _ => Some(command_class::SENSOR_MULTILEVEL),
        }
    }

    pub fn is_sensor_kind(self) -> bool {
        self != Self::Level
    }
}

/// A single measurement taken from a sensor node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub controller: String,
    pub sensor: NodeId,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: ReadingKind,
    #[serde(with = "chrono::serde::ts_seconds_option", default)]
    pub update_time: Option<DateTime<Utc>>,
    pub value: ValueData,
}

/// Current level of a dimmer node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimmerReading {
    pub controller: String,
    pub dimmer: NodeId,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: ReadingKind,
    pub value: ValueData,
}

/// Outcome of pushing one configuration parameter to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOutcome {
    pub accepted: bool,
    pub reason: String,
}

/// Degrees Fahrenheit to Celsius, rounded to two decimals.
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    ((f - 32.0) * 5.0 / 9.0 * 100.0).round() / 100.0
}

/// Normalize a temperature value to Celsius based on its reported units.
pub fn normalize_temperature(data: &ValueData, units: &str) -> ValueData {
    let fahrenheit = units.trim().trim_start_matches('°').eq_ignore_ascii_case("F");
    match (fahrenheit, data.as_f64()) {
        (true, Some(f)) => ValueData::Decimal(fahrenheit_to_celsius(f)),
        _ => data.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn converts_fahrenheit() {
        assert!((fahrenheit_to_celsius(212.0) - 100.0).abs() < f64::EPSILON);
        assert!((fahrenheit_to_celsius(70.0) - 21.11).abs() < 1e-9);
    }

    #[test]
    fn celsius_passes_through() {
        let data = ValueData::Decimal(21.5);
        assert_eq!(normalize_temperature(&data, "C"), data);
        assert_eq!(
            normalize_temperature(&ValueData::Decimal(32.0), "°F"),
            ValueData::Decimal(0.0)
        );
    }

    #[test]
    fn every_sensor_kind_is_listed_once() {
        let from_iter: Vec<_> = ReadingKind::iter().filter(|k| k.is_sensor_kind()).collect();
        assert_eq!(from_iter, ReadingKind::SENSOR_KINDS.to_vec());
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Humidity".parse::<ReadingKind>().unwrap(), ReadingKind::Humidity);
        assert_eq!(ReadingKind::Ultraviolet.to_string(), "ultraviolet");
    }

    #[test]
    fn reading_uses_wire_field_names() {
        let reading = SensorReading {
            controller: "Pi lab1".into(),
            sensor: NodeId::new(2),
            location: "Lab".into(),
            kind: ReadingKind::Temperature,
            update_time: None,
            value: ValueData::Decimal(21.5),
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["type"], "temperature");
        assert!(json.get("updateTime").is_some());
        assert_eq!(json["value"], 21.5);
    }
}
