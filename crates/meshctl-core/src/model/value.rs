// ── Command-class values ──
//
// A node exposes its state as a flat set of values, each owned by one
// command class and addressed by a driver-assigned `ValueId`.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::identity::NodeId;

/// Well-known command class ids.
pub mod command_class {
    pub const SENSOR_BINARY: u8 = 0x30;
    pub const SENSOR_MULTILEVEL: u8 = 0x31;
    pub const SWITCH_MULTILEVEL: u8 = 0x26;
    pub const CONFIGURATION: u8 = 0x70;
    pub const BATTERY: u8 = 0x80;
}

/// Driver-assigned handle of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(u64);

impl ValueId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Which audience a value is meant for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ValueGenre {
    #[default]
    User,
    Config,
    System,
    Basic,
}

/// Typed payload of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueData {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
}

impl ValueData {
    /// Numeric view of the payload, if it has one.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Decimal(d) => Some(*d),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Decimal(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One command-class value as reported by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeValue {
    pub id: ValueId,
    pub node: NodeId,
    pub command_class: u8,
    /// Parameter index inside the command class (configuration index for
    /// `CONFIGURATION` values).
    pub index: u8,
    pub genre: ValueGenre,
    pub label: String,
    pub units: String,
    pub data: ValueData,
    pub read_only: bool,
}

/// Filter passed to the driver's value enumeration. `None` fields match
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueQuery {
    pub command_class: Option<u8>,
    pub genre: Option<ValueGenre>,
    pub label: Option<String>,
    pub index: Option<u8>,
}

impl ValueQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command_class(mut self, class: u8) -> Self {
        self.command_class = Some(class);
        self
    }

    pub fn genre(mut self, genre: ValueGenre) -> Self {
        self.genre = Some(genre);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn index(mut self, index: u8) -> Self {
        self.index = Some(index);
        self
    }

    pub fn matches(&self, value: &NodeValue) -> bool {
        self.command_class.is_none_or(|c| c == value.command_class)
            && self.genre.is_none_or(|g| g == value.genre)
            && self.index.is_none_or(|i| i == value.index)
            && self.label.as_deref().is_none_or(|l| l == value.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(class: u8, label: &str, genre: ValueGenre) -> NodeValue {
        NodeValue {
            id: ValueId::new(1),
            node: NodeId::new(2),
            command_class: class,
            index: 1,
            genre,
            label: label.into(),
            units: String::new(),
            data: ValueData::Int(0),
            read_only: true,
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let v = value(command_class::BATTERY, "Battery Level", ValueGenre::User);
        assert!(ValueQuery::new().matches(&v));
    }

    #[test]
    fn query_filters_on_every_set_field() {
        let v = value(command_class::SENSOR_MULTILEVEL, "Temperature", ValueGenre::User);

        let hit = ValueQuery::new()
            .command_class(command_class::SENSOR_MULTILEVEL)
            .genre(ValueGenre::User)
            .label("Temperature");
        assert!(hit.matches(&v));

        assert!(!hit.clone().label("Luminance").matches(&v));
        assert!(!hit.clone().genre(ValueGenre::Config).matches(&v));
        assert!(!hit.index(9).matches(&v));
    }

    #[test]
    fn numeric_views() {
        assert_eq!(ValueData::Text(" 21.5 ".into()).as_f64(), Some(21.5));
        assert_eq!(ValueData::Bool(true).as_i64(), Some(1));
        assert_eq!(ValueData::Decimal(1.5).as_i64(), None);
    }
}
