// ── Network-level domain types ──

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::identity::HomeId;
use super::node::NodeDetail;

/// Lifecycle status of one controller instance.
///
/// Moves forward `NotStarted → Starting → Started → Ready`. A reset
/// notification takes the instance through `Resetting` back to `Starting`;
/// stopping the network returns it to `NotStarted`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum NetworkStatus {
    #[default]
    NotStarted,
    Starting,
    Started,
    Ready,
    Resetting,
}

impl NetworkStatus {
    /// Node inclusion and exclusion require a running network.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Started | Self::Ready)
    }

    /// Whether `next` is a legal forward step from `self`.
    ///
    /// `Resetting` is reachable from any running state and only leaves
    /// towards `Starting`.
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Resetting, Self::Starting) => true,
            (Self::Resetting, _) => false,
            (_, Self::Resetting) => self != Self::NotStarted,
            _ => next > self,
        }
    }
}

/// Result of a successful network start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// The driver reported readiness before the deadline.
    Ready {
        #[serde(with = "duration_millis")]
        after: Duration,
        /// Number of readiness predicate evaluations.
        polls: u32,
    },
    /// The deadline passed; the network keeps starting in the background.
    TimedOutButRunning {
        #[serde(with = "duration_millis")]
        waited: Duration,
    },
}

impl StartOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Snapshot of the whole network as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub home_id: HomeId,
    pub status: NetworkStatus,
    pub controller: String,
    pub nodes: Vec<NodeDetail>,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(value.as_millis())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_only() {
        use NetworkStatus::{NotStarted, Ready, Resetting, Started, Starting};

        assert!(NotStarted.can_advance_to(Starting));
        assert!(Starting.can_advance_to(Ready));
        assert!(!Ready.can_advance_to(Started));
        assert!(!NotStarted.can_advance_to(Resetting));
        assert!(Ready.can_advance_to(Resetting));
        assert!(Resetting.can_advance_to(Starting));
        assert!(!Resetting.can_advance_to(Ready));
    }

    #[test]
    fn status_parses_and_displays_snake_case() {
        assert_eq!(NetworkStatus::NotStarted.to_string(), "not_started");
        assert_eq!("READY".parse::<NetworkStatus>().unwrap(), NetworkStatus::Ready);
    }

    #[test]
    fn start_outcome_serializes_with_tag() {
        let outcome = StartOutcome::Ready {
            after: Duration::from_secs(2),
            polls: 3,
        };
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["outcome"], "ready");
        assert_eq!(json["after"], 2000);
        assert_eq!(json["polls"], 3);
    }
}
