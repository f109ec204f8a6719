// ── Core identity types ──
//
// NodeId and HomeId are the two identifiers every notification carries.
// NodeId is the per-network node address, HomeId names the network itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

// ── NodeId ──────────────────────────────────────────────────────────

/// Address of a node inside one mesh network.
///
/// Stable for the node's lifetime in the network. The controller owns a
/// reserved id (see [`NodeId::CONTROLLER`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u8);

impl NodeId {
    /// Well-known id of the primary controller.
    pub const CONTROLLER: Self = Self(1);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Short label used in logs and tables (`Node007`).
    pub fn label(self) -> String {
        format!("Node{:>03}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u8>().map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::CONTROLLER
    }
}

impl From<u8> for NodeId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

// ── HomeId ──────────────────────────────────────────────────────────

/// 32-bit network identifier assigned by the controller at inclusion time.
///
/// Rendered as eight lowercase hex digits, the way controllers print it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeId(u32);

impl HomeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for HomeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("0x");
        u32::from_str_radix(trimmed, 16).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn node_id_label_is_zero_padded() {
        assert_eq!(NodeId::new(7).label(), "Node007");
        assert_eq!(NodeId::new(123).label(), "Node123");
    }

    #[test]
    fn node_id_from_str() {
        let id: NodeId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!("300".parse::<NodeId>().is_err());
    }

    #[test]
    fn node_ids_order_numerically() {
        let mut ids = vec![NodeId::new(3), NodeId::new(1), NodeId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);
    }

    #[test]
    fn home_id_display_is_hex() {
        assert_eq!(HomeId::new(0xc0ff_ee01).to_string(), "c0ffee01");
        assert_eq!(HomeId::new(0x1f).to_string(), "0000001f");
    }

    #[test]
    fn home_id_from_str_accepts_prefix() {
        let id: HomeId = "0xc0ffee01".parse().unwrap();
        assert_eq!(id.get(), 0xc0ff_ee01);
    }
}
