// ── Node state store ──
//
// Concurrent node storage with push-based change notification.

mod registry;

pub(crate) use registry::{NodeRegistry, Sentinel};
pub use registry::NodeSnapshot;
