// ── Core error types ──
//
// Everything a caller of the controller can observe. Driver failures are
// translated at the boundary; handler failures inside the dispatcher are
// logged and never surface here.

use thiserror::Error;

use crate::driver::DriverError;
use crate::model::NodeId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Node lookup errors ───────────────────────────────────────────
    #[error("Node not found: {node}")]
    NodeNotFound { node: NodeId },

    #[error("Node {node} is not ready")]
    NotReady { node: NodeId },

    #[error("Node {node} is not a sensor")]
    NotASensor { node: NodeId },

    #[error("Node {node} is not a dimmer")]
    NotADimmer { node: NodeId },

    #[error("Node {node} has no value labelled '{label}'")]
    ValueNotFound { node: NodeId, label: String },

    // ── Network lifecycle errors ─────────────────────────────────────
    #[error("Network is not started")]
    NetworkDown,

    #[error("Network already started (status: {status})")]
    AlreadyStarted { status: String },

    #[error("Network still has {nodes} included node(s); force the reset to proceed")]
    NetworkNotEmpty { nodes: usize },

    #[error("Timed out waiting for {operation} after {timeout_secs}s")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    // ── Driver errors ────────────────────────────────────────────────
    #[error("Driver rejected {operation}: {reason}")]
    DriverRejected { operation: String, reason: String },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn rejected(operation: &str, err: &DriverError) -> Self {
        Self::DriverRejected {
            operation: operation.to_owned(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn refused(operation: &str) -> Self {
        Self::DriverRejected {
            operation: operation.to_owned(),
            reason: "command not accepted".into(),
        }
    }

    /// Errors the caller can fix by retrying later rather than changing
    /// the request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotReady { .. } | Self::NetworkDown | Self::Timeout { .. }
        )
    }
}

// ── Conversion from driver errors ────────────────────────────────────

impl From<DriverError> for CoreError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::UnknownNode(node) => CoreError::NodeNotFound { node },
            DriverError::NotRunning => CoreError::NetworkDown,
            DriverError::UnknownValue { node, value } => CoreError::ValueNotFound {
                node,
                label: value.to_string(),
            },
            DriverError::Rejected { command, reason } => CoreError::DriverRejected {
                operation: command,
                reason,
            },
            DriverError::Io(reason) => CoreError::Internal(format!("driver I/O: {reason}")),
        }
    }
}
