//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use meshctl_config::ConfigError;
use meshctl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CAPABILITY: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const NETWORK: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Network ──────────────────────────────────────────────────────
    #[error("The network is not running")]
    #[diagnostic(
        code(meshctl::network_down),
        help("Check the controller device and run: meshctl network start -v")
    )]
    NetworkDown,

    #[error("Network already started ({status})")]
    #[diagnostic(code(meshctl::already_started))]
    AlreadyStarted { status: String },

    #[error("{operation} rejected by the controller: {reason}")]
    #[diagnostic(
        code(meshctl::rejected),
        help("The controller may be busy with another command; retry in a moment.")
    )]
    Rejected { operation: String, reason: String },

    #[error("{nodes} node(s) are still included in the network")]
    #[diagnostic(
        code(meshctl::network_not_empty),
        help(
            "Exclude them first with: meshctl nodes remove\n\
             Or erase anyway with: meshctl network hard-reset --force"
        )
    )]
    NetworkNotEmpty { nodes: usize },

    // ── Nodes ────────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(meshctl::not_found),
        help("Run: meshctl {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Node {node} is not ready")]
    #[diagnostic(
        code(meshctl::not_ready),
        help("Battery nodes report once they wake up; wake the device or wait.")
    )]
    NotReady { node: String },

    #[error("Node {node} is not a {expected}")]
    #[diagnostic(
        code(meshctl::capability),
        help("Run: meshctl {expected}s list")
    )]
    WrongCapability { node: String, expected: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("{operation} timed out after {seconds}s")]
    #[diagnostic(
        code(meshctl::timeout),
        help(
            "Activate the device (usually a button press) while the command waits.\n\
             Increase the wait with --timeout."
        )
    )]
    Timeout { operation: String, seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(meshctl::config),
        help("Inspect the resolved configuration with: meshctl config show")
    )]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(meshctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(meshctl::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::WrongCapability { .. } => exit_code::CAPABILITY,
            Self::AlreadyStarted { .. } | Self::NetworkNotEmpty { .. } | Self::NotReady { .. } => {
                exit_code::CONFLICT
            }
            Self::NetworkDown | Self::Rejected { .. } => exit_code::NETWORK,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Config(_) | Self::Internal(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NodeNotFound { node } => CliError::NotFound {
                resource_type: "node".into(),
                identifier: node.to_string(),
                list_command: "nodes list".into(),
            },

            CoreError::ValueNotFound { node, label } => CliError::NotFound {
                resource_type: "value".into(),
                identifier: format!("{label} on node {node}"),
                list_command: format!("nodes get {node}"),
            },

            CoreError::NotReady { node } => CliError::NotReady {
                node: node.to_string(),
            },

            CoreError::NotASensor { node } => CliError::WrongCapability {
                node: node.to_string(),
                expected: "sensor".into(),
            },

            CoreError::NotADimmer { node } => CliError::WrongCapability {
                node: node.to_string(),
                expected: "dimmer".into(),
            },

            CoreError::NetworkDown => CliError::NetworkDown,

            CoreError::AlreadyStarted { status } => CliError::AlreadyStarted { status },

            CoreError::NetworkNotEmpty { nodes } => CliError::NetworkNotEmpty { nodes },

            CoreError::Timeout {
                operation,
                timeout_secs,
            } => CliError::Timeout {
                operation,
                seconds: timeout_secs,
            },

            CoreError::DriverRejected { operation, reason } => {
                CliError::Rejected { operation, reason }
            }

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
