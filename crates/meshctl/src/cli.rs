//! Clap derive structures for the `meshctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use meshctl_core::{NodeFilter, ReadingKind};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meshctl -- drive a mesh network controller from the command line
#[derive(Debug, Parser)]
#[command(
    name = "meshctl",
    version,
    about = "Manage a mesh network controller from the command line",
    long_about = "Start the network, include and exclude nodes, and read sensors and dimmers.\n\n\
        Every invocation starts the network, runs one command and stops it again.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "MESHCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Controller name stamped on readings (overrides config)
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Node inclusion/exclusion timeout in seconds (overrides config)
    #[arg(long, short = 't', global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MESHCTL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Network lifecycle and overview
    #[command(alias = "net")]
    Network(NetworkArgs),

    /// Inspect, include and exclude nodes
    #[command(alias = "n")]
    Nodes(NodesArgs),

    /// Read sensor nodes
    #[command(alias = "s")]
    Sensors(SensorsArgs),

    /// Read and set dimmer nodes
    #[command(alias = "d")]
    Dimmers(DimmersArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Network ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Start the network and report how readiness went
    Start,

    /// Home id, status and every node with its neighbors
    Info,

    /// Erase the controller's network (destructive)
    HardReset {
        /// Reset even if nodes are still included
        #[arg(long)]
        force: bool,
    },

    /// Restart the controller without losing the network
    SoftReset,
}

// ── Nodes ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NodesArgs {
    #[command(subcommand)]
    pub command: NodesCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodesCommand {
    /// List nodes by id
    #[command(alias = "ls")]
    List {
        /// Restrict the listing
        #[arg(long, short = 'f', default_value = "all")]
        filter: NodeFilterArg,
    },

    /// Show one node in detail
    Get {
        /// Node id
        node: u8,
    },

    /// Put the controller in inclusion mode and wait for a node to join
    Add,

    /// Put the controller in exclusion mode and wait for a node to leave
    Remove,

    /// Show or set a node's location
    Location {
        /// Node id
        node: u8,
        /// New location; omit to show the current one
        value: Option<String>,
    },

    /// Show or set a node's name
    Name {
        /// Node id
        node: u8,
        /// New name; omit to show the current one
        value: Option<String>,
    },

    /// List a node's neighbors
    Neighbors {
        /// Node id
        node: u8,
    },

    /// Time of a node's last value update
    Timestamp {
        /// Node id
        node: u8,
    },

    /// Configuration parameters of every ready node
    Config,

    /// Read or write one configuration parameter
    Param(ParamArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NodeFilterArg {
    All,
    Sensors,
    Dimmers,
    Ready,
    NotReady,
    WithHistory,
}

impl From<NodeFilterArg> for NodeFilter {
    fn from(arg: NodeFilterArg) -> Self {
        match arg {
            NodeFilterArg::All => Self::All,
            NodeFilterArg::Sensors => Self::Sensors,
            NodeFilterArg::Dimmers => Self::Dimmers,
            NodeFilterArg::Ready => Self::Ready,
            NodeFilterArg::NotReady => Self::NotReady,
            NodeFilterArg::WithHistory => Self::WithHistory,
        }
    }
}

#[derive(Debug, Args)]
pub struct ParamArgs {
    #[command(subcommand)]
    pub command: ParamCommand,
}

#[derive(Debug, Subcommand)]
pub enum ParamCommand {
    /// Read a configuration parameter
    Get {
        /// Node id
        node: u8,
        /// Parameter index
        index: u8,
    },

    /// Write a configuration parameter
    Set {
        /// Node id
        node: u8,
        /// Parameter index
        index: u8,
        /// New value
        #[arg(allow_negative_numbers = true)]
        value: i64,
        /// Value size in bytes (1, 2 or 4)
        #[arg(long, default_value = "2")]
        size: u8,
    },
}

// ── Sensors ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SensorsArgs {
    #[command(subcommand)]
    pub command: SensorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SensorsCommand {
    /// List sensor nodes
    #[command(alias = "ls")]
    List,

    /// Read one kind, or every kind the sensor reports
    Read {
        /// Node id
        node: u8,
        /// Reading kind (temperature, humidity, luminance, ultraviolet, motion, battery)
        kind: Option<ReadingKind>,
    },

    /// Push a configuration parameter to every sensor
    SetParam {
        /// Parameter index
        index: u8,
        /// New value
        #[arg(allow_negative_numbers = true)]
        value: i64,
        /// Value size in bytes (1, 2 or 4)
        #[arg(long, default_value = "2")]
        size: u8,
    },
}

// ── Dimmers ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DimmersArgs {
    #[command(subcommand)]
    pub command: DimmersCommand,
}

#[derive(Debug, Subcommand)]
pub enum DimmersCommand {
    /// List dimmer nodes
    #[command(alias = "ls")]
    List,

    /// Current level of a dimmer
    Get {
        /// Node id
        node: u8,
    },

    /// Set a dimmer's level (0-99)
    Set {
        /// Node id
        node: u8,
        /// Level, 0 is off
        level: u8,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Set a configuration value
    Set {
        /// Config key (dot-separated path, e.g., "timeouts.operation_secs")
        key: String,

        /// Value to set
        value: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
