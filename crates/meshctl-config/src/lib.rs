//! Configuration for meshctl.
//!
//! TOML file + `MESHCTL_` environment overrides, layered over serialized
//! defaults with figment, and translation to `meshctl_core::ControllerConfig`
//! and the loopback driver's `SimulationProfile`. The CLI adds flag-aware
//! wrappers on top.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meshctl_core::config::{DEFAULT_DIMMER_PATTERN, DEFAULT_SENSOR_PATTERN};
use meshctl_core::{ControllerConfig, HomeId, NodeId, SimulatedNode, SimulationProfile};

/// Prefix of environment overrides; `__` separates nested keys
/// (`MESHCTL_TIMEOUTS__OPERATION_SECS=40`).
pub const ENV_PREFIX: &str = "MESHCTL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerSection,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub classify: Classify,

    #[serde(default)]
    pub log: LogSection,

    /// Scripted network served by the loopback driver.
    #[serde(default)]
    pub simulation: Simulation,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ControllerSection {
    /// Name stamped on every reading.
    #[serde(default = "default_name")]
    pub name: String,

    /// Node id the controller occupies.
    #[serde(default = "default_node_id")]
    pub node_id: u8,

    /// Serial device of the controller stick.
    #[serde(default = "default_device")]
    pub device: String,

    /// Directory holding the driver's device database.
    pub config_path: Option<PathBuf>,

    /// Writable directory for driver state and log files.
    pub user_path: Option<PathBuf>,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            node_id: default_node_id(),
            device: default_device(),
            config_path: None,
            user_path: None,
        }
    }
}

fn default_name() -> String {
    "meshctl".into()
}
fn default_node_id() -> u8 {
    NodeId::CONTROLLER.get()
}
fn default_device() -> String {
    "/dev/ttyACM0".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Timeouts {
    #[serde(default = "default_network_ready")]
    pub network_ready_secs: u64,

    #[serde(default = "default_operation")]
    pub operation_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            network_ready_secs: default_network_ready(),
            operation_secs: default_operation(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_network_ready() -> u64 {
    30
}
fn default_operation() -> u64 {
    20
}
fn default_poll_interval() -> u64 {
    1000
}

/// Case-insensitive regular expressions matched against node type strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Classify {
    #[serde(default = "default_sensor_pattern")]
    pub sensor: String,

    #[serde(default = "default_dimmer_pattern")]
    pub dimmer: String,
}

impl Default for Classify {
    fn default() -> Self {
        Self {
            sensor: default_sensor_pattern(),
            dimmer: default_dimmer_pattern(),
        }
    }
}

fn default_sensor_pattern() -> String {
    DEFAULT_SENSOR_PATTERN.into()
}
fn default_dimmer_pattern() -> String {
    DEFAULT_DIMMER_PATTERN.into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSection {
    /// Filter directive used when neither `-v` nor `RUST_LOG` is given.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a daily-rotated log file.
    #[serde(default)]
    pub file: bool,

    /// Where log files go; defaults to the controller's user path.
    pub directory: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

/// Kind of device a simulated node imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimNodeKind {
    Sensor,
    Dimmer,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimNode {
    pub id: u8,
    pub kind: SimNodeKind,

    /// Overrides the type string the kind implies.
    pub node_type: Option<String>,
    pub product_name: Option<String>,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_true")]
    pub ready: bool,

    #[serde(default)]
    pub neighbors: Vec<u8>,
}

impl SimNode {
    fn new(id: u8, kind: SimNodeKind) -> Self {
        Self {
            id,
            kind,
            node_type: None,
            product_name: None,
            location: String::new(),
            name: String::new(),
            ready: true,
            neighbors: Vec::new(),
        }
    }

    fn located(mut self, location: &str, neighbors: &[u8]) -> Self {
        location.clone_into(&mut self.location);
        self.neighbors = neighbors.to_vec();
        self
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Simulation {
    /// Network id as eight hex digits.
    #[serde(default = "default_home_id")]
    pub home_id: String,

    #[serde(default = "default_ready_after")]
    pub ready_after_ms: u64,

    #[serde(default)]
    pub nodes: Vec<SimNode>,

    pub inclusion_candidate: Option<SimNode>,

    #[serde(default = "default_action_delay")]
    pub inclusion_delay_ms: u64,

    pub exclusion_target: Option<u8>,

    #[serde(default = "default_action_delay")]
    pub exclusion_delay_ms: u64,

    #[serde(default)]
    pub reject_commands: bool,
}

/// A small lab network: one sensor, one dimmer, a second sensor waiting to
/// be included, and the dimmer as exclusion target.
impl Default for Simulation {
    fn default() -> Self {
        Self {
            home_id: default_home_id(),
            ready_after_ms: default_ready_after(),
            nodes: vec![
                SimNode::new(2, SimNodeKind::Sensor).located("Lab", &[1, 3]),
                SimNode::new(3, SimNodeKind::Dimmer).located("Hallway", &[1, 2]),
            ],
            inclusion_candidate: Some(SimNode::new(4, SimNodeKind::Sensor).located("", &[1])),
            inclusion_delay_ms: default_action_delay(),
            exclusion_target: Some(3),
            exclusion_delay_ms: default_action_delay(),
            reject_commands: false,
        }
    }
}

fn default_home_id() -> String {
    "c0ffee01".into()
}
fn default_ready_after() -> u64 {
    2000
}
fn default_action_delay() -> u64 {
    3000
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "meshctl", "meshctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Platform data directory, used for logs when no user path is configured.
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("org", "meshctl", "meshctl")
        .map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("meshctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an
/// error; defaults and environment still apply.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    Ok(config)
}

/// Load defaults + file only, ignoring the environment. Used when the
/// result is written back, so environment overrides never persist.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = file_figment(path).extract()?;
    Ok(config)
}

fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
}

fn figment(path: &Path) -> Figment {
    file_figment(path).merge(Env::prefixed(ENV_PREFIX).split("__"))
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Where driver state and log files live.
    pub fn user_path(&self) -> PathBuf {
        self.controller.user_path.clone().unwrap_or_else(data_dir)
    }

    pub fn log_directory(&self) -> PathBuf {
        self.log.directory.clone().unwrap_or_else(|| self.user_path())
    }
}

/// Build the core's `ControllerConfig`, validating every value.
pub fn to_controller_config(cfg: &Config) -> Result<ControllerConfig, ConfigError> {
    if cfg.controller.node_id == 0 {
        return Err(invalid("controller.node_id", "node ids start at 1"));
    }
    if cfg.controller.name.trim().is_empty() {
        return Err(invalid("controller.name", "must not be empty"));
    }

    let controller = ControllerConfig {
        controller_name: cfg.controller.name.clone(),
        controller_node: NodeId::new(cfg.controller.node_id),
        network_ready_timeout: Duration::from_secs(cfg.timeouts.network_ready_secs),
        operation_timeout: Duration::from_secs(cfg.timeouts.operation_secs),
        poll_interval: Duration::from_millis(cfg.timeouts.poll_interval_ms),
        sensor_pattern: cfg.classify.sensor.clone(),
        dimmer_pattern: cfg.classify.dimmer.clone(),
    };
    controller
        .validate()
        .map_err(|e| invalid("controller config", e.to_string()))?;
    Ok(controller)
}

/// Build the loopback driver's script from `[simulation]`.
pub fn to_simulation_profile(cfg: &Config) -> Result<SimulationProfile, ConfigError> {
    let sim = &cfg.simulation;
    let home_id: HomeId = sim
        .home_id
        .parse()
        .map_err(|_| invalid("simulation.home_id", format!("not a hex id: {}", sim.home_id)))?;

    let controller_id = cfg.controller.node_id;
    let mut seen = BTreeSet::from([controller_id]);
    let mut nodes = Vec::with_capacity(sim.nodes.len());
    for node in &sim.nodes {
        if node.id == 0 || !seen.insert(node.id) {
            return Err(invalid(
                "simulation.nodes",
                format!("node id {} is zero or used twice", node.id),
            ));
        }
        nodes.push(simulated(node));
    }

    let inclusion_candidate = match &sim.inclusion_candidate {
        Some(node) if node.id == 0 || seen.contains(&node.id) => {
            return Err(invalid(
                "simulation.inclusion_candidate",
                format!("node id {} is zero or already included", node.id),
            ));
        }
        Some(node) => Some(simulated(node)),
        None => None,
    };

    Ok(SimulationProfile {
        home_id,
        controller: SimulatedNode::controller(controller_id)
            .with_neighbors(&sim.nodes.iter().map(|n| n.id).collect::<Vec<_>>()),
        nodes,
        ready_after: Duration::from_millis(sim.ready_after_ms),
        inclusion_candidate,
        inclusion_delay: Duration::from_millis(sim.inclusion_delay_ms),
        exclusion_target: sim.exclusion_target.map(NodeId::new),
        exclusion_delay: Duration::from_millis(sim.exclusion_delay_ms),
        reject_commands: sim.reject_commands,
    })
}

fn simulated(node: &SimNode) -> SimulatedNode {
    let mut sim = match node.kind {
        SimNodeKind::Sensor => SimulatedNode::multisensor(node.id),
        SimNodeKind::Dimmer => SimulatedNode::dimmer(node.id),
        SimNodeKind::Generic => SimulatedNode::new(node.id, "Generic Node", "Unknown Device"),
    };
    if let Some(node_type) = &node.node_type {
        node_type.clone_into(&mut sim.node_type);
    }
    if let Some(product) = &node.product_name {
        product.clone_into(&mut sim.product_name);
    }
    sim = sim
        .with_location(&node.location)
        .with_name(&node.name)
        .with_neighbors(&node.neighbors);
    if node.ready { sim } else { sim.not_ready() }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_translate_to_core_defaults() {
        let core = to_controller_config(&Config::default()).unwrap();
        assert_eq!(core, ControllerConfig::default());
    }

    #[test]
    fn default_simulation_matches_lab_network() {
        let profile = to_simulation_profile(&Config::default()).unwrap();
        assert_eq!(profile, SimulationProfile::lab());
    }

    #[test]
    fn file_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "meshctl.toml",
                r#"
                [controller]
                name = "Pi lab1"

                [timeouts]
                operation_secs = 45
                "#,
            )?;
            jail.set_env("MESHCTL_TIMEOUTS__POLL_INTERVAL_MS", "250");
            jail.set_env("MESHCTL_CLASSIFY__DIMMER", "dimmer");

            let cfg = load_from(Path::new("meshctl.toml")).unwrap();
            assert_eq!(cfg.controller.name, "Pi lab1");
            assert_eq!(cfg.controller.device, "/dev/ttyACM0");
            assert_eq!(cfg.timeouts.operation_secs, 45);
            assert_eq!(cfg.timeouts.network_ready_secs, 30);
            assert_eq!(cfg.timeouts.poll_interval_ms, 250);
            assert_eq!(cfg.classify.dimmer, "dimmer");
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = load_from(Path::new("absent.toml")).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn file_only_load_ignores_environment() {
        Jail::expect_with(|jail| {
            jail.create_file("meshctl.toml", "[timeouts]\noperation_secs = 45\n")?;
            jail.set_env("MESHCTL_TIMEOUTS__OPERATION_SECS", "5");

            let layered = load_from(Path::new("meshctl.toml")).unwrap();
            let file = load_file(Path::new("meshctl.toml")).unwrap();
            assert_eq!(layered.timeouts.operation_secs, 5);
            assert_eq!(file.timeouts.operation_secs, 45);
            Ok(())
        });
    }

    #[test]
    fn rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.timeouts.operation_secs = 0;
        assert!(matches!(
            to_controller_config(&cfg),
            Err(ConfigError::Validation { .. })
        ));

        let mut cfg = Config::default();
        cfg.classify.sensor = "(unclosed".into();
        assert!(to_controller_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.timeouts.poll_interval_ms = 60_000;
        assert!(to_controller_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.simulation.nodes.push(SimNode::new(2, SimNodeKind::Generic));
        assert!(to_simulation_profile(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.simulation.home_id = "not-hex".into();
        assert!(to_simulation_profile(&cfg).is_err());
    }

    #[test]
    fn save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.controller.name = "Attic".into();
        cfg.log.file = true;
        save_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[timeouts]"));
        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn generic_nodes_can_override_type() {
        let mut cfg = Config::default();
        let mut node = SimNode::new(9, SimNodeKind::Generic);
        node.node_type = Some("Binary Power Switch".into());
        node.ready = false;
        cfg.simulation.nodes.push(node);

        let profile = to_simulation_profile(&cfg).unwrap();
        let sim = profile.nodes.iter().find(|n| n.id == NodeId::new(9)).unwrap();
        assert_eq!(sim.node_type, "Binary Power Switch");
        assert!(!sim.ready);
    }
}
