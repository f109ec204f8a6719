//! CLI configuration: thin wrapper around `meshctl_config`.
//!
//! Adds the resolution step that applies `GlobalOpts` overrides
//! (`--config`, `--name`, `--timeout`) on top of file + environment.

use std::path::PathBuf;
use std::time::Duration;

use meshctl_core::{ControllerConfig, SimulationProfile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use meshctl_config::{Config, save_to};

/// Config file in effect: `--config` / `MESHCTL_CONFIG`, else the platform path.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(meshctl_config::config_path)
}

/// Load the active config file layered with the environment.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(meshctl_config::load_from(&active_path(global))?)
}

/// Translate config + flag overrides into the core's `ControllerConfig`.
pub fn resolve(cfg: &Config, global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let mut controller = meshctl_config::to_controller_config(cfg)?;

    if let Some(ref name) = global.name {
        if name.trim().is_empty() {
            return Err(CliError::Validation {
                field: "name".into(),
                reason: "must not be empty".into(),
            });
        }
        controller.controller_name.clone_from(name);
    }

    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least one second".into(),
            });
        }
        controller.operation_timeout = Duration::from_secs(secs);
    }

    Ok(controller)
}

pub fn simulation(cfg: &Config) -> Result<SimulationProfile, CliError> {
    Ok(meshctl_config::to_simulation_profile(cfg)?)
}
