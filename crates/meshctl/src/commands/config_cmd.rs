//! Config subcommand handlers.

use dialoguer::Input;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Helpers ─────────────────────────────────────────────────────────

fn to_toml(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(cfg)
        .map_err(|e| CliError::Internal(format!("cannot render config: {e}")))
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Both translations must succeed before a config is written.
fn check(cfg: &Config) -> Result<(), CliError> {
    meshctl_config::to_controller_config(cfg)?;
    meshctl_config::to_simulation_profile(cfg)?;
    Ok(())
}

/// Replace the leaf at a dot-separated `key`, parsing `raw` as the type
/// the existing value has.
fn set_key(cfg: &Config, key: &str, raw: &str) -> Result<Config, CliError> {
    let unknown = || CliError::Validation {
        field: key.into(),
        reason: "unknown config key; run `meshctl config show` for the valid keys".into(),
    };

    let mut root = toml::Value::try_from(cfg)
        .map_err(|e| CliError::Internal(format!("cannot render config: {e}")))?;

    let mut slot = &mut root;
    for part in key.split('.') {
        slot = slot
            .as_table_mut()
            .and_then(|table| table.get_mut(part))
            .ok_or_else(unknown)?;
    }

    let bad = |expected: &str| CliError::Validation {
        field: key.into(),
        reason: format!("expected {expected}, got '{raw}'"),
    };
    let replacement = match &*slot {
        toml::Value::Integer(_) => {
            toml::Value::Integer(raw.parse().map_err(|_| bad("an integer"))?)
        }
        toml::Value::Boolean(_) => {
            toml::Value::Boolean(raw.parse().map_err(|_| bad("true or false"))?)
        }
        toml::Value::String(_) => toml::Value::String(raw.to_owned()),
        _ => {
            return Err(CliError::Validation {
                field: key.into(),
                reason: "only scalar values can be set; edit the file for lists and tables"
                    .into(),
            });
        }
    };
    *slot = replacement;

    root.try_into().map_err(|e| CliError::Validation {
        field: key.into(),
        reason: e.to_string(),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::active_path(global);

    match args.command {
        // ── Init: guided setup ──────────────────────────────────────
        ConfigCommand::Init => {
            if path.exists()
                && !util::confirm(
                    &format!("Overwrite {}?", path.display()),
                    "config init",
                    global.yes,
                )?
            {
                return Ok(());
            }

            eprintln!("meshctl configuration");
            eprintln!("   Config path: {}\n", path.display());

            let mut cfg = Config::default();
            cfg.controller.name = Input::new()
                .with_prompt("Controller name (stamped on readings)")
                .default(cfg.controller.name.clone())
                .interact_text()
                .map_err(prompt_err)?;
            cfg.controller.device = Input::new()
                .with_prompt("Controller device")
                .default(cfg.controller.device.clone())
                .interact_text()
                .map_err(prompt_err)?;
            cfg.timeouts.operation_secs = Input::new()
                .with_prompt("Inclusion/exclusion timeout (seconds)")
                .default(cfg.timeouts.operation_secs)
                .interact_text()
                .map_err(prompt_err)?;

            check(&cfg)?;
            config::save_to(&cfg, &path)?;

            eprintln!("\n✓ Configuration written to {}", path.display());
            eprintln!("\n  Try it: meshctl nodes list");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let rendered = to_toml(&cfg)?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |_| rendered.trim_end().to_owned(),
                |_| path.display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let cfg = meshctl_config::load_file(&path)?;
            let updated = set_key(&cfg, &key, &value)?;
            check(&updated)?;
            config::save_to(&updated, &path)?;
            util::notice(global, &format!("✓ Set {key} = {value}"));
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_key_keeps_the_existing_type() {
        let cfg = Config::default();
        let updated = set_key(&cfg, "timeouts.operation_secs", "45").unwrap();
        assert_eq!(updated.timeouts.operation_secs, 45);

        let updated = set_key(&cfg, "controller.name", "Pi lab1").unwrap();
        assert_eq!(updated.controller.name, "Pi lab1");
    }

    #[test]
    fn set_key_rejects_unknown_and_mistyped() {
        let cfg = Config::default();
        assert!(matches!(
            set_key(&cfg, "timeouts.nope", "1"),
            Err(CliError::Validation { .. })
        ));
        assert!(matches!(
            set_key(&cfg, "log.file", "maybe"),
            Err(CliError::Validation { .. })
        ));
        assert!(matches!(
            set_key(&cfg, "simulation.nodes", "[]"),
            Err(CliError::Validation { .. })
        ));
    }
}
