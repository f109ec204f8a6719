mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use meshctl_core::{Controller, MeshDriver, SimulatedDriver};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config errors surface from `run`; logging falls back to defaults.
    let cfg = config::load(&cli.global);
    let _guard = init_tracing(cli.global.verbose, cfg.as_ref().ok());

    if let Err(err) = run(cli, cfg).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Stderr logging filtered by `RUST_LOG`, then `-v`, then `log.level`.
/// With `log.file` set, also writes a daily-rotated file.
fn init_tracing(verbosity: u8, cfg: Option<&Config>) -> Option<WorkerGuard> {
    let default_level = cfg.map_or("warn", |c| c.log.level.as_str());
    let level = match verbosity {
        0 => default_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbosity == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let (file_layer, guard) = match cfg.filter(|c| c.log.file) {
        Some(c) => {
            let dir = c.log_directory();
            if let Err(e) = std::fs::create_dir_all(&dir) {
                eprintln!("warning: cannot create log directory {}: {e}", dir.display());
                (None, None)
            } else {
                let appender = tracing_appender::rolling::daily(dir, "meshctl.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true);
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    guard
}

async fn run(cli: Cli, cfg: Result<Config, CliError>) -> Result<(), CliError> {
    match cli.command {
        // Config commands work without a network.
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "meshctl", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = cfg?;
            let controller_config = config::resolve(&cfg, &cli.global)?;
            let driver: Arc<dyn MeshDriver> =
                Arc::new(SimulatedDriver::new(config::simulation(&cfg)?));
            let global = &cli.global;

            tracing::debug!(command = ?cmd, device = %cfg.controller.device, "dispatching command");
            Controller::oneshot(controller_config, driver, |controller, outcome| async move {
                commands::dispatch(cmd, &controller, outcome, global).await
            })
            .await
        }
    }
}
