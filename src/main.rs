//! Stepwise - stateless step-execution engine.
//!
//! Entry point for the `stepwise` CLI.

mod cli;
mod cmd_run;
mod cmd_session;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stepwise_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};

use crate::cli::{Cli, Commands};
use crate::error::{CliError, EXIT_OK};

/// Initialise console and daily rolling file logging.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = logging.dir_path();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("stepwise")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), CliError> {
    let validation = ConfigValidator::validate(config);
    for warning in &validation.warnings {
        warn!("Config warning at {}: {}", warning.path, warning.message);
    }
    if !validation.is_valid() {
        let errors: Vec<String> = validation.errors.iter().map(|e| format!("  {e}")).collect();
        return Err(CliError::Validation(errors.join("\n")));
    }
    Ok(())
}

/// Cancel `token` on the first Ctrl-C.
fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current attempt");
            token.cancel();
        }
    });
}

async fn dispatch(cli: Cli, config: Config) -> Result<(), CliError> {
    match cli.command {
        Commands::Run {
            workflow,
            run_id,
            system,
        } => {
            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());
            cmd_run::handle_run(&config, &workflow, run_id, system, cancel).await
        }
        Commands::Status { run_id, workflow } => {
            cmd_session::handle_status(&config, &run_id, &workflow).await
        }
        Commands::Reset { run_id, workflow } => {
            cmd_session::handle_reset(&config, &run_id, &workflow).await
        }
        Commands::Compact { run_id, drop } => {
            cmd_session::handle_compact(&config, &run_id, drop).await
        }
        Commands::Inspect { run_id } => cmd_session::handle_inspect(&config, &run_id).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ConfigLoader::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            let err = CliError::from(err);
            eprintln!("Error: {err}");
            return err.exit_code();
        }
    };

    if let Err(err) = init_tracing(&config.logging) {
        eprintln!("Warning: logging setup failed: {err}");
    }
    info!("Stepwise v{}", env!("CARGO_PKG_VERSION"));

    let result = match validate_config(&config) {
        Ok(()) => dispatch(cli, config).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    }
}
