mod config;
mod logging;
mod metrics;

use clap::{Args, Parser};
use config::Config;
use intake::notifier::TelegramNotifier;
use shared::admin_service::{AdminService, Readiness};
use shared::http::run_http_service;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use telegram::BotClient;
use telegram::gate::AccessGate;

#[derive(Parser)]
#[command(about = "Relays website order form submissions to a Telegram chat")]
enum CliCommand {
    /// Start the relay
    Run(ConfigArgs),
    /// Load and validate the configuration, then exit
    ValidateConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// YAML config file. Environment variables override its values.
    #[arg(long)]
    config_file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Telegram(#[from] telegram::TelegramError),
}

fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = CliCommand::parse();

    match cli {
        CliCommand::Run(args) => {
            let config = load_config(&args);
            let _sentry = logging::init(config.common.logging.as_ref());

            if let Some(metrics_config) = &config.common.metrics
                && let Err(e) = metrics::init(metrics_config)
            {
                tracing::error!(error = %e, "Failed to set up metrics");
                process::exit(1);
            }

            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start runtime");
                    process::exit(1);
                }
            };

            if let Err(e) = runtime.block_on(run(config)) {
                tracing::error!(error = %e, "Relay stopped");
                process::exit(1);
            }
        }
        CliCommand::ValidateConfig(args) => {
            load_config(&args);
            println!("Config is valid");
        }
    }
}

fn load_config(args: &ConfigArgs) -> Config {
    match Config::load(args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    }
}

async fn run(config: Config) -> Result<(), RelayError> {
    let readiness = Readiness::new();
    let client = BotClient::new(&config.telegram)?;

    match AccessGate::new(client.clone(), &config.telegram) {
        Some(gate) => {
            tracing::info!(
                users = config.telegram.authorized_users.len(),
                "Access gate enabled"
            );
            tokio::spawn(gate.run());
        }
        None => tracing::info!("Access gate disabled, no authorized users configured"),
    }

    tracing::info!(
        dir = %config.intake.uploads.dir.display(),
        max_files = config.intake.uploads.max_files,
        max_file_size = config.intake.uploads.max_file_size,
        "Storing uploads"
    );
    let notifier = Arc::new(TelegramNotifier::new(client, config.telegram.chat_id.clone()));
    let intake_task = intake::run(config.intake, notifier, readiness.clone());

    let admin_listener = config.admin_listener;
    let admin_task = async move {
        match admin_listener {
            Some(listener) => {
                run_http_service(
                    &listener.host,
                    listener.port,
                    AdminService::<RelayError>::new(readiness),
                )
                .await
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = intake_task => result?,
        result = admin_task => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
