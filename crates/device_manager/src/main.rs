mod config;
mod console;
mod prompt;

use common::domain::RecordStore;
use common::memory::InMemoryRecordStore;
use common::postgres::{PostgresClient, PostgresRecordStore};
use common::telemetry::{init_telemetry, TelemetryConfig};
use crate::config::{ServiceConfig, StoreBackend};
use crate::console::Console;
use crate::prompt::{PromptConfirmer, SharedLines};
use registry::{AutoConfirm, Confirmer, Workbench};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "device-manager".to_string(),
        log_level: config.log_level.clone(),
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(backend = %config.store_backend, "Starting device-manager");
    debug!("Configuration: {:?}", config);

    let store = match create_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize record store: {:#}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let input: SharedLines<BufReader<tokio::io::Stdin>> =
        Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let confirmer: Arc<dyn Confirmer> = if config.assume_yes {
        Arc::new(AutoConfirm::yes())
    } else {
        Arc::new(PromptConfirmer::new(input.clone(), shutdown.clone()))
    };

    let mut workbench = Workbench::new(store, confirmer);
    workbench.start().await;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_token.cancel();
            }
            Err(err) => {
                error!("Error setting up signal handler: {}", err);
            }
        }
    });

    let mut console = Console::new(workbench, std::io::stdout());
    if let Err(e) = console.run(input, shutdown).await {
        error!("Console failed: {:#}", e);
        std::process::exit(1);
    }

    info!("device-manager stopped");
}

async fn create_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.backend()? {
        StoreBackend::Memory => {
            info!("Using in-memory record store");
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
        StoreBackend::Postgres => {
            info!("Initializing PostgreSQL...");
            let client = PostgresClient::new(&config.postgres_config())?;
            client.ping().await?;
            if config.postgres_apply_schema {
                client.apply_schema().await?;
            }
            Ok(Arc::new(PostgresRecordStore::new(client)))
        }
    }
}
