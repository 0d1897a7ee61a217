//! ICTT Workbench
//!
//! Loads a saved workbench session against the chain directory, reports where
//! each bridge connection stands and writes the relayer config for the
//! current connection set.
//!
//! # Configuration
//!
//! - `CHAIN_DIRECTORY_FILE` - JSON chain list (required)
//! - `WORKBENCH_SESSION_FILE` - saved session snapshot (required)
//! - `RELAYER_NETWORK` - `testnet` or `mainnet`, derived from the hub when unset
//! - `RELAYER_CONFIG_OUT` - output path, stdout when unset
//! - `LOG_FORMAT=json` - JSON log lines

use eyre::{eyre, WrapErr};
use ictt_workbench::config::Config;
use ictt_workbench::directory::{ChainDirectory, StaticChainDirectory};
use ictt_workbench::progress::{progress_percent, step_index_for_status, WorkbenchStep};
use ictt_workbench::relayer_config::{synthesize_for_network, RelayerNetwork};
use ictt_workbench::store::{ConnectionStore, WorkbenchSnapshot};
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting ICTT Workbench");

    let config = Config::load()?;
    info!(
        directory = %config.chain_directory_file.display(),
        session = %config.session_file.display(),
        "Configuration loaded"
    );

    let directory: Arc<dyn ChainDirectory> =
        Arc::new(StaticChainDirectory::from_json_file(&config.chain_directory_file)?);

    let raw = std::fs::read_to_string(&config.session_file)
        .wrap_err_with(|| format!("Failed to read session from {}", config.session_file.display()))?;
    let snapshot: WorkbenchSnapshot =
        serde_json::from_str(&raw).map_err(|e| eyre!("Failed to parse session: {}", e))?;

    let store = ConnectionStore::restore(directory.clone(), snapshot)?.into_shared();
    let store = store.read().await;

    for connection in store.connections() {
        let step = WorkbenchStep::from_index(step_index_for_status(connection.status))
            .ok_or_else(|| eyre!("No step for status {}", connection.status))?;
        info!(
            id = %connection.id,
            target = %connection.target_chain_id,
            token = %connection.token.symbol,
            token_type = %connection.token_type.as_str(),
            status = %connection.status,
            step = %step,
            progress = progress_percent(connection.status),
            "Connection"
        );
    }

    let hub = store
        .hub_chain()
        .ok_or_else(|| eyre!("Hub chain {} missing from directory", store.hub_chain_id()))?;
    let network = config
        .relayer_network
        .unwrap_or_else(|| RelayerNetwork::for_hub(hub));
    if hub.is_testnet.is_none() && config.relayer_network.is_none() {
        warn!(hub = %hub.id, "Hub does not declare its network, assuming testnet");
    }

    let relayer_config = synthesize_for_network(store.connections(), hub, directory.as_ref(), network);
    let json = relayer_config.to_json_pretty()?;

    match &config.relayer_config_out {
        Some(path) => {
            std::fs::write(path, json)
                .wrap_err_with(|| format!("Failed to write relayer config to {}", path.display()))?;
            info!(
                path = %path.display(),
                network = %network,
                sources = relayer_config.source_blockchains.len(),
                destinations = relayer_config.destination_blockchains.len(),
                "Relayer config written"
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ictt_workbench=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so the relayer config can be piped from stdout
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}
