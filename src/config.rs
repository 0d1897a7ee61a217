//! Workbench configuration

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::relayer_config::RelayerNetwork;
use crate::steps::{GasPolicy, StepSettings, DEFAULT_MIN_TELEPORTER_VERSION};

/// Workbench configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file with the chain directory
    pub chain_directory_file: PathBuf,
    /// JSON file with the saved workbench session
    pub session_file: PathBuf,

    /// Relayer network override; derived from the hub chain when unset
    pub relayer_network: Option<RelayerNetwork>,
    /// Where the relayer config is written; stdout when unset
    pub relayer_config_out: Option<PathBuf>,

    /// Delay before reading registration state back, in milliseconds
    pub status_poll_delay_ms: u64,
    /// Receipt wait limit in seconds
    pub receipt_timeout_secs: u64,
    /// Base for explicit gas limits after an increase-gas recovery
    pub base_gas_limit: u64,
}

impl Config {
    /// Load configuration from `.env` and the environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        Self::from_env()
    }

    /// Load configuration from the environment only
    pub fn from_env() -> Result<Self> {
        let relayer_network = match env::var("RELAYER_NETWORK") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.parse::<RelayerNetwork>()
                    .map_err(|e| eyre!("Invalid RELAYER_NETWORK: {}", e))?,
            ),
            _ => None,
        };

        Ok(Self {
            chain_directory_file: env::var("CHAIN_DIRECTORY_FILE")
                .map_err(|_| eyre!("CHAIN_DIRECTORY_FILE required"))?
                .into(),
            session_file: env::var("WORKBENCH_SESSION_FILE")
                .map_err(|_| eyre!("WORKBENCH_SESSION_FILE required"))?
                .into(),

            relayer_network,
            relayer_config_out: env::var("RELAYER_CONFIG_OUT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),

            status_poll_delay_ms: parse_or("STATUS_POLL_DELAY_MS", 5000)?,
            receipt_timeout_secs: parse_or("RECEIPT_TIMEOUT_SECS", 120)?,
            base_gas_limit: parse_or("BASE_GAS_LIMIT", 3_000_000)?,
        })
    }

    /// Step runner settings derived from this configuration
    pub fn step_settings(&self) -> StepSettings {
        StepSettings {
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
            status_poll_delay: Duration::from_millis(self.status_poll_delay_ms),
            gas: GasPolicy {
                base_gas_limit: self.base_gas_limit,
                ..GasPolicy::default()
            },
            min_teleporter_version: DEFAULT_MIN_TELEPORTER_VERSION,
        }
    }
}

/// Optional numeric variable; present but malformed is an error
fn parse_or(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .wrap_err_with(|| format!("Invalid {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
