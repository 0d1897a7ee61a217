//! Relayer configuration synthesis
//!
//! Derives the message relayer's config document from the current connection
//! set. The output is consumed by an external relayer process, so the JSON
//! field names below are fixed by that process and must not change.
//!
//! Every chain touched by a connection (plus the hub) is a destination. A
//! chain is also a source when it has at least one message contract: its
//! teleporter registry, or the home contract of a connection sourced on it.

use alloy::primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::directory::ChainDirectory;
use crate::types::{parse_address, BridgeConnection, Chain};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const TELEPORTER_MESSAGE_FORMAT: &str = "teleporter";
/// Written in place of the relayer's signing key; the operator fills it in
pub const ACCOUNT_PRIVATE_KEY_PLACEHOLDER: &str = "<private-key>";

const TESTNET_API_URL: &str = "https://api.avax-test.network";
const MAINNET_API_URL: &str = "https://api.avax.network";

/// Network whose P-Chain and Info APIs the relayer queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayerNetwork {
    #[default]
    Testnet,
    Mainnet,
}

impl RelayerNetwork {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            RelayerNetwork::Testnet => TESTNET_API_URL,
            RelayerNetwork::Mainnet => MAINNET_API_URL,
        }
    }

    /// Mainnet only when the hub is explicitly marked as not a testnet
    pub fn for_hub(hub: &Chain) -> Self {
        match hub.is_testnet {
            Some(false) => RelayerNetwork::Mainnet,
            _ => RelayerNetwork::Testnet,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayerNetwork::Testnet => "testnet",
            RelayerNetwork::Mainnet => "mainnet",
        }
    }
}

impl FromStr for RelayerNetwork {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "testnet" | "fuji" => Ok(RelayerNetwork::Testnet),
            "mainnet" => Ok(RelayerNetwork::Mainnet),
            other => Err(eyre!("Unknown relayer network: {} (expected testnet or mainnet)", other)),
        }
    }
}

impl fmt::Display for RelayerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Config Document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    #[serde(rename = "baseURL")]
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContractSettings {
    #[serde(rename = "reward-address")]
    pub reward_address: String,
}

/// Delivery settings for one message contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContractConfig {
    #[serde(rename = "messageFormat")]
    pub message_format: String,
    pub settings: MessageContractSettings,
}

impl MessageContractConfig {
    pub fn teleporter() -> Self {
        Self {
            message_format: TELEPORTER_MESSAGE_FORMAT.to_string(),
            settings: MessageContractSettings {
                reward_address: Address::ZERO.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBlockchain {
    #[serde(rename = "blockchainID")]
    pub blockchain_id: String,
    #[serde(rename = "rpcEndpoint")]
    pub rpc_endpoint: ApiEndpoint,
    #[serde(rename = "messageContracts")]
    pub message_contracts: BTreeMap<String, MessageContractConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationBlockchain {
    #[serde(rename = "blockchainID")]
    pub blockchain_id: String,
    #[serde(rename = "rpcEndpoint")]
    pub rpc_endpoint: ApiEndpoint,
    #[serde(rename = "accountPrivateKey")]
    pub account_private_key: String,
}

/// Relayer configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    #[serde(rename = "log-level")]
    pub log_level: String,
    #[serde(rename = "p-chain-api")]
    pub p_chain_api: ApiEndpoint,
    #[serde(rename = "info-api")]
    pub info_api: ApiEndpoint,
    #[serde(rename = "source-blockchains")]
    pub source_blockchains: Vec<SourceBlockchain>,
    #[serde(rename = "destination-blockchains")]
    pub destination_blockchains: Vec<DestinationBlockchain>,
}

impl RelayerConfig {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize relayer config: {}", e))
    }

    pub fn source(&self, blockchain_id: &str) -> Option<&SourceBlockchain> {
        self.source_blockchains
            .iter()
            .find(|s| s.blockchain_id == blockchain_id)
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// Strip one trailing `/rpc` from an RPC URL
pub fn rpc_base_url(rpc_url: &str) -> String {
    rpc_url.strip_suffix("/rpc").unwrap_or(rpc_url).to_string()
}

/// Checksummed form of a contract address, so differently cased spellings
/// share one `messageContracts` entry. Unparseable values are kept as given.
fn message_contract_key(address: &str) -> String {
    match parse_address(address) {
        Ok(parsed) => parsed.to_checksum(None),
        Err(reason) => {
            tracing::debug!(%reason, "Keeping unparsed message contract address");
            address.to_string()
        }
    }
}

/// Synthesize the relayer config, picking the API network from the hub
pub fn synthesize(
    connections: &[BridgeConnection],
    hub: &Chain,
    directory: &dyn ChainDirectory,
) -> RelayerConfig {
    synthesize_for_network(connections, hub, directory, RelayerNetwork::for_hub(hub))
}

/// Synthesize the relayer config for an explicit API network
pub fn synthesize_for_network(
    connections: &[BridgeConnection],
    hub: &Chain,
    directory: &dyn ChainDirectory,
    network: RelayerNetwork,
) -> RelayerConfig {
    // Hub first, then each connection's source and target, first occurrence wins
    let mut seen: HashSet<&str> = HashSet::new();
    let mut chain_ids: Vec<&str> = Vec::new();
    let candidates = std::iter::once(hub.id.as_str()).chain(
        connections
            .iter()
            .flat_map(|c| [c.source_chain_id.as_str(), c.target_chain_id.as_str()]),
    );
    for id in candidates {
        if seen.insert(id) {
            chain_ids.push(id);
        }
    }

    let mut source_blockchains = Vec::new();
    let mut destination_blockchains = Vec::new();

    for chain_id in chain_ids {
        let chain = match directory.get_chain_by_id(chain_id) {
            Some(chain) => chain,
            None => {
                tracing::debug!(chain = %chain_id, "Skipping chain missing from directory");
                continue;
            }
        };
        let base_url = rpc_base_url(&chain.rpc_url);

        let mut message_contracts = BTreeMap::new();
        if let Some(registry) = &chain.teleporter_registry_address {
            message_contracts.insert(
                message_contract_key(registry),
                MessageContractConfig::teleporter(),
            );
        }
        for connection in connections.iter().filter(|c| c.source_chain_id == chain.id) {
            if let Some(home) = &connection.contracts.home_address {
                message_contracts.insert(message_contract_key(home), MessageContractConfig::teleporter());
            }
        }

        if !message_contracts.is_empty() {
            source_blockchains.push(SourceBlockchain {
                blockchain_id: chain.id.clone(),
                rpc_endpoint: ApiEndpoint {
                    base_url: base_url.clone(),
                },
                message_contracts,
            });
        }

        destination_blockchains.push(DestinationBlockchain {
            blockchain_id: chain.id.clone(),
            rpc_endpoint: ApiEndpoint { base_url },
            account_private_key: ACCOUNT_PRIVATE_KEY_PLACEHOLDER.to_string(),
        });
    }

    let api = network.api_base_url().to_string();
    RelayerConfig {
        log_level: DEFAULT_LOG_LEVEL.to_string(),
        p_chain_api: ApiEndpoint {
            base_url: api.clone(),
        },
        info_api: ApiEndpoint { base_url: api },
        source_blockchains,
        destination_blockchains,
    }
}
