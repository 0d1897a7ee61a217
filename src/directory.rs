//! Chain Directory
//!
//! Read-only lookup of the chains the workbench can bridge between. The
//! store and the relayer config synthesizer only see the [`ChainDirectory`]
//! trait; [`StaticChainDirectory`] is the in-memory implementation loaded from
//! the console's chain list.
//!
//! # Chain list format
//!
//! ```text
//! [
//!   {
//!     "id": "yH8D7ThNJkxmtkuv2jgBa4P1Rn3Qpr4pPr7QYNfcdoS6k6HWp",
//!     "name": "C-Chain",
//!     "rpcUrl": "https://api.avax-test.network/ext/bc/C/rpc",
//!     "evmChainId": 43113,
//!     "coinName": "AVAX",
//!     "teleporterRegistryAddress": "0xF86Cb19Ad8405AEFa7d09C778215D2Cb6eBfB228",
//!     "wellKnownERC20s": []
//!   }
//! ]
//! ```

use eyre::{eyre, Result, WrapErr};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::types::{parse_address, Chain, TokenDescriptor};

/// Validates that a URL uses http/https and has a host component.
pub fn validate_rpc_url(url_str: &str, name: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url_str).map_err(|e| eyre!("{} must be a valid URL: {}", name, e))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(eyre!(
            "{} must use http:// or https:// scheme, got {}",
            name,
            scheme
        ));
    }

    if parsed.host_str().is_none() {
        return Err(eyre!("{} must have a host component", name));
    }

    Ok(())
}

/// Read-only directory of known chains
pub trait ChainDirectory: Send + Sync {
    /// Look up a chain by its opaque identifier
    fn get_chain_by_id(&self, id: &str) -> Option<&Chain>;

    /// All chains, in directory order
    fn list_available_chains(&self) -> Vec<&Chain>;

    /// Well-known ERC20 tokens on a chain (empty for unknown chains)
    fn list_well_known_tokens(&self, chain_id: &str) -> Vec<TokenDescriptor> {
        self.get_chain_by_id(chain_id)
            .map(|c| c.well_known_erc20s.clone())
            .unwrap_or_default()
    }
}

/// In-memory chain directory
///
/// Holds the chain list with lookup by id or native EVM chain ID.
#[derive(Debug, Clone)]
pub struct StaticChainDirectory {
    chains: Vec<Chain>,
    /// Index by chain id → position in `chains`
    id_map: HashMap<String, usize>,
    /// Index by native EVM chain ID → position in `chains`
    evm_chain_id_map: HashMap<u64, usize>,
}

impl StaticChainDirectory {
    /// Create a directory from a list of chains, validating every record
    pub fn new(chains: Vec<Chain>) -> Result<Self> {
        let mut id_map = HashMap::new();
        let mut evm_chain_id_map = HashMap::new();

        for (idx, chain) in chains.iter().enumerate() {
            id_map.insert(chain.id.clone(), idx);
            evm_chain_id_map.insert(chain.evm_chain_id, idx);
        }

        let directory = Self {
            chains,
            id_map,
            evm_chain_id_map,
        };

        directory.validate()?;
        Ok(directory)
    }

    /// Load a JSON chain list from disk
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read chain list from {}", path.display()))?;
        Self::from_json_str(&raw)
            .wrap_err_with(|| format!("Invalid chain list in {}", path.display()))
    }

    /// Parse a JSON chain list
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let chains: Vec<Chain> =
            serde_json::from_str(raw).map_err(|e| eyre!("Failed to parse chain list: {}", e))?;
        Self::new(chains)
    }

    /// Get chain by native EVM chain ID
    pub fn get_chain_by_evm_id(&self, evm_chain_id: u64) -> Option<&Chain> {
        self.evm_chain_id_map
            .get(&evm_chain_id)
            .map(|&idx| &self.chains[idx])
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let mut seen_ids = HashSet::new();
        let mut seen_evm_ids = HashSet::new();

        for chain in &self.chains {
            if chain.id.trim().is_empty() {
                return Err(eyre!("Chain {} has an empty id", chain.name));
            }
            if chain.name.trim().is_empty() {
                return Err(eyre!("Chain {} has an empty name", chain.id));
            }
            if !seen_ids.insert(chain.id.as_str()) {
                return Err(eyre!("Duplicate chain id: {}", chain.id));
            }
            if !seen_evm_ids.insert(chain.evm_chain_id) {
                return Err(eyre!(
                    "Duplicate EVM chain ID: {} (chain: {})",
                    chain.evm_chain_id,
                    chain.name
                ));
            }

            validate_rpc_url(&chain.rpc_url, &format!("{} rpcUrl", chain.name))?;

            if let Some(registry) = &chain.teleporter_registry_address {
                parse_address(registry).map_err(|e| {
                    eyre!("Invalid teleporter registry for chain {}: {}", chain.name, e)
                })?;
            }

            if chain.rpc_url.starts_with("http://") {
                tracing::warn!(chain = %chain.name, "rpcUrl uses unencrypted http://");
            }
        }

        Ok(())
    }
}

impl ChainDirectory for StaticChainDirectory {
    fn get_chain_by_id(&self, id: &str) -> Option<&Chain> {
        self.id_map.get(id).map(|&idx| &self.chains[idx])
    }

    fn list_available_chains(&self) -> Vec<&Chain> {
        self.chains.iter().collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::types::TokenDescriptor;

    #[test]
    fn test_lookup_by_id() {
        let directory = make_directory();
        assert_eq!(directory.get_chain_by_id("dfk").unwrap().evm_chain_id, 779672);
        assert!(directory.get_chain_by_id("unknown").is_none());
    }

    #[test]
    fn test_lookup_by_evm_id() {
        let directory = make_directory();
        assert_eq!(directory.get_chain_by_evm_id(173750).unwrap().id, "echo");
        assert!(directory.get_chain_by_evm_id(1).is_none());
    }

    #[test]
    fn test_list_preserves_order() {
        let directory = make_directory();
        let ids: Vec<&str> = directory
            .list_available_chains()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["hub", "dfk", "echo"]);
    }

    #[test]
    fn test_well_known_tokens() {
        let mut hub = make_chain("hub", 43113);
        hub.well_known_erc20s = vec![TokenDescriptor::erc20(
            "0x5425890298aed601595a70AB815c96711a31Bc65",
            "USD Coin",
            "USDC",
            6,
        )];
        let directory = StaticChainDirectory::new(vec![hub]).unwrap();
        assert_eq!(directory.list_well_known_tokens("hub").len(), 1);
        assert!(directory.list_well_known_tokens("nope").is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = StaticChainDirectory::new(vec![make_chain("a", 1), make_chain("a", 2)]);
        assert!(result.unwrap_err().to_string().contains("Duplicate chain id"));
    }

    #[test]
    fn test_duplicate_evm_id_rejected() {
        let result = StaticChainDirectory::new(vec![make_chain("a", 1), make_chain("b", 1)]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate EVM chain ID"));
    }

    #[test]
    fn test_invalid_registry_rejected() {
        let mut chain = make_chain("a", 1);
        chain.teleporter_registry_address = Some("0x1234".to_string());
        assert!(StaticChainDirectory::new(vec![chain]).is_err());
    }

    #[test]
    fn test_from_json_str() {
        let raw = r#"[
            {
                "id": "C",
                "name": "C-Chain",
                "rpcUrl": "https://api.avax-test.network/ext/bc/C/rpc",
                "evmChainId": 43113,
                "coinName": "AVAX",
                "wellKnownERC20s": [
                    {"address": "0x5425890298aed601595a70AB815c96711a31Bc65", "name": "USD Coin", "symbol": "USDC", "decimals": 6}
                ]
            }
        ]"#;
        let directory = StaticChainDirectory::from_json_str(raw).unwrap();
        let chain = directory.get_chain_by_id("C").unwrap();
        assert_eq!(chain.coin_name, "AVAX");
        assert_eq!(chain.well_known_erc20s[0].decimals, 6);
        assert!(chain.teleporter_registry_address.is_none());
    }

    #[test]
    fn test_validate_rpc_url_rejects_ftp() {
        let err = validate_rpc_url("ftp://example.com", "TEST").unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
    }

    #[test]
    fn test_validate_rpc_url_rejects_invalid_url() {
        let err = validate_rpc_url("not-a-url", "TEST").unwrap_err();
        assert!(err.to_string().contains("valid URL"));
    }
}
