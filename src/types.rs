//! Core types for bridge connections
//!
//! Chains, tokens, and the connection records tracked by the workbench.
//! Everything here serializes with the field names the console uses for its
//! chain list and saved sessions.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimals assumed for a chain's native gas token
pub const NATIVE_TOKEN_DECIMALS: u8 = 18;

// ============================================================================
// Chains and Tokens
// ============================================================================

/// A chain known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    /// Opaque chain identifier (the Avalanche blockchain ID)
    pub id: String,
    pub name: String,
    pub rpc_url: String,
    /// Native EVM chain ID
    pub evm_chain_id: u64,
    /// Symbol of the native gas token
    pub coin_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, rename = "wellKnownERC20s")]
    pub well_known_erc20s: Vec<TokenDescriptor>,
    /// TeleporterRegistry contract deployed on this chain, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teleporter_registry_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_testnet: Option<bool>,
}

/// A token that can be bridged
///
/// A token without an address is the chain's native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

fn default_decimals() -> u8 {
    NATIVE_TOKEN_DECIMALS
}

impl TokenDescriptor {
    /// Descriptor for a chain's native gas token
    pub fn native(chain: &Chain) -> Self {
        Self {
            address: None,
            name: chain.coin_name.clone(),
            symbol: chain.coin_name.clone(),
            decimals: NATIVE_TOKEN_DECIMALS,
            logo_url: chain.logo_url.clone(),
        }
    }

    /// Create an ERC20 descriptor
    pub fn erc20(address: &str, name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            address: Some(address.to_string()),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            logo_url: None,
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_none()
    }

    /// Check the user-supplied fields before anything is deployed
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("token name is empty".to_string());
        }
        if self.symbol.trim().is_empty() {
            return Err("token symbol is empty".to_string());
        }
        if let Some(address) = &self.address {
            parse_address(address)?;
        }
        Ok(())
    }
}

/// Parse a 0x-prefixed EVM address
pub fn parse_address(value: &str) -> Result<Address, String> {
    if !value.starts_with("0x") || value.len() != 42 {
        return Err(format!(
            "invalid address {} (expected 0x-prefixed 42-char hex)",
            value
        ));
    }
    Address::from_str(value).map_err(|e| format!("invalid address {}: {}", value, e))
}

// ============================================================================
// Token Type
// ============================================================================

/// Representation of the token on each side of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "erc20-to-erc20")]
    Erc20ToErc20,
    #[serde(rename = "erc20-to-native")]
    Erc20ToNative,
    #[serde(rename = "native-to-erc20")]
    NativeToErc20,
    #[serde(rename = "native-to-native")]
    NativeToNative,
}

impl TokenType {
    pub const ALL: [TokenType; 4] = [
        TokenType::Erc20ToErc20,
        TokenType::Erc20ToNative,
        TokenType::NativeToErc20,
        TokenType::NativeToNative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Erc20ToErc20 => "erc20-to-erc20",
            TokenType::Erc20ToNative => "erc20-to-native",
            TokenType::NativeToErc20 => "native-to-erc20",
            TokenType::NativeToNative => "native-to-native",
        }
    }

    /// Whether the home side bridges the chain's native asset
    pub fn source_is_native(&self) -> bool {
        matches!(self, TokenType::NativeToErc20 | TokenType::NativeToNative)
    }

    /// Whether the remote side mints the destination chain's native asset
    pub fn remote_is_native(&self) -> bool {
        matches!(self, TokenType::Erc20ToNative | TokenType::NativeToNative)
    }

    /// Token types whose source half matches the token
    pub fn compatible_with(token: &TokenDescriptor) -> Vec<TokenType> {
        Self::ALL
            .into_iter()
            .filter(|t| t.source_is_native() == token.is_native())
            .collect()
    }

    /// Check that the source half of the type matches the token.
    ///
    /// `erc20-*` needs a token address, `native-*` needs none.
    pub fn check_token(&self, token: &TokenDescriptor) -> Result<(), String> {
        match (self.source_is_native(), token.is_native()) {
            (true, false) => Err(format!(
                "{} requires the native token, but {} has an address",
                self, token.symbol
            )),
            (false, true) => Err(format!(
                "{} requires an ERC20 token address, but {} is native",
                self, token.symbol
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Connection Status
// ============================================================================

/// Deployment progress of a bridge connection
///
/// Variant order is the lifecycle order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    #[default]
    NotStarted,
    HomeDeployed,
    RemoteDeployed,
    Registered,
    Collateralized,
    Live,
}

impl ConnectionStatus {
    /// All statuses in lifecycle order
    pub const ALL: [ConnectionStatus; 6] = [
        ConnectionStatus::NotStarted,
        ConnectionStatus::HomeDeployed,
        ConnectionStatus::RemoteDeployed,
        ConnectionStatus::Registered,
        ConnectionStatus::Collateralized,
        ConnectionStatus::Live,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::NotStarted => "not-started",
            ConnectionStatus::HomeDeployed => "home-deployed",
            ConnectionStatus::RemoteDeployed => "remote-deployed",
            ConnectionStatus::Registered => "registered",
            ConnectionStatus::Collateralized => "collateralized",
            ConnectionStatus::Live => "live",
        }
    }

    /// Position in the lifecycle (0 for not-started, 5 for live)
    pub fn position(&self) -> usize {
        *self as usize
    }

    pub fn is_terminal(&self) -> bool {
        *self == ConnectionStatus::Live
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Connections
// ============================================================================

/// Stable identifier of a bridge connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        ConnectionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        ConnectionId(id.to_string())
    }
}

/// Bridge contracts deployed so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
}

impl ContractAddresses {
    /// Merge set fields from `update`. A set field is never cleared.
    pub fn merge(&mut self, update: ContractAddresses) {
        if let Some(home) = update.home_address {
            self.home_address = Some(home);
        }
        if let Some(remote) = update.remote_address {
            self.remote_address = Some(remote);
        }
    }

    /// First field of `update` that would replace a different recorded address
    pub fn conflict_with(&self, update: &ContractAddresses) -> Option<&'static str> {
        fn differs(current: &Option<String>, next: &Option<String>) -> bool {
            matches!((current, next), (Some(a), Some(b)) if !a.eq_ignore_ascii_case(b))
        }

        if differs(&self.home_address, &update.home_address) {
            Some("home")
        } else if differs(&self.remote_address, &update.remote_address) {
            Some("remote")
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.home_address.is_none() && self.remote_address.is_none()
    }
}

/// A token bridge between the hub chain and one target chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConnection {
    pub id: ConnectionId,
    pub source_chain_id: String,
    pub target_chain_id: String,
    pub token: TokenDescriptor,
    pub token_type: TokenType,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub contracts: ContractAddresses,
}

/// Wizard step of a pending connection draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PendingStep {
    #[default]
    SelectToken,
    SelectType,
    Confirm,
}

/// Draft of a connection being configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConnection {
    pub source_chain_id: String,
    pub target_chain_id: String,
    pub step: PendingStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
}

/// Partial update merged into the pending draft
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingUpdate {
    pub step: Option<PendingStep>,
    pub token: Option<TokenDescriptor>,
    pub token_type: Option<TokenType>,
}

impl PendingUpdate {
    pub fn step(step: PendingStep) -> Self {
        Self {
            step: Some(step),
            ..Default::default()
        }
    }

    pub fn token(token: TokenDescriptor) -> Self {
        Self {
            token: Some(token),
            ..Default::default()
        }
    }

    pub fn token_type(token_type: TokenType) -> Self {
        Self {
            token_type: Some(token_type),
            ..Default::default()
        }
    }
}

/// Partial update merged into a connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub status: Option<ConnectionStatus>,
    pub contracts: Option<ContractAddresses>,
}

impl ConnectionUpdate {
    pub fn status(status: ConnectionStatus) -> Self {
        Self {
            status: Some(status),
            contracts: None,
        }
    }

    /// Status forward to home-deployed together with the home address
    pub fn home_deployed(home_address: impl Into<String>) -> Self {
        Self {
            status: Some(ConnectionStatus::HomeDeployed),
            contracts: Some(ContractAddresses {
                home_address: Some(home_address.into()),
                remote_address: None,
            }),
        }
    }

    /// Status forward to remote-deployed together with the remote address
    pub fn remote_deployed(remote_address: impl Into<String>) -> Self {
        Self {
            status: Some(ConnectionStatus::RemoteDeployed),
            contracts: Some(ContractAddresses {
                home_address: None,
                remote_address: Some(remote_address.into()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ADDR: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn test_status_order_matches_lifecycle() {
        for pair in ConnectionStatus::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(ConnectionStatus::Live.position(), 5);
        assert!(ConnectionStatus::Live.is_terminal());
        assert!(!ConnectionStatus::Collateralized.is_terminal());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&ConnectionStatus::RemoteDeployed).unwrap();
        assert_eq!(json, "\"remote-deployed\"");
        let parsed: ConnectionStatus = serde_json::from_str("\"not-started\"").unwrap();
        assert_eq!(parsed, ConnectionStatus::NotStarted);
    }

    #[test]
    fn test_token_type_serde_names() {
        for token_type in TokenType::ALL {
            let json = serde_json::to_string(&token_type).unwrap();
            assert_eq!(json, format!("\"{}\"", token_type.as_str()));
        }
    }

    #[test]
    fn test_token_type_check_token() {
        let erc20 = TokenDescriptor::erc20(TOKEN_ADDR, "Test", "TST", 18);
        let native = TokenDescriptor {
            address: None,
            name: "Avalanche".into(),
            symbol: "AVAX".into(),
            decimals: 18,
            logo_url: None,
        };

        assert!(TokenType::Erc20ToNative.check_token(&erc20).is_ok());
        assert!(TokenType::NativeToErc20.check_token(&erc20).is_err());
        assert!(TokenType::NativeToNative.check_token(&native).is_ok());
        assert!(TokenType::Erc20ToErc20.check_token(&native).is_err());
    }

    #[test]
    fn test_compatible_token_types() {
        let erc20 = TokenDescriptor::erc20(TOKEN_ADDR, "Test", "TST", 6);
        assert_eq!(
            TokenType::compatible_with(&erc20),
            vec![TokenType::Erc20ToErc20, TokenType::Erc20ToNative]
        );
    }

    #[test]
    fn test_native_descriptor_defaults() {
        let chain = Chain {
            id: "C".into(),
            name: "C-Chain".into(),
            rpc_url: "https://api.avax-test.network/ext/bc/C/rpc".into(),
            evm_chain_id: 43113,
            coin_name: "AVAX".into(),
            explorer_url: None,
            logo_url: None,
            well_known_erc20s: vec![],
            teleporter_registry_address: None,
            is_testnet: Some(true),
        };
        let token = TokenDescriptor::native(&chain);
        assert!(token.is_native());
        assert_eq!(token.decimals, NATIVE_TOKEN_DECIMALS);
        assert_eq!(token.symbol, "AVAX");
    }

    #[test]
    fn test_token_decimals_default_when_missing() {
        let token: TokenDescriptor =
            serde_json::from_str(r#"{"name":"Avalanche","symbol":"AVAX"}"#).unwrap();
        assert_eq!(token.decimals, 18);
        assert!(token.is_native());
    }

    #[test]
    fn test_token_validate() {
        assert!(TokenDescriptor::erc20(TOKEN_ADDR, "Test", "TST", 18)
            .validate()
            .is_ok());
        assert!(TokenDescriptor::erc20("0xdead", "Test", "TST", 18)
            .validate()
            .is_err());
        assert!(TokenDescriptor::erc20(TOKEN_ADDR, " ", "TST", 18)
            .validate()
            .is_err());
    }

    #[test]
    fn test_contract_merge_never_clears() {
        let mut contracts = ContractAddresses {
            home_address: Some("0xHOME".into()),
            remote_address: None,
        };
        contracts.merge(ContractAddresses {
            home_address: None,
            remote_address: Some("0xREMOTE".into()),
        });
        assert_eq!(contracts.home_address.as_deref(), Some("0xHOME"));
        assert_eq!(contracts.remote_address.as_deref(), Some("0xREMOTE"));

        contracts.merge(ContractAddresses::default());
        assert!(!contracts.is_empty());
        assert_eq!(contracts.home_address.as_deref(), Some("0xHOME"));
    }

    #[test]
    fn test_contract_conflict_with() {
        let contracts = ContractAddresses {
            home_address: Some("0xABCD".into()),
            remote_address: None,
        };
        let home = |addr: &str| ContractAddresses {
            home_address: Some(addr.into()),
            remote_address: None,
        };
        let remote = ContractAddresses {
            home_address: None,
            remote_address: Some("0xREMOTE".into()),
        };

        assert_eq!(contracts.conflict_with(&home("0xabcd")), None);
        assert_eq!(contracts.conflict_with(&home("0x1234")), Some("home"));
        assert_eq!(contracts.conflict_with(&remote), None);
        assert_eq!(contracts.conflict_with(&ContractAddresses::default()), None);
    }
}
