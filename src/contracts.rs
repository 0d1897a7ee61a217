//! ICTT contract ABI definitions
//!
//! Uses alloy's sol! macro to generate the constructor and call encoders for
//! the token home/remote contracts. Creation bytecode is not bundled; callers
//! provide it through [`ContractArtifacts`].

#![allow(clippy::too_many_arguments)]

use alloy::primitives::{Bytes, B256};
use alloy::sol;
use eyre::{eyre, Result};
use std::str::FromStr;

use crate::types::TokenType;

sol! {
    /// Home contract bridging an existing ERC20
    contract ERC20TokenHome {
        constructor(
            address teleporterRegistryAddress,
            address teleporterManager,
            uint256 minTeleporterVersion,
            address tokenAddress,
            uint8 tokenDecimals
        );

        function addCollateral(
            bytes32 remoteBlockchainID,
            address remoteTokenTransferrerAddress,
            uint256 amount
        ) external;
    }

    /// Home contract bridging the native asset through its wrapped token
    contract NativeTokenHome {
        constructor(
            address teleporterRegistryAddress,
            address teleporterManager,
            uint256 minTeleporterVersion,
            address wrappedTokenAddress
        );

        function addCollateral(
            bytes32 remoteBlockchainID,
            address remoteTokenTransferrerAddress
        ) external payable;
    }

    /// Read side shared by both home contracts
    contract ITokenHome {
        struct RemoteTokenTransferrerSettings {
            bool registered;
            uint256 collateralNeeded;
            uint256 tokenMultiplier;
            bool multiplyOnRemote;
        }

        function getRemoteTokenTransferrerSettings(
            bytes32 remoteBlockchainID,
            address remoteTokenTransferrerAddress
        ) external view returns (RemoteTokenTransferrerSettings memory);
    }

    /// Remote contract minting an ERC20 representation
    contract ERC20TokenRemote {
        struct TokenRemoteSettings {
            address teleporterRegistryAddress;
            address teleporterManager;
            uint256 minTeleporterVersion;
            bytes32 tokenHomeBlockchainID;
            address tokenHomeAddress;
            uint8 tokenHomeDecimals;
        }

        constructor(
            TokenRemoteSettings settings,
            string tokenName,
            string tokenSymbol,
            uint8 tokenDecimals
        );
    }

    /// Remote contract minting the destination chain's native asset
    contract NativeTokenRemote {
        struct TokenRemoteSettings {
            address teleporterRegistryAddress;
            address teleporterManager;
            uint256 minTeleporterVersion;
            bytes32 tokenHomeBlockchainID;
            address tokenHomeAddress;
            uint8 tokenHomeDecimals;
        }

        constructor(
            TokenRemoteSettings settings,
            string nativeAssetSymbol,
            uint256 initialReserveImbalance,
            uint256 burnedFeesReportingRewardPercentage
        );
    }

    /// Write/read side shared by both remote contracts
    contract ITokenRemote {
        struct TeleporterFeeInfo {
            address feeTokenAddress;
            uint256 amount;
        }

        function registerWithHome(TeleporterFeeInfo feeInfo) external;

        function isCollateralized() external view returns (bool);
    }

    /// Minimal ERC20 interface for collateral approval
    contract IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// Which contract a deployment step creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Erc20TokenHome,
    NativeTokenHome,
    Erc20TokenRemote,
    NativeTokenRemote,
}

impl ContractKind {
    pub fn home_for(token_type: TokenType) -> Self {
        if token_type.source_is_native() {
            ContractKind::NativeTokenHome
        } else {
            ContractKind::Erc20TokenHome
        }
    }

    pub fn remote_for(token_type: TokenType) -> Self {
        if token_type.remote_is_native() {
            ContractKind::NativeTokenRemote
        } else {
            ContractKind::Erc20TokenRemote
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::Erc20TokenHome => "ERC20TokenHome",
            ContractKind::NativeTokenHome => "NativeTokenHome",
            ContractKind::Erc20TokenRemote => "ERC20TokenRemote",
            ContractKind::NativeTokenRemote => "NativeTokenRemote",
        }
    }
}

/// Creation bytecode of the ICTT contracts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractArtifacts {
    pub erc20_token_home: Bytes,
    pub native_token_home: Bytes,
    pub erc20_token_remote: Bytes,
    pub native_token_remote: Bytes,
}

impl ContractArtifacts {
    pub fn bytecode(&self, kind: ContractKind) -> &Bytes {
        match kind {
            ContractKind::Erc20TokenHome => &self.erc20_token_home,
            ContractKind::NativeTokenHome => &self.native_token_home,
            ContractKind::Erc20TokenRemote => &self.erc20_token_remote,
            ContractKind::NativeTokenRemote => &self.native_token_remote,
        }
    }
}

/// Convert a chain identifier into the bytes32 blockchain ID used on-chain.
///
/// Accepts 0x-prefixed hex or CB58 (base58 payload followed by a 4-byte
/// checksum, which is not verified here).
pub fn blockchain_id_bytes(chain_id: &str) -> Result<B256> {
    if chain_id.starts_with("0x") {
        return B256::from_str(chain_id)
            .map_err(|e| eyre!("Invalid hex blockchain ID {}: {}", chain_id, e));
    }

    let decoded = bs58::decode(chain_id)
        .into_vec()
        .map_err(|e| eyre!("Invalid CB58 blockchain ID {}: {}", chain_id, e))?;
    if decoded.len() != 36 {
        return Err(eyre!(
            "CB58 blockchain ID {} must decode to 36 bytes, got {}",
            chain_id,
            decoded.len()
        ));
    }
    Ok(B256::from_slice(&decoded[..32]))
}
