//! Transaction port
//!
//! The wallet/RPC client the step runner signs and submits through. The
//! workbench never talks to a chain directly; every failure coming back
//! through this port is normalized into a [`RawFailure`] and classified by
//! [`crate::classifier`].

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::fmt;

use crate::types::Chain;

/// Failure reported by the transaction port, reduced to its message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFailure {
    pub message: String,
    /// Hash of the transaction that failed, when it got that far
    pub tx_hash: Option<B256>,
}

impl RawFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tx_hash: None,
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    /// Normalize any error value by its display message
    pub fn from_error<E: fmt::Display + ?Sized>(error: &E) -> Self {
        Self::new(error.to_string())
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<eyre::Report> for RawFailure {
    fn from(report: eyre::Report) -> Self {
        Self::new(format!("{:#}", report))
    }
}

impl From<String> for RawFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for RawFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Contract creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Creation bytecode
    pub bytecode: Bytes,
    /// ABI-encoded constructor arguments, appended to the bytecode
    pub constructor_args: Bytes,
    /// Explicit gas limit; `None` lets the wallet estimate
    pub gas_limit: Option<u64>,
}

impl DeployRequest {
    /// Bytecode followed by the constructor arguments
    pub fn init_code(&self) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + self.constructor_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(&self.constructor_args);
        code.into()
    }
}

/// Contract call request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub to: Address,
    pub calldata: Bytes,
    pub value: U256,
    pub gas_limit: Option<u64>,
}

/// Handle to a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHandle {
    pub tx_hash: B256,
}

/// Settled transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub success: bool,
    /// Address of the contract created by a deployment
    pub contract_address: Option<Address>,
}

/// Signing and submission boundary
#[async_trait]
pub trait TransactionPort: Send + Sync {
    /// Account that signs the transactions
    fn account(&self) -> Address;

    /// Point the wallet at `chain`
    async fn switch_network(&self, chain: &Chain) -> Result<(), RawFailure>;

    async fn deploy_contract(
        &self,
        chain: &Chain,
        request: DeployRequest,
    ) -> Result<TxHandle, RawFailure>;

    async fn send_transaction(
        &self,
        chain: &Chain,
        request: CallRequest,
    ) -> Result<TxHandle, RawFailure>;

    async fn wait_for_receipt(
        &self,
        chain: &Chain,
        handle: &TxHandle,
    ) -> Result<TxReceipt, RawFailure>;

    /// `eth_call` against `to`, returning the raw return data
    async fn read_contract(
        &self,
        chain: &Chain,
        to: Address,
        calldata: Bytes,
    ) -> Result<Bytes, RawFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_code_appends_args() {
        let request = DeployRequest {
            bytecode: Bytes::from(vec![0x60, 0x80]),
            constructor_args: Bytes::from(vec![0x01, 0x02]),
            gas_limit: None,
        };
        assert_eq!(request.init_code().to_vec(), vec![0x60, 0x80, 0x01, 0x02]);
    }

    #[test]
    fn test_raw_failure_from_report() {
        let failure = RawFailure::from(eyre::eyre!("execution reverted"));
        assert_eq!(failure.message, "execution reverted");
        assert!(failure.tx_hash.is_none());
    }

    #[test]
    fn test_raw_failure_with_tx_hash() {
        let failure = RawFailure::new("boom").with_tx_hash(B256::repeat_byte(0xab));
        assert_eq!(failure.tx_hash, Some(B256::repeat_byte(0xab)));
        assert_eq!(failure.to_string(), "boom");
    }
}
