//! Deployment step orchestration
//!
//! Drives one connection through the four visible steps against a
//! [`TransactionPort`]. The store is only written after a transaction has
//! settled successfully, and always through forward-only updates, so a failed
//! or timed-out step leaves the connection exactly where it was.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolConstructor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::classifier::{classify, ClassifyContext, RecoveryAction, StepError, StepKind, SUPPORT_URL};
use crate::contracts::{
    blockchain_id_bytes, ContractArtifacts, ContractKind, ERC20TokenHome, ERC20TokenRemote,
    ITokenHome, ITokenRemote, NativeTokenHome, NativeTokenRemote, IERC20,
};
use crate::port::{CallRequest, DeployRequest, RawFailure, TransactionPort, TxHandle, TxReceipt};
use crate::progress::{is_step_complete, is_step_locked, WorkbenchStep};
use crate::store::{SharedStore, StoreError};
use crate::types::{
    parse_address, BridgeConnection, Chain, ConnectionId, ConnectionStatus, ConnectionUpdate,
};

/// Minimum Teleporter version accepted by newly deployed contracts
pub const DEFAULT_MIN_TELEPORTER_VERSION: u64 = 1;

// ============================================================================
// Settings
// ============================================================================

/// Explicit gas limits used after an increase-gas recovery
#[derive(Debug, Clone, PartialEq)]
pub struct GasPolicy {
    pub base_gas_limit: u64,
    /// Gas limit bump percentage per attempt
    pub gas_bump_percent: u32,
    /// Maximum multiplier over the base limit (e.g., 3 = 3x)
    pub max_gas_multiplier: f64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            base_gas_limit: 3_000_000,
            gas_bump_percent: 20,
            max_gas_multiplier: 3.0,
        }
    }
}

impl GasPolicy {
    /// Gas limit for a given attempt. Attempt 0 leaves estimation to the wallet.
    pub fn gas_limit_for_attempt(&self, attempt: u32) -> Option<u64> {
        if attempt == 0 {
            return None;
        }

        let multiplier = 1.0 + (self.gas_bump_percent as f64 / 100.0) * (attempt as f64);
        let capped_multiplier = multiplier.min(self.max_gas_multiplier);

        Some((self.base_gas_limit as f64 * capped_multiplier) as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepSettings {
    /// Hard limit on waiting for a receipt
    pub receipt_timeout: Duration,
    /// Delay before reading registration state back
    pub status_poll_delay: Duration,
    pub gas: GasPolicy,
    pub min_teleporter_version: u64,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_secs(120),
            status_poll_delay: Duration::from_millis(5000),
            gas: GasPolicy::default(),
            min_teleporter_version: DEFAULT_MIN_TELEPORTER_VERSION,
        }
    }
}

// ============================================================================
// Step Inputs and Results
// ============================================================================

/// User inputs for the home deployment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployHomeParams {
    /// Wrapped native token on the hub, required for native homes
    pub wrapped_native_token: Option<String>,
}

/// User inputs for the remote deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRemoteParams {
    /// ERC20 name, or unused for native remotes
    pub token_name: String,
    /// ERC20 symbol, or the native asset symbol for native remotes
    pub token_symbol: String,
    pub token_decimals: u8,
    /// Native remotes only; must be non-zero
    pub initial_reserve_imbalance: U256,
    /// Native remotes only; below 100
    pub burned_fees_reporting_reward_percentage: U256,
}

impl DeployRemoteParams {
    /// ERC20 remote mirroring the bridged token
    pub fn erc20(token_name: &str, token_symbol: &str, token_decimals: u8) -> Self {
        Self {
            token_name: token_name.to_string(),
            token_symbol: token_symbol.to_string(),
            token_decimals,
            initial_reserve_imbalance: U256::ZERO,
            burned_fees_reporting_reward_percentage: U256::ZERO,
        }
    }

    /// Native remote minting `native_symbol` on the target chain
    pub fn native(native_symbol: &str, initial_reserve_imbalance: U256) -> Self {
        Self {
            token_name: String::new(),
            token_symbol: native_symbol.to_string(),
            token_decimals: crate::types::NATIVE_TOKEN_DECIMALS,
            initial_reserve_imbalance,
            burned_fees_reporting_reward_percentage: U256::ZERO,
        }
    }
}

/// On-chain reconciliation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Whether the chain reports the awaited state
    pub confirmed: bool,
    /// Whether the store moved forward
    pub advanced: bool,
    /// Status after reconciliation
    pub status: ConnectionStatus,
}

/// What the UI layer does after a recovery action was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryEffect {
    /// Run the failed step again
    RetryStep(StepKind),
    /// The connection was rewound to not-started
    ConnectionReset,
    /// Open the support page
    OpenSupport(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Chain not found in directory: {chain_id}")]
    UnknownChain { chain_id: String },

    #[error("Step '{step}' is locked at status {status}")]
    StepLocked {
        step: WorkbenchStep,
        status: ConnectionStatus,
    },

    #[error("Step '{step}' is already complete")]
    StepComplete { step: WorkbenchStep },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Step(Box<StepError>),
}

impl WorkflowError {
    /// Classified failure, when the port reported one
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            WorkflowError::Step(err) => Some(err),
            _ => None,
        }
    }
}

/// Connection and chains a step runs against, copied out of the store
#[derive(Debug, Clone)]
struct StepTarget {
    connection: BridgeConnection,
    source: Chain,
    target: Chain,
}

impl StepTarget {
    fn classify_context(&self, ran_on: &Chain) -> ClassifyContext {
        ClassifyContext {
            source_chain_id: self.source.id.clone(),
            source_chain_name: self.source.name.clone(),
            target_chain_id: self.target.id.clone(),
            target_chain_name: self.target.name.clone(),
            explorer_url: ran_on.explorer_url.clone(),
        }
    }

    fn home_address(&self) -> Result<Address, WorkflowError> {
        let raw = self
            .connection
            .contracts
            .home_address
            .as_deref()
            .ok_or_else(|| WorkflowError::InvalidInput("home contract not deployed".to_string()))?;
        parse_address(raw).map_err(WorkflowError::InvalidInput)
    }

    fn remote_address(&self) -> Result<Address, WorkflowError> {
        let raw = self
            .connection
            .contracts
            .remote_address
            .as_deref()
            .ok_or_else(|| {
                WorkflowError::InvalidInput("remote contract not deployed".to_string())
            })?;
        parse_address(raw).map_err(WorkflowError::InvalidInput)
    }
}

fn teleporter_registry(chain: &Chain) -> Result<Address, WorkflowError> {
    let raw = chain.teleporter_registry_address.as_deref().ok_or_else(|| {
        WorkflowError::InvalidInput(format!("{} has no Teleporter registry", chain.name))
    })?;
    parse_address(raw).map_err(WorkflowError::InvalidInput)
}

fn chain_blockchain_id(chain: &Chain) -> Result<B256, WorkflowError> {
    blockchain_id_bytes(&chain.id).map_err(|e| WorkflowError::InvalidInput(e.to_string()))
}

// ============================================================================
// Step Runner
// ============================================================================

/// Runs deployment steps for connections in a shared store
pub struct StepRunner<P: TransactionPort> {
    store: SharedStore,
    port: Arc<P>,
    artifacts: ContractArtifacts,
    settings: StepSettings,
    /// Increase-gas attempts per connection, cleared on success
    gas_attempts: Mutex<HashMap<ConnectionId, u32>>,
}

impl<P: TransactionPort> StepRunner<P> {
    pub fn new(
        store: SharedStore,
        port: Arc<P>,
        artifacts: ContractArtifacts,
        settings: StepSettings,
    ) -> Self {
        Self {
            store,
            port,
            artifacts,
            settings,
            gas_attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn settings(&self) -> &StepSettings {
        &self.settings
    }

    /// Gas limit the next transaction for `id` is sent with
    pub async fn gas_limit_for(&self, id: &ConnectionId) -> Option<u64> {
        let attempts = self.gas_attempts.lock().await;
        let attempt = attempts.get(id).copied().unwrap_or(0);
        self.settings.gas.gas_limit_for_attempt(attempt)
    }

    // ========================================================================
    // Deployment Steps
    // ========================================================================

    /// Deploy the home contract on the hub chain
    pub async fn deploy_home(
        &self,
        id: &ConnectionId,
        params: &DeployHomeParams,
    ) -> Result<BridgeConnection, WorkflowError> {
        let target = self.prepare(id, WorkbenchStep::DeployHome).await?;
        let registry = teleporter_registry(&target.source)?;
        let manager = self.port.account();
        let min_version = U256::from(self.settings.min_teleporter_version);
        let kind = ContractKind::home_for(target.connection.token_type);

        let constructor_args = if target.connection.token_type.source_is_native() {
            let wrapped = params.wrapped_native_token.as_deref().ok_or_else(|| {
                WorkflowError::InvalidInput("wrapped native token address is required".to_string())
            })?;
            NativeTokenHome::constructorCall {
                teleporterRegistryAddress: registry,
                teleporterManager: manager,
                minTeleporterVersion: min_version,
                wrappedTokenAddress: parse_address(wrapped).map_err(WorkflowError::InvalidInput)?,
            }
            .abi_encode()
        } else {
            let token = target.connection.token.address.as_deref().ok_or_else(|| {
                WorkflowError::InvalidInput("ERC20 home requires a token address".to_string())
            })?;
            ERC20TokenHome::constructorCall {
                teleporterRegistryAddress: registry,
                teleporterManager: manager,
                minTeleporterVersion: min_version,
                tokenAddress: parse_address(token).map_err(WorkflowError::InvalidInput)?,
                tokenDecimals: target.connection.token.decimals,
            }
            .abi_encode()
        };

        let request = self.deploy_request(id, kind, constructor_args).await?;
        info!(
            id = %id,
            contract = kind.as_str(),
            chain = %target.source.id,
            "Deploying home contract"
        );

        let address = self
            .deploy(&target.source, request)
            .await
            .map_err(|f| self.step_failure(&target, StepKind::DeployHome, &target.source, f))?;

        self.commit(
            id,
            WorkbenchStep::DeployHome,
            ConnectionUpdate::home_deployed(address.to_string()),
        )
        .await
    }

    /// Deploy the remote contract on the target chain
    pub async fn deploy_remote(
        &self,
        id: &ConnectionId,
        params: &DeployRemoteParams,
    ) -> Result<BridgeConnection, WorkflowError> {
        let target = self.prepare(id, WorkbenchStep::DeployRemote).await?;
        let registry = teleporter_registry(&target.target)?;
        let home = target.home_address()?;
        let home_blockchain_id = chain_blockchain_id(&target.source)?;
        let manager = self.port.account();
        let min_version = U256::from(self.settings.min_teleporter_version);
        let home_decimals = target.connection.token.decimals;
        let kind = ContractKind::remote_for(target.connection.token_type);

        if params.token_symbol.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("token symbol is required".to_string()));
        }

        let constructor_args = if target.connection.token_type.remote_is_native() {
            if params.initial_reserve_imbalance.is_zero() {
                return Err(WorkflowError::InvalidInput(
                    "initial reserve imbalance must be non-zero".to_string(),
                ));
            }
            if params.burned_fees_reporting_reward_percentage >= U256::from(100) {
                return Err(WorkflowError::InvalidInput(
                    "burned fees reporting reward percentage must be below 100".to_string(),
                ));
            }
            NativeTokenRemote::constructorCall {
                settings: NativeTokenRemote::TokenRemoteSettings {
                    teleporterRegistryAddress: registry,
                    teleporterManager: manager,
                    minTeleporterVersion: min_version,
                    tokenHomeBlockchainID: home_blockchain_id,
                    tokenHomeAddress: home,
                    tokenHomeDecimals: home_decimals,
                },
                nativeAssetSymbol: params.token_symbol.clone(),
                initialReserveImbalance: params.initial_reserve_imbalance,
                burnedFeesReportingRewardPercentage: params.burned_fees_reporting_reward_percentage,
            }
            .abi_encode()
        } else {
            if params.token_name.trim().is_empty() {
                return Err(WorkflowError::InvalidInput("token name is required".to_string()));
            }
            ERC20TokenRemote::constructorCall {
                settings: ERC20TokenRemote::TokenRemoteSettings {
                    teleporterRegistryAddress: registry,
                    teleporterManager: manager,
                    minTeleporterVersion: min_version,
                    tokenHomeBlockchainID: home_blockchain_id,
                    tokenHomeAddress: home,
                    tokenHomeDecimals: home_decimals,
                },
                tokenName: params.token_name.clone(),
                tokenSymbol: params.token_symbol.clone(),
                tokenDecimals: params.token_decimals,
            }
            .abi_encode()
        };

        let request = self.deploy_request(id, kind, constructor_args).await?;
        info!(
            id = %id,
            contract = kind.as_str(),
            chain = %target.target.id,
            "Deploying remote contract"
        );

        let address = self
            .deploy(&target.target, request)
            .await
            .map_err(|f| self.step_failure(&target, StepKind::DeployRemote, &target.target, f))?;

        self.commit(
            id,
            WorkbenchStep::DeployRemote,
            ConnectionUpdate::remote_deployed(address.to_string()),
        )
        .await
    }

    // ========================================================================
    // Registration and Collateral
    // ========================================================================

    /// Send `registerWithHome` from the remote, then read the result back
    pub async fn register_with_home(&self, id: &ConnectionId) -> Result<Reconciliation, WorkflowError> {
        let target = self.prepare(id, WorkbenchStep::Register).await?;
        let remote = target.remote_address()?;

        let calldata = ITokenRemote::registerWithHomeCall {
            feeInfo: ITokenRemote::TeleporterFeeInfo {
                feeTokenAddress: Address::ZERO,
                amount: U256::ZERO,
            },
        }
        .abi_encode();
        let request = CallRequest {
            to: remote,
            calldata: calldata.into(),
            value: U256::ZERO,
            gas_limit: self.gas_limit_for(id).await,
        };

        info!(id = %id, remote = %remote, chain = %target.target.id, "Registering remote with home");
        self.transact(&target.target, request)
            .await
            .map_err(|f| self.step_failure(&target, StepKind::Register, &target.target, f))?;
        self.clear_gas_attempts(id).await;

        // The registration message still has to be relayed to the home chain
        tokio::time::sleep(self.settings.status_poll_delay).await;
        self.check_registration(id).await
    }

    /// Approve (ERC20 homes) and add `amount` of collateral on the home
    pub async fn add_collateral(
        &self,
        id: &ConnectionId,
        amount: U256,
    ) -> Result<Reconciliation, WorkflowError> {
        let target = self.prepare(id, WorkbenchStep::AddCollateral).await?;
        if amount.is_zero() {
            return Err(WorkflowError::InvalidInput("collateral amount must be non-zero".to_string()));
        }
        let home = target.home_address()?;
        let remote = target.remote_address()?;
        let remote_blockchain_id = chain_blockchain_id(&target.target)?;
        let gas_limit = self.gas_limit_for(id).await;
        let fail = |f: RawFailure| self.step_failure(&target, StepKind::Collateral, &target.source, f);

        let request = if target.connection.token_type.source_is_native() {
            CallRequest {
                to: home,
                calldata: NativeTokenHome::addCollateralCall {
                    remoteBlockchainID: remote_blockchain_id,
                    remoteTokenTransferrerAddress: remote,
                }
                .abi_encode()
                .into(),
                value: amount,
                gas_limit,
            }
        } else {
            let token = target.connection.token.address.as_deref().ok_or_else(|| {
                WorkflowError::InvalidInput("ERC20 home requires a token address".to_string())
            })?;
            let token = parse_address(token).map_err(WorkflowError::InvalidInput)?;

            debug!(id = %id, token = %token, spender = %home, amount = %amount, "Approving collateral");
            let approve = CallRequest {
                to: token,
                calldata: IERC20::approveCall {
                    spender: home,
                    amount,
                }
                .abi_encode()
                .into(),
                value: U256::ZERO,
                gas_limit,
            };
            self.transact(&target.source, approve).await.map_err(fail)?;

            CallRequest {
                to: home,
                calldata: ERC20TokenHome::addCollateralCall {
                    remoteBlockchainID: remote_blockchain_id,
                    remoteTokenTransferrerAddress: remote,
                    amount,
                }
                .abi_encode()
                .into(),
                value: U256::ZERO,
                gas_limit,
            }
        };

        info!(id = %id, home = %home, amount = %amount, "Adding collateral");
        self.transact(&target.source, request).await.map_err(fail)?;
        self.clear_gas_attempts(id).await;

        self.store
            .write()
            .await
            .advance_status(id, ConnectionStatus::Collateralized)?;
        self.check_collateral(id).await
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Read the home's view of the remote and advance to registered if set
    pub async fn check_registration(&self, id: &ConnectionId) -> Result<Reconciliation, WorkflowError> {
        let target = self.load(id).await?;
        let home = target.home_address()?;
        let remote = target.remote_address()?;
        let remote_blockchain_id = chain_blockchain_id(&target.target)?;

        let calldata = ITokenHome::getRemoteTokenTransferrerSettingsCall {
            remoteBlockchainID: remote_blockchain_id,
            remoteTokenTransferrerAddress: remote,
        }
        .abi_encode();

        let registered = async {
            let data = self
                .port
                .read_contract(&target.source, home, calldata.into())
                .await?;
            let settings = ITokenHome::getRemoteTokenTransferrerSettingsCall::abi_decode_returns(&data, true)
                .map_err(|e| RawFailure::new(format!("failed to decode remote settings: {}", e)))?;
            Ok::<bool, RawFailure>(settings._0.registered)
        }
        .await
        .map_err(|f| self.step_failure(&target, StepKind::Register, &target.source, f))?;

        self.reconcile(id, registered, ConnectionStatus::Registered).await
    }

    /// Ask the remote whether it is collateralized and advance to live if so
    pub async fn check_collateral(&self, id: &ConnectionId) -> Result<Reconciliation, WorkflowError> {
        let target = self.load(id).await?;
        let remote = target.remote_address()?;
        let calldata = ITokenRemote::isCollateralizedCall {}.abi_encode();

        let collateralized = async {
            let data = self
                .port
                .read_contract(&target.target, remote, calldata.into())
                .await?;
            let result = ITokenRemote::isCollateralizedCall::abi_decode_returns(&data, true)
                .map_err(|e| RawFailure::new(format!("failed to decode collateral state: {}", e)))?;
            Ok::<bool, RawFailure>(result._0)
        }
        .await
        .map_err(|f| self.step_failure(&target, StepKind::Collateral, &target.target, f))?;

        self.reconcile(id, collateralized, ConnectionStatus::Live).await
    }

    async fn reconcile(
        &self,
        id: &ConnectionId,
        confirmed: bool,
        target_status: ConnectionStatus,
    ) -> Result<Reconciliation, WorkflowError> {
        let mut store = self.store.write().await;
        let advanced = if confirmed {
            store.advance_status(id, target_status)?
        } else {
            debug!(id = %id, awaiting = %target_status, "Not confirmed on-chain yet");
            false
        };
        let status = store
            .connection(id)
            .ok_or_else(|| StoreError::ConnectionNotFound { id: id.clone() })?
            .status;

        Ok(Reconciliation {
            confirmed,
            advanced,
            status,
        })
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Apply a recovery action offered for a failed step
    pub async fn apply_recovery(
        &self,
        id: &ConnectionId,
        step: StepKind,
        action: &RecoveryAction,
    ) -> Result<RecoveryEffect, WorkflowError> {
        match action {
            RecoveryAction::Retry { .. } => Ok(RecoveryEffect::RetryStep(step)),
            RecoveryAction::SwitchChain { chain_id, .. } => {
                let target = self.load(id).await?;
                let chain = if *chain_id == target.source.id {
                    target.source.clone()
                } else if *chain_id == target.target.id {
                    target.target.clone()
                } else {
                    return Err(WorkflowError::UnknownChain {
                        chain_id: chain_id.clone(),
                    });
                };

                info!(id = %id, chain = %chain.id, "Switching wallet network");
                self.port
                    .switch_network(&chain)
                    .await
                    .map_err(|f| self.step_failure(&target, step, &chain, f))?;
                Ok(RecoveryEffect::RetryStep(step))
            }
            RecoveryAction::IncreaseGas { .. } => {
                let attempt = {
                    let mut attempts = self.gas_attempts.lock().await;
                    let attempt = attempts.entry(id.clone()).or_insert(0);
                    *attempt += 1;
                    *attempt
                };
                info!(
                    id = %id,
                    attempt = attempt,
                    gas_limit = ?self.settings.gas.gas_limit_for_attempt(attempt),
                    "Increased gas limit"
                );
                Ok(RecoveryEffect::RetryStep(step))
            }
            RecoveryAction::Reset { .. } => {
                self.store.write().await.reset_connection(id)?;
                self.clear_gas_attempts(id).await;
                Ok(RecoveryEffect::ConnectionReset)
            }
            RecoveryAction::ContactSupport { .. } => {
                Ok(RecoveryEffect::OpenSupport(SUPPORT_URL.to_string()))
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Snapshot the connection and its chains out of the store
    async fn load(&self, id: &ConnectionId) -> Result<StepTarget, WorkflowError> {
        let store = self.store.read().await;
        let connection = store
            .connection(id)
            .ok_or_else(|| StoreError::ConnectionNotFound { id: id.clone() })?
            .clone();
        let source = store
            .get_chain_by_id(&connection.source_chain_id)
            .ok_or_else(|| WorkflowError::UnknownChain {
                chain_id: connection.source_chain_id.clone(),
            })?
            .clone();
        let target = store
            .get_chain_by_id(&connection.target_chain_id)
            .ok_or_else(|| WorkflowError::UnknownChain {
                chain_id: connection.target_chain_id.clone(),
            })?
            .clone();

        Ok(StepTarget {
            connection,
            source,
            target,
        })
    }

    /// Load and check that `step` is actionable at the current status
    async fn prepare(
        &self,
        id: &ConnectionId,
        step: WorkbenchStep,
    ) -> Result<StepTarget, WorkflowError> {
        let target = self.load(id).await?;
        let status = target.connection.status;

        if is_step_locked(step.index(), status) {
            warn!(id = %id, step = %step, status = %status, "Step is locked");
            return Err(WorkflowError::StepLocked { step, status });
        }
        if is_step_complete(step.index(), status) {
            debug!(id = %id, step = %step, status = %status, "Step already complete");
            return Err(WorkflowError::StepComplete { step });
        }
        Ok(target)
    }

    async fn deploy_request(
        &self,
        id: &ConnectionId,
        kind: ContractKind,
        constructor_args: Vec<u8>,
    ) -> Result<DeployRequest, WorkflowError> {
        let bytecode = self.artifacts.bytecode(kind);
        if bytecode.is_empty() {
            return Err(WorkflowError::InvalidInput(format!(
                "no creation bytecode for {}",
                kind.as_str()
            )));
        }
        Ok(DeployRequest {
            bytecode: bytecode.clone(),
            constructor_args: Bytes::from(constructor_args),
            gas_limit: self.gas_limit_for(id).await,
        })
    }

    async fn deploy(&self, chain: &Chain, request: DeployRequest) -> Result<Address, RawFailure> {
        let handle = self.port.deploy_contract(chain, request).await?;
        let receipt = self.settle(chain, handle).await?;
        receipt.contract_address.ok_or_else(|| {
            RawFailure::new("deployment receipt has no contract address").with_tx_hash(receipt.tx_hash)
        })
    }

    async fn transact(&self, chain: &Chain, request: CallRequest) -> Result<TxReceipt, RawFailure> {
        let handle = self.port.send_transaction(chain, request).await?;
        self.settle(chain, handle).await
    }

    /// Wait for a successful receipt within the configured timeout
    async fn settle(&self, chain: &Chain, handle: TxHandle) -> Result<TxReceipt, RawFailure> {
        debug!(chain = %chain.id, tx_hash = %handle.tx_hash, "Waiting for receipt");

        let receipt = tokio::time::timeout(
            self.settings.receipt_timeout,
            self.port.wait_for_receipt(chain, &handle),
        )
        .await
        .map_err(|_| {
            RawFailure::new(format!(
                "timeout waiting for receipt after {:?}",
                self.settings.receipt_timeout
            ))
            .with_tx_hash(handle.tx_hash)
        })??;

        if !receipt.success {
            return Err(RawFailure::new("transaction reverted").with_tx_hash(receipt.tx_hash));
        }
        Ok(receipt)
    }

    /// Record a settled step. The step is checked again under the write lock
    /// since another run of it may have committed while this one was in flight.
    async fn commit(
        &self,
        id: &ConnectionId,
        step: WorkbenchStep,
        update: ConnectionUpdate,
    ) -> Result<BridgeConnection, WorkflowError> {
        let connection = {
            let mut store = self.store.write().await;
            let status = store
                .connection(id)
                .ok_or_else(|| StoreError::ConnectionNotFound { id: id.clone() })?
                .status;
            if is_step_complete(step.index(), status) {
                warn!(
                    id = %id,
                    step = %step,
                    orphaned = ?update.contracts,
                    "Step completed by a concurrent run, discarding result"
                );
                return Err(WorkflowError::StepComplete { step });
            }
            store.update_connection(id, update)?.clone()
        };
        self.clear_gas_attempts(id).await;
        Ok(connection)
    }

    async fn clear_gas_attempts(&self, id: &ConnectionId) {
        self.gas_attempts.lock().await.remove(id);
    }

    fn step_failure(
        &self,
        target: &StepTarget,
        step: StepKind,
        ran_on: &Chain,
        failure: RawFailure,
    ) -> WorkflowError {
        let error = classify(&failure, step, &target.classify_context(ran_on));
        warn!(
            id = %target.connection.id,
            step = %step,
            category = ?error.category,
            error = %error.truncated_error(200),
            "Step failed"
        );
        WorkflowError::Step(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_limit_first_attempt_is_estimated() {
        let policy = GasPolicy::default();
        assert_eq!(policy.gas_limit_for_attempt(0), None);
    }

    #[test]
    fn test_gas_limit_bumps_and_caps() {
        let policy = GasPolicy {
            base_gas_limit: 1_000_000,
            gas_bump_percent: 20,
            max_gas_multiplier: 3.0,
        };
        assert_eq!(policy.gas_limit_for_attempt(1), Some(1_200_000));
        assert_eq!(policy.gas_limit_for_attempt(5), Some(2_000_000));
        assert_eq!(policy.gas_limit_for_attempt(50), Some(3_000_000));
    }

    #[test]
    fn test_default_settings() {
        let settings = StepSettings::default();
        assert_eq!(settings.receipt_timeout, Duration::from_secs(120));
        assert_eq!(settings.status_poll_delay, Duration::from_millis(5000));
        assert_eq!(settings.gas.base_gas_limit, 3_000_000);
        assert_eq!(settings.min_teleporter_version, 1);
    }

    #[test]
    fn test_native_remote_params() {
        let params = DeployRemoteParams::native("ECHO", U256::from(1000));
        assert_eq!(params.token_symbol, "ECHO");
        assert_eq!(params.token_decimals, 18);
        assert!(params.token_name.is_empty());
    }

    #[test]
    fn test_workflow_error_exposes_step_error() {
        let err = WorkflowError::InvalidInput("x".to_string());
        assert!(err.step_error().is_none());
        assert_eq!(err.to_string(), "Invalid input: x");
    }
}
