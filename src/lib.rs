//! ICTT Workbench: connection lifecycle core for Interchain Token Transfer bridges
//!
//! A hub chain is bridged to target chains one connection at a time. This
//! crate owns the state that drives those connections:
//!
//! - **Types** - Chains, tokens, token types and the six-state connection status
//! - **Directory** - Read-only chain directory the workbench resolves chains from
//! - **Store** - Connection set, pending draft and forward-only status updates
//! - **Progress** - Step index, step locking and progress derived from status
//! - **Classifier** - Transaction failures mapped to categories and recovery actions
//! - **Relayer Config** - Relayer config document synthesized from the connections
//! - **Steps** - Deployment, registration and collateral steps over a transaction port
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! ictt-workbench = { path = "../ictt-workbench" }
//! ```

pub mod classifier;
pub mod config;
pub mod contracts;
pub mod directory;
pub mod port;
pub mod progress;
pub mod relayer_config;
pub mod steps;
pub mod store;
pub mod types;

// Re-export commonly used items at the crate root
pub use classifier::{
    classify, ClassifyContext, ErrorCategory, RecoveryAction, StepError, StepKind, SUPPORT_URL,
};
pub use directory::{ChainDirectory, StaticChainDirectory};
pub use port::{CallRequest, DeployRequest, RawFailure, TransactionPort, TxHandle, TxReceipt};
pub use progress::{
    is_step_active, is_step_complete, is_step_locked, progress_percent, step_index_for_status,
    step_views, StepView, WorkbenchStep,
};
pub use relayer_config::{synthesize, synthesize_for_network, RelayerConfig, RelayerNetwork};
pub use steps::{
    DeployHomeParams, DeployRemoteParams, GasPolicy, Reconciliation, RecoveryEffect, StepRunner,
    StepSettings, WorkflowError,
};
pub use store::{ConnectionStore, SharedStore, StoreError, WorkbenchSnapshot};
pub use types::{
    BridgeConnection, Chain, ConnectionId, ConnectionStatus, ConnectionUpdate, ContractAddresses,
    PendingConnection, PendingStep, PendingUpdate, TokenDescriptor, TokenType,
};
