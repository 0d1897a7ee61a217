//! Step failure classification
//!
//! Maps a raw failure from the transaction port to a [`StepError`]: a short
//! title, likely causes, and the recovery actions the user may take.
//! Matching is ordered substring search over the lower-cased message, so
//! specific patterns are checked before generic ones ("gas estimation failed:
//! execution reverted" is a gas problem, not a revert).

use alloy::primitives::B256;
use serde::Serialize;
use std::fmt;

use crate::port::RawFailure;

/// Where users are sent by the contact-support action
pub const SUPPORT_URL: &str = "https://github.com/ava-labs/icm-contracts/issues";

/// The on-chain step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    DeployHome,
    DeployRemote,
    Register,
    Collateral,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::DeployHome => "deploy-home",
            StepKind::DeployRemote => "deploy-remote",
            StepKind::Register => "register",
            StepKind::Collateral => "collateral",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure category, in matching order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    InsufficientFunds,
    Rejected,
    WrongNetwork,
    GasEstimation,
    Reverted,
    AlreadyExists,
    Network,
    Unknown,
}

impl ErrorCategory {
    /// Categorize a failure message
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
            return ErrorCategory::InsufficientFunds;
        }

        if lower.contains("user rejected") || lower.contains("user denied") {
            return ErrorCategory::Rejected;
        }

        if lower.contains("chain mismatch") || lower.contains("wrong network") {
            return ErrorCategory::WrongNetwork;
        }

        if lower.contains("gas") && (lower.contains("estimation") || lower.contains("limit")) {
            return ErrorCategory::GasEstimation;
        }

        if lower.contains("reverted") || lower.contains("execution reverted") {
            return ErrorCategory::Reverted;
        }

        if lower.contains("already deployed") || lower.contains("contract exists") {
            return ErrorCategory::AlreadyExists;
        }

        if lower.contains("network") || lower.contains("timeout") || lower.contains("connection")
        {
            return ErrorCategory::Network;
        }

        ErrorCategory::Unknown
    }

    pub fn short_message(&self) -> &'static str {
        match self {
            ErrorCategory::InsufficientFunds => "Insufficient Funds",
            ErrorCategory::Rejected => "Transaction Rejected",
            ErrorCategory::WrongNetwork => "Wrong Network",
            ErrorCategory::GasEstimation => "Gas Estimation Failed",
            ErrorCategory::Reverted => "Transaction Reverted",
            ErrorCategory::AlreadyExists => "Contract Already Exists",
            ErrorCategory::Network => "Network Error",
            ErrorCategory::Unknown => "Operation Failed",
        }
    }

    pub fn possible_causes(&self) -> &'static [&'static str] {
        match self {
            ErrorCategory::InsufficientFunds => &[
                "The account does not hold enough native tokens to pay for gas",
                "The token balance is lower than the amount being transferred",
            ],
            ErrorCategory::Rejected => &["The transaction was rejected in the wallet"],
            ErrorCategory::WrongNetwork => &[
                "The wallet is connected to a different chain than the one this step runs on",
            ],
            ErrorCategory::GasEstimation => &[
                "The transaction would revert, so gas could not be estimated",
                "The gas limit is too low for the contract deployment",
                "Network congestion",
            ],
            ErrorCategory::Reverted => &[
                "Invalid constructor or call parameters",
                "The teleporter registry address is wrong for this chain",
                "The token contract rejected the call",
            ],
            ErrorCategory::AlreadyExists => &[
                "A contract was already deployed for this connection",
                "The previous attempt succeeded but was not recorded",
            ],
            ErrorCategory::Network => &[
                "The RPC endpoint is unreachable or slow",
                "The connection dropped while waiting for the transaction",
            ],
            ErrorCategory::Unknown => &[
                "An unexpected error occurred",
                "The chain or wallet returned an unrecognized response",
            ],
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_message())
    }
}

/// What the user can do about a failed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RecoveryAction {
    Retry {
        label: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SwitchChain {
        chain_id: String,
        chain_name: String,
        label: Option<String>,
    },
    IncreaseGas {
        label: Option<String>,
    },
    Reset {
        label: Option<String>,
    },
    ContactSupport {
        label: Option<String>,
    },
}

impl RecoveryAction {
    pub fn retry() -> Self {
        RecoveryAction::Retry {
            label: Some("Try Again".to_string()),
        }
    }

    pub fn switch_chain(chain_id: &str, chain_name: &str) -> Self {
        RecoveryAction::SwitchChain {
            chain_id: chain_id.to_string(),
            chain_name: chain_name.to_string(),
            label: Some(format!("Switch to {}", chain_name)),
        }
    }

    pub fn increase_gas() -> Self {
        RecoveryAction::IncreaseGas {
            label: Some("Increase Gas Limit".to_string()),
        }
    }

    pub fn reset() -> Self {
        RecoveryAction::Reset {
            label: Some("Reset Connection".to_string()),
        }
    }

    pub fn contact_support() -> Self {
        RecoveryAction::ContactSupport {
            label: Some("Contact Support".to_string()),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RecoveryAction::Retry { .. } => "retry",
            RecoveryAction::SwitchChain { .. } => "switch-chain",
            RecoveryAction::IncreaseGas { .. } => "increase-gas",
            RecoveryAction::Reset { .. } => "reset",
            RecoveryAction::ContactSupport { .. } => "contact-support",
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            RecoveryAction::Retry { label }
            | RecoveryAction::SwitchChain { label, .. }
            | RecoveryAction::IncreaseGas { label }
            | RecoveryAction::Reset { label }
            | RecoveryAction::ContactSupport { label } => label.as_deref(),
        }
    }
}

/// Chains and explorer involved in the failing step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifyContext {
    pub source_chain_id: String,
    pub source_chain_name: String,
    pub target_chain_id: String,
    pub target_chain_name: String,
    /// Explorer base URL of the chain the step ran on
    pub explorer_url: Option<String>,
}

/// Classified step failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    pub step: StepKind,
    pub category: ErrorCategory,
    /// Raw failure message
    pub error: String,
    pub short_message: Option<String>,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub possible_causes: Vec<String>,
    pub recovery_actions: Vec<RecoveryAction>,
}

impl StepError {
    /// Whether the given action tag is offered
    pub fn offers(&self, tag: &str) -> bool {
        self.recovery_actions.iter().any(|a| a.tag() == tag)
    }

    /// Raw message cut to `max_chars`, with an ellipsis when truncated
    pub fn truncated_error(&self, max_chars: usize) -> String {
        if self.error.chars().count() <= max_chars {
            return self.error.clone();
        }
        let head: String = self.error.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.short_message.as_deref().unwrap_or("Operation Failed"),
            self.step,
            self.error
        )
    }
}

impl std::error::Error for StepError {}

/// Classify a failure of `step`
pub fn classify(failure: &RawFailure, step: StepKind, context: &ClassifyContext) -> StepError {
    let category = ErrorCategory::from_message(&failure.message);

    let recovery_actions = match category {
        ErrorCategory::InsufficientFunds | ErrorCategory::Rejected => {
            vec![RecoveryAction::retry()]
        }
        ErrorCategory::WrongNetwork => {
            let (chain_id, chain_name) = match step {
                StepKind::DeployHome | StepKind::Register => {
                    (&context.source_chain_id, &context.source_chain_name)
                }
                StepKind::DeployRemote | StepKind::Collateral => {
                    (&context.target_chain_id, &context.target_chain_name)
                }
            };
            vec![
                RecoveryAction::switch_chain(chain_id, chain_name),
                RecoveryAction::retry(),
            ]
        }
        ErrorCategory::GasEstimation => vec![
            RecoveryAction::increase_gas(),
            RecoveryAction::retry(),
            RecoveryAction::reset(),
        ],
        ErrorCategory::Reverted => vec![
            RecoveryAction::retry(),
            RecoveryAction::reset(),
            RecoveryAction::contact_support(),
        ],
        ErrorCategory::AlreadyExists => {
            vec![RecoveryAction::reset(), RecoveryAction::contact_support()]
        }
        ErrorCategory::Network => vec![RecoveryAction::retry(), RecoveryAction::contact_support()],
        ErrorCategory::Unknown => vec![
            RecoveryAction::retry(),
            RecoveryAction::reset(),
            RecoveryAction::contact_support(),
        ],
    };

    let tx_hash = failure.tx_hash.map(|h: B256| h.to_string());
    let explorer_url = match (&context.explorer_url, &tx_hash) {
        (Some(base), Some(hash)) => Some(format!("{}/tx/{}", base.trim_end_matches('/'), hash)),
        _ => None,
    };

    StepError {
        step,
        category,
        error: failure.message.clone(),
        short_message: Some(category.short_message().to_string()),
        tx_hash,
        explorer_url,
        possible_causes: category
            .possible_causes()
            .iter()
            .map(|c| c.to_string())
            .collect(),
        recovery_actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ClassifyContext {
        ClassifyContext {
            source_chain_id: "hub".into(),
            source_chain_name: "Fuji C-Chain".into(),
            target_chain_id: "dfk".into(),
            target_chain_name: "DFK".into(),
            explorer_url: Some("https://testnet.snowtrace.io/".into()),
        }
    }

    fn tags(error: &StepError) -> Vec<&'static str> {
        error.recovery_actions.iter().map(|a| a.tag()).collect()
    }

    fn classify_msg(message: &str, step: StepKind) -> StepError {
        classify(&RawFailure::new(message), step, &context())
    }

    #[test]
    fn test_insufficient_funds() {
        let error = classify_msg("Insufficient Funds for gas * price + value", StepKind::DeployHome);
        assert_eq!(error.short_message.as_deref(), Some("Insufficient Funds"));
        assert_eq!(tags(&error), vec!["retry"]);

        let error = classify_msg("ERC20: INSUFFICIENT BALANCE", StepKind::Collateral);
        assert_eq!(error.category, ErrorCategory::InsufficientFunds);
    }

    #[test]
    fn test_user_rejected() {
        let error = classify_msg("User denied transaction signature", StepKind::Register);
        assert_eq!(error.short_message.as_deref(), Some("Transaction Rejected"));
        assert_eq!(tags(&error), vec!["retry"]);
        assert_eq!(classify_msg("user rejected the request", StepKind::Register).category, ErrorCategory::Rejected);
    }

    #[test]
    fn test_wrong_network_switch_target_depends_on_step() {
        let error = classify_msg("Chain mismatch: expected 43113", StepKind::DeployHome);
        assert_eq!(error.short_message.as_deref(), Some("Wrong Network"));
        assert_eq!(tags(&error), vec!["switch-chain", "retry"]);
        assert_eq!(
            error.recovery_actions[0],
            RecoveryAction::switch_chain("hub", "Fuji C-Chain")
        );

        let error = classify_msg("WRONG NETWORK", StepKind::Register);
        assert_eq!(
            error.recovery_actions[0],
            RecoveryAction::switch_chain("hub", "Fuji C-Chain")
        );

        for step in [StepKind::DeployRemote, StepKind::Collateral] {
            let error = classify_msg("wrong network", step);
            assert_eq!(
                error.recovery_actions[0],
                RecoveryAction::switch_chain("dfk", "DFK")
            );
        }
    }

    #[test]
    fn test_gas_estimation() {
        let error = classify_msg("Gas limit exceeded", StepKind::DeployRemote);
        assert_eq!(error.short_message.as_deref(), Some("Gas Estimation Failed"));
        assert_eq!(tags(&error), vec!["increase-gas", "retry", "reset"]);
    }

    #[test]
    fn test_gas_checked_before_reverted() {
        let error = classify_msg("gas estimation failed: execution reverted", StepKind::DeployHome);
        assert_eq!(error.category, ErrorCategory::GasEstimation);
        assert_eq!(error.short_message.as_deref(), Some("Gas Estimation Failed"));
    }

    #[test]
    fn test_gas_alone_is_not_gas_estimation() {
        let error = classify_msg("gas price too high", StepKind::DeployHome);
        assert_eq!(error.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_reverted() {
        let error = classify_msg("Execution Reverted: TokenHome: zero address", StepKind::Register);
        assert_eq!(error.short_message.as_deref(), Some("Transaction Reverted"));
        assert_eq!(tags(&error), vec!["retry", "reset", "contact-support"]);
    }

    #[test]
    fn test_already_exists() {
        let error = classify_msg("Contract already deployed at address", StepKind::DeployHome);
        assert_eq!(error.short_message.as_deref(), Some("Contract Already Exists"));
        assert_eq!(tags(&error), vec!["reset", "contact-support"]);
        assert_eq!(
            classify_msg("CONTRACT EXISTS", StepKind::DeployRemote).category,
            ErrorCategory::AlreadyExists
        );
    }

    #[test]
    fn test_network_error() {
        for message in ["Network request failed", "request TIMEOUT", "connection refused"] {
            let error = classify_msg(message, StepKind::DeployRemote);
            assert_eq!(error.short_message.as_deref(), Some("Network Error"), "{}", message);
            assert_eq!(tags(&error), vec!["retry", "contact-support"]);
        }
    }

    #[test]
    fn test_unknown_defaults() {
        let error = classify_msg("something odd happened", StepKind::Collateral);
        assert_eq!(error.short_message.as_deref(), Some("Operation Failed"));
        assert_eq!(tags(&error), vec!["retry", "reset", "contact-support"]);
        assert!(!error.possible_causes.is_empty());
    }

    #[test]
    fn test_every_category_offers_a_way_forward() {
        for message in [
            "insufficient funds",
            "user rejected",
            "wrong network",
            "gas limit",
            "reverted",
            "already deployed",
            "timeout",
            "???",
        ] {
            let error = classify_msg(message, StepKind::DeployHome);
            assert!(!error.recovery_actions.is_empty());
            assert!(!error.possible_causes.is_empty());
        }
    }

    #[test]
    fn test_explorer_url_with_tx_hash() {
        let failure = RawFailure::new("execution reverted").with_tx_hash(B256::repeat_byte(0x11));
        let error = classify(&failure, StepKind::DeployHome, &context());
        let hash = error.tx_hash.clone().unwrap();
        assert!(hash.starts_with("0x"));
        assert_eq!(
            error.explorer_url.as_deref(),
            Some(format!("https://testnet.snowtrace.io/tx/{}", hash).as_str())
        );

        let error = classify_msg("execution reverted", StepKind::DeployHome);
        assert!(error.explorer_url.is_none());
    }

    #[test]
    fn test_truncated_error() {
        let error = classify_msg("abcdefghij", StepKind::DeployHome);
        assert_eq!(error.truncated_error(4), "abcd...");
        assert_eq!(error.truncated_error(20), "abcdefghij");
    }

    #[test]
    fn test_recovery_action_serialization() {
        let json = serde_json::to_value(RecoveryAction::switch_chain("dfk", "DFK")).unwrap();
        assert_eq!(json["type"], "switch-chain");
        assert_eq!(json["chainId"], "dfk");
        assert_eq!(json["chainName"], "DFK");
        assert!(json.get("chain_id").is_none());
        assert_eq!(json["label"], "Switch to DFK");
    }
}
