//! Connection Store
//!
//! Single source of truth for the bridge connections of a workbench session
//! and the one in-progress connection draft.
//!
//! All connections are sourced on the hub chain, and each target chain can
//! carry at most one connection. Status only ever moves forward through
//! [`ConnectionStore::update_connection`]; [`ConnectionStore::reset_connection`]
//! is the one operation that rewinds a connection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::directory::ChainDirectory;
use crate::types::{
    BridgeConnection, Chain, ConnectionId, ConnectionStatus, ContractAddresses,
    ConnectionUpdate, PendingConnection, PendingStep, PendingUpdate,
};

/// Store shared between step runners and readers
pub type SharedStore = Arc<RwLock<ConnectionStore>>;

/// Precondition failures of store operations. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Hub chain not found in directory: {chain_id}")]
    UnknownHubChain { chain_id: String },

    #[error("Cannot connect to chain {chain_id}: unknown, hub, or already connected")]
    ChainNotConnectable { chain_id: String },

    #[error("No pending connection")]
    NoPendingConnection,

    #[error("Pending connection is incomplete: missing {missing}")]
    IncompletePending { missing: &'static str },

    #[error("Token type mismatch: {reason}")]
    TokenTypeMismatch { reason: String },

    #[error("Invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("Connection not found: {id}")]
    ConnectionNotFound { id: ConnectionId },

    #[error("Connection {id} cannot move back from {from} to {to}")]
    StatusRegression {
        id: ConnectionId,
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    #[error("Connection {id} already has a {field} contract at {existing}")]
    ContractAlreadySet {
        id: ConnectionId,
        field: &'static str,
        existing: String,
    },

    #[error("Duplicate connection id in snapshot: {id}")]
    DuplicateConnection { id: ConnectionId },

    #[error("Connection {id} in snapshot is not sourced on the hub or targets it")]
    InvalidSnapshotConnection { id: ConnectionId },

    #[error("Connection {id} in snapshot targets already connected chain {chain_id}")]
    DuplicateTarget { id: ConnectionId, chain_id: String },
}

/// Serializable state of a workbench session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbenchSnapshot {
    pub hub_chain_id: String,
    #[serde(default)]
    pub connections: Vec<BridgeConnection>,
}

/// Owns the bridge connections of one workbench session
pub struct ConnectionStore {
    directory: Arc<dyn ChainDirectory>,
    hub_chain_id: String,
    connections: Vec<BridgeConnection>,
    pending: Option<PendingConnection>,
    next_id: u64,
}

impl std::fmt::Debug for ConnectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStore")
            .field("hub_chain_id", &self.hub_chain_id)
            .field("connections", &self.connections)
            .field("pending", &self.pending)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ConnectionStore {
    /// Create an empty store centered on `hub_chain_id`
    pub fn new(
        directory: Arc<dyn ChainDirectory>,
        hub_chain_id: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let hub_chain_id = hub_chain_id.into();
        if directory.get_chain_by_id(&hub_chain_id).is_none() {
            return Err(StoreError::UnknownHubChain {
                chain_id: hub_chain_id,
            });
        }

        Ok(Self {
            directory,
            hub_chain_id,
            connections: Vec::new(),
            pending: None,
            next_id: 1,
        })
    }

    /// Rebuild a store from a saved snapshot
    pub fn restore(
        directory: Arc<dyn ChainDirectory>,
        snapshot: WorkbenchSnapshot,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new(directory, snapshot.hub_chain_id)?;

        let mut seen = HashSet::new();
        let mut targets = HashSet::new();
        for connection in &snapshot.connections {
            if !seen.insert(connection.id.clone()) {
                return Err(StoreError::DuplicateConnection {
                    id: connection.id.clone(),
                });
            }
            if connection.source_chain_id != store.hub_chain_id
                || connection.target_chain_id == store.hub_chain_id
            {
                return Err(StoreError::InvalidSnapshotConnection {
                    id: connection.id.clone(),
                });
            }
            if !targets.insert(connection.target_chain_id.as_str()) {
                return Err(StoreError::DuplicateTarget {
                    id: connection.id.clone(),
                    chain_id: connection.target_chain_id.clone(),
                });
            }
            if store.directory.get_chain_by_id(&connection.target_chain_id).is_none() {
                warn!(
                    id = %connection.id,
                    target = %connection.target_chain_id,
                    "Restored connection targets a chain missing from the directory"
                );
            }
        }

        store.next_id = snapshot
            .connections
            .iter()
            .filter_map(|c| c.id.as_str().strip_prefix("conn-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .map_or(1, |n| n + 1);
        store.connections = snapshot.connections;

        info!(
            hub = %store.hub_chain_id,
            connections = store.connections.len(),
            "Restored workbench session"
        );
        Ok(store)
    }

    /// Wrap the store for shared use by step runners
    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn snapshot(&self) -> WorkbenchSnapshot {
        WorkbenchSnapshot {
            hub_chain_id: self.hub_chain_id.clone(),
            connections: self.connections.clone(),
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn hub_chain_id(&self) -> &str {
        &self.hub_chain_id
    }

    pub fn hub_chain(&self) -> Option<&Chain> {
        self.directory.get_chain_by_id(&self.hub_chain_id)
    }

    pub fn directory(&self) -> &Arc<dyn ChainDirectory> {
        &self.directory
    }

    /// Read-through to the chain directory
    pub fn get_chain_by_id(&self, chain_id: &str) -> Option<&Chain> {
        self.directory.get_chain_by_id(chain_id)
    }

    pub fn connections(&self) -> &[BridgeConnection] {
        &self.connections
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&BridgeConnection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    pub fn pending_connection(&self) -> Option<&PendingConnection> {
        self.pending.as_ref()
    }

    /// True iff the chain is known, is not the hub, and has no connection yet
    pub fn can_connect_to_chain(&self, chain_id: &str) -> bool {
        self.directory.get_chain_by_id(chain_id).is_some()
            && chain_id != self.hub_chain_id
            && !self
                .connections
                .iter()
                .any(|c| c.target_chain_id == chain_id)
    }

    /// Directory chains that a new connection could target
    pub fn connectable_chains(&self) -> Vec<&Chain> {
        self.directory
            .list_available_chains()
            .into_iter()
            .filter(|c| self.can_connect_to_chain(&c.id))
            .collect()
    }

    // ========================================================================
    // Pending Connection
    // ========================================================================

    /// Start a draft towards `target_chain_id`, replacing any previous draft
    pub fn start_connection_to_chain(&mut self, target_chain_id: &str) -> Result<(), StoreError> {
        if !self.can_connect_to_chain(target_chain_id) {
            return Err(StoreError::ChainNotConnectable {
                chain_id: target_chain_id.to_string(),
            });
        }

        if let Some(previous) = &self.pending {
            debug!(
                target = %previous.target_chain_id,
                "Discarding previous pending connection"
            );
        }

        self.pending = Some(PendingConnection {
            source_chain_id: self.hub_chain_id.clone(),
            target_chain_id: target_chain_id.to_string(),
            step: PendingStep::SelectToken,
            token: None,
            token_type: None,
        });

        info!(target = %target_chain_id, "Started pending connection");
        Ok(())
    }

    /// Merge fields into the pending draft
    pub fn update_pending_connection(&mut self, update: PendingUpdate) -> Result<(), StoreError> {
        let pending = self.pending.as_ref().ok_or(StoreError::NoPendingConnection)?;

        let token = update.token.as_ref().or(pending.token.as_ref());
        let token_type = update.token_type.or(pending.token_type);
        if let (Some(token), Some(token_type)) = (token, token_type) {
            token_type
                .check_token(token)
                .map_err(|reason| StoreError::TokenTypeMismatch { reason })?;
        }

        let pending = self.pending.as_mut().ok_or(StoreError::NoPendingConnection)?;
        if let Some(step) = update.step {
            pending.step = step;
        }
        if let Some(token) = update.token {
            pending.token = Some(token);
        }
        if let Some(token_type) = update.token_type {
            pending.token_type = Some(token_type);
        }
        Ok(())
    }

    /// Discard the pending draft. Idempotent.
    pub fn cancel_pending_connection(&mut self) {
        if self.pending.take().is_some() {
            debug!("Cancelled pending connection");
        }
    }

    /// Turn the pending draft into a connection and return its id
    pub fn finalize_pending_connection(&mut self) -> Result<ConnectionId, StoreError> {
        let pending = self.pending.as_ref().ok_or(StoreError::NoPendingConnection)?;

        let token = pending
            .token
            .clone()
            .ok_or(StoreError::IncompletePending { missing: "token" })?;
        let token_type = pending
            .token_type
            .ok_or(StoreError::IncompletePending {
                missing: "token type",
            })?;

        token
            .validate()
            .map_err(|reason| StoreError::InvalidToken { reason })?;
        token_type
            .check_token(&token)
            .map_err(|reason| StoreError::TokenTypeMismatch { reason })?;

        let source_chain_id = pending.source_chain_id.clone();
        let target_chain_id = pending.target_chain_id.clone();
        if !self.can_connect_to_chain(&target_chain_id) {
            return Err(StoreError::ChainNotConnectable {
                chain_id: target_chain_id,
            });
        }

        let id = self.allocate_id();
        let connection = BridgeConnection {
            id: id.clone(),
            source_chain_id,
            target_chain_id,
            token,
            token_type,
            status: ConnectionStatus::NotStarted,
            contracts: ContractAddresses::default(),
        };

        info!(
            id = %id,
            source = %connection.source_chain_id,
            target = %connection.target_chain_id,
            token = %connection.token.symbol,
            token_type = %token_type,
            "Created bridge connection"
        );

        self.connections.push(connection);
        self.pending = None;
        Ok(id)
    }

    fn allocate_id(&mut self) -> ConnectionId {
        loop {
            let id = ConnectionId(format!("conn-{}", self.next_id));
            self.next_id += 1;
            if self.connection(&id).is_none() {
                return id;
            }
        }
    }

    // ========================================================================
    // Connection Updates
    // ========================================================================

    /// Merge a status and/or contract update into a connection.
    ///
    /// The whole update is applied or nothing is: a status behind the current
    /// one is rejected with [`StoreError::StatusRegression`], and a recorded
    /// contract address is only replaced through [`Self::reset_connection`].
    pub fn update_connection(
        &mut self,
        id: &ConnectionId,
        update: ConnectionUpdate,
    ) -> Result<&BridgeConnection, StoreError> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::ConnectionNotFound { id: id.clone() })?;

        if let Some(status) = update.status {
            if status < connection.status {
                warn!(
                    id = %id,
                    from = %connection.status,
                    to = %status,
                    "Rejected backward status transition"
                );
                return Err(StoreError::StatusRegression {
                    id: id.clone(),
                    from: connection.status,
                    to: status,
                });
            }
        }

        if let Some(contracts) = &update.contracts {
            if let Some(field) = connection.contracts.conflict_with(contracts) {
                let existing = match field {
                    "home" => connection.contracts.home_address.clone(),
                    _ => connection.contracts.remote_address.clone(),
                }
                .unwrap_or_default();
                warn!(id = %id, field, existing = %existing, "Rejected contract address replacement");
                return Err(StoreError::ContractAlreadySet {
                    id: id.clone(),
                    field,
                    existing,
                });
            }
        }

        if let Some(contracts) = update.contracts {
            connection.contracts.merge(contracts);
        }

        if let Some(status) = update.status {
            if status != connection.status {
                info!(id = %id, from = %connection.status, to = %status, "Connection advanced");
                connection.status = status;
            }
        }

        Ok(connection)
    }

    /// Move a connection forward to `target` if it is behind it.
    ///
    /// Returns whether the status changed.
    pub fn advance_status(
        &mut self,
        id: &ConnectionId,
        target: ConnectionStatus,
    ) -> Result<bool, StoreError> {
        let current = self
            .connection(id)
            .ok_or_else(|| StoreError::ConnectionNotFound { id: id.clone() })?
            .status;

        if current >= target {
            debug!(id = %id, status = %current, target = %target, "Already at or past target");
            return Ok(false);
        }

        self.update_connection(id, ConnectionUpdate::status(target))?;
        Ok(true)
    }

    /// Rewind a connection to not-started and forget its contracts
    pub fn reset_connection(&mut self, id: &ConnectionId) -> Result<(), StoreError> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::ConnectionNotFound { id: id.clone() })?;

        info!(id = %id, from = %connection.status, "Resetting connection");
        connection.status = ConnectionStatus::NotStarted;
        connection.contracts = ContractAddresses::default();
        Ok(())
    }

    /// Remove a connection. Selection state referencing it is the caller's.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Result<BridgeConnection, StoreError> {
        let idx = self
            .connections
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| StoreError::ConnectionNotFound { id: id.clone() })?;

        let removed = self.connections.remove(idx);
        info!(id = %id, target = %removed.target_chain_id, "Removed connection");
        Ok(removed)
    }
}
