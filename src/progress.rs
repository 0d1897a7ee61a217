//! Status and progress derivation
//!
//! Pure view selectors over [`ConnectionStatus`]. The four visible steps are
//! Deploy Home, Deploy Remote, Register and Add Collateral; registered,
//! collateralized and live all sit on the collateral step. Nothing here is
//! stored: callers recompute on every status change.

use serde::Serialize;
use std::fmt;

use crate::types::ConnectionStatus;

/// Number of visible workbench steps
pub const STEP_COUNT: usize = 4;

/// Visible deployment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkbenchStep {
    DeployHome,
    DeployRemote,
    Register,
    AddCollateral,
}

impl WorkbenchStep {
    pub const ALL: [WorkbenchStep; STEP_COUNT] = [
        WorkbenchStep::DeployHome,
        WorkbenchStep::DeployRemote,
        WorkbenchStep::Register,
        WorkbenchStep::AddCollateral,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn title(&self) -> &'static str {
        match self {
            WorkbenchStep::DeployHome => "Deploy Home Contract",
            WorkbenchStep::DeployRemote => "Deploy Remote Contract",
            WorkbenchStep::Register => "Register with Home",
            WorkbenchStep::AddCollateral => "Add Collateral",
        }
    }
}

impl fmt::Display for WorkbenchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Step the connection is currently on (0..=3)
pub fn step_index_for_status(status: ConnectionStatus) -> usize {
    match status {
        ConnectionStatus::NotStarted => 0,
        ConnectionStatus::HomeDeployed => 1,
        ConnectionStatus::RemoteDeployed => 2,
        ConnectionStatus::Registered | ConnectionStatus::Collateralized | ConnectionStatus::Live => 3,
    }
}

/// A step is complete once passed, and every step is complete at live
pub fn is_step_complete(step_index: usize, status: ConnectionStatus) -> bool {
    step_index < step_index_for_status(status) || status == ConnectionStatus::Live
}

pub fn is_step_active(step_index: usize, status: ConnectionStatus) -> bool {
    step_index_for_status(status) == step_index && status != ConnectionStatus::Live
}

/// Locked steps are not actionable
pub fn is_step_locked(step_index: usize, status: ConnectionStatus) -> bool {
    step_index_for_status(status) < step_index
}

/// Display progress in percent, rounded
pub fn progress_percent(status: ConnectionStatus) -> u8 {
    let done = (status.position() + 1) as f64;
    let total = ConnectionStatus::ALL.len() as f64;
    (done / total * 100.0).round() as u8
}

/// Derived state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub step: WorkbenchStep,
    pub complete: bool,
    pub active: bool,
    pub locked: bool,
}

/// Derived state of all four steps for a status
pub fn step_views(status: ConnectionStatus) -> [StepView; STEP_COUNT] {
    WorkbenchStep::ALL.map(|step| StepView {
        step,
        complete: is_step_complete(step.index(), status),
        active: is_step_active(step.index(), status),
        locked: is_step_locked(step.index(), status),
    })
}
