//! Observable client state for UI consumers.

use crate::error::AtmError;
use crate::history::TransactionRecord;
use crate::ledger::{Confirmation, LedgerState};
use crate::session::{Address, Session};
use alloy_primitives::U256;
use serde::Serialize;

/// Position in the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Unchecked,
    NoProvider,
    ProviderDetected,
    Unauthorized,
    Authorized,
    Idle,
    OperationInFlight,
}

impl ClientStatus {
    pub fn is_bound(&self) -> bool {
        matches!(self, ClientStatus::Idle | ClientStatus::OperationInFlight)
    }
}

/// What the UI should ask of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    InstallWallet,
    Connect,
    Ready,
}

impl From<ClientStatus> for Prompt {
    fn from(status: ClientStatus) -> Self {
        match status {
            ClientStatus::NoProvider => Prompt::InstallWallet,
            ClientStatus::Idle | ClientStatus::OperationInFlight => Prompt::Ready,
            _ => Prompt::Connect,
        }
    }
}

/// One-shot notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Notice {
    Confirmed { confirmation: Confirmation },
    Failed { action: String, kind: String, message: String },
}

impl Notice {
    pub fn failed(action: &str, err: &AtmError) -> Self {
        Notice::Failed { action: action.to_string(), kind: err.kind().to_string(), message: err.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    StateChanged { status: ClientStatus },
    Notice { notice: Notice },
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    #[serde(serialize_with = "crate::ledger::quantity::option::serialize")]
    pub balance: Option<U256>,
    pub stale: bool,
    pub discarded: u64,
}

impl From<&LedgerState> for LedgerView {
    fn from(state: &LedgerState) -> Self {
        Self { balance: state.balance(), stale: state.is_stale(), discarded: state.discarded() }
    }
}

/// Read-only picture of everything the core holds.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub status: ClientStatus,
    pub prompt: Prompt,
    pub session: Session,
    pub contract: Option<Address>,
    pub ledger: LedgerView,
    pub transactions: Vec<TransactionRecord>,
}
