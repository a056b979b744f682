//! Error taxonomy for the wallet session and ledger operations.

use thiserror::Error;

/// EIP-1193 code a wallet returns when the user dismisses a prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Failures reported by a wallet provider or the transport behind it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc { code, message: message.into() }
    }

    pub fn user_rejected() -> Self {
        Self::rpc(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == USER_REJECTED_CODE)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AtmError {
    #[error("no wallet provider available")]
    ProviderUnavailable,
    #[error("user rejected the authorization request")]
    UserRejected,
    #[error("session is not authorized")]
    Unauthorized,
    #[error("no contract bound to the session")]
    NotBound,
    #[error("operation rejected: {reason}")]
    OperationRejected { reason: String },
    #[error("stale confirmation discarded")]
    StaleConfirmationDiscarded,
    #[error("amount must be a positive integer")]
    InvalidAmount,
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("stopped waiting for {tx}; the operation may still confirm")]
    WaitAbandoned { tx: String },
    #[error("no confirmation for {tx} after polling limit")]
    ConfirmationTimeout { tx: String },
    #[error("abi: {0}")]
    Abi(String),
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("config: {0}")]
    Config(String),
}

impl AtmError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::OperationRejected { reason: reason.into() }
    }

    /// Short machine-readable tag, used by the HTTP and JS surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            AtmError::ProviderUnavailable => "provider_unavailable",
            AtmError::UserRejected => "user_rejected",
            AtmError::Unauthorized => "unauthorized",
            AtmError::NotBound => "not_bound",
            AtmError::OperationRejected { .. } => "operation_rejected",
            AtmError::StaleConfirmationDiscarded => "stale_confirmation",
            AtmError::InvalidAmount => "invalid_amount",
            AtmError::InvalidAddress(_) => "invalid_address",
            AtmError::WaitAbandoned { .. } => "wait_abandoned",
            AtmError::ConfirmationTimeout { .. } => "confirmation_timeout",
            AtmError::Abi(_) => "abi",
            AtmError::Provider(_) => "provider",
            AtmError::Config(_) => "config",
        }
    }
}

pub type AtmResult<T> = Result<T, AtmError>;
