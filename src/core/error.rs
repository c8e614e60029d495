use ethers::types::H256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

/// Coarse classification used by callers that only care about the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    DataUnavailable,
    InsufficientBalance,
    UserRejected,
    ExecutionReverted,
    Transport,
    Orchestration,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Wallet connection lost: {0}")]
    ConnectionLost(String),

    #[error("Token metadata not yet available for {0}")]
    TokenMetadataPending(String),

    #[error("{0}")]
    PoolNotFound(String),

    #[error(
        "Insufficient balance: need {required0} {symbol0} and {required1} {symbol1}, \
         have {available0} {symbol0} and {available1} {symbol1}"
    )]
    InsufficientBalance {
        symbol0: String,
        required0: String,
        available0: String,
        symbol1: String,
        required1: String,
        available1: String,
    },

    #[error("Transaction rejected by user")]
    UserRejected(String),

    #[error("Transaction reverted: {message}")]
    ExecutionReverted { hash: Option<H256>, message: String },

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Quote unavailable: {0}")]
    Quote(String),

    #[error("Math overflow in calculation")]
    MathOverflow,

    #[error("Another session is already in flight ({0})")]
    SessionInFlight(String),

    #[error("Invalid transition: {event} while {step}")]
    InvalidTransition { step: String, event: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::InvalidInput(_)
            | AgentError::WalletNotConnected
            | AgentError::ConfigError(_) => ErrorKind::Validation,
            AgentError::TokenMetadataPending(_)
            | AgentError::PoolNotFound(_)
            | AgentError::Quote(_)
            | AgentError::MathOverflow => ErrorKind::DataUnavailable,
            AgentError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            AgentError::UserRejected(_) => ErrorKind::UserRejected,
            AgentError::ExecutionReverted { .. } => ErrorKind::ExecutionReverted,
            AgentError::TransactionFailed(_)
            | AgentError::Rpc(_)
            | AgentError::ConnectionLost(_) => ErrorKind::Transport,
            AgentError::SessionInFlight(_) | AgentError::InvalidTransition { .. } => {
                ErrorKind::Orchestration
            }
        }
    }

    /// Raw message from the wallet or node, when the error carries one.
    pub fn raw_message(&self) -> Option<&str> {
        match self {
            AgentError::UserRejected(raw) => Some(raw),
            AgentError::ExecutionReverted { message, .. } => Some(message),
            AgentError::TransactionFailed(msg) | AgentError::Rpc(msg) => Some(msg),
            _ => None,
        }
    }
}

impl From<ethers::providers::ProviderError> for AgentError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        AgentError::Rpc(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::ConfigError(err.to_string())
    }
}
