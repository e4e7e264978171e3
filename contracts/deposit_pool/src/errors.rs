//! Engine error types. Every failing operation leaves the ledger untouched.

use thiserror::Error;

use crate::registrar::RegistrarError;
use crate::types::Amount;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Pool {0} not found")]
    NotFound(u64),

    #[error("Pool {0} is not open")]
    PoolNotOpen(u64),

    #[error("Pool {0} is already filled")]
    AlreadyFilled(u64),

    #[error("Pool {pool_index}: deposit of {amount} exceeds remaining target {remaining}")]
    Overfunded {
        pool_index: u64,
        amount: Amount,
        remaining: Amount,
    },

    #[error("Pool {pool_index}: no contributor at position {position}")]
    UnknownContributor { pool_index: u64, position: usize },

    #[error("Pool {pool_index}: contributor {position} may deposit at most {remaining}, got {amount}")]
    AmountExceedsCommitment {
        pool_index: u64,
        position: usize,
        amount: Amount,
        remaining: Amount,
    },

    #[error("Pool {0} is not filled")]
    PoolNotFilled(u64),

    #[error("Registrar rejected the deposit: {0}")]
    RegistrarRejected(#[from] RegistrarError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unknown operation discriminant {0:#04x}")]
    UnknownOperation(u8),

    #[error("Payload decode error: {0}")]
    DecodeError(String),

    #[error("Ingress path not enabled for this engine: {0}")]
    IngressDisabled(&'static str),
}

pub type Result<T> = std::result::Result<T, PoolError>;
