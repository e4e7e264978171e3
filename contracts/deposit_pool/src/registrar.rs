//! # Registrar
//!
//! The external deposit registrar that turns a filled pool into a validator
//! registration. The engine only depends on the [`Registrar`] trait.
//!
//! [`DepositContract`] is a local reference implementation performing the
//! same checks as the beacon-chain deposit contract, including recomputing
//! the SSZ `deposit_data_root`. With `amount_multiplier = 32` it behaves like
//! the token-denominated variant where one token stakes 32 units.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{Amount, PUBKEY_LENGTH, SHARE_SCALE, SIGNATURE_LENGTH};

const GWEI: u64 = 1_000_000_000;

/// Arguments of one `register` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRequest {
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
    pub withdrawal_credentials: [u8; 32],
    pub deposit_data_root: [u8; 32],
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrarError {
    #[error("pubkey must be 48 bytes, got {0}")]
    InvalidPubkeyLength(usize),

    #[error("signature must be 96 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("deposit value too low: {0}")]
    DepositTooLow(Amount),

    #[error("deposit value not a multiple of gwei: {0}")]
    NotGweiMultiple(Amount),

    #[error("deposit value too high: {0}")]
    DepositTooHigh(Amount),

    #[error("reconstructed deposit data root does not match the supplied one")]
    RootMismatch,

    #[error("registrar unavailable: {0}")]
    Unavailable(String),
}

/// Consumed interface of the external deposit registrar.
///
/// A call either fully succeeds or has no effect.
pub trait Registrar: Send + Sync {
    fn register(&self, request: &DepositRequest) -> Result<(), RegistrarError>;
}

/// Compute the SSZ hash-tree root of `DepositData` the way the deposit
/// contract does. `amount_gwei` is little-endian encoded into the leaf.
pub fn compute_deposit_data_root(
    pubkey: &[u8],
    withdrawal_credentials: &[u8; 32],
    amount_gwei: u64,
    signature: &[u8],
) -> [u8; 32] {
    let pubkey_root = sha256(&[pubkey, &[0u8; 16]]);

    let (sig_head, sig_tail) = signature.split_at(signature.len().min(64));
    let signature_root = sha256(&[&sha256(&[sig_head]), &sha256(&[sig_tail, &[0u8; 32]])]);

    sha256(&[
        &sha256(&[&pubkey_root, withdrawal_credentials]),
        &sha256(&[&amount_gwei.to_le_bytes(), &[0u8; 24], &signature_root]),
    ])
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Reference deposit contract. Records every accepted deposit.
#[derive(Debug)]
pub struct DepositContract {
    amount_multiplier: u64,
    deposits: Mutex<Vec<DepositRequest>>,
}

impl Default for DepositContract {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositContract {
    /// Native-value deposit contract.
    pub fn new() -> Self {
        Self::with_amount_multiplier(1)
    }

    /// Token-denominated deposit contract: one token unit stakes
    /// `amount_multiplier` native units.
    pub fn with_amount_multiplier(amount_multiplier: u64) -> Self {
        Self {
            amount_multiplier,
            deposits: Mutex::new(Vec::new()),
        }
    }

    /// Staked amount in gwei for a raw `amount`, validated as the contract
    /// validates `msg.value`.
    pub fn stake_gwei(&self, amount: Amount) -> Result<u64, RegistrarError> {
        let staked = amount
            .checked_mul(Amount::from(self.amount_multiplier))
            .ok_or(RegistrarError::DepositTooHigh(amount))?;
        if staked < Amount::from(SHARE_SCALE) {
            return Err(RegistrarError::DepositTooLow(amount));
        }
        if !(staked % Amount::from(GWEI)).is_zero() {
            return Err(RegistrarError::NotGweiMultiple(amount));
        }
        let gwei = staked / Amount::from(GWEI);
        if gwei > Amount::from(u64::MAX) {
            return Err(RegistrarError::DepositTooHigh(amount));
        }
        Ok(gwei.as_u64())
    }

    pub fn deposits(&self) -> Vec<DepositRequest> {
        self.deposits.lock().clone()
    }

    pub fn deposit_count(&self) -> usize {
        self.deposits.lock().len()
    }
}

impl Registrar for DepositContract {
    fn register(&self, request: &DepositRequest) -> Result<(), RegistrarError> {
        if request.pubkey.len() != PUBKEY_LENGTH {
            return Err(RegistrarError::InvalidPubkeyLength(request.pubkey.len()));
        }
        if request.signature.len() != SIGNATURE_LENGTH {
            return Err(RegistrarError::InvalidSignatureLength(
                request.signature.len(),
            ));
        }
        let amount_gwei = self.stake_gwei(request.amount)?;

        let root = compute_deposit_data_root(
            &request.pubkey,
            &request.withdrawal_credentials,
            amount_gwei,
            &request.signature,
        );
        if root != request.deposit_data_root {
            debug!(
                expected = %hex::encode(root),
                supplied = %hex::encode(request.deposit_data_root),
                "deposit data root mismatch"
            );
            return Err(RegistrarError::RootMismatch);
        }

        let mut deposits = self.deposits.lock();
        deposits.push(request.clone());
        info!(
            deposit_count = deposits.len(),
            amount_gwei,
            pubkey = %hex::encode(&request.pubkey),
            "validator deposit registered"
        );
        Ok(())
    }
}
