//! Finalization: forward a filled pool to the registrar exactly once.

use tracing::{info, warn};

use crate::errors::{PoolError, Result};
use crate::registrar::{DepositRequest, Registrar};
use crate::types::{Address, DepositRecord, Pool, PoolStatus};

/// Discriminant of an address-type (0x01) withdrawal credential.
pub const ETH1_ADDRESS_WITHDRAWAL_PREFIX: u8 = 0x01;

/// `0x01 ‖ 11 zero bytes ‖ 20-byte address`.
pub fn withdrawal_credentials(reward_address: &Address) -> [u8; 32] {
    let mut credentials = [0u8; 32];
    credentials[0] = ETH1_ADDRESS_WITHDRAWAL_PREFIX;
    credentials[12..].copy_from_slice(reward_address.as_bytes());
    credentials
}

/// Validator data supplied by the finalizing caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorDeposit {
    pub pubkey: Vec<u8>,
    pub signature: Vec<u8>,
    pub deposit_data_root: [u8; 32],
}

/// Forward `pool` to `registrar` and record the deposit.
///
/// The pool is only written after the registrar accepted, so any failure
/// leaves it `Filled` and the call can be retried with corrected data.
pub fn finalize_pool(
    pool: &mut Pool,
    caller: &Address,
    validator: ValidatorDeposit,
    registrar: &dyn Registrar,
) -> Result<()> {
    match pool.status() {
        PoolStatus::Filled => {}
        PoolStatus::Open | PoolStatus::Finalized => {
            return Err(PoolError::PoolNotFilled(pool.index))
        }
    }
    if caller != &pool.reward_address {
        return Err(PoolError::Unauthorized(format!(
            "{caller} may not finalize pool {}",
            pool.index
        )));
    }

    let credentials = withdrawal_credentials(&pool.reward_address);
    let request = DepositRequest {
        pubkey: validator.pubkey,
        signature: validator.signature,
        withdrawal_credentials: credentials,
        deposit_data_root: validator.deposit_data_root,
        amount: pool.target_amount,
    };

    if let Err(e) = registrar.register(&request) {
        warn!(pool_index = pool.index, error = %e, "registrar rejected finalization");
        return Err(e.into());
    }

    pool.deposit_record = Some(DepositRecord {
        validator_pubkey: request.pubkey,
        signature: request.signature,
        deposit_data_root: request.deposit_data_root.to_vec(),
        withdrawal_credentials: credentials.to_vec(),
    });
    info!(
        pool_index = pool.index,
        reward_address = %pool.reward_address,
        amount = %pool.target_amount,
        "pool finalized"
    );
    Ok(())
}
