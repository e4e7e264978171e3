//! Validates incoming value against a pool and applies it.
//!
//! Policy: contributors may pay in any number of installments. Each one must
//! be positive and the cumulative sum may reach but never exceed the
//! contributor's expected amount. Overage is rejected, never capped.

use primitive_types::U512;
use tracing::debug;

use crate::errors::{PoolError, Result};
use crate::types::{Amount, Pool, PoolStatus, SHARE_SCALE};

/// Outcome of an accepted contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub new_total: Amount,
    /// The contribution moved the pool from `Open` to `Filled`.
    pub filled: bool,
}

/// `deposited / target` scaled by [`SHARE_SCALE`].
pub fn compute_share(deposited: Amount, target: Amount) -> Amount {
    if target.is_zero() {
        return Amount::zero();
    }
    let scaled = deposited.full_mul(Amount::from(SHARE_SCALE)) / U512::from(target);
    Amount::try_from(scaled).unwrap_or(Amount::MAX)
}

/// Check that `amount` may be credited to the contributor at `position`.
/// Does not mutate.
pub fn check_contribution(pool: &Pool, position: usize, amount: Amount) -> Result<()> {
    match pool.status() {
        PoolStatus::Open => {}
        PoolStatus::Filled => return Err(PoolError::AlreadyFilled(pool.index)),
        PoolStatus::Finalized => return Err(PoolError::PoolNotOpen(pool.index)),
    }

    let contributor = pool
        .contributors
        .get(position)
        .ok_or(PoolError::UnknownContributor {
            pool_index: pool.index,
            position,
        })?;

    if amount.is_zero() {
        return Err(PoolError::InvalidInput("contribution amount is zero".into()));
    }

    let remaining_commitment = contributor.remaining_commitment();
    if amount > remaining_commitment {
        return Err(PoolError::AmountExceedsCommitment {
            pool_index: pool.index,
            position,
            amount,
            remaining: remaining_commitment,
        });
    }

    let remaining_target = pool.target_amount.saturating_sub(pool.total_deposited());
    if amount > remaining_target {
        return Err(PoolError::Overfunded {
            pool_index: pool.index,
            amount,
            remaining: remaining_target,
        });
    }
    Ok(())
}

/// Validate and credit `amount` to the contributor at `position`.
///
/// Either the whole amount is recorded or the pool is left untouched. The
/// fill condition is re-evaluated in the same step, so the pool can never be
/// observed with a full balance while still reporting `Open`.
pub fn apply_contribution(pool: &mut Pool, position: usize, amount: Amount) -> Result<Applied> {
    check_contribution(pool, position, amount)?;

    let target = pool.target_amount;
    let contributor = &mut pool.contributors[position];
    contributor.deposited_amount += amount;
    contributor.share = compute_share(contributor.deposited_amount, target);

    let new_total = pool.total_deposited();
    let filled = pool.is_filled();
    debug!(
        pool_index = pool.index,
        position,
        %amount,
        %new_total,
        filled,
        "contribution applied"
    );
    Ok(Applied { new_total, filled })
}
