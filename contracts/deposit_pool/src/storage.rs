//! # Storage
//!
//! The pool ledger: an append-only table of pools, each behind its own lock.
//!
//! | Structure         | Lock                  | Held for                         |
//! |-------------------|-----------------------|----------------------------------|
//! | pool table        | `RwLock<Vec<..>>`     | index assignment / slot lookup   |
//! | single pool       | `Mutex<Pool>`         | validation + mutation of a pool  |
//!
//! Operations on different pools never wait on each other: the table lock is
//! only held long enough to clone the pool's `Arc`, except during creation
//! where it is held until the new pool is fully initialised.
//!
//! Pools are never removed. Finalized pools stay queryable for audit.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::errors::{PoolError, Result};
use crate::types::{Address, Amount, Contributor, Pool};

#[derive(Debug, Default)]
pub struct Ledger {
    pools: RwLock<Vec<Arc<Mutex<Pool>>>>,
}

/// Check setup arguments: non-empty, same length, distinct addresses,
/// positive amounts.
pub fn validate_setup(addresses: &[Address], expected_amounts: &[Amount]) -> Result<()> {
    if addresses.is_empty() {
        return Err(PoolError::InvalidInput("contributor list is empty".into()));
    }
    if addresses.len() != expected_amounts.len() {
        return Err(PoolError::InvalidInput(format!(
            "{} addresses but {} expected amounts",
            addresses.len(),
            expected_amounts.len()
        )));
    }
    let mut seen = HashSet::with_capacity(addresses.len());
    for address in addresses {
        if !seen.insert(address) {
            return Err(PoolError::InvalidInput(format!(
                "duplicate address {address}"
            )));
        }
    }
    if let Some(position) = expected_amounts.iter().position(Amount::is_zero) {
        return Err(PoolError::InvalidInput(format!(
            "expected amount at position {position} is zero"
        )));
    }
    Ok(())
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool with its final contributor list. Returns the new index.
    pub fn create_pool(
        &self,
        target_amount: Amount,
        addresses: &[Address],
        expected_amounts: &[Amount],
    ) -> Result<u64> {
        self.create_pool_with(target_amount, addresses, expected_amounts, |_| Ok(()))
    }

    /// Create a pool and run `init` on it before it becomes visible.
    ///
    /// The table stays write-locked while `init` runs, so the pool is
    /// published either fully initialised or not at all. If `init` fails no
    /// index is consumed.
    pub fn create_pool_with<F>(
        &self,
        target_amount: Amount,
        addresses: &[Address],
        expected_amounts: &[Amount],
        init: F,
    ) -> Result<u64>
    where
        F: FnOnce(&mut Pool) -> Result<()>,
    {
        if target_amount.is_zero() {
            return Err(PoolError::InvalidInput("target amount is zero".into()));
        }
        validate_setup(addresses, expected_amounts)?;

        let mut pools = self.pools.write();
        let index = pools.len() as u64;
        let mut pool = Pool {
            index,
            target_amount,
            reward_address: addresses[0],
            contributors: addresses
                .iter()
                .zip(expected_amounts)
                .map(|(address, expected)| Contributor::new(*address, *expected))
                .collect(),
            deposit_record: None,
        };
        init(&mut pool)?;

        pools.push(Arc::new(Mutex::new(pool)));
        debug!(pool_index = index, contributors = addresses.len(), "pool stored");
        Ok(index)
    }

    /// Snapshot of a pool.
    pub fn get_pool(&self, index: u64) -> Result<Pool> {
        let slot = self.slot(index)?;
        let pool = slot.lock();
        Ok(pool.clone())
    }

    /// Position of `address` within the pool, or `None` for non-participants.
    pub fn find_contributor(&self, index: u64, address: &Address) -> Result<Option<usize>> {
        let slot = self.slot(index)?;
        let pool = slot.lock();
        Ok(pool.find_contributor(address))
    }

    /// Run `f` with exclusive access to one pool.
    ///
    /// `f` must validate before it mutates: an `Err` from `f` is propagated
    /// as-is and nothing is undone on its behalf.
    pub fn with_pool<T, F>(&self, index: u64, f: F) -> Result<T>
    where
        F: FnOnce(&mut Pool) -> Result<T>,
    {
        let slot = self.slot(index)?;
        let mut pool = slot.lock();
        f(&mut pool)
    }

    pub fn pool_count(&self) -> u64 {
        self.pools.read().len() as u64
    }

    fn slot(&self, index: u64) -> Result<Arc<Mutex<Pool>>> {
        let pools = self.pools.read();
        usize::try_from(index)
            .ok()
            .and_then(|i| pools.get(i))
            .cloned()
            .ok_or(PoolError::NotFound(index))
    }
}
