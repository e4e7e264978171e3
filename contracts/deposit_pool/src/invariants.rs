#![allow(dead_code)]

use crate::contribution::compute_share;
use crate::types::{Pool, PoolStatus};

/// INV-1: the pool never holds more than its target.
pub fn assert_total_within_target(pool: &Pool) {
    assert!(
        pool.total_deposited() <= pool.target_amount,
        "INV-1 violated: pool {} holds {} above target {}",
        pool.index,
        pool.total_deposited(),
        pool.target_amount
    );
}

/// INV-2: no contributor pays more than they committed.
pub fn assert_within_commitments(pool: &Pool) {
    for (position, c) in pool.contributors.iter().enumerate() {
        assert!(
            c.deposited_amount <= c.expected_amount,
            "INV-2 violated: pool {} contributor {} deposited {} > expected {}",
            pool.index,
            position,
            c.deposited_amount,
            c.expected_amount
        );
    }
}

/// INV-3: `Filled` exactly when the sum equals the target; a deposit record
/// only exists on a pool that was filled.
pub fn assert_status_matches_balances(pool: &Pool) {
    let full = pool.total_deposited() == pool.target_amount;
    match pool.status() {
        PoolStatus::Open => assert!(!full, "INV-3 violated: pool {} full but Open", pool.index),
        PoolStatus::Filled | PoolStatus::Finalized => assert!(
            full,
            "INV-3 violated: pool {} is {:?} below target",
            pool.index,
            pool.status()
        ),
    }
}

/// INV-4: every share matches its deposited amount.
pub fn assert_shares_consistent(pool: &Pool) {
    for c in &pool.contributors {
        assert_eq!(
            c.share,
            compute_share(c.deposited_amount, pool.target_amount),
            "INV-4 violated: stale share in pool {}",
            pool.index
        );
    }
}

/// INV-5: pool indices are sequential starting from 0.
pub fn assert_sequential_indices(pools: &[Pool]) {
    for (i, pool) in pools.iter().enumerate() {
        assert_eq!(
            pool.index, i as u64,
            "INV-5 violated: expected index {}, got {}",
            i, pool.index
        );
    }
}

/// INV-6: only `Open -> Filled -> Finalized` (or staying put) is possible.
pub fn assert_valid_status_transition(from: PoolStatus, to: PoolStatus) {
    let valid = matches!(
        (from, to),
        (PoolStatus::Open, PoolStatus::Open)
            | (PoolStatus::Open, PoolStatus::Filled)
            | (PoolStatus::Filled, PoolStatus::Filled)
            | (PoolStatus::Filled, PoolStatus::Finalized)
            | (PoolStatus::Finalized, PoolStatus::Finalized)
    );
    assert!(
        valid,
        "INV-6 violated: invalid status transition from {:?} to {:?}",
        from, to
    );
}

/// INV-7: identity, target and the contributor list never change.
pub fn assert_immutable_fields(original: &Pool, current: &Pool) {
    assert_eq!(original.index, current.index, "INV-7 violated: index changed");
    assert_eq!(
        original.target_amount, current.target_amount,
        "INV-7 violated: target changed"
    );
    assert_eq!(
        original.reward_address, current.reward_address,
        "INV-7 violated: reward address changed"
    );
    assert_eq!(
        original.contributors.len(),
        current.contributors.len(),
        "INV-7 violated: contributor list resized"
    );
    for (a, b) in original.contributors.iter().zip(&current.contributors) {
        assert_eq!(a.address, b.address, "INV-7 violated: contributor replaced");
        assert_eq!(
            a.expected_amount, b.expected_amount,
            "INV-7 violated: commitment changed"
        );
        assert!(
            b.deposited_amount >= a.deposited_amount,
            "INV-7 violated: deposited amount decreased"
        );
    }
}

/// Run all stateless pool invariants.
pub fn assert_all_pool_invariants(pool: &Pool) {
    assert_total_within_target(pool);
    assert_within_commitments(pool);
    assert_status_matches_balances(pool);
    assert_shares_consistent(pool);
}
