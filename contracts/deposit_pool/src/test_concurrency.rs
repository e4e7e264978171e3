use std::sync::{Arc, Barrier};
use std::thread;

use crate::invariants::{assert_all_pool_invariants, assert_sequential_indices};
use crate::registrar::compute_deposit_data_root;
use crate::types::{PUBKEY_LENGTH, SIGNATURE_LENGTH};
use crate::{
    ether, withdrawal_credentials, Address, DepositContract, EngineConfig, EventLog,
    PoolCreator, PoolError, PoolStatus,
};

const ADMIN: Address = Address([0xad; 20]);
const ALICE: Address = Address([0xa1; 20]);
const BOB: Address = Address([0xb0; 20]);
const CAROL: Address = Address([0xca; 20]);

fn setup() -> (Arc<PoolCreator>, Arc<DepositContract>) {
    let registrar = Arc::new(DepositContract::new());
    let engine = PoolCreator::new(
        EngineConfig::native(ADMIN),
        registrar.clone(),
        Arc::new(EventLog::new()),
    )
    .unwrap();
    (Arc::new(engine), registrar)
}

fn friend(i: usize) -> Address {
    let mut bytes = [0x10; 20];
    bytes[18] = (i >> 8) as u8;
    bytes[19] = i as u8;
    Address(bytes)
}

#[test]
fn test_racing_deposits_cannot_jointly_overshoot() {
    for _ in 0..200 {
        let (engine, _) = setup();
        // 10 paid at setup leaves 22; Bob and Carol may each pay 20 alone.
        let index = engine
            .setup(
                ALICE,
                ether(10),
                vec![ALICE, BOB, CAROL],
                vec![ether(10), ether(20), ether(20)],
            )
            .unwrap();

        let barrier = Barrier::new(2);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = [(BOB, 1usize), (CAROL, 2usize)]
                .into_iter()
                .map(|(caller, position)| {
                    let engine = &engine;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        engine.deposit(caller, ether(20), index, position)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        let overfunded = results
            .iter()
            .filter(|r| matches!(r, Err(PoolError::Overfunded { .. })))
            .count();
        assert_eq!((accepted, overfunded), (1, 1));

        let pool = engine.get_pool(index).unwrap();
        assert_eq!(pool.total_deposited(), ether(30));
        assert_eq!(pool.status(), PoolStatus::Open);
        assert_all_pool_invariants(&pool);
    }
}

#[test]
fn test_concurrent_installments_fill_exactly() {
    const FRIENDS: usize = 16;
    let (engine, _) = setup();
    let addresses: Vec<_> = (0..FRIENDS).map(friend).collect();
    // Every friend commits 2 ether and pays it in two halves.
    let index = engine
        .setup(friend(0), ether(2), addresses, vec![ether(2); FRIENDS])
        .unwrap();

    let barrier = Barrier::new(2 * (FRIENDS - 1));
    thread::scope(|s| {
        for position in 1..FRIENDS {
            for _ in 0..2 {
                let engine = &engine;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine
                        .deposit(friend(position), ether(1), index, position)
                        .unwrap();
                });
            }
        }
    });

    let pool = engine.get_pool(index).unwrap();
    assert_eq!(pool.total_deposited(), ether(32));
    assert_eq!(pool.status(), PoolStatus::Filled);
    assert_all_pool_invariants(&pool);
    assert_eq!(engine.balances().accounted, ether(32));
}

#[test]
fn test_concurrent_setups_get_distinct_indices() {
    const CREATORS: usize = 24;
    let (engine, _) = setup();
    let barrier = Barrier::new(CREATORS);

    let mut indices: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..CREATORS)
            .map(|i| {
                let engine = &engine;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine
                        .setup(friend(i), ether(1), vec![friend(i)], vec![ether(1)])
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    indices.sort_unstable();
    assert_eq!(indices, (0..CREATORS as u64).collect::<Vec<_>>());

    let pools: Vec<_> = indices.iter().map(|i| engine.get_pool(*i).unwrap()).collect();
    assert_sequential_indices(&pools);
    for pool in &pools {
        assert_eq!(pool.contributors[0].address, pool.reward_address);
    }
}

#[test]
fn test_racing_finalizations_register_once() {
    let (engine, registrar) = setup();
    let index = engine
        .setup(ALICE, ether(32), vec![ALICE], vec![ether(32)])
        .unwrap();

    let pubkey = vec![0x42; PUBKEY_LENGTH];
    let signature = vec![0x24; SIGNATURE_LENGTH];
    let root = compute_deposit_data_root(
        &pubkey,
        &withdrawal_credentials(&ALICE),
        32_000_000_000,
        &signature,
    );

    let barrier = Barrier::new(4);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = &engine;
                let barrier = &barrier;
                let (pubkey, signature) = (pubkey.clone(), signature.clone());
                s.spawn(move || {
                    barrier.wait();
                    engine.finalize(ALICE, index, pubkey, signature, root)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, PoolError::PoolNotFilled(_))));
    assert_eq!(registrar.deposit_count(), 1);
}
