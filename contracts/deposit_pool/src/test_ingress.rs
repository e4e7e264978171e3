use std::sync::Arc;

use crate::registrar::compute_deposit_data_root;
use crate::types::{PUBKEY_LENGTH, SIGNATURE_LENGTH};
use crate::{
    ether, withdrawal_credentials, Address, Amount, Command, DepositContract, EngineConfig,
    EventLog, FundingAsset, PoolCreator, PoolError, PoolEvent, PoolStatus, TokenReceipt,
};

const ADMIN: Address = Address([0xad; 20]);
const TOKEN: Address = Address([0x70; 20]);
const ALICE: Address = Address([0xa1; 20]);
const BOB: Address = Address([0xb0; 20]);

fn token_engine() -> (PoolCreator, Arc<DepositContract>, Arc<EventLog>) {
    let registrar = Arc::new(DepositContract::with_amount_multiplier(32));
    let events = Arc::new(EventLog::new());
    let engine = PoolCreator::new(
        EngineConfig::token(ADMIN, TOKEN),
        registrar.clone(),
        events.clone(),
    )
    .unwrap();
    (engine, registrar, events)
}

/// Native engine with the same one-token target, for side-by-side runs.
fn native_engine() -> (PoolCreator, Arc<EventLog>) {
    let events = Arc::new(EventLog::new());
    let engine = PoolCreator::new(
        EngineConfig {
            admin: ADMIN,
            target_amount: ether(1),
            funding: FundingAsset::Native,
        },
        Arc::new(DepositContract::new()),
        events.clone(),
    )
    .unwrap();
    (engine, events)
}

fn tenths(n: u64) -> Amount {
    ether(1) * n / 10
}

fn setup_payload() -> Vec<u8> {
    Command::Setup {
        addresses: vec![ALICE, BOB],
        expected_amounts: vec![tenths(8), tenths(2)],
    }
    .encode()
}

fn deposit_payload(pool_index: u64, contributor_position: usize) -> Vec<u8> {
    Command::Deposit {
        pool_index,
        contributor_position,
    }
    .encode()
}

#[test]
fn test_token_setup_matches_direct_value_setup() {
    let (token, _, token_events) = token_engine();
    let (native, native_events) = native_engine();

    let receipt = token
        .on_token_received(TOKEN, ALICE, tenths(8), &setup_payload())
        .unwrap();
    assert_eq!(receipt, TokenReceipt::PoolCreated(0));
    native
        .setup(ALICE, tenths(8), vec![ALICE, BOB], vec![tenths(8), tenths(2)])
        .unwrap();

    assert_eq!(token.get_pool(0).unwrap(), native.get_pool(0).unwrap());
    assert_eq!(token.balances(), native.balances());

    token
        .on_token_received(TOKEN, BOB, tenths(2), &deposit_payload(0, 1))
        .unwrap();
    native.deposit(BOB, tenths(2), 0, 1).unwrap();

    let pool = token.get_pool(0).unwrap();
    assert_eq!(pool, native.get_pool(0).unwrap());
    assert_eq!(pool.status(), PoolStatus::Filled);
    assert_eq!(token_events.all(), native_events.all());
}

#[test]
fn test_token_pool_finalizes_through_token_registrar() {
    let (engine, registrar, events) = token_engine();
    engine
        .on_token_received(TOKEN, ALICE, tenths(8), &setup_payload())
        .unwrap();
    engine
        .on_token_received(TOKEN, BOB, tenths(2), &deposit_payload(0, 1))
        .unwrap();

    let pubkey = vec![0x01; PUBKEY_LENGTH];
    let signature = vec![0x02; SIGNATURE_LENGTH];
    // One token stakes 32 units.
    let root = compute_deposit_data_root(
        &pubkey,
        &withdrawal_credentials(&ALICE),
        32_000_000_000,
        &signature,
    );
    engine.finalize(ALICE, 0, pubkey, signature, root).unwrap();

    assert_eq!(registrar.deposit_count(), 1);
    // A consumer that only saw the token transfer finds the pool here.
    assert_eq!(
        events.last(),
        Some(PoolEvent::Finalized {
            pool_index: 0,
            reward_address: ALICE
        })
    );
}

#[test]
fn test_callback_from_other_token_is_unauthorized() {
    let (engine, _, _) = token_engine();
    let err = engine
        .on_token_received(Address([0x66; 20]), ALICE, tenths(8), &setup_payload())
        .unwrap_err();
    assert!(matches!(err, PoolError::Unauthorized(_)));
    assert_eq!(engine.pool_count(), 0);
}

#[test]
fn test_native_engine_rejects_token_callback() {
    let (engine, _) = native_engine();
    let err = engine
        .on_token_received(TOKEN, ALICE, tenths(8), &setup_payload())
        .unwrap_err();
    assert!(matches!(err, PoolError::IngressDisabled(_)));
}

#[test]
fn test_malformed_payloads_change_nothing() {
    let (engine, _, events) = token_engine();

    let mut unknown = setup_payload();
    unknown[0] = 0x07;
    assert!(matches!(
        engine.on_token_received(TOKEN, ALICE, tenths(8), &unknown),
        Err(PoolError::UnknownOperation(0x07))
    ));

    let mut truncated = setup_payload();
    truncated.truncate(40);
    assert!(matches!(
        engine.on_token_received(TOKEN, ALICE, tenths(8), &truncated),
        Err(PoolError::DecodeError(_))
    ));

    assert!(matches!(
        engine.on_token_received(TOKEN, ALICE, tenths(8), &[]),
        Err(PoolError::DecodeError(_))
    ));

    assert_eq!(engine.pool_count(), 0);
    assert!(events.all().is_empty());
    assert_eq!(engine.balances().held, Amount::zero());
}

#[test]
fn test_token_deposit_uses_sender_as_caller() {
    let (engine, _, _) = token_engine();
    engine
        .on_token_received(TOKEN, ALICE, tenths(8), &setup_payload())
        .unwrap();

    let err = engine
        .on_token_received(TOKEN, ALICE, tenths(2), &deposit_payload(0, 1))
        .unwrap_err();
    assert!(matches!(err, PoolError::Unauthorized(_)));

    let receipt = engine
        .on_token_received(TOKEN, BOB, tenths(1), &deposit_payload(0, 1))
        .unwrap();
    assert_eq!(
        receipt,
        TokenReceipt::Deposited {
            pool_index: 0,
            position: 1
        }
    );
    assert_eq!(
        engine.get_pool(0).unwrap().contributors[1].deposited_amount,
        tenths(1)
    );
}

#[test]
fn test_stray_token_transfer_is_sweepable() {
    let (engine, _, _) = token_engine();
    engine
        .on_token_received(TOKEN, ALICE, tenths(8), &setup_payload())
        .unwrap();
    engine.receive(BOB, tenths(5));

    assert_eq!(engine.rugpull(ADMIN).unwrap().amount, tenths(5));
    assert_eq!(engine.balances().held, tenths(8));
}
