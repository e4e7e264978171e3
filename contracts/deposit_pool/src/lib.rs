//! # Deposit Pool Engine
//!
//! A small group of friends jointly fund one fixed-size validator deposit.
//! Each friend commits to an amount at setup, pays it in one or more
//! installments, and once the pool holds exactly the target the pool creator
//! forwards everything to the deposit registrar in a single, irreversible
//! finalization.
//!
//! | Phase        | Entry Point(s)                                         |
//! |--------------|--------------------------------------------------------|
//! | Setup        | [`PoolCreator::setup`], token payload `0x00`           |
//! | Funding      | [`PoolCreator::deposit`], token payload `0x01`         |
//! | Token path   | [`PoolCreator::on_token_received`]                     |
//! | Finalization | [`PoolCreator::finalize`]                              |
//! | Admin        | [`PoolCreator::rugpull`]                               |
//! | Queries      | `get_pool`, `find_contributor`, `contributor_view`     |
//!
//! ## Architecture
//!
//! Storage lives in [`storage`], contribution rules in [`contribution`],
//! the registrar hand-off in [`finalize`], and payload decoding in
//! [`ingress`]. This file wires them together: it checks who is calling,
//! keeps the [`treasury`] balances in step with the ledger and publishes
//! events. Every entry point either applies fully or returns an error with
//! no side effects.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

pub mod contribution;
pub mod errors;
pub mod events;
pub mod finalize;
pub mod ingress;
pub mod registrar;
pub mod storage;
pub mod treasury;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_concurrency;
#[cfg(test)]
mod test_ingress;

pub use errors::{PoolError, Result};
pub use events::{EventLog, EventSink, PoolEvent};
pub use finalize::{withdrawal_credentials, ValidatorDeposit};
pub use ingress::Command;
pub use registrar::{DepositContract, DepositRequest, Registrar, RegistrarError};
pub use treasury::Balances;
pub use types::{
    ether, Address, Amount, Contributor, ContributorView, DepositRecord, Pool, PoolStatus,
};

use storage::Ledger;
use treasury::Treasury;

/// 32 ether: the native-value validator deposit.
pub fn native_deposit_amount() -> Amount {
    ether(32)
}

/// 1 token: the token-denominated validator deposit.
pub fn token_deposit_amount() -> Amount {
    ether(1)
}

/// Which funding protocol an engine instance accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingAsset {
    /// Direct value transfers via [`PoolCreator::setup`] / [`PoolCreator::deposit`].
    Native,
    /// Transfer-with-payload callbacks from this token contract.
    Token(Address),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The only identity allowed to call [`PoolCreator::rugpull`].
    pub admin: Address,
    /// Amount every pool must collect before finalization.
    pub target_amount: Amount,
    pub funding: FundingAsset,
}

impl EngineConfig {
    pub fn native(admin: Address) -> Self {
        Self {
            admin,
            target_amount: native_deposit_amount(),
            funding: FundingAsset::Native,
        }
    }

    pub fn token(admin: Address, token: Address) -> Self {
        Self {
            admin,
            target_amount: token_deposit_amount(),
            funding: FundingAsset::Token(token),
        }
    }
}

/// Result of an administrative sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sweep {
    pub to: Address,
    pub amount: Amount,
}

/// What a token callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenReceipt {
    PoolCreated(u64),
    Deposited { pool_index: u64, position: usize },
}

pub struct PoolCreator {
    config: EngineConfig,
    ledger: Ledger,
    treasury: Mutex<Treasury>,
    registrar: Arc<dyn Registrar>,
    events: Arc<dyn EventSink>,
}

impl PoolCreator {
    pub fn new(
        config: EngineConfig,
        registrar: Arc<dyn Registrar>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        if config.target_amount.is_zero() {
            return Err(PoolError::InvalidInput("target amount is zero".into()));
        }
        info!(
            admin = %config.admin,
            target = %config.target_amount,
            funding = ?config.funding,
            "deposit pool engine ready"
        );
        Ok(Self {
            config,
            ledger: Ledger::new(),
            treasury: Mutex::new(Treasury::default()),
            registrar,
            events,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────
    // Direct-value ingress
    // ─────────────────────────────────────────────────────────

    /// Create a pool and pay the creator's own share in one step.
    ///
    /// `caller` must be `addresses[0]` and `value` must equal
    /// `expected_amounts[0]`.
    pub fn setup(
        &self,
        caller: Address,
        value: Amount,
        addresses: Vec<Address>,
        expected_amounts: Vec<Amount>,
    ) -> Result<u64> {
        self.require_native()?;
        self.create(caller, value, &addresses, &expected_amounts)
    }

    /// Pay `value` towards the commitment of the contributor at
    /// `contributor_position`. `caller` must be that contributor.
    pub fn deposit(
        &self,
        caller: Address,
        value: Amount,
        pool_index: u64,
        contributor_position: usize,
    ) -> Result<()> {
        self.require_native()?;
        self.contribute(caller, value, pool_index, contributor_position)
    }

    // ─────────────────────────────────────────────────────────
    // Token-callback ingress
    // ─────────────────────────────────────────────────────────

    /// Transfer-with-payload callback. `token` is the calling token
    /// contract, `from` the original sender and `amount` the tokens moved.
    pub fn on_token_received(
        &self,
        token: Address,
        from: Address,
        amount: Amount,
        payload: &[u8],
    ) -> Result<TokenReceipt> {
        match self.config.funding {
            FundingAsset::Token(accepted) if accepted == token => {}
            FundingAsset::Token(_) => {
                return Err(PoolError::Unauthorized(format!(
                    "callback from unexpected token {token}"
                )))
            }
            FundingAsset::Native => return Err(PoolError::IngressDisabled("token callback")),
        }
        match Command::decode(payload)? {
            Command::Setup {
                addresses,
                expected_amounts,
            } => self
                .create(from, amount, &addresses, &expected_amounts)
                .map(TokenReceipt::PoolCreated),
            Command::Deposit {
                pool_index,
                contributor_position,
            } => self
                .contribute(from, amount, pool_index, contributor_position)
                .map(|()| TokenReceipt::Deposited {
                    pool_index,
                    position: contributor_position,
                }),
        }
    }

    /// Value that reached the engine without going through an ingress
    /// path. It is never attributed to a pool and can only be swept.
    pub fn receive(&self, from: Address, amount: Amount) {
        self.treasury.lock().credit_unaccounted(amount);
        warn!(%from, %amount, "unattributed transfer received");
    }

    fn create(
        &self,
        caller: Address,
        value: Amount,
        addresses: &[Address],
        expected_amounts: &[Amount],
    ) -> Result<u64> {
        storage::validate_setup(addresses, expected_amounts)?;
        if caller != addresses[0] {
            return Err(PoolError::Unauthorized(format!(
                "setup must be sent by the first friend {}, not {caller}",
                addresses[0]
            )));
        }
        if value != expected_amounts[0] {
            return Err(PoolError::InvalidInput(format!(
                "setup value {value} does not match the first friend's expected amount {}",
                expected_amounts[0]
            )));
        }

        let expected_total = expected_amounts
            .iter()
            .try_fold(Amount::zero(), |acc, a| acc.checked_add(*a));
        if expected_total.map_or(true, |total| total < self.config.target_amount) {
            warn!(
                target = %self.config.target_amount,
                "expected amounts do not add up to the target; the pool cannot fill"
            );
        }

        self.ledger.create_pool_with(
            self.config.target_amount,
            addresses,
            expected_amounts,
            |pool| {
                let applied = contribution::apply_contribution(pool, 0, value)?;
                self.treasury.lock().credit_pool(value);
                self.events.publish(PoolEvent::PoolCreated {
                    pool_index: pool.index,
                    reward_address: pool.reward_address,
                    addresses: addresses.to_vec(),
                    expected_amounts: expected_amounts.to_vec(),
                });
                self.events.publish(PoolEvent::DepositApplied {
                    pool_index: pool.index,
                    contributor_position: 0,
                    amount: value,
                    new_total: applied.new_total,
                });
                info!(
                    pool_index = pool.index,
                    reward_address = %pool.reward_address,
                    friends = addresses.len(),
                    "pool created"
                );
                Ok(())
            },
        )
    }

    fn contribute(
        &self,
        caller: Address,
        value: Amount,
        pool_index: u64,
        position: usize,
    ) -> Result<()> {
        self.ledger.with_pool(pool_index, |pool| {
            contribution::check_contribution(pool, position, value)?;
            if pool.contributors[position].address != caller {
                return Err(PoolError::Unauthorized(format!(
                    "{caller} is not contributor {position} of pool {pool_index}"
                )));
            }

            let applied = contribution::apply_contribution(pool, position, value)?;
            self.treasury.lock().credit_pool(value);
            self.events.publish(PoolEvent::DepositApplied {
                pool_index,
                contributor_position: position,
                amount: value,
                new_total: applied.new_total,
            });
            if applied.filled {
                info!(pool_index, "pool filled");
            }
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────
    // Finalization
    // ─────────────────────────────────────────────────────────

    /// Forward a filled pool to the registrar.
    ///
    /// Only the pool's reward address (the account that ran setup) may
    /// finalize. On any failure the pool stays `Filled`.
    pub fn finalize(
        &self,
        caller: Address,
        pool_index: u64,
        validator_pubkey: Vec<u8>,
        signature: Vec<u8>,
        deposit_data_root: [u8; 32],
    ) -> Result<()> {
        self.ledger.with_pool(pool_index, |pool| {
            finalize::finalize_pool(
                pool,
                &caller,
                ValidatorDeposit {
                    pubkey: validator_pubkey,
                    signature,
                    deposit_data_root,
                },
                self.registrar.as_ref(),
            )?;
            self.treasury.lock().debit_pool(pool.target_amount);
            self.events.publish(PoolEvent::Finalized {
                pool_index,
                reward_address: pool.reward_address,
            });
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────
    // Emergency withdrawal
    // ─────────────────────────────────────────────────────────

    /// Sweep the unaccounted remainder to the administrator.
    pub fn rugpull(&self, caller: Address) -> Result<Sweep> {
        if caller != self.config.admin {
            warn!(%caller, "rugpull attempted by non-admin");
            return Err(PoolError::Unauthorized(format!(
                "{caller} is not the administrator"
            )));
        }
        let amount = self.treasury.lock().sweep();
        let sweep = Sweep {
            to: self.config.admin,
            amount,
        };
        self.events.publish(PoolEvent::Swept {
            to: sweep.to,
            amount,
        });
        warn!(to = %sweep.to, %amount, "residual balance swept");
        Ok(sweep)
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    pub fn get_pool(&self, pool_index: u64) -> Result<Pool> {
        self.ledger.get_pool(pool_index)
    }

    pub fn find_contributor(&self, pool_index: u64, address: &Address) -> Result<Option<usize>> {
        self.ledger.find_contributor(pool_index, address)
    }

    pub fn contributor_view(
        &self,
        pool_index: u64,
        address: &Address,
    ) -> Result<Option<ContributorView>> {
        let pool = self.ledger.get_pool(pool_index)?;
        Ok(pool.find_contributor(address).map(|friend_index| {
            let contributor = &pool.contributors[friend_index];
            ContributorView {
                friend_index,
                expected: contributor.expected_amount,
                deposited: contributor.deposited_amount,
                share: contributor.share,
                is_first_friend: friend_index == 0,
            }
        }))
    }

    pub fn pool_count(&self) -> u64 {
        self.ledger.pool_count()
    }

    /// Indices of finalized pools whose reward address is `reward_address`,
    /// in ascending order.
    pub fn finalized_pools(&self, reward_address: &Address) -> Vec<u64> {
        (0..self.ledger.pool_count())
            .filter_map(|index| self.ledger.get_pool(index).ok())
            .filter(|pool| pool.is_finalized() && pool.reward_address == *reward_address)
            .map(|pool| pool.index)
            .collect()
    }

    pub fn balances(&self) -> Balances {
        self.treasury.lock().balances()
    }

    fn require_native(&self) -> Result<()> {
        match self.config.funding {
            FundingAsset::Native => Ok(()),
            FundingAsset::Token(_) => Err(PoolError::IngressDisabled("direct value")),
        }
    }
}
