//! # Types
//!
//! Shared data structures used across all modules of the deposit pool engine.
//!
//! ## Design decisions
//!
//! ### Status is derived, never stored
//!
//! A [`Pool`] carries no status field. [`Pool::status`] is computed from the
//! ledger on every read:
//!
//! ```text
//! Open ──► Filled ──► Finalized
//! ```
//!
//! - `Finalized` iff a [`DepositRecord`] has been written.
//! - `Filled` iff the deposited sum equals the target.
//! - `Open` otherwise.
//!
//! Because the deposited sum can only grow, and the deposit record is written
//! once, both transitions behave as one-way latches and the status can never
//! desync from the balances that justify it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use primitive_types::U256;

/// Native value or token units. All arithmetic on amounts is checked.
pub type Amount = U256;

/// 10^18, the scale of [`Contributor::share`] and of one ether / one token.
pub const SHARE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Length of a BLS validator public key.
pub const PUBKEY_LENGTH: usize = 48;
/// Length of a BLS signature.
pub const SIGNATURE_LENGTH: usize = 96;

/// Convert a whole number of ether (or 18-decimal tokens) to base units.
#[must_use]
pub fn ether(whole: u64) -> Amount {
    Amount::from(whole) * Amount::from(SHARE_SCALE)
}

// ─────────────────────────────────────────────────────────
// Address
// ─────────────────────────────────────────────────────────

/// A 20-byte account identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an address from a slice. Returns None if wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; 20]>::try_from(slice).ok().map(Self)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Error returned when a string is not a `0x`-prefixed 20-byte hex address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct ParseAddressError(pub String);

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| ParseAddressError(s.to_string()))?;
        Self::from_slice(&bytes).ok_or_else(|| ParseAddressError(s.to_string()))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────
// Pool
// ─────────────────────────────────────────────────────────

/// Lifecycle status of a pool. See the module docs for how it is derived.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Accepting contributions.
    Open,
    /// Deposited sum equals the target; waiting for finalization.
    Filled,
    /// Forwarded to the registrar. Terminal.
    Finalized,
}

/// One participant's ledger line within a pool.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub address: Address,
    /// Committed at setup; immutable.
    pub expected_amount: Amount,
    /// Cumulative amount received; only grows.
    pub deposited_amount: Amount,
    /// `deposited_amount / target` scaled by [`SHARE_SCALE`]. Informational.
    pub share: Amount,
}

impl Contributor {
    pub(crate) fn new(address: Address, expected_amount: Amount) -> Self {
        Self {
            address,
            expected_amount,
            deposited_amount: Amount::zero(),
            share: Amount::zero(),
        }
    }

    /// How much more this contributor may still deposit.
    #[must_use]
    pub fn remaining_commitment(&self) -> Amount {
        self.expected_amount.saturating_sub(self.deposited_amount)
    }
}

/// Validator data written once on finalization.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DepositRecord {
    #[serde(with = "hex_bytes")]
    pub validator_pubkey: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub deposit_data_root: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub withdrawal_credentials: Vec<u8>,
}

/// One funding campaign. Returned by value as an immutable snapshot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Unique identifier, assigned sequentially from 0.
    pub index: u64,
    /// Total required to finalize.
    pub target_amount: Amount,
    /// Credited as the first friend; withdrawal credentials point here.
    pub reward_address: Address,
    /// Friend index = position in this list. Fixed at setup.
    pub contributors: Vec<Contributor>,
    pub deposit_record: Option<DepositRecord>,
}

impl Pool {
    /// Sum of all contributions. Cannot overflow: bounded by `target_amount`.
    #[must_use]
    pub fn total_deposited(&self) -> Amount {
        self.contributors
            .iter()
            .fold(Amount::zero(), |acc, c| acc.saturating_add(c.deposited_amount))
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.total_deposited() == self.target_amount
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.deposit_record.is_some()
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        if self.is_finalized() {
            PoolStatus::Finalized
        } else if self.is_filled() {
            PoolStatus::Filled
        } else {
            PoolStatus::Open
        }
    }

    /// Position of `address` in the contributor list, if it is a participant.
    #[must_use]
    pub fn find_contributor(&self, address: &Address) -> Option<usize> {
        self.contributors.iter().position(|c| &c.address == address)
    }

    #[must_use]
    pub fn is_first_friend(&self, address: &Address) -> bool {
        self.contributors
            .first()
            .is_some_and(|c| &c.address == address)
    }
}

/// What a participant sees about their own line in a pool.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContributorView {
    pub friend_index: usize,
    pub expected: Amount,
    pub deposited: Amount,
    pub share: Amount,
    pub is_first_friend: bool,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
