//! Events published by the engine.
//!
//! Field order of every variant is part of the external contract. In
//! particular [`PoolEvent::Finalized`] is the only way a consumer that saw a
//! bare token transfer can recover which pool it funded.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolEvent {
    PoolCreated {
        pool_index: u64,
        reward_address: Address,
        addresses: Vec<Address>,
        expected_amounts: Vec<Amount>,
    },
    DepositApplied {
        pool_index: u64,
        contributor_position: usize,
        amount: Amount,
        new_total: Amount,
    },
    Finalized {
        pool_index: u64,
        reward_address: Address,
    },
    /// Residual balance swept by the administrator.
    Swept { to: Address, amount: Amount },
}

impl PoolEvent {
    /// Short identifier string suitable for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoolCreated { .. } => "pool_created",
            Self::DepositApplied { .. } => "deposit_applied",
            Self::Finalized { .. } => "finalized",
            Self::Swept { .. } => "swept",
        }
    }

    pub fn pool_index(&self) -> Option<u64> {
        match self {
            Self::PoolCreated { pool_index, .. }
            | Self::DepositApplied { pool_index, .. }
            | Self::Finalized { pool_index, .. } => Some(*pool_index),
            Self::Swept { .. } => None,
        }
    }
}

/// Receives every event in the order the ledger was mutated.
///
/// Implementations must not call back into the engine: `publish` runs while
/// the affected pool is locked.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: PoolEvent);
}

/// In-memory sink; the default for embedded use and tests.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<PoolEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<PoolEvent> {
        self.events.lock().clone()
    }

    pub fn last(&self) -> Option<PoolEvent> {
        self.events.lock().last().cloned()
    }

    pub fn for_pool(&self, pool_index: u64) -> Vec<PoolEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.pool_index() == Some(pool_index))
            .cloned()
            .collect()
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: PoolEvent) {
        self.events.lock().push(event);
    }
}
