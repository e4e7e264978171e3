//! Event rows as stored in SQLite.
//!
//! Each [`PoolEvent`] is flattened into a few indexed columns plus the full
//! JSON payload, so lookups by pool or by reward address never need to parse
//! the payload.

use deposit_pool::PoolEvent;
use serde::{Deserialize, Serialize};

/// A decoded engine event, ready to be stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_type: String,
    pub pool_index: Option<i64>,
    /// Reward address for pool-level events, sweep recipient for sweeps.
    pub actor: Option<String>,
    /// Decimal amount, where the event carries one.
    pub amount: Option<String>,
    pub payload: String,
}

impl StoredEvent {
    pub fn from_event(event: &PoolEvent) -> serde_json::Result<Self> {
        let (actor, amount) = match event {
            PoolEvent::PoolCreated { reward_address, .. }
            | PoolEvent::Finalized { reward_address, .. } => (Some(reward_address.to_string()), None),
            PoolEvent::DepositApplied { amount, .. } => (None, Some(amount.to_string())),
            PoolEvent::Swept { to, amount } => (Some(to.to_string()), Some(amount.to_string())),
        };
        Ok(Self {
            event_type: event.as_str().to_string(),
            pool_index: event.pool_index().map(|i| i as i64),
            actor,
            amount,
            payload: serde_json::to_string(event)?,
        })
    }
}

/// A raw event record as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub instance_id: i64,
    pub event_type: String,
    pub pool_index: Option<i64>,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub payload: String,
    pub created_at: i64,
}
