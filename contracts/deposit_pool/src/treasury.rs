//! Balance bookkeeping for the engine's holdings.
//!
//! `held` is everything the engine owns, including transfers that bypassed
//! the ingress protocol. `accounted` is the part that belongs to pools that
//! are still `Open` or `Filled`. Only `held - accounted` may ever be swept.

use serde::{Deserialize, Serialize};

use crate::types::Amount;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub held: Amount,
    pub accounted: Amount,
}

impl Balances {
    /// Residual balance not attributable to any live pool.
    pub fn unaccounted(&self) -> Amount {
        self.held.saturating_sub(self.accounted)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Treasury {
    balances: Balances,
}

impl Treasury {
    pub fn balances(&self) -> Balances {
        self.balances
    }

    /// An accepted contribution to a live pool.
    pub fn credit_pool(&mut self, amount: Amount) {
        self.balances.held = self.balances.held.saturating_add(amount);
        self.balances.accounted = self.balances.accounted.saturating_add(amount);
    }

    /// Value that arrived outside the ingress protocol.
    pub fn credit_unaccounted(&mut self, amount: Amount) {
        self.balances.held = self.balances.held.saturating_add(amount);
    }

    /// A finalized pool's funds left for the registrar.
    pub fn debit_pool(&mut self, amount: Amount) {
        self.balances.held = self.balances.held.saturating_sub(amount);
        self.balances.accounted = self.balances.accounted.saturating_sub(amount);
    }

    /// Remove and return the whole unaccounted remainder.
    pub fn sweep(&mut self) -> Amount {
        let amount = self.balances.unaccounted();
        self.balances.held = self.balances.accounted;
        amount
    }
}
