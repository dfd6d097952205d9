//! Cached representative weights.
//!
//! Each account's balance counts towards the weight of the representative
//! named in its head block. The cache is adjusted whenever a head changes
//! (process and rollback), so lookups never scan accounts.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use lattice_types::{Account, Amount};

#[derive(Default)]
pub struct RepWeights {
    weights: Mutex<HashMap<Account, u128>>,
}

impl RepWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, representative: &Account) -> Amount {
        let weights = self.weights.lock().unwrap_or_else(PoisonError::into_inner);
        Amount::raw(weights.get(representative).copied().unwrap_or(0))
    }

    /// Move `old_balance` away from `old_rep` and credit `new_balance` to
    /// `new_rep`. Either side may be absent (opening or deleting an account).
    pub fn update(
        &self,
        old: Option<(Account, Amount)>,
        new: Option<(Account, Amount)>,
    ) {
        let mut weights = self.weights.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((rep, balance)) = old {
            if let Some(entry) = weights.get_mut(&rep) {
                *entry = entry.saturating_sub(balance.number());
                if *entry == 0 {
                    weights.remove(&rep);
                }
            }
        }
        if let Some((rep, balance)) = new {
            if !balance.is_zero() {
                let entry = weights.entry(rep).or_insert(0);
                *entry = entry.saturating_add(balance.number());
            }
        }
    }

    pub fn rep_count(&self) -> usize {
        self.weights.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn total(&self) -> Amount {
        let weights = self.weights.lock().unwrap_or_else(PoisonError::into_inner);
        Amount::raw(weights.values().fold(0u128, |acc, w| acc.saturating_add(*w)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    #[test]
    fn change_moves_weight() {
        let weights = RepWeights::new();
        weights.update(None, Some((rep(1), Amount::raw(100))));
        assert_eq!(weights.weight(&rep(1)), Amount::raw(100));

        weights.update(Some((rep(1), Amount::raw(100))), Some((rep(2), Amount::raw(60))));
        assert_eq!(weights.weight(&rep(1)), Amount::ZERO);
        assert_eq!(weights.weight(&rep(2)), Amount::raw(60));
        assert_eq!(weights.rep_count(), 1);
        assert_eq!(weights.total(), Amount::raw(60));
    }

    #[test]
    fn removing_more_than_present_saturates() {
        let weights = RepWeights::new();
        weights.update(None, Some((rep(1), Amount::raw(5))));
        weights.update(Some((rep(1), Amount::raw(50))), None);
        assert_eq!(weights.weight(&rep(1)), Amount::ZERO);
        assert_eq!(weights.rep_count(), 0);
    }
}
