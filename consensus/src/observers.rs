//! Observer lists fired by the active elections manager.
//!
//! Observers run on the notifying thread after the manager lock has been
//! released. They must not block and must not register further observers.

use std::sync::{PoisonError, RwLock};

use lattice_types::{Account, Amount, BlockHash};

use crate::election::ElectionStatus;

type Observer<T> = Box<dyn Fn(&T) + Send + Sync>;

pub struct ObserverSet<T> {
    observers: RwLock<Vec<Observer<T>>>,
}

impl<T> Default for ObserverSet<T> {
    fn default() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<T> ObserverSet<T> {
    pub fn add(&self, observer: impl Fn(&T) + Send + Sync + 'static) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(observer));
    }

    pub fn notify(&self, value: &T) {
        let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
        for observer in observers.iter() {
            observer(value);
        }
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A cemented block together with how it was confirmed.
#[derive(Clone, Debug)]
pub struct CementedBlockEvent {
    pub status: ElectionStatus,
    pub account: Account,
    pub amount: Amount,
    pub is_send: bool,
}

#[derive(Default)]
pub struct ElectionObservers {
    /// Every cemented block, whether or not it had an election.
    pub blocks: ObserverSet<CementedBlockEvent>,
    /// A block left the live elections without being cemented as winner.
    pub active_stopped: ObserverSet<BlockHash>,
    /// The trended active difficulty was recomputed.
    pub difficulty: ObserverSet<u64>,
    /// Enough votes arrived for a block this node does not have.
    pub bootstrap_requested: ObserverSet<BlockHash>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn every_observer_is_notified() {
        let set = ObserverSet::<u64>::default();
        let total = Arc::new(AtomicU64::new(0));
        for _ in 0..3 {
            let total = Arc::clone(&total);
            set.add(move |value| {
                total.fetch_add(*value, Ordering::Relaxed);
            });
        }
        set.notify(&2);
        assert_eq!(total.load(Ordering::Relaxed), 6);
        assert_eq!(set.len(), 3);
    }
}
