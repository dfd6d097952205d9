//! Online representative tracking.
//!
//! Quorum is measured against *online* voting weight, not total delegated
//! weight. A representative counts as online if it voted within the
//! sampling window. The online stake never drops below the configured
//! minimum, and a trended value smooths temporary dips.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use lattice_ledger::Ledger;
use lattice_types::{Account, Amount};

/// Representatives that voted within this window are online.
pub const ONLINE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Decay percentage for the trend (95 = 0.95, slow decay).
const TREND_DECAY_PCT: u128 = 95;

struct OnlineInner {
    /// Representative → time of its most recent vote.
    recent: HashMap<Account, Instant>,
    trended: Amount,
}

pub struct OnlineReps {
    ledger: Arc<Ledger>,
    minimum: Amount,
    window: Duration,
    inner: Mutex<OnlineInner>,
}

impl OnlineReps {
    pub fn new(ledger: Arc<Ledger>, minimum: Amount) -> Self {
        Self::with_window(ledger, minimum, ONLINE_WINDOW)
    }

    pub fn with_window(ledger: Arc<Ledger>, minimum: Amount, window: Duration) -> Self {
        Self {
            ledger,
            minimum,
            window,
            inner: Mutex::new(OnlineInner {
                recent: HashMap::new(),
                trended: Amount::ZERO,
            }),
        }
    }

    /// Record that `rep` voted. Representatives without weight are ignored.
    pub fn observe(&self, rep: Account, now: Instant) {
        if self.ledger.weight(&rep).is_zero() {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let last = inner.recent.entry(rep).or_insert(now);
        if now > *last {
            *last = now;
        }
    }

    /// Representatives that voted within the window.
    pub fn list(&self, now: Instant) -> Vec<Account> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .recent
            .iter()
            .filter(|(_, &last)| now.saturating_duration_since(last) <= self.window)
            .map(|(rep, _)| *rep)
            .collect()
    }

    /// Current weight of the online representatives.
    pub fn online(&self, now: Instant) -> Amount {
        self.list(now)
            .iter()
            .fold(Amount::ZERO, |sum, rep| sum.saturating_add(self.ledger.weight(rep)))
    }

    pub fn trended(&self) -> Amount {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .trended
    }

    pub fn minimum(&self) -> Amount {
        self.minimum
    }

    /// Fold the current online weight into the trend and forget stale
    /// representatives.
    pub fn sample(&self, now: Instant) {
        let current = self.online(now);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.trended = if inner.trended.is_zero() {
            current
        } else {
            let decayed = inner.trended.number() / 100 * TREND_DECAY_PCT;
            let added = current.number() / 100 * (100 - TREND_DECAY_PCT);
            Amount::raw(decayed.saturating_add(added))
        };
        let window = self.window;
        inner
            .recent
            .retain(|_, last| now.saturating_duration_since(*last) <= window);
    }

    /// The stake quorum is measured against: the largest of the current
    /// online weight, the trend and the configured minimum.
    pub fn online_stake(&self, now: Instant) -> Amount {
        self.online(now).max(self.trended()).max(self.minimum)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.recent.clear();
        inner.trended = Amount::ZERO;
    }
}
