//! In-memory atomic counters for frequently queried ledger totals.
//!
//! The confirmation height processor reads `block_count` and
//! `cemented_count` on every item to pick a cementing strategy, so they are
//! kept here rather than counted from the store.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct LedgerCache {
    block_count: AtomicU64,
    cemented_count: AtomicU64,
    account_count: AtomicU64,
}

impl LedgerCache {
    pub fn new(block_count: u64, cemented_count: u64, account_count: u64) -> Self {
        Self {
            block_count: AtomicU64::new(block_count),
            cemented_count: AtomicU64::new(cemented_count),
            account_count: AtomicU64::new(account_count),
        }
    }

    pub fn block_count(&self) -> u64 {
        self.block_count.load(Ordering::Relaxed)
    }

    pub fn cemented_count(&self) -> u64 {
        self.cemented_count.load(Ordering::Relaxed)
    }

    pub fn account_count(&self) -> u64 {
        self.account_count.load(Ordering::Relaxed)
    }

    pub(crate) fn add_blocks(&self, count: u64) {
        self.block_count.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn remove_blocks(&self, count: u64) {
        self.block_count.fetch_sub(count, Ordering::Relaxed);
    }

    pub(crate) fn add_cemented(&self, count: u64) {
        self.cemented_count.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn add_accounts(&self, count: u64) {
        self.account_count.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn remove_accounts(&self, count: u64) {
        self.account_count.fetch_sub(count, Ordering::Relaxed);
    }
}
