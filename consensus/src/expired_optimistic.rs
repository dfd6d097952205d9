//! Accounts whose optimistic election expired without confirming.
//!
//! These accounts are swept pessimistically: one election at a time for
//! the next uncemented block, once its dependencies are cemented.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use lattice_types::Account;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiredOptimisticElectionInfo {
    pub expired_time: Instant,
    pub account: Account,
    pub election_started: bool,
}

/// Bounded set keyed by account, ordered by expiry time.
pub struct ExpiredOptimisticElections {
    capacity: usize,
    infos: HashMap<Account, (u64, ExpiredOptimisticElectionInfo)>,
    by_time: BTreeMap<(Instant, u64), Account>,
    next_sequence: u64,
}

impl ExpiredOptimisticElections {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            infos: HashMap::new(),
            by_time: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    /// Track `account`. An account already tracked keeps its original entry.
    pub fn add(&mut self, account: Account, now: Instant) {
        if self.infos.contains_key(&account) {
            return;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.infos.insert(
            account,
            (
                sequence,
                ExpiredOptimisticElectionInfo {
                    expired_time: now,
                    account,
                    election_started: false,
                },
            ),
        );
        self.by_time.insert((now, sequence), account);
        if self.infos.len() > self.capacity {
            if let Some((_, oldest)) = self.by_time.pop_first() {
                self.infos.remove(&oldest);
            }
        }
    }

    /// Up to `limit` accounts without a started election, oldest first.
    pub fn pending(&self, limit: usize) -> Vec<Account> {
        self.by_time
            .values()
            .filter(|account| {
                self.infos
                    .get(*account)
                    .is_some_and(|(_, info)| !info.election_started)
            })
            .take(limit)
            .copied()
            .collect()
    }

    pub fn mark_election_started(&mut self, account: &Account) {
        if let Some((_, info)) = self.infos.get_mut(account) {
            info.election_started = true;
        }
    }

    /// Make the account eligible for another pessimistic election, once the
    /// previous one cemented its block or expired.
    pub fn clear_election_started(&mut self, account: &Account) {
        if let Some((_, info)) = self.infos.get_mut(account) {
            info.election_started = false;
        }
    }

    pub fn remove(&mut self, account: &Account) {
        if let Some((sequence, info)) = self.infos.remove(account) {
            self.by_time.remove(&(info.expired_time, sequence));
        }
    }

    /// Drop entries that expired before `cutoff`.
    pub fn remove_older_than(&mut self, cutoff: Instant) {
        while let Some((&(time, _), _)) = self.by_time.first_key_value() {
            if time >= cutoff {
                break;
            }
            if let Some((_, account)) = self.by_time.pop_first() {
                self.infos.remove(&account);
            }
        }
    }

    pub fn get(&self, account: &Account) -> Option<ExpiredOptimisticElectionInfo> {
        self.infos.get(account).map(|(_, info)| *info)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn clear(&mut self) {
        self.infos.clear();
        self.by_time.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn account(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut set = ExpiredOptimisticElections::new(2);
        let now = Instant::now();
        set.add(account(1), now);
        set.add(account(2), now + Duration::from_millis(1));
        set.add(account(3), now + Duration::from_millis(2));
        assert_eq!(set.len(), 2);
        assert!(set.get(&account(1)).is_none());
    }

    #[test]
    fn started_accounts_are_not_pending() {
        let mut set = ExpiredOptimisticElections::new(8);
        let now = Instant::now();
        set.add(account(1), now);
        set.add(account(2), now);
        set.mark_election_started(&account(1));
        assert_eq!(set.pending(10), vec![account(2)]);
    }

    #[test]
    fn old_entries_expire() {
        let mut set = ExpiredOptimisticElections::new(8);
        let now = Instant::now();
        set.add(account(1), now);
        set.add(account(2), now + Duration::from_secs(10));
        set.remove_older_than(now + Duration::from_secs(5));
        assert_eq!(set.len(), 1);
        assert!(set.get(&account(2)).is_some());
    }

    #[test]
    fn re_adding_keeps_started_flag() {
        let mut set = ExpiredOptimisticElections::new(8);
        let now = Instant::now();
        set.add(account(1), now);
        set.mark_election_started(&account(1));
        set.add(account(1), now);
        assert!(set.get(&account(1)).unwrap().election_started);
    }

    #[test]
    fn cleared_account_is_pending_again() {
        let mut set = ExpiredOptimisticElections::new(8);
        let now = Instant::now();
        set.add(account(1), now);
        set.mark_election_started(&account(1));
        assert!(set.pending(10).is_empty());
        set.clear_election_started(&account(1));
        assert_eq!(set.pending(10), vec![account(1)]);
    }
}
