//! Votes for blocks that have no live election.
//!
//! Representatives often vote before this node has seen the block, or
//! before an election exists for it. The cache remembers which
//! representatives voted for each such hash so an election started later can
//! be seeded with them, and so a hash gathering enough support can start an
//! election (or a fetch of the missing block) on its own.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use lattice_types::{Account, Amount, BlockHash};

/// Progress flags of an inactive hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InactiveCacheStatus {
    pub bootstrap_started: bool,
    pub election_started: bool,
    pub confirmed: bool,
    /// Voter weight at the last evaluation.
    pub tally: Amount,
}

impl InactiveCacheStatus {
    /// Whether new voters can still change any flag.
    pub fn needs_eval(&self) -> bool {
        !self.bootstrap_started || !self.election_started || !self.confirmed
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InactiveCacheEntry {
    /// When the first vote for the hash arrived.
    pub arrival: Instant,
    pub hash: BlockHash,
    pub voters: Vec<Account>,
    pub status: InactiveCacheStatus,
}

/// Thresholds applied by [`evaluate_status`].
#[derive(Clone, Copy, Debug)]
pub struct InactiveThresholds {
    /// Tally at which the hash counts as confirmed.
    pub confirm_weight: Amount,
    /// Tally at which an election may be started.
    pub election_weight: Amount,
    pub election_min_voters: usize,
}

/// Recompute the flags of an entry with `voters` voters weighing `tally`.
/// Flags only ever turn on.
pub fn evaluate_status(
    previously: InactiveCacheStatus,
    tally: Amount,
    voters: usize,
    thresholds: &InactiveThresholds,
) -> InactiveCacheStatus {
    let mut status = previously;
    status.tally = tally;
    if !previously.confirmed && tally >= thresholds.confirm_weight {
        status.bootstrap_started = true;
        status.confirmed = true;
    }
    if !previously.election_started
        && voters >= thresholds.election_min_voters
        && tally >= thresholds.election_weight
    {
        status.election_started = true;
    }
    status
}

/// Bounded map of inactive hashes, evicting the oldest first.
pub struct InactiveVoteCache {
    capacity: usize,
    entries: HashMap<BlockHash, (u64, InactiveCacheEntry)>,
    order: VecDeque<(u64, BlockHash)>,
    next_sequence: u64,
}

impl InactiveVoteCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_sequence: 0,
        }
    }

    pub fn find(&self, hash: &BlockHash) -> Option<&InactiveCacheEntry> {
        self.entries.get(hash).map(|(_, entry)| entry)
    }

    /// Record `voter` for `hash`. Returns the updated entry when the voter is
    /// new and the entry still needs evaluation.
    pub fn insert_voter(
        &mut self,
        hash: BlockHash,
        voter: Account,
        now: Instant,
    ) -> Option<InactiveCacheEntry> {
        let sequence = self.next_sequence;
        if let Some((slot, entry)) = self.entries.get_mut(&hash) {
            if !entry.status.needs_eval() || entry.voters.contains(&voter) {
                return None;
            }
            // A new voter moves the hash to the back of the eviction order;
            // `arrival` keeps the first vote for late-block accounting.
            entry.voters.push(voter);
            *slot = sequence;
            let entry = entry.clone();
            self.next_sequence += 1;
            self.order.push_back((sequence, hash));
            self.evict();
            return Some(entry);
        }

        let entry = InactiveCacheEntry {
            arrival: now,
            hash,
            voters: vec![voter],
            status: InactiveCacheStatus::default(),
        };
        self.next_sequence += 1;
        self.entries.insert(hash, (sequence, entry.clone()));
        self.order.push_back((sequence, hash));
        self.evict();
        Some(entry)
    }

    pub fn set_status(&mut self, hash: &BlockHash, status: InactiveCacheStatus) {
        if let Some((_, entry)) = self.entries.get_mut(hash) {
            entry.status = status;
        }
    }

    pub fn erase(&mut self, hash: &BlockHash) {
        self.entries.remove(hash);
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let Some((sequence, hash)) = self.order.pop_front() else {
                break;
            };
            // Skip queue slots of entries erased or re-created since.
            if matches!(self.entries.get(&hash), Some((s, _)) if *s == sequence) {
                self.entries.remove(&hash);
            }
        }
        if self.order.len() > self.capacity.saturating_mul(2) {
            let entries = &self.entries;
            self.order
                .retain(|(sequence, hash)| matches!(entries.get(hash), Some((s, _)) if s == sequence));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    fn voter(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn thresholds() -> InactiveThresholds {
        InactiveThresholds {
            confirm_weight: Amount::raw(1000),
            election_weight: Amount::raw(100),
            election_min_voters: 3,
        }
    }

    #[test]
    fn repeated_voter_is_ignored() {
        let mut cache = InactiveVoteCache::new(8);
        let now = Instant::now();
        assert!(cache.insert_voter(hash(1), voter(1), now).is_some());
        assert!(cache.insert_voter(hash(1), voter(1), now).is_none());
        let entry = cache.insert_voter(hash(1), voter(2), now).unwrap();
        assert_eq!(entry.voters, vec![voter(1), voter(2)]);
        assert_eq!(entry.arrival, now);
    }

    #[test]
    fn oldest_hash_is_evicted() {
        let mut cache = InactiveVoteCache::new(2);
        let now = Instant::now();
        cache.insert_voter(hash(1), voter(1), now);
        cache.insert_voter(hash(2), voter(1), now);
        cache.insert_voter(hash(3), voter(1), now);
        assert_eq!(cache.len(), 2);
        assert!(cache.find(&hash(1)).is_none());
        assert!(cache.find(&hash(3)).is_some());
    }

    #[test]
    fn new_voter_postpones_eviction() {
        let mut cache = InactiveVoteCache::new(2);
        let now = Instant::now();
        cache.insert_voter(hash(1), voter(1), now);
        cache.insert_voter(hash(2), voter(1), now);
        cache.insert_voter(hash(1), voter(2), now);
        cache.insert_voter(hash(3), voter(1), now);
        assert!(cache.find(&hash(2)).is_none());
        assert_eq!(cache.find(&hash(1)).unwrap().voters.len(), 2);
        assert!(cache.find(&hash(3)).is_some());
    }

    #[test]
    fn erased_then_recreated_entry_is_not_evicted_early() {
        let mut cache = InactiveVoteCache::new(2);
        let now = Instant::now();
        cache.insert_voter(hash(1), voter(1), now);
        cache.erase(&hash(1));
        cache.insert_voter(hash(2), voter(1), now);
        cache.insert_voter(hash(1), voter(1), now);
        cache.insert_voter(hash(3), voter(1), now);
        assert!(cache.find(&hash(2)).is_none());
        assert!(cache.find(&hash(1)).is_some());
        assert!(cache.find(&hash(3)).is_some());
    }

    #[test]
    fn election_needs_both_voters_and_weight() {
        let t = thresholds();
        let status = evaluate_status(InactiveCacheStatus::default(), Amount::raw(500), 2, &t);
        assert!(!status.election_started);
        let status = evaluate_status(status, Amount::raw(50), 3, &t);
        assert!(!status.election_started);
        let status = evaluate_status(status, Amount::raw(500), 3, &t);
        assert!(status.election_started);
        assert!(!status.confirmed);
    }

    #[test]
    fn confirm_weight_marks_bootstrap() {
        let status = evaluate_status(
            InactiveCacheStatus::default(),
            Amount::raw(1000),
            1,
            &thresholds(),
        );
        assert!(status.confirmed);
        assert!(status.bootstrap_started);
        assert!(!status.election_started);
    }

    #[test]
    fn fully_evaluated_entry_takes_no_more_voters() {
        let mut cache = InactiveVoteCache::new(4);
        let now = Instant::now();
        cache.insert_voter(hash(1), voter(1), now);
        cache.set_status(
            &hash(1),
            InactiveCacheStatus {
                bootstrap_started: true,
                election_started: true,
                confirmed: true,
                tally: Amount::raw(1),
            },
        );
        assert!(cache.insert_voter(hash(1), voter(2), now).is_none());
    }
}
