//! Size caps and eviction order of the bounded histories kept beside the
//! active elections, and the trend of the multiplier ring.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use lattice_consensus::{
    ExpiredOptimisticElections, InactiveVoteCache, MultiplierRing, RecentlyConfirmed,
    RecentlyDropped,
};
use lattice_types::{Account, BlockHash, QualifiedRoot, Root};

fn hash(n: u8) -> BlockHash {
    BlockHash::new([n; 32])
}

fn root(n: u8) -> QualifiedRoot {
    QualifiedRoot::new(Root::from(hash(n)), hash(n.wrapping_add(1)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The cache never outgrows its capacity and evicts the hash whose last
    /// new voter is oldest.
    #[test]
    fn inactive_cache_evicts_oldest_first(
        capacity in 1..8usize,
        votes in prop::collection::vec((0..16u8, 0..3u8), 1..64),
    ) {
        let mut cache = InactiveVoteCache::new(capacity);
        let mut model: VecDeque<(BlockHash, Vec<Account>)> = VecDeque::new();
        let now = Instant::now();

        for (h, v) in votes {
            let (h, voter) = (hash(h), Account::new([v; 32]));
            cache.insert_voter(h, voter, now);

            match model.iter().position(|(known, _)| *known == h) {
                Some(i) if !model[i].1.contains(&voter) => {
                    let (_, mut voters) = model.remove(i).unwrap();
                    voters.push(voter);
                    model.push_back((h, voters));
                }
                Some(_) => {}
                None => model.push_back((h, vec![voter])),
            }
            while model.len() > capacity {
                model.pop_front();
            }

            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.len(), model.len());
            for (known, voters) in &model {
                let entry = cache.find(known);
                prop_assert!(entry.is_some());
                prop_assert_eq!(&entry.unwrap().voters, voters);
            }
        }
    }

    #[test]
    fn recently_dropped_stays_within_capacity(
        capacity in 1..8usize,
        roots in prop::collection::vec(0..32u8, 1..64),
    ) {
        let mut dropped = RecentlyDropped::new(capacity);
        let start = Instant::now();
        for (i, r) in roots.iter().enumerate() {
            let now = start + Duration::from_millis(i as u64);
            dropped.add(root(*r), now);
            prop_assert!(dropped.len() <= capacity);
            prop_assert_eq!(dropped.find(&root(*r)), Some(now));
        }
    }

    /// Winners and rejected forks share one capacity; the latest insertion
    /// is always remembered.
    #[test]
    fn recently_confirmed_stays_within_capacity(
        capacity in 1..8usize,
        outcomes in prop::collection::vec((0..32u8, any::<bool>()), 1..64),
    ) {
        let mut confirmed = RecentlyConfirmed::new(capacity);
        for (i, (r, won)) in outcomes.into_iter().enumerate() {
            let block = BlockHash::new([i as u8; 32]);
            if won {
                confirmed.put(root(r), block);
            } else {
                confirmed.reject(root(r), block);
            }
            prop_assert!(confirmed.len() <= capacity);
            prop_assert!(confirmed.exists(&block));
        }
    }

    #[test]
    fn expired_optimistic_keeps_the_newest_accounts(
        capacity in 1..8usize,
        accounts in prop::collection::vec(0..32u8, 1..64),
    ) {
        let mut expired = ExpiredOptimisticElections::new(capacity);
        let start = Instant::now();
        for (i, a) in accounts.iter().enumerate() {
            let account = Account::new([*a; 32]);
            let known = expired.get(&account).is_some();
            expired.add(account, start + Duration::from_millis(i as u64));
            prop_assert!(expired.len() <= capacity);
            if !known {
                prop_assert!(expired.get(&account).is_some());
            }
        }
    }

    /// A larger sample never yields a lower trend than a smaller one, and the
    /// trend stays between the smallest and largest sample held.
    #[test]
    fn multiplier_trend_is_monotonic_and_bounded(
        history in prop::collection::vec(1.0..64.0f64, 0..40),
        low in 1.0..64.0f64,
        extra in 0.0..64.0f64,
    ) {
        let mut ring = MultiplierRing::default();
        for sample in &history {
            ring.push(*sample);
        }
        let mut with_low = ring.clone();
        let mut with_high = ring;
        with_low.push(low);
        with_high.push(low + extra);
        prop_assert!(with_low.average() <= with_high.average() + 1e-9);

        let held = history.iter().copied().chain([1.0, low + extra]);
        let (min, max) = held.fold((f64::MAX, f64::MIN), |(lo, hi), s| (lo.min(s), hi.max(s)));
        let trend = with_high.average();
        prop_assert!(trend >= min - 1e-9 && trend <= max + 1e-9);
    }
}
