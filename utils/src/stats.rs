//! Named event counters.
//!
//! Components declare the counters they record up front; recording an
//! undeclared name is a no-op so optional subsystems can share one sink.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe collection of monotonically increasing counters.
pub struct StatsCounter {
    counters: HashMap<&'static str, AtomicU64>,
}

impl StatsCounter {
    pub fn new(names: &[&'static str]) -> Self {
        Self::from_groups(&[names])
    }

    /// Build one sink covering the counters of several components.
    pub fn from_groups(groups: &[&[&'static str]]) -> Self {
        let counters = groups
            .iter()
            .flat_map(|names| names.iter())
            .map(|&name| (name, AtomicU64::new(0)))
            .collect();
        Self { counters }
    }

    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    /// Current values, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.counters
            .iter()
            .map(|(&k, v)| (k, v.load(Ordering::Relaxed)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_registered_names_only() {
        let stats = StatsCounter::new(&["vote_new", "vote_replay"]);
        stats.increment("vote_new");
        stats.add("vote_new", 2);
        stats.increment("not_registered");
        assert_eq!(stats.get("vote_new"), 3);
        assert_eq!(stats.get("vote_replay"), 0);
        assert_eq!(stats.get("not_registered"), 0);
        assert!(!stats.is_registered("not_registered"));
    }

    #[test]
    fn groups_are_merged() {
        let stats = StatsCounter::from_groups(&[&["a", "b"], &["c"]]);
        stats.increment("c");
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(snapshot["c"], 1);
    }

    #[test]
    fn concurrent_increments() {
        let stats = Arc::new(StatsCounter::new(&["hits"]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.increment("hits");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.get("hits"), 4000);
    }
}
