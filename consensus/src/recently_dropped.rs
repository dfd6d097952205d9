//! Roots whose election was dropped before confirming, with the drop time.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use lattice_types::QualifiedRoot;

pub struct RecentlyDropped {
    capacity: usize,
    order: VecDeque<QualifiedRoot>,
    dropped: HashMap<QualifiedRoot, Instant>,
}

impl RecentlyDropped {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            dropped: HashMap::new(),
        }
    }

    /// Record or refresh a drop. A refreshed root keeps its eviction slot.
    pub fn add(&mut self, root: QualifiedRoot, now: Instant) {
        if self.dropped.insert(root, now).is_none() {
            self.order.push_back(root);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.dropped.remove(&oldest);
            }
        }
    }

    pub fn find(&self, root: &QualifiedRoot) -> Option<Instant> {
        self.dropped.get(root).copied()
    }

    pub fn erase(&mut self, root: &QualifiedRoot) {
        if self.dropped.remove(root).is_some() {
            self.order.retain(|r| r != root);
        }
    }

    pub fn len(&self) -> usize {
        self.dropped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.dropped.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::{BlockHash, Root};

    fn root(byte: u8) -> QualifiedRoot {
        QualifiedRoot::new(Root::new([byte; 32]), BlockHash::new([byte; 32]))
    }

    #[test]
    fn bounded_by_capacity() {
        let mut dropped = RecentlyDropped::new(2);
        let now = Instant::now();
        dropped.add(root(1), now);
        dropped.add(root(2), now);
        dropped.add(root(3), now);
        assert_eq!(dropped.len(), 2);
        assert!(dropped.find(&root(1)).is_none());
        assert_eq!(dropped.find(&root(3)), Some(now));
    }

    #[test]
    fn erase_forgets_root() {
        let mut dropped = RecentlyDropped::new(2);
        dropped.add(root(1), Instant::now());
        dropped.erase(&root(1));
        assert!(dropped.is_empty());
    }
}
