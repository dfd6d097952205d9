//! Bounded, insertion-ordered memory of recent election outcomes.

use std::collections::{HashMap, VecDeque};

use lattice_types::{BlockHash, QualifiedRoot};

use crate::election::ElectionStatus;

/// Roots whose election confirmed recently, with the winning hash and any
/// losing forks. Votes for any of these hashes are replays.
pub struct RecentlyConfirmed {
    capacity: usize,
    order: VecDeque<(QualifiedRoot, BlockHash)>,
    hashes: HashMap<BlockHash, QualifiedRoot>,
    /// Root to winner.
    roots: HashMap<QualifiedRoot, BlockHash>,
}

impl RecentlyConfirmed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            hashes: HashMap::new(),
            roots: HashMap::new(),
        }
    }

    /// Record the winner of a confirmed root.
    pub fn put(&mut self, root: QualifiedRoot, winner: BlockHash) {
        if self.hashes.contains_key(&winner) {
            return;
        }
        self.roots.insert(root, winner);
        self.push(root, winner);
    }

    /// Record a fork that lost against the winner of `root`.
    pub fn reject(&mut self, root: QualifiedRoot, loser: BlockHash) {
        if self.hashes.contains_key(&loser) {
            return;
        }
        self.push(root, loser);
    }

    fn push(&mut self, root: QualifiedRoot, hash: BlockHash) {
        self.hashes.insert(hash, root);
        self.order.push_back((root, hash));
        while self.order.len() > self.capacity {
            if let Some((root, hash)) = self.order.pop_front() {
                self.hashes.remove(&hash);
                if self.roots.get(&root) == Some(&hash) {
                    self.roots.remove(&root);
                }
            }
        }
    }

    pub fn exists(&self, hash: &BlockHash) -> bool {
        self.hashes.contains_key(hash)
    }

    pub fn root_exists(&self, root: &QualifiedRoot) -> bool {
        self.roots.contains_key(root)
    }

    pub fn winner(&self, root: &QualifiedRoot) -> Option<BlockHash> {
        self.roots.get(root).copied()
    }

    pub fn erase(&mut self, hash: &BlockHash) {
        if let Some(root) = self.hashes.remove(hash) {
            self.order.retain(|(_, h)| h != hash);
            if self.roots.get(&root) == Some(hash) {
                self.roots.remove(&root);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.hashes.clear();
        self.roots.clear();
    }
}

/// Statuses of recently cemented election winners, newest last.
pub struct RecentlyCemented {
    capacity: usize,
    statuses: VecDeque<ElectionStatus>,
}

impl RecentlyCemented {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            statuses: VecDeque::new(),
        }
    }

    pub fn add(&mut self, status: ElectionStatus) {
        self.statuses.push_back(status);
        while self.statuses.len() > self.capacity {
            self.statuses.pop_front();
        }
    }

    pub fn list(&self) -> Vec<ElectionStatus> {
        self.statuses.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
    }
}
