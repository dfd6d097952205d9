//! Duplicate publish filter.
//!
//! A fixed-size table of 128-bit block digests. A block whose digest is in
//! its slot was seen recently and is dropped before any further processing.
//! Digests are cleared when an election for the block is dropped so a
//! resubmission is processed again.

use std::sync::{Mutex, PoisonError};

use lattice_crypto::blake2b_256_multi;
use lattice_ledger::StateBlock;

pub struct PublishFilter {
    items: Mutex<Vec<u128>>,
}

impl PublishFilter {
    pub fn new(size: usize) -> Self {
        Self {
            items: Mutex::new(vec![0; size.max(1)]),
        }
    }

    /// Record `block`. Returns true when it was already present.
    pub fn apply(&self, block: &StateBlock) -> bool {
        let digest = Self::digest(block);
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let index = Self::index(digest, items.len());
        if items[index] == digest {
            true
        } else {
            items[index] = digest;
            false
        }
    }

    pub fn clear(&self, block: &StateBlock) {
        let digest = Self::digest(block);
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let index = Self::index(digest, items.len());
        if items[index] == digest {
            items[index] = 0;
        }
    }

    pub fn clear_all(&self) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.iter_mut().for_each(|item| *item = 0);
    }

    fn digest(block: &StateBlock) -> u128 {
        let work = block.work.to_le_bytes();
        let hash = blake2b_256_multi(&[
            block.hash().as_bytes(),
            &work,
            block.signature.as_bytes(),
        ]);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        // Zero marks an empty slot.
        u128::from_le_bytes(bytes).max(1)
    }

    fn index(digest: u128, len: usize) -> usize {
        (digest % len as u128) as usize
    }
}
