//! CPU work generation.
//!
//! Local submissions and tests use this to produce blocks of a chosen
//! difficulty; the node never requires work from peers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;

use crate::{validator::work_value, WorkError, WorkNonce};
use lattice_types::Root;

/// Generates work for a root using all available CPU cores.
pub struct WorkGenerator;

/// Nonces tried per thread between checks of the stop flags.
const BATCH_SIZE: u64 = 4096;

impl WorkGenerator {
    /// Find a nonce whose work value for `root` is at least `min_difficulty`.
    pub fn generate(&self, root: &Root, min_difficulty: u64) -> Result<WorkNonce, WorkError> {
        self.generate_cancellable(root, min_difficulty, &AtomicBool::new(false))
    }

    /// As [`WorkGenerator::generate`], giving up once `cancel` is set.
    pub fn generate_cancellable(
        &self,
        root: &Root,
        min_difficulty: u64,
        cancel: &AtomicBool,
    ) -> Result<WorkNonce, WorkError> {
        if min_difficulty == 0 {
            return Ok(WorkNonce(0));
        }

        let found = AtomicU64::new(u64::MAX);
        let done = AtomicBool::new(false);
        let num_threads = rayon::current_num_threads().max(1) as u64;

        (0..num_threads).into_par_iter().for_each(|thread_id| {
            let mut nonce = thread_id;
            loop {
                if done.load(Ordering::Relaxed) || cancel.load(Ordering::Relaxed) {
                    return;
                }
                for _ in 0..BATCH_SIZE {
                    if work_value(root, nonce) >= min_difficulty {
                        found.store(nonce, Ordering::Relaxed);
                        done.store(true, Ordering::Relaxed);
                        return;
                    }
                    nonce = nonce.wrapping_add(num_threads);
                }
            }
        });

        if done.load(Ordering::Relaxed) {
            Ok(WorkNonce(found.load(Ordering::Relaxed)))
        } else {
            Err(WorkError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_work;

    #[test]
    fn generated_work_meets_difficulty() {
        let root = Root::new([0x42; 32]);
        let nonce = WorkGenerator.generate(&root, 1 << 60).unwrap();
        assert!(validate_work(&root, nonce.0, 1 << 60));
    }

    #[test]
    fn zero_difficulty_short_circuits() {
        let nonce = WorkGenerator.generate(&Root::ZERO, 0).unwrap();
        assert_eq!(nonce, WorkNonce(0));
    }

    #[test]
    fn cancelled_generation_reports_cancelled() {
        let cancel = AtomicBool::new(true);
        let result = WorkGenerator.generate_cancellable(&Root::new([1; 32]), u64::MAX, &cancel);
        assert!(matches!(result, Err(WorkError::Cancelled)));
    }
}
