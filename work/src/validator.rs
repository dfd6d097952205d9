//! Work value computation.

use lattice_crypto::blake2b_64_multi;
use lattice_types::Root;

/// The difficulty achieved by `work` for a block at `root`.
pub fn work_value(root: &Root, work: u64) -> u64 {
    blake2b_64_multi(&[&work.to_le_bytes(), root.as_bytes()])
}

/// Whether `work` meets `min_difficulty` for `root`.
pub fn validate_work(root: &Root, work: u64, min_difficulty: u64) -> bool {
    work_value(root, work) >= min_difficulty
}
