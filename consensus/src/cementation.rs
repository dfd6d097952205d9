//! The manager's view of the confirmation height processor.

use lattice_types::BlockHash;

pub trait CementationQueue: Send + Sync {
    /// Queue a confirmed block for cementing.
    fn add(&self, hash: BlockHash);

    /// The block is queued or is part of the batch being cemented.
    fn is_processing_block(&self, hash: &BlockHash) -> bool;

    /// The block itself was passed to [`CementationQueue::add`] and is being
    /// cemented, as opposed to being cemented as a dependency.
    fn is_processing_added_block(&self, hash: &BlockHash) -> bool;
}
