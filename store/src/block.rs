//! Block storage trait.
//!
//! Blocks are stored as opaque serialized records keyed by hash; the ledger
//! owns the encoding.

use crate::StoreError;
use lattice_types::BlockHash;

pub trait BlockStore {
    fn put_block(&self, hash: &BlockHash, record: &[u8]) -> Result<(), StoreError>;
    fn get_block(&self, hash: &BlockHash) -> Result<Vec<u8>, StoreError>;
    fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError>;
    fn delete_block(&self, hash: &BlockHash) -> Result<(), StoreError>;
    fn block_count(&self) -> Result<u64, StoreError>;
}
