//! Pending receive storage trait.

use crate::StoreError;
use lattice_types::{Account, Amount, BlockHash, Epoch};
use serde::{Deserialize, Serialize};

/// `(destination, send hash)`: one entry per send not yet received.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingKey {
    pub account: Account,
    pub hash: BlockHash,
}

impl PendingKey {
    pub fn new(account: Account, hash: BlockHash) -> Self {
        Self { account, hash }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    /// The sending account.
    pub source: Account,
    pub amount: Amount,
    /// Epoch of the sender at the time of the send.
    pub epoch: Epoch,
}

pub trait PendingStore {
    fn put_pending(&self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError>;
    fn get_pending(&self, key: &PendingKey) -> Result<PendingInfo, StoreError>;
    fn delete_pending(&self, key: &PendingKey) -> Result<(), StoreError>;
    fn pending_for_account(
        &self,
        account: &Account,
    ) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError>;
    fn pending_count(&self) -> Result<u64, StoreError>;
}
