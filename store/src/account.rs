//! Account storage trait.

use crate::StoreError;
use lattice_types::{Account, Amount, BlockHash, Epoch, Timestamp};
use serde::{Deserialize, Serialize};

/// Per-account summary of its chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Hash of the latest block in the chain.
    pub head: BlockHash,
    pub open_block: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    /// Number of blocks in the chain, which is also the height of `head`.
    pub block_count: u64,
    pub epoch: Epoch,
    pub modified: Timestamp,
}

pub trait AccountStore {
    fn get_account(&self, account: &Account) -> Result<AccountInfo, StoreError>;
    fn put_account(&self, account: &Account, info: &AccountInfo) -> Result<(), StoreError>;
    fn delete_account(&self, account: &Account) -> Result<(), StoreError>;
    fn account_exists(&self, account: &Account) -> Result<bool, StoreError>;
    fn account_count(&self) -> Result<u64, StoreError>;
    fn iter_accounts(&self) -> Result<Vec<(Account, AccountInfo)>, StoreError>;
}
