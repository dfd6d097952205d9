//! Thread-safe in-memory backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use lattice_types::{Account, BlockHash, ConfirmationHeightInfo};

use crate::{
    AccountInfo, AccountStore, BlockStore, ConfirmationHeightStore, PendingInfo, PendingKey,
    PendingStore, StoreError,
};

/// Every table in a `HashMap` (or `BTreeMap` where range scans are needed)
/// behind its own mutex.
#[derive(Default)]
pub struct MemoryStore {
    blocks: Mutex<HashMap<BlockHash, Vec<u8>>>,
    accounts: Mutex<HashMap<Account, AccountInfo>>,
    pending: Mutex<BTreeMap<PendingKey, PendingInfo>>,
    confirmation_heights: Mutex<HashMap<Account, ConfirmationHeightInfo>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn table<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("table lock poisoned".to_string()))
}

impl BlockStore for MemoryStore {
    fn put_block(&self, hash: &BlockHash, record: &[u8]) -> Result<(), StoreError> {
        table(&self.blocks)?.insert(*hash, record.to_vec());
        Ok(())
    }

    fn get_block(&self, hash: &BlockHash) -> Result<Vec<u8>, StoreError> {
        table(&self.blocks)?
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("block {}", hash)))
    }

    fn block_exists(&self, hash: &BlockHash) -> Result<bool, StoreError> {
        Ok(table(&self.blocks)?.contains_key(hash))
    }

    fn delete_block(&self, hash: &BlockHash) -> Result<(), StoreError> {
        table(&self.blocks)?.remove(hash);
        Ok(())
    }

    fn block_count(&self) -> Result<u64, StoreError> {
        Ok(table(&self.blocks)?.len() as u64)
    }
}

impl AccountStore for MemoryStore {
    fn get_account(&self, account: &Account) -> Result<AccountInfo, StoreError> {
        table(&self.accounts)?
            .get(account)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account)))
    }

    fn put_account(&self, account: &Account, info: &AccountInfo) -> Result<(), StoreError> {
        table(&self.accounts)?.insert(*account, info.clone());
        Ok(())
    }

    fn delete_account(&self, account: &Account) -> Result<(), StoreError> {
        table(&self.accounts)?.remove(account);
        Ok(())
    }

    fn account_exists(&self, account: &Account) -> Result<bool, StoreError> {
        Ok(table(&self.accounts)?.contains_key(account))
    }

    fn account_count(&self) -> Result<u64, StoreError> {
        Ok(table(&self.accounts)?.len() as u64)
    }

    fn iter_accounts(&self) -> Result<Vec<(Account, AccountInfo)>, StoreError> {
        let mut accounts: Vec<_> = table(&self.accounts)?
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(accounts)
    }
}

impl PendingStore for MemoryStore {
    fn put_pending(&self, key: &PendingKey, info: &PendingInfo) -> Result<(), StoreError> {
        table(&self.pending)?.insert(*key, info.clone());
        Ok(())
    }

    fn get_pending(&self, key: &PendingKey) -> Result<PendingInfo, StoreError> {
        table(&self.pending)?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("pending {} {}", key.account, key.hash)))
    }

    fn delete_pending(&self, key: &PendingKey) -> Result<(), StoreError> {
        table(&self.pending)?.remove(key);
        Ok(())
    }

    fn pending_for_account(
        &self,
        account: &Account,
    ) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError> {
        let start = PendingKey::new(*account, BlockHash::ZERO);
        Ok(table(&self.pending)?
            .range(start..)
            .take_while(|(k, _)| k.account == *account)
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(table(&self.pending)?.len() as u64)
    }
}

impl ConfirmationHeightStore for MemoryStore {
    fn get_confirmation_height(
        &self,
        account: &Account,
    ) -> Result<ConfirmationHeightInfo, StoreError> {
        table(&self.confirmation_heights)?
            .get(account)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("confirmation height {}", account)))
    }

    fn put_confirmation_height(
        &self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError> {
        table(&self.confirmation_heights)?.insert(*account, *info);
        Ok(())
    }

    fn delete_confirmation_height(&self, account: &Account) -> Result<(), StoreError> {
        table(&self.confirmation_heights)?.remove(account);
        Ok(())
    }

    fn confirmation_height_count(&self) -> Result<u64, StoreError> {
        Ok(table(&self.confirmation_heights)?.len() as u64)
    }

    fn iter_confirmation_heights(
        &self,
    ) -> Result<Vec<(Account, ConfirmationHeightInfo)>, StoreError> {
        Ok(table(&self.confirmation_heights)?
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptionalExt;
    use lattice_types::{Amount, Epoch, Timestamp};

    fn account(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn hash(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    #[test]
    fn blocks_put_get_delete() {
        let store = MemoryStore::new();
        store.put_block(&hash(1), b"record").unwrap();
        assert!(store.block_exists(&hash(1)).unwrap());
        assert_eq!(store.get_block(&hash(1)).unwrap(), b"record");
        assert_eq!(store.block_count().unwrap(), 1);
        store.delete_block(&hash(1)).unwrap();
        assert!(matches!(store.get_block(&hash(1)), Err(StoreError::NotFound(_))));
        assert_eq!(store.get_block(&hash(1)).optional().unwrap(), None);
    }

    #[test]
    fn pending_is_scanned_per_account() {
        let store = MemoryStore::new();
        let info = PendingInfo {
            source: account(9),
            amount: Amount::raw(5),
            epoch: Epoch::Epoch0,
        };
        store.put_pending(&PendingKey::new(account(1), hash(1)), &info).unwrap();
        store.put_pending(&PendingKey::new(account(1), hash(2)), &info).unwrap();
        store.put_pending(&PendingKey::new(account(2), hash(3)), &info).unwrap();

        let for_one = store.pending_for_account(&account(1)).unwrap();
        assert_eq!(for_one.len(), 2);
        assert!(for_one.iter().all(|(k, _)| k.account == account(1)));
        assert_eq!(store.pending_count().unwrap(), 3);
    }

    #[test]
    fn accounts_and_heights() {
        let store = MemoryStore::new();
        let info = AccountInfo {
            head: hash(1),
            open_block: hash(1),
            representative: account(1),
            balance: Amount::raw(10),
            block_count: 1,
            epoch: Epoch::Epoch0,
            modified: Timestamp::from_millis(1),
        };
        store.put_account(&account(1), &info).unwrap();
        assert_eq!(store.get_account(&account(1)).unwrap(), info);
        assert_eq!(store.iter_accounts().unwrap().len(), 1);

        let height = ConfirmationHeightInfo::new(1, hash(1));
        store.put_confirmation_height(&account(1), &height).unwrap();
        assert_eq!(store.get_confirmation_height(&account(1)).unwrap(), height);
        assert_eq!(store.confirmation_height_count().unwrap(), 1);
    }
}
