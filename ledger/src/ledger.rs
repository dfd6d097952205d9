//! The ledger: block validation, account chains, pending entries,
//! representative weights and confirmation heights over a [`Store`].

use std::sync::{Arc, Mutex, PoisonError};

use lattice_store::{
    AccountInfo, AccountStore, BlockStore, ConfirmationHeightStore, OptionalExt, PendingInfo,
    PendingKey, PendingStore, Store,
};
use lattice_types::{Account, Amount, BlockHash, ConfirmationHeightInfo, Epoch, Timestamp};
use tracing::{debug, error};

use crate::sideband::BlockRecord;
use crate::{
    BlockDetails, BlockSideband, LedgerCache, LedgerConstants, LedgerError, RepWeights,
    SavedBlock, StateBlock,
};

pub struct Ledger {
    store: Arc<dyn Store>,
    constants: LedgerConstants,
    cache: LedgerCache,
    rep_weights: RepWeights,
    /// Serializes mutations so multi-table updates are not interleaved.
    write_lock: Mutex<()>,
}

impl Ledger {
    /// Open a ledger over `store`, writing the genesis block into an empty store.
    pub fn new(store: Arc<dyn Store>, constants: LedgerConstants) -> Result<Self, LedgerError> {
        let ledger = Self {
            store,
            constants,
            cache: LedgerCache::default(),
            rep_weights: RepWeights::new(),
            write_lock: Mutex::new(()),
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    fn initialize(&self) -> Result<(), LedgerError> {
        let genesis = Arc::clone(&self.constants.genesis);
        if !self.store.block_exists(&genesis.hash())? {
            let account = genesis.account;
            let saved = SavedBlock::new(
                Arc::clone(&genesis),
                BlockSideband {
                    height: 1,
                    account,
                    successor: BlockHash::ZERO,
                    balance: genesis.balance,
                    details: BlockDetails::default(),
                    timestamp: Timestamp::EPOCH,
                },
            );
            self.save(&saved)?;
            self.store.put_account(
                &account,
                &AccountInfo {
                    head: genesis.hash(),
                    open_block: genesis.hash(),
                    representative: genesis.representative,
                    balance: genesis.balance,
                    block_count: 1,
                    epoch: Epoch::Epoch0,
                    modified: Timestamp::EPOCH,
                },
            )?;
            self.store.put_confirmation_height(
                &account,
                &ConfirmationHeightInfo::new(1, genesis.hash()),
            )?;
            debug!(genesis = %genesis.hash(), "wrote genesis block");
        }

        let accounts = self.store.iter_accounts()?;
        for (_, info) in &accounts {
            self.rep_weights
                .update(None, Some((info.representative, info.balance)));
        }
        let cemented = self
            .store
            .iter_confirmation_heights()?
            .iter()
            .map(|(_, info)| info.height)
            .sum();
        self.cache.add_blocks(self.store.block_count()?);
        self.cache.add_cemented(cemented);
        self.cache.add_accounts(accounts.len() as u64);
        Ok(())
    }

    pub fn constants(&self) -> &LedgerConstants {
        &self.constants
    }

    pub fn cache(&self) -> &LedgerCache {
        &self.cache
    }

    pub fn rep_weights(&self) -> &RepWeights {
        &self.rep_weights
    }

    // ── Reads ──────────────────────────────────────────────────────────────

    pub fn get_block(&self, hash: &BlockHash) -> Result<Option<SavedBlock>, LedgerError> {
        let Some(bytes) = self.store.get_block(hash).optional()? else {
            return Ok(None);
        };
        let record: BlockRecord = bincode::deserialize(&bytes)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(Some(record.into()))
    }

    /// Like [`Ledger::get_block`], logging and swallowing storage failures.
    pub fn block_get(&self, hash: &BlockHash) -> Option<SavedBlock> {
        logged(self.get_block(hash))
    }

    pub fn block_exists(&self, hash: &BlockHash) -> bool {
        self.store.block_exists(hash).unwrap_or_else(|e| {
            error!(error = %e, %hash, "block existence check failed");
            false
        })
    }

    pub fn block_successor(&self, hash: &BlockHash) -> Option<BlockHash> {
        self.block_get(hash).and_then(|b| b.successor())
    }

    pub fn account_info(&self, account: &Account) -> Option<AccountInfo> {
        logged(self.store.get_account(account).optional().map_err(Into::into))
    }

    pub fn accounts(&self) -> Vec<(Account, AccountInfo)> {
        self.store.iter_accounts().unwrap_or_else(|e| {
            error!(error = %e, "account iteration failed");
            Vec::new()
        })
    }

    pub fn latest(&self, account: &Account) -> Option<BlockHash> {
        self.account_info(account).map(|info| info.head)
    }

    /// The cemented boundary of `account`; zero height when nothing is cemented.
    pub fn confirmation_height_get(&self, account: &Account) -> ConfirmationHeightInfo {
        logged(
            self.store
                .get_confirmation_height(account)
                .optional()
                .map_err(Into::into),
        )
        .unwrap_or_default()
    }

    pub fn pending_get(&self, key: &PendingKey) -> Option<PendingInfo> {
        logged(self.store.get_pending(key).optional().map_err(Into::into))
    }

    pub fn pending_for_account(&self, account: &Account) -> Vec<(PendingKey, PendingInfo)> {
        self.store.pending_for_account(account).unwrap_or_else(|e| {
            error!(error = %e, %account, "pending scan failed");
            Vec::new()
        })
    }

    /// Voting weight delegated to `representative`.
    pub fn weight(&self, representative: &Account) -> Amount {
        self.rep_weights.weight(representative)
    }

    /// Whether the block is at or below its account's confirmation height.
    pub fn block_confirmed(&self, hash: &BlockHash) -> bool {
        self.block_get(hash).is_some_and(|block| {
            self.confirmation_height_get(&block.account()).height >= block.height()
        })
    }

    /// Whether everything `block` depends on (its predecessor, and the send it
    /// receives) is cemented.
    pub fn dependents_confirmed(&self, block: &SavedBlock) -> bool {
        let previous_confirmed =
            block.previous().is_zero() || self.block_confirmed(&block.previous());
        let source_confirmed = match block.source() {
            Some(source) => self.block_confirmed(&source),
            None => true,
        };
        previous_confirmed && source_confirmed
    }

    /// Amount moved by the block (sent or received).
    pub fn amount(&self, hash: &BlockHash) -> Option<Amount> {
        let block = self.block_get(hash)?;
        let previous_balance = if block.previous().is_zero() {
            Amount::ZERO
        } else {
            self.block_get(&block.previous())?.balance()
        };
        let balance = block.balance();
        Some(if balance > previous_balance {
            balance - previous_balance
        } else {
            previous_balance - balance
        })
    }

    // ── Writes ─────────────────────────────────────────────────────────────

    /// Validate and append `block` to its account chain.
    pub fn process(&self, block: StateBlock) -> Result<SavedBlock, LedgerError> {
        let _lock = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let hash = block.hash();
        if !block.hash_is_consistent() {
            return Err(LedgerError::BadSignature(hash));
        }
        if self.store.block_exists(&hash)? {
            return Err(LedgerError::Old(hash));
        }

        let info = self.store.get_account(&block.account).optional()?;
        let previous = if block.previous.is_zero() {
            None
        } else {
            Some(
                self.get_block(&block.previous)?
                    .ok_or(LedgerError::GapPrevious(hash))?,
            )
        };
        match (&info, &previous) {
            (Some(_), None) => return Err(LedgerError::Fork(hash)),
            (None, Some(_)) => return Err(LedgerError::BlockPosition(hash)),
            (Some(info), Some(previous)) => {
                if previous.account() != block.account {
                    return Err(LedgerError::BlockPosition(hash));
                }
                if info.head != block.previous {
                    return Err(LedgerError::Fork(hash));
                }
            }
            (None, None) => {}
        }

        let previous_balance = info.as_ref().map(|i| i.balance).unwrap_or_default();
        let current_epoch = info.as_ref().map(|i| i.epoch).unwrap_or_default();
        let epoch_upgrade = (block.balance == previous_balance)
            .then(|| self.constants.epochs.epoch(&block.link))
            .flatten();
        let signer = if epoch_upgrade.is_some() {
            self.constants.epochs.signer
        } else {
            block.account
        };
        if !block.verify_signature(&signer) {
            return Err(LedgerError::BadSignature(hash));
        }

        let mut details = BlockDetails {
            epoch: current_epoch,
            ..BlockDetails::default()
        };
        if block.balance < previous_balance {
            let amount = previous_balance - block.balance;
            details.is_send = true;
            self.store.put_pending(
                &PendingKey::new(block.link_as_account(), hash),
                &PendingInfo {
                    source: block.account,
                    amount,
                    epoch: current_epoch,
                },
            )?;
        } else if block.balance > previous_balance {
            if !self.store.block_exists(&block.link)? {
                return Err(LedgerError::GapSource(hash));
            }
            let key = PendingKey::new(block.account, block.link);
            let pending = self
                .store
                .get_pending(&key)
                .optional()?
                .ok_or(LedgerError::Unreceivable(hash))?;
            if pending.amount != block.balance - previous_balance {
                return Err(LedgerError::BalanceMismatch(hash));
            }
            if info.is_some() && pending.epoch > current_epoch {
                return Err(LedgerError::Unreceivable(hash));
            }
            details.is_receive = true;
            details.epoch = current_epoch.max(pending.epoch);
            self.store.delete_pending(&key)?;
        } else if let Some(epoch) = epoch_upgrade {
            let Some(info) = &info else {
                return Err(LedgerError::BlockPosition(hash));
            };
            if block.representative != info.representative {
                return Err(LedgerError::RepresentativeMismatch(hash));
            }
            if Some(epoch) != next_epoch(current_epoch) {
                return Err(LedgerError::BlockPosition(hash));
            }
            details.is_epoch = true;
            details.epoch = epoch;
        } else if !block.link.is_zero() {
            return Err(LedgerError::BalanceMismatch(hash));
        } else if info.is_none() {
            return Err(LedgerError::BlockPosition(hash));
        }

        let height = info.as_ref().map(|i| i.block_count).unwrap_or(0) + 1;
        let block = Arc::new(block);
        let saved = SavedBlock::new(
            Arc::clone(&block),
            BlockSideband {
                height,
                account: block.account,
                successor: BlockHash::ZERO,
                balance: block.balance,
                details,
                timestamp: Timestamp::now(),
            },
        );
        self.save(&saved)?;
        if let Some(mut previous) = previous {
            previous.sideband.successor = hash;
            self.save(&previous)?;
        }
        self.store.put_account(
            &block.account,
            &AccountInfo {
                head: hash,
                open_block: info.as_ref().map(|i| i.open_block).unwrap_or(hash),
                representative: block.representative,
                balance: block.balance,
                block_count: height,
                epoch: details.epoch,
                modified: Timestamp::now(),
            },
        )?;
        self.rep_weights.update(
            info.as_ref().map(|i| (i.representative, i.balance)),
            Some((block.representative, block.balance)),
        );
        self.cache.add_blocks(1);
        if info.is_none() {
            self.cache.add_accounts(1);
        }
        debug!(%hash, account = %block.account, height, "block processed");
        Ok(saved)
    }

    /// Remove `hash` and every block built on top of it, including receives
    /// in other accounts of sends being removed. Fails without changing
    /// anything beyond already-removed successors if a cemented block would
    /// have to go.
    pub fn rollback(&self, hash: &BlockHash) -> Result<Vec<SavedBlock>, LedgerError> {
        let _lock = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rolled_back = Vec::new();
        self.rollback_to(hash, &mut rolled_back)?;
        Ok(rolled_back)
    }

    fn rollback_to(
        &self,
        target: &BlockHash,
        rolled_back: &mut Vec<SavedBlock>,
    ) -> Result<(), LedgerError> {
        let block = self
            .get_block(target)?
            .ok_or(LedgerError::BlockNotFound(*target))?;
        let account = block.account();
        let cemented = self
            .store
            .get_confirmation_height(&account)
            .optional()?
            .unwrap_or_default();
        if block.height() <= cemented.height {
            return Err(LedgerError::Cemented(*target));
        }

        while self.store.block_exists(target)? {
            let info = self
                .store
                .get_account(&account)
                .optional()?
                .ok_or(LedgerError::AccountNotFound(account))?;
            let head = self
                .get_block(&info.head)?
                .ok_or(LedgerError::BlockNotFound(info.head))?;
            self.rollback_head(head, info, rolled_back)?;
        }
        Ok(())
    }

    fn rollback_head(
        &self,
        head: SavedBlock,
        info: AccountInfo,
        rolled_back: &mut Vec<SavedBlock>,
    ) -> Result<(), LedgerError> {
        let account = head.account();
        let hash = head.hash();
        let previous = if head.previous().is_zero() {
            None
        } else {
            Some(
                self.get_block(&head.previous())?
                    .ok_or(LedgerError::BlockNotFound(head.previous()))?,
            )
        };
        let previous_balance = previous.as_ref().map(|p| p.balance()).unwrap_or_default();

        if let Some(destination) = head.destination() {
            let key = PendingKey::new(destination, hash);
            while self.store.get_pending(&key).optional()?.is_none() {
                let receiver = self
                    .store
                    .get_account(&destination)
                    .optional()?
                    .ok_or(LedgerError::AccountNotFound(destination))?;
                self.rollback_to(&receiver.head, rolled_back)?;
            }
            self.store.delete_pending(&key)?;
        }
        if let Some(source) = head.source() {
            let source_block = self
                .get_block(&source)?
                .ok_or(LedgerError::BlockNotFound(source))?;
            self.store.put_pending(
                &PendingKey::new(account, source),
                &PendingInfo {
                    source: source_block.account(),
                    amount: head.balance() - previous_balance,
                    epoch: source_block.sideband.details.epoch,
                },
            )?;
        }

        match previous {
            Some(mut previous) => {
                self.store.put_account(
                    &account,
                    &AccountInfo {
                        head: previous.hash(),
                        open_block: info.open_block,
                        representative: previous.block.representative,
                        balance: previous.balance(),
                        block_count: info.block_count - 1,
                        epoch: previous.sideband.details.epoch,
                        modified: Timestamp::now(),
                    },
                )?;
                self.rep_weights.update(
                    Some((info.representative, info.balance)),
                    Some((previous.block.representative, previous.balance())),
                );
                previous.sideband.successor = BlockHash::ZERO;
                self.save(&previous)?;
            }
            None => {
                self.store.delete_account(&account)?;
                self.store.delete_confirmation_height(&account)?;
                self.rep_weights
                    .update(Some((info.representative, info.balance)), None);
                self.cache.remove_accounts(1);
            }
        }

        self.store.delete_block(&hash)?;
        self.cache.remove_blocks(1);
        debug!(%hash, %account, "block rolled back");
        rolled_back.push(head);
        Ok(())
    }

    /// Advance the cemented boundary of `account`. Heights never decrease
    /// and never pass the account's block count.
    pub fn confirmation_height_put(
        &self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), LedgerError> {
        let _lock = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self
            .store
            .get_confirmation_height(account)
            .optional()?
            .unwrap_or_default();
        if info.height < current.height {
            return Err(LedgerError::ConfirmationHeightRegression {
                account: *account,
                current: current.height,
                requested: info.height,
            });
        }
        let block_count = self
            .store
            .get_account(account)
            .optional()?
            .map(|i| i.block_count)
            .unwrap_or(0);
        if info.height > block_count {
            return Err(LedgerError::ConfirmationHeightOverflow {
                account: *account,
                requested: info.height,
                block_count,
            });
        }
        self.store.put_confirmation_height(account, info)?;
        self.cache.add_cemented(info.height - current.height);
        Ok(())
    }

    /// Replace the work of a stored block. The hash does not cover work, so
    /// the block keeps its identity.
    pub fn update_work(&self, hash: &BlockHash, work: u64) -> Result<SavedBlock, LedgerError> {
        let _lock = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut saved = self
            .get_block(hash)?
            .ok_or(LedgerError::BlockNotFound(*hash))?;
        saved.block = Arc::new(saved.block.with_work(work));
        self.save(&saved)?;
        Ok(saved)
    }

    fn save(&self, saved: &SavedBlock) -> Result<(), LedgerError> {
        let bytes = bincode::serialize(&BlockRecord::from(saved))
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.store.put_block(&saved.hash(), &bytes)?;
        Ok(())
    }
}

fn next_epoch(epoch: Epoch) -> Option<Epoch> {
    match epoch {
        Epoch::Epoch0 => Some(Epoch::Epoch1),
        Epoch::Epoch1 => Some(Epoch::Epoch2),
        Epoch::Epoch2 => None,
    }
}

fn logged<T>(result: Result<Option<T>, LedgerError>) -> Option<T> {
    result.unwrap_or_else(|e| {
        error!(error = %e, "ledger read failed");
        None
    })
}
