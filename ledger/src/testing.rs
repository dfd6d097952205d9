//! Helpers for building valid blocks on top of a dev-network ledger.

use std::sync::Arc;

use lattice_crypto::keypair_from_seed;
use lattice_store::{MemoryStore, PendingKey};
use lattice_types::{Account, Amount, BlockHash, Epoch, KeyPair};

use crate::{dev_genesis_key, Ledger, LedgerConstants, StateBlock, StateBlockBuilder};

/// A dev ledger over an in-memory store, holding only genesis.
pub fn dev_ledger() -> Arc<Ledger> {
    match Ledger::new(Arc::new(MemoryStore::new()), LedgerConstants::dev()) {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => panic!("dev ledger initialization failed: {e}"),
    }
}

/// Deterministic test key.
pub fn test_key(n: u8) -> KeyPair {
    keypair_from_seed(&[n; 32])
}

/// Builds signed blocks against the current head of each account. Blocks are
/// returned unprocessed.
pub struct BlockFactory<'a> {
    ledger: &'a Ledger,
}

impl<'a> BlockFactory<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    pub fn genesis_key(&self) -> KeyPair {
        dev_genesis_key()
    }

    pub fn send(&self, from: &KeyPair, to: Account, amount: Amount) -> StateBlock {
        let info = self.head_info(&from.account);
        StateBlockBuilder::new()
            .account(from.account)
            .previous(info.0)
            .representative(info.1)
            .balance(info.2 - amount)
            .link_account(to)
            .sign(from)
    }

    /// Opens or receives into `keys.account`, taking the amount from the
    /// pending entry for `send`.
    pub fn receive(&self, keys: &KeyPair, send: BlockHash) -> StateBlock {
        let amount = self
            .ledger
            .pending_get(&PendingKey::new(keys.account, send))
            .map(|p| p.amount)
            .unwrap_or_default();
        let (previous, representative, balance) = match self.ledger.account_info(&keys.account) {
            Some(info) => (info.head, info.representative, info.balance),
            None => (BlockHash::ZERO, keys.account, Amount::ZERO),
        };
        StateBlockBuilder::new()
            .account(keys.account)
            .previous(previous)
            .representative(representative)
            .balance(balance + amount)
            .link(send)
            .sign(keys)
    }

    pub fn change(&self, keys: &KeyPair, representative: Account) -> StateBlock {
        let info = self.head_info(&keys.account);
        StateBlockBuilder::new()
            .account(keys.account)
            .previous(info.0)
            .representative(representative)
            .balance(info.2)
            .sign(keys)
    }

    pub fn epoch(&self, account: Account, epoch: Epoch) -> StateBlock {
        let info = self.head_info(&account);
        let link = self
            .ledger
            .constants()
            .epochs
            .link(epoch)
            .unwrap_or_default();
        StateBlockBuilder::new()
            .account(account)
            .previous(info.0)
            .representative(info.1)
            .balance(info.2)
            .link(link)
            .sign(&dev_genesis_key())
    }

    fn head_info(&self, account: &Account) -> (BlockHash, Account, Amount) {
        self.ledger
            .account_info(account)
            .map(|info| (info.head, info.representative, info.balance))
            .unwrap_or((BlockHash::ZERO, *account, Amount::ZERO))
    }
}
