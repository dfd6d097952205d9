//! State block: the single block format of the lattice.
//!
//! Every block carries the full account state after the operation (balance
//! and representative), so whether it sends, receives, changes the
//! representative or upgrades the epoch follows from comparing it with its
//! predecessor. That classification is recorded in the sideband when the
//! ledger accepts the block; the block itself never changes afterwards.

use lattice_crypto::{hash_block, sign_message, verify_signature};
use lattice_types::{Account, Amount, BlockHash, KeyPair, QualifiedRoot, Root, Signature};
use serde::{Deserialize, Serialize};

/// Distinguishes state block hashes from any other 32-byte hash preimage.
const STATE_BLOCK_PREAMBLE: [u8; 32] = {
    let mut preamble = [0u8; 32];
    preamble[31] = 6;
    preamble
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlock {
    /// The account whose chain this block extends.
    pub account: Account,

    /// Hash of the previous block in the chain; zero for the open block.
    pub previous: BlockHash,

    pub representative: Account,

    /// Balance after this block.
    pub balance: Amount,

    /// Context-dependent:
    /// - send: destination account
    /// - receive / open: hash of the send being received
    /// - epoch: the epoch link
    /// - change: zero
    pub link: BlockHash,

    /// Not covered by the hash, so it can be replaced with better work
    /// without changing the block's identity.
    pub work: u64,

    pub signature: Signature,

    hash: BlockHash,
}

impl StateBlock {
    pub fn compute_hash(
        account: &Account,
        previous: &BlockHash,
        representative: &Account,
        balance: Amount,
        link: &BlockHash,
    ) -> BlockHash {
        hash_block(&[
            &STATE_BLOCK_PREAMBLE,
            account.as_bytes(),
            previous.as_bytes(),
            representative.as_bytes(),
            &balance.number().to_be_bytes(),
            link.as_bytes(),
        ])
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    /// `previous`, or the account for an open block.
    pub fn root(&self) -> Root {
        if self.previous.is_zero() {
            Root::from(self.account)
        } else {
            Root::from(self.previous)
        }
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.root(), self.previous)
    }

    pub fn is_open(&self) -> bool {
        self.previous.is_zero()
    }

    pub fn link_as_account(&self) -> Account {
        Account::new(*self.link.as_bytes())
    }

    /// Achieved work value for this block's root.
    pub fn work_value(&self) -> u64 {
        lattice_work::work_value(&self.root(), self.work)
    }

    /// Verify the signature against `signer` (the account itself, or the
    /// epoch signer for epoch blocks).
    pub fn verify_signature(&self, signer: &Account) -> bool {
        verify_signature(self.hash.as_bytes(), &self.signature, signer)
    }

    /// Copy of this block carrying different work.
    pub fn with_work(&self, work: u64) -> Self {
        Self {
            work,
            ..self.clone()
        }
    }

    /// Re-derive the hash from the fields; used to reject tampered records.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash
            == Self::compute_hash(
                &self.account,
                &self.previous,
                &self.representative,
                self.balance,
                &self.link,
            )
    }
}

/// Builds and signs a [`StateBlock`].
#[derive(Clone, Debug, Default)]
pub struct StateBlockBuilder {
    account: Account,
    previous: BlockHash,
    representative: Account,
    balance: Amount,
    link: BlockHash,
    work: u64,
}

impl StateBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: Account) -> Self {
        self.account = account;
        self
    }

    pub fn previous(mut self, previous: BlockHash) -> Self {
        self.previous = previous;
        self
    }

    pub fn representative(mut self, representative: Account) -> Self {
        self.representative = representative;
        self
    }

    pub fn balance(mut self, balance: Amount) -> Self {
        self.balance = balance;
        self
    }

    pub fn link(mut self, link: BlockHash) -> Self {
        self.link = link;
        self
    }

    /// Link to a destination account (sends).
    pub fn link_account(mut self, destination: Account) -> Self {
        self.link = BlockHash::new(*destination.as_bytes());
        self
    }

    pub fn work(mut self, work: u64) -> Self {
        self.work = work;
        self
    }

    pub fn sign(self, keys: &KeyPair) -> StateBlock {
        let hash = StateBlock::compute_hash(
            &self.account,
            &self.previous,
            &self.representative,
            self.balance,
            &self.link,
        );
        StateBlock {
            account: self.account,
            previous: self.previous,
            representative: self.representative,
            balance: self.balance,
            link: self.link,
            work: self.work,
            signature: sign_message(hash.as_bytes(), &keys.private),
            hash,
        }
    }

    /// A block with an all-zero signature. Only ever accepted for genesis.
    pub fn build_unsigned(self) -> StateBlock {
        let hash = StateBlock::compute_hash(
            &self.account,
            &self.previous,
            &self.representative,
            self.balance,
            &self.link,
        );
        StateBlock {
            account: self.account,
            previous: self.previous,
            representative: self.representative,
            balance: self.balance,
            link: self.link,
            work: self.work,
            signature: Signature::default(),
            hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_crypto::keypair_from_seed;

    fn key() -> KeyPair {
        keypair_from_seed(&[5u8; 32])
    }

    #[test]
    fn hash_excludes_work_and_signature() {
        let keys = key();
        let block = StateBlockBuilder::new()
            .account(keys.account)
            .previous(BlockHash::new([1; 32]))
            .balance(Amount::raw(10))
            .work(1)
            .sign(&keys);
        let reworked = block.with_work(2);
        assert_eq!(block.hash(), reworked.hash());
        assert_ne!(block.work_value(), reworked.work_value());
        assert!(reworked.hash_is_consistent());
    }

    #[test]
    fn signature_verifies_for_signer_only() {
        let keys = key();
        let block = StateBlockBuilder::new().account(keys.account).sign(&keys);
        assert!(block.verify_signature(&keys.account));
        let other = keypair_from_seed(&[6u8; 32]);
        assert!(!block.verify_signature(&other.account));
    }

    #[test]
    fn open_block_root_is_account() {
        let keys = key();
        let open = StateBlockBuilder::new().account(keys.account).sign(&keys);
        assert!(open.is_open());
        assert_eq!(open.root(), Root::from(keys.account));
        assert_eq!(open.qualified_root(), QualifiedRoot::new(Root::from(keys.account), BlockHash::ZERO));

        let next = StateBlockBuilder::new()
            .account(keys.account)
            .previous(open.hash())
            .sign(&keys);
        assert_eq!(next.root(), Root::from(open.hash()));
    }

    #[test]
    fn bincode_roundtrip_keeps_hash() {
        let keys = key();
        let block = StateBlockBuilder::new()
            .account(keys.account)
            .link_account(Account::new([3; 32]))
            .balance(Amount::raw(99))
            .sign(&keys);
        let bytes = bincode::serialize(&block).unwrap();
        let decoded: StateBlock = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert!(decoded.hash_is_consistent());
    }
}
