//! Genesis and epoch constants per network.
//!
//! The genesis block opens the genesis account with the whole supply and is
//! cemented from the start (confirmation height 1). Epoch blocks are
//! recognised by a well-known link value and must be signed by the epoch
//! signer, which is the genesis account on every network.

use std::sync::Arc;

use lattice_crypto::keypair_from_seed;
use lattice_types::{Account, Amount, BlockHash, Epoch, KeyPair, NetworkId};

use crate::{StateBlock, StateBlockBuilder};

/// Seed of the development genesis key. Published so tests can spend from genesis.
const DEV_GENESIS_SEED: [u8; 32] = [
    0x34, 0xf0, 0xa3, 0x7a, 0xad, 0x20, 0xf4, 0xa2, 0x60, 0xf0, 0xa5, 0xb3, 0xcb, 0x3d, 0x7f,
    0xb5, 0x06, 0x73, 0x21, 0x22, 0x63, 0xe5, 0x8a, 0x38, 0x0b, 0xc1, 0x0c, 0x47, 0x4b, 0xab,
    0x1b, 0x73,
];

/// Account of the live and beta genesis. Its key is not part of this code base.
const LIVE_GENESIS_ACCOUNT: [u8; 32] = [
    0xe8, 0x92, 0x08, 0xdd, 0x03, 0x8f, 0xbb, 0x26, 0x99, 0x87, 0x68, 0x96, 0x21, 0xd5, 0x22,
    0x92, 0xae, 0x9c, 0x35, 0x94, 0x1a, 0x74, 0x84, 0x75, 0x6e, 0xcc, 0xed, 0x92, 0xa6, 0x50,
    0x93, 0xba,
];

pub fn dev_genesis_key() -> KeyPair {
    keypair_from_seed(&DEV_GENESIS_SEED)
}

/// Link values that mark epoch upgrade blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Epochs {
    pub signer: Account,
    pub epoch_1_link: BlockHash,
    pub epoch_2_link: BlockHash,
}

impl Epochs {
    pub fn new(signer: Account) -> Self {
        Self {
            signer,
            epoch_1_link: text_link(b"epoch v1 block"),
            epoch_2_link: text_link(b"epoch v2 block"),
        }
    }

    /// The epoch an epoch block with `link` upgrades to.
    pub fn epoch(&self, link: &BlockHash) -> Option<Epoch> {
        if *link == self.epoch_1_link {
            Some(Epoch::Epoch1)
        } else if *link == self.epoch_2_link {
            Some(Epoch::Epoch2)
        } else {
            None
        }
    }

    pub fn link(&self, epoch: Epoch) -> Option<BlockHash> {
        match epoch {
            Epoch::Epoch0 => None,
            Epoch::Epoch1 => Some(self.epoch_1_link),
            Epoch::Epoch2 => Some(self.epoch_2_link),
        }
    }
}

fn text_link(text: &[u8]) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..text.len()].copy_from_slice(text);
    BlockHash::new(bytes)
}

#[derive(Clone, Debug)]
pub struct LedgerConstants {
    pub network: NetworkId,
    pub genesis: Arc<StateBlock>,
    pub genesis_amount: Amount,
    pub epochs: Epochs,
}

impl LedgerConstants {
    pub fn for_network(network: NetworkId) -> Self {
        match network {
            NetworkId::Dev => Self::with_genesis(network, dev_genesis_key().account),
            NetworkId::Live | NetworkId::Beta => {
                Self::with_genesis(network, Account::new(LIVE_GENESIS_ACCOUNT))
            }
        }
    }

    pub fn dev() -> Self {
        Self::for_network(NetworkId::Dev)
    }

    /// Constants for a network whose genesis account holds the whole supply.
    pub fn with_genesis(network: NetworkId, genesis_account: Account) -> Self {
        let genesis_amount = Amount::MAX;
        let genesis = StateBlockBuilder::new()
            .account(genesis_account)
            .representative(genesis_account)
            .balance(genesis_amount)
            .link(BlockHash::new(*genesis_account.as_bytes()))
            .build_unsigned();
        Self {
            network,
            genesis: Arc::new(genesis),
            genesis_amount,
            epochs: Epochs::new(genesis_account),
        }
    }

    pub fn genesis_account(&self) -> Account {
        self.genesis.account
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_is_deterministic() {
        assert_eq!(LedgerConstants::dev().genesis_hash(), LedgerConstants::dev().genesis_hash());
    }

    #[test]
    fn genesis_differs_per_network() {
        let dev = LedgerConstants::for_network(NetworkId::Dev);
        let live = LedgerConstants::for_network(NetworkId::Live);
        assert_ne!(dev.genesis_hash(), live.genesis_hash());
        assert_eq!(dev.genesis_account(), dev_genesis_key().account);
    }

    #[test]
    fn epoch_links_are_distinct() {
        let epochs = Epochs::new(Account::new([1; 32]));
        assert_eq!(epochs.epoch(&epochs.epoch_1_link), Some(Epoch::Epoch1));
        assert_eq!(epochs.epoch(&epochs.epoch_2_link), Some(Epoch::Epoch2));
        assert_eq!(epochs.epoch(&BlockHash::ZERO), None);
        assert_eq!(epochs.link(Epoch::Epoch2), Some(epochs.epoch_2_link));
    }
}
