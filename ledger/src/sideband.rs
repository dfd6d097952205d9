//! Ledger-assigned metadata kept beside each immutable block.

use std::sync::Arc;

use lattice_types::{Account, Amount, BlockHash, Epoch, QualifiedRoot, Root, Timestamp};
use lattice_work::{WorkBlockKind, WorkThresholds};
use serde::{Deserialize, Serialize};

use crate::StateBlock;

/// What a block did relative to its predecessor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDetails {
    /// Account epoch after this block.
    pub epoch: Epoch,
    pub is_send: bool,
    pub is_receive: bool,
    pub is_epoch: bool,
}

impl BlockDetails {
    pub fn work_kind(&self) -> WorkBlockKind {
        if self.is_epoch {
            WorkBlockKind::Epoch
        } else if self.is_receive {
            WorkBlockKind::ReceiveOrOpen
        } else {
            WorkBlockKind::Base
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSideband {
    /// Position in the chain; the open block has height 1.
    pub height: u64,
    pub account: Account,
    /// Next block in the chain, zero while this block is the head.
    pub successor: BlockHash,
    pub balance: Amount,
    pub details: BlockDetails,
    pub timestamp: Timestamp,
}

/// A block the ledger has accepted, together with its sideband.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedBlock {
    pub block: Arc<StateBlock>,
    pub sideband: BlockSideband,
}

impl SavedBlock {
    pub fn new(block: Arc<StateBlock>, sideband: BlockSideband) -> Self {
        Self { block, sideband }
    }

    pub fn hash(&self) -> BlockHash {
        self.block.hash()
    }

    pub fn account(&self) -> Account {
        self.sideband.account
    }

    pub fn height(&self) -> u64 {
        self.sideband.height
    }

    pub fn previous(&self) -> BlockHash {
        self.block.previous
    }

    pub fn successor(&self) -> Option<BlockHash> {
        if self.sideband.successor.is_zero() {
            None
        } else {
            Some(self.sideband.successor)
        }
    }

    pub fn root(&self) -> Root {
        self.block.root()
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        self.block.qualified_root()
    }

    pub fn balance(&self) -> Amount {
        self.sideband.balance
    }

    pub fn is_send(&self) -> bool {
        self.sideband.details.is_send
    }

    pub fn is_receive(&self) -> bool {
        self.sideband.details.is_receive
    }

    pub fn is_epoch(&self) -> bool {
        self.sideband.details.is_epoch
    }

    /// The send this block receives, if it is a receive or open.
    pub fn source(&self) -> Option<BlockHash> {
        self.is_receive().then_some(self.block.link)
    }

    /// The account a send pays into.
    pub fn destination(&self) -> Option<Account> {
        self.is_send().then(|| self.block.link_as_account())
    }

    /// The work threshold this block is measured against.
    pub fn work_threshold(&self, thresholds: &WorkThresholds) -> u64 {
        let details = &self.sideband.details;
        thresholds.threshold(details.epoch, details.work_kind())
    }
}

/// The on-store encoding of a saved block.
#[derive(Serialize, Deserialize)]
pub(crate) struct BlockRecord {
    pub block: StateBlock,
    pub sideband: BlockSideband,
}

impl From<&SavedBlock> for BlockRecord {
    fn from(saved: &SavedBlock) -> Self {
        Self {
            block: (*saved.block).clone(),
            sideband: saved.sideband.clone(),
        }
    }
}

impl From<BlockRecord> for SavedBlock {
    fn from(record: BlockRecord) -> Self {
        Self::new(Arc::new(record.block), record.sideband)
    }
}
