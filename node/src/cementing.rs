//! Pieces shared by the bounded and unbounded cementing walks.
//!
//! Both walks produce [`WriteDetails`] sections, ordered so that every
//! section follows the sections it depends on. Writing a section re-reads
//! its blocks under the write role and refuses to write anything when the
//! ledger no longer matches what the walk saw.

use std::sync::atomic::AtomicU64;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use lattice_consensus::ObserverSet;
use lattice_ledger::{Ledger, LedgerError, SavedBlock, WriteDatabaseQueue};
use lattice_types::{Account, BlockHash, ConfirmationHeightInfo};
use lattice_utils::StatsCounter;

use crate::config::CementingConfig;

pub const BLOCKS_CONFIRMED: &str = "blocks_confirmed";
pub const BLOCKS_CONFIRMED_BOUNDED: &str = "blocks_confirmed_bounded";
pub const BLOCKS_CONFIRMED_UNBOUNDED: &str = "blocks_confirmed_unbounded";
pub const CEMENTED_ALREADY: &str = "cemented_already";

/// Counters recorded by the confirmation height processor.
pub const CEMENTING_STATS: &[&str] = &[
    BLOCKS_CONFIRMED,
    BLOCKS_CONFIRMED_BOUNDED,
    BLOCKS_CONFIRMED_UNBOUNDED,
    CEMENTED_ALREADY,
];

#[derive(Debug, Error)]
pub enum CementError {
    /// A block the walk relied on vanished or moved before it was written.
    /// Continuing would persist a confirmation height the ledger cannot
    /// back.
    #[error("ledger mismatch on account {account} at {hash}: {reason}")]
    LedgerMismatch {
        account: Account,
        hash: BlockHash,
        reason: &'static str,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl CementError {
    pub(crate) fn mismatch(account: Account, hash: BlockHash, reason: &'static str) -> Self {
        Self::LedgerMismatch {
            account,
            hash,
            reason,
        }
    }
}

/// A contiguous run of one account's chain to cement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct WriteDetails {
    pub account: Account,
    /// Lowest block of the run not cemented when the walk saw it.
    pub bottom_height: u64,
    pub bottom_hash: BlockHash,
    /// Desired cemented frontier.
    pub top_height: u64,
    pub top_hash: BlockHash,
}

impl WriteDetails {
    pub fn new(account: Account, bottom: &SavedBlock, top: &SavedBlock) -> Self {
        Self {
            account,
            bottom_height: bottom.height(),
            bottom_hash: bottom.hash(),
            top_height: top.height(),
            top_hash: top.hash(),
        }
    }

    pub fn block_count(&self) -> u64 {
        self.top_height - self.bottom_height + 1
    }
}

/// Observers of the confirmation height processor. Fired from the
/// processor thread after the write role is released.
#[derive(Default)]
pub struct CementationObservers {
    /// Each cemented block, per account in ascending height, dependencies
    /// first.
    pub cemented: ObserverSet<SavedBlock>,
    /// A block passed to `add` that was already cemented.
    pub already_cemented: ObserverSet<BlockHash>,
    /// Time one batch held the write role.
    pub batch_written: ObserverSet<Duration>,
}

/// Borrowed collaborators of a walk.
pub(crate) struct CementContext<'a> {
    pub ledger: &'a Ledger,
    pub write_queue: &'a WriteDatabaseQueue,
    pub stats: &'a StatsCounter,
    pub observers: &'a CementationObservers,
    pub config: &'a CementingConfig,
    /// Adaptive number of blocks written per write guard.
    pub batch_write_size: &'a AtomicU64,
}

impl CementContext<'_> {
    /// Report a written batch. Must be called without the write role held.
    pub fn notify_cemented(&self, blocks: &[SavedBlock], counter: &'static str, elapsed: Duration) {
        if blocks.is_empty() {
            return;
        }
        let count = blocks.len() as u64;
        self.stats.add(BLOCKS_CONFIRMED, count);
        self.stats.add(counter, count);
        debug!(blocks = count, ?elapsed, kind = counter, "cemented batch");
        self.observers.batch_written.notify(&elapsed);
        for block in blocks {
            self.observers.cemented.notify(block);
        }
    }

    pub fn notify_already_cemented(&self, hash: &BlockHash) {
        self.stats.increment(CEMENTED_ALREADY);
        self.observers.already_cemented.notify(hash);
    }
}

fn expect_block(
    ledger: &Ledger,
    account: Account,
    hash: &BlockHash,
    height: u64,
) -> Result<SavedBlock, CementError> {
    match ledger.get_block(hash)? {
        Some(block) if block.account() == account && block.height() == height => Ok(block),
        Some(_) => Err(CementError::mismatch(account, *hash, "block moved to another position")),
        None => Err(CementError::mismatch(account, *hash, "block no longer in the ledger")),
    }
}

/// Cement up to `limit` blocks of `section`, lowest first, and return them.
/// Blocks cemented by an earlier write are skipped; an empty result means
/// the section was already cemented. The caller holds the write role.
pub(crate) fn cement_section(
    ledger: &Ledger,
    section: &WriteDetails,
    limit: u64,
) -> Result<Vec<SavedBlock>, CementError> {
    let account = section.account;
    expect_block(ledger, account, &section.top_hash, section.top_height)?;
    expect_block(ledger, account, &section.bottom_hash, section.bottom_height)?;

    let current = ledger.confirmation_height_get(&account);
    if current.height >= section.top_height {
        return Ok(Vec::new());
    }

    let mut next = if current.height == 0 {
        ledger
            .account_info(&account)
            .map(|info| info.open_block)
            .ok_or_else(|| CementError::mismatch(account, section.bottom_hash, "account vanished"))?
    } else {
        expect_block(ledger, account, &current.frontier, current.height)?
            .successor()
            .ok_or_else(|| {
                CementError::mismatch(account, current.frontier, "cemented frontier has no successor")
            })?
    };

    let limit = limit.max(1);
    let mut blocks: Vec<SavedBlock> = Vec::new();
    loop {
        let block = expect_block(ledger, account, &next, current.height + blocks.len() as u64 + 1)?;
        let reached_top = block.hash() == section.top_hash;
        if !reached_top && block.height() >= section.top_height {
            return Err(CementError::mismatch(account, block.hash(), "chain diverged below the top"));
        }
        let successor = block.successor();
        blocks.push(block);
        if reached_top || blocks.len() as u64 >= limit {
            break;
        }
        next = successor
            .ok_or_else(|| CementError::mismatch(account, next, "chain ends below the top"))?;
    }

    if let Some(last) = blocks.last() {
        ledger.confirmation_height_put(
            &account,
            &ConfirmationHeightInfo::new(last.height(), last.hash()),
        )?;
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_ledger::testing::{dev_ledger, test_key, BlockFactory};
    use lattice_types::Amount;

    fn sends(ledger: &Ledger, count: usize) -> Vec<SavedBlock> {
        let factory = BlockFactory::new(ledger);
        let genesis = factory.genesis_key();
        (0..count)
            .map(|_| {
                ledger
                    .process(factory.send(&genesis, test_key(1).account, Amount::raw(1)))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn section_is_cemented_lowest_first() {
        let ledger = dev_ledger();
        let blocks = sends(&ledger, 3);
        let section = WriteDetails::new(blocks[0].account(), &blocks[0], &blocks[2]);
        assert_eq!(section.block_count(), 3);

        let cemented = cement_section(&ledger, &section, u64::MAX).unwrap();
        let heights: Vec<u64> = cemented.iter().map(SavedBlock::height).collect();
        assert_eq!(heights, vec![2, 3, 4]);
        assert_eq!(ledger.confirmation_height_get(&section.account).height, 4);
    }

    #[test]
    fn limit_cements_a_prefix_and_resumes() {
        let ledger = dev_ledger();
        let blocks = sends(&ledger, 3);
        let section = WriteDetails::new(blocks[0].account(), &blocks[0], &blocks[2]);

        assert_eq!(cement_section(&ledger, &section, 2).unwrap().len(), 2);
        assert_eq!(ledger.confirmation_height_get(&section.account).height, 3);

        let rest = cement_section(&ledger, &section, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].hash(), blocks[2].hash());
        assert!(cement_section(&ledger, &section, 2).unwrap().is_empty());
    }

    #[test]
    fn vanished_top_is_a_mismatch() {
        let ledger = dev_ledger();
        let blocks = sends(&ledger, 2);
        let section = WriteDetails::new(blocks[0].account(), &blocks[0], &blocks[1]);
        ledger.rollback(&blocks[1].hash()).unwrap();

        let result = cement_section(&ledger, &section, u64::MAX);
        assert!(matches!(result, Err(CementError::LedgerMismatch { .. })));
        assert_eq!(ledger.confirmation_height_get(&section.account).height, 1);
    }

    #[test]
    fn replaced_block_is_a_mismatch() {
        let ledger = dev_ledger();
        let blocks = sends(&ledger, 1);
        let section = WriteDetails::new(blocks[0].account(), &blocks[0], &blocks[0]);
        ledger.rollback(&blocks[0].hash()).unwrap();
        let factory = BlockFactory::new(&ledger);
        ledger
            .process(factory.send(&factory.genesis_key(), test_key(2).account, Amount::raw(5)))
            .unwrap();

        let result = cement_section(&ledger, &section, u64::MAX);
        assert!(matches!(result, Err(CementError::LedgerMismatch { .. })));
    }
}
