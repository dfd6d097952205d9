//! Backward cementing walk for small uncemented backlogs.
//!
//! Starting from the block to cement, the walk follows `previous` links down
//! to the account's cemented frontier. Receives whose send is not cemented
//! suspend the walk until the sending account has been walked, so sections
//! are queued dependencies first. Every block read is kept in memory until
//! the pending sections are written in a single write-role window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::warn;

use lattice_ledger::{Ledger, SavedBlock, Writer};
use lattice_types::{Account, BlockHash};

use crate::cementing::{
    cement_section, CementContext, CementError, WriteDetails, BLOCKS_CONFIRMED_UNBOUNDED,
};

/// Blocks read by the unbounded walk, shared with the processor's
/// introspection.
pub(crate) type BlockCache = Arc<Mutex<HashMap<BlockHash, SavedBlock>>>;

pub(crate) struct UnboundedCementer {
    pending: VecDeque<WriteDetails>,
    pending_blocks: u64,
    /// Height each account will be cemented to once `pending` is written.
    iterated: HashMap<Account, u64>,
    block_cache: BlockCache,
    timer: Instant,
}

impl UnboundedCementer {
    pub fn new(block_cache: BlockCache) -> Self {
        Self {
            pending: VecDeque::new(),
            pending_blocks: 0,
            iterated: HashMap::new(),
            block_cache,
            timer: Instant::now(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_blocks(&self) -> u64 {
        self.pending_blocks
    }

    pub fn since_last_write(&self) -> std::time::Duration {
        self.timer.elapsed()
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<BlockHash, SavedBlock>> {
        self.block_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_block(&self, ledger: &Ledger, hash: &BlockHash) -> Result<Option<SavedBlock>, CementError> {
        if let Some(block) = self.cache().get(hash) {
            return Ok(Some(block.clone()));
        }
        let block = ledger.get_block(hash)?;
        if let Some(block) = &block {
            self.cache().insert(*hash, block.clone());
        }
        Ok(block)
    }

    /// Height below which `account` needs no further walking.
    fn reached(&self, ledger: &Ledger, account: &Account) -> u64 {
        let cemented = ledger.confirmation_height_get(account).height;
        self.iterated.get(account).map_or(cemented, |&h| h.max(cemented))
    }

    /// Walk from `original` and queue the sections it needs.
    pub fn process(&mut self, ctx: &CementContext<'_>, original: BlockHash) -> Result<(), CementError> {
        let ledger = ctx.ledger;
        let Some(block) = self.get_block(ledger, &original)? else {
            warn!(hash = %original, "block to cement is no longer in the ledger");
            return Ok(());
        };
        if ledger.confirmation_height_get(&block.account()).height >= block.height() {
            ctx.notify_already_cemented(&original);
            return Ok(());
        }

        let mut stack = vec![block];
        while let Some(top) = stack.last().cloned() {
            let account = top.account();
            let reached = self.reached(ledger, &account);
            if top.height() <= reached {
                stack.pop();
                continue;
            }

            let mut sources = Vec::new();
            let mut cursor = top.clone();
            loop {
                if let Some(source) = cursor.source() {
                    let source_block = self.get_block(ledger, &source)?.ok_or_else(|| {
                        CementError::mismatch(account, source, "source of a receive is missing")
                    })?;
                    if source_block.height() > self.reached(ledger, &source_block.account()) {
                        sources.push(source_block);
                    }
                }
                if cursor.height() <= reached + 1 {
                    break;
                }
                let previous = cursor.previous();
                cursor = self.get_block(ledger, &previous)?.ok_or_else(|| {
                    CementError::mismatch(account, previous, "previous block is missing")
                })?;
            }

            if sources.is_empty() {
                stack.pop();
                let section = WriteDetails::new(account, &cursor, &top);
                self.pending_blocks += section.block_count();
                self.pending.push_back(section);
                self.iterated.insert(account, top.height());
            } else {
                stack.extend(sources);
            }
        }
        Ok(())
    }

    /// Write every pending section under one write guard, then notify.
    pub fn cement_pending(&mut self, ctx: &CementContext<'_>) -> Result<(), CementError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let mut guard = ctx.write_queue.wait(Writer::ConfirmationHeight);
        let mut cemented = Vec::new();
        let mut result = Ok(());
        for section in &self.pending {
            match cement_section(ctx.ledger, section, u64::MAX) {
                Ok(blocks) => cemented.extend(blocks),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        guard.release();
        let elapsed = started.elapsed();

        self.pending.clear();
        self.pending_blocks = 0;
        self.iterated.clear();
        self.timer = Instant::now();
        result?;

        ctx.notify_cemented(&cemented, BLOCKS_CONFIRMED_UNBOUNDED, elapsed);
        self.cache().clear();
        Ok(())
    }

    /// Drop everything queued, after a failed write.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.pending_blocks = 0;
        self.iterated.clear();
        self.cache().clear();
    }
}
