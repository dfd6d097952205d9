//! Forward cementing walk with bounded memory.
//!
//! The walk starts at the lowest uncemented block of the target's account
//! and follows `successor` links upwards. A receive whose send is not yet
//! cemented pushes the send onto a capped dependency stack; when the stack
//! overflows its oldest entries are dropped and the walk later restarts
//! from the original block. Nothing but the pending sections and the
//! per-account heights they imply is kept between steps.
//!
//! Pending sections are written in chunks of the adaptive batch size, with
//! the write role released between chunks so other writers are not starved.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use lattice_ledger::{Ledger, SavedBlock, WriteGuard, Writer};
use lattice_types::{Account, BlockHash, ConfirmationHeightInfo};

use crate::cementing::{
    cement_section, CementContext, CementError, WriteDetails, BLOCKS_CONFIRMED_BOUNDED,
};

/// A chunk slower than this shrinks the batch size by a tenth.
pub const MAXIMUM_BATCH_WRITE_TIME: Duration = Duration::from_millis(250);
/// A chunk faster than this grows the batch size by a tenth.
pub const BATCH_WRITE_TIME_INCREASE_CUTOFF: Duration = Duration::from_millis(200);

/// New batch size after a full chunk took `elapsed`.
pub fn adjust_batch_write_size(current: u64, minimum: u64, elapsed: Duration) -> u64 {
    let step = current / 10;
    if elapsed > MAXIMUM_BATCH_WRITE_TIME {
        current.saturating_sub(step).max(minimum)
    } else if elapsed < BATCH_WRITE_TIME_INCREASE_CUTOFF {
        current.saturating_add(step)
    } else {
        current
    }
}

pub(crate) struct BoundedCementer {
    pending: VecDeque<WriteDetails>,
    pending_blocks: u64,
    /// Confirmation heights as they will be once `pending` is written.
    accounts_confirmed: HashMap<Account, ConfirmationHeightInfo>,
    timer: Instant,
}

impl BoundedCementer {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            pending_blocks: 0,
            accounts_confirmed: HashMap::new(),
            timer: Instant::now(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn since_last_write(&self) -> Duration {
        self.timer.elapsed()
    }

    fn confirmed(&self, ledger: &Ledger, account: &Account) -> ConfirmationHeightInfo {
        let cemented = ledger.confirmation_height_get(account);
        match self.accounts_confirmed.get(account) {
            Some(info) if info.height > cemented.height => *info,
            _ => cemented,
        }
    }

    fn first_uncemented(
        &self,
        ledger: &Ledger,
        account: Account,
        confirmed: &ConfirmationHeightInfo,
    ) -> Result<BlockHash, CementError> {
        let next = if confirmed.height == 0 {
            ledger.account_info(&account).map(|info| info.open_block)
        } else {
            ledger.block_successor(&confirmed.frontier)
        };
        next.ok_or_else(|| CementError::mismatch(account, confirmed.frontier, "no uncemented successor"))
    }

    fn push_section(&mut self, account: Account, bottom: &SavedBlock, top: &SavedBlock) {
        let section = WriteDetails::new(account, bottom, top);
        self.pending_blocks += section.block_count();
        self.pending.push_back(section);
        self.accounts_confirmed
            .insert(account, ConfirmationHeightInfo::new(top.height(), top.hash()));
    }

    fn over_limits(&self, ctx: &CementContext<'_>) -> bool {
        self.pending.len() >= ctx.config.max_pending_writes
            || self.accounts_confirmed.len() >= ctx.config.max_walker_items
    }

    /// Walk from `original` and queue the sections it needs, writing
    /// whenever a batch fills up.
    pub fn process(&mut self, ctx: &CementContext<'_>, original: BlockHash) -> Result<(), CementError> {
        let ledger = ctx.ledger;
        let Some(block) = ledger.get_block(&original)? else {
            warn!(hash = %original, "block to cement is no longer in the ledger");
            return Ok(());
        };
        let account = block.account();
        if ledger.confirmation_height_get(&account).height >= block.height() {
            ctx.notify_already_cemented(&original);
            return Ok(());
        }

        let max_items = ctx.config.max_walker_items.max(1);
        while self.confirmed(ledger, &account).height < block.height() {
            let mut checkpoints: VecDeque<SavedBlock> = VecDeque::from([block.clone()]);
            while let Some(target) = checkpoints.back().cloned() {
                let target_account = target.account();
                let confirmed = self.confirmed(ledger, &target_account);
                if confirmed.height >= target.height() {
                    checkpoints.pop_back();
                    continue;
                }

                let mut next = self.first_uncemented(ledger, target_account, &confirmed)?;
                let mut walked: Option<(SavedBlock, SavedBlock)> = None;
                let mut dependency = None;
                loop {
                    let current = ledger.get_block(&next)?.ok_or_else(|| {
                        CementError::mismatch(target_account, next, "block is missing")
                    })?;
                    if let Some(source) = current.source() {
                        let send = ledger.get_block(&source)?.ok_or_else(|| {
                            CementError::mismatch(target_account, source, "source of a receive is missing")
                        })?;
                        if self.confirmed(ledger, &send.account()).height < send.height() {
                            dependency = Some(send);
                            break;
                        }
                    }
                    let reached_target = current.hash() == target.hash();
                    if !reached_target && current.height() >= target.height() {
                        return Err(CementError::mismatch(
                            target_account,
                            current.hash(),
                            "chain diverged below the target",
                        ));
                    }
                    let successor = current.successor();
                    walked = Some(match walked {
                        Some((bottom, _)) => (bottom, current),
                        None => (current.clone(), current),
                    });
                    if reached_target {
                        break;
                    }
                    next = successor.ok_or_else(|| {
                        CementError::mismatch(target_account, next, "chain ends below the target")
                    })?;
                }

                if let Some((bottom, top)) = walked {
                    self.push_section(target_account, &bottom, &top);
                }
                match dependency {
                    Some(send) => {
                        if checkpoints.len() >= max_items {
                            checkpoints.pop_front();
                        }
                        checkpoints.push_back(send);
                    }
                    None => {
                        checkpoints.pop_back();
                    }
                }

                let batch = ctx.batch_write_size.load(Ordering::Relaxed);
                if self.pending_blocks >= batch || self.over_limits(ctx) {
                    self.cement_pending(ctx, false)?;
                }
            }
        }
        Ok(())
    }

    /// Write pending sections. Without `force` the write happens only when
    /// the write role is free right away or the pending limits are hit.
    pub fn cement_pending(&mut self, ctx: &CementContext<'_>, force: bool) -> Result<(), CementError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let guard = match ctx.write_queue.try_lock(Writer::ConfirmationHeight) {
            Some(guard) => guard,
            None if force || self.over_limits(ctx) => ctx.write_queue.wait(Writer::ConfirmationHeight),
            None => return Ok(()),
        };
        let result = self.write_chunks(ctx, guard);
        self.pending.clear();
        self.pending_blocks = 0;
        self.accounts_confirmed.clear();
        self.timer = Instant::now();
        result
    }

    /// Drop everything queued, after a failed write.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.pending_blocks = 0;
        self.accounts_confirmed.clear();
    }

    fn write_chunks(&mut self, ctx: &CementContext<'_>, mut guard: WriteGuard) -> Result<(), CementError> {
        let mut chunk_started = Instant::now();
        let mut in_chunk = 0u64;
        let mut cemented = Vec::new();
        while let Some(section) = self.pending.front().cloned() {
            let batch = ctx.batch_write_size.load(Ordering::Relaxed);
            let blocks = match cement_section(ctx.ledger, &section, batch.saturating_sub(in_chunk)) {
                Ok(blocks) => blocks,
                Err(e) => {
                    guard.release();
                    ctx.notify_cemented(&cemented, BLOCKS_CONFIRMED_BOUNDED, chunk_started.elapsed());
                    return Err(e);
                }
            };
            in_chunk += blocks.len() as u64;
            if blocks.last().map_or(true, |b| b.hash() == section.top_hash) {
                self.pending.pop_front();
            }
            cemented.extend(blocks);

            if in_chunk >= batch && !self.pending.is_empty() {
                let elapsed = chunk_started.elapsed();
                let resized = adjust_batch_write_size(batch, ctx.config.batch_write_size_min, elapsed);
                ctx.batch_write_size.store(resized, Ordering::Relaxed);
                debug!(batch, resized, ?elapsed, "cementing chunk written");

                guard.release();
                ctx.notify_cemented(&cemented, BLOCKS_CONFIRMED_BOUNDED, elapsed);
                cemented.clear();
                guard = ctx.write_queue.wait(Writer::ConfirmationHeight);
                chunk_started = Instant::now();
                in_chunk = 0;
            }
        }
        guard.release();
        ctx.notify_cemented(&cemented, BLOCKS_CONFIRMED_BOUNDED, chunk_started.elapsed());
        Ok(())
    }
}
