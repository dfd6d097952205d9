//! Confirmation height processor: cements confirmed blocks.
//!
//! Blocks confirmed by consensus are queued with [`add`]. A dedicated thread
//! takes them one at a time and advances the confirmation height of every
//! account the block depends on, using one of two walks:
//!
//! - **unbounded**: reads the whole uncemented dependency graph into memory
//!   and writes it at once. Chosen while the ledger's uncemented backlog is
//!   below `unbounded_cutoff`.
//! - **bounded**: walks forward with capped memory and writes in chunks.
//!
//! Cemented blocks are reported to observers after the write role is
//! released, per account in ascending height, dependencies first.
//!
//! [`add`]: ConfirmationHeightProcessor::add

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info};

use lattice_consensus::CementationQueue;
use lattice_ledger::{Ledger, SavedBlock, WriteDatabaseQueue};
use lattice_types::BlockHash;
use lattice_utils::StatsCounter;

use crate::cementing::{CementContext, CementError, CementationObservers};
use crate::cementing_bounded::BoundedCementer;
use crate::cementing_unbounded::{BlockCache, UnboundedCementer};
use crate::config::{CementingConfig, CementingMode};
use crate::NodeError;

#[derive(Default)]
struct ProcessorState {
    awaiting: VecDeque<BlockHash>,
    awaiting_set: HashSet<BlockHash>,
    current: Option<BlockHash>,
    paused: bool,
    stopped: bool,
}

pub struct ConfirmationHeightProcessor {
    ledger: Arc<Ledger>,
    write_queue: Arc<WriteDatabaseQueue>,
    config: CementingConfig,
    stats: Arc<StatsCounter>,
    observers: CementationObservers,
    state: Mutex<ProcessorState>,
    condition: Condvar,
    block_cache: BlockCache,
    batch_write_size: AtomicU64,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ConfirmationHeightProcessor {
    pub fn new(
        ledger: Arc<Ledger>,
        write_queue: Arc<WriteDatabaseQueue>,
        config: CementingConfig,
        stats: Arc<StatsCounter>,
    ) -> Self {
        Self {
            ledger,
            write_queue,
            batch_write_size: AtomicU64::new(config.batch_write_size_min),
            config,
            stats,
            observers: CementationObservers::default(),
            state: Mutex::new(ProcessorState::default()),
            condition: Condvar::new(),
            block_cache: BlockCache::default(),
            thread: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the processing thread.
    pub fn start(self: &Arc<Self>) -> Result<(), NodeError> {
        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        if thread.is_some() {
            return Err(NodeError::AlreadyStarted);
        }
        let processor = Arc::clone(self);
        *thread = Some(
            std::thread::Builder::new()
                .name("Conf height".to_string())
                .spawn(move || processor.run())?,
        );
        Ok(())
    }

    /// Stop the thread and wait for it. Pending writes of the batch in
    /// progress are completed first.
    pub fn stop(&self) {
        self.lock().stopped = true;
        self.condition.notify_all();
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("confirmation height thread panicked");
            }
        }
    }

    /// Queue `hash` for cementing. Adding a queued hash again is a no-op.
    pub fn add(&self, hash: BlockHash) {
        {
            let mut state = self.lock();
            if !state.awaiting_set.insert(hash) {
                return;
            }
            state.awaiting.push_back(hash);
        }
        self.condition.notify_all();
    }

    /// The block whose walk is in progress.
    pub fn current(&self) -> Option<BlockHash> {
        self.lock().current
    }

    pub fn awaiting_processing_size(&self) -> usize {
        self.lock().awaiting.len()
    }

    /// The hash was passed to [`Self::add`] and is queued or being walked.
    pub fn is_processing_added_block(&self, hash: &BlockHash) -> bool {
        let state = self.lock();
        state.current == Some(*hash) || state.awaiting_set.contains(hash)
    }

    /// Like [`Self::is_processing_added_block`], also covering blocks the
    /// unbounded walk has read but not yet written.
    pub fn is_processing_block(&self, hash: &BlockHash) -> bool {
        self.is_processing_added_block(hash)
            || self
                .block_cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(hash)
    }

    /// Hold queued blocks until [`Self::unpause`]. A walk in progress is not
    /// interrupted.
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    pub fn unpause(&self) {
        self.lock().paused = false;
        self.condition.notify_all();
    }

    pub fn add_cemented_observer(&self, observer: impl Fn(&SavedBlock) + Send + Sync + 'static) {
        self.observers.cemented.add(observer);
    }

    pub fn add_block_already_cemented_observer(
        &self,
        observer: impl Fn(&BlockHash) + Send + Sync + 'static,
    ) {
        self.observers.already_cemented.add(observer);
    }

    pub fn add_batch_written_observer(&self, observer: impl Fn(&Duration) + Send + Sync + 'static) {
        self.observers.batch_written.add(observer);
    }

    /// Current adaptive chunk size of the bounded walk.
    pub fn batch_write_size(&self) -> u64 {
        self.batch_write_size.load(Ordering::Relaxed)
    }

    fn context(&self) -> CementContext<'_> {
        CementContext {
            ledger: &self.ledger,
            write_queue: &self.write_queue,
            stats: &self.stats,
            observers: &self.observers,
            config: &self.config,
            batch_write_size: &self.batch_write_size,
        }
    }

    fn run(&self) {
        debug!("confirmation height processor started");
        let ctx = self.context();
        let mut bounded = BoundedCementer::new();
        let mut unbounded = UnboundedCementer::new(Arc::clone(&self.block_cache));

        let mut state = self.lock();
        while !state.stopped {
            if !state.paused {
                if let Some(hash) = state.awaiting.pop_front() {
                    state.awaiting_set.remove(&hash);
                    state.current = Some(hash);
                    let more_awaiting = !state.awaiting.is_empty();
                    drop(state);

                    let result =
                        self.process(&ctx, &mut bounded, &mut unbounded, hash, more_awaiting);
                    self.handle(result, &mut bounded, &mut unbounded);

                    state = self.lock();
                    state.current = None;
                    continue;
                }

                if bounded.has_pending() || unbounded.has_pending() {
                    drop(state);
                    let result = bounded
                        .cement_pending(&ctx, true)
                        .and_then(|()| unbounded.cement_pending(&ctx));
                    self.handle(result, &mut bounded, &mut unbounded);
                    state = self.lock();
                    continue;
                }
            }

            state = self
                .condition
                .wait_while(state, |s| !s.stopped && (s.paused || s.awaiting.is_empty()))
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(state);

        let result = bounded
            .cement_pending(&ctx, true)
            .and_then(|()| unbounded.cement_pending(&ctx));
        self.handle(result, &mut bounded, &mut unbounded);
        info!("confirmation height processor stopped");
    }

    fn use_unbounded(&self, bounded: &BoundedCementer, unbounded: &UnboundedCementer) -> bool {
        if unbounded.has_pending() {
            return true;
        }
        match self.config.mode {
            CementingMode::Unbounded => true,
            CementingMode::Bounded => false,
            CementingMode::Automatic => {
                let cache = self.ledger.cache();
                let blocks = cache.block_count();
                let cutoff = self.config.unbounded_cutoff;
                let small_backlog = blocks < cutoff || blocks - cutoff < cache.cemented_count();
                small_backlog && !bounded.has_pending()
            }
        }
    }

    fn process(
        &self,
        ctx: &CementContext<'_>,
        bounded: &mut BoundedCementer,
        unbounded: &mut UnboundedCementer,
        hash: BlockHash,
        more_awaiting: bool,
    ) -> Result<(), CementError> {
        let min_time = Duration::from_millis(self.config.batch_separate_pending_min_time_ms);
        if self.use_unbounded(bounded, unbounded) {
            unbounded.process(ctx, hash)?;
            if !more_awaiting
                || unbounded.pending_blocks() >= self.batch_write_size()
                || unbounded.since_last_write() >= min_time
            {
                unbounded.cement_pending(ctx)?;
            }
        } else {
            bounded.process(ctx, hash)?;
            if !more_awaiting {
                bounded.cement_pending(ctx, true)?;
            } else if bounded.since_last_write() >= min_time {
                bounded.cement_pending(ctx, false)?;
            }
        }
        Ok(())
    }

    fn handle(
        &self,
        result: Result<(), CementError>,
        bounded: &mut BoundedCementer,
        unbounded: &mut UnboundedCementer,
    ) {
        match result {
            Ok(()) => {}
            Err(e @ CementError::LedgerMismatch { .. }) => {
                error!(error = %e, "confirmation height would not match the ledger, aborting");
                std::process::abort();
            }
            Err(e) => {
                error!(error = %e, "cementing failed, pending writes dropped");
                bounded.clear();
                unbounded.clear();
            }
        }
    }
}

impl CementationQueue for ConfirmationHeightProcessor {
    fn add(&self, hash: BlockHash) {
        ConfirmationHeightProcessor::add(self, hash);
    }

    fn is_processing_block(&self, hash: &BlockHash) -> bool {
        ConfirmationHeightProcessor::is_processing_block(self, hash)
    }

    fn is_processing_added_block(&self, hash: &BlockHash) -> bool {
        ConfirmationHeightProcessor::is_processing_added_block(self, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cementing::{BLOCKS_CONFIRMED, CEMENTED_ALREADY, CEMENTING_STATS};
    use lattice_ledger::testing::{dev_ledger, test_key, BlockFactory};
    use lattice_ledger::Writer;
    use lattice_types::Amount;
    use std::time::Instant;

    fn processor(ledger: &Arc<Ledger>, config: CementingConfig) -> Arc<ConfirmationHeightProcessor> {
        Arc::new(ConfirmationHeightProcessor::new(
            Arc::clone(ledger),
            Arc::new(WriteDatabaseQueue::new(false)),
            config,
            Arc::new(StatsCounter::new(CEMENTING_STATS)),
        ))
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn adding_twice_queues_once() {
        let ledger = dev_ledger();
        let chp = processor(&ledger, CementingConfig::default());
        let hash = BlockHash::new([7; 32]);
        chp.add(hash);
        chp.add(hash);
        assert_eq!(chp.awaiting_processing_size(), 1);
        assert!(chp.is_processing_added_block(&hash));
        assert!(chp.is_processing_block(&hash));
        assert_eq!(chp.current(), None);
    }

    #[test]
    fn paused_processor_holds_blocks() {
        let ledger = dev_ledger();
        let factory = BlockFactory::new(&ledger);
        let send = ledger
            .process(factory.send(&factory.genesis_key(), test_key(1).account, Amount::raw(1)))
            .unwrap();
        let chp = processor(&ledger, CementingConfig::default());
        chp.pause();
        chp.start().unwrap();
        chp.add(send.hash());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(chp.awaiting_processing_size(), 1);
        assert!(!ledger.block_confirmed(&send.hash()));

        chp.unpause();
        assert!(wait_until(|| ledger.block_confirmed(&send.hash())));
        chp.stop();
    }

    #[test]
    fn already_cemented_block_is_reported() {
        let ledger = dev_ledger();
        let chp = processor(&ledger, CementingConfig::default());
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        chp.add_block_already_cemented_observer(move |hash| sink.lock().unwrap().push(*hash));
        chp.start().unwrap();

        let genesis = ledger.constants().genesis_hash();
        chp.add(genesis);
        assert!(wait_until(|| !reported.lock().unwrap().is_empty()));
        assert_eq!(*reported.lock().unwrap(), vec![genesis]);
        assert_eq!(chp.stats.get(CEMENTED_ALREADY), 1);
        chp.stop();
    }

    #[test]
    fn held_write_role_delays_cementing() {
        let ledger = dev_ledger();
        let factory = BlockFactory::new(&ledger);
        let send = ledger
            .process(factory.send(&factory.genesis_key(), test_key(1).account, Amount::raw(1)))
            .unwrap();
        let queue = Arc::new(WriteDatabaseQueue::new(false));
        let chp = Arc::new(ConfirmationHeightProcessor::new(
            Arc::clone(&ledger),
            Arc::clone(&queue),
            CementingConfig::default(),
            Arc::new(StatsCounter::new(CEMENTING_STATS)),
        ));
        chp.start().unwrap();

        let held = queue.wait(Writer::Testing);
        chp.add(send.hash());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!ledger.block_confirmed(&send.hash()));

        drop(held);
        assert!(wait_until(|| ledger.block_confirmed(&send.hash())));
        assert!(wait_until(|| chp.stats.get(BLOCKS_CONFIRMED) == 1));
        chp.stop();
    }

    #[test]
    fn stop_without_start_returns() {
        let ledger = dev_ledger();
        let chp = processor(&ledger, CementingConfig::default());
        chp.stop();
        assert!(chp.start().is_ok());
        chp.stop();
    }
}
