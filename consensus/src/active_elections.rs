//! Active elections container: schedules, admits and retires elections.
//!
//! The manager owns every live [`Election`] keyed by qualified root, an index
//! from each contested block hash to its election, and the caches that
//! remember recent outcomes (recently confirmed, recently dropped, recently
//! cemented, inactive votes, expired optimistic accounts).
//!
//! All of that sits behind one mutex. Election locks are only ever taken
//! while holding it, never the other way round. Observers and the cementing
//! queue are called after the manager lock is released.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lattice_ledger::{Ledger, SavedBlock, StateBlock};
use lattice_types::{Account, Amount, BlockHash, NetworkId, QualifiedRoot};
use lattice_utils::StatsCounter;
use lattice_work::{from_multiplier, to_multiplier, WorkThresholds};
use tracing::{debug, info, warn};

use crate::cementation::CementationQueue;
use crate::config::{ElectionsConfig, FrontiersConfirmationMode};
use crate::election::{
    ConfirmedElection, Election, ElectionBehavior, ElectionContext, ElectionStatus,
    ElectionStatusType,
};
use crate::expired_optimistic::ExpiredOptimisticElections;
use crate::inactive_cache::{evaluate_status, InactiveCacheEntry, InactiveThresholds, InactiveVoteCache};
use crate::multipliers::MultiplierRing;
use crate::observers::{CementedBlockEvent, ElectionObservers};
use crate::online_reps::OnlineReps;
use crate::publish_filter::PublishFilter;
use crate::recently_confirmed::{RecentlyCemented, RecentlyConfirmed};
use crate::recently_dropped::RecentlyDropped;
use crate::solicitor::ConfirmationSolicitor;
use crate::stats;
use crate::vote::{Vote, VoteCode};

/// A dropped root can be restarted with better work for this long.
const RESTART_WINDOW: Duration = Duration::from_secs(120);

/// Highest multiplier reported by [`ActiveElections::limited_active_difficulty`].
const MAX_WORK_MULTIPLIER: f64 = 64.0;

/// Accounts swept pessimistically per tick.
const PESSIMISTIC_BATCH: usize = 1000;

/// Accounts whose optimistic election failed are left out of frontier
/// confirmation for this long.
const EXPIRED_OPTIMISTIC_CUTOFF: Duration = Duration::from_secs(30 * 60);

/// Elections needed before the median multiplier is sampled.
const MEDIAN_MIN_ELECTIONS: usize = 10;

#[derive(Clone, Default)]
pub struct ElectionInsertResult {
    /// A new election was created.
    pub inserted: bool,
    /// The election for the block's root, new or existing.
    pub election: Option<Arc<Election>>,
}

struct RootEntry {
    election: Arc<Election>,
    /// Normalized work multiplier of the best block seen for the root.
    multiplier: f64,
    /// Submitted by this node; never evicted for capacity.
    local: bool,
    /// Insertion order, breaks multiplier ties.
    sequence: u64,
}

struct ActiveInner {
    roots: HashMap<QualifiedRoot, RootEntry>,
    /// Every block hash taking part in a live election.
    blocks: HashMap<BlockHash, Arc<Election>>,
    /// Confirmed winners waiting for their cemented callback.
    winner_details: HashMap<BlockHash, Arc<Election>>,
    recently_confirmed: RecentlyConfirmed,
    recently_cemented: RecentlyCemented,
    recently_dropped: RecentlyDropped,
    inactive_cache: InactiveVoteCache,
    expired_optimistic: ExpiredOptimisticElections,
    multipliers: MultiplierRing,
    trended_active_multiplier: f64,
    last_prioritized_multiplier: Option<f64>,
    last_check_all: Option<Instant>,
    /// Confirmed winners not yet in the ledger; queued for cementing once
    /// they arrive.
    awaiting_ledger: VecDeque<BlockHash>,
    awaiting_ledger_capacity: usize,
    optimistic_count: usize,
    next_sequence: u64,
    stopped: bool,
}

impl ActiveInner {
    fn new(config: &ElectionsConfig) -> Self {
        Self {
            roots: HashMap::new(),
            blocks: HashMap::new(),
            winner_details: HashMap::new(),
            recently_confirmed: RecentlyConfirmed::new(config.recently_confirmed_size),
            recently_cemented: RecentlyCemented::new(config.confirmation_history_size),
            recently_dropped: RecentlyDropped::new(config.recently_dropped_size),
            inactive_cache: InactiveVoteCache::new(config.inactive_votes_cache_size),
            expired_optimistic: ExpiredOptimisticElections::new(
                config.max_expired_optimistic_elections,
            ),
            multipliers: MultiplierRing::default(),
            trended_active_multiplier: 1.0,
            last_prioritized_multiplier: None,
            last_check_all: None,
            awaiting_ledger: VecDeque::new(),
            awaiting_ledger_capacity: config.confirmation_history_size,
            optimistic_count: 0,
            next_sequence: 0,
            stopped: false,
        }
    }

    /// Register the results of elections that confirmed during a call.
    fn record_confirmed(
        &mut self,
        confirmed: Vec<ConfirmedElection>,
        cement: bool,
        deferred: &mut Deferred,
    ) {
        for result in confirmed {
            let winner = result.status.winner_hash();
            self.recently_confirmed.put(result.qualified_root, winner);
            for loser in &result.losers {
                let hash = loser.hash();
                self.recently_confirmed.reject(result.qualified_root, hash);
                self.blocks.remove(&hash);
                deferred.stopped.push(hash);
            }
            if let Some(entry) = self.roots.get(&result.qualified_root) {
                self.winner_details
                    .insert(winner, Arc::clone(&entry.election));
            }
            if cement {
                deferred.cement.push(winner);
            }
        }
    }

    /// Queue confirmed winners missing from the ledger. Beyond capacity the
    /// oldest are forgotten together with their winner details.
    fn await_ledger(&mut self, hashes: impl IntoIterator<Item = BlockHash>) {
        self.awaiting_ledger.extend(hashes);
        while self.awaiting_ledger.len() > self.awaiting_ledger_capacity {
            if let Some(hash) = self.awaiting_ledger.pop_front() {
                self.winner_details.remove(&hash);
            }
        }
    }

    fn unconfirmed_count(&self) -> usize {
        self.roots
            .values()
            .filter(|entry| !entry.election.confirmed())
            .count()
    }
}

/// Side effects collected under the manager lock and applied after it is
/// released.
#[derive(Default)]
struct Deferred {
    stopped: Vec<BlockHash>,
    cement: Vec<BlockHash>,
    blocks: Vec<CementedBlockEvent>,
    difficulty: Option<u64>,
    bootstrap: Vec<BlockHash>,
}

/// Manager of all live elections.
pub struct ActiveElections {
    ledger: Arc<Ledger>,
    config: ElectionsConfig,
    network: NetworkId,
    thresholds: WorkThresholds,
    online_reps: Arc<OnlineReps>,
    stats: Arc<StatsCounter>,
    cementation: Arc<dyn CementationQueue>,
    publish_filter: Arc<PublishFilter>,
    observers: ElectionObservers,
    inner: Mutex<ActiveInner>,
}

impl ActiveElections {
    pub fn new(
        ledger: Arc<Ledger>,
        config: ElectionsConfig,
        online_reps: Arc<OnlineReps>,
        stats: Arc<StatsCounter>,
        cementation: Arc<dyn CementationQueue>,
        publish_filter: Arc<PublishFilter>,
    ) -> Self {
        let network = ledger.constants().network;
        let inner = Mutex::new(ActiveInner::new(&config));
        Self {
            ledger,
            network,
            thresholds: WorkThresholds::for_network(network),
            config,
            online_reps,
            stats,
            cementation,
            publish_filter,
            observers: ElectionObservers::default(),
            inner,
        }
    }

    pub fn observers(&self) -> &ElectionObservers {
        &self.observers
    }

    pub fn config(&self) -> &ElectionsConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, ActiveInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self, online_stake: Amount) -> ElectionContext<'_> {
        ElectionContext::new(
            &self.ledger,
            &self.config,
            self.network,
            online_stake,
            &self.stats,
        )
    }

    /// Normalized multiplier of `block`, measured against the threshold its
    /// ledger record demands, or the base threshold when not in the ledger.
    fn block_multiplier(&self, block: &StateBlock, saved: Option<&SavedBlock>) -> f64 {
        let threshold = saved.map_or(self.thresholds.base, |saved| {
            saved.work_threshold(&self.thresholds)
        });
        self.thresholds
            .normalized_multiplier(to_multiplier(block.work_value(), threshold), threshold)
    }

    fn fire(&self, deferred: Deferred) {
        for hash in &deferred.stopped {
            self.observers.active_stopped.notify(hash);
        }
        if let Some(difficulty) = deferred.difficulty {
            self.observers.difficulty.notify(&difficulty);
        }
        for event in &deferred.blocks {
            self.observers.blocks.notify(event);
        }
        for hash in &deferred.bootstrap {
            self.observers.bootstrap_requested.notify(hash);
        }
        let mut missing = Vec::new();
        for hash in deferred.cement {
            if self.ledger.block_exists(&hash) {
                self.cementation.add(hash);
            } else {
                missing.push(hash);
            }
        }
        if !missing.is_empty() {
            self.lock().await_ledger(missing);
        }
    }

    // ── Admission ──────────────────────────────────────────────────────────

    /// Start an election for `block` unless its root is already contested,
    /// recently confirmed, or the container is full and the block's work
    /// does not beat the weakest live election.
    pub fn insert(&self, block: Arc<StateBlock>, behavior: ElectionBehavior) -> ElectionInsertResult {
        self.insert_impl(block, behavior, false, Instant::now())
    }

    /// Like [`ActiveElections::insert`] for a block this node created
    /// itself. Local elections bypass the capacity check.
    pub fn insert_local(&self, block: Arc<StateBlock>) -> ElectionInsertResult {
        self.insert_impl(block, ElectionBehavior::Normal, true, Instant::now())
    }

    fn insert_impl(
        &self,
        block: Arc<StateBlock>,
        behavior: ElectionBehavior,
        local: bool,
        now: Instant,
    ) -> ElectionInsertResult {
        let hash = block.hash();
        let root = block.qualified_root();
        let saved = self.ledger.block_get(&hash);
        let height = saved.as_ref().map_or(0, SavedBlock::height);
        let multiplier = self.block_multiplier(&block, saved.as_ref());
        let online_stake = self.online_reps.online_stake(now);

        let mut deferred = Deferred::default();
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.stopped {
            return ElectionInsertResult::default();
        }
        if let Some(entry) = inner.roots.get(&root) {
            return ElectionInsertResult {
                inserted: false,
                election: Some(Arc::clone(&entry.election)),
            };
        }
        if inner.recently_confirmed.root_exists(&root) {
            return ElectionInsertResult::default();
        }
        if !local && inner.roots.len() >= self.config.active_elections_size {
            let lowest = inner
                .roots
                .values()
                .map(|entry| entry.multiplier)
                .fold(f64::INFINITY, f64::min);
            if multiplier <= lowest {
                inner.recently_dropped.add(root, now);
                self.stats.increment(stats::ELECTION_DROP);
                debug!(%hash, multiplier, "election refused at capacity");
                return ElectionInsertResult::default();
            }
        }

        let prioritized = inner.roots.len() < self.config.prioritized_cutoff()
            || inner
                .last_prioritized_multiplier
                .is_some_and(|last| multiplier > last);
        let election = Arc::new(Election::new(block, height, behavior, prioritized, now));
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.roots.insert(
            root,
            RootEntry {
                election: Arc::clone(&election),
                multiplier,
                local,
                sequence,
            },
        );
        inner.blocks.insert(hash, Arc::clone(&election));
        if behavior == ElectionBehavior::Optimistic {
            inner.optimistic_count += 1;
            self.stats.increment(stats::ELECTION_OPTIMISTIC);
        }

        if let Some(entry) = inner.inactive_cache.find(&hash).cloned() {
            let mut ctx = self.context(online_stake);
            election.insert_inactive_votes_cache(&entry, &mut ctx, now);
            inner.record_confirmed(ctx.confirmed, true, &mut deferred);
        }

        self.stats.increment(stats::ELECTION_START);
        self.stats.increment(if prioritized {
            stats::ELECTION_PRIORITY
        } else {
            stats::ELECTION_NON_PRIORITY
        });
        debug!(%hash, %root, ?behavior, prioritized, "election started");
        drop(guard);

        self.fire(deferred);
        ElectionInsertResult {
            inserted: true,
            election: Some(election),
        }
    }

    /// The next uncemented block of `account`, provided everything it
    /// depends on is cemented.
    fn next_uncemented(&self, account: &Account) -> Option<SavedBlock> {
        let info = self.ledger.account_info(account)?;
        let conf = self.ledger.confirmation_height_get(account);
        if conf.height >= info.block_count {
            return None;
        }
        let target = if conf.height == 0 {
            info.open_block
        } else {
            self.ledger.block_successor(&conf.frontier)?
        };
        let saved = self.ledger.block_get(&target)?;
        self.ledger.dependents_confirmed(&saved).then_some(saved)
    }

    /// Start and activate an election for the next uncemented block of
    /// `account`. Returns the election when one is live for that block.
    pub fn activate(&self, account: &Account) -> Option<Arc<Election>> {
        let saved = self.next_uncemented(account)?;
        let result = self.insert(Arc::clone(&saved.block), ElectionBehavior::Normal);
        let election = result.election?;
        election.transition_active(Instant::now());
        Some(election)
    }

    /// Start an election for a block whose cached votes already qualified it
    /// while the block itself was missing.
    pub fn trigger_inactive_votes_cache_election(&self, block: Arc<StateBlock>) -> bool {
        let started = self
            .lock()
            .inactive_cache
            .find(&block.hash())
            .is_some_and(|entry| entry.status.election_started);
        if !started {
            return false;
        }
        let result = self.insert(block, ElectionBehavior::Normal);
        if let Some(election) = &result.election {
            election.transition_active(Instant::now());
        }
        result.inserted
    }

    // ── Votes ──────────────────────────────────────────────────────────────

    /// Route each hash of `vote` to its election, or to the inactive cache
    /// when no election exists.
    pub fn vote(&self, vote: &Vote) -> VoteCode {
        if !vote.validate() {
            self.stats.increment(stats::VOTE_INVALID);
            return VoteCode::Invalid;
        }
        let now = Instant::now();
        self.online_reps.observe(vote.account, now);
        let online_stake = self.online_reps.online_stake(now);
        let rep_weight = self.ledger.weight(&vote.account);
        let thresholds = InactiveThresholds {
            confirm_weight: self.config.online_weight_minimum,
            election_weight: Amount::raw(
                online_stake.number() / 100
                    * u128::from(self.config.election_hint_weight_percent),
            ),
            election_min_voters: self.config.election_hint_min_voters,
        };

        let mut deferred = Deferred::default();
        let mut to_start = Vec::new();
        let mut processed = false;
        let mut replay = false;
        let mut recently_confirmed = 0;

        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut ctx = self.context(online_stake);
        for hash in &vote.hashes {
            if let Some(election) = inner.blocks.get(hash).cloned() {
                let result = election.vote(vote.account, vote.sequence, *hash, &mut ctx, now);
                processed = true;
                replay |= result.replay;
            } else if !inner.recently_confirmed.exists(hash) {
                if rep_weight > ctx.minimum_principal_weight() {
                    self.add_inactive_vote(inner, *hash, vote.account, &thresholds, now, &mut to_start, &mut deferred);
                }
            } else {
                recently_confirmed += 1;
            }
        }
        inner.record_confirmed(ctx.confirmed, true, &mut deferred);
        drop(guard);

        let code = if processed {
            if replay {
                VoteCode::Replay
            } else {
                VoteCode::Vote
            }
        } else if recently_confirmed == vote.hashes.len() {
            VoteCode::Replay
        } else {
            VoteCode::Indeterminate
        };
        match code {
            VoteCode::Replay => self.stats.increment(stats::VOTE_REPLAY),
            VoteCode::Indeterminate => self.stats.increment(stats::VOTE_INDETERMINATE),
            _ => {}
        }

        self.fire(deferred);
        for hash in to_start {
            self.start_from_inactive(&hash);
        }
        code
    }

    #[allow(clippy::too_many_arguments)]
    fn add_inactive_vote(
        &self,
        inner: &mut ActiveInner,
        hash: BlockHash,
        voter: Account,
        thresholds: &InactiveThresholds,
        now: Instant,
        to_start: &mut Vec<BlockHash>,
        deferred: &mut Deferred,
    ) {
        let Some(entry) = inner.inactive_cache.insert_voter(hash, voter, now) else {
            return;
        };
        let tally = entry
            .voters
            .iter()
            .fold(Amount::ZERO, |sum, voter| sum.saturating_add(self.ledger.weight(voter)));
        let status = evaluate_status(entry.status, tally, entry.voters.len(), thresholds);
        inner.inactive_cache.set_status(&hash, status);
        if status.election_started && !entry.status.election_started {
            to_start.push(hash);
        }
        if status.bootstrap_started && !entry.status.bootstrap_started {
            deferred.bootstrap.push(hash);
        }
    }

    fn start_from_inactive(&self, hash: &BlockHash) {
        let Some(saved) = self.ledger.block_get(hash) else {
            return;
        };
        if self.ledger.block_confirmed(hash) || self.cementation.is_processing_block(hash) {
            return;
        }
        let result = self.insert(Arc::clone(&saved.block), ElectionBehavior::Normal);
        if let Some(election) = result.election {
            election.transition_active(Instant::now());
        }
    }

    // ── Forks and work ─────────────────────────────────────────────────────

    /// Offer a block to the election of its root. Returns true when the
    /// block joined the election as a new fork.
    pub fn publish(&self, block: Arc<StateBlock>) -> bool {
        let now = Instant::now();
        let hash = block.hash();
        let online_stake = self.online_reps.online_stake(now);

        let mut deferred = Deferred::default();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(election) = inner
            .roots
            .get(&block.qualified_root())
            .map(|entry| Arc::clone(&entry.election))
        else {
            return false;
        };
        let cached = inner.inactive_cache.find(&hash).cloned();
        let mut ctx = self.context(online_stake);
        let added = election.publish(Arc::clone(&block), cached.as_ref(), &mut ctx, now);
        if added {
            inner.blocks.insert(hash, election);
            self.stats.increment(stats::ELECTION_BLOCK_CONFLICT);
            debug!(%hash, "fork added to election");
        }
        inner.record_confirmed(ctx.confirmed, true, &mut deferred);
        drop(guard);

        self.fire(deferred);
        self.update_difficulty(&block);
        added
    }

    /// Raise the multiplier of the election for `block`'s root when `block`
    /// carries better work.
    pub fn update_difficulty(&self, block: &StateBlock) {
        let saved = self.ledger.block_get(&block.hash());
        let multiplier = self.block_multiplier(block, saved.as_ref());
        let mut deferred = Deferred::default();
        let mut inner = self.lock();
        let raised = match inner.roots.get_mut(&block.qualified_root()) {
            Some(entry) if multiplier > entry.multiplier => {
                debug!(
                    hash = %block.hash(),
                    from = entry.multiplier,
                    to = multiplier,
                    "election difficulty raised"
                );
                entry.multiplier = multiplier;
                true
            }
            _ => false,
        };
        if raised {
            self.stats.increment(stats::ELECTION_DIFFICULTY_UPDATE);
            deferred.difficulty = Some(self.update_active_multiplier(&mut inner));
        }
        drop(inner);
        self.fire(deferred);
    }

    /// Restart a recently dropped election when `block` comes back with
    /// strictly better work.
    pub fn restart(&self, block: &StateBlock) -> bool {
        let now = Instant::now();
        let hash = block.hash();
        let root = block.qualified_root();
        {
            let inner = self.lock();
            let recent = inner
                .recently_dropped
                .find(&root)
                .is_some_and(|dropped| now.saturating_duration_since(dropped) < RESTART_WINDOW);
            if !recent || inner.roots.contains_key(&root) {
                return false;
            }
        }
        let Some(saved) = self.ledger.block_get(&hash) else {
            return false;
        };
        if saved.block.work == block.work || block.work_value() <= saved.block.work_value() {
            return false;
        }
        if self.ledger.block_confirmed(&hash) || self.cementation.is_processing_block(&hash) {
            return false;
        }
        let updated = match self.ledger.update_work(&hash, block.work) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(%hash, error = %e, "work update for restart failed");
                return false;
            }
        };

        let result = self.insert_impl(updated.block, ElectionBehavior::Normal, false, now);
        let Some(election) = result.election.filter(|_| result.inserted) else {
            return false;
        };
        election.transition_active(now);
        self.lock().recently_dropped.erase(&root);
        self.stats.increment(stats::ELECTION_RESTART);
        info!(%hash, "election restarted with higher work");
        true
    }

    // ── Removal ────────────────────────────────────────────────────────────

    /// Stop the election for `block`'s root.
    pub fn erase(&self, block: &StateBlock) {
        let now = Instant::now();
        let mut deferred = Deferred::default();
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(entry) = inner.roots.remove(&block.qualified_root()) {
            self.cleanup_election(inner, &entry.election, now, &mut deferred);
        }
        drop(guard);
        self.fire(deferred);
    }

    fn cleanup_election(
        &self,
        inner: &mut ActiveInner,
        election: &Election,
        now: Instant,
        deferred: &mut Deferred,
    ) {
        let info = election.cleanup_info();
        for (hash, block) in &info.blocks {
            inner.blocks.remove(hash);
            inner.inactive_cache.erase(hash);
            if !(info.confirmed && *hash == info.winner) {
                deferred.stopped.push(*hash);
            }
            if !info.confirmed {
                self.publish_filter.clear(block);
            }
        }
        if !info.confirmed {
            inner.recently_dropped.add(info.root, now);
            self.stats.increment(stats::ELECTION_DROP);
            debug!(root = %info.root, winner = %info.winner, "election dropped");
        }
        if election.optimistic() {
            inner.optimistic_count = inner.optimistic_count.saturating_sub(1);
        }
    }

    // ── Request loop ───────────────────────────────────────────────────────

    /// One round of the election request loop.
    pub fn tick(&self, solicitor: &mut dyn ConfirmationSolicitor) {
        let now = Instant::now();
        self.request_confirm(solicitor, now);
        self.confirm_frontiers(now);
        let mut started = 0;
        self.confirm_expired_frontiers_pessimistically(PESSIMISTIC_BATCH, &mut started);
        self.retry_awaiting_ledger();
    }

    fn check_all_period(&self) -> Duration {
        if self.network.is_dev() {
            Duration::from_millis(10)
        } else {
            Duration::from_secs(5)
        }
    }

    fn election_ttl(&self) -> Duration {
        if self.network.is_dev() {
            Duration::ZERO
        } else {
            Duration::from_secs(2)
        }
    }

    /// Drive the timers of live elections, highest multiplier first, and
    /// retire finished or overflowing ones. Outside a check-all round only
    /// the prioritized elections are driven.
    pub fn request_confirm(&self, solicitor: &mut dyn ConfirmationSolicitor, now: Instant) {
        let online_stake = self.online_reps.online_stake(now);
        let mut deferred = Deferred::default();
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.stopped {
            return;
        }

        let check_all = inner
            .last_check_all
            .map_or(true, |last| now.saturating_duration_since(last) > self.check_all_period());
        if check_all {
            inner.last_check_all = Some(now);
        }
        deferred.difficulty = Some(self.update_active_multiplier(inner));

        let mut ordered: Vec<_> = inner
            .roots
            .iter()
            .map(|(root, entry)| {
                (
                    *root,
                    entry.multiplier,
                    entry.sequence,
                    entry.local,
                    Arc::clone(&entry.election),
                )
            })
            .collect();
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.2.cmp(&b.2)));

        let cutoff = self.config.prioritized_cutoff();
        let ttl = self.election_ttl();
        let mut unconfirmed = inner.unconfirmed_count();
        let mut ctx = self.context(online_stake);
        for (index, (root, _, _, local, election)) in ordered.into_iter().enumerate() {
            let overflow = unconfirmed > self.config.active_elections_size
                && now.saturating_duration_since(election.election_start) > ttl
                && !local
                && !election.confirmed();
            if !overflow && !check_all && index >= cutoff {
                election.set_prioritized(false);
                continue;
            }
            if overflow || election.transition_time(solicitor, &mut ctx, now) {
                let winner = election.winner();
                if election.optimistic()
                    && election.failed()
                    && election.confirmation_request_count() != 0
                {
                    inner.expired_optimistic.add(winner.account, now);
                } else if !election.confirmed() {
                    inner.expired_optimistic.clear_election_started(&winner.account);
                }
                if !election.confirmed() {
                    unconfirmed = unconfirmed.saturating_sub(1);
                }
                inner.roots.remove(&root);
                self.cleanup_election(inner, &election, now, &mut deferred);
            } else {
                election.set_prioritized(index < cutoff);
            }
        }
        inner.record_confirmed(ctx.confirmed, true, &mut deferred);
        drop(guard);
        self.fire(deferred);
    }

    /// Sample the median multiplier of the prioritized unconfirmed elections
    /// and return the resulting trended difficulty.
    fn update_active_multiplier(&self, inner: &mut ActiveInner) -> u64 {
        let cutoff = self.config.prioritized_cutoff();
        let dev = self.network.is_dev();
        let mut sample = 1.0;
        if inner.roots.len() >= cutoff || (dev && !inner.roots.is_empty()) {
            let mut prioritized: Vec<f64> = inner
                .roots
                .values()
                .filter(|entry| !entry.election.confirmed())
                .map(|entry| entry.multiplier)
                .collect();
            prioritized.sort_by(|a, b| b.total_cmp(a));
            prioritized.truncate(cutoff);
            if prioritized.len() > MEDIAN_MIN_ELECTIONS || (dev && !prioritized.is_empty()) {
                sample = prioritized[prioritized.len() / 2];
            }
            inner.last_prioritized_multiplier = prioritized.last().copied();
        }
        inner.multipliers.push(sample.max(1.0));
        inner.trended_active_multiplier = inner.multipliers.average();
        from_multiplier(inner.trended_active_multiplier, self.thresholds.base)
    }

    /// Start optimistic elections at the heads of the accounts with the most
    /// uncemented blocks.
    pub fn confirm_frontiers(&self, now: Instant) {
        let limit = {
            let mut inner = self.lock();
            if let Some(cutoff) = now.checked_sub(EXPIRED_OPTIMISTIC_CUTOFF) {
                inner.expired_optimistic.remove_older_than(cutoff);
            }
            match self.config.frontiers_confirmation {
                FrontiersConfirmationMode::Disabled => return,
                FrontiersConfirmationMode::Automatic
                    if inner.roots.len() >= self.config.prioritized_cutoff() =>
                {
                    return
                }
                _ => {}
            }
            self.config
                .max_optimistic_elections
                .saturating_sub(inner.optimistic_count)
        };
        if limit == 0 {
            return;
        }

        let mut candidates: Vec<_> = self
            .ledger
            .accounts()
            .into_iter()
            .filter_map(|(account, info)| {
                let cemented = self.ledger.confirmation_height_get(&account).height;
                let uncemented = info.block_count.saturating_sub(cemented);
                (uncemented > 0).then_some((uncemented, account, info.head))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut started = 0;
        for (_, account, head) in candidates {
            if started >= limit {
                break;
            }
            if self.lock().expired_optimistic.get(&account).is_some() {
                continue;
            }
            if self.cementation.is_processing_block(&head) {
                continue;
            }
            let Some(saved) = self.ledger.block_get(&head) else {
                continue;
            };
            let result = self.insert_impl(saved.block, ElectionBehavior::Optimistic, false, now);
            if let (true, Some(election)) = (result.inserted, result.election) {
                election.transition_active(now);
                started += 1;
            }
        }
    }

    /// Elect, one block at a time, the chains whose optimistic election
    /// failed. Accounts whose chain is fully cemented are forgotten.
    pub fn confirm_expired_frontiers_pessimistically(&self, limit: usize, started: &mut usize) {
        let pending = self.lock().expired_optimistic.pending(limit);
        for account in pending {
            let fully_cemented = self.ledger.account_info(&account).map_or(true, |info| {
                self.ledger.confirmation_height_get(&account).height >= info.block_count
            });
            if fully_cemented {
                self.lock().expired_optimistic.remove(&account);
                continue;
            }
            let Some(saved) = self.next_uncemented(&account) else {
                continue;
            };
            if self.cementation.is_processing_block(&saved.hash()) {
                continue;
            }
            let result = self.insert(Arc::clone(&saved.block), ElectionBehavior::Normal);
            if let (true, Some(election)) = (result.inserted, result.election) {
                election.transition_active(Instant::now());
                self.lock().expired_optimistic.mark_election_started(&account);
                self.stats.increment(stats::ELECTION_PESSIMISTIC);
                *started += 1;
            }
        }
    }

    fn retry_awaiting_ledger(&self) {
        let awaiting = std::mem::take(&mut self.lock().awaiting_ledger);
        if awaiting.is_empty() {
            return;
        }
        let mut still_missing = Vec::new();
        for hash in awaiting {
            if self.ledger.block_exists(&hash) {
                self.cementation.add(hash);
            } else {
                still_missing.push(hash);
            }
        }
        let mut inner = self.lock();
        still_missing.retain(|hash| inner.winner_details.contains_key(hash));
        inner.await_ledger(still_missing);
    }

    // ── Cementing integration ──────────────────────────────────────────────

    /// How a block being cemented got confirmed. Cementing an unconfirmed
    /// winner confirms its election.
    pub fn confirm_block(&self, hash: &BlockHash) -> Option<ElectionStatusType> {
        let now = Instant::now();
        let online_stake = self.online_reps.online_stake(now);
        let mut deferred = Deferred::default();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(election) = inner.blocks.get(hash).cloned() else {
            return Some(ElectionStatusType::InactiveConfirmationHeight);
        };
        if election.winner().hash() != *hash {
            return None;
        }
        if election.confirmed() {
            return Some(ElectionStatusType::ActiveConfirmedQuorum);
        }
        let mut ctx = self.context(online_stake);
        election.confirm_by_cementing(&mut ctx, now);
        inner.record_confirmed(ctx.confirmed, false, &mut deferred);
        drop(guard);
        self.fire(deferred);
        Some(ElectionStatusType::ActiveConfirmationHeight)
    }

    /// Observer of the confirmation height processor for each block it
    /// cemented.
    pub fn block_cemented_callback(&self, block: &SavedBlock) {
        let hash = block.hash();
        let status_type = if self.cementation.is_processing_added_block(&hash) {
            Some(ElectionStatusType::ActiveConfirmedQuorum)
        } else {
            self.confirm_block(&hash)
        };

        let event = |status: ElectionStatus| CementedBlockEvent {
            status,
            account: block.account(),
            amount: self.ledger.amount(&hash).unwrap_or_default(),
            is_send: block.is_send(),
        };
        let mut deferred = Deferred::default();
        match status_type {
            Some(ElectionStatusType::InactiveConfirmationHeight) => {
                deferred
                    .blocks
                    .push(event(ElectionStatus::inactive(Arc::clone(&block.block))));
            }
            Some(status_type) => {
                let mut inner = self.lock();
                if let Some(election) = inner.winner_details.remove(&hash) {
                    if election.confirmed() && election.winner().hash() == hash {
                        let status = election.set_status_type(status_type);
                        inner.recently_cemented.add(status.clone());
                        deferred.blocks.push(event(status));
                    }
                }
            }
            None => {}
        }
        {
            let mut inner = self.lock();
            let account = block.account();
            if inner
                .expired_optimistic
                .get(&account)
                .is_some_and(|info| info.election_started)
            {
                inner.expired_optimistic.clear_election_started(&account);
            }
        }
        self.fire(deferred);

        self.activate(&block.account());
        if let Some(destination) = block.destination() {
            self.activate(&destination);
        }
    }

    /// Observer for blocks that were queued but found already cemented.
    pub fn block_already_cemented_callback(&self, hash: &BlockHash) {
        self.lock().winner_details.remove(hash);
    }

    // ── Introspection ──────────────────────────────────────────────────────

    pub fn active(&self, root: &QualifiedRoot) -> bool {
        self.lock().roots.contains_key(root)
    }

    pub fn active_block(&self, hash: &BlockHash) -> bool {
        self.lock().blocks.contains_key(hash)
    }

    pub fn election(&self, root: &QualifiedRoot) -> Option<Arc<Election>> {
        self.lock()
            .roots
            .get(root)
            .map(|entry| Arc::clone(&entry.election))
    }

    /// Current winner of the election `hash` takes part in.
    pub fn winner(&self, hash: &BlockHash) -> Option<Arc<StateBlock>> {
        self.lock().blocks.get(hash).map(|election| election.winner())
    }

    pub fn size(&self) -> usize {
        self.lock().roots.len()
    }

    pub fn empty(&self) -> bool {
        self.lock().roots.is_empty()
    }

    /// Trended multiplier over the last samples.
    pub fn active_multiplier(&self) -> f64 {
        self.lock().trended_active_multiplier
    }

    pub fn active_difficulty(&self) -> u64 {
        from_multiplier(self.active_multiplier(), self.thresholds.base)
    }

    /// Difficulty `block` needs to compete with the live elections, capped
    /// so work generation stays feasible.
    pub fn limited_active_difficulty(&self, block: &StateBlock) -> u64 {
        let threshold = self
            .ledger
            .block_get(&block.hash())
            .map_or(self.thresholds.base, |saved| saved.work_threshold(&self.thresholds));
        let trended = self.active_multiplier();
        let active = from_multiplier(
            self.thresholds.denormalized_multiplier(trended, threshold),
            threshold,
        );
        active.min(from_multiplier(MAX_WORK_MULTIPLIER, self.thresholds.base))
    }

    pub fn list_recently_cemented(&self) -> Vec<ElectionStatus> {
        self.lock().recently_cemented.list()
    }

    pub fn recently_confirmed(&self, hash: &BlockHash) -> bool {
        self.lock().recently_confirmed.exists(hash)
    }

    pub fn recently_confirmed_len(&self) -> usize {
        self.lock().recently_confirmed.len()
    }

    pub fn recently_dropped_len(&self) -> usize {
        self.lock().recently_dropped.len()
    }

    pub fn find_inactive_votes_cache(&self, hash: &BlockHash) -> Option<InactiveCacheEntry> {
        self.lock().inactive_cache.find(hash).cloned()
    }

    pub fn inactive_votes_cache_size(&self) -> usize {
        self.lock().inactive_cache.len()
    }

    pub fn expired_optimistic_elections_len(&self) -> usize {
        self.lock().expired_optimistic.len()
    }

    /// Confirm the election for `root` without quorum. Dev network only.
    pub fn force_confirm(&self, root: &QualifiedRoot) -> bool {
        let now = Instant::now();
        let online_stake = self.online_reps.online_stake(now);
        let mut deferred = Deferred::default();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(election) = inner.roots.get(root).map(|e| Arc::clone(&e.election)) else {
            return false;
        };
        let mut ctx = self.context(online_stake);
        let confirmed = election.force_confirm(&mut ctx, now);
        inner.record_confirmed(ctx.confirmed, true, &mut deferred);
        drop(guard);
        self.fire(deferred);
        confirmed
    }

    /// Drop every election and cache. Later inserts are refused.
    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.stopped = true;
        inner.roots.clear();
        inner.blocks.clear();
        inner.winner_details.clear();
        inner.recently_confirmed.clear();
        inner.recently_cemented.clear();
        inner.recently_dropped.clear();
        inner.inactive_cache.clear();
        inner.expired_optimistic.clear();
        inner.awaiting_ledger.clear();
        inner.multipliers.reset();
        inner.optimistic_count = 0;
        drop(inner);
        self.publish_filter.clear_all();
        info!("active elections stopped");
    }
}
