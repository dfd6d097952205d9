//! Election state machine for one qualified root.
//!
//! An election collects representative votes for the competing blocks
//! (forks) of one chain position and confirms the leader once it holds
//! enough of the online stake. Time-based transitions are driven from the
//! outside through [`Election::transition_time`]:
//!
//! ```text
//! Passive ──► Active ──► Broadcasting
//!    │           │            │
//!    └───────────┴────────────┴──► Confirmed ──► ExpiredConfirmed
//!    └───────────┴────────────┴──► ExpiredUnconfirmed
//! ```
//!
//! Consequences that concern other elections (recording the result,
//! cementing the winner) are reported through [`ElectionContext::confirmed`]
//! and handled by the caller once the election lock is released.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lattice_ledger::{Ledger, StateBlock};
use lattice_types::{Account, Amount, BlockHash, NetworkId, QualifiedRoot, Root, Timestamp};
use lattice_utils::StatsCounter;
use tracing::{debug, warn};

use crate::config::ElectionsConfig;
use crate::inactive_cache::InactiveCacheEntry;
use crate::solicitor::ConfirmationSolicitor;
use crate::stats;
use crate::vote_info::{ElectionVoteResult, VoteInfo};

/// Forks beyond this count need a tenth of the online stake in their
/// tally to be admitted.
const MAX_BLOCKS: usize = 10;

/// A block arriving this long after its first cached vote is late.
const LATE_BLOCKS_DELAY: Duration = Duration::from_secs(5);

const NORMAL_EXPIRATION: Duration = Duration::from_secs(5 * 60);
const OPTIMISTIC_EXPIRATION: Duration = Duration::from_secs(60);
const OPTIMISTIC_EXPIRATION_DEV: Duration = Duration::from_millis(500);

/// Unit of every election timer.
pub fn base_latency(network: NetworkId) -> Duration {
    if network.is_dev() {
        Duration::from_millis(25)
    } else {
        Duration::from_secs(1)
    }
}

/// Minimum time between two counted votes of one representative. Smaller
/// representatives wait longer.
pub fn vote_cooldown(weight: Amount, online_stake: Amount) -> Duration {
    let stake = online_stake.number();
    if weight.number() < stake / 100 {
        Duration::from_secs(15)
    } else if weight.number() < stake / 20 {
        Duration::from_secs(5)
    } else {
        Duration::from_secs(1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElectionState {
    /// Waiting for votes without soliciting them.
    Passive,
    /// Soliciting votes.
    Active,
    /// Soliciting votes and rebroadcasting the winner.
    Broadcasting,
    Confirmed,
    /// Confirmed and retired.
    ExpiredConfirmed,
    /// Timed out without quorum and retired.
    ExpiredUnconfirmed,
}

impl ElectionState {
    /// The transition table. Anything not listed is rejected.
    pub fn valid_change(self, to: ElectionState) -> bool {
        use ElectionState::*;
        matches!(
            (self, to),
            (Passive, Active | Confirmed | ExpiredUnconfirmed)
                | (Active, Broadcasting | Confirmed | ExpiredUnconfirmed)
                | (Broadcasting, Confirmed | ExpiredUnconfirmed)
                | (Confirmed, ExpiredConfirmed)
        )
    }

    pub fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed | Self::ExpiredConfirmed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ElectionBehavior {
    #[default]
    Normal,
    /// Started for an account frontier to cement a whole uncemented chain
    /// at once. Expires sooner and requests votes less often.
    Optimistic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElectionStatusType {
    Ongoing,
    /// Confirmed by a quorum of votes.
    ActiveConfirmedQuorum,
    /// Cemented as a dependency while its own election was still running.
    ActiveConfirmationHeight,
    /// Cemented as a dependency without any election.
    InactiveConfirmationHeight,
    Stopped,
}

#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub winner: Arc<StateBlock>,
    /// Weight behind the winner.
    pub tally: Amount,
    pub election_end: Timestamp,
    pub election_duration: Duration,
    pub confirmation_request_count: u32,
    /// Forks seen by the election.
    pub block_count: u32,
    pub voter_count: u32,
    pub status_type: ElectionStatusType,
}

impl ElectionStatus {
    fn ongoing(winner: Arc<StateBlock>) -> Self {
        Self {
            winner,
            tally: Amount::ZERO,
            election_end: Timestamp::EPOCH,
            election_duration: Duration::ZERO,
            confirmation_request_count: 0,
            block_count: 1,
            voter_count: 0,
            status_type: ElectionStatusType::Ongoing,
        }
    }

    /// Status reported for a block cemented without an election.
    pub fn inactive(block: Arc<StateBlock>) -> Self {
        Self {
            election_end: Timestamp::now(),
            status_type: ElectionStatusType::InactiveConfirmationHeight,
            ..Self::ongoing(block)
        }
    }

    pub fn winner_hash(&self) -> BlockHash {
        self.winner.hash()
    }
}

/// An election that confirmed while its lock was held.
#[derive(Clone, Debug)]
pub struct ConfirmedElection {
    pub qualified_root: QualifiedRoot,
    pub status: ElectionStatus,
    /// Forks dropped from the election on confirmation.
    pub losers: Vec<Arc<StateBlock>>,
}

/// Everything an election consults while handling an event.
pub struct ElectionContext<'a> {
    pub ledger: &'a Ledger,
    pub config: &'a ElectionsConfig,
    pub network: NetworkId,
    pub online_stake: Amount,
    pub stats: &'a StatsCounter,
    /// Filled with elections that confirmed during the call.
    pub confirmed: Vec<ConfirmedElection>,
}

impl<'a> ElectionContext<'a> {
    pub fn new(
        ledger: &'a Ledger,
        config: &'a ElectionsConfig,
        network: NetworkId,
        online_stake: Amount,
        stats: &'a StatsCounter,
    ) -> Self {
        Self {
            ledger,
            config,
            network,
            online_stake,
            stats,
            confirmed: Vec::new(),
        }
    }

    /// Margin the leader needs over the runner-up.
    pub fn delta(&self) -> Amount {
        Amount::raw(self.online_stake.number() / 100 * u128::from(self.config.online_weight_quorum))
    }

    pub fn minimum_principal_weight(&self) -> Amount {
        let factor = u128::from(self.config.principal_weight_factor.max(1));
        Amount::raw(self.online_stake.number() / factor)
    }
}

/// What the manager needs to unregister a finished election.
#[derive(Clone, Debug)]
pub struct ElectionCleanupInfo {
    pub confirmed: bool,
    pub root: QualifiedRoot,
    pub winner: BlockHash,
    pub blocks: HashMap<BlockHash, Arc<StateBlock>>,
}

struct ElectionData {
    state: ElectionState,
    state_start: Instant,
    status: ElectionStatus,
    last_blocks: HashMap<BlockHash, Arc<StateBlock>>,
    last_votes: HashMap<Account, VoteInfo>,
    last_tally: HashMap<BlockHash, Amount>,
    confirmation_request_count: u32,
    last_req: Option<Instant>,
    last_broadcast: Option<Instant>,
    prioritized: bool,
}

pub struct Election {
    pub root: Root,
    pub qualified_root: QualifiedRoot,
    pub behavior: ElectionBehavior,
    /// Height of the contested block, 0 when it is not in the ledger.
    pub height: u64,
    pub election_start: Instant,
    data: Mutex<ElectionData>,
}

impl Election {
    pub fn new(
        block: Arc<StateBlock>,
        height: u64,
        behavior: ElectionBehavior,
        prioritized: bool,
        now: Instant,
    ) -> Self {
        let mut last_blocks = HashMap::new();
        last_blocks.insert(block.hash(), Arc::clone(&block));
        Self {
            root: block.root(),
            qualified_root: block.qualified_root(),
            behavior,
            height,
            election_start: now,
            data: Mutex::new(ElectionData {
                state: ElectionState::Passive,
                state_start: now,
                status: ElectionStatus::ongoing(block),
                last_blocks,
                last_votes: HashMap::new(),
                last_tally: HashMap::new(),
                confirmation_request_count: 0,
                last_req: None,
                last_broadcast: None,
                prioritized,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ElectionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── State ──────────────────────────────────────────────────────────────

    pub fn state(&self) -> ElectionState {
        self.lock().state
    }

    pub fn confirmed(&self) -> bool {
        self.lock().state.is_confirmed()
    }

    pub fn failed(&self) -> bool {
        self.lock().state == ElectionState::ExpiredUnconfirmed
    }

    pub fn optimistic(&self) -> bool {
        self.behavior == ElectionBehavior::Optimistic
    }

    pub fn prioritized(&self) -> bool {
        self.lock().prioritized
    }

    pub fn set_prioritized(&self, prioritized: bool) {
        self.lock().prioritized = prioritized;
    }

    pub fn winner(&self) -> Arc<StateBlock> {
        Arc::clone(&self.lock().status.winner)
    }

    pub fn status(&self) -> ElectionStatus {
        self.lock().status.clone()
    }

    pub fn votes(&self) -> HashMap<Account, VoteInfo> {
        self.lock().last_votes.clone()
    }

    pub fn blocks(&self) -> HashMap<BlockHash, Arc<StateBlock>> {
        self.lock().last_blocks.clone()
    }

    /// Weight per hash as of the last tally.
    pub fn last_tally(&self) -> HashMap<BlockHash, Amount> {
        self.lock().last_tally.clone()
    }

    pub fn confirmation_request_count(&self) -> u32 {
        self.lock().confirmation_request_count
    }

    /// Forks with their current weight, heaviest first.
    pub fn tally(&self, ledger: &Ledger) -> Vec<(Amount, Arc<StateBlock>)> {
        let mut data = self.lock();
        Self::tally_impl(&mut data, ledger)
    }

    pub fn cleanup_info(&self) -> ElectionCleanupInfo {
        let data = self.lock();
        ElectionCleanupInfo {
            confirmed: data.state.is_confirmed(),
            root: self.qualified_root,
            winner: data.status.winner.hash(),
            blocks: data.last_blocks.clone(),
        }
    }

    /// Record how the winner got cemented and return the final status.
    pub fn set_status_type(&self, status_type: ElectionStatusType) -> ElectionStatus {
        let mut guard = self.lock();
        let data = &mut *guard;
        data.status.status_type = status_type;
        data.status.confirmation_request_count = data.confirmation_request_count;
        data.status.clone()
    }

    pub fn transition_active(&self, now: Instant) -> bool {
        let mut data = self.lock();
        Self::state_change(&mut data, ElectionState::Passive, ElectionState::Active, now)
    }

    fn state_change(
        data: &mut ElectionData,
        expected: ElectionState,
        desired: ElectionState,
        now: Instant,
    ) -> bool {
        if data.state == expected && expected.valid_change(desired) {
            data.state = desired;
            data.state_start = now;
            true
        } else {
            false
        }
    }

    // ── Timers ─────────────────────────────────────────────────────────────

    /// Advance time-based state. Returns true when the election is finished
    /// and should be removed.
    pub fn transition_time(
        &self,
        solicitor: &mut dyn ConfirmationSolicitor,
        ctx: &mut ElectionContext<'_>,
        now: Instant,
    ) -> bool {
        let latency = base_latency(ctx.network);
        let mut guard = self.lock();
        let data = &mut *guard;
        let in_state = now.saturating_duration_since(data.state_start);
        let mut finished = false;

        match data.state {
            ElectionState::Passive => {
                if in_state > latency * 5 {
                    Self::state_change(data, ElectionState::Passive, ElectionState::Active, now);
                }
            }
            ElectionState::Active => {
                self.send_confirm_req(data, solicitor, latency, now);
                if data.confirmation_request_count > 2 {
                    Self::state_change(
                        data,
                        ElectionState::Active,
                        ElectionState::Broadcasting,
                        now,
                    );
                }
            }
            ElectionState::Broadcasting => {
                Self::broadcast_block(data, solicitor, latency, now);
                self.send_confirm_req(data, solicitor, latency, now);
            }
            ElectionState::Confirmed => {
                if in_state > latency * 5 {
                    finished = true;
                    Self::state_change(
                        data,
                        ElectionState::Confirmed,
                        ElectionState::ExpiredConfirmed,
                        now,
                    );
                }
            }
            ElectionState::ExpiredConfirmed | ElectionState::ExpiredUnconfirmed => {
                finished = true;
            }
        }

        if !data.state.is_confirmed()
            && data.state != ElectionState::ExpiredUnconfirmed
            && now.saturating_duration_since(self.election_start) > self.expire_time(ctx.network)
        {
            let from = data.state;
            if Self::state_change(data, from, ElectionState::ExpiredUnconfirmed, now) {
                data.status.status_type = ElectionStatusType::Stopped;
                finished = true;
                debug!(
                    root = %self.qualified_root,
                    requests = data.confirmation_request_count,
                    "election expired unconfirmed"
                );
            }
        }
        finished
    }

    fn expire_time(&self, network: NetworkId) -> Duration {
        match (self.behavior, network.is_dev()) {
            (ElectionBehavior::Optimistic, true) => OPTIMISTIC_EXPIRATION_DEV,
            (ElectionBehavior::Optimistic, false) => OPTIMISTIC_EXPIRATION,
            (ElectionBehavior::Normal, _) => NORMAL_EXPIRATION,
        }
    }

    fn send_confirm_req(
        &self,
        data: &mut ElectionData,
        solicitor: &mut dyn ConfirmationSolicitor,
        latency: Duration,
        now: Instant,
    ) {
        let interval = latency * if self.optimistic() { 10 } else { 5 };
        let due = data
            .last_req
            .map_or(true, |last| now.saturating_duration_since(last) > interval);
        if due && solicitor.add(&self.qualified_root, &data.status.winner) {
            data.last_req = Some(now);
            data.confirmation_request_count += 1;
        }
    }

    fn broadcast_block(
        data: &mut ElectionData,
        solicitor: &mut dyn ConfirmationSolicitor,
        latency: Duration,
        now: Instant,
    ) {
        let due = data
            .last_broadcast
            .map_or(true, |last| now.saturating_duration_since(last) > latency * 15);
        if due && solicitor.broadcast(&data.status.winner) {
            data.last_broadcast = Some(now);
        }
    }

    // ── Votes ──────────────────────────────────────────────────────────────

    /// Count a vote of `rep` for `hash`.
    pub fn vote(
        &self,
        rep: Account,
        sequence: u64,
        hash: BlockHash,
        ctx: &mut ElectionContext<'_>,
        now: Instant,
    ) -> ElectionVoteResult {
        let weight = ctx.ledger.weight(&rep);
        if !ctx.network.is_dev() && weight <= ctx.minimum_principal_weight() {
            return ElectionVoteResult::default();
        }
        let cooldown = vote_cooldown(weight, ctx.online_stake);

        let mut guard = self.lock();
        let data = &mut *guard;
        let (replay, should_process) = match data.last_votes.get(&rep) {
            None => (false, true),
            Some(last) if last.is_superseded_by(sequence, &hash) => {
                let max_vote = sequence == u64::MAX && last.sequence < sequence;
                let past_cooldown = last
                    .time
                    .map_or(true, |time| now.saturating_duration_since(time) >= cooldown);
                (false, max_vote || past_cooldown)
            }
            Some(_) => (true, false),
        };

        if should_process {
            ctx.stats.increment(stats::VOTE_NEW);
            data.last_votes.insert(rep, VoteInfo::new(now, sequence, hash));
            if !data.state.is_confirmed() {
                self.confirm_if_quorum_impl(data, ctx, now);
            }
        }
        ElectionVoteResult::new(replay, should_process)
    }

    /// Seed the election with voters cached while the block had no
    /// election. A voter already present keeps its recorded vote.
    pub fn insert_inactive_votes_cache(
        &self,
        entry: &InactiveCacheEntry,
        ctx: &mut ElectionContext<'_>,
        now: Instant,
    ) -> usize {
        let mut guard = self.lock();
        self.insert_inactive_votes_cache_impl(&mut guard, entry, ctx, now)
    }

    fn insert_inactive_votes_cache_impl(
        &self,
        data: &mut ElectionData,
        entry: &InactiveCacheEntry,
        ctx: &mut ElectionContext<'_>,
        now: Instant,
    ) -> usize {
        for voter in &entry.voters {
            if let Entry::Vacant(slot) = data.last_votes.entry(*voter) {
                slot.insert(VoteInfo::cached(entry.hash));
                ctx.stats.increment(stats::VOTE_CACHED);
            }
        }
        if !data.state.is_confirmed() {
            if !entry.voters.is_empty()
                && now.saturating_duration_since(entry.arrival) > LATE_BLOCKS_DELAY
            {
                ctx.stats.increment(stats::ELECTION_LATE_BLOCK);
            }
            if !data.last_votes.is_empty() {
                self.confirm_if_quorum_impl(data, ctx, now);
            }
        }
        entry.voters.len()
    }

    // ── Forks ──────────────────────────────────────────────────────────────

    /// Add a competing block. Returns true when `block` joined the election
    /// as a new fork; a known hash only has its stored block replaced.
    pub fn publish(
        &self,
        block: Arc<StateBlock>,
        cached: Option<&InactiveCacheEntry>,
        ctx: &mut ElectionContext<'_>,
        now: Instant,
    ) -> bool {
        let hash = block.hash();
        let mut guard = self.lock();
        let data = &mut *guard;
        if data.state.is_confirmed() {
            return false;
        }
        if let Some(existing) = data.last_blocks.get_mut(&hash) {
            *existing = Arc::clone(&block);
            if data.status.winner.hash() == hash {
                data.status.winner = block;
            }
            return false;
        }
        if data.last_blocks.len() >= MAX_BLOCKS {
            let tally = data.last_tally.get(&hash).copied().unwrap_or_default();
            if tally.number() < ctx.online_stake.number() / 10 {
                return false;
            }
        }

        data.last_blocks.insert(hash, block);
        let merged = match cached {
            Some(entry) => self.insert_inactive_votes_cache_impl(data, entry, ctx, now),
            None => 0,
        };
        if merged == 0 && !data.state.is_confirmed() {
            self.confirm_if_quorum_impl(data, ctx, now);
        }
        true
    }

    // ── Confirmation ───────────────────────────────────────────────────────

    pub fn confirm_if_quorum(&self, ctx: &mut ElectionContext<'_>, now: Instant) {
        let mut guard = self.lock();
        self.confirm_if_quorum_impl(&mut guard, ctx, now);
    }

    fn confirm_if_quorum_impl(
        &self,
        data: &mut ElectionData,
        ctx: &mut ElectionContext<'_>,
        now: Instant,
    ) {
        let tally = Self::tally_impl(data, ctx.ledger);
        let Some((leader_weight, leader)) = tally.first().cloned() else {
            return;
        };
        let sum = tally
            .iter()
            .fold(Amount::ZERO, |sum, (weight, _)| sum.saturating_add(*weight));
        data.status.tally = leader_weight;

        let minimum = ctx.config.online_weight_minimum;
        if sum >= minimum && leader.hash() != data.status.winner.hash() {
            debug!(
                root = %self.qualified_root,
                from = %data.status.winner.hash(),
                to = %leader.hash(),
                "election winner changed"
            );
            data.status.winner = leader;
        }

        let runner_up = tally.get(1).map(|(weight, _)| *weight).unwrap_or_default();
        if sum >= minimum && leader_weight > runner_up.saturating_add(ctx.delta()) {
            self.confirm_once(data, ElectionStatusType::ActiveConfirmedQuorum, ctx, now);
        }
    }

    fn tally_impl(data: &mut ElectionData, ledger: &Ledger) -> Vec<(Amount, Arc<StateBlock>)> {
        let mut weights: HashMap<BlockHash, Amount> = HashMap::new();
        for (rep, info) in &data.last_votes {
            let weight = weights.entry(info.hash).or_default();
            *weight = weight.saturating_add(ledger.weight(rep));
        }
        let mut tally: Vec<_> = weights
            .iter()
            .filter_map(|(hash, weight)| {
                data.last_blocks
                    .get(hash)
                    .map(|block| (*weight, Arc::clone(block)))
            })
            .collect();
        tally.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.hash().cmp(&b.1.hash())));
        data.last_tally = weights;
        tally
    }

    /// Confirm the current winner. Idempotent.
    fn confirm_once(
        &self,
        data: &mut ElectionData,
        status_type: ElectionStatusType,
        ctx: &mut ElectionContext<'_>,
        now: Instant,
    ) -> bool {
        if data.state.is_confirmed() || !data.state.valid_change(ElectionState::Confirmed) {
            return false;
        }
        data.state = ElectionState::Confirmed;
        data.state_start = now;

        let winner = data.status.winner.hash();
        let block_count = data.last_blocks.len();
        let losers: Vec<_> = data
            .last_blocks
            .iter()
            .filter(|(hash, _)| **hash != winner)
            .map(|(_, block)| Arc::clone(block))
            .collect();
        data.last_blocks.retain(|hash, _| *hash == winner);

        data.status.election_end = Timestamp::now();
        data.status.election_duration = now.saturating_duration_since(self.election_start);
        data.status.confirmation_request_count = data.confirmation_request_count;
        data.status.block_count = block_count as u32;
        data.status.voter_count = data.last_votes.len() as u32;
        data.status.status_type = status_type;

        ctx.stats.increment(stats::ELECTION_CONFIRMED);
        debug!(
            root = %self.qualified_root,
            %winner,
            voters = data.status.voter_count,
            forks = block_count,
            "election confirmed"
        );
        ctx.confirmed.push(ConfirmedElection {
            qualified_root: self.qualified_root,
            status: data.status.clone(),
            losers,
        });
        true
    }

    /// Confirm when the winner is cemented as a dependency of another block.
    pub fn confirm_by_cementing(&self, ctx: &mut ElectionContext<'_>, now: Instant) -> bool {
        let mut guard = self.lock();
        self.confirm_once(
            &mut guard,
            ElectionStatusType::ActiveConfirmationHeight,
            ctx,
            now,
        )
    }

    /// Confirm the current winner without quorum. Only honoured on the dev
    /// network.
    pub fn force_confirm(&self, ctx: &mut ElectionContext<'_>, now: Instant) -> bool {
        if !ctx.network.is_dev() {
            warn!(root = %self.qualified_root, "force confirmation refused outside dev network");
            return false;
        }
        let mut guard = self.lock();
        self.confirm_once(
            &mut guard,
            ElectionStatusType::ActiveConfirmedQuorum,
            ctx,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_ledger::testing::{dev_ledger, test_key, BlockFactory};

    #[derive(Default)]
    struct CountingSolicitor {
        requests: u32,
        broadcasts: u32,
        exhausted: bool,
    }

    impl ConfirmationSolicitor for CountingSolicitor {
        fn add(&mut self, _root: &QualifiedRoot, _winner: &Arc<StateBlock>) -> bool {
            if self.exhausted {
                return false;
            }
            self.requests += 1;
            true
        }

        fn broadcast(&mut self, _winner: &Arc<StateBlock>) -> bool {
            self.broadcasts += 1;
            true
        }
    }

    struct Fixture {
        ledger: Arc<Ledger>,
        stats: StatsCounter,
        config: ElectionsConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ledger: dev_ledger(),
                stats: StatsCounter::new(stats::CONSENSUS_STATS),
                config: ElectionsConfig::default(),
            }
        }

        fn genesis(&self) -> Account {
            self.ledger.constants().genesis_account()
        }

        fn genesis_stake(&self) -> Amount {
            self.ledger.weight(&self.genesis())
        }

        fn ctx(&self) -> ElectionContext<'_> {
            ElectionContext::new(
                &self.ledger,
                &self.config,
                NetworkId::Dev,
                self.genesis_stake(),
                &self.stats,
            )
        }

        /// Open account `n` with a small balance, making it a representative
        /// far too light to reach quorum alone.
        fn small_rep(&self, n: u8) -> Account {
            let keys = test_key(n);
            let factory = BlockFactory::new(&self.ledger);
            let send = self
                .ledger
                .process(factory.send(&factory.genesis_key(), keys.account, Amount::raw(1000)))
                .unwrap();
            self.ledger
                .process(factory.receive(&keys, send.hash()))
                .unwrap();
            keys.account
        }

        /// A send from genesis; forks share the current genesis head as root.
        fn fork(&self, to: u8) -> Arc<StateBlock> {
            let factory = BlockFactory::new(&self.ledger);
            Arc::new(factory.send(&factory.genesis_key(), test_key(to).account, Amount::raw(1)))
        }
    }

    // --- Transition table ---

    #[test]
    fn transition_table_matches_lifecycle() {
        use ElectionState::*;
        assert!(Passive.valid_change(Active));
        assert!(Passive.valid_change(Confirmed));
        assert!(Active.valid_change(Broadcasting));
        assert!(Broadcasting.valid_change(ExpiredUnconfirmed));
        assert!(Confirmed.valid_change(ExpiredConfirmed));
        assert!(!Confirmed.valid_change(ExpiredUnconfirmed));
        assert!(!Broadcasting.valid_change(Active));
        assert!(!ExpiredUnconfirmed.valid_change(Confirmed));
        assert!(!ExpiredConfirmed.valid_change(Confirmed));
        assert!(!Passive.valid_change(Broadcasting));
    }

    // --- Timers ---

    #[test]
    fn passive_becomes_active_after_five_latencies() {
        let f = Fixture::new();
        let start = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, start);
        let mut solicitor = CountingSolicitor::default();
        let mut ctx = f.ctx();

        assert!(!election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(100)));
        assert_eq!(election.state(), ElectionState::Passive);
        assert!(!election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(130)));
        assert_eq!(election.state(), ElectionState::Active);
    }

    #[test]
    fn active_broadcasts_after_three_requests() {
        let f = Fixture::new();
        let start = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, start);
        election.transition_active(start);
        let mut solicitor = CountingSolicitor::default();
        let mut ctx = f.ctx();

        // Requests are spaced by more than 5 × 25 ms.
        for i in 0..3u64 {
            election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(200 * i));
        }
        assert_eq!(election.confirmation_request_count(), 3);
        assert_eq!(election.state(), ElectionState::Broadcasting);

        election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(700));
        assert_eq!(solicitor.broadcasts, 1);
        assert_eq!(solicitor.requests, 4);
    }

    #[test]
    fn requests_are_rate_limited() {
        let f = Fixture::new();
        let start = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, start);
        election.transition_active(start);
        let mut solicitor = CountingSolicitor::default();
        let mut ctx = f.ctx();

        election.transition_time(&mut solicitor, &mut ctx, start);
        election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(50));
        assert_eq!(election.confirmation_request_count(), 1);
    }

    #[test]
    fn exhausted_solicitor_does_not_count_requests() {
        let f = Fixture::new();
        let start = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, start);
        election.transition_active(start);
        let mut solicitor = CountingSolicitor {
            exhausted: true,
            ..CountingSolicitor::default()
        };
        let mut ctx = f.ctx();
        election.transition_time(&mut solicitor, &mut ctx, start);
        assert_eq!(election.confirmation_request_count(), 0);
    }

    #[test]
    fn optimistic_election_expires_on_dev_after_half_a_second() {
        let f = Fixture::new();
        let start = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Optimistic, false, start);
        let mut solicitor = CountingSolicitor::default();
        let mut ctx = f.ctx();

        assert!(!election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(400)));
        assert!(election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(600)));
        assert!(election.failed());
        assert_eq!(election.status().status_type, ElectionStatusType::Stopped);
    }

    #[test]
    fn normal_election_expires_after_five_minutes() {
        let f = Fixture::new();
        let start = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, start);
        let mut solicitor = CountingSolicitor::default();
        let mut ctx = f.ctx();
        assert!(!election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_secs(299)));
        assert!(election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_secs(301)));
        assert_eq!(election.state(), ElectionState::ExpiredUnconfirmed);
    }

    #[test]
    fn confirmed_election_retires_after_five_latencies() {
        let f = Fixture::new();
        let start = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, start);
        let mut ctx = f.ctx();
        assert!(election.force_confirm(&mut ctx, start));

        let mut solicitor = CountingSolicitor::default();
        assert!(!election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(100)));
        assert!(election.transition_time(&mut solicitor, &mut ctx, start + Duration::from_millis(130)));
        assert_eq!(election.state(), ElectionState::ExpiredConfirmed);
        assert!(election.confirmed());
    }

    // --- Votes ---

    #[test]
    fn identical_vote_is_a_replay() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let now = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();

        let first = election.vote(rep, 1, block.hash(), &mut ctx, now);
        assert_eq!(first, ElectionVoteResult::new(false, true));
        let second = election.vote(rep, 1, block.hash(), &mut ctx, now);
        assert_eq!(second, ElectionVoteResult::new(true, false));
        assert_eq!(f.stats.get(stats::VOTE_NEW), 1);
    }

    #[test]
    fn older_sequence_is_a_replay() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let now = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        election.vote(rep, 5, block.hash(), &mut ctx, now);
        let result = election.vote(rep, 4, block.hash(), &mut ctx, now + Duration::from_secs(60));
        assert!(result.replay);
        assert!(!result.processed);
    }

    #[test]
    fn newer_vote_waits_for_cooldown() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let now = Instant::now();
        let a = f.fork(100);
        let b = f.fork(101);
        let election = Election::new(Arc::clone(&a), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        election.publish(Arc::clone(&b), None, &mut ctx, now);

        election.vote(rep, 1, a.hash(), &mut ctx, now);
        // A representative below 1% of the online stake waits 15 seconds.
        let early = election.vote(rep, 2, b.hash(), &mut ctx, now + Duration::from_secs(10));
        assert_eq!(early, ElectionVoteResult::new(false, false));
        assert_eq!(election.votes()[&rep].hash, a.hash());

        let later = election.vote(rep, 2, b.hash(), &mut ctx, now + Duration::from_secs(15));
        assert!(later.processed);
        assert_eq!(election.votes()[&rep].hash, b.hash());
    }

    #[test]
    fn final_vote_skips_cooldown() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let now = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        election.vote(rep, 1, block.hash(), &mut ctx, now);
        let result = election.vote(rep, u64::MAX, block.hash(), &mut ctx, now);
        assert!(result.processed);
        assert_eq!(election.votes()[&rep].sequence, u64::MAX);
    }

    #[test]
    fn cooldown_depends_on_weight_share() {
        let stake = Amount::raw(10_000);
        assert_eq!(vote_cooldown(Amount::raw(99), stake), Duration::from_secs(15));
        assert_eq!(vote_cooldown(Amount::raw(100), stake), Duration::from_secs(5));
        assert_eq!(vote_cooldown(Amount::raw(499), stake), Duration::from_secs(5));
        assert_eq!(vote_cooldown(Amount::raw(500), stake), Duration::from_secs(1));
    }

    #[test]
    fn quorum_vote_confirms_and_reports() {
        let f = Fixture::new();
        let now = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();

        let result = election.vote(f.genesis(), 1, block.hash(), &mut ctx, now);
        assert!(result.processed);
        assert!(election.confirmed());
        assert_eq!(ctx.confirmed.len(), 1);
        let confirmed = &ctx.confirmed[0];
        assert_eq!(confirmed.status.winner_hash(), block.hash());
        assert_eq!(confirmed.status.status_type, ElectionStatusType::ActiveConfirmedQuorum);
        assert_eq!(confirmed.status.voter_count, 1);
        assert_eq!(confirmed.status.tally, f.genesis_stake());
    }

    #[test]
    fn confirmation_keeps_only_the_winner() {
        let f = Fixture::new();
        let now = Instant::now();
        let a = f.fork(100);
        let b = f.fork(101);
        let election = Election::new(Arc::clone(&a), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        assert!(election.publish(Arc::clone(&b), None, &mut ctx, now));

        election.vote(f.genesis(), 1, b.hash(), &mut ctx, now);
        assert!(election.confirmed());
        assert_eq!(election.winner().hash(), b.hash());
        assert_eq!(election.blocks().len(), 1);
        let losers: Vec<_> = ctx.confirmed[0].losers.iter().map(|l| l.hash()).collect();
        assert_eq!(losers, vec![a.hash()]);
        assert_eq!(ctx.confirmed[0].status.block_count, 2);
    }

    #[test]
    fn light_votes_do_not_confirm() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let now = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        election.vote(rep, 1, block.hash(), &mut ctx, now);
        assert!(!election.confirmed());
        assert!(ctx.confirmed.is_empty());
        assert_eq!(election.status().tally, Amount::raw(1000));
    }

    // --- Inactive cache merge ---

    #[test]
    fn cached_votes_never_replace_live_votes() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let now = Instant::now();
        let h1 = f.fork(100);
        let h2 = f.fork(101);
        let election = Election::new(Arc::clone(&h1), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        election.vote(rep, 5, h1.hash(), &mut ctx, now);

        let entry = InactiveCacheEntry {
            arrival: now,
            hash: h2.hash(),
            voters: vec![rep],
            status: Default::default(),
        };
        assert_eq!(election.insert_inactive_votes_cache(&entry, &mut ctx, now), 1);
        let recorded = election.votes()[&rep];
        assert_eq!(recorded.hash, h1.hash());
        assert_eq!(recorded.sequence, 5);
        assert_eq!(f.stats.get(stats::VOTE_CACHED), 0);
    }

    #[test]
    fn merged_votes_count_as_old() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let now = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        let entry = InactiveCacheEntry {
            arrival: now,
            hash: block.hash(),
            voters: vec![rep, test_key(4).account],
            status: Default::default(),
        };
        assert_eq!(election.insert_inactive_votes_cache(&entry, &mut ctx, now), 2);
        assert_eq!(f.stats.get(stats::VOTE_CACHED), 2);
        assert_eq!(election.votes()[&rep].time, None);

        // A cached vote never holds back a real one through cooldown.
        let result = election.vote(rep, 1, block.hash(), &mut ctx, now);
        assert!(result.processed);
    }

    #[test]
    fn late_block_is_counted() {
        let f = Fixture::new();
        let rep = f.small_rep(3);
        let arrival = Instant::now();
        let now = arrival + Duration::from_secs(6);
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        let entry = InactiveCacheEntry {
            arrival,
            hash: block.hash(),
            voters: vec![rep],
            status: Default::default(),
        };
        election.insert_inactive_votes_cache(&entry, &mut ctx, now);
        assert_eq!(f.stats.get(stats::ELECTION_LATE_BLOCK), 1);
    }

    // --- Publish ---

    #[test]
    fn publish_refused_once_confirmed() {
        let f = Fixture::new();
        let now = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        election.force_confirm(&mut ctx, now);
        assert!(!election.publish(f.fork(101), None, &mut ctx, now));
        assert_eq!(election.blocks().len(), 1);
    }

    #[test]
    fn republished_hash_replaces_stored_block() {
        let f = Fixture::new();
        let now = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        let reworked = Arc::new(block.with_work(99));
        assert!(!election.publish(reworked, None, &mut ctx, now));
        assert_eq!(election.winner().work, 99);
        assert_eq!(election.blocks().len(), 1);
    }

    #[test]
    fn eleventh_fork_needs_stake() {
        let f = Fixture::new();
        let now = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = f.ctx();
        for i in 101..110 {
            assert!(election.publish(f.fork(i), None, &mut ctx, now));
        }
        assert!(!election.publish(f.fork(110), None, &mut ctx, now));
        assert_eq!(election.blocks().len(), 10);
    }

    #[test]
    fn force_confirm_is_dev_only() {
        let f = Fixture::new();
        let now = Instant::now();
        let election = Election::new(f.fork(100), 0, ElectionBehavior::Normal, true, now);
        let mut ctx = ElectionContext::new(
            &f.ledger,
            &f.config,
            NetworkId::Live,
            f.genesis_stake(),
            &f.stats,
        );
        assert!(!election.force_confirm(&mut ctx, now));
        assert!(!election.confirmed());
    }

    #[test]
    fn expired_election_cannot_confirm() {
        let f = Fixture::new();
        let start = Instant::now();
        let block = f.fork(100);
        let election = Election::new(Arc::clone(&block), 0, ElectionBehavior::Optimistic, false, start);
        let mut solicitor = CountingSolicitor::default();
        let mut ctx = f.ctx();
        let later = start + Duration::from_secs(1);
        election.transition_time(&mut solicitor, &mut ctx, later);
        assert!(election.failed());
        election.vote(f.genesis(), 1, block.hash(), &mut ctx, later);
        assert!(!election.confirmed());
        assert!(ctx.confirmed.is_empty());
    }
}
