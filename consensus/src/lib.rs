//! Consensus core: double-spend resolution by weighted representative voting.
//!
//! - Each account delegates its balance to a representative.
//! - Representatives vote on the competing blocks of a root.
//! - A block is confirmed once the votes behind it reach the online weight
//!   minimum and lead the runner-up by the quorum delta.
//! - Confirmed blocks are handed to the confirmation height processor,
//!   which cements them.
//!
//! ## Module overview
//!
//! - [`election`]: per-root election state machine.
//! - [`active_elections`]: container admitting, driving and retiring elections.
//! - [`inactive_cache`]: votes for blocks without an election.
//! - [`vote`], [`vote_info`]: signed votes and per-voter records.
//! - [`online_reps`]: representatives seen voting, and the online stake.
//! - [`recently_confirmed`], [`recently_dropped`], [`expired_optimistic`]:
//!   bounded histories consulted on admission.
//! - [`cementation`], [`solicitor`]: seams to the cementing processor and the
//!   network.

pub mod active_elections;
pub mod cementation;
pub mod config;
pub mod election;
pub mod error;
pub mod expired_optimistic;
pub mod inactive_cache;
pub mod multipliers;
pub mod observers;
pub mod online_reps;
pub mod publish_filter;
pub mod recently_confirmed;
pub mod recently_dropped;
pub mod solicitor;
pub mod stats;
pub mod vote;
pub mod vote_info;

pub use active_elections::{ActiveElections, ElectionInsertResult};
pub use cementation::CementationQueue;
pub use config::{ElectionsConfig, FrontiersConfirmationMode};
pub use election::{
    base_latency, ConfirmedElection, Election, ElectionBehavior, ElectionContext, ElectionState,
    ElectionStatus, ElectionStatusType,
};
pub use error::ConsensusError;
pub use expired_optimistic::ExpiredOptimisticElections;
pub use inactive_cache::{InactiveCacheEntry, InactiveCacheStatus, InactiveVoteCache};
pub use multipliers::MultiplierRing;
pub use observers::{CementedBlockEvent, ElectionObservers, ObserverSet};
pub use online_reps::OnlineReps;
pub use publish_filter::PublishFilter;
pub use recently_confirmed::{RecentlyCemented, RecentlyConfirmed};
pub use recently_dropped::RecentlyDropped;
pub use solicitor::ConfirmationSolicitor;
pub use vote::{Vote, VoteCode};
pub use vote_info::{ElectionVoteResult, VoteInfo};
