//! Counter names recorded by the consensus core.

pub const VOTE_NEW: &str = "vote_new";
pub const VOTE_CACHED: &str = "vote_cached";
pub const VOTE_REPLAY: &str = "vote_replay";
pub const VOTE_INDETERMINATE: &str = "vote_indeterminate";
pub const VOTE_INVALID: &str = "vote_invalid";

pub const ELECTION_DROP: &str = "election_drop";
pub const ELECTION_RESTART: &str = "election_restart";
pub const ELECTION_BLOCK_CONFLICT: &str = "election_block_conflict";
pub const ELECTION_DIFFICULTY_UPDATE: &str = "election_difficulty_update";
pub const ELECTION_START: &str = "election_start";
pub const ELECTION_CONFIRMED: &str = "election_confirmed";
pub const ELECTION_LATE_BLOCK: &str = "election_late_block";
pub const ELECTION_PRIORITY: &str = "election_priority";
pub const ELECTION_NON_PRIORITY: &str = "election_non_priority";
pub const ELECTION_PESSIMISTIC: &str = "election_pessimistic";
pub const ELECTION_OPTIMISTIC: &str = "election_optimistic";

/// Every counter above, for registering with a [`lattice_utils::StatsCounter`].
pub const CONSENSUS_STATS: &[&str] = &[
    VOTE_NEW,
    VOTE_CACHED,
    VOTE_REPLAY,
    VOTE_INDETERMINATE,
    VOTE_INVALID,
    ELECTION_DROP,
    ELECTION_RESTART,
    ELECTION_BLOCK_CONFLICT,
    ELECTION_DIFFICULTY_UPDATE,
    ELECTION_START,
    ELECTION_CONFIRMED,
    ELECTION_LATE_BLOCK,
    ELECTION_PRIORITY,
    ELECTION_NON_PRIORITY,
    ELECTION_PESSIMISTIC,
    ELECTION_OPTIMISTIC,
];
