//! Per-representative vote record kept by an election.

use std::time::Instant;

use lattice_types::BlockHash;

/// The latest vote of one representative within an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteInfo {
    /// When the vote was accepted. `None` for votes merged from the inactive
    /// cache, which count as arbitrarily old for cooldown purposes.
    pub time: Option<Instant>,
    pub sequence: u64,
    pub hash: BlockHash,
}

impl VoteInfo {
    pub fn new(time: Instant, sequence: u64, hash: BlockHash) -> Self {
        Self {
            time: Some(time),
            sequence,
            hash,
        }
    }

    pub fn cached(hash: BlockHash) -> Self {
        Self {
            time: None,
            sequence: 0,
            hash,
        }
    }

    /// Whether a vote `(sequence, hash)` supersedes this one.
    pub fn is_superseded_by(&self, sequence: u64, hash: &BlockHash) -> bool {
        self.sequence < sequence || (self.sequence == sequence && self.hash < *hash)
    }
}

/// The result of one vote within one election.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ElectionVoteResult {
    /// The vote was not newer than the representative's recorded vote.
    pub replay: bool,
    /// The vote was recorded and counted.
    pub processed: bool,
}

impl ElectionVoteResult {
    pub fn new(replay: bool, processed: bool) -> Self {
        Self { replay, processed }
    }
}
