//! Signed representative votes.
//!
//! A vote names up to [`MAX_HASHES`] block hashes and carries a sequence
//! number. Within an election a representative's newer vote (higher
//! sequence, or the same sequence for a greater hash) supersedes the older
//! one regardless of arrival order.

use lattice_crypto::{blake2b_256_multi, sign_message, verify_signature};
use lattice_types::{Account, BlockHash, KeyPair, Signature};
use serde::{Deserialize, Serialize};

/// Maximum number of hashes one vote may cover.
pub const MAX_HASHES: usize = 12;

const VOTE_PREFIX: &[u8] = b"vote ";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub account: Account,
    pub signature: Signature,
    pub sequence: u64,
    pub hashes: Vec<BlockHash>,
}

impl Vote {
    pub fn new(keys: &KeyPair, sequence: u64, hashes: Vec<BlockHash>) -> Self {
        let digest = Self::digest(&hashes, sequence);
        Self {
            account: keys.account,
            signature: sign_message(&digest, &keys.private),
            sequence,
            hashes,
        }
    }

    fn digest(hashes: &[BlockHash], sequence: u64) -> [u8; 32] {
        let sequence = sequence.to_le_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(hashes.len() + 2);
        parts.push(VOTE_PREFIX);
        parts.extend(hashes.iter().map(|h| h.as_bytes().as_slice()));
        parts.push(&sequence);
        blake2b_256_multi(&parts)
    }

    /// The signed digest of this vote.
    pub fn hash(&self) -> BlockHash {
        BlockHash::new(Self::digest(&self.hashes, self.sequence))
    }

    /// Checks the hash count and the signature.
    pub fn validate(&self) -> bool {
        !self.hashes.is_empty()
            && self.hashes.len() <= MAX_HASHES
            && verify_signature(self.hash().as_bytes(), &self.signature, &self.account)
    }
}

/// Outcome of routing a vote through the active elections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoteCode {
    /// At least one hash belongs to a live election and was not a replay.
    Vote,
    /// Already seen, or every hash was recently confirmed.
    Replay,
    /// No live election and nothing recently confirmed; cached for later.
    Indeterminate,
    /// Bad signature or malformed.
    Invalid,
}
