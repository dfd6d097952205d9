//! The persisted per-account cementing boundary.

use serde::{Deserialize, Serialize};

use crate::BlockHash;

/// Height and hash of the highest cemented block of an account.
///
/// A height of zero means nothing in the account is cemented yet. Heights
/// only ever grow, and never beyond the account's block count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfirmationHeightInfo {
    pub height: u64,
    pub frontier: BlockHash,
}

impl ConfirmationHeightInfo {
    pub fn new(height: u64, frontier: BlockHash) -> Self {
        Self { height, frontier }
    }
}
