//! Block hash type for the block lattice.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bytes::bytes32_newtype;

/// A 32-byte block hash, identifying a block in an account's chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; 32]);

bytes32_newtype!(BlockHash);

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
