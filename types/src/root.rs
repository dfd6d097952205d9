//! Chain positions contested by elections.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bytes::bytes32_newtype;
use crate::{Account, BlockHash};

/// The chain position a block occupies: its `previous` hash, or the account
/// itself for the first block of a chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Root([u8; 32]);

bytes32_newtype!(Root);

impl From<BlockHash> for Root {
    fn from(hash: BlockHash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl From<Account> for Root {
    fn from(account: Account) -> Self {
        Self(*account.as_bytes())
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode_hex())
    }
}

/// `(root, previous)`: two forks of an open block share the account root but
/// both have a zero previous, while forks further up the chain share both.
/// Elections are keyed by this pair.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedRoot {
    pub root: Root,
    pub previous: BlockHash,
}

impl QualifiedRoot {
    pub fn new(root: Root, previous: BlockHash) -> Self {
        Self { root, previous }
    }
}

impl fmt::Debug for QualifiedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedRoot({:?}, {:?})", self.root, self.previous)
    }
}

impl fmt::Display for QualifiedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.previous)
    }
}
