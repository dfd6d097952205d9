//! Account identifiers.
//!
//! An account is the Ed25519 public key that signs its chain. The textual
//! form is `lat_` followed by the key in lowercase hex.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bytes::bytes32_newtype;
use crate::TypesError;

pub const ACCOUNT_PREFIX: &str = "lat_";

/// A 32-byte account public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account([u8; 32]);

bytes32_newtype!(Account);

impl Account {
    /// Parse the `lat_<hex>` text form.
    pub fn decode_account(s: &str) -> Result<Self, TypesError> {
        let hex = s
            .strip_prefix(ACCOUNT_PREFIX)
            .ok_or_else(|| TypesError::InvalidAccount(s.to_string()))?;
        Self::decode_hex(hex)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ACCOUNT_PREFIX, self.encode_hex())
    }
}
