//! Fundamental types for the lattice node.
//!
//! This crate defines the values shared by every other crate in the workspace:
//! block hashes, accounts, roots, amounts, keys, timestamps, the network
//! identifier, epochs, and the persisted confirmation-height record.

mod bytes;

pub mod account;
pub mod amount;
pub mod block;
pub mod confirmation_height;
pub mod epoch;
pub mod error;
pub mod keys;
pub mod network;
pub mod root;
pub mod time;

pub use account::Account;
pub use amount::Amount;
pub use block::BlockHash;
pub use confirmation_height::ConfirmationHeightInfo;
pub use epoch::Epoch;
pub use error::TypesError;
pub use keys::{KeyPair, PrivateKey, Signature};
pub use network::NetworkId;
pub use root::{QualifiedRoot, Root};
pub use time::Timestamp;
