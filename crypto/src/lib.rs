//! Cryptographic primitives for the lattice node.
//!
//! - **Ed25519** for signing blocks and votes and verifying them
//! - **Blake2b** for block hashes, vote hashes and work values

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi, blake2b_64_multi, hash_block};
pub use keys::{account_from_private, generate_keypair, keypair_from_private, keypair_from_seed};
pub use sign::{sign_message, verify_signature};
