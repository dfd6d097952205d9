//! Proof-of-work as a prioritization signal.
//!
//! Blocks carry a work nonce; the value `Blake2b64(nonce || root)` is the
//! block's difficulty. The consensus core never rejects blocks on work, it
//! only ranks elections by the difficulty *multiplier* relative to the base
//! threshold, normalized across epochs so blocks measured against different
//! thresholds compare fairly.

pub mod difficulty;
pub mod error;
pub mod generator;
pub mod thresholds;
pub mod validator;

pub use difficulty::{from_multiplier, to_multiplier};
pub use error::WorkError;
pub use generator::WorkGenerator;
pub use thresholds::{WorkBlockKind, WorkThresholds};
pub use validator::{validate_work, work_value};

/// The result of work generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkNonce(pub u64);
