//! Block-lattice ledger.
//!
//! Each account owns an append-only chain of state blocks. Sends create
//! pending entries that the destination account later receives, so a receive
//! depends on a block in another chain. Per account, a confirmation height
//! marks the cemented prefix of the chain, which can never be rolled back.

pub mod cache;
pub mod error;
pub mod genesis;
pub mod ledger;
pub mod rep_weights;
pub mod sideband;
pub mod state_block;
pub mod testing;
pub mod write_queue;

pub use cache::LedgerCache;
pub use error::LedgerError;
pub use genesis::{dev_genesis_key, Epochs, LedgerConstants};
pub use ledger::Ledger;
pub use rep_weights::RepWeights;
pub use sideband::{BlockDetails, BlockSideband, SavedBlock};
pub use state_block::{StateBlock, StateBlockBuilder};
pub use write_queue::{WriteDatabaseQueue, WriteGuard, Writer};
