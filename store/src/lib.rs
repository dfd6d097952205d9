//! Storage traits for the lattice ledger.
//!
//! The ledger depends only on these traits. [`MemoryStore`] is the backend
//! used by tests and by nodes that do not persist state; an on-disk engine
//! implements the same traits.

pub mod account;
pub mod block;
pub mod confirmation_height;
pub mod error;
pub mod memory;
pub mod pending;

pub use account::{AccountInfo, AccountStore};
pub use block::BlockStore;
pub use confirmation_height::ConfirmationHeightStore;
pub use error::{OptionalExt, StoreError};
pub use memory::MemoryStore;
pub use pending::{PendingInfo, PendingKey, PendingStore};

/// Every table the ledger needs, behind one object.
pub trait Store:
    BlockStore + AccountStore + PendingStore + ConfirmationHeightStore + Send + Sync
{
}

impl<T> Store for T where
    T: BlockStore + AccountStore + PendingStore + ConfirmationHeightStore + Send + Sync
{
}
