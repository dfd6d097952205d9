use lattice_types::{Account, BlockHash};
use thiserror::Error;

/// Reasons a block is refused by the ledger, and failures of ledger updates.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block {0} is already in the ledger")]
    Old(BlockHash),

    #[error("block {0} competes with an existing block for its chain position")]
    Fork(BlockHash),

    #[error("previous block of {0} is missing")]
    GapPrevious(BlockHash),

    #[error("source block of {0} is missing")]
    GapSource(BlockHash),

    #[error("bad signature on block {0}")]
    BadSignature(BlockHash),

    #[error("block {0} is not pending for its account")]
    Unreceivable(BlockHash),

    #[error("balance of block {0} does not match the received amount")]
    BalanceMismatch(BlockHash),

    #[error("epoch block {0} changes the representative")]
    RepresentativeMismatch(BlockHash),

    #[error("block {0} does not fit at this chain position")]
    BlockPosition(BlockHash),

    #[error("block not found: {0}")]
    BlockNotFound(BlockHash),

    #[error("block {0} is cemented and cannot be rolled back")]
    Cemented(BlockHash),

    #[error("account not found: {0}")]
    AccountNotFound(Account),

    #[error("confirmation height of {account} cannot move from {current} to {requested}")]
    ConfirmationHeightRegression {
        account: Account,
        current: u64,
        requested: u64,
    },

    #[error("confirmation height {requested} of {account} exceeds its {block_count} blocks")]
    ConfirmationHeightOverflow {
        account: Account,
        requested: u64,
        block_count: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(#[from] lattice_store::StoreError),
}
