use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] lattice_ledger::LedgerError),

    #[error(transparent)]
    Consensus(#[from] lattice_consensus::ConsensusError),

    #[error(transparent)]
    Store(#[from] lattice_store::StoreError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The same block (hash, work and signature) was published recently.
    #[error("duplicate publish of {0}")]
    DuplicatePublish(lattice_types::BlockHash),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// `start` was called on a component that is already running.
    #[error("already started")]
    AlreadyStarted,
}
