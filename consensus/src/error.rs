use lattice_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("invalid elections configuration: {0}")]
    InvalidConfig(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
