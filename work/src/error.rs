use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("work generation cancelled")]
    Cancelled,
}
