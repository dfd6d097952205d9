//! Egress seam for confirmation requests and winner broadcasts.

use std::sync::Arc;

use lattice_ledger::StateBlock;
use lattice_types::QualifiedRoot;

/// Collects the requests elections make during one request round. The
/// network layer decides how they reach representatives.
pub trait ConfirmationSolicitor {
    /// Ask representatives to vote on `winner` of `root`. Returns false when
    /// the round has no budget left; the election retries next round.
    fn add(&mut self, root: &QualifiedRoot, winner: &Arc<StateBlock>) -> bool;

    /// Republish the current winner. Returns false when not sent.
    fn broadcast(&mut self, winner: &Arc<StateBlock>) -> bool;
}
