//! Network boundary of the election request loop.
//!
//! Each request round collects confirmation requests and winner broadcasts
//! into [`OutboundMessage`] values and hands them to a tokio channel drained
//! by whatever transport the node is embedded in.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use lattice_consensus::ConfirmationSolicitor;
use lattice_ledger::StateBlock;
use lattice_types::QualifiedRoot;

/// Requests and broadcasts sent in one round, per kind.
pub const MAX_CONFIRM_REQUESTS: usize = 512;
pub const MAX_BROADCASTS: usize = 128;

/// Traffic produced by the request loop.
#[derive(Clone, Debug)]
pub enum OutboundMessage {
    /// Ask representatives to vote for `winner` of `root`.
    ConfirmReq {
        root: QualifiedRoot,
        winner: Arc<StateBlock>,
    },
    /// Republish an election winner.
    Publish(Arc<StateBlock>),
}

/// [`ConfirmationSolicitor`] that forwards into a bounded channel. A full or
/// closed channel refuses the request, which the election retries next round.
pub struct ChannelSolicitor {
    tx: mpsc::Sender<OutboundMessage>,
    requests: usize,
    broadcasts: usize,
}

impl ChannelSolicitor {
    pub fn new(tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            tx,
            requests: 0,
            broadcasts: 0,
        }
    }

    /// Start a new round with fresh budgets.
    pub fn prepare(&mut self) {
        self.requests = 0;
        self.broadcasts = 0;
    }

    fn send(&self, message: OutboundMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "outbound channel refused message");
                false
            }
        }
    }
}

impl ConfirmationSolicitor for ChannelSolicitor {
    fn add(&mut self, root: &QualifiedRoot, winner: &Arc<StateBlock>) -> bool {
        if self.requests >= MAX_CONFIRM_REQUESTS {
            return false;
        }
        let sent = self.send(OutboundMessage::ConfirmReq {
            root: *root,
            winner: Arc::clone(winner),
        });
        if sent {
            self.requests += 1;
        }
        sent
    }

    fn broadcast(&mut self, winner: &Arc<StateBlock>) -> bool {
        if self.broadcasts >= MAX_BROADCASTS {
            return false;
        }
        let sent = self.send(OutboundMessage::Publish(Arc::clone(winner)));
        if sent {
            self.broadcasts += 1;
        }
        sent
    }
}
