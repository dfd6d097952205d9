//! Lattice node: turns consensus results into an irreversible ledger state.
//!
//! The node is the coordinator that:
//! - Feeds blocks and votes into the active elections manager
//! - Drives the election request loop on a tokio task
//! - Cements confirmed blocks on a dedicated confirmation height thread
//! - Exposes metrics, logging and configuration for the whole stack

pub mod cementing;
pub mod cementing_bounded;
pub mod cementing_unbounded;
pub mod config;
pub mod confirmation_height_processor;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod solicitor;

pub use cementing::{CementError, CementationObservers};
pub use config::{CementingConfig, CementingMode, NodeConfig};
pub use confirmation_height_processor::ConfirmationHeightProcessor;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::Node;
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use solicitor::{ChannelSolicitor, OutboundMessage};
