//! Shared utilities for the lattice node.

pub mod logging;
pub mod stats;

pub use logging::init_tracing;
pub use stats::StatsCounter;
