//! Prometheus metrics for the lattice node.
//!
//! Exposes counters, gauges, and a histogram covering elections and
//! cementing. The [`NodeMetrics`] struct owns a dedicated [`Registry`] that an
//! external scraper reads through [`NodeMetrics::gather_text`].

use prometheus::{
    register_gauge_with_registry, register_histogram_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Gauge,
    Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

use crate::NodeError;

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Elections that reached quorum or were confirmed by cementing.
    pub elections_confirmed_total: IntCounter,
    /// Elections that left the container without a confirmed winner.
    pub elections_dropped_total: IntCounter,
    /// Blocks written below a confirmation height.
    pub blocks_cemented_total: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Current number of live elections.
    pub elections_active: IntGauge,
    /// Current number of blocks with inactive votes.
    pub inactive_votes_cache_size: IntGauge,
    /// Trended normalized work multiplier of live elections.
    pub active_multiplier: Gauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent holding the write role per cementing batch, in seconds.
    pub cementing_batch_seconds: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let elections_confirmed_total = register_int_counter_with_registry!(
            Opts::new(
                "lattice_elections_confirmed_total",
                "Elections confirmed by quorum or by cementing"
            ),
            registry
        )?;

        let elections_dropped_total = register_int_counter_with_registry!(
            Opts::new(
                "lattice_elections_dropped_total",
                "Elections removed without a confirmed winner"
            ),
            registry
        )?;

        let blocks_cemented_total = register_int_counter_with_registry!(
            Opts::new("lattice_blocks_cemented_total", "Blocks cemented"),
            registry
        )?;

        let elections_active = register_int_gauge_with_registry!(
            Opts::new("lattice_elections_active", "Current number of live elections"),
            registry
        )?;

        let inactive_votes_cache_size = register_int_gauge_with_registry!(
            Opts::new(
                "lattice_inactive_votes_cache_size",
                "Blocks holding votes without an election"
            ),
            registry
        )?;

        let active_multiplier = register_gauge_with_registry!(
            Opts::new(
                "lattice_active_multiplier",
                "Trended work multiplier of live elections"
            ),
            registry
        )?;

        // Exponential buckets covering 1 ms → ~16 s.
        let cementing_batch_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "lattice_cementing_batch_seconds",
                "Time spent writing one cementing batch"
            )
            .buckets(prometheus::exponential_buckets(0.001, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            elections_confirmed_total,
            elections_dropped_total,
            blocks_cemented_total,
            elections_active,
            inactive_votes_cache_size,
            active_multiplier,
            cementing_batch_seconds,
        })
    }

    /// The registry in the Prometheus text exposition format.
    pub fn gather_text(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| NodeError::Config(e.to_string()))
    }
}
