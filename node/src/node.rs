//! The lattice node: wires the ledger, the consensus core and the
//! confirmation height processor together.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use lattice_consensus::stats::CONSENSUS_STATS;
use lattice_consensus::{
    ActiveElections, CementationQueue, ElectionStatusType, OnlineReps, PublishFilter, Vote,
    VoteCode,
};
use lattice_ledger::{Ledger, LedgerConstants, LedgerError, SavedBlock, StateBlock, WriteDatabaseQueue};
use lattice_store::Store;
use lattice_utils::StatsCounter;

use crate::cementing::CEMENTING_STATS;
use crate::config::NodeConfig;
use crate::confirmation_height_processor::ConfirmationHeightProcessor;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;
use crate::solicitor::{ChannelSolicitor, OutboundMessage};

/// Channel capacity for outbound confirmation requests and broadcasts.
const OUTBOUND_CHANNEL_CAPACITY: usize = 4096;
/// Capacity of the duplicate-publish filter.
const PUBLISH_FILTER_SIZE: usize = 256 * 1024;

fn online_weight_period(config: &NodeConfig) -> Duration {
    if config.network.is_dev() {
        Duration::from_secs(1)
    } else {
        Duration::from_secs(300)
    }
}

pub struct Node {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    stats: Arc<StatsCounter>,
    metrics: Arc<NodeMetrics>,
    online_reps: Arc<OnlineReps>,
    publish_filter: Arc<PublishFilter>,
    active: Arc<ActiveElections>,
    confirmation_height: Arc<ConfirmationHeightProcessor>,
    shutdown: ShutdownController,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Mutex<Option<mpsc::Receiver<OutboundMessage>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Open the ledger over `store` and wire every subsystem. Nothing runs
    /// until [`Node::start`].
    pub fn new(config: NodeConfig, store: Arc<dyn Store>) -> Result<Self, NodeError> {
        config.validate()?;
        let ledger = Arc::new(Ledger::new(
            store,
            LedgerConstants::for_network(config.network),
        )?);
        let write_queue = Arc::new(WriteDatabaseQueue::new(false));
        let stats = Arc::new(StatsCounter::from_groups(&[CONSENSUS_STATS, CEMENTING_STATS]));
        let metrics = Arc::new(NodeMetrics::new()?);
        let online_reps = Arc::new(OnlineReps::new(
            Arc::clone(&ledger),
            config.elections.online_weight_minimum,
        ));

        let confirmation_height = Arc::new(ConfirmationHeightProcessor::new(
            Arc::clone(&ledger),
            write_queue,
            config.cementing.clone(),
            Arc::clone(&stats),
        ));
        let cementation: Arc<dyn CementationQueue> = confirmation_height.clone();
        let publish_filter = Arc::new(PublishFilter::new(PUBLISH_FILTER_SIZE));
        let active = Arc::new(ActiveElections::new(
            Arc::clone(&ledger),
            config.elections.clone(),
            Arc::clone(&online_reps),
            Arc::clone(&stats),
            cementation,
            Arc::clone(&publish_filter),
        ));

        Self::wire_observers(&active, &confirmation_height, &metrics);

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            ledger,
            stats,
            metrics,
            online_reps,
            publish_filter,
            active,
            confirmation_height,
            shutdown: ShutdownController::new(),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            task_handles: Mutex::new(Vec::new()),
        })
    }

    // The processor holds observers of the manager, which holds the
    // processor; the observers only keep a weak reference.
    fn wire_observers(
        active: &Arc<ActiveElections>,
        confirmation_height: &ConfirmationHeightProcessor,
        metrics: &Arc<NodeMetrics>,
    ) {
        let weak = Arc::downgrade(active);
        let cemented = Arc::clone(metrics);
        confirmation_height.add_cemented_observer(move |block| {
            cemented.blocks_cemented_total.inc();
            if let Some(active) = weak.upgrade() {
                active.block_cemented_callback(block);
            }
        });

        let weak = Arc::downgrade(active);
        confirmation_height.add_block_already_cemented_observer(move |hash| {
            if let Some(active) = weak.upgrade() {
                active.block_already_cemented_callback(hash);
            }
        });

        let batches = Arc::clone(metrics);
        confirmation_height.add_batch_written_observer(move |elapsed| {
            batches.cementing_batch_seconds.observe(elapsed.as_secs_f64());
        });

        let confirmed = Arc::clone(metrics);
        active.observers().blocks.add(move |event| {
            let hash = event.status.winner_hash();
            match event.status.status_type {
                ElectionStatusType::ActiveConfirmedQuorum
                | ElectionStatusType::ActiveConfirmationHeight => {
                    confirmed.elections_confirmed_total.inc();
                    info!(%hash, account = %event.account, kind = ?event.status.status_type, "election winner cemented");
                }
                _ => trace!(%hash, account = %event.account, "block cemented"),
            }
        });

        let dropped = Arc::clone(metrics);
        active.observers().active_stopped.add(move |hash| {
            dropped.elections_dropped_total.inc();
            debug!(%hash, "block left the active elections");
        });

        active.observers().difficulty.add(|difficulty| {
            trace!(difficulty, "active difficulty updated");
        });

        active.observers().bootstrap_requested.add(|hash| {
            warn!(%hash, "votes reached quorum for a block this node does not have");
        });
    }

    /// Start the cementing thread and the election request loop. Must be
    /// called from within a tokio runtime.
    pub async fn start(&self) -> Result<(), NodeError> {
        info!(network = self.config.network.as_str(), "lattice node starting");
        self.confirmation_height.start()?;

        let active = Arc::clone(&self.active);
        let online_reps = Arc::clone(&self.online_reps);
        let metrics = Arc::clone(&self.metrics);
        let mut solicitor = ChannelSolicitor::new(self.outbound_tx.clone());
        let mut shutdown = self.shutdown.subscribe();
        let request_interval = self.config.request_interval();
        let sample_interval = online_weight_period(&self.config);

        let handle = tokio::spawn(async move {
            let mut requests = tokio::time::interval(request_interval);
            let mut samples = tokio::time::interval(sample_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => {
                        debug!("election request loop shutting down");
                        break;
                    }
                    _ = samples.tick() => {
                        online_reps.sample(Instant::now());
                        trace!(trended = %online_reps.trended(), "online weight sampled");
                    }
                    _ = requests.tick() => {
                        solicitor.prepare();
                        active.tick(&mut solicitor);
                        metrics.elections_active.set(active.size() as i64);
                        metrics
                            .inactive_votes_cache_size
                            .set(active.inactive_votes_cache_size() as i64);
                        metrics.active_multiplier.set(active.active_multiplier());
                    }
                }
            }
        });
        self.task_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);

        info!("lattice node started");
        Ok(())
    }

    /// Run until SIGINT or SIGTERM, then stop.
    pub async fn run(&self) -> Result<(), NodeError> {
        self.start().await?;
        let signalled = self.shutdown.wait_for_signal().await;
        self.stop().await;
        signalled.map_err(NodeError::from)
    }

    /// Stop the request loop, clear the elections and stop the cementing
    /// thread after its current batch.
    pub async fn stop(&self) {
        info!("lattice node stopping");
        self.shutdown.shutdown();

        let handles: Vec<_> = self
            .task_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "node task ended abnormally");
            }
        }

        self.active.stop();
        let confirmation_height = Arc::clone(&self.confirmation_height);
        if let Err(e) = tokio::task::spawn_blocking(move || confirmation_height.stop()).await {
            warn!(error = %e, "confirmation height processor did not stop cleanly");
        }
        info!("lattice node stopped");
    }

    // ── Ingress ────────────────────────────────────────────────────────────

    /// Process a block received from the network. A block extending its
    /// chain may start an election; a fork joins the election of its root;
    /// a known block may raise its election's work. Exact repeats of a
    /// recent publish are refused before touching the ledger.
    pub fn process_active(&self, block: StateBlock) -> Result<SavedBlock, NodeError> {
        if self.publish_filter.apply(&block) {
            trace!(hash = %block.hash(), "duplicate publish filtered");
            return Err(NodeError::DuplicatePublish(block.hash()));
        }
        let shared = Arc::new(block.clone());
        match self.ledger.process(block) {
            Ok(saved) => {
                let started = self
                    .active
                    .trigger_inactive_votes_cache_election(Arc::clone(&saved.block));
                self.active.publish(Arc::clone(&saved.block));
                if !started && self.ledger.dependents_confirmed(&saved) {
                    self.active.activate(&saved.account());
                }
                Ok(saved)
            }
            Err(LedgerError::Fork(hash)) => {
                if self.active.publish(shared) {
                    debug!(%hash, "fork joined a live election");
                }
                Err(LedgerError::Fork(hash).into())
            }
            Err(LedgerError::Old(hash)) => {
                self.active.update_difficulty(&shared);
                Err(LedgerError::Old(hash).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Process a block created by this node. Its election bypasses the
    /// capacity limit of the active elections.
    pub fn process_local(&self, block: StateBlock) -> Result<SavedBlock, NodeError> {
        let saved = self.ledger.process(block)?;
        let result = self.active.insert_local(Arc::clone(&saved.block));
        if let Some(election) = &result.election {
            election.transition_active(Instant::now());
        }
        Ok(saved)
    }

    pub fn vote(&self, vote: &Vote) -> VoteCode {
        self.active.vote(vote)
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn active(&self) -> &Arc<ActiveElections> {
        &self.active
    }

    pub fn confirmation_height(&self) -> &Arc<ConfirmationHeightProcessor> {
        &self.confirmation_height
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// The receiving end of outbound traffic. Available once.
    pub fn take_outbound(&self) -> Option<mpsc::Receiver<OutboundMessage>> {
        self.outbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
