//! Node configuration with TOML file support.

use std::path::Path;

use serde::{Deserialize, Serialize};

use lattice_consensus::ElectionsConfig;
use lattice_types::NetworkId;

use crate::NodeError;

/// Configuration for a lattice node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network the node participates in.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Period of the election request loop. Absent means the network
    /// default, see [`NodeConfig::request_interval`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_interval_ms: Option<u64>,

    #[serde(default)]
    pub elections: ElectionsConfig,

    #[serde(default)]
    pub cementing: CementingConfig,
}

/// Which walk the confirmation height processor uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CementingMode {
    /// Unbounded while the uncemented backlog is small, bounded otherwise.
    #[default]
    Automatic,
    Bounded,
    Unbounded,
}

/// Tuning of the confirmation height processor, the `[cementing]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CementingConfig {
    pub mode: CementingMode,
    /// Floor of the adaptive number of blocks cemented per write guard.
    pub batch_write_size_min: u64,
    /// Pending writes of consecutive blocks are batched for at least this
    /// long while more blocks await processing.
    pub batch_separate_pending_min_time_ms: u64,
    /// Automatic mode stays unbounded while fewer than this many blocks are
    /// uncemented.
    pub unbounded_cutoff: u64,
    /// The bounded walk forces a write once this many sections are pending.
    pub max_pending_writes: usize,
    /// Capacity of the bounded walk's dependency stack and of its in-memory
    /// view of confirmation heights.
    pub max_walker_items: usize,
}

impl Default for CementingConfig {
    fn default() -> Self {
        Self {
            mode: CementingMode::Automatic,
            batch_write_size_min: 16_384,
            batch_separate_pending_min_time_ms: 50,
            unbounded_cutoff: 16_384,
            max_pending_writes: 131_072,
            max_walker_items: 131_072,
        }
    }
}

impl CementingConfig {
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.batch_write_size_min == 0 {
            return Err(NodeError::Config(
                "cementing.batch_write_size_min must be positive".into(),
            ));
        }
        if self.max_pending_writes == 0 || self.max_walker_items == 0 {
            return Err(NodeError::Config(
                "cementing limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Defaults for `network`.
    pub fn for_network(network: NetworkId) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        self.elections.validate()?;
        self.cementing.validate()
    }

    /// 500 ms, or 20 ms on the dev network, unless configured.
    pub fn request_interval(&self) -> std::time::Duration {
        let ms = self.request_interval_ms.unwrap_or(if self.network.is_dev() {
            20
        } else {
            500
        });
        std::time::Duration::from_millis(ms)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            request_interval_ms: None,
            elections: ElectionsConfig::default(),
            cementing: CementingConfig::default(),
        }
    }
}
