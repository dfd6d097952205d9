//! Network identifier.

use serde::{Deserialize, Serialize};

/// Which network a node participates in. Several timing constants of the
/// consensus core shrink drastically on `Dev` so tests finish quickly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    #[default]
    Live,
    /// The public beta network.
    Beta,
    /// Local development and test network.
    Dev,
}

impl NetworkId {
    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Beta => "beta",
            Self::Dev => "dev",
        }
    }
}
