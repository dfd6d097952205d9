//! Election tuning, loaded as the `[elections]` table of the node config.

use lattice_types::amount::MEGA_RAW;
use lattice_types::Amount;
use serde::{Deserialize, Serialize};

use crate::ConsensusError;

/// When optimistic elections are started for account frontiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontiersConfirmationMode {
    Always,
    /// Only while few elections are live.
    #[default]
    Automatic,
    Disabled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionsConfig {
    /// Live elections beyond this count are candidates for eviction.
    pub active_elections_size: usize,
    /// Floor for the online stake; also the tally a winner needs.
    #[serde(with = "raw_string")]
    pub online_weight_minimum: Amount,
    /// Percentage of online stake the leader must lead the runner-up by.
    pub online_weight_quorum: u8,
    /// Percentage of online stake the inactive votes for a block must reach
    /// before an election is started for it.
    pub election_hint_weight_percent: u8,
    /// Voters an inactive block needs before an election is started for it.
    pub election_hint_min_voters: usize,
    pub inactive_votes_cache_size: usize,
    /// Capacity of the recently cemented status history.
    pub confirmation_history_size: usize,
    pub recently_confirmed_size: usize,
    pub recently_dropped_size: usize,
    pub max_expired_optimistic_elections: usize,
    /// Representatives below `online_stake / principal_weight_factor` are
    /// not counted as principal.
    pub principal_weight_factor: u64,
    pub frontiers_confirmation: FrontiersConfirmationMode,
    pub max_optimistic_elections: usize,
}

impl Default for ElectionsConfig {
    fn default() -> Self {
        Self {
            active_elections_size: 50_000,
            online_weight_minimum: Amount::raw(60_000 * MEGA_RAW),
            online_weight_quorum: 50,
            election_hint_weight_percent: 10,
            election_hint_min_voters: 5,
            inactive_votes_cache_size: 16_384,
            confirmation_history_size: 2048,
            recently_confirmed_size: 65_536,
            recently_dropped_size: 16_384,
            max_expired_optimistic_elections: 10_000,
            principal_weight_factor: 1000,
            frontiers_confirmation: FrontiersConfirmationMode::Automatic,
            max_optimistic_elections: 50,
        }
    }
}

impl ElectionsConfig {
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.active_elections_size == 0 {
            return Err(ConsensusError::InvalidConfig(
                "active_elections_size must be positive".into(),
            ));
        }
        if self.online_weight_quorum > 100 || self.election_hint_weight_percent > 100 {
            return Err(ConsensusError::InvalidConfig(
                "percentages must not exceed 100".into(),
            ));
        }
        if self.principal_weight_factor == 0 {
            return Err(ConsensusError::InvalidConfig(
                "principal_weight_factor must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Elections ranked below this index are not prioritized.
    pub fn prioritized_cutoff(&self) -> usize {
        (self.active_elections_size / 10).max(1)
    }
}

/// Amounts exceed the integer range of TOML, so they are written as
/// decimal strings of raw units.
mod raw_string {
    use lattice_types::Amount;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.number().to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse::<u128>().map(Amount::raw).map_err(de::Error::custom)
    }
}
