//! Per-network work thresholds.
//!
//! Accounts upgraded to epoch 2 are measured against `epoch_2` for sends and
//! changes and against the lower `epoch_2_receive` for receives, opens and
//! epoch blocks. Older accounts use `epoch_1` for everything.

use lattice_types::{Epoch, NetworkId};

use crate::difficulty::to_multiplier;

/// Simplified block kind for threshold selection.
///
/// Keeps this crate independent of the ledger's block types, which depend
/// on it. Call sites map from block sideband details.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkBlockKind {
    /// Send or representative change.
    Base,
    /// Receive or open.
    ReceiveOrOpen,
    /// Epoch upgrade.
    Epoch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkThresholds {
    pub epoch_1: u64,
    pub epoch_2: u64,
    pub epoch_2_receive: u64,
    /// Highest of the thresholds; multipliers are reported against it.
    pub base: u64,
    /// Lowest of the thresholds; anything below cannot be valid work.
    pub entry: u64,
}

impl WorkThresholds {
    pub const fn new(epoch_1: u64, epoch_2: u64, epoch_2_receive: u64) -> Self {
        let base = max(max(epoch_1, epoch_2), epoch_2_receive);
        let entry = min(min(epoch_1, epoch_2), epoch_2_receive);
        Self {
            epoch_1,
            epoch_2,
            epoch_2_receive,
            base,
            entry,
        }
    }

    pub const LIVE: Self = Self::new(0xffff_ffc0_0000_0000, 0xffff_fff8_0000_0000, 0xffff_fe00_0000_0000);

    pub const DEV: Self = Self::new(0xfe00_0000_0000_0000, 0xffc0_0000_0000_0000, 0xf000_0000_0000_0000);

    pub fn for_network(network: NetworkId) -> Self {
        match network {
            NetworkId::Live | NetworkId::Beta => Self::LIVE,
            NetworkId::Dev => Self::DEV,
        }
    }

    /// Threshold a block of `kind` in an account at `epoch` is measured against.
    pub fn threshold(&self, epoch: Epoch, kind: WorkBlockKind) -> u64 {
        if epoch.is_epoch_2() {
            match kind {
                WorkBlockKind::ReceiveOrOpen | WorkBlockKind::Epoch => self.epoch_2_receive,
                WorkBlockKind::Base => self.epoch_2,
            }
        } else {
            self.epoch_1
        }
    }

    /// Map a multiplier measured against `threshold` onto the epoch 2 send
    /// scale, so all live elections can be ranked together.
    pub fn normalized_multiplier(&self, multiplier: f64, threshold: u64) -> f64 {
        match self.normalization_ratio(threshold) {
            Some(ratio) => (multiplier + ratio - 1.0) / ratio,
            None => multiplier,
        }
    }

    /// Inverse of [`WorkThresholds::normalized_multiplier`].
    pub fn denormalized_multiplier(&self, multiplier: f64, threshold: u64) -> f64 {
        match self.normalization_ratio(threshold) {
            Some(ratio) => multiplier * ratio + 1.0 - ratio,
            None => multiplier,
        }
    }

    fn normalization_ratio(&self, threshold: u64) -> Option<f64> {
        if threshold == self.epoch_1 || threshold == self.epoch_2_receive {
            Some(to_multiplier(self.epoch_2, threshold))
        } else {
            None
        }
    }
}

const fn max(a: u64, b: u64) -> u64 {
    if a > b {
        a
    } else {
        b
    }
}

const fn min(a: u64, b: u64) -> u64 {
    if a < b {
        a
    } else {
        b
    }
}
