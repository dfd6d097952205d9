//! Account epochs. An epoch block upgrades an account, which changes the work
//! threshold its later blocks are measured against.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Epoch {
    #[default]
    Epoch0,
    Epoch1,
    Epoch2,
}

impl Epoch {
    pub fn is_epoch_2(&self) -> bool {
        *self >= Epoch::Epoch2
    }
}
