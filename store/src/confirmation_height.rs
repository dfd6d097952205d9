//! Confirmation height storage trait.

use crate::StoreError;
use lattice_types::{Account, ConfirmationHeightInfo};

/// Per-account cementing boundary. Only the confirmation height processor
/// writes here, and only while it holds the confirmation-height writer role.
pub trait ConfirmationHeightStore {
    fn get_confirmation_height(
        &self,
        account: &Account,
    ) -> Result<ConfirmationHeightInfo, StoreError>;
    fn put_confirmation_height(
        &self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError>;
    fn delete_confirmation_height(&self, account: &Account) -> Result<(), StoreError>;
    fn confirmation_height_count(&self) -> Result<u64, StoreError>;
    fn iter_confirmation_heights(
        &self,
    ) -> Result<Vec<(Account, ConfirmationHeightInfo)>, StoreError>;
}
