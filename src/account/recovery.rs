//! Account recovery: the master key holder replaces every key of the account

use tracing::info;

use super::manager::AccountManager;
use super::types::AccountKeys;
use crate::error::{LedgerError, LedgerResult};
use crate::storage::Context;

impl AccountManager {
    /// Replace all four keys of `username` and rebind its address to the new
    /// master key. Grants issued by the account are kept.
    pub fn recover_account(&self, ctx: &mut Context, username: &str, new_keys: AccountKeys) -> LedgerResult<()> {
        let mut info = self.storage.get_info(ctx, username)?;
        if info.keys == new_keys {
            return Err(LedgerError::InvalidArgument(format!("{} already uses these keys", username)));
        }
        info.address = Some(new_keys.master.address());
        info.keys = new_keys;
        self.storage.set_info(ctx, username, &info)?;
        info!(username, master = %new_keys.master, "account keys recovered");
        Ok(())
    }
}
