//! Signing authority and delegated grants.
//!
//! Direct keys are checked against the ordered tier table on `AccountKeys`;
//! anything else must be a live grant stored under `(account, signing key)`.

use std::sync::Arc;
use tracing::{debug, info};

use super::store::AccountStorage;
use super::types::{AccountId, GrantAllowance, GrantPubKey, Permission, PubKey};
use crate::coin::Coin;
use crate::error::{LedgerError, LedgerResult};
use crate::param::ParamProvider;
use crate::storage::Context;

pub struct AuthorityManager {
    params: Arc<dyn ParamProvider>,
    storage: AccountStorage,
}

impl AuthorityManager {
    pub fn new(params: Arc<dyn ParamProvider>) -> Self {
        Self { params, storage: AccountStorage::new() }
    }

    /// Identity acting for `account` when `signing_key` signs a message that
    /// needs `required`. Direct keys act as `account`; a grant acts as its
    /// grantee. Amount-limited grants only resolve when `amount` is given,
    /// and are debited by it.
    pub fn resolve(
        &self,
        ctx: &mut Context,
        account: &str,
        signing_key: &PubKey,
        required: Permission,
        amount: Option<Coin>,
    ) -> LedgerResult<AccountId> {
        let info = self.storage.get_info(ctx, account)?;

        if required == Permission::Master {
            if info.keys.master == *signing_key {
                return Ok(account.to_string());
            }
            return Err(LedgerError::AuthorityMismatch(format!("{} requires its master key", account)));
        }

        let direct = Permission::DESCENDING
            .into_iter()
            .take_while(|p| *p >= required)
            .any(|p| info.keys.key_for(p) == signing_key);
        if direct {
            return Ok(account.to_string());
        }
        if let Some(level) = info.keys.level_of(signing_key) {
            return Err(LedgerError::AuthorityMismatch(format!(
                "{} key of {} cannot authorize {}",
                level, account, required
            )));
        }

        let Some(mut grant) = self.storage.get_grant_pub_key(ctx, account, signing_key)? else {
            return Err(LedgerError::AuthorityMismatch(format!("unknown signing key for {}", account)));
        };
        if grant.expires_at < ctx.block_time {
            self.storage.delete_grant_pub_key(ctx, account, signing_key)?;
            debug!(grantor = account, grantee = %grant.username, "removed expired grant");
            return Err(LedgerError::GrantExpired(account.to_string()));
        }
        if grant.permission != required {
            return Err(LedgerError::GrantMismatch(format!(
                "{} holds {} from {}, {} required",
                grant.username, grant.permission, account, required
            )));
        }
        // the grantee may have rotated away from this key since the grant
        let grantee_info = self.storage.get_info(ctx, &grant.username)?;
        if grantee_info.keys.key_for(grant.permission) != signing_key {
            self.storage.delete_grant_pub_key(ctx, account, signing_key)?;
            debug!(grantor = account, grantee = %grant.username, "removed grant to replaced key");
            return Err(LedgerError::GrantMismatch(format!(
                "{} no longer owns the granted key",
                grant.username
            )));
        }

        let exhausted = match &mut grant.allowance {
            GrantAllowance::Unlimited => false,
            GrantAllowance::Times(left) => {
                if *left <= 0 {
                    return Err(LedgerError::GrantMismatch(format!("{} has no uses left", grant.username)));
                }
                *left -= 1;
                *left == 0
            }
            GrantAllowance::Amount(left) => {
                let Some(amount) = amount else {
                    return Err(LedgerError::GrantMismatch(format!(
                        "{} holds an amount-limited grant, an amount is required",
                        grant.username
                    )));
                };
                if amount.is_negative() {
                    return Err(LedgerError::InvalidArgument(format!("negative amount {}", amount)));
                }
                if amount > *left {
                    return Err(LedgerError::GrantAmountInsufficient {
                        left: left.to_string(),
                        requested: amount.to_string(),
                    });
                }
                *left = left.checked_minus(amount)?;
                left.is_zero()
            }
        };

        match grant.allowance {
            GrantAllowance::Unlimited => {}
            _ if exhausted => self.storage.delete_grant_pub_key(ctx, account, signing_key)?,
            _ => self.storage.set_grant_pub_key(ctx, account, signing_key, &grant)?,
        }
        Ok(grant.username)
    }

    /// Let `grantee` act for `grantor` at `permission` for `validity_sec`
    /// seconds, signing with the grantee's own key of that tier. Replaces any
    /// previous grant to the same key.
    pub fn authorize(
        &self,
        ctx: &mut Context,
        grantor: &str,
        grantee: &str,
        permission: Permission,
        validity_sec: i64,
        allowance: GrantAllowance,
    ) -> LedgerResult<()> {
        if !permission.is_grantable() {
            return Err(LedgerError::InvalidArgument(format!("{} permission cannot be granted", permission)));
        }
        let param = self.params.account_param()?;
        if validity_sec <= 0 || validity_sec > param.max_grant_validity_sec {
            return Err(LedgerError::InvalidArgument(format!(
                "grant validity {}s outside 1..={}",
                validity_sec, param.max_grant_validity_sec
            )));
        }
        match &allowance {
            GrantAllowance::Unlimited => {}
            GrantAllowance::Times(n) if *n >= 1 && *n <= param.max_grant_usage_times => {}
            GrantAllowance::Times(n) => {
                return Err(LedgerError::InvalidArgument(format!(
                    "grant usage times {} outside 1..={}",
                    n, param.max_grant_usage_times
                )))
            }
            GrantAllowance::Amount(c) if c.is_positive() => {}
            GrantAllowance::Amount(c) => {
                return Err(LedgerError::InvalidArgument(format!("grant amount {} must be positive", c)))
            }
        }
        if grantor == grantee {
            return Err(LedgerError::InvalidArgument(format!("{} cannot grant to itself", grantor)));
        }
        if !self.storage.does_account_exist(ctx, grantor)? {
            return Err(LedgerError::NotFound(format!("account {}", grantor)));
        }
        let grantee_info = self.storage.get_info(ctx, grantee)?;
        let grantee_key = *grantee_info.keys.key_for(permission);

        let expires_at = ctx
            .block_time
            .checked_add(validity_sec)
            .ok_or_else(|| LedgerError::InvalidArgument("grant expiry overflow".to_string()))?;
        let grant = GrantPubKey {
            username: grantee.to_string(),
            permission,
            created_at: ctx.block_time,
            expires_at,
            allowance,
        };
        self.storage.set_grant_pub_key(ctx, grantor, &grantee_key, &grant)?;
        info!(grantor, grantee, %permission, expires_at, "granted permission");
        Ok(())
    }

    /// Delete the grant stored under `pub_key`. Absent grants are a no-op.
    pub fn revoke(&self, ctx: &mut Context, grantor: &str, pub_key: &PubKey, permission: Permission) -> LedgerResult<()> {
        let Some(grant) = self.storage.get_grant_pub_key(ctx, grantor, pub_key)? else {
            return Ok(());
        };
        if grant.permission != permission {
            return Err(LedgerError::PermissionLevelMismatch(format!(
                "grant to {} is {}, not {}",
                grant.username, grant.permission, permission
            )));
        }
        self.storage.delete_grant_pub_key(ctx, grantor, pub_key)?;
        info!(grantor, grantee = %grant.username, %permission, "revoked permission");
        Ok(())
    }

    /// Delete every grant `grantor` issued to `grantee` at `permission`,
    /// whichever key it is stored under. No grants at all is a no-op.
    pub fn revoke_grantee(
        &self,
        ctx: &mut Context,
        grantor: &str,
        grantee: &str,
        permission: Permission,
    ) -> LedgerResult<()> {
        let issued: Vec<(PubKey, GrantPubKey)> = self
            .storage
            .get_grant_pub_keys(ctx, grantor)?
            .into_iter()
            .filter(|(_, grant)| grant.username == grantee)
            .collect();
        if issued.is_empty() {
            return Ok(());
        }
        let matching: Vec<&PubKey> = issued
            .iter()
            .filter(|(_, grant)| grant.permission == permission)
            .map(|(key, _)| key)
            .collect();
        if matching.is_empty() {
            return Err(LedgerError::PermissionLevelMismatch(format!(
                "{} holds no {} grant from {}",
                grantee, permission, grantor
            )));
        }
        for key in matching {
            self.storage.delete_grant_pub_key(ctx, grantor, key)?;
        }
        info!(grantor, grantee, %permission, "revoked permission");
        Ok(())
    }

    pub fn list_grants(&self, ctx: &Context, grantor: &str) -> LedgerResult<Vec<(PubKey, GrantPubKey)>> {
        self.storage.get_grant_pub_keys(ctx, grantor)
    }
}
