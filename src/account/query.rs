//! Read-only query dispatch. Paths look like `bank/alice` or
//! `history/alice/0`; answers are JSON.

use serde::Serialize;

use super::manager::AccountManager;
use super::types::{AccountId, GrantPubKey};
use crate::coin::Coin;
use crate::error::{LedgerError, LedgerResult};
use crate::storage::Context;

#[derive(Serialize)]
struct GrantView {
    pub_key: String,
    #[serde(flatten)]
    grant: GrantPubKey,
}

#[derive(Serialize)]
struct StakeView {
    username: AccountId,
    stake: Coin,
    at: i64,
}

pub fn query(manager: &AccountManager, ctx: &Context, path: &str) -> LedgerResult<Vec<u8>> {
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
    let bytes = match parts.as_slice() {
        ["list"] => serde_json::to_vec(&manager.list_accounts(ctx)?)?,
        ["info", user] => serde_json::to_vec(&manager.get_info(ctx, user)?)?,
        ["bank", user] => serde_json::to_vec(&manager.get_bank(ctx, user)?)?,
        ["meta", user] => serde_json::to_vec(&manager.get_meta(ctx, user)?)?,
        ["queue", user] => serde_json::to_vec(&manager.get_pending_stake_queue(ctx, user)?)?,
        ["reward", user] => serde_json::to_vec(&manager.get_reward(ctx, user)?)?,
        ["stake", user] => serde_json::to_vec(&StakeView {
            username: user.to_string(),
            stake: manager.get_stake(ctx, user)?,
            at: ctx.block_time,
        })?,
        ["grants", user] => {
            let grants: Vec<GrantView> = manager
                .list_grants(ctx, user)?
                .into_iter()
                .map(|(key, grant)| GrantView { pub_key: key.to_hex(), grant })
                .collect();
            serde_json::to_vec(&grants)?
        }
        ["history", user, bucket] => {
            let bucket: u64 = bucket
                .parse()
                .map_err(|_| LedgerError::InvalidArgument(format!("invalid history bucket '{}'", bucket)))?;
            serde_json::to_vec(&manager.get_balance_history(ctx, user, bucket)?)?
        }
        _ => return Err(LedgerError::InvalidArgument(format!("unknown query path '{}'", path))),
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::test_utils::{keys, manager, plain_params};
    use crate::account::types::{GrantAllowance, Permission};
    use crate::storage::MemStore;
    use serde_json::Value;

    #[test]
    fn test_query_paths() {
        let mut store = MemStore::new();
        let mgr = manager(plain_params());
        {
            let mut ctx = Context::new(&mut store, 0, 1);
            mgr.create_account(&mut ctx, "alice", keys(1), Coin::new(1_000)).unwrap();
            mgr.create_account(&mut ctx, "bob", keys(2), Coin::zero()).unwrap();
            mgr.authorize_permission(&mut ctx, "alice", "bob", Permission::Post, 60, GrantAllowance::Unlimited)
                .unwrap();
        }
        let snapshot = store.clone();
        let ctx = Context::new(&mut store, 604_800, 2);

        let list: Value = serde_json::from_slice(&query(&mgr, &ctx, "list").unwrap()).unwrap();
        assert_eq!(list, serde_json::json!(["alice", "bob"]));

        let stake: Value = serde_json::from_slice(&query(&mgr, &ctx, "/stake/alice").unwrap()).unwrap();
        assert_eq!(stake["stake"], 1_000);

        let grants: Value = serde_json::from_slice(&query(&mgr, &ctx, "grants/alice").unwrap()).unwrap();
        assert_eq!(grants[0]["username"], "bob");
        assert_eq!(grants[0]["pub_key"], keys(2).post.to_hex());

        let history: Value = serde_json::from_slice(&query(&mgr, &ctx, "history/alice/0").unwrap()).unwrap();
        assert_eq!(history["details"].as_array().unwrap().len(), 1);

        assert!(matches!(query(&mgr, &ctx, "bank/ghost"), Err(LedgerError::NotFound(_))));
        assert!(matches!(query(&mgr, &ctx, "history/alice/x"), Err(LedgerError::InvalidArgument(_))));
        assert!(matches!(query(&mgr, &ctx, "nope"), Err(LedgerError::InvalidArgument(_))));
        drop(ctx);
        assert_eq!(store.len(), snapshot.len());
    }
}
