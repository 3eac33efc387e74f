//! Account tables over the key-value store

use serde::{Deserialize, Serialize};

use super::types::{
    AccountBank, AccountId, AccountInfo, AccountMeta, BalanceHistory, GrantPubKey, PendingStakeQueue, PubKey,
    Reward,
};
use crate::error::{LedgerError, LedgerResult};
use crate::storage::{get_value, put_value, Context};

const ACCOUNT_INFO_SUBSTORE: u8 = 0x00;
const ACCOUNT_BANK_SUBSTORE: u8 = 0x01;
const ACCOUNT_META_SUBSTORE: u8 = 0x02;
const ACCOUNT_REWARD_SUBSTORE: u8 = 0x03;
const ACCOUNT_PENDING_STAKE_QUEUE_SUBSTORE: u8 = 0x04;
const ACCOUNT_GRANT_PUB_KEY_SUBSTORE: u8 = 0x05;
const ACCOUNT_BALANCE_HISTORY_SUBSTORE: u8 = 0x06;

const KEY_SEPARATOR: u8 = b'/';

fn account_key(prefix: u8, me: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + me.len());
    key.push(prefix);
    key.extend_from_slice(me.as_bytes());
    key
}

pub fn account_info_key(me: &str) -> Vec<u8> {
    account_key(ACCOUNT_INFO_SUBSTORE, me)
}

pub fn account_bank_key(me: &str) -> Vec<u8> {
    account_key(ACCOUNT_BANK_SUBSTORE, me)
}

pub fn account_meta_key(me: &str) -> Vec<u8> {
    account_key(ACCOUNT_META_SUBSTORE, me)
}

pub fn account_reward_key(me: &str) -> Vec<u8> {
    account_key(ACCOUNT_REWARD_SUBSTORE, me)
}

pub fn pending_stake_queue_key(me: &str) -> Vec<u8> {
    account_key(ACCOUNT_PENDING_STAKE_QUEUE_SUBSTORE, me)
}

fn grant_pub_key_prefix(me: &str) -> Vec<u8> {
    let mut key = account_key(ACCOUNT_GRANT_PUB_KEY_SUBSTORE, me);
    key.push(KEY_SEPARATOR);
    key
}

pub fn grant_pub_key_key(me: &str, pub_key: &PubKey) -> Vec<u8> {
    let mut key = grant_pub_key_prefix(me);
    key.extend_from_slice(pub_key.as_bytes());
    key
}

pub fn balance_history_key(me: &str, bucket: u64) -> Vec<u8> {
    let mut key = account_key(ACCOUNT_BALANCE_HISTORY_SUBSTORE, me);
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(&bucket.to_be_bytes());
    key
}

/// Typed access to every account table. Stateless: all state lives in the
/// store carried by the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountStorage;

impl AccountStorage {
    pub fn new() -> Self {
        AccountStorage
    }

    fn load<T: for<'a> Deserialize<'a>>(&self, ctx: &Context, key: &[u8], what: &str, me: &str) -> LedgerResult<T> {
        get_value(ctx.store(), key)?.ok_or_else(|| LedgerError::NotFound(format!("{} of {}", what, me)))
    }

    fn save<T: Serialize>(&self, ctx: &mut Context, key: &[u8], value: &T) -> LedgerResult<()> {
        put_value(ctx.store_mut(), key, value)
    }

    pub fn does_account_exist(&self, ctx: &Context, me: &str) -> LedgerResult<bool> {
        ctx.store().has(&account_info_key(me))
    }

    pub fn get_info(&self, ctx: &Context, me: &str) -> LedgerResult<AccountInfo> {
        self.load(ctx, &account_info_key(me), "account info", me)
    }

    pub fn set_info(&self, ctx: &mut Context, me: &str, info: &AccountInfo) -> LedgerResult<()> {
        self.save(ctx, &account_info_key(me), info)
    }

    pub fn get_bank(&self, ctx: &Context, me: &str) -> LedgerResult<AccountBank> {
        self.load(ctx, &account_bank_key(me), "account bank", me)
    }

    pub fn set_bank(&self, ctx: &mut Context, me: &str, bank: &AccountBank) -> LedgerResult<()> {
        self.save(ctx, &account_bank_key(me), bank)
    }

    pub fn get_meta(&self, ctx: &Context, me: &str) -> LedgerResult<AccountMeta> {
        self.load(ctx, &account_meta_key(me), "account meta", me)
    }

    pub fn set_meta(&self, ctx: &mut Context, me: &str, meta: &AccountMeta) -> LedgerResult<()> {
        self.save(ctx, &account_meta_key(me), meta)
    }

    pub fn get_reward(&self, ctx: &Context, me: &str) -> LedgerResult<Reward> {
        self.load(ctx, &account_reward_key(me), "reward", me)
    }

    pub fn set_reward(&self, ctx: &mut Context, me: &str, reward: &Reward) -> LedgerResult<()> {
        self.save(ctx, &account_reward_key(me), reward)
    }

    pub fn get_pending_stake_queue(&self, ctx: &Context, me: &str) -> LedgerResult<PendingStakeQueue> {
        self.load(ctx, &pending_stake_queue_key(me), "pending stake queue", me)
    }

    pub fn set_pending_stake_queue(&self, ctx: &mut Context, me: &str, queue: &PendingStakeQueue) -> LedgerResult<()> {
        self.save(ctx, &pending_stake_queue_key(me), queue)
    }

    pub fn get_grant_pub_key(&self, ctx: &Context, me: &str, pub_key: &PubKey) -> LedgerResult<Option<GrantPubKey>> {
        get_value(ctx.store(), &grant_pub_key_key(me, pub_key))
    }

    pub fn set_grant_pub_key(
        &self,
        ctx: &mut Context,
        me: &str,
        pub_key: &PubKey,
        grant: &GrantPubKey,
    ) -> LedgerResult<()> {
        self.save(ctx, &grant_pub_key_key(me, pub_key), grant)
    }

    pub fn delete_grant_pub_key(&self, ctx: &mut Context, me: &str, pub_key: &PubKey) -> LedgerResult<()> {
        ctx.store_mut().delete(&grant_pub_key_key(me, pub_key))
    }

    /// All grants issued by `me`, ordered by grantee key.
    pub fn get_grant_pub_keys(&self, ctx: &Context, me: &str) -> LedgerResult<Vec<(PubKey, GrantPubKey)>> {
        let prefix = grant_pub_key_prefix(me);
        let mut grants = Vec::new();
        for (key, value) in ctx.store().scan_prefix(&prefix)? {
            let raw: [u8; 32] = key[prefix.len()..]
                .try_into()
                .map_err(|_| LedgerError::Serialization(format!("malformed grant key for {}", me)))?;
            let grant: GrantPubKey = bincode::deserialize(&value)?;
            grants.push((PubKey::from_bytes(raw)?, grant));
        }
        Ok(grants)
    }

    /// Missing buckets read as empty.
    pub fn get_balance_history(&self, ctx: &Context, me: &str, bucket: u64) -> LedgerResult<BalanceHistory> {
        Ok(get_value(ctx.store(), &balance_history_key(me, bucket))?.unwrap_or_default())
    }

    pub fn set_balance_history(
        &self,
        ctx: &mut Context,
        me: &str,
        bucket: u64,
        history: &BalanceHistory,
    ) -> LedgerResult<()> {
        self.save(ctx, &balance_history_key(me, bucket), history)
    }

    /// Every registered username, in key order.
    pub fn list_usernames(&self, ctx: &Context) -> LedgerResult<Vec<AccountId>> {
        ctx.store()
            .scan_prefix(&[ACCOUNT_INFO_SUBSTORE])?
            .into_iter()
            .map(|(key, _)| {
                String::from_utf8(key[1..].to_vec())
                    .map_err(|e| LedgerError::Serialization(format!("malformed username key: {}", e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::test_utils::{key, keys};
    use crate::account::types::{GrantAllowance, Permission};
    use crate::coin::Coin;
    use crate::storage::MemStore;

    #[test]
    fn test_info_roundtrip_and_missing() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, 0, 1);
        let storage = AccountStorage::new();

        assert!(!storage.does_account_exist(&ctx, "alice").unwrap());
        assert!(matches!(storage.get_info(&ctx, "alice"), Err(LedgerError::NotFound(_))));

        let info = AccountInfo { username: "alice".into(), created_at: 5, keys: keys(1), address: None };
        storage.set_info(&mut ctx, "alice", &info).unwrap();
        assert!(storage.does_account_exist(&ctx, "alice").unwrap());
        assert_eq!(storage.get_info(&ctx, "alice").unwrap(), info);
    }

    #[test]
    fn test_corrupt_bytes_are_serialization_errors() {
        let mut store = MemStore::new();
        crate::storage::KvStore::set(&mut store, &account_bank_key("alice"), vec![1, 2]).unwrap();
        let ctx = Context::new(&mut store, 0, 1);
        assert!(matches!(AccountStorage::new().get_bank(&ctx, "alice"), Err(LedgerError::Serialization(_))));
    }

    #[test]
    fn test_grant_scan_is_scoped_to_grantor() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, 0, 1);
        let storage = AccountStorage::new();
        let grant = GrantPubKey {
            username: "app".into(),
            permission: Permission::Post,
            created_at: 0,
            expires_at: 10,
            allowance: GrantAllowance::Times(3),
        };
        storage.set_grant_pub_key(&mut ctx, "ann", &key(1), &grant).unwrap();
        storage.set_grant_pub_key(&mut ctx, "ann", &key(2), &grant).unwrap();
        storage.set_grant_pub_key(&mut ctx, "anna", &key(3), &grant).unwrap();

        let grants = storage.get_grant_pub_keys(&ctx, "ann").unwrap();
        assert_eq!(grants.len(), 2);

        storage.delete_grant_pub_key(&mut ctx, "ann", &key(1)).unwrap();
        assert!(storage.get_grant_pub_key(&ctx, "ann", &key(1)).unwrap().is_none());
        assert!(storage.get_grant_pub_key(&ctx, "ann", &key(2)).unwrap().is_some());
    }

    #[test]
    fn test_balance_history_buckets_default_empty() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, 0, 1);
        let storage = AccountStorage::new();
        assert!(storage.get_balance_history(&ctx, "bob", 0).unwrap().details.is_empty());

        let mut history = BalanceHistory::default();
        history.details.push(crate::account::types::Detail {
            detail_type: crate::account::types::DetailType::TransferIn,
            from: "alice".into(),
            to: "bob".into(),
            amount: Coin::new(3),
            created_at: 0,
            memo: String::new(),
        });
        storage.set_balance_history(&mut ctx, "bob", 1, &history).unwrap();
        assert_eq!(storage.get_balance_history(&ctx, "bob", 1).unwrap(), history);
        assert!(storage.get_balance_history(&ctx, "bob", 0).unwrap().details.is_empty());
    }

    #[test]
    fn test_list_usernames() {
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, 0, 1);
        let storage = AccountStorage::new();
        for name in ["carol", "alice", "bob"] {
            let info = AccountInfo { username: name.into(), created_at: 0, keys: keys(1), address: None };
            storage.set_info(&mut ctx, name, &info).unwrap();
        }
        assert_eq!(storage.list_usernames(&ctx).unwrap(), vec!["alice", "bob", "carol"]);
    }
}
