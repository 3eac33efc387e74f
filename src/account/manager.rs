//! Ledger facade: the only entry point other modules use to touch accounts.
//!
//! Every operation loads what it needs, computes the new state in memory and
//! writes back only after all checks have passed, so a rejected call leaves
//! the store untouched.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use super::balance::{push_frozen_money, record_detail};
use super::bandwidth::BandwidthController;
use super::auth::AuthorityManager;
use super::store::AccountStorage;
use super::types::{
    validate_memo, validate_username, AccountBank, AccountId, AccountInfo, AccountKeys, AccountMeta,
    BalanceHistory, Detail, DetailType, FrozenMoney, GrantAllowance, GrantPubKey, PendingStakeQueue, Permission,
    PubKey, Reward, MAX_JSON_META_LENGTH,
};
use super::vesting::StakeVestingEngine;
use crate::coin::Coin;
use crate::error::{LedgerError, LedgerResult};
use crate::param::ParamProvider;
use crate::storage::Context;

pub struct AccountManager {
    params: Arc<dyn ParamProvider>,
    pub(super) storage: AccountStorage,
    vesting: StakeVestingEngine,
    bandwidth: BandwidthController,
    authority: AuthorityManager,
}

/// Bank and vesting queue of one account, loaded together.
struct Holdings {
    bank: AccountBank,
    queue: PendingStakeQueue,
}

impl AccountManager {
    pub fn new(params: Arc<dyn ParamProvider>) -> Self {
        Self {
            vesting: StakeVestingEngine::new(params.clone()),
            bandwidth: BandwidthController::new(params.clone()),
            authority: AuthorityManager::new(params.clone()),
            storage: AccountStorage::new(),
            params,
        }
    }

    pub fn does_account_exist(&self, ctx: &Context, username: &str) -> LedgerResult<bool> {
        self.storage.does_account_exist(ctx, username)
    }

    fn load_holdings(&self, ctx: &Context, username: &str) -> LedgerResult<Holdings> {
        Ok(Holdings {
            bank: self.storage.get_bank(ctx, username)?,
            queue: self.storage.get_pending_stake_queue(ctx, username)?,
        })
    }

    fn save_holdings(&self, ctx: &mut Context, username: &str, holdings: &Holdings) -> LedgerResult<()> {
        self.storage.set_pending_stake_queue(ctx, username, &holdings.queue)?;
        self.storage.set_bank(ctx, username, &holdings.bank)
    }

    fn history_row(
        ctx: &Context,
        detail_type: DetailType,
        from: &str,
        to: &str,
        amount: Coin,
        memo: &str,
    ) -> Detail {
        Detail {
            detail_type,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            created_at: ctx.block_time,
            memo: memo.to_string(),
        }
    }

    /// Register `username`. Up to `first_deposit_full_stake_limit` of the
    /// deposit counts as stake at once; the rest vests normally.
    pub fn create_account(
        &self,
        ctx: &mut Context,
        username: &str,
        keys: AccountKeys,
        initial_deposit: Coin,
    ) -> LedgerResult<()> {
        validate_username(username)?;
        if self.storage.does_account_exist(ctx, username)? {
            return Err(LedgerError::AccountAlreadyExists(username.to_string()));
        }
        let param = self.params.account_param()?;
        if initial_deposit.is_negative() {
            return Err(LedgerError::InvalidArgument(format!("negative deposit {}", initial_deposit)));
        }
        if initial_deposit < param.register_fee {
            return Err(LedgerError::InsufficientBalance(format!(
                "deposit {} below register fee {}",
                initial_deposit, param.register_fee
            )));
        }

        let now = ctx.block_time;
        let full_stake = initial_deposit.min(param.first_deposit_full_stake_limit.max(Coin::zero()));
        let vesting = initial_deposit.checked_minus(full_stake)?;
        let mut holdings = Holdings { bank: AccountBank::default(), queue: PendingStakeQueue::new(now) };
        self.vesting.deposit_fully_vested(&mut holdings.bank, full_stake)?;
        self.vesting.deposit(&mut holdings.queue, &mut holdings.bank, vesting, now)?;

        let info = AccountInfo {
            username: username.to_string(),
            created_at: now,
            address: Some(keys.master.address()),
            keys,
        };
        let meta = AccountMeta {
            last_activity_at: now,
            last_report_or_upvote_at: now,
            transaction_capacity: full_stake,
            ..Default::default()
        };

        self.storage.set_info(ctx, username, &info)?;
        self.storage.set_meta(ctx, username, &meta)?;
        self.storage.set_reward(ctx, username, &Reward::default())?;
        for (amount, memo) in [(full_stake, "register"), (vesting, "register deposit")] {
            if amount.is_positive() {
                let row = Self::history_row(ctx, DetailType::TransferIn, "", username, amount, memo);
                record_detail(&self.storage, ctx, username, &mut holdings.bank, row, param.balance_history_bundle_size)?;
            }
        }
        self.save_holdings(ctx, username, &holdings)?;
        info!(username, deposit = %initial_deposit, stake = %full_stake, "account created");
        Ok(())
    }

    /// Credit `amount` to `username`'s saving; it vests into stake over the
    /// configured window.
    pub fn add_coin(
        &self,
        ctx: &mut Context,
        username: &str,
        amount: Coin,
        from: &str,
        memo: &str,
        detail_type: DetailType,
    ) -> LedgerResult<()> {
        validate_memo(memo)?;
        let bundle_size = self.params.account_param()?.balance_history_bundle_size;
        let mut holdings = self.load_holdings(ctx, username)?;
        self.vesting.deposit(&mut holdings.queue, &mut holdings.bank, amount, ctx.block_time)?;
        if amount.is_positive() {
            let row = Self::history_row(ctx, detail_type, from, username, amount, memo);
            record_detail(&self.storage, ctx, username, &mut holdings.bank, row, bundle_size)?;
        }
        self.save_holdings(ctx, username, &holdings)
    }

    /// Debit `amount` from `username`'s saving, newest deposits first.
    pub fn remove_coin(
        &self,
        ctx: &mut Context,
        username: &str,
        amount: Coin,
        to: &str,
        memo: &str,
        detail_type: DetailType,
    ) -> LedgerResult<()> {
        validate_memo(memo)?;
        let param = self.params.account_param()?;
        let mut holdings = self.load_holdings(ctx, username)?;
        self.vesting.withdraw(
            &mut holdings.queue,
            &mut holdings.bank,
            amount,
            ctx.block_time,
            param.minimum_balance,
        )?;
        if amount.is_positive() {
            let row = Self::history_row(ctx, detail_type, username, to, amount, memo);
            record_detail(&self.storage, ctx, username, &mut holdings.bank, row, param.balance_history_bundle_size)?;
        }
        self.save_holdings(ctx, username, &holdings)
    }

    /// Debit `amount` spending fully vested stake first. Returns the stake
    /// given up.
    pub fn remove_coin_with_full_stake(
        &self,
        ctx: &mut Context,
        username: &str,
        amount: Coin,
        to: &str,
        memo: &str,
        detail_type: DetailType,
    ) -> LedgerResult<Coin> {
        validate_memo(memo)?;
        let param = self.params.account_param()?;
        let mut holdings = self.load_holdings(ctx, username)?;
        let stake_lost = self.vesting.withdraw_vested_first(
            &mut holdings.queue,
            &mut holdings.bank,
            amount,
            ctx.block_time,
            param.minimum_balance,
        )?;
        if amount.is_positive() {
            let row = Self::history_row(ctx, detail_type, username, to, amount, memo);
            record_detail(&self.storage, ctx, username, &mut holdings.bank, row, param.balance_history_bundle_size)?;
        }
        self.save_holdings(ctx, username, &holdings)?;
        Ok(stake_lost)
    }

    pub fn transfer(&self, ctx: &mut Context, from: &str, to: &str, amount: Coin, memo: &str) -> LedgerResult<()> {
        validate_memo(memo)?;
        if from == to {
            return Err(LedgerError::InvalidArgument(format!("{} cannot transfer to itself", from)));
        }
        if !amount.is_positive() {
            return Err(LedgerError::InvalidArgument(format!("transfer amount {} must be positive", amount)));
        }
        let param = self.params.account_param()?;
        let mut receiver = self.load_holdings(ctx, to)?;
        let mut sender = self.load_holdings(ctx, from)?;
        let now = ctx.block_time;

        self.vesting
            .withdraw(&mut sender.queue, &mut sender.bank, amount, now, param.minimum_balance)?;
        self.vesting.deposit(&mut receiver.queue, &mut receiver.bank, amount, now)?;

        let out_row = Self::history_row(ctx, DetailType::TransferOut, from, to, amount, memo);
        record_detail(&self.storage, ctx, from, &mut sender.bank, out_row, param.balance_history_bundle_size)?;
        let in_row = Self::history_row(ctx, DetailType::TransferIn, from, to, amount, memo);
        record_detail(&self.storage, ctx, to, &mut receiver.bank, in_row, param.balance_history_bundle_size)?;
        self.save_holdings(ctx, from, &sender)?;
        self.save_holdings(ctx, to, &receiver)?;
        debug!(from, to, amount = %amount, "transfer");
        Ok(())
    }

    /// Current stake of `username`. The recompute is not persisted.
    pub fn get_stake(&self, ctx: &Context, username: &str) -> LedgerResult<Coin> {
        let mut holdings = self.load_holdings(ctx, username)?;
        self.vesting
            .current_stake(&mut holdings.queue, &mut holdings.bank, ctx.block_time)
    }

    /// Charge one transaction of weight `cost_ratio` against `username`'s
    /// bandwidth.
    pub fn check_bandwidth(&self, ctx: &mut Context, username: &str, cost_ratio: Decimal) -> LedgerResult<()> {
        let mut meta = self.storage.get_meta(ctx, username)?;
        let stake = self.get_stake(ctx, username)?;
        self.bandwidth
            .check_and_consume(username, &mut meta, stake, cost_ratio, ctx.block_time)?;
        self.storage.set_meta(ctx, username, &meta)
    }

    pub fn authorize_permission(
        &self,
        ctx: &mut Context,
        grantor: &str,
        grantee: &str,
        permission: Permission,
        validity_sec: i64,
        allowance: GrantAllowance,
    ) -> LedgerResult<()> {
        self.authority
            .authorize(ctx, grantor, grantee, permission, validity_sec, allowance)
    }

    /// Revoke the `permission` grant held by `grantee`, under whichever key
    /// it was issued.
    pub fn revoke_permission(
        &self,
        ctx: &mut Context,
        grantor: &str,
        grantee: &str,
        permission: Permission,
    ) -> LedgerResult<()> {
        self.authority.revoke_grantee(ctx, grantor, grantee, permission)
    }

    /// Revoke the grant stored under one specific key.
    pub fn revoke_grant_key(
        &self,
        ctx: &mut Context,
        grantor: &str,
        pub_key: &PubKey,
        permission: Permission,
    ) -> LedgerResult<()> {
        self.authority.revoke(ctx, grantor, pub_key, permission)
    }

    /// Amount-limited grants do not resolve here; payments go through
    /// [`resolve_signer_with_amount`](Self::resolve_signer_with_amount).
    pub fn resolve_signer(
        &self,
        ctx: &mut Context,
        account: &str,
        signing_key: &PubKey,
        permission: Permission,
    ) -> LedgerResult<AccountId> {
        self.authority
            .resolve(ctx, account, signing_key, permission, None)
    }

    /// Like [`resolve_signer`](Self::resolve_signer), debiting `amount` from
    /// an amount-limited grant.
    pub fn resolve_signer_with_amount(
        &self,
        ctx: &mut Context,
        account: &str,
        signing_key: &PubKey,
        permission: Permission,
        amount: Coin,
    ) -> LedgerResult<AccountId> {
        self.authority
            .resolve(ctx, account, signing_key, permission, Some(amount))
    }

    pub fn list_grants(&self, ctx: &Context, grantor: &str) -> LedgerResult<Vec<(PubKey, GrantPubKey)>> {
        self.authority.list_grants(ctx, grantor)
    }

    fn update_meta<F>(&self, ctx: &mut Context, username: &str, update: F) -> LedgerResult<()>
    where
        F: FnOnce(&mut AccountMeta) -> LedgerResult<()>,
    {
        let mut meta = self.storage.get_meta(ctx, username)?;
        update(&mut meta)?;
        self.storage.set_meta(ctx, username, &meta)
    }

    pub fn increase_sequence_by_one(&self, ctx: &mut Context, username: &str) -> LedgerResult<()> {
        self.update_meta(ctx, username, |meta| {
            meta.sequence = meta
                .sequence
                .checked_add(1)
                .ok_or_else(|| LedgerError::InvalidArgument("sequence overflow".to_string()))?;
            Ok(())
        })
    }

    pub fn update_json_meta(&self, ctx: &mut Context, username: &str, json_meta: &str) -> LedgerResult<()> {
        if json_meta.chars().count() > MAX_JSON_META_LENGTH {
            return Err(LedgerError::InvalidArgument(format!(
                "json meta longer than {} characters",
                MAX_JSON_META_LENGTH
            )));
        }
        self.update_meta(ctx, username, |meta| {
            meta.json_meta = json_meta.to_string();
            Ok(())
        })
    }

    pub fn update_last_report_or_upvote_at(&self, ctx: &mut Context, username: &str) -> LedgerResult<()> {
        let now = ctx.block_time;
        self.update_meta(ctx, username, |meta| {
            meta.last_report_or_upvote_at = now;
            Ok(())
        })
    }

    pub fn update_last_post_at(&self, ctx: &mut Context, username: &str) -> LedgerResult<()> {
        let now = ctx.block_time;
        self.update_meta(ctx, username, |meta| {
            meta.last_post_at = now;
            Ok(())
        })
    }

    /// Schedule `times` installments of `amount`, one every `interval`
    /// seconds from `start_at`.
    pub fn add_frozen_money(
        &self,
        ctx: &mut Context,
        username: &str,
        amount: Coin,
        start_at: i64,
        interval: i64,
        times: i64,
    ) -> LedgerResult<()> {
        let max_len = self.params.account_param()?.max_num_frozen_money;
        let mut bank = self.storage.get_bank(ctx, username)?;
        let frozen = FrozenMoney { amount, start_at, interval, times };
        push_frozen_money(&mut bank, username, frozen, ctx.block_time, max_len)?;
        self.storage.set_bank(ctx, username, &bank)
    }

    /// Book content income: `friction` as original and friction income,
    /// `actual_reward` as inflation income waiting to be claimed.
    pub fn add_income_and_reward(
        &self,
        ctx: &mut Context,
        username: &str,
        friction: Coin,
        actual_reward: Coin,
    ) -> LedgerResult<()> {
        if friction.is_negative() || actual_reward.is_negative() {
            return Err(LedgerError::InvalidArgument("negative income".to_string()));
        }
        let mut reward = self.storage.get_reward(ctx, username)?;
        reward.total_income = reward.total_income.checked_plus(actual_reward)?;
        reward.original_income = reward.original_income.checked_plus(friction)?;
        reward.friction_income = reward.friction_income.checked_plus(friction)?;
        reward.inflation_income = reward.inflation_income.checked_plus(actual_reward)?;
        reward.unclaim_reward = reward.unclaim_reward.checked_plus(actual_reward)?;

        let mut bank = self.storage.get_bank(ctx, username)?;
        bank.num_of_reward = bank
            .num_of_reward
            .checked_add(1)
            .ok_or_else(|| LedgerError::InvalidArgument(format!("reward counter overflow for {}", username)))?;
        self.storage.set_reward(ctx, username, &reward)?;
        self.storage.set_bank(ctx, username, &bank)
    }

    pub fn add_direct_deposit(&self, ctx: &mut Context, username: &str, deposit: Coin) -> LedgerResult<()> {
        if deposit.is_negative() {
            return Err(LedgerError::InvalidArgument(format!("negative deposit {}", deposit)));
        }
        let mut reward = self.storage.get_reward(ctx, username)?;
        reward.total_income = reward.total_income.checked_plus(deposit)?;
        reward.original_income = reward.original_income.checked_plus(deposit)?;
        self.storage.set_reward(ctx, username, &reward)
    }

    /// Move the unclaimed reward into saving as a vesting deposit.
    pub fn claim_reward(&self, ctx: &mut Context, username: &str) -> LedgerResult<Coin> {
        let mut reward = self.storage.get_reward(ctx, username)?;
        let claimed = reward.unclaim_reward;
        self.add_coin(ctx, username, claimed, "", "", DetailType::ClaimReward)?;
        reward.unclaim_reward = Coin::zero();
        self.storage.set_reward(ctx, username, &reward)?;
        debug!(username, claimed = %claimed, "reward claimed");
        Ok(claimed)
    }

    pub fn get_balance_history(&self, ctx: &Context, username: &str, bucket: u64) -> LedgerResult<BalanceHistory> {
        self.storage.get_balance_history(ctx, username, bucket)
    }

    pub fn get_info(&self, ctx: &Context, username: &str) -> LedgerResult<AccountInfo> {
        self.storage.get_info(ctx, username)
    }

    pub fn get_bank(&self, ctx: &Context, username: &str) -> LedgerResult<AccountBank> {
        self.storage.get_bank(ctx, username)
    }

    pub fn get_meta(&self, ctx: &Context, username: &str) -> LedgerResult<AccountMeta> {
        self.storage.get_meta(ctx, username)
    }

    pub fn get_reward(&self, ctx: &Context, username: &str) -> LedgerResult<Reward> {
        self.storage.get_reward(ctx, username)
    }

    pub fn get_pending_stake_queue(&self, ctx: &Context, username: &str) -> LedgerResult<PendingStakeQueue> {
        self.storage.get_pending_stake_queue(ctx, username)
    }

    pub fn list_accounts(&self, ctx: &Context) -> LedgerResult<Vec<AccountId>> {
        self.storage.list_usernames(ctx)
    }
}
