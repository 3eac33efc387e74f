//! Balance history buckets and frozen-money schedules

use super::store::AccountStorage;
use super::types::{AccountBank, Detail, FrozenMoney};
use crate::error::{LedgerError, LedgerResult};
use crate::storage::Context;

/// Bucket a history row lands in, given the number of rows written so far.
pub fn history_bucket(num_of_tx: i64, bundle_size: i64) -> LedgerResult<u64> {
    if bundle_size <= 0 || num_of_tx < 0 {
        return Err(LedgerError::Config(format!(
            "cannot bucket tx {} with bundle size {}",
            num_of_tx, bundle_size
        )));
    }
    Ok((num_of_tx / bundle_size) as u64)
}

/// Append `detail` to the owner's current bucket and advance `num_of_tx`.
/// The bank itself is saved by the caller.
pub fn record_detail(
    storage: &AccountStorage,
    ctx: &mut Context,
    me: &str,
    bank: &mut AccountBank,
    detail: Detail,
    bundle_size: i64,
) -> LedgerResult<()> {
    let bucket = history_bucket(bank.num_of_tx, bundle_size)?;
    let next = bank
        .num_of_tx
        .checked_add(1)
        .ok_or_else(|| LedgerError::InvalidArgument(format!("transaction counter overflow for {}", me)))?;
    let mut history = storage.get_balance_history(ctx, me, bucket)?;
    history.details.push(detail);
    storage.set_balance_history(ctx, me, bucket, &history)?;
    bank.num_of_tx = next;
    Ok(())
}

/// Drop schedules whose last installment is already behind `now`.
pub fn prune_expired_frozen_money(bank: &mut AccountBank, now: i64) {
    bank.frozen_money_list.retain(|frozen| !frozen.is_expired(now));
}

pub fn push_frozen_money(
    bank: &mut AccountBank,
    me: &str,
    frozen: FrozenMoney,
    now: i64,
    max_len: usize,
) -> LedgerResult<()> {
    if frozen.amount.is_negative() || frozen.interval < 0 || frozen.times < 0 {
        return Err(LedgerError::InvalidArgument(format!(
            "malformed frozen money schedule {:?}",
            frozen
        )));
    }
    prune_expired_frozen_money(bank, now);
    if bank.frozen_money_list.len() >= max_len {
        return Err(LedgerError::FrozenMoneyListTooLong(me.to_string()));
    }
    bank.frozen_money_list.push(frozen);
    Ok(())
}
