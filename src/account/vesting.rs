//! Stake vesting: deposits turn into stake linearly over a fixed window.
//!
//! Every deposit enters the pending queue as `{start, start + T, coin}`. The
//! queue keeps one exact accumulator, `stake_coin_in_queue`, advanced by
//! `elapsed / T * total_coin` on each recompute instead of walking every
//! entry. Entries that reach their end time are flushed into
//! `AccountBank::stake` from the front; withdrawals consume the newest
//! (least vested) entries from the back.

use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{AccountBank, PendingStake, PendingStakeQueue};
use crate::coin::{Coin, StakeRatio};
use crate::error::{LedgerError, LedgerResult};
use crate::param::ParamProvider;

pub struct StakeVestingEngine {
    params: Arc<dyn ParamProvider>,
}

impl StakeVestingEngine {
    pub fn new(params: Arc<dyn ParamProvider>) -> Self {
        Self { params }
    }

    fn vesting_window(&self) -> LedgerResult<i64> {
        let window = self.params.stake_param()?.seconds_to_recover_stake;
        if window <= 0 {
            return Err(LedgerError::Config(format!("invalid stake vesting window {}", window)));
        }
        Ok(window)
    }

    /// Bring the queue up to `now`: flush fully vested entries into
    /// `bank.stake` and accrue the rest. Time never moves backwards; an
    /// earlier `now` accrues nothing.
    pub fn recompute(&self, queue: &mut PendingStakeQueue, bank: &mut AccountBank, now: i64) -> LedgerResult<()> {
        let window = self.vesting_window()?;
        let now = now.max(queue.last_updated_at);

        while queue.pending_stake_list.front().is_some_and(|head| head.end_time <= now) {
            let Some(head) = queue.pending_stake_list.pop_front() else {
                break;
            };
            // drop the partial credit this entry had accrued so far, then
            // count it in full
            let credited = StakeRatio::new(queue.last_updated_at - head.start_time, window)?.mul_coin(head.coin);
            queue.stake_coin_in_queue = std::mem::take(&mut queue.stake_coin_in_queue) - credited;
            bank.stake = bank.stake.checked_plus(head.coin)?;
            queue.total_coin = queue.total_coin.checked_minus(head.coin)?;
        }

        if queue.is_empty() {
            queue.total_coin = Coin::zero();
            queue.stake_coin_in_queue = StakeRatio::zero();
        } else {
            let elapsed = now - queue.last_updated_at;
            if elapsed > 0 {
                let accrued = StakeRatio::new(elapsed, window)?.mul_coin(queue.total_coin);
                queue.stake_coin_in_queue = std::mem::take(&mut queue.stake_coin_in_queue) + accrued;
            }
        }
        queue.last_updated_at = now;
        enforce_queue_bounds(queue);
        Ok(())
    }

    /// Credit `coin` to saving and start vesting it at `now`. Deposits landing
    /// in the same second as the queue tail merge into it.
    pub fn deposit(
        &self,
        queue: &mut PendingStakeQueue,
        bank: &mut AccountBank,
        coin: Coin,
        now: i64,
    ) -> LedgerResult<()> {
        if coin.is_negative() {
            return Err(LedgerError::InvalidArgument(format!("negative deposit {}", coin)));
        }
        if coin.is_zero() {
            return Ok(());
        }
        let window = self.vesting_window()?;
        self.recompute(queue, bank, now)?;
        let saving = bank.saving.checked_plus(coin)?;
        let total_coin = queue.total_coin.checked_plus(coin)?;
        let start_time = queue.last_updated_at;

        match queue.pending_stake_list.back_mut() {
            Some(tail) if tail.start_time == start_time => {
                tail.coin = tail.coin.checked_plus(coin)?;
            }
            _ => {
                let end_time = start_time
                    .checked_add(window)
                    .ok_or_else(|| LedgerError::InvalidArgument("vesting end time overflow".to_string()))?;
                queue.pending_stake_list.push_back(PendingStake { start_time, end_time, coin });
            }
        }
        queue.total_coin = total_coin;
        bank.saving = saving;
        Ok(())
    }

    /// Credit `coin` to saving and stake at once, skipping the queue.
    pub fn deposit_fully_vested(&self, bank: &mut AccountBank, coin: Coin) -> LedgerResult<()> {
        if coin.is_negative() {
            return Err(LedgerError::InvalidArgument(format!("negative deposit {}", coin)));
        }
        let saving = bank.saving.checked_plus(coin)?;
        let stake = bank.stake.checked_plus(coin)?;
        bank.saving = saving;
        bank.stake = stake;
        Ok(())
    }

    /// Debit `coin` from saving, unwinding the newest deposits first and
    /// falling back to fully vested stake once the queue is exhausted.
    pub fn withdraw(
        &self,
        queue: &mut PendingStakeQueue,
        bank: &mut AccountBank,
        coin: Coin,
        now: i64,
        minimum_balance: Coin,
    ) -> LedgerResult<()> {
        let remain = check_withdrawal(bank, coin, minimum_balance)?;
        if coin.is_zero() {
            return Ok(());
        }
        let window = self.vesting_window()?;
        self.recompute(queue, bank, now)?;
        bank.saving = remain;

        let last_updated_at = queue.last_updated_at;
        let mut left = coin;
        while left.is_positive() {
            let Some(tail) = queue.pending_stake_list.back_mut() else {
                break;
            };
            let ratio = StakeRatio::new(last_updated_at - tail.start_time, window)?;
            if left >= tail.coin {
                let removed = tail.coin;
                queue.pending_stake_list.pop_back();
                left = left.checked_minus(removed)?;
                queue.stake_coin_in_queue = std::mem::take(&mut queue.stake_coin_in_queue) - ratio.mul_coin(removed);
                queue.total_coin = queue.total_coin.checked_minus(removed)?;
            } else {
                tail.coin = tail.coin.checked_minus(left)?;
                queue.stake_coin_in_queue = std::mem::take(&mut queue.stake_coin_in_queue) - ratio.mul_coin(left);
                queue.total_coin = queue.total_coin.checked_minus(left)?;
                left = Coin::zero();
            }
        }
        if queue.is_empty() {
            queue.total_coin = Coin::zero();
            queue.stake_coin_in_queue = StakeRatio::zero();
        }
        if left.is_positive() {
            debit_stake(bank, left);
        }
        enforce_queue_bounds(queue);
        debug!(coin = %coin, stake = %bank.stake, queued = %queue.total_coin, "withdrew from pending stake");
        Ok(())
    }

    /// Debit `coin` from saving consuming fully vested stake first, then the
    /// oldest (most vested) queue entries. Returns the fully vested stake
    /// given up.
    pub fn withdraw_vested_first(
        &self,
        queue: &mut PendingStakeQueue,
        bank: &mut AccountBank,
        coin: Coin,
        now: i64,
        minimum_balance: Coin,
    ) -> LedgerResult<Coin> {
        let remain = check_withdrawal(bank, coin, minimum_balance)?;
        if coin.is_zero() {
            return Ok(Coin::zero());
        }
        let window = self.vesting_window()?;
        self.recompute(queue, bank, now)?;
        bank.saving = remain;

        if bank.stake >= coin {
            bank.stake = bank.stake.checked_minus(coin)?;
            return Ok(coin);
        }
        let stake_lost = bank.stake;
        let mut left = coin.checked_minus(bank.stake)?;
        bank.stake = Coin::zero();

        let last_updated_at = queue.last_updated_at;
        while left.is_positive() {
            let Some(head) = queue.pending_stake_list.front_mut() else {
                break;
            };
            let ratio = StakeRatio::new(last_updated_at - head.start_time, window)?;
            if left >= head.coin {
                let removed = head.coin;
                queue.pending_stake_list.pop_front();
                left = left.checked_minus(removed)?;
                queue.stake_coin_in_queue = std::mem::take(&mut queue.stake_coin_in_queue) - ratio.mul_coin(removed);
                queue.total_coin = queue.total_coin.checked_minus(removed)?;
            } else {
                head.coin = head.coin.checked_minus(left)?;
                queue.stake_coin_in_queue = std::mem::take(&mut queue.stake_coin_in_queue) - ratio.mul_coin(left);
                queue.total_coin = queue.total_coin.checked_minus(left)?;
                left = Coin::zero();
            }
        }
        if queue.is_empty() {
            queue.total_coin = Coin::zero();
            queue.stake_coin_in_queue = StakeRatio::zero();
        }
        enforce_queue_bounds(queue);
        Ok(stake_lost)
    }

    /// `bank.stake + floor(stake_coin_in_queue)` as of `now`.
    pub fn current_stake(&self, queue: &mut PendingStakeQueue, bank: &mut AccountBank, now: i64) -> LedgerResult<Coin> {
        self.recompute(queue, bank, now)?;
        bank.stake.checked_plus(queue.stake_coin_in_queue.floor_coin()?)
    }
}

fn check_withdrawal(bank: &AccountBank, coin: Coin, minimum_balance: Coin) -> LedgerResult<Coin> {
    if coin.is_negative() {
        return Err(LedgerError::InvalidArgument(format!("negative withdrawal {}", coin)));
    }
    let remain = bank.saving.checked_minus(coin)?;
    if remain < minimum_balance {
        return Err(LedgerError::InsufficientBalance(format!(
            "saving {} minus {} is below minimum balance {}",
            bank.saving, coin, minimum_balance
        )));
    }
    Ok(remain)
}

fn debit_stake(bank: &mut AccountBank, coin: Coin) {
    if bank.stake < coin {
        warn!(stake = %bank.stake, coin = %coin, "stake smaller than withdrawal remainder, clamping to zero");
        bank.stake = Coin::zero();
    } else {
        bank.stake = Coin(bank.stake.0 - coin.0);
    }
}

/// Keeps `0 <= stake_coin_in_queue <= total_coin`. With exact arithmetic and
/// a constant window this never fires.
fn enforce_queue_bounds(queue: &mut PendingStakeQueue) {
    if queue.stake_coin_in_queue.is_negative() {
        warn!(value = %queue.stake_coin_in_queue, "negative stake in queue, clamping to zero");
        queue.stake_coin_in_queue = StakeRatio::zero();
    }
    let total = queue.total_coin.to_ratio();
    if queue.stake_coin_in_queue > total {
        warn!(value = %queue.stake_coin_in_queue, total = %queue.total_coin, "stake in queue above total, clamping");
        queue.stake_coin_in_queue = total;
    }
}
