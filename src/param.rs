//! Ledger parameters and the provider trait the engines are built with.

use serde::{Deserialize, Serialize};

use crate::coin::Coin;
use crate::error::{LedgerError, LedgerResult};

/// Source of the parameters the account engines read. Values are treated as
/// constant for the duration of one block.
pub trait ParamProvider: Send + Sync {
    fn account_param(&self) -> LedgerResult<AccountParam>;
    fn stake_param(&self) -> LedgerResult<StakeParam>;
    fn bandwidth_param(&self) -> LedgerResult<BandwidthParam>;
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AccountParam {
    /// Saving that must remain after any withdrawal.
    pub minimum_balance: Coin,
    pub register_fee: Coin,
    /// Portion of the opening deposit credited as fully-vested stake.
    pub first_deposit_full_stake_limit: Coin,
    pub max_num_frozen_money: usize,
    pub balance_history_bundle_size: i64,
    pub max_grant_usage_times: i64,
    pub max_grant_validity_sec: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StakeParam {
    /// Vesting window for every deposit.
    pub seconds_to_recover_stake: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BandwidthParam {
    pub seconds_to_recover_bandwidth: i64,
    pub capacity_usage_per_transaction: Coin,
    /// Baseline added on top of stake when sizing the bucket.
    pub virtual_coin: Coin,
}

impl Default for AccountParam {
    fn default() -> Self {
        Self {
            minimum_balance: Coin::zero(),
            register_fee: Coin::from_whole(1),
            first_deposit_full_stake_limit: Coin::from_whole(1),
            max_num_frozen_money: 10,
            balance_history_bundle_size: 100,
            max_grant_usage_times: 100,
            max_grant_validity_sec: 10 * 3600 * 24 * 365,
        }
    }
}

impl Default for StakeParam {
    fn default() -> Self {
        Self { seconds_to_recover_stake: 7 * 24 * 3600 }
    }
}

impl Default for BandwidthParam {
    fn default() -> Self {
        Self {
            seconds_to_recover_bandwidth: 7 * 24 * 3600,
            capacity_usage_per_transaction: Coin::from_whole(1),
            virtual_coin: Coin::from_whole(1),
        }
    }
}

/// Static parameter set, usually loaded from the `[params]` config table.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct LedgerParams {
    #[serde(default)]
    pub account: AccountParam,
    #[serde(default)]
    pub stake: StakeParam,
    #[serde(default)]
    pub bandwidth: BandwidthParam,
}

impl LedgerParams {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.stake.seconds_to_recover_stake <= 0 {
            return Err(LedgerError::Config("seconds_to_recover_stake must be positive".to_string()));
        }
        if self.bandwidth.seconds_to_recover_bandwidth <= 0 {
            return Err(LedgerError::Config("seconds_to_recover_bandwidth must be positive".to_string()));
        }
        if self.account.balance_history_bundle_size <= 0 {
            return Err(LedgerError::Config("balance_history_bundle_size must be positive".to_string()));
        }
        if self.account.minimum_balance.is_negative()
            || self.bandwidth.capacity_usage_per_transaction.is_negative()
            || self.bandwidth.virtual_coin.is_negative()
        {
            return Err(LedgerError::Config("coin parameters must not be negative".to_string()));
        }
        Ok(())
    }
}

impl ParamProvider for LedgerParams {
    fn account_param(&self) -> LedgerResult<AccountParam> {
        Ok(self.account.clone())
    }

    fn stake_param(&self) -> LedgerResult<StakeParam> {
        Ok(self.stake.clone())
    }

    fn bandwidth_param(&self) -> LedgerResult<BandwidthParam> {
        Ok(self.bandwidth.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = LedgerParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.stake_param().unwrap().seconds_to_recover_stake, 604_800);
    }

    #[test]
    fn test_rejects_zero_windows() {
        let mut params = LedgerParams::default();
        params.stake.seconds_to_recover_stake = 0;
        assert!(matches!(params.validate(), Err(LedgerError::Config(_))));
    }
}
