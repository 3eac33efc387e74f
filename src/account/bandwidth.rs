//! Per-account transaction throttle.
//!
//! A token bucket whose ceiling is the account's current stake plus a small
//! virtual baseline. The bucket refills linearly towards the ceiling over
//! `seconds_to_recover_bandwidth`; each transaction drains
//! `cost_ratio * capacity_usage_per_transaction`.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::types::AccountMeta;
use crate::coin::{Coin, StakeRatio};
use crate::error::{LedgerError, LedgerResult};
use crate::param::ParamProvider;

pub struct BandwidthController {
    params: Arc<dyn ParamProvider>,
}

impl BandwidthController {
    pub fn new(params: Arc<dyn ParamProvider>) -> Self {
        Self { params }
    }

    /// Bucket level at `now` for an account holding `stake`, without
    /// touching `meta`.
    pub fn refreshed_capacity(&self, meta: &AccountMeta, stake: Coin, now: i64) -> LedgerResult<Coin> {
        let param = self.params.bandwidth_param()?;
        if param.seconds_to_recover_bandwidth <= 0 {
            return Err(LedgerError::Config(format!(
                "invalid bandwidth recovery window {}",
                param.seconds_to_recover_bandwidth
            )));
        }
        let ceiling = stake.checked_plus(param.virtual_coin)?;
        let capacity = meta.transaction_capacity;
        if capacity >= ceiling {
            return Ok(ceiling);
        }

        let elapsed = (now - meta.last_activity_at).max(0);
        let refill = if elapsed >= param.seconds_to_recover_bandwidth {
            StakeRatio::one()
        } else {
            StakeRatio::new(elapsed, param.seconds_to_recover_bandwidth)?
        };
        let gap = ceiling.checked_minus(capacity)?;
        capacity.checked_plus(refill.mul_coin(gap).floor_coin()?)
    }

    /// Charge one transaction against the bucket. On `CapacityExceeded` the
    /// meta is left untouched.
    pub fn check_and_consume(
        &self,
        username: &str,
        meta: &mut AccountMeta,
        stake: Coin,
        cost_ratio: Decimal,
        now: i64,
    ) -> LedgerResult<()> {
        if cost_ratio.is_sign_negative() && !cost_ratio.is_zero() {
            return Err(LedgerError::InvalidArgument(format!("negative cost ratio {}", cost_ratio)));
        }
        let param = self.params.bandwidth_param()?;
        let capacity = self.refreshed_capacity(meta, stake, now)?;
        let cost = StakeRatio::from_decimal(cost_ratio)
            .mul_coin(param.capacity_usage_per_transaction)
            .floor_coin()?;

        if cost > capacity {
            debug!(username, cost = %cost, capacity = %capacity, "transaction capacity exceeded");
            return Err(LedgerError::CapacityExceeded(format!(
                "{}: cost {} above capacity {}",
                username, cost, capacity
            )));
        }
        meta.transaction_capacity = capacity.checked_minus(cost)?;
        meta.last_activity_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::LedgerParams;
    use std::str::FromStr;

    fn controller(virtual_coin: Coin) -> BandwidthController {
        let mut params = LedgerParams::default();
        params.bandwidth.seconds_to_recover_bandwidth = 1000;
        params.bandwidth.capacity_usage_per_transaction = Coin::new(100);
        params.bandwidth.virtual_coin = virtual_coin;
        BandwidthController::new(Arc::new(params))
    }

    fn meta(capacity: i64, last: i64) -> AccountMeta {
        AccountMeta { transaction_capacity: Coin::new(capacity), last_activity_at: last, ..Default::default() }
    }

    #[test]
    fn test_capacity_clamped_to_stake() {
        let bw = controller(Coin::zero());
        let m = meta(5000, 0);
        assert_eq!(bw.refreshed_capacity(&m, Coin::new(1200), 10).unwrap(), Coin::new(1200));
    }

    #[test]
    fn test_linear_refill() {
        let bw = controller(Coin::zero());
        let m = meta(0, 0);
        assert_eq!(bw.refreshed_capacity(&m, Coin::new(1000), 250).unwrap(), Coin::new(250));
        assert_eq!(bw.refreshed_capacity(&m, Coin::new(1000), 1000).unwrap(), Coin::new(1000));
        assert_eq!(bw.refreshed_capacity(&m, Coin::new(1000), 9999).unwrap(), Coin::new(1000));
        // time before the last activity refills nothing
        assert_eq!(bw.refreshed_capacity(&meta(10, 500), Coin::new(1000), 100).unwrap(), Coin::new(10));
    }

    #[test]
    fn test_consume_and_reject() {
        let bw = controller(Coin::zero());
        let mut m = meta(250, 0);
        let one = Decimal::ONE;
        bw.check_and_consume("alice", &mut m, Coin::new(250), one, 7).unwrap();
        assert_eq!(m.transaction_capacity, Coin::new(150));
        assert_eq!(m.last_activity_at, 7);

        let before = m.clone();
        let err = bw
            .check_and_consume("alice", &mut m, Coin::new(250), Decimal::from(2), 7)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExceeded(_)));
        assert_eq!(m, before);
    }

    #[test]
    fn test_fractional_cost_ratio() {
        let bw = controller(Coin::zero());
        let mut m = meta(100, 0);
        bw.check_and_consume("bob", &mut m, Coin::new(100), Decimal::from_str("0.333").unwrap(), 0)
            .unwrap();
        assert_eq!(m.transaction_capacity, Coin::new(67));
        assert!(bw
            .check_and_consume("bob", &mut m, Coin::new(100), Decimal::from_str("-0.5").unwrap(), 0)
            .is_err());
    }

    #[test]
    fn test_virtual_coin_allows_zero_stake() {
        let bw = controller(Coin::new(150));
        let mut m = meta(0, 0);
        bw.check_and_consume("carol", &mut m, Coin::zero(), Decimal::ONE, 1000).unwrap();
        assert_eq!(m.transaction_capacity, Coin::new(50));
        assert!(bw.check_and_consume("carol", &mut m, Coin::zero(), Decimal::ONE, 1000).is_err());
    }

    #[test]
    fn test_capacity_stays_within_stake() {
        let bw = controller(Coin::zero());
        let mut m = meta(0, 0);
        let stake = Coin::new(1000);
        for t in (0..5000).step_by(37) {
            let _ = bw.check_and_consume("dave", &mut m, stake, Decimal::ONE, t);
            assert!(!m.transaction_capacity.is_negative());
            assert!(m.transaction_capacity <= stake);
        }
    }
}
