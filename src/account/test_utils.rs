//! Shared fixtures for account tests.

use ed25519_dalek::SigningKey;
use std::sync::Arc;

use super::manager::AccountManager;
use super::types::{AccountKeys, PubKey};
use crate::coin::Coin;
use crate::param::LedgerParams;

pub const WEEK: i64 = 7 * 24 * 3600;

/// Deterministic key for seed `n`.
pub fn key(n: u8) -> PubKey {
    PubKey::from(SigningKey::from_bytes(&[n; 32]).verifying_key())
}

/// Four distinct keys derived from `n`. Sets for different `n` below 50 do
/// not overlap.
pub fn keys(n: u8) -> AccountKeys {
    let base = n.wrapping_mul(5);
    AccountKeys { master: key(base), transaction: key(base + 1), micropayment: key(base + 2), post: key(base + 3) }
}

/// Parameters with no register fee, no virtual coin and no full-stake
/// opening credit, so stake numbers in tests come only from vesting.
pub fn plain_params() -> LedgerParams {
    let mut params = LedgerParams::default();
    params.account.register_fee = Coin::zero();
    params.account.first_deposit_full_stake_limit = Coin::zero();
    params.bandwidth.virtual_coin = Coin::zero();
    params
}

pub fn manager(params: LedgerParams) -> AccountManager {
    AccountManager::new(Arc::new(params))
}
