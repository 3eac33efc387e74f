//! Account ledger
//!
//! This module owns every per-account table:
//! - Registration info and the four-tier key hierarchy
//! - Saving, stake and the pending stake (vesting) queue
//! - Bandwidth metadata and delegated grants
//! - Balance history and content rewards

pub mod types;
pub mod store;
pub mod vesting;
pub mod bandwidth;
pub mod auth;
pub mod balance;
pub mod manager;
pub mod recovery;
pub mod query;

#[cfg(test)]
pub mod test_utils;

pub use types::{AccountId, AccountKeys, GrantAllowance, Permission, PubKey};
pub use store::AccountStorage;
pub use vesting::StakeVestingEngine;
pub use bandwidth::BandwidthController;
pub use auth::AuthorityManager;
pub use manager::AccountManager;
pub use query::query;
