//! Account entity definitions for the stake ledger

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::coin::{Coin, StakeRatio};
use crate::error::{LedgerError, LedgerResult};

/// Account identifier - human-readable username
pub type AccountId = String;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 20;
pub const MAX_MEMO_LENGTH: usize = 100;
pub const MAX_JSON_META_LENGTH: usize = 500;

/// Ed25519 public key, validated as a curve point on construction.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PubKey([u8; 32]);

impl PubKey {
    pub fn from_bytes(bytes: [u8; 32]) -> LedgerResult<Self> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| LedgerError::InvalidArgument(format!("invalid public key: {}", e)))?;
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> LedgerResult<Self> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| LedgerError::InvalidArgument(format!("invalid key hex: {}", e)))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| LedgerError::InvalidArgument("public key must be 32 bytes".to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Address bound to this key: first 20 bytes of its SHA-256.
    pub fn address(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..20])
    }
}

impl From<VerifyingKey> for PubKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey({})", self.to_hex())
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Authority tiers, declared weakest first so that `Ord` follows strength.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    Post,
    Micropayment,
    Transaction,
    /// Also called the reset key: only it may recover the account.
    Master,
}

impl Permission {
    pub const DESCENDING: [Permission; 4] = [
        Permission::Master,
        Permission::Transaction,
        Permission::Micropayment,
        Permission::Post,
    ];

    pub fn is_grantable(&self) -> bool {
        !matches!(self, Permission::Master)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::Post => "post",
            Permission::Micropayment => "micropayment",
            Permission::Transaction => "transaction",
            Permission::Master => "master",
        };
        f.write_str(name)
    }
}

impl FromStr for Permission {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "post" => Ok(Permission::Post),
            "micropayment" | "app" => Ok(Permission::Micropayment),
            "transaction" => Ok(Permission::Transaction),
            "master" | "reset" => Ok(Permission::Master),
            other => Err(LedgerError::InvalidArgument(format!("unknown permission '{}'", other))),
        }
    }
}

/// The four public keys of an account, one per tier.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountKeys {
    pub master: PubKey,
    pub transaction: PubKey,
    pub micropayment: PubKey,
    pub post: PubKey,
}

impl AccountKeys {
    pub fn key_for(&self, permission: Permission) -> &PubKey {
        match permission {
            Permission::Master => &self.master,
            Permission::Transaction => &self.transaction,
            Permission::Micropayment => &self.micropayment,
            Permission::Post => &self.post,
        }
    }

    /// Strongest tier whose key equals `key`.
    pub fn level_of(&self, key: &PubKey) -> Option<Permission> {
        Permission::DESCENDING
            .into_iter()
            .find(|p| self.key_for(*p) == key)
    }
}

/// General account information, written once at registration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountInfo {
    pub username: AccountId,
    pub created_at: i64,
    pub keys: AccountKeys,
    pub address: Option<String>,
}

/// Coin holdings. Invariant: `stake + queue.total_coin <= saving`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AccountBank {
    pub saving: Coin,
    /// Fully vested coin.
    pub stake: Coin,
    pub frozen_money_list: Vec<FrozenMoney>,
    pub num_of_tx: i64,
    pub num_of_reward: i64,
}

/// Installment schedule: `times` unlocks of `amount`, every `interval`
/// seconds starting at `start_at`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FrozenMoney {
    pub amount: Coin,
    pub start_at: i64,
    pub interval: i64,
    pub times: i64,
}

impl FrozenMoney {
    pub fn ends_at(&self) -> i64 {
        self.start_at
            .saturating_add(self.interval.saturating_mul(self.times))
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.ends_at()
    }
}

/// One not-yet-vested deposit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PendingStake {
    pub start_time: i64,
    pub end_time: i64,
    pub coin: Coin,
}

/// Deposits waiting to vest, oldest at the front.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PendingStakeQueue {
    pub last_updated_at: i64,
    /// Vested-but-unflushed coin, exact. Kept within `[0, total_coin]`.
    pub stake_coin_in_queue: StakeRatio,
    pub total_coin: Coin,
    pub pending_stake_list: VecDeque<PendingStake>,
}

impl PendingStakeQueue {
    pub fn new(now: i64) -> Self {
        Self { last_updated_at: now, ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.pending_stake_list.is_empty()
    }
}

/// Small, frequently updated fields.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AccountMeta {
    pub sequence: u64,
    pub last_activity_at: i64,
    /// Current bandwidth bucket level.
    pub transaction_capacity: Coin,
    pub json_meta: String,
    pub last_report_or_upvote_at: i64,
    pub last_post_at: i64,
}

/// Limit attached to a delegation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum GrantAllowance {
    Unlimited,
    /// Uses left; the grant is deleted when this reaches zero.
    Times(i64),
    /// Pre-authorised spending left.
    Amount(Coin),
}

/// Delegation stored under `(grantor, grantee key)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GrantPubKey {
    /// The grantee, who becomes the acting identity.
    pub username: AccountId,
    pub permission: Permission,
    pub created_at: i64,
    pub expires_at: i64,
    pub allowance: GrantAllowance,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Reward {
    pub total_income: Coin,
    pub original_income: Coin,
    pub friction_income: Coin,
    pub inflation_income: Coin,
    pub unclaim_reward: Coin,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailType {
    TransferIn,
    DonationIn,
    ClaimReward,
    GenesisCoin,
    VoteReturnCoin,
    ValidatorReturnCoin,
    DeveloperReturnCoin,
    TransferOut,
    DonationOut,
    VoterDeposit,
    ValidatorDeposit,
    DeveloperDeposit,
}

impl DetailType {
    pub fn is_income(&self) -> bool {
        matches!(
            self,
            DetailType::TransferIn
                | DetailType::DonationIn
                | DetailType::ClaimReward
                | DetailType::GenesisCoin
                | DetailType::VoteReturnCoin
                | DetailType::ValidatorReturnCoin
                | DetailType::DeveloperReturnCoin
        )
    }
}

/// One balance-history row.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Detail {
    pub detail_type: DetailType,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Coin,
    pub created_at: i64,
    pub memo: String,
}

/// A bounded bucket of balance-history rows.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BalanceHistory {
    pub details: Vec<Detail>,
}

/// Username rules: lowercase start, alphanumeric end, `-`/`.` separators
/// never doubled.
pub fn validate_username(name: &str) -> LedgerResult<()> {
    let invalid = |reason: &str| -> LedgerResult<()> {
        Err(LedgerError::InvalidArgument(format!("username '{}' {}", name, reason)))
    };
    if name.len() < MIN_USERNAME_LENGTH || name.len() > MAX_USERNAME_LENGTH {
        return invalid("has invalid length");
    }
    let bytes = name.as_bytes();
    if !bytes[0].is_ascii_lowercase() {
        return invalid("must start with a lowercase letter");
    }
    let last = bytes[bytes.len() - 1];
    if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
        return invalid("must end with a letter or digit");
    }
    let is_separator = |c: u8| c == b'-' || c == b'.';
    if !bytes.iter().all(|&c| c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c)) {
        return invalid("contains illegal characters");
    }
    if bytes.windows(2).any(|w| is_separator(w[0]) && is_separator(w[1])) {
        return invalid("contains consecutive separators");
    }
    Ok(())
}

pub fn validate_memo(memo: &str) -> LedgerResult<()> {
    if memo.chars().count() > MAX_MEMO_LENGTH {
        return Err(LedgerError::InvalidArgument(format!(
            "memo length {} exceeds {}",
            memo.chars().count(),
            MAX_MEMO_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::test_utils::key;

    #[test]
    fn test_username_rules() {
        for ok in ["alice", "bob-1", "a.b.c", "user123", "abc"] {
            assert!(validate_username(ok).is_ok(), "{}", ok);
        }
        for bad in ["ab", "1abc", "Alice", "abc-", "a--b", "a.-b", "a_b", "abcdefghijklmnopqrstu"] {
            assert!(validate_username(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_memo_limit() {
        assert!(validate_memo(&"m".repeat(MAX_MEMO_LENGTH)).is_ok());
        assert!(validate_memo(&"m".repeat(MAX_MEMO_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_permission_order() {
        assert!(Permission::Master > Permission::Transaction);
        assert!(Permission::Transaction > Permission::Micropayment);
        assert!(Permission::Micropayment > Permission::Post);
        assert_eq!("app".parse::<Permission>().unwrap(), Permission::Micropayment);
        assert_eq!("reset".parse::<Permission>().unwrap(), Permission::Master);
        assert!(!Permission::Master.is_grantable());
    }

    #[test]
    fn test_pubkey_hex_and_address() {
        let k = key(7);
        assert_eq!(PubKey::from_hex(&k.to_hex()).unwrap(), k);
        assert_eq!(k.address().len(), 40);
        assert!(PubKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_level_of_prefers_strongest() {
        let keys = AccountKeys { master: key(1), transaction: key(1), micropayment: key(2), post: key(3) };
        assert_eq!(keys.level_of(&key(1)), Some(Permission::Master));
        assert_eq!(keys.level_of(&key(3)), Some(Permission::Post));
        assert_eq!(keys.level_of(&key(9)), None);
    }

    #[test]
    fn test_frozen_money_expiry() {
        let frozen = FrozenMoney { amount: Coin::new(10), start_at: 100, interval: 10, times: 3 };
        assert!(!frozen.is_expired(130));
        assert!(frozen.is_expired(131));
    }
}
