use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Transaction capacity exceeded for {0}")]
    CapacityExceeded(String),
    #[error("Signing key does not match authority of {0}")]
    AuthorityMismatch(String),
    #[error("Grant from {0} has expired")]
    GrantExpired(String),
    #[error("Grant permission mismatch for grantee {0}")]
    GrantMismatch(String),
    #[error("Grant amount insufficient: left {left}, requested {requested}")]
    GrantAmountInsufficient { left: String, requested: String },
    #[error("Permission level mismatch: {0}")]
    PermissionLevelMismatch(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Frozen money list of {0} is too long")]
    FrozenMoneyListTooLong(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Stable code reported in a rejected transaction's result.
    pub fn code(&self) -> u32 {
        match self {
            LedgerError::NotFound(_) => 301,
            LedgerError::AccountAlreadyExists(_) => 302,
            LedgerError::InsufficientBalance(_) => 311,
            LedgerError::CapacityExceeded(_) => 312,
            LedgerError::AuthorityMismatch(_) => 321,
            LedgerError::GrantExpired(_) => 322,
            LedgerError::GrantMismatch(_) => 323,
            LedgerError::GrantAmountInsufficient { .. } => 324,
            LedgerError::PermissionLevelMismatch(_) => 325,
            LedgerError::InvalidArgument(_) => 331,
            LedgerError::FrozenMoneyListTooLong(_) => 332,
            LedgerError::Serialization(_) => 341,
            LedgerError::Storage(_) => 342,
            LedgerError::Config(_) => 351,
        }
    }

    /// Codec and backend failures mean the store itself is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::Serialization(_) | LedgerError::Storage(_))
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = vec![
            LedgerError::NotFound("a".into()),
            LedgerError::AccountAlreadyExists("a".into()),
            LedgerError::InsufficientBalance("a".into()),
            LedgerError::CapacityExceeded("a".into()),
            LedgerError::AuthorityMismatch("a".into()),
            LedgerError::GrantExpired("a".into()),
            LedgerError::GrantMismatch("a".into()),
            LedgerError::GrantAmountInsufficient { left: "1".into(), requested: "2".into() },
            LedgerError::PermissionLevelMismatch("a".into()),
            LedgerError::InvalidArgument("a".into()),
            LedgerError::FrozenMoneyListTooLong("a".into()),
            LedgerError::Serialization("a".into()),
            LedgerError::Storage("a".into()),
            LedgerError::Config("a".into()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(LedgerError::Serialization("bad bytes".into()).is_fatal());
        assert!(!LedgerError::CapacityExceeded("alice".into()).is_fatal());
    }
}
