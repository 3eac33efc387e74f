use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::account::{AccountKeys, PubKey};
use crate::error::{LedgerError, LedgerResult};

#[derive(Serialize, Deserialize)]
pub struct TierKeyPair {
    pub public_key: String,
    pub private_key: String,
}

/// Key file written by `keygen`, one pair per tier.
#[derive(Serialize, Deserialize)]
pub struct KeySetFile {
    pub master: TierKeyPair,
    pub transaction: TierKeyPair,
    pub micropayment: TierKeyPair,
    pub post: TierKeyPair,
}

fn generate_pair() -> TierKeyPair {
    let mut csprng = OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    TierKeyPair {
        public_key: hex::encode(signing_key.verifying_key().to_bytes()),
        private_key: hex::encode(signing_key.to_bytes()),
    }
}

impl KeySetFile {
    pub fn generate() -> Self {
        Self {
            master: generate_pair(),
            transaction: generate_pair(),
            micropayment: generate_pair(),
            post: generate_pair(),
        }
    }

    pub fn load(path: &str) -> LedgerResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| LedgerError::InvalidArgument(format!("cannot read key file '{}': {}", path, e)))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn public_keys(&self) -> LedgerResult<AccountKeys> {
        Ok(AccountKeys {
            master: PubKey::from_hex(&self.master.public_key)?,
            transaction: PubKey::from_hex(&self.transaction.public_key)?,
            micropayment: PubKey::from_hex(&self.micropayment.public_key)?,
            post: PubKey::from_hex(&self.post.public_key)?,
        })
    }
}

pub fn handle_keygen(out: Option<String>) -> LedgerResult<()> {
    let key_set = KeySetFile::generate();
    let json = serde_json::to_string_pretty(&key_set)?;
    match out {
        Some(path) => {
            fs::write(&path, json)
                .map_err(|e| LedgerError::InvalidArgument(format!("cannot write '{}': {}", path, e)))?;
            println!("Master public key: {}", key_set.master.public_key);
            println!("Saved key set to {} (KEEP SECRET!)", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_set_parses() {
        let key_set = KeySetFile::generate();
        let json = serde_json::to_string(&key_set).unwrap();
        let parsed: KeySetFile = serde_json::from_str(&json).unwrap();
        let keys = parsed.public_keys().unwrap();
        assert_ne!(keys.master, keys.transaction);
        assert_eq!(keys.post.to_hex(), key_set.post.public_key);
    }
}
