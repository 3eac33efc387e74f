use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::keys::KeySetFile;
use crate::account::{query, AccountManager};
use crate::coin::Coin;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::storage::{Context, RocksStore};

fn open(config: &LedgerConfig) -> LedgerResult<(AccountManager, RocksStore)> {
    let manager = AccountManager::new(Arc::new(config.params.clone()));
    let store = RocksStore::open(&config.storage.db_path)?;
    Ok((manager, store))
}

pub fn handle_init_config(path: &str, force: bool) -> LedgerResult<()> {
    if std::path::Path::new(path).exists() && !force {
        return Err(LedgerError::Config(format!("'{}' already exists, pass --force to overwrite", path)));
    }
    let text = LedgerConfig::default().to_toml()?;
    std::fs::write(path, text).map_err(|e| LedgerError::Config(format!("cannot write '{}': {}", path, e)))?;
    println!("Wrote default config to {}", path);
    Ok(())
}

pub fn handle_create_account(config: &LedgerConfig, username: &str, keys_path: &str, deposit: i64) -> LedgerResult<()> {
    let keys = KeySetFile::load(keys_path)?.public_keys()?;
    let (manager, mut store) = open(config)?;
    let mut ctx = Context::new(&mut store, Utc::now().timestamp(), 0);
    manager.create_account(&mut ctx, username, keys, Coin::new(deposit))?;
    store.flush()?;
    println!("Created account {}", username);
    Ok(())
}

pub fn handle_transfer(config: &LedgerConfig, from: &str, to: &str, amount: i64, memo: &str) -> LedgerResult<()> {
    let (manager, mut store) = open(config)?;
    let mut ctx = Context::new(&mut store, Utc::now().timestamp(), 0);
    manager.transfer(&mut ctx, from, to, Coin::new(amount), memo)?;
    store.flush()?;
    info!(from, to, amount, "transfer committed");
    println!("Transferred {} from {} to {}", Coin::new(amount), from, to);
    Ok(())
}

pub fn handle_query(config: &LedgerConfig, path: &str, at: Option<i64>) -> LedgerResult<()> {
    let (manager, mut store) = open(config)?;
    let ctx = Context::new(&mut store, at.unwrap_or_else(|| Utc::now().timestamp()), 0);
    let bytes = query(&manager, &ctx, path)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
