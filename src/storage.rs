use rocksdb::{Direction, IteratorMode, Options, DB};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::LedgerResult;

/// Byte-keyed store scoped to one block's execution.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> LedgerResult<Option<Vec<u8>>>;
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> LedgerResult<()>;
    fn delete(&mut self, key: &[u8]) -> LedgerResult<()>;

    fn has(&self, key: &[u8]) -> LedgerResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> LedgerResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

// Generic Helper: Put
pub fn put_value<T: Serialize>(store: &mut dyn KvStore, key: &[u8], value: &T) -> LedgerResult<()> {
    let serialized = bincode::serialize(value)?;
    store.set(key, serialized)
}

// Generic Helper: Get
pub fn get_value<T: for<'a> Deserialize<'a>>(store: &dyn KvStore, key: &[u8]) -> LedgerResult<Option<T>> {
    match store.get(key)? {
        Some(data) => Ok(Some(bincode::deserialize(&data)?)),
        None => Ok(None),
    }
}

/// In-memory ordered store.
#[derive(Default, Clone, Debug)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> LedgerResult<()> {
        self.entries.insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> LedgerResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> LedgerResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// RocksDB-backed store.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let path = Path::new(path);
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)?;
        Ok(RocksStore { db })
    }

    pub fn flush(&self) -> LedgerResult<()> {
        Ok(self.db.flush()?)
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> LedgerResult<()> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&mut self, key: &[u8]) -> LedgerResult<()> {
        Ok(self.db.delete(key)?)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> LedgerResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }
}

/// Per-call execution context handed in by the runtime: block time in unix
/// seconds, block height and the store scoped to the current block.
pub struct Context<'a> {
    pub block_time: i64,
    pub height: i64,
    store: &'a mut dyn KvStore,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut dyn KvStore, block_time: i64, height: i64) -> Self {
        Self { block_time, height, store }
    }

    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn KvStore {
        &mut *self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_store_prefix_scan() {
        let mut store = MemStore::new();
        store.set(&[1, 1], vec![1]).unwrap();
        store.set(&[1, 2], vec![2]).unwrap();
        store.set(&[2, 1], vec![3]).unwrap();
        store.set(&[0, 9], vec![4]).unwrap();

        let rows = store.scan_prefix(&[1]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (vec![1, 1], vec![1]));
        assert_eq!(rows[1], (vec![1, 2], vec![2]));

        store.delete(&[1, 1]).unwrap();
        assert!(!store.has(&[1, 1]).unwrap());
    }

    #[test]
    fn test_typed_helpers() {
        let mut store = MemStore::new();
        put_value(&mut store, b"k", &(42u64, "v".to_string())).unwrap();
        let got: Option<(u64, String)> = get_value(&store, b"k").unwrap();
        assert_eq!(got, Some((42, "v".to_string())));

        store.set(b"bad", vec![0xff]).unwrap();
        let bad: LedgerResult<Option<(u64, String)>> = get_value(&store, b"bad");
        assert!(bad.is_err());
    }

    #[test]
    fn test_rocks_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("stake_ledger_rocks_{}", std::process::id()));
        let path = dir.to_string_lossy().to_string();
        {
            let mut store = RocksStore::open(&path).unwrap();
            store.set(b"a/1", b"one".to_vec()).unwrap();
            store.set(b"a/2", b"two".to_vec()).unwrap();
            store.set(b"b/1", b"three".to_vec()).unwrap();
            assert_eq!(store.get(b"a/1").unwrap(), Some(b"one".to_vec()));
            assert_eq!(store.scan_prefix(b"a/").unwrap().len(), 2);
            store.delete(b"a/1").unwrap();
            assert_eq!(store.get(b"a/1").unwrap(), None);
            store.flush().unwrap();
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
