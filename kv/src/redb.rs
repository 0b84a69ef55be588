//! Redb-based persistent key-value store implementation.

use std::path::Path;

use redb::{Database, ReadableTable, Table, TableDefinition};

use crate::batch::{Batch, Write};
use crate::{KVError, KVResult, KVStore};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}

/// A persistent key-value store backed by redb.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KVResult<Self> {
        let db = Database::create(path).map_err(storage)?;
        let store = Self { db };
        // Create the table if it doesn't exist
        store.write_tx(|_| Ok(()))?;
        Ok(store)
    }

    /// Run `f` inside one write transaction. The transaction commits only if
    /// `f` succeeds; on error it is dropped, which aborts it.
    fn write_tx<F>(&self, f: F) -> KVResult<()>
    where
        F: FnOnce(&mut Table<'_, &'static str, &'static [u8]>) -> KVResult<()>,
    {
        let tx = self.db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            f(&mut table)?;
        }
        tx.commit().map_err(storage)
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;
        let value = table.get(key).map_err(storage)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        self.write_tx(|table| {
            table.insert(key, value).map_err(storage)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> KVResult<()> {
        self.write_tx(|table| {
            table.remove(key).map_err(storage)?;
            Ok(())
        })
    }

    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>> {
        let tx = self.db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;

        // Keys are ordered, so the scan starts at the prefix and stops at
        // the first key past it.
        let mut results = Vec::new();
        for item in table.range(prefix..).map_err(storage)? {
            let (key, value) = item.map_err(storage)?;
            let key_str = key.value();
            if !key_str.starts_with(prefix) {
                break;
            }
            results.push((key_str.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> KVResult<()> {
        self.write_tx(|table| {
            for (key, value) in entries {
                table.insert(*key, *value).map_err(storage)?;
            }
            Ok(())
        })
    }

    fn batch_delete(&self, keys: &[&str]) -> KVResult<()> {
        self.write_tx(|table| {
            for key in keys {
                table.remove(*key).map_err(storage)?;
            }
            Ok(())
        })
    }

    fn commit(&self, batch: &Batch) -> KVResult<()> {
        // redb admits one write transaction at a time, so the guard checks
        // and the writes cannot interleave with another commit.
        self.write_tx(|table| {
            for g in &batch.guards {
                let current = table
                    .get(g.key.as_str())
                    .map_err(storage)?
                    .map(|v| v.value().to_vec());
                if current != g.expected {
                    return Err(KVError::Conflict(g.key.clone()));
                }
            }
            for w in &batch.writes {
                match w {
                    Write::Put { key, value } => {
                        table.insert(key.as_str(), value.as_slice()).map_err(storage)?;
                    }
                    Write::Delete { key } => {
                        table.remove(key.as_str()).map_err(storage)?;
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_redb_basic() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        store.set("key1", b"value1").unwrap();
        assert_eq!(store.get("key1").unwrap(), Some(b"value1".to_vec()));

        store.delete("key1").unwrap();
        assert_eq!(store.get("key1").unwrap(), None);
    }

    #[test]
    fn test_redb_scan() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        store.set("prefix:a", b"1").unwrap();
        store.set("prefix:b", b"2").unwrap();
        store.set("other:c", b"3").unwrap();

        let results = store.scan("prefix:").unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_redb_commit_and_conflict() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();
        store.set("cluster:1", b"v1").unwrap();

        let mut ok = Batch::new();
        ok.guard("cluster:1", Some(b"v1".to_vec()))
            .put("cluster:1", b"v2".to_vec())
            .put("face:1", b"f".to_vec());
        store.commit(&ok).unwrap();
        assert_eq!(store.get("cluster:1").unwrap(), Some(b"v2".to_vec()));

        // Stale guard: the whole batch is rejected.
        let mut stale = Batch::new();
        stale
            .guard("cluster:1", Some(b"v1".to_vec()))
            .delete("face:1")
            .put("cluster:1", b"v3".to_vec());
        assert!(matches!(store.commit(&stale), Err(KVError::Conflict(_))));
        assert_eq!(store.get("cluster:1").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.get("face:1").unwrap(), Some(b"f".to_vec()));
    }

    #[test]
    fn test_redb_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.batch_set(&[("a", b"1"), ("b", b"2")]).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.scan("").unwrap().len(), 2);
    }
}
