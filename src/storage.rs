//! RocksDB access layer

use crate::errors::{HazardResult, StorageError};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::{path::Path, sync::Arc};

#[derive(Clone)]
pub struct RocksStorage {
    db: Arc<DB>,
}

impl RocksStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> HazardResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| StorageError::DatabaseOpenFailed(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> HazardResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()).into())
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> HazardResult<()> {
        self.db.put(key, value)?;
        Ok(())
    }

    /// Apply puts and deletes atomically
    pub fn batch_write<K, V>(&self, puts: &[(K, V)], deletes: &[K]) -> HazardResult<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::default();
        for (key, value) in puts {
            batch.put(key, value);
        }
        for key in deletes {
            batch.delete(key);
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// All rows whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &[u8]) -> HazardResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        for entry in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = entry.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }
}
