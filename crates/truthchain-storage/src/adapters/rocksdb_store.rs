//! Production RocksDB-backed storage. Each bucket is a column family;
//! writes can be batched atomically across buckets via a single
//! `WriteBatch`.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

use crate::buckets;
use crate::errors::StorageError;
use crate::kv::{BatchOp, KeyValueStore};

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub path: String,
    /// Block cache size in bytes.
    pub block_cache_size: usize,
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
    /// fsync after every write. Off in tests, on in production.
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/truthchain".to_string(),
            block_cache_size: 256 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

pub struct RocksDbStore {
    db: Arc<RwLock<DB>>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = buckets::ALL
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StorageError::Backend(format!("failed to open rocksdb: {e}")))?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            config,
        })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    fn cf_handle<'a>(db: &'a DB, bucket: &str) -> Result<&'a ColumnFamily, StorageError> {
        db.cf_handle(bucket)
            .ok_or_else(|| StorageError::Backend(format!("unknown bucket: {bucket}")))
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let db = self.db.read();
        let cf = Self::cf_handle(&db, bucket)?;
        db.get_cf(cf, key)
            .map_err(|e| StorageError::Backend(format!("get failed: {e}")))
    }

    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let db = self.db.write();
        let cf = Self::cf_handle(&db, bucket)?;
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        db.put_cf_opt(cf, key, value, &write_opts)
            .map_err(|e| StorageError::Backend(format!("put failed: {e}")))
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StorageError> {
        let db = self.db.write();
        let cf = Self::cf_handle(&db, bucket)?;
        db.delete_cf(cf, key)
            .map_err(|e| StorageError::Backend(format!("delete failed: {e}")))
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let db = self.db.write();
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put {
                    bucket,
                    key,
                    value,
                } => {
                    let cf = Self::cf_handle(&db, bucket)?;
                    batch.put_cf(cf, &key, &value);
                }
                BatchOp::Delete { bucket, key } => {
                    let cf = Self::cf_handle(&db, bucket)?;
                    batch.delete_cf(cf, &key);
                }
            }
        }
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        db.write_opt(batch, &write_opts)
            .map_err(|e| StorageError::Backend(format!("batch write failed: {e}")))
    }

    fn prefix_scan(
        &self,
        bucket: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let db = self.db.read();
        let cf = Self::cf_handle(&db, bucket)?;
        let mut results = Vec::new();
        let iter = db.iterator_cf(cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));
        for item in iter {
            let (key, value) =
                item.map_err(|e| StorageError::Backend(format!("scan failed: {e}")))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_get_delete_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store =
            RocksDbStore::open(RocksDbConfig::for_testing(dir.path().to_string_lossy())).unwrap();

        store.put(buckets::BLOCKS, b"1", b"block-one").unwrap();
        assert_eq!(
            store.get(buckets::BLOCKS, b"1").unwrap(),
            Some(b"block-one".to_vec())
        );
        store.delete(buckets::BLOCKS, b"1").unwrap();
        assert_eq!(store.get(buckets::BLOCKS, b"1").unwrap(), None);
    }

    #[test]
    fn batch_write_spans_multiple_buckets() {
        let dir = TempDir::new().unwrap();
        let store =
            RocksDbStore::open(RocksDbConfig::for_testing(dir.path().to_string_lossy())).unwrap();

        let ops = vec![
            BatchOp::put(buckets::BLOCKS, b"1", b"block-one"),
            BatchOp::put(buckets::METADATA, buckets::KEY_LATEST_BLOCK_INDEX, b"1"),
        ];
        store.write_batch(ops).unwrap();

        assert!(store.exists(buckets::BLOCKS, b"1").unwrap());
        assert_eq!(
            store
                .get(buckets::METADATA, buckets::KEY_LATEST_BLOCK_INDEX)
                .unwrap(),
            Some(b"1".to_vec())
        );
    }

    #[test]
    fn prefix_scan_stops_outside_prefix() {
        let dir = TempDir::new().unwrap();
        let store =
            RocksDbStore::open(RocksDbConfig::for_testing(dir.path().to_string_lossy())).unwrap();

        store.put(buckets::POSTS, b"post:0001", b"a").unwrap();
        store.put(buckets::POSTS, b"post:0002", b"b").unwrap();
        store.put(buckets::POSTS, b"zzzz", b"c").unwrap();

        let results = store.prefix_scan(buckets::POSTS, b"post:").unwrap();
        assert_eq!(results.len(), 2);
    }
}
