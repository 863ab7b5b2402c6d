use std::collections::HashMap;

use parking_lot::RwLock;

use crate::buckets;
use crate::errors::StorageError;
use crate::kv::{BatchOp, KeyValueStore};

/// In-process key-value store for unit and integration tests. Each bucket
/// is a separate map behind its own lock so a write to one bucket never
/// blocks a read of another.
#[derive(Default)]
pub struct InMemoryKvStore {
    data: HashMap<&'static str, RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        let mut data = HashMap::new();
        for bucket in buckets::ALL {
            data.insert(*bucket, RwLock::new(HashMap::new()));
        }
        Self { data }
    }

    fn bucket(&self, name: &str) -> Result<&RwLock<HashMap<Vec<u8>, Vec<u8>>>, StorageError> {
        self.data
            .get(name)
            .ok_or_else(|| StorageError::Backend(format!("unknown bucket: {name}")))
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.bucket(bucket)?.read().get(key).cloned())
    }

    fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.bucket(bucket)?
            .write()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StorageError> {
        self.bucket(bucket)?.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        for op in ops {
            match op {
                BatchOp::Put {
                    bucket,
                    key,
                    value,
                } => {
                    self.bucket(bucket)?.write().insert(key, value);
                }
                BatchOp::Delete { bucket, key } => {
                    self.bucket(bucket)?.write().remove(&key);
                }
            }
        }
        Ok(())
    }

    fn prefix_scan(
        &self,
        bucket: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let guard = self.bucket(bucket)?.read();
        Ok(guard
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
