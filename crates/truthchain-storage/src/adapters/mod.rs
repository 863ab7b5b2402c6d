pub mod memory;
pub mod rocksdb_store;

pub use memory::InMemoryKvStore;
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
