use async_trait::async_trait;
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

pub(crate) struct InMemoryCacheStore {
    pub(super) entry: HashMap<String, CacheData>,
}

pub(crate) struct RedisCacheStore {
    pub(super) client: redis::Client,
}

// Trait
#[async_trait]
pub(crate) trait CacheStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put an entry into the store with a TTL in seconds.
    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError>;

    /// Get an entry from the store. Expired entries are treated as absent.
    async fn get(&mut self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    /// Remove an entry from the store.
    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError>;

    /// Atomically remove an entry and return it.
    ///
    /// At most one concurrent `take` for the same key can observe the entry;
    /// every other call sees `None`. Expired entries are dropped and reported
    /// as `None`.
    async fn take(&mut self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;
}
