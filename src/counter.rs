use anyhow::Context;

/// Low-latency store for the live counter value. Every read and increment
/// during serving goes through this and nothing else.
#[async_trait::async_trait]
pub trait CounterCache: Send + Sync {
    /// Set the cached value unconditionally. Only called once, at boot.
    async fn seed(&self, value: u64) -> anyhow::Result<()>;

    /// Current cached value, `None` if the key was never set.
    async fn current(&self) -> anyhow::Result<Option<u64>>;

    /// Atomically add one and return the new value.
    async fn increment(&self) -> anyhow::Result<u64>;
}

/// Durable home of the counter across restarts. Only touched at boot and by
/// the periodic flush, never while serving a request.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Make sure the backing table and its single row exist. Safe to call
    /// more than once.
    async fn ensure_schema(&self) -> anyhow::Result<()>;

    /// Persisted value, `None` if no row exists yet.
    async fn load(&self) -> anyhow::Result<Option<u64>>;

    /// Overwrite the persisted value. A full overwrite, not an increment.
    async fn save(&self, value: u64) -> anyhow::Result<()>;
}

/// Glue between the cache and the durable store: seeds the cache at boot,
/// answers read/increment traffic from the cache alone, and copies the cached
/// value back into the store when the flush task asks for it.
pub struct CounterService<C, S> {
    cache: C,
    store: S,
}

impl<C, S> CounterService<C, S>
where
    C: CounterCache,
    S: CounterStore,
{
    pub fn new(cache: C, store: S) -> Self {
        Self { cache, store }
    }

    /// One-time startup sequence: schema setup (best effort), then seed the
    /// cache with the persisted value, defaulting to 0 when no row exists.
    ///
    /// A failed read is not the same as a missing row: on a read error the
    /// seed is skipped entirely, so a cache that survived a service restart
    /// keeps its value instead of being overwritten with a wrong default.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        if let Err(err) = self.store.ensure_schema().await {
            tracing::warn!("fail to ensure counter schema: {err:#}");
        }

        let persisted = self
            .store
            .load()
            .await
            .with_context(|| "read persisted counter")?;
        let value = persisted.unwrap_or(0);

        self.cache
            .seed(value)
            .await
            .with_context(|| "seed counter cache")?;
        tracing::info!(value, "counter cache seeded");

        Ok(())
    }

    /// Current value as served to clients. An unset key reads as 0.
    pub async fn read(&self) -> anyhow::Result<u64> {
        Ok(self.cache.current().await?.unwrap_or(0))
    }

    /// Bump the counter and return the new value.
    pub async fn increment(&self) -> anyhow::Result<u64> {
        self.cache.increment().await
    }

    /// Copy the cache's current value into the durable store, returning the
    /// value that was written.
    pub async fn flush(&self) -> anyhow::Result<u64> {
        let value = self.cache.current().await?.unwrap_or(0);
        self.store.save(value).await?;
        Ok(value)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testkit::{MemCache, MemStore};
    use super::*;

    fn service(cache: &MemCache, store: &MemStore) -> CounterService<MemCache, MemStore> {
        CounterService::new(cache.clone(), store.clone())
    }

    #[tokio::test]
    async fn bootstrap_seeds_zero_without_persisted_row() {
        let cache = MemCache::default();
        let store = MemStore::default();
        let counter = service(&cache, &store);

        counter.bootstrap().await.unwrap();

        assert_eq!(cache.value(), Some(0));
        assert_eq!(counter.read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bootstrap_restores_persisted_value() {
        let cache = MemCache::default();
        let store = MemStore::with_row(42);
        let counter = service(&cache, &store);

        counter.bootstrap().await.unwrap();

        assert_eq!(counter.read().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn bootstrap_keeps_cache_value_when_load_fails() {
        let cache = MemCache::default();
        cache.seed(7).await.unwrap();
        let store = MemStore::default();
        store.refuse_loads(true);
        let counter = service(&cache, &store);

        assert!(counter.bootstrap().await.is_err());
        assert_eq!(cache.value(), Some(7));
    }

    #[tokio::test]
    async fn unseeded_cache_reads_as_zero() {
        let cache = MemCache::default();
        let counter = service(&cache, &MemStore::default());

        assert_eq!(counter.read().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_increments_are_gap_free() {
        let cache = MemCache::default();
        let store = MemStore::with_row(10);
        let counter = Arc::new(service(&cache, &store));
        counter.bootstrap().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                counter.increment().await.unwrap()
            }));
        }

        let mut returned = Vec::new();
        for handle in handles {
            returned.push(handle.await.unwrap());
        }
        returned.sort_unstable();

        let expected: Vec<u64> = (11..=42).collect();
        assert_eq!(returned, expected);
    }

    #[tokio::test]
    async fn read_after_increment_never_goes_backwards() {
        let cache = MemCache::default();
        let counter = service(&cache, &MemStore::default());
        counter.bootstrap().await.unwrap();

        let bumped = counter.increment().await.unwrap();
        assert!(counter.read().await.unwrap() >= bumped);
    }

    #[tokio::test]
    async fn flush_persists_the_current_value() {
        let cache = MemCache::default();
        let store = MemStore::with_row(5);
        let counter = service(&cache, &store);
        counter.bootstrap().await.unwrap();

        for _ in 0..3 {
            counter.increment().await.unwrap();
        }

        assert_eq!(counter.flush().await.unwrap(), 8);
        assert_eq!(store.row(), Some(8));
    }

    #[tokio::test]
    async fn flush_defaults_unseeded_cache_to_zero() {
        let cache = MemCache::default();
        let store = MemStore::default();
        let counter = service(&cache, &store);

        counter.flush().await.unwrap();

        assert_eq!(store.row(), Some(0));
    }

    #[tokio::test]
    async fn flush_surfaces_store_errors() {
        let cache = MemCache::default();
        let store = MemStore::with_row(3);
        let counter = service(&cache, &store);
        counter.bootstrap().await.unwrap();
        counter.increment().await.unwrap();

        store.refuse_saves(true);
        assert!(counter.flush().await.is_err());
        assert_eq!(store.row(), Some(3));
    }

    #[tokio::test]
    async fn schema_setup_twice_is_harmless() {
        let store = MemStore::default();

        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();

        assert_eq!(store.schema_runs(), 2);
    }
}
