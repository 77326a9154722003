//! In-memory cache store with per-key time-to-live.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, EntryInfo};

/// TTL applied when neither the write nor the store configuration names one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Shared key-value cache for fetched data.
///
/// Cloning a `CacheStore` yields another handle to the same map, so one
/// store can be created at startup and handed to every coordinator. There is
/// at most one entry per key; every write replaces the previous entry as a
/// whole, so readers never see a partially written value.
///
/// None of the operations fail. Absent and expired are ordinary answers.
///
/// # Example
///
/// ```rust,ignore
/// let store = CacheStore::new();
///
/// store.set("cart:42", cart, Some(Duration::from_secs(30)));
///
/// if let Some(cart) = store.get::<Cart>("cart:42") {
///     if store.is_expired("cart:42") {
///         // stale, refetch
///     }
/// }
/// ```
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl CacheStore {
    /// Create an empty store using [`DEFAULT_TTL`].
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    /// Create an empty store with the given default TTL.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: RwLock::new(HashMap::new()),
                default_ttl,
            }),
        }
    }

    /// Create an empty store from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_default_ttl(config.default_ttl())
    }

    /// The TTL used by writes that don't name one.
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Get the value stored under `key`.
    ///
    /// Returns `None` if there is no entry, or if the entry holds a value of
    /// another type. Expired entries are still returned; check
    /// [`is_expired`](Self::is_expired) for freshness.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let entry = self.read().get(key)?.clone();

        match entry.data.downcast::<T>() {
            Ok(data) => Some(data),
            Err(_) => {
                tracing::warn!(
                    cache_key = key,
                    stored = entry.type_name,
                    requested = std::any::type_name::<T>(),
                    "cache entry holds a different type"
                );
                None
            }
        }
    }

    /// Store `data` under `key`, replacing any previous entry.
    ///
    /// `stored_at` is set to now. When `ttl` is `None` the store's default
    /// TTL applies.
    pub fn set<T>(&self, key: impl Into<String>, data: T, ttl: Option<Duration>)
    where
        T: Send + Sync + 'static,
    {
        self.set_shared(key, Arc::new(data), ttl);
    }

    /// Store an already shared value under `key`.
    pub fn set_shared<T>(&self, key: impl Into<String>, data: Arc<T>, ttl: Option<Duration>)
    where
        T: Send + Sync + 'static,
    {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.inner.default_ttl);

        tracing::trace!(cache_key = %key, ttl_ms = ttl.as_millis() as u64, "cache set");

        self.write().insert(key, CacheEntry::new(data, ttl));
    }

    /// True if there is no entry for `key`, or if it is older than its TTL.
    pub fn is_expired(&self, key: &str) -> bool {
        self.read().get(key).map_or(true, CacheEntry::is_expired)
    }

    /// Check if an entry exists, fresh or not.
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Metadata for the entry under `key`.
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.read().get(key).map(|entry| entry.info(key))
    }

    /// Remove the entry under `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Drop the entry under `key` so the next fetch cycle goes to the source.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.remove(key);
        if removed {
            tracing::debug!(cache_key = key, "cache entry invalidated");
        }
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Physically remove expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored entries, including expired ones.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("default_ttl", &self.inner.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[derive(Debug, Clone, PartialEq)]
    struct Product {
        id: u32,
    }

    #[test]
    fn test_unset_key_is_absent_and_expired() {
        let store = CacheStore::new();

        assert!(store.get::<Vec<Product>>("products").is_none());
        assert!(store.is_expired("products"));
        assert!(!store.contains("products"));
        assert!(store.entry_info("products").is_none());
    }

    #[test]
    fn test_set_then_get_is_fresh() {
        let store = CacheStore::new();
        store.set("products", vec![Product { id: 1 }], Some(Duration::from_secs(1)));

        let products = store.get::<Vec<Product>>("products").unwrap();
        assert_eq!(*products, vec![Product { id: 1 }]);
        assert!(!store.is_expired("products"));
    }

    #[test]
    fn test_set_overwrites() {
        let store = CacheStore::new();
        store.set("count", 1u32, None);
        store.set("count", 2u32, None);

        assert_eq!(store.len(), 1);
        assert_eq!(*store.get::<u32>("count").unwrap(), 2);
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let store = CacheStore::new();
        store.set("count", 1u32, None);

        assert!(store.get::<String>("count").is_none());
        assert!(store.get::<u32>("count").is_some());
    }

    #[test]
    fn test_clones_share_entries() {
        let store = CacheStore::new();
        let other = store.clone();

        other.set("carts", vec![3u32], None);
        assert_eq!(*store.get::<Vec<u32>>("carts").unwrap(), vec![3]);
    }

    #[test]
    fn test_set_shared_keeps_the_same_allocation() {
        let store = CacheStore::new();
        let data = Arc::new(String::from("payload"));

        store.set_shared("k", data.clone(), None);
        assert!(Arc::ptr_eq(&store.get::<String>("k").unwrap(), &data));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_independent_of_presence() {
        let store = CacheStore::new();
        store.set("products", vec![Product { id: 1 }], Some(Duration::from_millis(1000)));

        time::advance(Duration::from_millis(999)).await;
        assert!(!store.is_expired("products"));

        time::advance(Duration::from_millis(2)).await;
        assert!(store.is_expired("products"));
        // stale data is still readable
        assert_eq!(
            *store.get::<Vec<Product>>("products").unwrap(),
            vec![Product { id: 1 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies_without_override() {
        let store = CacheStore::with_default_ttl(Duration::from_millis(50));
        store.set("a", 1u8, None);
        store.set("b", 2u8, Some(Duration::from_millis(500)));

        assert_eq!(store.entry_info("a").unwrap().ttl, Duration::from_millis(50));

        time::advance(Duration::from_millis(100)).await;
        assert!(store.is_expired("a"));
        assert!(!store.is_expired("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_refreshes_stored_at() {
        let store = CacheStore::new();
        store.set("k", 1u8, Some(Duration::from_millis(10)));

        time::advance(Duration::from_millis(20)).await;
        assert!(store.is_expired("k"));

        store.set("k", 2u8, Some(Duration::from_millis(10)));
        assert!(!store.is_expired("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = CacheStore::new();
        store.set("short", 1u8, Some(Duration::from_millis(10)));
        store.set("long", 2u8, Some(Duration::from_secs(10)));

        time::advance(Duration::from_millis(50)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.keys(), vec!["long".to_string()]);
    }

    #[test]
    fn test_remove_invalidate_clear() {
        let store = CacheStore::new();
        store.set("a", 1u8, None);
        store.set("b", 2u8, None);
        store.set("c", 3u8, None);

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.invalidate("b"));
        assert_eq!(store.keys(), vec!["c".to_string()]);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_config() {
        let store = CacheStore::from_config(&CacheConfig::new(Duration::from_secs(2)));
        assert_eq!(store.default_ttl(), Duration::from_secs(2));
    }
}
