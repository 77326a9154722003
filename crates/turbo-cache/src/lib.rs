//! Process-wide in-memory cache store for TurboCommerce data fetching.
//!
//! Maps a cache key to the last value fetched for it, together with the
//! time it was stored and the time-to-live it was stored with. Freshness and
//! presence are separate signals: an expired entry can still be read, callers
//! decide whether stale data is good enough.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use turbo_cache::CacheStore;
//!
//! let store = CacheStore::with_default_ttl(Duration::from_secs(60));
//!
//! store.set("products", vec![1, 2, 3], None);
//!
//! let products = store.get::<Vec<u32>>("products");
//! assert!(!store.is_expired("products"));
//! ```

mod config;
mod entry;
mod store;

pub use config::CacheConfig;
pub use entry::EntryInfo;
pub use store::{CacheStore, DEFAULT_TTL};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{CacheConfig, CacheStore, EntryInfo};
}
