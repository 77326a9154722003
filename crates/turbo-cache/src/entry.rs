//! Stored entries and their freshness bookkeeping.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// A value stored under one cache key.
///
/// The payload is type-erased so a single store can hold every resource an
/// application fetches. Readers name the type they expect.
#[derive(Clone)]
pub(crate) struct CacheEntry {
    pub(crate) data: Arc<dyn Any + Send + Sync>,
    pub(crate) type_name: &'static str,
    pub(crate) stored_at: Instant,
    pub(crate) ttl: Duration,
}

impl CacheEntry {
    pub(crate) fn new<T: Send + Sync + 'static>(data: Arc<T>, ttl: Duration) -> Self {
        Self {
            data,
            type_name: std::any::type_name::<T>(),
            stored_at: Instant::now(),
            ttl,
        }
    }

    pub(crate) fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }

    /// True once `now - stored_at > ttl`.
    pub(crate) fn is_expired(&self) -> bool {
        self.age() > self.ttl
    }

    pub(crate) fn info(&self, key: &str) -> EntryInfo {
        let age = self.age();
        EntryInfo {
            key: key.to_string(),
            type_name: self.type_name,
            stored_at: self.stored_at,
            ttl: self.ttl,
            age,
            expired: age > self.ttl,
        }
    }
}

/// Snapshot of an entry's metadata, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// The cache key.
    pub key: String,
    /// Type name of the stored value.
    pub type_name: &'static str,
    /// When the entry was written.
    pub stored_at: Instant,
    /// Time-to-live the entry was written with.
    pub ttl: Duration,
    /// Time since the entry was written.
    pub age: Duration,
    /// Whether the entry is past its time-to-live.
    pub expired: bool,
}

impl EntryInfo {
    /// Remaining freshness, zero once expired.
    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.age)
    }
}
