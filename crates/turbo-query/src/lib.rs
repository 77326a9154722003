//! Cached, deduplicated data fetching for TurboCommerce renderers.
//!
//! This crate provides:
//! - `FetchCoordinator` - Per-consumer fetch state machine backed by a shared `CacheStore`
//! - `Suspense` - Pending / ready / failed outcome a renderer matches on
//! - `Mutation` - One-shot writes that invalidate cached reads
//! - `QueryConfig` - Cache and logging configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use turbo_query::prelude::*;
//!
//! let store = CacheStore::new();
//!
//! let products = FetchCoordinator::new(
//!     store.clone(),
//!     FetchOptions::new("products", fetcher(|| async { api::products().await }))
//!         .cache_time(Duration::from_secs(60))
//!         .on_error(|e| tracing::warn!(error = %e, "products unavailable")),
//! );
//! products.activate();
//!
//! // renderer side: wait while pending, then render or report
//! match products.resolve().await {
//!     Ok(result) => render(result.data),
//!     Err(error) => show_error(error),
//! }
//! ```

mod config;
mod coordinator;
mod error;
mod mutation;
mod options;
mod state;
mod suspense;

pub use config::*;
pub use coordinator::{FetchCoordinator, Refetch};
pub use error::*;
pub use mutation::*;
pub use options::*;
pub use state::*;
pub use suspense::{FetchResult, PendingHandle, Suspense};

pub use turbo_cache::{CacheConfig, CacheStore, EntryInfo};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        fetcher, mutator, CacheStore, FetchCoordinator, FetchError, FetchOptions, FetchResult,
        FetchStatus, Mutation, MutationOptions, Suspense,
    };
}
