//! Coordinator construction options.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use crate::error::FetchError;

/// Shareable async producer of `T`.
///
/// The coordinator treats two fetchers as the same dependency only if they
/// are the same allocation (`Arc::ptr_eq`). Build one with [`fetcher`].
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

/// Called with the fetched value after a successful fetch.
pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Called with the error after a failed fetch.
pub type ErrorCallback = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Wrap an async closure as a [`Fetcher`].
///
/// # Example
///
/// ```rust,ignore
/// let products = fetcher(|| async {
///     client.get("/api/products").send()?.json::<Vec<Product>>()
/// });
/// ```
pub fn fetcher<T, F, Fut>(f: F) -> Fetcher<T>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Options for a [`FetchCoordinator`](crate::FetchCoordinator).
pub struct FetchOptions<T> {
    /// Key the fetched value is cached under.
    pub cache_key: String,
    /// Produces the value on a cache miss.
    pub fetcher: Fetcher<T>,
    /// TTL override for values written by this coordinator.
    pub cache_time: Option<Duration>,
    /// Success notification.
    pub on_success: Option<SuccessCallback<T>>,
    /// Failure notification.
    pub on_error: Option<ErrorCallback>,
}

impl<T> FetchOptions<T> {
    /// Create options with the two required fields.
    pub fn new(cache_key: impl Into<String>, fetcher: Fetcher<T>) -> Self {
        Self {
            cache_key: cache_key.into(),
            fetcher,
            cache_time: None,
            on_success: None,
            on_error: None,
        }
    }

    /// Override the store's default TTL.
    pub fn cache_time(mut self, ttl: Duration) -> Self {
        self.cache_time = Some(ttl);
        self
    }

    /// Set the success callback.
    pub fn on_success(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Set the error callback.
    pub fn on_error(mut self, f: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl<T> fmt::Debug for FetchOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("cache_key", &self.cache_key)
            .field("cache_time", &self.cache_time)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetcher_wraps_closure() {
        let f = fetcher(|| async { Ok::<_, FetchError>(42u32) });
        assert_eq!(f().await, Ok(42));
    }

    #[test]
    fn test_builder() {
        let options = FetchOptions::new("products", fetcher(|| async { Ok(1u8) }))
            .cache_time(Duration::from_secs(1))
            .on_success(|_| {})
            .on_error(|_| {});

        assert_eq!(options.cache_key, "products");
        assert_eq!(options.cache_time, Some(Duration::from_secs(1)));
        assert!(options.on_success.is_some());
        assert!(options.on_error.is_some());
    }
}
