//! Mutations: one-shot async writes that invalidate cached reads.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use turbo_cache::CacheStore;

use crate::error::FetchError;
use crate::options::{ErrorCallback, SuccessCallback};

/// Async operation performing a write, e.g. adding an item to a cart.
pub type Mutator<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, FetchError>> + Send + Sync>;

/// Wrap an async closure as a [`Mutator`].
pub fn mutator<I, O, F, Fut>(f: F) -> Mutator<I, O>
where
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, FetchError>> + Send + 'static,
{
    Arc::new(move |input| f(input).boxed())
}

/// Status of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    /// Never run.
    #[default]
    Idle,
    /// Running.
    Loading,
    /// Last run succeeded.
    Success,
    /// Last run failed.
    Error,
}

/// State of the most recent mutation.
pub enum MutationState<O> {
    Idle,
    Loading,
    Success(Arc<O>),
    Error(Arc<FetchError>),
}

impl<O> MutationState<O> {
    /// The status tag of this state.
    pub fn status(&self) -> MutationStatus {
        match self {
            Self::Idle => MutationStatus::Idle,
            Self::Loading => MutationStatus::Loading,
            Self::Success(_) => MutationStatus::Success,
            Self::Error(_) => MutationStatus::Error,
        }
    }

    /// Result of the last successful run.
    pub fn data(&self) -> Option<&Arc<O>> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Error of the last failed run.
    pub fn error(&self) -> Option<&Arc<FetchError>> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }
}

impl<O> Clone for MutationState<O> {
    fn clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Loading => Self::Loading,
            Self::Success(data) => Self::Success(data.clone()),
            Self::Error(error) => Self::Error(error.clone()),
        }
    }
}

impl<O> fmt::Debug for MutationState<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
            other => write!(f, "{:?}", other.status()),
        }
    }
}

/// Options for a [`Mutation`].
pub struct MutationOptions<I, O> {
    /// The write operation.
    pub mutator: Mutator<I, O>,
    /// Success notification.
    pub on_success: Option<SuccessCallback<O>>,
    /// Failure notification.
    pub on_error: Option<ErrorCallback>,
    /// Cache keys dropped after a successful run.
    pub invalidates: Vec<String>,
}

impl<I, O> MutationOptions<I, O> {
    /// Create options for the given mutator.
    pub fn new(mutator: Mutator<I, O>) -> Self {
        Self {
            mutator,
            on_success: None,
            on_error: None,
            invalidates: Vec::new(),
        }
    }

    /// Set the success callback.
    pub fn on_success(mut self, f: impl Fn(&O) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Set the error callback.
    pub fn on_error(mut self, f: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Invalidate a cache key after each successful run.
    pub fn invalidates(mut self, key: impl Into<String>) -> Self {
        self.invalidates.push(key.into());
        self
    }
}

/// Runs a write and tracks its outcome.
///
/// Unlike reads, a mutation runs only when asked to and never consults the
/// cache. A successful run invalidates the configured keys so coordinators
/// reading them go back to the source on their next cycle. Failures are not
/// retried.
///
/// # Example
///
/// ```rust,ignore
/// let add_to_cart = Mutation::new(
///     store.clone(),
///     MutationOptions::new(mutator(|item: CartItem| api.add_cart(item)))
///         .invalidates("carts"),
/// );
///
/// add_to_cart.mutate(item).await?;
/// carts.refetch();
/// ```
pub struct Mutation<I, O> {
    store: CacheStore,
    options: MutationOptions<I, O>,
    state: Mutex<MutationState<O>>,
    generation: AtomicU64,
}

impl<I, O> Mutation<I, O>
where
    O: Send + Sync + 'static,
{
    /// Create an idle mutation.
    pub fn new(store: CacheStore, options: MutationOptions<I, O>) -> Self {
        Self {
            store,
            options,
            state: Mutex::new(MutationState::Idle),
            generation: AtomicU64::new(0),
        }
    }

    /// Run the mutator with `input`.
    ///
    /// If runs overlap, the state reflects the one started last; each caller
    /// still gets its own outcome.
    pub async fn mutate(&self, input: I) -> Result<Arc<O>, Arc<FetchError>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.lock() = MutationState::Loading;

        let outcome = (self.options.mutator)(input).await;
        let current = self.generation.load(Ordering::SeqCst) == generation;

        match outcome {
            Ok(data) => {
                let data = Arc::new(data);
                for key in &self.options.invalidates {
                    self.store.invalidate(key);
                }
                if current {
                    *self.lock() = MutationState::Success(data.clone());
                }
                tracing::debug!(invalidated = ?self.options.invalidates, "mutation succeeded");
                if let Some(on_success) = &self.options.on_success {
                    on_success(&data);
                }
                Ok(data)
            }
            Err(error) => {
                let error = Arc::new(error);
                if current {
                    *self.lock() = MutationState::Error(error.clone());
                }
                tracing::warn!(error = %error, "mutation failed");
                if let Some(on_error) = &self.options.on_error {
                    on_error(&error);
                }
                Err(error)
            }
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> MutationState<O> {
        self.lock().clone()
    }

    /// Current status.
    pub fn status(&self) -> MutationStatus {
        self.lock().status()
    }

    /// Return to `Idle`.
    pub fn reset(&self) {
        *self.lock() = MutationState::Idle;
    }

    fn lock(&self) -> MutexGuard<'_, MutationState<O>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("invalidates", &self.options.invalidates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct CartItem {
        product_id: u32,
        count: u32,
    }

    #[tokio::test]
    async fn test_success_invalidates_keys() {
        let store = CacheStore::new();
        store.set("carts", vec![CartItem { product_id: 1, count: 1 }], None);
        store.set("products", vec![1u32], None);

        let successes = Arc::new(AtomicUsize::new(0));
        let counter = successes.clone();
        let add_cart = Mutation::new(
            store.clone(),
            MutationOptions::new(mutator(|item: CartItem| async move { Ok(vec![item]) }))
                .invalidates("carts")
                .on_success(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        );
        assert_eq!(add_cart.status(), MutationStatus::Idle);

        let item = CartItem { product_id: 2, count: 3 };
        let carts = add_cart.mutate(item.clone()).await.unwrap();

        assert_eq!(*carts, vec![item]);
        assert_eq!(add_cart.status(), MutationStatus::Success);
        assert!(!store.contains("carts"));
        assert!(store.contains("products"));
        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_cache_and_reports() {
        let store = CacheStore::new();
        store.set("carts", 1u32, None);

        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        let add_cart = Mutation::new(
            store.clone(),
            MutationOptions::new(mutator(|_: u32| async {
                Err::<u32, _>(FetchError::http(500, "/api/cart"))
            }))
            .invalidates("carts")
            .on_error(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let error = add_cart.mutate(1).await.unwrap_err();
        assert_eq!(*error, FetchError::http(500, "/api/cart"));
        assert_eq!(add_cart.status(), MutationStatus::Error);
        assert!(add_cart.state().error().is_some());
        assert!(store.contains("carts"));
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        add_cart.reset();
        assert_eq!(add_cart.status(), MutationStatus::Idle);
    }
}
