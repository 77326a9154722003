//! Fetch coordinator: decides per cycle whether to serve cached data or run
//! the fetcher, and reports the outcome through the suspense contract.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::AbortHandle;
use turbo_cache::CacheStore;

use crate::error::FetchError;
use crate::options::{ErrorCallback, FetchOptions, Fetcher, SuccessCallback};
use crate::state::{FetchState, FetchStatus, TriggerToken};
use crate::suspense::{FetchResult, PendingHandle, SettleSignal, Suspense};

/// Coordinates fetching and caching for one consumer.
///
/// A cycle runs when the coordinator is activated, and again whenever its
/// dependencies change: the fetcher identity or the trigger token flipped by
/// [`refetch`](Self::refetch). Changing only the cache key does not start a
/// cycle; the new key is used by the next one.
///
/// Each cycle:
///
/// 1. moves to `Loading`;
/// 2. serves the cached value and moves to `Fetched` if the store holds a
///    fresh entry for the key;
/// 3. otherwise runs the fetcher on the Tokio runtime and moves to `Pending`;
/// 4. on success writes the value to the store, moves to `Fetched` and calls
///    `on_success`;
/// 5. on failure moves to `Error` and calls `on_error`. A fetcher that
///    panics fails the cycle with [`FetchError::Panicked`].
///
/// The fetcher is called without any internal lock held.
///
/// Outcomes of superseded cycles, and of cycles still running when the
/// coordinator is deactivated, are dropped. The running fetch task is
/// aborted in both cases.
///
/// # Example
///
/// ```rust,ignore
/// let store = CacheStore::new();
/// let products = FetchCoordinator::new(
///     store.clone(),
///     FetchOptions::new("products", fetcher(load_products))
///         .cache_time(Duration::from_secs(60)),
/// );
/// products.activate();
///
/// match products.read() {
///     Suspense::Pending(handle) => handle.await,
///     Suspense::Ready(result) => render(result.data),
///     Suspense::Failed(error) => boundary.report(error),
/// }
/// ```
pub struct FetchCoordinator<T> {
    shared: Arc<Shared<T>>,
}

pub(crate) struct Shared<T> {
    store: CacheStore,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    cache_key: String,
    fetcher: Fetcher<T>,
    cache_time: Option<Duration>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    state: FetchState<T>,
    trigger: TriggerToken,
    /// Dependencies the current cycle ran with; `None` until activated.
    ran_with: Option<Dependencies<T>>,
    cycle: u64,
    active: bool,
    in_flight: Option<AbortHandle>,
}

/// A cache-miss cycle whose fetcher has not been called yet.
struct StartFetch<T> {
    cycle: u64,
    fetcher: Fetcher<T>,
    signal: SettleSignal,
}

struct Dependencies<T> {
    fetcher: Fetcher<T>,
    trigger: TriggerToken,
}

impl<T> Dependencies<T> {
    fn same_as(&self, fetcher: &Fetcher<T>, trigger: TriggerToken) -> bool {
        Arc::ptr_eq(&self.fetcher, fetcher) && self.trigger == trigger
    }
}

impl<T> Inner<T> {
    fn dependencies_changed(&self) -> bool {
        match &self.ran_with {
            Some(deps) => !deps.same_as(&self.fetcher, self.trigger),
            None => true,
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

impl<T> FetchCoordinator<T>
where
    T: Send + Sync + 'static,
{
    /// Create a coordinator in the `Init` state.
    ///
    /// Nothing is fetched until [`activate`](Self::activate) is called.
    pub fn new(store: CacheStore, options: FetchOptions<T>) -> Self {
        let FetchOptions {
            cache_key,
            fetcher,
            cache_time,
            on_success,
            on_error,
        } = options;

        Self {
            shared: Arc::new(Shared {
                store,
                inner: Mutex::new(Inner {
                    cache_key,
                    fetcher,
                    cache_time,
                    on_success,
                    on_error,
                    state: FetchState::Init,
                    trigger: TriggerToken::default(),
                    ran_with: None,
                    cycle: 0,
                    active: false,
                    in_flight: None,
                }),
            }),
        }
    }

    /// Attach the coordinator to its consumer and run a cycle if the
    /// dependencies changed since the last one.
    ///
    /// # Panics
    ///
    /// Starting a fetch spawns a task, so this must be called from within a
    /// Tokio runtime.
    pub fn activate(&self) {
        self.shared.lock().active = true;
        self.shared.sync();
    }

    /// Detach the coordinator from its consumer.
    ///
    /// Aborts the running fetch task, if any, and drops a `Pending` state
    /// back to `Init`. Results arriving afterwards are ignored. Activating
    /// again starts a fresh cycle.
    pub fn deactivate(&self) {
        self.shared.deactivate();
    }

    /// Whether the coordinator is attached to a consumer.
    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    /// Start a new cycle regardless of cache freshness.
    ///
    /// The cache is not cleared, the new cycle consults it as usual. If the
    /// coordinator is inactive the trigger is recorded and the cycle runs on
    /// the next [`activate`](Self::activate).
    pub fn refetch(&self) {
        self.shared.refetch();
    }

    /// Get a zero-argument refetch handle for a renderer.
    pub fn refetch_handle(&self) -> Refetch<T> {
        Refetch {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Replace the fetcher. Runs a cycle if it is a different fetcher and
    /// the coordinator is active.
    pub fn set_fetcher(&self, fetcher: Fetcher<T>) {
        self.shared.lock().fetcher = fetcher;
        self.shared.sync();
    }

    /// Change the cache key used by future cycles.
    ///
    /// This does not start a cycle by itself.
    pub fn set_cache_key(&self, cache_key: impl Into<String>) {
        self.shared.lock().cache_key = cache_key.into();
    }

    /// Current cache key.
    pub fn cache_key(&self) -> String {
        self.shared.lock().cache_key.clone()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FetchState<T> {
        self.shared.lock().state.clone()
    }

    /// Current status.
    pub fn status(&self) -> FetchStatus {
        self.shared.lock().state.status()
    }

    /// Number of cycles started so far.
    pub fn cycle(&self) -> u64 {
        self.shared.lock().cycle
    }

    /// Read the coordinator through the suspense contract.
    pub fn read(&self) -> Suspense<T> {
        let state = self.state();
        let refetch = self.refetch_handle();

        match state {
            FetchState::Pending(handle) => Suspense::Pending(handle),
            FetchState::Error(error) => Suspense::Failed(error),
            FetchState::Fetched(data) => Suspense::Ready(FetchResult {
                status: FetchStatus::Fetched,
                data: Some(data),
                error: None,
                refetch,
            }),
            other => Suspense::Ready(FetchResult {
                status: other.status(),
                data: None,
                error: None,
                refetch,
            }),
        }
    }

    /// Wait until the coordinator is no longer pending.
    ///
    /// This is the renderer side of the contract: await the pending handle,
    /// read again, and repeat until the result is ready or failed.
    pub async fn resolve(&self) -> Result<FetchResult<T>, Arc<FetchError>> {
        loop {
            match self.read() {
                Suspense::Pending(handle) => handle.await,
                Suspense::Ready(result) => return Ok(result),
                Suspense::Failed(error) => return Err(error),
            }
        }
    }
}

impl<T> Drop for FetchCoordinator<T> {
    fn drop(&mut self) {
        self.shared.deactivate();
    }
}

impl<T> fmt::Debug for FetchCoordinator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("FetchCoordinator")
            .field("cache_key", &inner.cache_key)
            .field("state", &inner.state)
            .field("cycle", &inner.cycle)
            .field("active", &inner.active)
            .finish_non_exhaustive()
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deactivate(&self) {
        let mut inner = self.lock();
        if inner.active {
            tracing::debug!(cache_key = %inner.cache_key, cycle = inner.cycle, "coordinator deactivated");
        }
        inner.active = false;
        inner.ran_with = None;
        inner.cancel_in_flight();
        // a cancelled cycle has no outcome to wait for
        if matches!(inner.state, FetchState::Pending(_)) {
            inner.state = FetchState::Init;
        }
    }
}

impl<T> Shared<T>
where
    T: Send + Sync + 'static,
{
    fn refetch(self: &Arc<Self>) {
        self.lock().trigger.flip();
        self.sync();
    }

    /// Run a cycle if active and the dependencies changed.
    fn sync(self: &Arc<Self>) {
        let mut inner = self.lock();
        if !inner.active || !inner.dependencies_changed() {
            return;
        }
        if let Some(start) = self.begin_cycle(&mut inner) {
            drop(inner);
            self.start_fetch(start);
        }
    }

    /// Steps that need the lock. Returns the fetch to start on a cache miss.
    fn begin_cycle(&self, inner: &mut Inner<T>) -> Option<StartFetch<T>> {
        inner.cancel_in_flight();
        inner.cycle += 1;
        inner.ran_with = Some(Dependencies {
            fetcher: inner.fetcher.clone(),
            trigger: inner.trigger,
        });

        let cycle = inner.cycle;
        inner.state = FetchState::Loading;
        tracing::trace!(cache_key = %inner.cache_key, cycle, status = "loading", "fetch cycle started");

        if !self.store.is_expired(&inner.cache_key) {
            if let Some(data) = self.store.get::<T>(&inner.cache_key) {
                tracing::debug!(cache_key = %inner.cache_key, cycle, "serving fresh cache entry");
                inner.state = FetchState::Fetched(data);
                return None;
            }
        }

        tracing::debug!(cache_key = %inner.cache_key, cycle, "cache miss, fetching");

        let (signal, handle) = PendingHandle::channel();
        inner.state = FetchState::Pending(handle);
        Some(StartFetch {
            cycle,
            fetcher: inner.fetcher.clone(),
            signal,
        })
    }

    /// Call the fetcher and spawn the task awaiting it. Runs without the
    /// lock held, so a fetcher may call back into this coordinator.
    fn start_fetch(self: &Arc<Self>, start: StartFetch<T>) {
        let StartFetch {
            cycle,
            fetcher,
            signal,
        } = start;

        let fetch = panic::catch_unwind(AssertUnwindSafe(|| fetcher()));
        let shared = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            // a panicking fetcher still settles the cycle, as an error
            let outcome = match fetch {
                Ok(fetch) => AssertUnwindSafe(fetch)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(FetchError::panicked(payload))),
                Err(payload) => Err(FetchError::panicked(payload)),
            };
            if let Some(shared) = shared.upgrade() {
                shared.settle(cycle, outcome);
            }
            signal.settle();
        });

        let mut inner = self.lock();
        if inner.active && inner.cycle == cycle {
            inner.in_flight = Some(task.abort_handle());
        } else {
            // superseded or deactivated while the fetcher was being called
            task.abort();
        }
    }

    /// Apply the outcome of `cycle`, unless it has been superseded.
    fn settle(&self, cycle: u64, outcome: Result<T, FetchError>) {
        let mut inner = self.lock();
        if !inner.active || inner.cycle != cycle {
            tracing::trace!(cache_key = %inner.cache_key, cycle, "dropping superseded fetch result");
            return;
        }
        inner.in_flight = None;

        match outcome {
            Ok(data) => {
                let data = Arc::new(data);
                self.store
                    .set_shared(inner.cache_key.clone(), data.clone(), inner.cache_time);
                inner.state = FetchState::Fetched(data.clone());
                tracing::debug!(cache_key = %inner.cache_key, cycle, status = "fetched", "fetch succeeded");

                let on_success = inner.on_success.clone();
                drop(inner);
                if let Some(on_success) = on_success {
                    on_success(&data);
                }
            }
            Err(error) => {
                let error = Arc::new(error);
                inner.state = FetchState::Error(error.clone());
                tracing::warn!(cache_key = %inner.cache_key, cycle, error = %error, "fetch failed");

                let on_error = inner.on_error.clone();
                drop(inner);
                if let Some(on_error) = on_error {
                    on_error(&error);
                }
            }
        }
    }
}

/// Zero-argument refetch operation handed to renderers.
///
/// Holds the coordinator weakly; refetching after the coordinator is gone
/// does nothing.
pub struct Refetch<T> {
    shared: Weak<Shared<T>>,
}

impl<T> Refetch<T>
where
    T: Send + Sync + 'static,
{
    /// Start a new fetch cycle.
    pub fn refetch(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.refetch();
        }
    }
}

impl<T> Clone for Refetch<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Refetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refetch")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}
