//! Suspend-until-ready contract between a coordinator and its renderer.
//!
//! Instead of unwinding, [`FetchCoordinator::read`](crate::FetchCoordinator::read)
//! returns a [`Suspense`] the caller matches on:
//!
//! - `Pending(handle)`: not ready. Await the handle, then read again.
//! - `Ready(result)`: render `result.data`.
//! - `Failed(error)`: hand the error to the failure boundary.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::coordinator::Refetch;
use crate::error::FetchError;
use crate::state::FetchStatus;

/// Future that completes when the cycle it was handed out for settles.
///
/// It also completes if that cycle is superseded or cancelled, so a caller
/// waiting on it always wakes up and re-reads the coordinator. Cloning gives
/// another waiter for the same cycle.
#[derive(Clone)]
pub struct PendingHandle {
    inner: Shared<BoxFuture<'static, ()>>,
}

impl PendingHandle {
    /// Create a handle and the signal that settles it.
    pub(crate) fn channel() -> (SettleSignal, Self) {
        let (tx, rx) = oneshot::channel::<()>();
        // a dropped sender counts as settled
        let inner = rx.map(|_| ()).boxed().shared();
        (SettleSignal(tx), Self { inner })
    }

    /// Check if the cycle has settled, without waiting.
    pub fn is_settled(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl Future for PendingHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingHandle")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Settles a [`PendingHandle`]. Dropping it settles the handle as well.
pub(crate) struct SettleSignal(oneshot::Sender<()>);

impl SettleSignal {
    pub(crate) fn settle(self) {
        let _ = self.0.send(());
    }
}

/// What a renderer gets back from a coordinator when the data is not
/// pending and has not failed.
pub struct FetchResult<T> {
    /// `Init`, `Loading` or `Fetched`.
    pub status: FetchStatus,
    /// Set when `status` is `Fetched`.
    pub data: Option<Arc<T>>,
    /// Always `None`; failures are reported through [`Suspense::Failed`].
    pub error: Option<Arc<FetchError>>,
    /// Starts a new fetch cycle.
    pub refetch: Refetch<T>,
}

impl<T> FetchResult<T> {
    /// Check if data is available.
    pub fn is_fetched(&self) -> bool {
        self.status == FetchStatus::Fetched
    }
}

impl<T> Clone for FetchResult<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            refetch: self.refetch.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FetchResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResult")
            .field("status", &self.status)
            .field("data", &self.data)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Outcome of reading a coordinator.
pub enum Suspense<T> {
    /// Not ready; await the handle, then read again.
    Pending(PendingHandle),
    /// Returned normally.
    Ready(FetchResult<T>),
    /// The fetch failed; propagate to failure handling.
    Failed(Arc<FetchError>),
}

impl<T> Suspense<T> {
    /// The status this outcome reports.
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Pending(_) => FetchStatus::Pending,
            Self::Ready(result) => result.status,
            Self::Failed(_) => FetchStatus::Error,
        }
    }

    /// Check if the caller has to wait.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Get the ready result, if any.
    pub fn ready(self) -> Option<FetchResult<T>> {
        match self {
            Self::Ready(result) => Some(result),
            _ => None,
        }
    }

    /// Get the failure, if any.
    pub fn failure(&self) -> Option<&Arc<FetchError>> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Suspense<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(handle) => f.debug_tuple("Pending").field(handle).finish(),
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_settles_on_signal() {
        let (signal, handle) = PendingHandle::channel();
        let waiter = handle.clone();
        assert!(!handle.is_settled());

        signal.settle();
        waiter.await;
        assert!(handle.is_settled());
    }

    #[tokio::test]
    async fn test_handle_settles_when_signal_dropped() {
        let (signal, handle) = PendingHandle::channel();
        drop(signal);

        handle.clone().await;
        assert!(handle.is_settled());
    }
}
