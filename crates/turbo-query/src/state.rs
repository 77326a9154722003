//! Fetch state machine.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::suspense::PendingHandle;

/// Status of a coordinator within its current fetch cycle.
///
/// A cycle moves `Loading -> Fetched` on a fresh cache hit, or
/// `Loading -> Pending -> Fetched | Error` when the fetcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Constructed, no cycle has run yet.
    Init,
    /// A cycle started and is consulting the cache.
    Loading,
    /// The fetcher is running.
    Pending,
    /// Data is available.
    Fetched,
    /// The fetcher failed.
    Error,
}

impl FetchStatus {
    /// Check if this status ends a cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fetched | Self::Error)
    }

    /// Get the name of this status.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Loading => "loading",
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State owned by one coordinator.
///
/// Each variant carries only the field that belongs to it, so data, error
/// and the in-flight handle can never outlive the state they were set in.
pub enum FetchState<T> {
    Init,
    Loading,
    Pending(PendingHandle),
    Fetched(Arc<T>),
    Error(Arc<FetchError>),
}

impl<T> FetchState<T> {
    /// The status tag of this state.
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Init => FetchStatus::Init,
            Self::Loading => FetchStatus::Loading,
            Self::Pending(_) => FetchStatus::Pending,
            Self::Fetched(_) => FetchStatus::Fetched,
            Self::Error(_) => FetchStatus::Error,
        }
    }

    /// Fetched data, only set in `Fetched`.
    pub fn data(&self) -> Option<&Arc<T>> {
        match self {
            Self::Fetched(data) => Some(data),
            _ => None,
        }
    }

    /// Fetch error, only set in `Error`.
    pub fn error(&self) -> Option<&Arc<FetchError>> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    /// In-flight handle, only set in `Pending`.
    pub fn pending(&self) -> Option<&PendingHandle> {
        match self {
            Self::Pending(handle) => Some(handle),
            _ => None,
        }
    }
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Init => Self::Init,
            Self::Loading => Self::Loading,
            Self::Pending(handle) => Self::Pending(handle.clone()),
            Self::Fetched(data) => Self::Fetched(data.clone()),
            Self::Error(error) => Self::Error(error.clone()),
        }
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::Init
    }
}

impl<T> fmt::Debug for FetchState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
            other => write!(f, "{}", other.status()),
        }
    }
}

/// Token flipped by `refetch()` to force a new cycle.
///
/// Counts rather than toggles, so two refetches in a row are never mistaken
/// for no change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TriggerToken(u64);

impl TriggerToken {
    /// Advance the token.
    pub fn flip(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(FetchStatus::Init.to_string(), "init");
        assert_eq!(FetchStatus::Pending.to_string(), "pending");
        assert_eq!(
            serde_json::to_string(&FetchStatus::Fetched).unwrap(),
            r#""fetched""#
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(FetchStatus::Fetched.is_terminal());
        assert!(FetchStatus::Error.is_terminal());
        assert!(!FetchStatus::Loading.is_terminal());
        assert!(!FetchStatus::Pending.is_terminal());
        assert!(!FetchStatus::Init.is_terminal());
    }

    #[test]
    fn test_fields_belong_to_their_state() {
        let fetched: FetchState<u32> = FetchState::Fetched(Arc::new(5));
        assert_eq!(fetched.status(), FetchStatus::Fetched);
        assert_eq!(fetched.data().map(|d| **d), Some(5));
        assert!(fetched.error().is_none());
        assert!(fetched.pending().is_none());

        let failed: FetchState<u32> =
            FetchState::Error(Arc::new(FetchError::Timeout("slow".into())));
        assert!(failed.data().is_none());
        assert!(failed.error().is_some());

        let loading: FetchState<u32> = FetchState::Loading;
        assert!(loading.data().is_none() && loading.error().is_none());
    }

    #[test]
    fn test_trigger_token_changes_on_every_flip() {
        let mut token = TriggerToken::default();
        let first = token;
        token.flip();
        let second = token;
        token.flip();

        assert_ne!(first, second);
        assert_ne!(second, token);
        assert_ne!(first, token);
    }
}
