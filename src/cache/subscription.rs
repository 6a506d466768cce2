//! Live handles onto cache entries
//!
//! A [`QuerySubscription`] keeps its entry from being evicted and makes it
//! eligible for automatic refetch after invalidation. Dropping the handle
//! releases the interest.

use crate::cache::store::{QueryCache, QueryKey, QueryState, QueryStatus};
use crate::core::error::ApiError;
use crate::core::query::ApiResponse;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

/// Typed view of an entry's state at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot<T> {
    pub status: QueryStatus,
    pub response: Option<ApiResponse<T>>,
    pub error: Option<ApiError>,
    pub stale: bool,
}

impl<T> QuerySnapshot<T> {
    /// Payload of the last successful envelope
    pub fn data(&self) -> Option<&T> {
        self.response.as_ref().and_then(|r| r.data.as_ref())
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending && self.response.is_none()
    }

    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Pending
    }
}

pub struct QuerySubscription<T> {
    key: QueryKey,
    cache: Arc<QueryCache>,
    receiver: watch::Receiver<QueryState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> QuerySubscription<T> {
    pub(crate) fn new(
        key: QueryKey,
        cache: Arc<QueryCache>,
        receiver: watch::Receiver<QueryState>,
    ) -> Self {
        Self {
            key,
            cache,
            receiver,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current state, with the cached envelope decoded into `T`
    ///
    /// An envelope that does not decode is reported as an
    /// [`ApiError::InvalidResponse`] on the snapshot.
    pub fn snapshot(&self) -> QuerySnapshot<T> {
        let state = self.receiver.borrow().clone();
        decode_state(state)
    }

    /// Wait for the next state change
    ///
    /// Returns `None` once the entry is gone for good.
    pub async fn changed(&mut self) -> Option<QuerySnapshot<T>> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        Some(decode_state(state))
    }

    /// Wait until no request is in flight for the entry
    pub async fn wait_until_settled(&mut self) -> Option<QuerySnapshot<T>> {
        let state = self
            .receiver
            .wait_for(QueryState::is_settled)
            .await
            .ok()?
            .clone();
        Some(decode_state(state))
    }
}

fn decode_state<T: DeserializeOwned>(state: QueryState) -> QuerySnapshot<T> {
    let mut error = state.error;
    let response = match state.data {
        Some(value) => match serde_json::from_value::<ApiResponse<T>>(value) {
            Ok(response) => Some(response),
            Err(e) => {
                error.get_or_insert(ApiError::InvalidResponse {
                    message: e.to_string(),
                });
                None
            }
        },
        None => None,
    };
    QuerySnapshot {
        status: state.status,
        response,
        error,
        stale: state.stale,
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key);
    }
}

impl<T> std::fmt::Debug for QuerySubscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("key", &self.key)
            .finish()
    }
}
