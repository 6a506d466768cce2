//! In-flight request coalescing
//!
//! While a read for a key is in flight, identical reads attach to it
//! instead of issuing their own request. Every waiter receives a clone of
//! the same result, which is why [`ApiError`] is `Clone`.
//!
//! Slots are keyed by cache key and entry generation. A read issued after
//! an invalidation starts its own request rather than joining one that was
//! sent before the write.

use crate::cache::store::QueryKey;
use crate::core::error::ApiError;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

type SharedFetch = Shared<BoxFuture<'static, Result<Value, ApiError>>>;
type Slot = (QueryKey, u64);

#[derive(Clone, Default)]
pub struct InflightRequests {
    pending: Arc<Mutex<HashMap<Slot, SharedFetch>>>,
}

impl InflightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `key` at `generation`, or join the fetch already
    /// running for that pair
    ///
    /// `fetch` is only called when no request for the pair is in flight. The
    /// slot is released as soon as the fetch completes, so a later call
    /// issues a new request.
    pub async fn run<F, Fut>(
        &self,
        key: &QueryKey,
        generation: u64,
        fetch: F,
    ) -> Result<Value, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let slot = (key.clone(), generation);
        let shared = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.get(&slot) {
                Some(existing) => {
                    tracing::debug!(key = %key, generation, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.pending);
                    let owned_slot = slot.clone();
                    let request = fetch();
                    let shared = async move {
                        let result = request.await;
                        registry
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&owned_slot);
                        result
                    }
                    .boxed()
                    .shared();
                    pending.insert(slot, shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    /// Whether any request for `key` is in flight, whatever its generation
    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .any(|(pending, _)| pending == key)
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
