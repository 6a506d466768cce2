//! Tag-indexed query cache
//!
//! Entries are keyed by endpoint + serialized arguments. Each entry records
//! the tags its read provides; a tag index maps every tag to the keys that
//! provide it so that invalidation does not scan the whole cache.
//!
//! Entry lifecycle:
//!
//! ```text
//! Uninitialized ──begin──▶ Pending ──fulfill──▶ Fulfilled ──invalidate──▶ (stale)
//!       │                     │                                              │
//!       └──skip──▶ Skipped     └──reject──▶ Rejected (prior data kept)        └──begin──▶ Pending
//! ```
//!
//! Every entry owns a `watch` channel carrying its [`QueryState`]; live
//! subscriptions observe it and keep the entry from being evicted.
//!
//! Every entry also carries a generation. [`QueryCache::begin`] hands out
//! the current one; invalidation and [`QueryCache::reset`] move it forward.
//! A read that completes under an older generation is discarded, so data
//! fetched before a write or a session change never lands as fresh.

use crate::api::endpoints::Endpoint;
use crate::api::transport::ApiRequest;
use crate::cache::tag::Tag;
use crate::core::error::ApiError;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Cache key: endpoint name plus serialized arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new<A: Serialize + ?Sized>(endpoint: Endpoint, args: &A) -> Self {
        let args = serde_json::to_string(args).unwrap_or_default();
        Self(format!("{}({})", endpoint.name(), args))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// Registered, never executed
    Uninitialized,
    /// Not executed because no valid session exists
    Skipped,
    /// A request is in flight
    Pending,
    Fulfilled,
    /// The last request failed; prior data, if any, is kept
    Rejected,
}

/// Observable state of one cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub status: QueryStatus,
    /// Last successful response envelope
    pub data: Option<Value>,
    pub error: Option<ApiError>,
    /// Set by invalidation, cleared by the next successful read
    pub stale: bool,
}

impl QueryState {
    fn uninitialized() -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            stale: false,
        }
    }

    /// Whether no request is in flight for this entry
    pub fn is_settled(&self) -> bool {
        self.status != QueryStatus::Pending
    }
}

/// Everything needed to re-issue the read behind an entry
#[derive(Debug, Clone)]
pub struct QueryRecipe {
    pub endpoint: Endpoint,
    pub request: ApiRequest,
    pub provides: Vec<Tag>,
    pub freshness: Duration,
}

/// An entry hit by an invalidation
#[derive(Debug, Clone)]
pub struct StaleEntry {
    pub key: QueryKey,
    pub recipe: QueryRecipe,
    /// Whether the entry has live subscribers and must be refetched now
    pub subscribed: bool,
}

struct CacheEntry {
    recipe: QueryRecipe,
    generation: u64,
    /// Generation of the read that set `Pending`, if it has not completed
    in_flight: Option<u64>,
    fulfilled_at: Option<Instant>,
    touched_at: Instant,
    subscribers: usize,
    state: watch::Sender<QueryState>,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        let state = self.state.borrow();
        state.status == QueryStatus::Fulfilled
            && !state.stale
            && self
                .fulfilled_at
                .is_some_and(|at| at.elapsed() < self.recipe.freshness)
    }

    fn is_expired(&self) -> bool {
        self.subscribers == 0
            && self.state.borrow().status != QueryStatus::Pending
            && self.touched_at.elapsed() >= self.recipe.freshness
    }

    fn update(&mut self, f: impl FnOnce(&mut QueryState)) {
        self.touched_at = Instant::now();
        self.state.send_modify(f);
    }

    /// Settle the read of `generation` if it is current
    ///
    /// A superseded read only gives back the `Pending` status it took, and
    /// only when no newer read has started since.
    fn settle(&mut self, generation: u64, f: impl FnOnce(&mut QueryState)) -> bool {
        let current = self.generation == generation;
        if self.in_flight == Some(generation) {
            self.in_flight = None;
            if current {
                self.update(f);
            } else {
                self.update(|state| {
                    state.status = if state.data.is_some() {
                        QueryStatus::Fulfilled
                    } else {
                        QueryStatus::Uninitialized
                    };
                });
            }
        } else if current {
            self.update(f);
        }
        current
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<QueryKey, CacheEntry>,
    tags: HashMap<Tag, HashSet<QueryKey>>,
    /// Last generation handed out, shared by all entries so a removed and
    /// re-created entry never reuses one
    generation: u64,
}

impl CacheInner {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn ensure(&mut self, key: &QueryKey, recipe: QueryRecipe) -> &mut CacheEntry {
        if !self.entries.contains_key(key) {
            for tag in &recipe.provides {
                self.tags.entry(*tag).or_default().insert(key.clone());
            }
            self.next_generation();
        }
        let generation = self.generation;
        self.entries.entry(key.clone()).or_insert_with(|| CacheEntry {
            recipe,
            generation,
            in_flight: None,
            fulfilled_at: None,
            touched_at: Instant::now(),
            subscribers: 0,
            state: watch::channel(QueryState::uninitialized()).0,
        })
    }

    fn remove(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.remove(key) {
            for tag in &entry.recipe.provides {
                if let Some(keys) = self.tags.get_mut(tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.tags.remove(tag);
                    }
                }
            }
        }
    }
}

/// Thread-safe query cache with tag invalidation
#[derive(Default)]
pub struct QueryCache {
    inner: RwLock<CacheInner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make sure an entry exists for `key` and index its tags
    pub fn register(&self, key: &QueryKey, recipe: QueryRecipe) {
        self.write().ensure(key, recipe);
    }

    /// Cached envelope if the entry is fulfilled, not stale and within its freshness window
    pub fn fresh(&self, key: &QueryKey) -> Option<Value> {
        let inner = self.read();
        let entry = inner.entries.get(key)?;
        if entry.is_fresh() {
            entry.state.borrow().data.clone()
        } else {
            None
        }
    }

    /// Mark `key` pending and return the generation its result must carry
    pub fn begin(&self, key: &QueryKey) -> Option<u64> {
        let mut inner = self.write();
        let entry = inner.entries.get_mut(key)?;
        let generation = entry.generation;
        entry.in_flight = Some(generation);
        entry.update(|state| {
            state.status = QueryStatus::Pending;
        });
        Some(generation)
    }

    /// Store a successful read
    ///
    /// Returns `false`, storing nothing, when `generation` was superseded by
    /// an invalidation or reset while the read was in flight.
    pub fn fulfill(&self, key: &QueryKey, generation: u64, data: Value) -> bool {
        let mut inner = self.write();
        let Some(entry) = inner.entries.get_mut(key) else {
            return false;
        };
        let current = entry.settle(generation, |state| {
            state.status = QueryStatus::Fulfilled;
            state.data = Some(data);
            state.error = None;
            state.stale = false;
        });
        if current {
            entry.fulfilled_at = Some(Instant::now());
        }
        current
    }

    /// Record a failed read, keeping whatever data the entry already had
    ///
    /// Superseded reads are dropped as in [`QueryCache::fulfill`].
    pub fn reject(&self, key: &QueryKey, generation: u64, error: ApiError) -> bool {
        let mut inner = self.write();
        let Some(entry) = inner.entries.get_mut(key) else {
            return false;
        };
        entry.settle(generation, |state| {
            state.status = QueryStatus::Rejected;
            state.error = Some(error);
        })
    }

    pub fn mark_skipped(&self, key: &QueryKey) {
        if let Some(entry) = self.write().entries.get_mut(key) {
            entry.update(|state| {
                state.status = QueryStatus::Skipped;
            });
        }
    }

    /// Mark every entry providing a tag matched by `tags` as stale
    ///
    /// Returns the affected entries with their recipes so the caller can
    /// refetch the subscribed ones.
    pub fn invalidate(&self, tags: &[Tag]) -> Vec<StaleEntry> {
        let mut inner = self.write();

        let mut keys = BTreeSet::new();
        for invalidated in tags {
            for (provided, provided_keys) in &inner.tags {
                if invalidated.matches(provided) {
                    keys.extend(provided_keys.iter().cloned());
                }
            }
        }

        let mut stale = Vec::with_capacity(keys.len());
        for key in keys {
            let generation = inner.next_generation();
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.generation = generation;
                entry.update(|state| state.stale = true);
                stale.push(StaleEntry {
                    key,
                    recipe: entry.recipe.clone(),
                    subscribed: entry.subscribers > 0,
                });
            }
        }
        stale
    }

    /// Register interest in an entry and observe its state
    pub fn subscribe(&self, key: &QueryKey) -> Option<watch::Receiver<QueryState>> {
        let mut inner = self.write();
        let entry = inner.entries.get_mut(key)?;
        entry.subscribers += 1;
        Some(entry.state.subscribe())
    }

    /// Register `key` if needed and subscribe to it under a single lock
    pub fn register_subscribed(
        &self,
        key: &QueryKey,
        recipe: QueryRecipe,
    ) -> watch::Receiver<QueryState> {
        let mut inner = self.write();
        let entry = inner.ensure(key, recipe);
        entry.subscribers += 1;
        entry.state.subscribe()
    }

    /// Entries with live subscribers, in key order
    pub fn subscribed(&self) -> Vec<(QueryKey, QueryRecipe)> {
        let inner = self.read();
        let mut entries: Vec<(QueryKey, QueryRecipe)> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.subscribers > 0)
            .map(|(key, entry)| (key.clone(), entry.recipe.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn unsubscribe(&self, key: &QueryKey) {
        if let Some(entry) = self.write().entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.touched_at = Instant::now();
        }
    }

    /// Drop unsubscribed entries older than their freshness window
    ///
    /// Returns the number of evicted entries.
    pub fn evict_expired(&self) -> usize {
        let mut inner = self.write();
        let expired: Vec<QueryKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Drop every cached result
    ///
    /// Unsubscribed entries are removed. Subscribed entries stay registered
    /// so their handles keep working, but lose their data.
    pub fn reset(&self) {
        let mut guard = self.write();
        let inner = &mut *guard;
        let unsubscribed: Vec<QueryKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.subscribers == 0)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &unsubscribed {
            inner.remove(key);
        }
        for entry in inner.entries.values_mut() {
            inner.generation += 1;
            entry.generation = inner.generation;
            entry.in_flight = None;
            entry.fulfilled_at = None;
            entry.update(|state| *state = QueryState::uninitialized());
        }
    }

    pub fn state(&self, key: &QueryKey) -> Option<QueryState> {
        self.read()
            .entries
            .get(key)
            .map(|entry| entry.state.borrow().clone())
    }

    pub fn recipe(&self, key: &QueryKey) -> Option<QueryRecipe> {
        self.read().entries.get(key).map(|entry| entry.recipe.clone())
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.read()
            .entries
            .get(key)
            .map_or(0, |entry| entry.subscribers)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.read().entries.contains_key(key)
    }

    /// Keys currently indexed under exactly `tag`
    pub fn keys_for(&self, tag: &Tag) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .read()
            .tags
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("QueryCache")
            .field("entries", &inner.entries.len())
            .field("tags", &inner.tags.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tag::TagType;
    use crate::core::query::PageRequest;
    use serde_json::json;

    fn recipe(endpoint: Endpoint, id: Option<i64>, freshness: Duration) -> QueryRecipe {
        QueryRecipe {
            endpoint,
            request: ApiRequest::new(endpoint.method(), endpoint.path(id)),
            provides: endpoint.provides(id),
            freshness,
        }
    }

    /// Run a whole read against `key`
    fn fill(cache: &QueryCache, key: &QueryKey, data: Value) {
        let generation = cache.begin(key).unwrap();
        assert!(cache.fulfill(key, generation, data));
    }

    fn organizations_key() -> QueryKey {
        QueryKey::new(Endpoint::Organizations, &PageRequest::new(0, 5))
    }

    #[test]
    fn test_query_key_format() {
        assert_eq!(
            organizations_key().as_str(),
            r#"organizations({"page":0,"size":5})"#
        );
        assert_eq!(QueryKey::new(Endpoint::Organization, &5).as_str(), "organization(5)");
    }

    #[test]
    fn test_fresh_only_after_fulfill() {
        let cache = QueryCache::new();
        let key = organizations_key();
        cache.register(
            &key,
            recipe(Endpoint::Organizations, None, Duration::from_secs(60)),
        );
        assert_eq!(cache.fresh(&key), None);

        let generation = cache.begin(&key).unwrap();
        assert_eq!(cache.fresh(&key), None);

        assert!(cache.fulfill(&key, generation, json!({"success": true})));
        assert_eq!(cache.fresh(&key), Some(json!({"success": true})));
    }

    #[test]
    fn test_zero_freshness_never_serves_from_cache() {
        let cache = QueryCache::new();
        let key = organizations_key();
        cache.register(&key, recipe(Endpoint::Organizations, None, Duration::ZERO));
        fill(&cache, &key, json!({"success": true}));
        assert_eq!(cache.fresh(&key), None);
    }

    #[test]
    fn test_invalidate_collection_tag() {
        let cache = QueryCache::new();
        let list = organizations_key();
        let one = QueryKey::new(Endpoint::Organization, &5);
        let location = QueryKey::new(Endpoint::Location, &3);
        let minute = Duration::from_secs(60);

        cache.register(&list, recipe(Endpoint::Organizations, None, minute));
        cache.register(&one, recipe(Endpoint::Organization, Some(5), minute));
        cache.register(&location, recipe(Endpoint::Location, Some(3), minute));
        for key in [&list, &one, &location] {
            fill(&cache, key, json!({"success": true}));
        }

        let stale = cache.invalidate(&[Tag::collection(TagType::Organizations)]);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key, list);
        assert!(!stale[0].subscribed);
        assert_eq!(cache.fresh(&list), None);
        assert!(cache.fresh(&one).is_some());
        assert!(cache.fresh(&location).is_some());
    }

    #[test]
    fn test_invalidate_bare_entity_type_hits_all_ids() {
        let cache = QueryCache::new();
        let minute = Duration::from_secs(60);
        let five = QueryKey::new(Endpoint::Organization, &5);
        let six = QueryKey::new(Endpoint::Organization, &6);
        cache.register(&five, recipe(Endpoint::Organization, Some(5), minute));
        cache.register(&six, recipe(Endpoint::Organization, Some(6), minute));

        let stale = cache.invalidate(&[Tag::collection(TagType::Organization)]);
        assert_eq!(stale.len(), 2);

        let stale = cache.invalidate(&[Tag::entity(TagType::Organization, 6)]);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].key, six);
    }

    #[test]
    fn test_reject_keeps_prior_data() {
        let cache = QueryCache::new();
        let key = organizations_key();
        cache.register(
            &key,
            recipe(Endpoint::Organizations, None, Duration::from_secs(60)),
        );
        fill(&cache, &key, json!({"success": true, "data": 1}));
        cache.invalidate(&[Tag::collection(TagType::Organizations)]);
        let generation = cache.begin(&key).unwrap();
        assert!(cache.reject(
            &key,
            generation,
            ApiError::Network {
                message: "refused".to_string(),
            },
        ));

        let state = cache.state(&key).unwrap();
        assert_eq!(state.status, QueryStatus::Rejected);
        assert_eq!(state.data, Some(json!({"success": true, "data": 1})));
        assert!(state.error.is_some());
        assert!(state.stale);
    }

    #[test]
    fn test_subscription_counts_and_eviction() {
        let cache = QueryCache::new();
        let key = organizations_key();
        cache.register(&key, recipe(Endpoint::Organizations, None, Duration::ZERO));
        fill(&cache, &key, json!({"success": true}));

        let rx = cache.subscribe(&key).unwrap();
        assert_eq!(cache.subscriber_count(&key), 1);
        assert_eq!(cache.evict_expired(), 0);

        cache.unsubscribe(&key);
        drop(rx);
        assert_eq!(cache.evict_expired(), 1);
        assert!(!cache.contains(&key));
        assert!(cache.keys_for(&Tag::collection(TagType::Organizations)).is_empty());
    }

    #[test]
    fn test_pending_entries_are_not_evicted() {
        let cache = QueryCache::new();
        let key = organizations_key();
        cache.register(&key, recipe(Endpoint::Organizations, None, Duration::ZERO));
        cache.begin(&key);
        assert_eq!(cache.evict_expired(), 0);
    }

    #[test]
    fn test_reset_keeps_subscribed_entries_empty() {
        let cache = QueryCache::new();
        let minute = Duration::from_secs(60);
        let list = organizations_key();
        let one = QueryKey::new(Endpoint::Organization, &5);
        cache.register(&list, recipe(Endpoint::Organizations, None, minute));
        cache.register(&one, recipe(Endpoint::Organization, Some(5), minute));
        fill(&cache, &list, json!({"success": true}));
        fill(&cache, &one, json!({"success": true}));
        let _rx = cache.subscribe(&list).unwrap();

        cache.reset();

        assert_eq!(cache.len(), 1);
        let state = cache.state(&list).unwrap();
        assert_eq!(state.status, QueryStatus::Uninitialized);
        assert_eq!(state.data, None);
        assert!(!cache.contains(&one));
    }

    #[test]
    fn test_read_started_before_invalidation_is_discarded() {
        let cache = QueryCache::new();
        let key = QueryKey::new(Endpoint::Organization, &5);
        cache.register(
            &key,
            recipe(Endpoint::Organization, Some(5), Duration::from_secs(60)),
        );
        fill(&cache, &key, json!({"data": "v0"}));

        let before = cache.begin(&key).unwrap();
        cache.invalidate(&[Tag::entity(TagType::Organization, 5)]);
        assert!(!cache.fulfill(&key, before, json!({"data": "v0 again"})));

        let state = cache.state(&key).unwrap();
        assert_eq!(state.status, QueryStatus::Fulfilled);
        assert_eq!(state.data, Some(json!({"data": "v0"})));
        assert!(state.stale);
        assert_eq!(cache.fresh(&key), None);

        let after = cache.begin(&key).unwrap();
        assert_ne!(before, after);
        assert!(cache.fulfill(&key, after, json!({"data": "v1"})));
        assert_eq!(cache.fresh(&key), Some(json!({"data": "v1"})));
    }

    #[test]
    fn test_superseded_read_leaves_newer_read_pending() {
        let cache = QueryCache::new();
        let key = QueryKey::new(Endpoint::Organization, &5);
        cache.register(
            &key,
            recipe(Endpoint::Organization, Some(5), Duration::from_secs(60)),
        );

        let before = cache.begin(&key).unwrap();
        cache.invalidate(&[Tag::entity(TagType::Organization, 5)]);
        let after = cache.begin(&key).unwrap();

        assert!(!cache.reject(
            &key,
            before,
            ApiError::Network {
                message: "refused".to_string(),
            },
        ));
        let state = cache.state(&key).unwrap();
        assert_eq!(state.status, QueryStatus::Pending);
        assert_eq!(state.error, None);

        assert!(cache.fulfill(&key, after, json!({"data": "v1"})));
        assert_eq!(cache.state(&key).unwrap().status, QueryStatus::Fulfilled);
    }

    #[test]
    fn test_reset_discards_read_in_flight() {
        let cache = QueryCache::new();
        let minute = Duration::from_secs(60);
        let subscribed = organizations_key();
        let unsubscribed = QueryKey::new(Endpoint::Organization, &5);
        cache.register(&subscribed, recipe(Endpoint::Organizations, None, minute));
        cache.register(&unsubscribed, recipe(Endpoint::Organization, Some(5), minute));
        let _rx = cache.subscribe(&subscribed).unwrap();

        let list_read = cache.begin(&subscribed).unwrap();
        let entity_read = cache.begin(&unsubscribed).unwrap();
        cache.reset();

        assert!(!cache.fulfill(&subscribed, list_read, json!({"data": "old user"})));
        let state = cache.state(&subscribed).unwrap();
        assert_eq!(state.status, QueryStatus::Uninitialized);
        assert_eq!(state.data, None);

        // A re-created entry never matches a generation from before the reset
        cache.register(&unsubscribed, recipe(Endpoint::Organization, Some(5), minute));
        assert!(!cache.fulfill(&unsubscribed, entity_read, json!({"data": "old user"})));
        assert_eq!(cache.state(&unsubscribed).unwrap().data, None);
    }

    #[tokio::test]
    async fn test_watchers_see_transitions() {
        let cache = QueryCache::new();
        let key = organizations_key();
        cache.register(
            &key,
            recipe(Endpoint::Organizations, None, Duration::from_secs(60)),
        );
        let mut rx = cache.subscribe(&key).unwrap();

        let generation = cache.begin(&key).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status, QueryStatus::Pending);

        cache.fulfill(&key, generation, json!({"success": true}));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status, QueryStatus::Fulfilled);
    }
}
