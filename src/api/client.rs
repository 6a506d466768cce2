//! OrgPilot client facade
//!
//! [`OrgPilotClient`] ties the executor, the session gate, the query cache
//! and the in-flight coalescer together and exposes one typed method per
//! backend endpoint.
//!
//! # Reads
//!
//! ```text
//! evict expired ─▶ session gate ─▶ fresh cache hit? ─▶ coalesced fetch ─▶ cache
//!                      │ no session                         │
//!                      └─▶ Skipped, NotAuthenticated        └─▶ 401: session + cache cleared
//! ```
//!
//! # Writes
//!
//! A successful write invalidates the tags declared in the endpoint table.
//! Stale entries with live subscribers are refetched right away in
//! background tasks; the others are refetched on next access.
//!
//! # Example
//!
//! ```rust,ignore
//! use orgpilot::prelude::*;
//!
//! let client = OrgPilotClient::builder()
//!     .with_config(OrgPilotConfig::load(Some("orgpilot.yaml"))?)
//!     .build()?;
//! client.initialize().await?;
//! client.login(LoginRequest { login, password }).await?;
//!
//! let page = client.organizations(PageRequest::new(0, 10)).await?;
//! ```

use crate::api::endpoints::{Endpoint, EndpointKind};
use crate::api::executor::ApiExecutor;
use crate::api::requests::{
    AppointmentQuery, AuthData, CreateLocationRequest, CreateOrganizationRequest,
    CreateProviderRequest, CreateSpecializationRequest, LoginRequest, MultimediaUpload,
    RegisterRequest, UpdateLocationRequest, UpdateOrganizationRequest, UpdateProviderRequest,
    UpdateSpecializationRequest, UploadedFile,
};
use crate::api::transport::{ApiRequest, MultipartFile, ReqwestTransport, Transport};
use crate::cache::coalesce::InflightRequests;
use crate::cache::store::{QueryCache, QueryKey, QueryRecipe};
use crate::cache::subscription::QuerySubscription;
use crate::cache::tag::Tag;
use crate::config::OrgPilotConfig;
use crate::core::entity::{
    Appointment, Entity, EntityId, Location, Organization, Provider, Specialization,
};
use crate::core::error::{ApiError, OrgPilotError, OrgPilotResult, SessionError};
use crate::core::events::{CacheEvent, ClearReason, ClientEvent, EventBus, EventEnvelope};
use crate::core::query::{ApiResponse, Page, PageRequest};
use crate::session::{
    FileSessionStore, InMemorySessionStore, SessionGate, SessionStore, SessionUser,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// One read: what to send, where to cache it and for how long
#[derive(Debug, Clone)]
struct ReadPlan {
    key: QueryKey,
    recipe: QueryRecipe,
}

struct ClientInner {
    config: OrgPilotConfig,
    executor: ApiExecutor,
    session: Arc<SessionGate>,
    cache: Arc<QueryCache>,
    inflight: InflightRequests,
    events: EventBus,
}

impl ClientInner {
    /// Execute through the executor and drop the cache when the session died
    async fn execute(&self, endpoint: Endpoint, request: ApiRequest) -> Result<Value, ApiError> {
        let result = self.executor.execute(endpoint, request).await;
        if matches!(result, Err(ApiError::Unauthorized { .. })) && endpoint.requires_session() {
            self.reset_cache();
        }
        result
    }

    fn reset_cache(&self) {
        self.cache.reset();
        self.events.publish(ClientEvent::Cache(CacheEvent::Reset));
    }

    /// End the session and drop every cached result
    async fn end_session(&self, reason: ClearReason) {
        self.session.clear(reason).await;
        self.reset_cache();
    }

    /// Whether a protected call may go out, ending an expired session on the way
    async fn ensure_session(&self) -> bool {
        if self.session.is_authenticated() {
            return true;
        }
        if self.session.has_expired_session() {
            tracing::info!("session token expired");
            self.end_session(ClearReason::Expired).await;
        }
        false
    }
}

/// Typed client for the OrgPilot backend
///
/// Cheap to clone; all clones share the session, cache and event bus.
#[derive(Clone)]
pub struct OrgPilotClient {
    inner: Arc<ClientInner>,
}

/// Builder for [`OrgPilotClient`]
#[derive(Default)]
pub struct OrgPilotClientBuilder {
    config: Option<OrgPilotConfig>,
    transport: Option<Arc<dyn Transport>>,
    session_store: Option<Arc<dyn SessionStore>>,
}

impl OrgPilotClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: OrgPilotConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the HTTP transport (tests, custom middleware)
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn build(self) -> OrgPilotResult<OrgPilotClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.base_url(), config.api.timeout())?),
        };
        let store: Arc<dyn SessionStore> = match (self.session_store, &config.session.file) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileSessionStore::new(path.clone())),
            (None, None) => Arc::new(InMemorySessionStore::new()),
        };

        let events = EventBus::new(config.events.capacity);
        let session = Arc::new(SessionGate::new(store, events.clone()));
        let executor = ApiExecutor::new(transport, Arc::clone(&session));

        tracing::debug!(base_url = %config.base_url(), "OrgPilot client built");

        Ok(OrgPilotClient {
            inner: Arc::new(ClientInner {
                config,
                executor,
                session,
                cache: Arc::new(QueryCache::new()),
                inflight: InflightRequests::new(),
                events,
            }),
        })
    }
}

impl OrgPilotClient {
    pub fn builder() -> OrgPilotClientBuilder {
        OrgPilotClientBuilder::new()
    }

    /// Restore the persisted session, if any
    pub async fn initialize(&self) -> OrgPilotResult<Option<SessionUser>> {
        Ok(self.inner.session.rehydrate().await?)
    }

    pub fn config(&self) -> &OrgPilotConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionGate {
        &self.inner.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.inner.events.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner.session.user()
    }

    // =========================================================================
    // Generic query / mutation machinery
    // =========================================================================

    fn read_plan<A: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        id: Option<EntityId>,
        args: &A,
        query: Vec<(String, String)>,
    ) -> ReadPlan {
        ReadPlan {
            key: QueryKey::new(endpoint, args),
            recipe: QueryRecipe {
                endpoint,
                request: ApiRequest::new(endpoint.method(), endpoint.path(id)).with_query(query),
                provides: endpoint.provides(id),
                freshness: self.inner.config.cache.freshness_for(endpoint),
            },
        }
    }

    /// Serve a read from cache or the network
    ///
    /// With `force` the cache is bypassed, but the result still lands in it
    /// and identical in-flight reads are still joined.
    async fn run_query(&self, plan: ReadPlan, force: bool) -> OrgPilotResult<Value> {
        let endpoint = plan.recipe.endpoint;
        let evicted = self.inner.cache.evict_expired();
        if evicted > 0 {
            tracing::trace!(evicted, "evicted expired cache entries");
        }

        if endpoint.requires_session() && !self.inner.ensure_session().await {
            if endpoint.is_cached() {
                self.inner.cache.register(&plan.key, plan.recipe);
                self.inner.cache.mark_skipped(&plan.key);
            }
            tracing::debug!(key = %plan.key, "skipping read without session");
            return Err(SessionError::NotAuthenticated.into());
        }

        if !endpoint.is_cached() {
            let inner = Arc::clone(&self.inner);
            let request = plan.recipe.request;
            return Ok(self
                .inner
                .inflight
                .run(&plan.key, 0, move || async move { inner.execute(endpoint, request).await })
                .await?);
        }

        self.inner.cache.register(&plan.key, plan.recipe.clone());
        if !force {
            if let Some(envelope) = self.inner.cache.fresh(&plan.key) {
                tracing::trace!(key = %plan.key, "cache hit");
                return Ok(envelope);
            }
        }
        Ok(self.fetch(&plan.key, plan.recipe).await?)
    }

    /// Fetch an entry through the coalescer and record the outcome in the cache
    ///
    /// Only reads of the same entry generation are joined. A result whose
    /// generation was superseded while in flight is returned to its callers
    /// but not cached.
    async fn fetch(&self, key: &QueryKey, recipe: QueryRecipe) -> Result<Value, ApiError> {
        let generation = self.inner.cache.begin(key);
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        self.inner
            .inflight
            .run(key, generation.unwrap_or_default(), move || async move {
                let result = inner.execute(recipe.endpoint, recipe.request).await;
                let Some(generation) = generation else {
                    return result;
                };
                let current = match &result {
                    Ok(envelope) => inner.cache.fulfill(&owned_key, generation, envelope.clone()),
                    Err(e) => inner.cache.reject(&owned_key, generation, e.clone()),
                };
                if !current {
                    tracing::debug!(key = %owned_key, generation, "discarding superseded read");
                }
                result
            })
            .await
    }

    /// Execute a write and invalidate its tags on success
    ///
    /// Any 2xx envelope counts as success for invalidation, including one
    /// with `success: false`; transport and HTTP failures invalidate nothing.
    async fn run_mutation(
        &self,
        endpoint: Endpoint,
        id: Option<EntityId>,
        request: ApiRequest,
    ) -> OrgPilotResult<Value> {
        debug_assert_eq!(endpoint.kind(), EndpointKind::Mutation);
        if endpoint.requires_session() && !self.inner.ensure_session().await {
            return Err(SessionError::NotAuthenticated.into());
        }

        let envelope = self.inner.execute(endpoint, request).await?;
        let tags = endpoint.invalidates(id);
        if !tags.is_empty() {
            self.invalidate(&tags);
        }
        Ok(envelope)
    }

    fn mutation_request<B: Serialize>(
        &self,
        endpoint: Endpoint,
        id: Option<EntityId>,
        body: &B,
    ) -> OrgPilotResult<ApiRequest> {
        let body = serde_json::to_value(body)
            .map_err(|e| OrgPilotError::decode(format!("{} request body", endpoint), e))?;
        Ok(ApiRequest::new(endpoint.method(), endpoint.path(id)).with_json(body))
    }

    /// Mark every entry providing one of `tags` stale and refetch the subscribed ones
    ///
    /// Returns the number of entries marked stale.
    pub fn invalidate(&self, tags: &[Tag]) -> usize {
        let stale = self.inner.cache.invalidate(tags);
        let tag_names: Vec<String> = tags.iter().map(Tag::to_string).collect();
        tracing::debug!(tags = ?tag_names, entries = stale.len(), "invalidated cache tags");

        self.inner
            .events
            .publish(ClientEvent::Cache(CacheEvent::Invalidated {
                tags: tag_names,
                keys: stale.iter().map(|entry| entry.key.to_string()).collect(),
            }));

        let count = stale.len();
        for entry in stale.into_iter().filter(|entry| entry.subscribed) {
            let client = self.clone();
            tokio::spawn(async move {
                client.refetch(entry.key, entry.recipe).await;
            });
        }
        count
    }

    /// Invalidate every read holding entity `id` of kind `E`
    pub fn invalidate_entity<E: Entity>(&self, id: EntityId) -> usize {
        self.invalidate(&[Tag::entity(E::tag_type(), id)])
    }

    /// Re-read a subscribed entry after invalidation or login
    async fn refetch(&self, key: QueryKey, recipe: QueryRecipe) {
        if recipe.endpoint.requires_session() && !self.inner.ensure_session().await {
            self.inner.cache.mark_skipped(&key);
            return;
        }
        match self.fetch(&key, recipe).await {
            Ok(_) => {
                tracing::debug!(key = %key, "refetched stale entry");
                self.inner
                    .events
                    .publish(ClientEvent::Cache(CacheEvent::Refetched {
                        key: key.to_string(),
                    }));
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "refetch failed, keeping prior data");
                self.inner
                    .events
                    .publish(ClientEvent::Cache(CacheEvent::RefetchFailed {
                        key: key.to_string(),
                        message: e.to_string(),
                    }));
            }
        }
    }

    /// Refetch every subscribed entry (after a new session was established)
    fn refetch_subscribed(&self) {
        for (key, recipe) in self.inner.cache.subscribed() {
            let client = self.clone();
            tokio::spawn(async move {
                client.refetch(key, recipe).await;
            });
        }
    }

    async fn subscribe_plan<T: DeserializeOwned>(&self, plan: ReadPlan) -> QuerySubscription<T> {
        let receiver = self
            .inner
            .cache
            .register_subscribed(&plan.key, plan.recipe.clone());
        let subscription = QuerySubscription::new(plan.key.clone(), Arc::clone(&self.inner.cache), receiver);
        // The outcome is recorded on the entry and visible through the handle
        if let Err(e) = self.run_query(plan, false).await {
            tracing::debug!(key = %subscription.key(), error = %e, "initial subscription read failed");
        }
        subscription
    }

    async fn query<T: DeserializeOwned>(&self, plan: ReadPlan) -> OrgPilotResult<T> {
        let context = plan.key.to_string();
        let envelope = self.run_query(plan, false).await?;
        decode_envelope(envelope, &context)
    }

    async fn mutate<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        id: Option<EntityId>,
        body: &B,
    ) -> OrgPilotResult<T> {
        let request = self.mutation_request(endpoint, id, body)?;
        let envelope = self.run_mutation(endpoint, id, request).await?;
        decode_envelope(envelope, endpoint.name())
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in and establish the session
    pub async fn login(&self, credentials: LoginRequest) -> OrgPilotResult<SessionUser> {
        let auth: AuthData = self.mutate(Endpoint::Login, None, &credentials).await?;
        self.start_session(auth, &credentials.login).await
    }

    /// Register a new account; the returned token starts a session
    pub async fn register(&self, request: RegisterRequest) -> OrgPilotResult<SessionUser> {
        let auth: AuthData = self.mutate(Endpoint::Register, None, &request).await?;
        self.start_session(auth, &request.email).await
    }

    async fn start_session(&self, auth: AuthData, login: &str) -> OrgPilotResult<SessionUser> {
        let user = self
            .inner
            .session
            .establish(&auth.token, Some(login), auth.permissions)
            .await?;
        self.inner.reset_cache();
        self.refetch_subscribed();
        Ok(user)
    }

    /// Log out on the backend, then drop the session and the cache
    ///
    /// Without a usable session there is nothing to tell the backend; the
    /// local state is cleared either way.
    pub async fn logout(&self) -> OrgPilotResult<()> {
        if !self.inner.ensure_session().await {
            self.inner.end_session(ClearReason::Logout).await;
            return Ok(());
        }
        let request = ApiRequest::new(Endpoint::Logout.method(), Endpoint::Logout.path(None));
        self.run_mutation(Endpoint::Logout, None, request).await?;
        self.inner.end_session(ClearReason::Logout).await;
        Ok(())
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    pub async fn organizations(&self, page: PageRequest) -> OrgPilotResult<Page<Organization>> {
        self.query(self.read_plan(Endpoint::Organizations, None, &page, page.query_pairs()))
            .await
    }

    pub async fn subscribe_organizations(
        &self,
        page: PageRequest,
    ) -> QuerySubscription<Page<Organization>> {
        self.subscribe_plan(self.read_plan(Endpoint::Organizations, None, &page, page.query_pairs()))
            .await
    }

    pub async fn organization(&self, id: EntityId) -> OrgPilotResult<Organization> {
        self.query(self.read_plan(Endpoint::Organization, Some(id), &id, Vec::new()))
            .await
    }

    /// Read an organization from the backend, bypassing the cache
    pub async fn organization_fresh(&self, id: EntityId) -> OrgPilotResult<Organization> {
        let plan = self.read_plan(Endpoint::Organization, Some(id), &id, Vec::new());
        let context = plan.key.to_string();
        let envelope = self.run_query(plan, true).await?;
        decode_envelope(envelope, &context)
    }

    pub async fn subscribe_organization(&self, id: EntityId) -> QuerySubscription<Organization> {
        self.subscribe_plan(self.read_plan(Endpoint::Organization, Some(id), &id, Vec::new()))
            .await
    }

    pub async fn create_organization(
        &self,
        request: CreateOrganizationRequest,
    ) -> OrgPilotResult<Organization> {
        self.mutate(Endpoint::CreateOrganization, None, &request).await
    }

    pub async fn update_organization(
        &self,
        request: UpdateOrganizationRequest,
    ) -> OrgPilotResult<Organization> {
        self.mutate(Endpoint::UpdateOrganization, Some(request.id), &request)
            .await
    }

    pub async fn organization_appointments(
        &self,
        query: AppointmentQuery,
    ) -> OrgPilotResult<Page<Appointment>> {
        let plan = self.read_plan(
            Endpoint::OrganizationAppointments,
            Some(query.organization_id),
            &query,
            query.query_pairs(),
        );
        self.query(plan).await
    }

    pub async fn subscribe_organization_appointments(
        &self,
        query: AppointmentQuery,
    ) -> QuerySubscription<Page<Appointment>> {
        let plan = self.read_plan(
            Endpoint::OrganizationAppointments,
            Some(query.organization_id),
            &query,
            query.query_pairs(),
        );
        self.subscribe_plan(plan).await
    }

    // =========================================================================
    // Locations
    // =========================================================================

    pub async fn locations(&self, page: PageRequest) -> OrgPilotResult<Page<Location>> {
        self.query(self.read_plan(Endpoint::Locations, None, &page, page.query_pairs()))
            .await
    }

    pub async fn subscribe_locations(&self, page: PageRequest) -> QuerySubscription<Page<Location>> {
        self.subscribe_plan(self.read_plan(Endpoint::Locations, None, &page, page.query_pairs()))
            .await
    }

    pub async fn location(&self, id: EntityId) -> OrgPilotResult<Location> {
        self.query(self.read_plan(Endpoint::Location, Some(id), &id, Vec::new()))
            .await
    }

    pub async fn subscribe_location(&self, id: EntityId) -> QuerySubscription<Location> {
        self.subscribe_plan(self.read_plan(Endpoint::Location, Some(id), &id, Vec::new()))
            .await
    }

    pub async fn create_location(&self, request: CreateLocationRequest) -> OrgPilotResult<Location> {
        self.mutate(Endpoint::CreateLocation, None, &request).await
    }

    pub async fn update_location(&self, request: UpdateLocationRequest) -> OrgPilotResult<Location> {
        self.mutate(Endpoint::UpdateLocation, Some(request.id), &request)
            .await
    }

    // =========================================================================
    // Providers
    // =========================================================================

    pub async fn provider(&self, id: EntityId) -> OrgPilotResult<Provider> {
        self.query(self.read_plan(Endpoint::Provider, Some(id), &id, Vec::new()))
            .await
    }

    pub async fn subscribe_provider(&self, id: EntityId) -> QuerySubscription<Provider> {
        self.subscribe_plan(self.read_plan(Endpoint::Provider, Some(id), &id, Vec::new()))
            .await
    }

    pub async fn create_provider(&self, request: CreateProviderRequest) -> OrgPilotResult<Provider> {
        self.mutate(Endpoint::CreateProvider, None, &request).await
    }

    pub async fn update_provider(&self, request: UpdateProviderRequest) -> OrgPilotResult<Provider> {
        self.mutate(Endpoint::UpdateProvider, Some(request.id), &request)
            .await
    }

    // =========================================================================
    // Specializations
    // =========================================================================

    pub async fn specializations(
        &self,
        page: PageRequest,
    ) -> OrgPilotResult<Page<Specialization>> {
        self.query(self.read_plan(Endpoint::Specializations, None, &page, page.query_pairs()))
            .await
    }

    pub async fn subscribe_specializations(
        &self,
        page: PageRequest,
    ) -> QuerySubscription<Page<Specialization>> {
        self.subscribe_plan(self.read_plan(Endpoint::Specializations, None, &page, page.query_pairs()))
            .await
    }

    pub async fn specialization(&self, id: EntityId) -> OrgPilotResult<Specialization> {
        self.query(self.read_plan(Endpoint::Specialization, Some(id), &id, Vec::new()))
            .await
    }

    pub async fn subscribe_specialization(&self, id: EntityId) -> QuerySubscription<Specialization> {
        self.subscribe_plan(self.read_plan(Endpoint::Specialization, Some(id), &id, Vec::new()))
            .await
    }

    pub async fn create_specialization(
        &self,
        request: CreateSpecializationRequest,
    ) -> OrgPilotResult<Specialization> {
        self.mutate(Endpoint::CreateSpecialization, None, &request)
            .await
    }

    pub async fn update_specialization(
        &self,
        request: UpdateSpecializationRequest,
    ) -> OrgPilotResult<Specialization> {
        self.mutate(Endpoint::UpdateSpecialization, Some(request.id), &request)
            .await
    }

    // =========================================================================
    // Multimedia
    // =========================================================================

    /// Upload a file as multipart field `file`
    pub async fn upload_multimedia(&self, upload: MultimediaUpload) -> OrgPilotResult<UploadedFile> {
        let endpoint = Endpoint::UploadMultimedia;
        let request = ApiRequest::new(endpoint.method(), endpoint.path(None)).with_multipart(
            MultipartFile {
                field: "file".to_string(),
                file_name: upload.file_name,
                content_type: upload.content_type,
                bytes: upload.bytes,
            },
        );
        let envelope = self.run_mutation(endpoint, None, request).await?;
        decode_envelope(envelope, endpoint.name())
    }

    /// URL of a stored file's preview; never cached
    pub async fn multimedia_preview(&self, id: EntityId) -> OrgPilotResult<String> {
        self.query(self.read_plan(Endpoint::MultimediaPreview, Some(id), &id, Vec::new()))
            .await
    }
}

impl std::fmt::Debug for OrgPilotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgPilotClient")
            .field("base_url", &self.inner.config.base_url())
            .field("session", &self.inner.session)
            .field("cache", &self.inner.cache)
            .finish()
    }
}

/// Decode an envelope and unwrap its payload
///
/// `success: false` becomes [`ApiError::Rejected`] with the backend message.
fn decode_envelope<T: DeserializeOwned>(envelope: Value, context: &str) -> OrgPilotResult<T> {
    let response: ApiResponse<T> =
        serde_json::from_value(envelope).map_err(|e| OrgPilotError::decode(context, e))?;
    Ok(response.into_data()?)
}
