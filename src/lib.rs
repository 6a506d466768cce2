//! # OrgPilot
//!
//! Typed client, tag-invalidated query cache and edge proxy for the OrgPilot
//! organization administration API.
//!
//! ## Features
//!
//! - **Typed Endpoints**: one method per backend call, returning entity records
//! - **Tag Invalidation**: writes mark dependent reads stale; subscribed reads refetch
//! - **Request Coalescing**: concurrent identical reads share one network call
//! - **Session Gate**: protected calls only go out with a valid, unexpired token
//! - **Edge Server**: authenticated image proxy and cookie-based auth forwarding
//! - **Configuration-Based**: YAML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orgpilot::prelude::*;
//!
//! let client = OrgPilotClient::builder()
//!     .with_config(OrgPilotConfig::load(None)?)
//!     .build()?;
//! client.initialize().await?;
//!
//! client
//!     .login(LoginRequest {
//!         login: "admin@example.com".to_string(),
//!         password: "secret".to_string(),
//!     })
//!     .await?;
//!
//! let mut orgs = client.subscribe_organizations(PageRequest::new(0, 10)).await;
//! let created = client
//!     .create_location_in_organization(7, new_location)
//!     .await?;
//! if let Some(notice) = created.notice() {
//!     eprintln!("{}", notice);
//! }
//! // `orgs` refetches on its own after the writes above
//! let snapshot = orgs.wait_until_settled().await;
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod server;
pub mod session;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Client ===
    pub use crate::api::{
        Endpoint, EndpointKind, LinkOutcome, LocationCreation, OrgPilotClient,
        OrgPilotClientBuilder, Transport,
        requests::{
            AppointmentQuery, CreateLocationRequest, CreateOrganizationRequest,
            CreateProviderRequest, CreateSpecializationRequest, LoginRequest, MultimediaUpload,
            RegisterRequest, UpdateLocationRequest, UpdateOrganizationRequest,
            UpdateProviderRequest, UpdateSpecializationRequest, UploadedFile,
        },
    };

    // === Cache ===
    pub use crate::cache::{QuerySnapshot, QueryStatus, QuerySubscription, Tag, TagType};

    // === Core ===
    pub use crate::core::{
        Address, ApiError, ApiResponse, Appointment, CacheEvent, ClearReason, ClientEvent,
        EntityId, EntityRef, ErrorDisposition, Location, OrgPilotError, OrgPilotResult,
        Organization, Page, PageRequest, PaginationState, Provider, SessionError, SessionEvent,
        Specialization,
    };

    // === Session ===
    pub use crate::session::{
        FileSessionStore, InMemorySessionStore, SessionGate, SessionStore, SessionUser,
    };

    // === Config ===
    pub use crate::config::OrgPilotConfig;

    // === Server ===
    pub use crate::server::{EdgeState, ServerBuilder};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
}
