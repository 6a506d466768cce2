//! Core types shared by the client, the cache and the edge server

pub mod entity;
pub mod error;
pub mod events;
pub mod query;

pub use entity::{
    Address, Appointment, Entity, EntityId, EntityRef, Location, MultimediaFile, Organization,
    OrganizationAdmin, OrganizationRef, PatientName, Provider, Specialization, dedup_by_id,
};
pub use error::{
    ApiError, ConfigError, ErrorDisposition, FieldValidationError, OrgPilotError, OrgPilotResult,
    SessionError,
};
pub use events::{CacheEvent, ClearReason, ClientEvent, EventBus, EventEnvelope, SessionEvent};
pub use query::{ApiResponse, Page, PageRequest, PaginationState};
