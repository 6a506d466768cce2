//! Declarative endpoint table
//!
//! Every query and mutation the client can issue is described here once:
//! HTTP method, path, the cache tags a read provides, the tags a write
//! invalidates, and whether a session is required.
//!
//! | Endpoint | Provides | Invalidates |
//! |---|---|---|
//! | `organizations` | `Organizations` | |
//! | `update_organization` | | `Organizations`, `Organization:{id}` |
//! | `update_location` | | `Locations`, `Organizations`, `Location:{id}` |
//! | `create_provider` | | `Providers`, `Locations`, `Organizations` |
//!
//! (abridged, see [`Endpoint::provides`] and [`Endpoint::invalidates`])

use crate::cache::tag::{Tag, TagType};
use crate::core::entity::EntityId;
use reqwest::Method;
use std::fmt;
use std::time::Duration;

/// Freshness window of the organization collection read
pub const ORGANIZATIONS_FRESHNESS: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Query,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Logout,
    Register,
    Organizations,
    Organization,
    CreateOrganization,
    UpdateOrganization,
    Locations,
    Location,
    CreateLocation,
    UpdateLocation,
    Provider,
    CreateProvider,
    UpdateProvider,
    Specializations,
    Specialization,
    CreateSpecialization,
    UpdateSpecialization,
    UploadMultimedia,
    MultimediaPreview,
    OrganizationAppointments,
}

impl Endpoint {
    /// Stable name, used as the prefix of cache keys
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Login => "login",
            Endpoint::Logout => "logout",
            Endpoint::Register => "register",
            Endpoint::Organizations => "organizations",
            Endpoint::Organization => "organization",
            Endpoint::CreateOrganization => "create_organization",
            Endpoint::UpdateOrganization => "update_organization",
            Endpoint::Locations => "locations",
            Endpoint::Location => "location",
            Endpoint::CreateLocation => "create_location",
            Endpoint::UpdateLocation => "update_location",
            Endpoint::Provider => "provider",
            Endpoint::CreateProvider => "create_provider",
            Endpoint::UpdateProvider => "update_provider",
            Endpoint::Specializations => "specializations",
            Endpoint::Specialization => "specialization",
            Endpoint::CreateSpecialization => "create_specialization",
            Endpoint::UpdateSpecialization => "update_specialization",
            Endpoint::UploadMultimedia => "upload_multimedia",
            Endpoint::MultimediaPreview => "multimedia_preview",
            Endpoint::OrganizationAppointments => "organization_appointments",
        }
    }

    pub fn kind(&self) -> EndpointKind {
        match self {
            Endpoint::Organizations
            | Endpoint::Organization
            | Endpoint::Locations
            | Endpoint::Location
            | Endpoint::Provider
            | Endpoint::Specializations
            | Endpoint::Specialization
            | Endpoint::MultimediaPreview
            | Endpoint::OrganizationAppointments => EndpointKind::Query,
            _ => EndpointKind::Mutation,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::UpdateOrganization
            | Endpoint::UpdateLocation
            | Endpoint::UpdateProvider
            | Endpoint::UpdateSpecialization => Method::PUT,
            _ if self.kind() == EndpointKind::Query => Method::GET,
            _ => Method::POST,
        }
    }

    /// Path relative to the API base URL
    ///
    /// Endpoints addressing a single entity take its id; for the others the
    /// id is ignored.
    pub fn path(&self, id: Option<EntityId>) -> String {
        let id = id.map(|id| id.to_string()).unwrap_or_default();
        match self {
            Endpoint::Login => "/authentication".to_string(),
            Endpoint::Logout => "/authentication/logout".to_string(),
            Endpoint::Register => "/register".to_string(),
            Endpoint::Organizations | Endpoint::CreateOrganization => "/organization".to_string(),
            Endpoint::Organization | Endpoint::UpdateOrganization => format!("/organization/{}", id),
            Endpoint::Locations | Endpoint::CreateLocation => "/location".to_string(),
            Endpoint::Location | Endpoint::UpdateLocation => format!("/location/{}", id),
            Endpoint::CreateProvider => "/provider".to_string(),
            Endpoint::Provider | Endpoint::UpdateProvider => format!("/provider/{}", id),
            Endpoint::Specializations | Endpoint::CreateSpecialization => {
                "/specialization".to_string()
            }
            Endpoint::Specialization | Endpoint::UpdateSpecialization => {
                format!("/specialization/{}", id)
            }
            Endpoint::UploadMultimedia => "/multimedia/upload".to_string(),
            Endpoint::MultimediaPreview => format!("/multimedia/preview-by-id/{}", id),
            Endpoint::OrganizationAppointments => format!("/appointment/organization/{}", id),
        }
    }

    /// Whether the call is skipped without a valid session
    pub fn requires_session(&self) -> bool {
        !matches!(self, Endpoint::Login | Endpoint::Register)
    }

    /// Whether results of this read are kept in the query cache
    pub fn is_cached(&self) -> bool {
        self.kind() == EndpointKind::Query && *self != Endpoint::MultimediaPreview
    }

    /// Tags provided by a read of this endpoint
    pub fn provides(&self, id: Option<EntityId>) -> Vec<Tag> {
        let entity = |tag_type: TagType| -> Vec<Tag> {
            id.map(|id| Tag::entity(tag_type, id)).into_iter().collect()
        };
        match self {
            Endpoint::Organizations => vec![Tag::collection(TagType::Organizations)],
            Endpoint::Organization => entity(TagType::Organization),
            Endpoint::Locations => vec![Tag::collection(TagType::Locations)],
            Endpoint::Location => entity(TagType::Location),
            Endpoint::Provider => entity(TagType::Provider),
            Endpoint::Specializations => vec![Tag::collection(TagType::Specializations)],
            Endpoint::Specialization => entity(TagType::Specialization),
            Endpoint::OrganizationAppointments => entity(TagType::Appointments),
            _ => Vec::new(),
        }
    }

    /// Tags invalidated by a successful call of this endpoint
    pub fn invalidates(&self, id: Option<EntityId>) -> Vec<Tag> {
        let mut tags: Vec<Tag> = match self {
            Endpoint::CreateOrganization | Endpoint::UpdateOrganization => {
                vec![Tag::collection(TagType::Organizations)]
            }
            Endpoint::CreateLocation => vec![Tag::collection(TagType::Locations)],
            Endpoint::UpdateLocation => vec![
                Tag::collection(TagType::Locations),
                Tag::collection(TagType::Organizations),
            ],
            Endpoint::CreateProvider | Endpoint::UpdateProvider => vec![
                Tag::collection(TagType::Providers),
                Tag::collection(TagType::Locations),
                Tag::collection(TagType::Organizations),
            ],
            Endpoint::CreateSpecialization | Endpoint::UpdateSpecialization => {
                vec![Tag::collection(TagType::Specializations)]
            }
            _ => Vec::new(),
        };

        let entity_tag = match self {
            Endpoint::UpdateOrganization => Some(TagType::Organization),
            Endpoint::UpdateLocation => Some(TagType::Location),
            Endpoint::UpdateProvider => Some(TagType::Provider),
            Endpoint::UpdateSpecialization => Some(TagType::Specialization),
            _ => None,
        };
        if let (Some(tag_type), Some(id)) = (entity_tag, id) {
            tags.push(Tag::entity(tag_type, id));
        }
        tags
    }

    /// Built-in freshness window, if the endpoint overrides the default
    pub fn default_freshness(&self) -> Option<Duration> {
        match self {
            Endpoint::Organizations => Some(ORGANIZATIONS_FRESHNESS),
            _ => None,
        }
    }

    pub fn all() -> &'static [Endpoint] {
        &[
            Endpoint::Login,
            Endpoint::Logout,
            Endpoint::Register,
            Endpoint::Organizations,
            Endpoint::Organization,
            Endpoint::CreateOrganization,
            Endpoint::UpdateOrganization,
            Endpoint::Locations,
            Endpoint::Location,
            Endpoint::CreateLocation,
            Endpoint::UpdateLocation,
            Endpoint::Provider,
            Endpoint::CreateProvider,
            Endpoint::UpdateProvider,
            Endpoint::Specializations,
            Endpoint::Specialization,
            Endpoint::CreateSpecialization,
            Endpoint::UpdateSpecialization,
            Endpoint::UploadMultimedia,
            Endpoint::MultimediaPreview,
            Endpoint::OrganizationAppointments,
        ]
    }

    /// Look up an endpoint by its [`name`](Endpoint::name)
    pub fn from_name(name: &str) -> Option<Endpoint> {
        Endpoint::all().iter().copied().find(|e| e.name() == name)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
