//! Request and response bodies of the backend endpoints

use crate::core::entity::{
    Address, EntityId, EntityRef, Location, Organization, OrganizationAdmin, dedup_by_id,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Payload of a successful login or registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthData {
    pub token: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multimedia_file: Option<EntityRef>,
}

/// A location as embedded in a full organization update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub active_status: bool,
    pub time_zone: String,
    #[serde(default)]
    pub providers: Vec<EntityRef>,
}

impl From<&Location> for LocationPayload {
    fn from(location: &Location) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            address: location.address.clone(),
            active_status: location.active_status,
            time_zone: location.time_zone.clone(),
            providers: dedup_by_id(
                location.providers.iter().map(|p| EntityRef::new(p.id)).collect(),
                |r| r.id,
            ),
        }
    }
}

/// Full replacement of an organization (`PUT /organization/{id}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub id: EntityId,
    pub name: String,
    pub active: bool,
    pub locations: Vec<LocationPayload>,
    #[serde(default)]
    pub organization_admins: Vec<OrganizationAdmin>,
    #[serde(default)]
    pub clinical_staffs: Vec<serde_json::Value>,
    pub multimedia_file: Option<EntityRef>,
}

impl UpdateOrganizationRequest {
    /// Update request that rewrites `organization` unchanged
    pub fn from_organization(organization: &Organization) -> Self {
        Self {
            id: organization.id,
            name: organization.name.clone(),
            active: organization.active,
            locations: dedup_by_id(
                organization.locations.iter().map(LocationPayload::from).collect(),
                |l| l.id,
            ),
            organization_admins: organization.organization_admins.clone(),
            clinical_staffs: organization.clinical_staffs.clone(),
            multimedia_file: organization
                .multimedia_file
                .as_ref()
                .map(|file| EntityRef::new(file.id)),
        }
    }

    /// Append `location`, keeping locations unique by id
    pub fn with_location(mut self, location: &Location) -> Self {
        self.locations.push(LocationPayload::from(location));
        self.locations = dedup_by_id(self.locations, |l| l.id);
        self
    }

    pub fn location_ids(&self) -> Vec<EntityId> {
        self.locations.iter().map(|l| l.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationRequest {
    pub name: String,
    pub address: Address,
    pub active_status: bool,
    pub time_zone: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    pub id: EntityId,
    pub name: String,
    pub address: Address,
    pub active_status: bool,
    pub time_zone: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderRequest {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub logo: Option<EntityRef>,
    pub specialization: EntityRef,
    pub active_status: bool,
    pub enable_email_pdf: bool,
    pub ehr_provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProviderRequest {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub logo: Option<EntityRef>,
    pub specialization: EntityRef,
    pub active_status: bool,
    pub enable_email_pdf: bool,
    pub ehr_provider_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSpecializationRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpecializationRequest {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

/// Appointments of one organization within a date range
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQuery {
    pub organization_id: EntityId,
    pub page: u32,
    pub size: u32,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
}

impl AppointmentQuery {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("size".to_string(), self.size.to_string()),
            ("startDate".to_string(), self.start_date.clone()),
            ("endDate".to_string(), self.end_date.clone()),
        ]
    }
}

/// File to upload as an organization or provider logo
#[derive(Debug, Clone, PartialEq)]
pub struct MultimediaUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Payload of a successful upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: EntityId,
}
