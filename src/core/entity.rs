//! Entity records exchanged with the OrgPilot backend
//!
//! All records are plain data: JSON with camelCase field names on the wire.
//! Ids are assigned by the backend; the client never fabricates them.

use crate::cache::tag::TagType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier assigned by the backend to every entity
pub type EntityId = i64;

/// Base trait for the entities the client can read and write.
///
/// It ties a record to its REST resource and to the cache tag types that
/// group its query results.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The resource path segment (e.g., "organization")
    fn resource_name() -> &'static str;

    /// Tag type for a single entity of this kind (`Organization:{id}`)
    fn tag_type() -> TagType;

    /// Tag type for collection reads of this kind (`Organizations`)
    fn collection_tag_type() -> TagType;

    /// Get the identifier for this entity instance
    fn id(&self) -> EntityId;

    /// Check if the entity is active
    fn is_active(&self) -> bool;
}

/// Reference to another entity by id only, as sent in request bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }
}

/// Uploaded file metadata (organization logos)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimediaFile {
    pub id: EntityId,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub modification_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationAdmin {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: EntityId,
    pub name: String,
    pub active: bool,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub organization_admins: Vec<OrganizationAdmin>,
    #[serde(default)]
    pub clinical_staffs: Vec<serde_json::Value>,
    #[serde(default)]
    pub multimedia_file: Option<MultimediaFile>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub modification_date: Option<String>,
}

impl Organization {
    /// Ids of the organization's locations, in order
    pub fn location_ids(&self) -> Vec<EntityId> {
        self.locations.iter().map(|l| l.id).collect()
    }

    /// Admin emails as plain strings
    pub fn admin_emails(&self) -> Vec<&str> {
        self.organization_admins
            .iter()
            .map(|a| a.email.as_str())
            .collect()
    }
}

impl Entity for Organization {
    fn resource_name() -> &'static str {
        "organization"
    }

    fn tag_type() -> TagType {
        TagType::Organization
    }

    fn collection_tag_type() -> TagType {
        TagType::Organizations
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub detail: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
}

/// Back-reference from a location to its parent organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub address: Option<Address>,
    pub active_status: bool,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default)]
    pub organization: Option<OrganizationRef>,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub modification_date: Option<String>,
}

impl Entity for Location {
    fn resource_name() -> &'static str {
        "location"
    }

    fn tag_type() -> TagType {
        TagType::Location
    }

    fn collection_tag_type() -> TagType {
        TagType::Locations
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active_status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specialization {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub modification_date: Option<String>,
}

impl Entity for Specialization {
    fn resource_name() -> &'static str {
        "specialization"
    }

    fn tag_type() -> TagType {
        TagType::Specialization
    }

    fn collection_tag_type() -> TagType {
        TagType::Specializations
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ehr_provider_id: Option<String>,
    #[serde(default)]
    pub logo: Option<MultimediaFile>,
    #[serde(default)]
    pub specialization: Option<Specialization>,
    pub active_status: bool,
    #[serde(default)]
    pub enable_email_pdf: bool,
    /// Back-reference to the location; shape varies between endpoints.
    #[serde(default)]
    pub location: Option<serde_json::Value>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub modification_date: Option<String>,
}

impl Entity for Provider {
    fn resource_name() -> &'static str {
        "provider"
    }

    fn tag_type() -> TagType {
        TagType::Provider
    }

    fn collection_tag_type() -> TagType {
        TagType::Providers
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active_status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientName {
    pub first: String,
    pub last: String,
}

/// An appointment booked against one of an organization's providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub patient_id: String,
    pub appointment_date: String,
    pub name: PatientName,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub cli_from_status: Option<String>,
    #[serde(default)]
    pub digi_reg_form_status: Option<String>,
    #[serde(default)]
    pub digi_reg_form_response_id: Option<String>,
    #[serde(default)]
    pub cli_form_form_response_id: Option<String>,
    #[serde(default)]
    pub cli_appointment_link: Option<String>,
    #[serde(default)]
    pub digireg_appointment_link: Option<String>,
    #[serde(default)]
    pub organization: Option<serde_json::Value>,
}

/// Drop later duplicates so that every id appears once, keeping first-seen order.
pub fn dedup_by_id<T, F>(items: Vec<T>, id_of: F) -> Vec<T>
where
    F: Fn(&T) -> EntityId,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(id_of(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_organization_from_wire() {
        let org: Organization = serde_json::from_value(json!({
            "id": 5,
            "name": "Acme Health",
            "active": true,
            "locations": [{
                "id": 11,
                "name": "Downtown",
                "address": {"id": 3, "detail": "1 Main St", "city": "Springfield", "state": "IL", "zip": "62701"},
                "activeStatus": true,
                "timeZone": "America/Chicago",
                "organization": {"id": 5, "name": "Acme Health"},
                "providers": []
            }],
            "organizationAdmins": [{"email": "admin@acme.test"}],
            "clinicalStaffs": [],
            "multimediaFile": null,
            "creationDate": "2025-03-02T10:00:00",
            "modificationDate": "2025-03-02T10:00:00"
        }))
        .unwrap();

        assert_eq!(org.id(), 5);
        assert!(org.is_active());
        assert_eq!(org.location_ids(), vec![11]);
        assert_eq!(org.admin_emails(), vec!["admin@acme.test"]);
        assert_eq!(
            org.locations[0].organization.as_ref().map(|o| o.id),
            Some(5)
        );
    }

    #[test]
    fn test_specialization_nullable_name() {
        let specialization: Specialization =
            serde_json::from_value(json!({"id": 2, "name": null})).unwrap();
        assert_eq!(specialization.name, None);
    }

    #[test]
    fn test_address_skips_missing_id() {
        let address = Address {
            detail: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip: "62701".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&address).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["zip"], "62701");
    }

    #[test]
    fn test_dedup_by_id_keeps_first() {
        let refs = vec![
            EntityRef::new(1),
            EntityRef::new(2),
            EntityRef::new(1),
            EntityRef::new(3),
        ];
        let deduped = dedup_by_id(refs, |r| r.id);
        assert_eq!(
            deduped.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_entity_tag_types() {
        assert_eq!(Organization::tag_type(), TagType::Organization);
        assert_eq!(Location::collection_tag_type(), TagType::Locations);
        assert_eq!(Provider::resource_name(), "provider");
    }
}
