//! Multi-call workflows built on the typed client

use crate::api::client::OrgPilotClient;
use crate::api::requests::{CreateLocationRequest, UpdateOrganizationRequest};
use crate::core::entity::{EntityId, EntityRef, Location, Organization};
use crate::core::error::{OrgPilotError, OrgPilotResult};

/// What happened to the organization side of a location creation
#[derive(Debug)]
pub enum LinkOutcome {
    /// The organization now lists the location
    Linked { organization: Organization },
    /// The location exists but could not be attached to the organization
    PartialFailure { error: OrgPilotError },
}

/// Result of [`OrgPilotClient::create_location_in_organization`]
#[derive(Debug)]
pub struct LocationCreation {
    pub location: Location,
    pub link: LinkOutcome,
}

impl LocationCreation {
    pub fn is_partial(&self) -> bool {
        matches!(self.link, LinkOutcome::PartialFailure { .. })
    }

    /// User-facing warning for a partial success
    pub fn notice(&self) -> Option<String> {
        match &self.link {
            LinkOutcome::Linked { .. } => None,
            LinkOutcome::PartialFailure { error } => Some(format!(
                "Location \"{}\" was created but could not be added to the organization: {}",
                self.location.name,
                user_message(error)
            )),
        }
    }
}

fn user_message(error: &OrgPilotError) -> String {
    match error {
        OrgPilotError::Api(api) => api.user_message().to_string(),
        other => other.to_string(),
    }
}

impl OrgPilotClient {
    /// Create a location and attach it to an organization
    ///
    /// The backend has no attach call, so the organization is read back
    /// fresh and rewritten in full with the new location appended. A failed
    /// creation is an error; a failed attach leaves the location standing
    /// and is reported as [`LinkOutcome::PartialFailure`].
    pub async fn create_location_in_organization(
        &self,
        organization_id: EntityId,
        mut request: CreateLocationRequest,
    ) -> OrgPilotResult<LocationCreation> {
        request.organization = Some(EntityRef::new(organization_id));
        let location = self.create_location(request).await?;
        tracing::debug!(location_id = location.id, organization_id, "location created");

        let link = match self.attach_location(organization_id, &location).await {
            Ok(organization) => LinkOutcome::Linked { organization },
            Err(error) => {
                tracing::warn!(
                    location_id = location.id,
                    organization_id,
                    error = %error,
                    "location created but not attached to organization"
                );
                LinkOutcome::PartialFailure { error }
            }
        };

        Ok(LocationCreation { location, link })
    }

    async fn attach_location(
        &self,
        organization_id: EntityId,
        location: &Location,
    ) -> OrgPilotResult<Organization> {
        let organization = self.organization_fresh(organization_id).await?;
        let update = UpdateOrganizationRequest::from_organization(&organization).with_location(location);
        self.update_organization(update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ApiError;
    use serde_json::json;

    fn location() -> Location {
        serde_json::from_value(json!({
            "id": 12,
            "name": "Downtown",
            "activeStatus": true,
            "timeZone": "UTC"
        }))
        .unwrap()
    }

    #[test]
    fn test_partial_notice() {
        let creation = LocationCreation {
            location: location(),
            link: LinkOutcome::PartialFailure {
                error: ApiError::Server {
                    status: 500,
                    message: "boom".to_string(),
                }
                .into(),
            },
        };
        assert!(creation.is_partial());
        let notice = creation.notice().unwrap();
        assert!(notice.starts_with("Location \"Downtown\" was created"));
    }
}
