//! Organization lookup

use serde::{Deserialize, Serialize};

use crate::client::FlyClient;
use crate::error::FlyError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: OrganizationType,
    pub viewer_role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationType {
    Personal,
    Shared,
}

const GET_ORGANIZATION_QUERY: &str = r#"query($slug: String!) {
  organization(slug: $slug) {
    id
    slug
    name
    type
    viewerRole
  }
}"#;

#[derive(Deserialize)]
struct GetOrganizationData {
    organization: Organization,
}

impl FlyClient {
    /// Look up an organization by slug.
    pub async fn get_organization(&self, slug: &str) -> Result<Organization, FlyError> {
        let data: GetOrganizationData = self
            .gql(GET_ORGANIZATION_QUERY, serde_json::json!({ "slug": slug }))
            .await?;
        Ok(data.organization)
    }
}
