//! App (namespace) operations

use serde::{Deserialize, Serialize};

use crate::client::FlyClient;
use crate::error::FlyError;

/// Network scoping for a newly created app. Apps sharing a scoped network
/// name get a private network isolated from the organization default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AppNetwork {
    #[default]
    Unscoped,
    Scoped(String),
}

impl AppNetwork {
    fn into_option(self) -> Option<String> {
        match self {
            AppNetwork::Unscoped => None,
            AppNetwork::Scoped(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppInput {
    pub organization_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl CreateAppInput {
    pub fn new(organization_id: String, name: String, network: AppNetwork) -> Self {
        Self {
            organization_id,
            name,
            preferred_region: None,
            network: network.into_option(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub id: String,
    pub name: String,
    pub organization: OrganizationRef,
    #[serde(default)]
    pub regions: Vec<AppRegion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationRef {
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppRegion {
    pub name: String,
    pub code: String,
}

const CREATE_APP_QUERY: &str = r#"mutation($input: CreateAppInput!) {
  createApp(input: $input) {
    app {
      id
      name
      organization {
        slug
      }
      regions {
        name
        code
      }
    }
  }
}"#;

const DELETE_APP_QUERY: &str = r#"mutation($appId: ID!) {
  deleteApp(appId: $appId) {
    organization {
      id
    }
  }
}"#;

#[derive(Deserialize)]
struct CreateAppData {
    #[serde(rename = "createApp")]
    create_app: CreateAppPayload,
}

#[derive(Deserialize)]
struct CreateAppPayload {
    app: App,
}

#[derive(Deserialize)]
struct DeleteAppData {
    #[serde(rename = "deleteApp")]
    delete_app: DeleteAppPayload,
}

#[derive(Deserialize)]
struct DeleteAppPayload {
    organization: DeletedAppOrganization,
}

#[derive(Deserialize)]
struct DeletedAppOrganization {
    id: String,
}

impl FlyClient {
    /// Create an app under an organization.
    pub async fn create_app(&self, input: &CreateAppInput) -> Result<App, FlyError> {
        let data: CreateAppData = self
            .gql(CREATE_APP_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.create_app.app)
    }

    /// Delete an app by name, cascading to its machines, volumes, addresses
    /// and secrets. Returns the owning organization id.
    pub async fn delete_app(&self, name: &str) -> Result<String, FlyError> {
        let data: DeleteAppData = self
            .gql(DELETE_APP_QUERY, serde_json::json!({ "appId": name }))
            .await?;
        Ok(data.delete_app.organization.id)
    }
}
