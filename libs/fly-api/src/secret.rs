//! App secret management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::FlyClient;
use crate::error::FlyError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInput {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSecretsInput {
    pub app_id: String,
    pub secrets: Vec<SecretInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_all: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsetSecretsInput {
    pub app_id: String,
    pub keys: Vec<String>,
}

/// Release triggered by a secret change. Absent when the app has never been
/// deployed, which is always the case during initial provisioning.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: String,
    pub version: i64,
    pub reason: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

const SET_SECRETS_QUERY: &str = r#"mutation($input: SetSecretsInput!) {
  setSecrets(input: $input) {
    release {
      id
      version
      reason
      description
      createdAt
    }
  }
}"#;

const UNSET_SECRETS_QUERY: &str = r#"mutation($input: UnsetSecretsInput!) {
  unsetSecrets(input: $input) {
    release {
      id
      version
      reason
      description
      createdAt
    }
  }
}"#;

#[derive(Deserialize)]
struct SetSecretsData {
    #[serde(rename = "setSecrets")]
    set_secrets: SecretsPayload,
}

#[derive(Deserialize)]
struct UnsetSecretsData {
    #[serde(rename = "unsetSecrets")]
    unset_secrets: SecretsPayload,
}

#[derive(Deserialize)]
struct SecretsPayload {
    release: Option<Release>,
}

impl FlyClient {
    /// Set secrets on an app in bulk. Re-setting an existing key overwrites.
    pub async fn set_secrets(&self, input: &SetSecretsInput) -> Result<Option<Release>, FlyError> {
        let data: SetSecretsData = self
            .gql(SET_SECRETS_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.set_secrets.release)
    }

    /// Remove secrets from an app by key.
    pub async fn unset_secrets(
        &self,
        input: &UnsetSecretsInput,
    ) -> Result<Option<Release>, FlyError> {
        let data: UnsetSecretsData = self
            .gql(UNSET_SECRETS_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.unset_secrets.release)
    }
}
