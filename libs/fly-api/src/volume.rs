//! Persistent volume operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::FlyClient;
use crate::error::FlyError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeInput {
    pub app_id: String,
    pub name: String,
    pub region: String,
    pub size_gb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_unique_zone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkVolumeInput {
    pub app_id: String,
    pub source_vol_id: String,
    pub name: String,
    /// Restrict the clone to machines-only visibility.
    pub machines_only: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVolumeInput {
    pub volume_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub app: VolumeApp,
    pub region: String,
    pub size_gb: u32,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub host: VolumeHost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeApp {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeHost {
    pub id: String,
}

const CREATE_VOLUME_QUERY: &str = r#"mutation($input: CreateVolumeInput!) {
  createVolume(input: $input) {
    app {
      name
    }
    volume {
      id
      name
      app {
        name
      }
      region
      sizeGb
      encrypted
      createdAt
      host {
        id
      }
    }
  }
}"#;

const FORK_VOLUME_QUERY: &str = r#"mutation($input: ForkVolumeInput!) {
  forkVolume(input: $input) {
    app {
      name
    }
    volume {
      id
      name
      app {
        name
      }
      region
      sizeGb
      encrypted
      createdAt
      host {
        id
      }
    }
  }
}"#;

const DELETE_VOLUME_QUERY: &str = r#"mutation($input: DeleteVolumeInput!) {
  deleteVolume(input: $input) {
    app {
      name
    }
  }
}"#;

#[derive(Deserialize)]
struct CreateVolumeData {
    #[serde(rename = "createVolume")]
    create_volume: VolumePayload,
}

#[derive(Deserialize)]
struct ForkVolumeData {
    #[serde(rename = "forkVolume")]
    fork_volume: VolumePayload,
}

#[derive(Deserialize)]
struct VolumePayload {
    volume: Volume,
}

#[derive(Deserialize)]
struct DeleteVolumeData {
    #[serde(rename = "deleteVolume")]
    delete_volume: DeleteVolumePayload,
}

#[derive(Deserialize)]
struct DeleteVolumePayload {
    app: VolumeApp,
}

impl FlyClient {
    /// Create a fresh volume.
    pub async fn create_volume(&self, input: &CreateVolumeInput) -> Result<Volume, FlyError> {
        let data: CreateVolumeData = self
            .gql(CREATE_VOLUME_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.create_volume.volume)
    }

    /// Server-side clone of an existing volume's contents into a new volume.
    pub async fn fork_volume(&self, input: &ForkVolumeInput) -> Result<Volume, FlyError> {
        let data: ForkVolumeData = self
            .gql(FORK_VOLUME_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.fork_volume.volume)
    }

    /// Delete a volume by id. Returns the owning app name.
    pub async fn delete_volume(&self, volume_id: &str) -> Result<String, FlyError> {
        let input = DeleteVolumeInput {
            volume_id: volume_id.to_string(),
        };
        let data: DeleteVolumeData = self
            .gql(DELETE_VOLUME_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.delete_volume.app.name)
    }
}
