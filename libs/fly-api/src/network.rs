//! IP address allocation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::FlyClient;
use crate::error::FlyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "v4")]
    V4,
    #[serde(rename = "v6")]
    V6,
    #[serde(rename = "private_v6")]
    PrivateV6,
    #[serde(rename = "shared_v4")]
    SharedV4,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateIpAddressInput {
    pub app_id: String,
    #[serde(rename = "type")]
    pub addr_type: AddressType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl AllocateIpAddressInput {
    pub fn new(app_id: &str, addr_type: AddressType) -> Self {
        Self {
            app_id: app_id.to_string(),
            addr_type,
            organization_id: None,
            region: None,
            network: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    pub id: String,
    pub address: String,
    #[serde(rename = "type")]
    pub addr_type: AddressType,
    pub region: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseIpAddressInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

const ALLOCATE_IP_ADDRESS_QUERY: &str = r#"mutation($input: AllocateIPAddressInput!) {
  allocateIpAddress(input: $input) {
    ipAddress {
      id
      address
      type
      region
      createdAt
    }
  }
}"#;

const RELEASE_IP_ADDRESS_QUERY: &str = r#"mutation($input: ReleaseIPAddressInput!) {
  releaseIpAddress(input: $input) {
    app {
      name
    }
  }
}"#;

#[derive(Deserialize)]
struct AllocateIpAddressData {
    #[serde(rename = "allocateIpAddress")]
    allocate_ip_address: AllocateIpAddressPayload,
}

#[derive(Deserialize)]
struct AllocateIpAddressPayload {
    #[serde(rename = "ipAddress")]
    ip_address: Option<IpAddress>,
}

#[derive(Deserialize)]
struct ReleaseIpAddressData {
    #[serde(rename = "releaseIpAddress")]
    release_ip_address: ReleaseIpAddressPayload,
}

#[derive(Deserialize)]
struct ReleaseIpAddressPayload {
    app: ReleasedApp,
}

#[derive(Deserialize)]
struct ReleasedApp {
    name: String,
}

impl FlyClient {
    /// Allocate a public IP address for an app. The platform may omit the
    /// address details from the payload, hence the `Option`.
    pub async fn allocate_ip_address(
        &self,
        input: &AllocateIpAddressInput,
    ) -> Result<Option<IpAddress>, FlyError> {
        let data: AllocateIpAddressData = self
            .gql(ALLOCATE_IP_ADDRESS_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.allocate_ip_address.ip_address)
    }

    /// Release a previously allocated address. Returns the owning app name.
    pub async fn release_ip_address(
        &self,
        input: &ReleaseIpAddressInput,
    ) -> Result<String, FlyError> {
        let data: ReleaseIpAddressData = self
            .gql(RELEASE_IP_ADDRESS_QUERY, serde_json::json!({ "input": input }))
            .await?;
        Ok(data.release_ip_address.app.name)
    }
}
