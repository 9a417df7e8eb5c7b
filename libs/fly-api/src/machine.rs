//! Machines REST API: compute instances, their network services, mounts and
//! health checks.
//!
//! Ref: https://fly.io/docs/machines/working-with-machines/

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::FlyClient;
use crate::error::FlyError;

/// Protocol-translation behavior applied to a public port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHandler {
    /// Convert TLS connection to unencrypted TCP
    Tls,
    /// Handle TLS for PostgreSQL connections
    PgTls,
    /// Convert TCP connection to HTTP
    Http,
    /// Wrap TCP connection in PROXY protocol
    ProxyProto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceProtocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyKind {
    Connections,
    Requests,
}

/// Load balancing concurrency limits for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyLimits {
    #[serde(rename = "type")]
    pub kind: ConcurrencyKind,
    /// Ideal concurrency; the platform spreads load to stay at or below it.
    pub soft_limit: u32,
    /// Maximum concurrency; connections queue or get rejected beyond it.
    pub hard_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Public-facing port number.
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handlers: Option<Vec<ConnectionHandler>>,
}

/// One network service routed from public ports to a port inside the VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub protocol: ServiceProtocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<ConcurrencyLimits>,
    /// Port the machine VM listens on.
    pub internal_port: u16,
    pub ports: Vec<PortConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Tcp,
    Http,
}

/// A named connectivity check against one port of the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub port: u16,
    /// Time between connectivity checks, e.g. `15s`.
    pub interval: String,
    /// Maximum time a connection may take before the check fails.
    pub timeout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Explicit guest resources for a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestConfig {
    /// Number of vCPUs.
    pub cpus: u32,
    /// Memory in megabytes, multiples of 256.
    pub memory_mb: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_args: Option<Vec<String>>,
}

/// VM sizing. The wire format takes either a named `size` or an explicit
/// `guest` block and rejects both together, so the two are one choice here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MachineSizing {
    Named { size: String },
    Guest { guest: GuestConfig },
}

impl MachineSizing {
    pub fn named(size: impl Into<String>) -> Self {
        MachineSizing::Named { size: size.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// The volume id, e.g. `vol_2n0l3vl60qpv635d`.
    pub volume: String,
    /// Absolute path inside the VM where the volume is mounted.
    pub path: String,
}

/// Desired configuration for a machine.
#[derive(Debug, Clone, Serialize)]
pub struct MachineConfig {
    /// The container image to run.
    pub image: String,
    #[serde(flatten)]
    pub sizing: MachineSizing,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    pub services: Vec<ServiceConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<MountConfig>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, HealthCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMachineRequest {
    /// Unique name for this machine. Generated by the platform if omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub config: MachineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineState {
    Created,
    Started,
    Stopped,
    Destroyed,
}

/// Realized machine config as echoed back by the platform. Looser than
/// [`MachineConfig`]: the platform reports both sizing fields and fills in
/// mount metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfigResponse {
    pub image: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub mounts: Vec<MountResponse>,
    #[serde(default)]
    pub checks: BTreeMap<String, HealthCheck>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub guest: Option<GuestResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MountResponse {
    pub volume: String,
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size_gb: Option<u32>,
    #[serde(default)]
    pub encrypted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestResponse {
    #[serde(default)]
    pub cpu_kind: Option<String>,
    pub cpus: u32,
    pub memory_mb: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
    pub digest: String,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

/// One lifecycle event of a machine, e.g. launch or start.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub source: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Passing,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckStatus {
    pub name: String,
    pub status: CheckState,
    #[serde(default)]
    pub output: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub state: MachineState,
    pub region: String,
    pub instance_id: String,
    pub private_ip: String,
    pub config: MachineConfigResponse,
    pub image_ref: ImageRef,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<MachineEvent>,
    #[serde(default)]
    pub checks: Vec<CheckStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl FlyClient {
    /// Create a machine inside an app.
    pub async fn create_machine(
        &self,
        app_id: &str,
        request: &CreateMachineRequest,
    ) -> Result<Machine, FlyError> {
        let path = format!("/v1/apps/{app_id}/machines");
        self.machines_post(&path, request).await
    }

    /// List all machines of an app.
    pub async fn list_machines(&self, app_id: &str) -> Result<Vec<Machine>, FlyError> {
        let path = format!("/v1/apps/{app_id}/machines");
        self.machines_get(&path).await
    }

    /// Delete a machine.
    pub async fn delete_machine(
        &self,
        app_id: &str,
        machine_id: &str,
    ) -> Result<OkResponse, FlyError> {
        let path = format!("/v1/apps/{app_id}/machines/{machine_id}");
        self.machines_delete(&path).await
    }

    /// Stop a machine, sending `SIGTERM` unless another signal is given.
    pub async fn stop_machine(
        &self,
        app_id: &str,
        machine_id: &str,
        signal: Option<&str>,
    ) -> Result<OkResponse, FlyError> {
        let path = format!("/v1/apps/{app_id}/machines/{machine_id}/stop");
        let body = serde_json::json!({ "signal": signal.unwrap_or("SIGTERM") });
        self.machines_post(&path, &body).await
    }

    /// Start a stopped machine.
    pub async fn start_machine(
        &self,
        app_id: &str,
        machine_id: &str,
    ) -> Result<OkResponse, FlyError> {
        let path = format!("/v1/apps/{app_id}/machines/{machine_id}/start");
        self.machines_post(&path, &serde_json::json!({})).await
    }
}
