//! Deployment orchestrator
//!
//! Sequences one provisioning run: resolve the owning organization, create
//! the app, provision the volume, both IP families and the secret set
//! concurrently, then create the machine wired to the volume. Failures
//! propagate untouched; the compensating app delete is the caller's job so
//! a cleanup failure can never mask the original cause.

use std::collections::BTreeMap;

use fly_api::app::{AppNetwork, CreateAppInput};
use fly_api::machine::{
    CheckKind, ConnectionHandler, CreateMachineRequest, HealthCheck, Machine, MachineConfig,
    MachineSizing, MountConfig, PortConfig, ServiceConfig, ServiceProtocol,
};
use fly_api::network::{AddressType, AllocateIpAddressInput, IpAddress};
use fly_api::secret::{SecretInput, SetSecretsInput};
use fly_api::volume::{CreateVolumeInput, ForkVolumeInput, Volume};
use fly_api::FlyClient;
use tracing::info;

use crate::config::OrganizationSelector;
use crate::errors::DeployError;

/// Mount point of the data volume inside the VM.
pub const MOUNT_PATH: &str = "/mnt/postgresql";

/// Named VM size used in Postgres-only mode.
pub const DB_ONLY_SIZE: &str = "shared-cpu-2x";

const POSTGRES_PORT: u16 = 5432;
const ADMIN_API_PORT: u16 = 8085;
const CHECK_INTERVAL: &str = "15s";
const CHECK_TIMEOUT: &str = "10s";

/// Immutable input to one orchestration run.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// App name; also the organization-scoped project reference.
    pub name: String,
    pub region: String,
    /// Named VM size for the full stack.
    pub size: String,
    pub image: String,
    pub volume_size_gb: u32,
    pub db_only: bool,
    /// Sibling deployment to fork the volume from.
    pub fork_from: Option<String>,
    pub organization: OrganizationSelector,
    pub supabase_api_url: String,
    pub secrets: DeploySecrets,
    pub env: BTreeMap<String, String>,
}

/// Secret set for one deployment. The schema keeps evolving, so beyond the
/// required keys anything extra rides along in `extra`.
#[derive(Debug, Clone, Default)]
pub struct DeploySecrets {
    pub postgres_password: String,
    pub jwt_secret: String,
    pub admin_api_key: String,
    pub anon_key: String,
    pub service_role_key: String,
    pub extra: BTreeMap<String, String>,
}

impl DeploySecrets {
    /// Flatten to wire entries: empty values are dropped and keys are
    /// upper-cased.
    pub fn to_inputs(&self) -> Vec<SecretInput> {
        let known = [
            ("postgres_password", &self.postgres_password),
            ("jwt_secret", &self.jwt_secret),
            ("admin_api_key", &self.admin_api_key),
            ("anon_key", &self.anon_key),
            ("service_role_key", &self.service_role_key),
        ];
        known
            .into_iter()
            .chain(self.extra.iter().map(|(key, value)| (key.as_str(), value)))
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| SecretInput {
                key: key.to_ascii_uppercase(),
                value: value.clone(),
            })
            .collect()
    }
}

/// Everything a successful run hands back. The v6 allocation is requested
/// but intentionally not retained; the secrets release carries no useful
/// identity either.
#[derive(Debug)]
pub struct Deployed {
    pub machine: Machine,
    pub ip: Option<IpAddress>,
    pub volume: Volume,
}

/// Find the volume to fork from: first mount in iteration order across all
/// machines of the source app.
pub async fn resolve_volume(fly: &FlyClient, source_app: &str) -> Result<String, DeployError> {
    let machines = fly.list_machines(source_app).await?;
    let mount = machines
        .iter()
        .flat_map(|machine| machine.config.mounts.iter())
        .next()
        .ok_or_else(|| DeployError::NoSourceVolume(source_app.to_string()))?;
    Ok(mount.volume.clone())
}

/// Data volume name derived from the app name.
pub fn volume_name(app_name: &str) -> String {
    format!("{}_pgdata", app_name.replace('-', "_"))
}

/// Create the deployment's volume: a machines-only fork of the source
/// deployment's volume when one is given, a fresh volume otherwise.
pub async fn make_volume(
    fly: &FlyClient,
    name: &str,
    region: &str,
    volume_size_gb: u32,
    fork_from: Option<&str>,
) -> Result<Volume, DeployError> {
    let volume_name = volume_name(name);
    if let Some(source_app) = fork_from {
        let source_vol_id = resolve_volume(fly, source_app).await?;
        let volume = fly
            .fork_volume(&ForkVolumeInput {
                app_id: name.to_string(),
                source_vol_id,
                name: volume_name,
                machines_only: true,
            })
            .await?;
        return Ok(volume);
    }
    let volume = fly
        .create_volume(&CreateVolumeInput {
            app_id: name.to_string(),
            name: volume_name,
            region: region.to_string(),
            size_gb: volume_size_gb,
            encrypted: None,
            require_unique_zone: None,
            snapshot_id: None,
        })
        .await?;
    Ok(volume)
}

/// Resolve the owning organization id. An explicit id short-circuits
/// without a network call.
pub async fn resolve_org_id(
    fly: &FlyClient,
    selector: &OrganizationSelector,
) -> Result<String, DeployError> {
    match selector {
        OrganizationSelector::Id(id) => Ok(id.clone()),
        OrganizationSelector::Slug(slug) => Ok(fly.get_organization(slug).await?.id),
    }
}

fn tcp_service(internal_port: u16, ports: Vec<PortConfig>) -> ServiceConfig {
    ServiceConfig {
        protocol: ServiceProtocol::Tcp,
        concurrency: None,
        internal_port,
        ports,
    }
}

fn tcp_check(port: u16) -> HealthCheck {
    HealthCheck {
        kind: CheckKind::Tcp,
        port,
        interval: CHECK_INTERVAL.to_string(),
        timeout: CHECK_TIMEOUT.to_string(),
        method: None,
        path: None,
    }
}

/// Assemble the machine configuration around the resolved volume.
pub fn build_machine_config(request: &DeployRequest, volume_id: &str) -> MachineConfig {
    let mut env = request.env.clone();
    env.insert("PGDATA".to_string(), format!("{MOUNT_PATH}/data"));
    env.insert(
        "SUPABASE_URL".to_string(),
        format!("{}/system", request.supabase_api_url),
    );
    env.insert(
        "INIT_PAYLOAD_PATH".to_string(),
        format!("{MOUNT_PATH}/payload.tar.gz"),
    );

    let mut services = vec![
        tcp_service(
            POSTGRES_PORT,
            vec![PortConfig {
                port: POSTGRES_PORT,
                handlers: None,
            }],
        ),
        tcp_service(
            ADMIN_API_PORT,
            vec![PortConfig {
                port: ADMIN_API_PORT,
                handlers: Some(vec![ConnectionHandler::Http]),
            }],
        ),
    ];

    let sizing = if request.db_only {
        env.insert("POSTGRES_ONLY".to_string(), "true".to_string());
        MachineSizing::named(DB_ONLY_SIZE)
    } else {
        services.extend([
            tcp_service(
                8000,
                vec![PortConfig {
                    port: 80,
                    handlers: Some(vec![ConnectionHandler::Http]),
                }],
            ),
            tcp_service(
                8443,
                vec![PortConfig {
                    port: 443,
                    handlers: None,
                }],
            ),
            tcp_service(
                6543,
                vec![PortConfig {
                    port: 6543,
                    handlers: None,
                }],
            ),
        ]);
        MachineSizing::named(request.size.clone())
    };

    let checks = BTreeMap::from([
        ("adminapi".to_string(), tcp_check(ADMIN_API_PORT)),
        ("postgres".to_string(), tcp_check(POSTGRES_PORT)),
    ]);

    MachineConfig {
        image: request.image.clone(),
        sizing,
        env,
        services,
        mounts: vec![MountConfig {
            volume: volume_id.to_string(),
            path: MOUNT_PATH.to_string(),
        }],
        checks,
    }
}

/// Run one provisioning attempt end to end.
pub async fn deploy_database(
    fly: &FlyClient,
    request: &DeployRequest,
) -> Result<Deployed, DeployError> {
    let organization_id = resolve_org_id(fly, &request.organization).await?;

    // Custom networks are unsupported by fly ssh, so apps stay unscoped.
    fly.create_app(&CreateAppInput::new(
        organization_id,
        request.name.clone(),
        AppNetwork::Unscoped,
    ))
    .await?;
    info!(app = %request.name, "created app");

    // Volume, both address families and the secret set are independent;
    // only the volume id is needed downstream. First failure wins and the
    // siblings are dropped, leaving reclamation to the app delete.
    let (volume, ip, _ip6, _release) = tokio::try_join!(
        make_volume(
            fly,
            &request.name,
            &request.region,
            request.volume_size_gb,
            request.fork_from.as_deref(),
        ),
        async {
            fly.allocate_ip_address(&AllocateIpAddressInput::new(&request.name, AddressType::V4))
                .await
                .map_err(DeployError::from)
        },
        async {
            fly.allocate_ip_address(&AllocateIpAddressInput::new(&request.name, AddressType::V6))
                .await
                .map_err(DeployError::from)
        },
        async {
            fly.set_secrets(&SetSecretsInput {
                app_id: request.name.clone(),
                secrets: request.secrets.to_inputs(),
                replace_all: None,
            })
            .await
            .map_err(DeployError::from)
        },
    )?;
    info!(volume = %volume.id, "provisioned volume, addresses and secrets");

    let machine = fly
        .create_machine(
            &request.name,
            &CreateMachineRequest {
                name: Some(request.name.clone()),
                region: Some(request.region.clone()),
                config: build_machine_config(request, &volume.id),
            },
        )
        .await?;
    info!(machine = %machine.id, "created machine");

    Ok(Deployed { machine, ip, volume })
}
