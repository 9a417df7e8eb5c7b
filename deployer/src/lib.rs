//! Preview deployer
//!
//! Provisions an isolated per-branch Supabase database deployment on
//! Fly.io: one app holding a volume, public addresses, secrets and a
//! machine. Re-runs for the same branch replace the previous deployment.

pub mod config;
pub mod deploy;
pub mod errors;
pub mod keys;
pub mod logs;
pub mod outputs;
pub mod refs;

use std::collections::BTreeMap;
use std::future::Future;

use fly_api::{ClientOptions, FlyClient};
use tracing::{info, warn};

use crate::config::Config;
use crate::deploy::{DeployRequest, DeploySecrets};
use crate::errors::DeployError;

/// Values reported back to the invoking environment on success.
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub anon_key: String,
    pub service_key: String,
    pub hostname: String,
}

/// Run a compensating action, logging and discarding its outcome. The
/// failure that triggered the cleanup always wins.
async fn best_effort<T, E: std::fmt::Display>(
    action: &str,
    attempt: impl Future<Output = Result<T, E>>,
) {
    if let Err(err) = attempt.await {
        warn!("{action} failed: {err}");
    }
}

/// Drive one deployment run: pre-clean the previous deployment under the
/// derived project reference, mint the API keys, orchestrate provisioning,
/// and tear the app back down if provisioning fails.
pub async fn run(config: Config) -> Result<RunOutputs, DeployError> {
    let project_ref = refs::derive_project_ref(
        config.deploy_url.as_deref(),
        config.repository.as_deref(),
        config.branch.as_deref(),
    );
    info!(project_ref = %project_ref, "starting deployment");

    let fly = FlyClient::new(ClientOptions {
        token: config.api_token,
        graphql_endpoint: config.graphql_endpoint,
        machines_endpoint: config.machines_endpoint,
    })?;

    // A previous run may have left an app behind; absence is the steady
    // state, so the delete outcome does not matter.
    best_effort("pre-clean delete_app", fly.delete_app(&project_ref)).await;

    let minted = keys::generate_api_keys(&config.jwt_secret, &project_ref)?;
    let anon_key = config.anon_key.unwrap_or(minted.anon_key);
    let service_role_key = config.service_role_key.unwrap_or(minted.service_role_key);

    let request = DeployRequest {
        name: project_ref.clone(),
        region: config.region,
        size: config.size,
        image: config.image,
        volume_size_gb: config.volume_size_gb,
        db_only: config.db_only,
        fork_from: config.fork_from,
        organization: config.organization,
        supabase_api_url: config.supabase_api_url,
        secrets: DeploySecrets {
            postgres_password: config.postgres_password,
            jwt_secret: config.jwt_secret,
            admin_api_key: minted.admin_api_key,
            anon_key: anon_key.clone(),
            service_role_key: service_role_key.clone(),
            extra: BTreeMap::new(),
        },
        env: BTreeMap::from([("PROJECT_REF".to_string(), project_ref.clone())]),
    };

    match deploy::deploy_database(&fly, &request).await {
        Ok(deployed) => {
            info!(
                machine = %deployed.machine.id,
                volume = %deployed.volume.id,
                "deployment complete"
            );
            Ok(RunOutputs {
                anon_key,
                service_key: service_role_key,
                hostname: format!("{project_ref}.fly.dev"),
            })
        }
        Err(err) => {
            best_effort("rollback delete_app", fly.delete_app(&project_ref)).await;
            Err(err)
        }
    }
}
