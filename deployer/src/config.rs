//! Deployment configuration
//!
//! Everything the run needs from the environment is captured here once at
//! process start; leaf functions never consult the environment themselves.

use std::env;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::errors::DeployError;

pub const DEFAULT_REGION: &str = "sin";
pub const DEFAULT_SIZE: &str = "shared-cpu-4x";
pub const DEFAULT_IMAGE: &str = "sweatybridge/postgres:dev";
pub const DEFAULT_SUPABASE_API_URL: &str = "https://api.supabase.com";
pub const DEFAULT_JWT_SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters-long";

/// How the owning organization is resolved: an explicit id needs no network
/// call, a slug goes through an organization lookup.
#[derive(Debug, Clone)]
pub enum OrganizationSelector {
    Id(String),
    Slug(String),
}

/// Immutable configuration for one deployment run.
#[derive(Debug)]
pub struct Config {
    /// Fly API bearer token.
    pub api_token: SecretString,

    /// Origin of the GraphQL API.
    pub graphql_endpoint: String,

    /// Origin of the Machines REST API.
    pub machines_endpoint: String,

    /// Owning organization for the app.
    pub organization: OrganizationSelector,

    /// Target region for the volume and machine.
    pub region: String,

    /// Named VM size.
    pub size: String,

    /// Container image to run.
    pub image: String,

    /// Size of the fresh volume when not forking.
    pub volume_size_gb: u32,

    /// Postgres-only mode: no public HTTP surface, smaller VM.
    pub db_only: bool,

    /// Sibling deployment whose volume gets forked instead of creating a
    /// fresh one.
    pub fork_from: Option<String>,

    /// Supabase platform API the deployed service reports to.
    pub supabase_api_url: String,

    /// Database superuser password.
    pub postgres_password: String,

    /// Shared secret used to sign the API keys.
    pub jwt_secret: String,

    /// Pre-supplied anon key; bypasses local minting when present.
    pub anon_key: Option<String>,

    /// Pre-supplied service role key; bypasses local minting when present.
    pub service_role_key: Option<String>,

    /// Externally-visible URL hint for the project reference.
    pub deploy_url: Option<String>,

    /// Repository (`owner/name`) used for the fallback project reference.
    pub repository: Option<String>,

    /// Branch used for the fallback project reference.
    pub branch: Option<String>,

    /// File to append `key=value` outputs to; stdout when absent.
    pub output_file: Option<PathBuf>,
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Build the configuration from the process environment. Fails before
    /// any network call when the API token is absent.
    pub fn from_env() -> Result<Self, DeployError> {
        let api_token = env_opt("FLY_API_TOKEN")
            .map(SecretString::from)
            .ok_or(DeployError::MissingEnv("FLY_API_TOKEN"))?;

        let organization = match env_opt("FLY_ORGANIZATION_ID") {
            Some(id) => OrganizationSelector::Id(id),
            None => OrganizationSelector::Slug(env_or("FLY_ORGANIZATION_SLUG", "personal")),
        };

        let volume_size_gb = match env_opt("FLY_VOLUME_SIZE_GB") {
            Some(raw) => raw.parse().map_err(|_| DeployError::InvalidEnv {
                name: "FLY_VOLUME_SIZE_GB",
                value: raw,
            })?,
            None => 1,
        };

        Ok(Self {
            api_token,
            graphql_endpoint: env_or("FLY_API_GRAPHQL", fly_api::DEFAULT_GRAPHQL_ENDPOINT),
            machines_endpoint: env_or("FLY_API_HOSTNAME", fly_api::DEFAULT_MACHINES_ENDPOINT),
            organization,
            region: env_or("FLY_MACHINE_REGION", DEFAULT_REGION),
            size: env_or("FLY_MACHINE_SIZE", DEFAULT_SIZE),
            image: env_or("FLY_MACHINE_IMAGE", DEFAULT_IMAGE),
            volume_size_gb,
            db_only: env_opt("DB_ONLY").as_deref() == Some("true"),
            fork_from: env_opt("PROJECT_REF"),
            supabase_api_url: env_or("SUPABASE_API_URL", DEFAULT_SUPABASE_API_URL),
            postgres_password: env_or("POSTGRES_PASSWORD", "postgres"),
            jwt_secret: env_or("JWT_SECRET", DEFAULT_JWT_SECRET),
            anon_key: env_opt("ANON_KEY"),
            service_role_key: env_opt("SERVICE_ROLE_KEY"),
            deploy_url: env_opt("DEPLOY_URL"),
            repository: env_opt("GITHUB_REPOSITORY"),
            branch: env_opt("GITHUB_HEAD_REF"),
            output_file: env_opt("GITHUB_OUTPUT").map(PathBuf::from),
        })
    }
}
