//! HTTP transports for the Fly.io platform

use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::error::FlyError;

pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.fly.io";
pub const DEFAULT_MACHINES_ENDPOINT: &str = "http://127.0.0.1:4280";

/// Connection settings for [`FlyClient`].
#[derive(Debug)]
pub struct ClientOptions {
    /// API bearer token.
    pub token: SecretString,

    /// Origin serving the GraphQL API.
    pub graphql_endpoint: String,

    /// Origin serving the Machines REST API.
    pub machines_endpoint: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            token: SecretString::from(String::new()),
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            machines_endpoint: DEFAULT_MACHINES_ENDPOINT.to_string(),
        }
    }
}

/// Client for both Fly.io transports.
pub struct FlyClient {
    client: Client,
    token: SecretString,
    graphql_endpoint: String,
    machines_endpoint: String,
}

#[derive(Serialize)]
struct GraphqlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphqlError>>,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphqlErrorLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    pub line: u32,
    pub column: u32,
}

impl FlyClient {
    /// Create a new client.
    pub fn new(options: ClientOptions) -> Result<Self, FlyError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token: options.token,
            graphql_endpoint: options.graphql_endpoint.trim_end_matches('/').to_string(),
            machines_endpoint: options.machines_endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    /// Execute one GraphQL operation against `/graphql`.
    pub(crate) async fn gql<V: Serialize, T: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: V,
    ) -> Result<T, FlyError> {
        let url = format!("{}/graphql", self.graphql_endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .json(&GraphqlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FlyError::Transport { status, body });
        }

        let parsed: GraphqlResponse<T> = serde_json::from_str(&body)?;
        if let Some(errors) = parsed.errors {
            return Err(FlyError::Remote(serde_json::to_string(&errors)?));
        }
        parsed.data.ok_or(FlyError::MissingData)
    }

    /// Make a GET request against the Machines API.
    pub(crate) async fn machines_get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, FlyError> {
        let url = format!("{}{}", self.machines_endpoint, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .send()
            .await?;

        Self::machines_response(response).await
    }

    /// Make a POST request against the Machines API.
    pub(crate) async fn machines_post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FlyError> {
        let url = format!("{}{}", self.machines_endpoint, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .json(body)
            .send()
            .await?;

        Self::machines_response(response).await
    }

    /// Make a DELETE request against the Machines API.
    pub(crate) async fn machines_delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, FlyError> {
        let url = format!("{}{}", self.machines_endpoint, path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .send()
            .await?;

        Self::machines_response(response).await
    }

    async fn machines_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FlyError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FlyError::Transport { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}
