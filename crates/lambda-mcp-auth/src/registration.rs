//! OAuth 2.0 Dynamic Client Registration (RFC 7591) helper
//!
//! Registers a client with each configured authorization server that
//! advertises a `registration_endpoint`. Every server is handled on its own:
//! a failure leaves that server's entry empty and never affects the others.
//!
//! # Example
//!
//! ```rust,no_run
//! use lambda_mcp_auth::registration::ClientRegistrationHelper;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let helper = ClientRegistrationHelper::new()?;
//! let results = helper
//!     .discover_and_register_with_servers(
//!         &["https://auth.example.com".to_string()],
//!         "Location MCP Client",
//!         vec!["https://client.example.com/callback".to_string()],
//!         &["location:read".to_string()],
//!     )
//!     .await;
//!
//! for (server, response) in &results {
//!     println!("{server}: {:?}", response.as_ref().map(|r| &r.client_id));
//! }
//! # Ok(())
//! # }
//! ```

use futures_util::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::discovery::{DiscoveryError, fetch_metadata};
use crate::http_client::{DEFAULT_USER_AGENT, build_client};
use crate::pkce::PkcePair;
use crate::redact::{mask_client_secret, safe_error_message};

/// Registration errors
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Registration request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status
    #[error("{reason} (HTTP {status})")]
    Rejected { status: u16, reason: &'static str },

    #[error("Invalid registration response: {0}")]
    InvalidResponse(String),

    #[error("Invalid authorization endpoint: {0}")]
    InvalidUrl(String),
}

/// Client metadata sent to a registration endpoint (RFC 7591 Section 2)
///
/// Unset fields are omitted from the JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRegistrationRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,

    /// Space-separated scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
}

impl ClientRegistrationRequest {
    /// Bare request authenticating with `client_secret_basic`
    pub fn new(client_name: impl Into<String>, redirect_uris: Vec<String>) -> Self {
        Self {
            client_name: client_name.into(),
            redirect_uris,
            client_uri: None,
            logo_uri: None,
            contacts: None,
            tos_uri: None,
            policy_uri: None,
            token_endpoint_auth_method: Some("client_secret_basic".to_string()),
            grant_types: None,
            response_types: None,
            scope: None,
            software_id: None,
            software_version: None,
        }
    }

    /// Authorization-code client requesting `scopes`
    pub fn authorization_code(
        client_name: impl Into<String>,
        redirect_uris: Vec<String>,
        scopes: &[String],
    ) -> Self {
        Self {
            grant_types: Some(vec!["authorization_code".to_string()]),
            response_types: Some(vec!["code".to_string()]),
            ..Self::new(client_name, redirect_uris)
        }
        .with_scopes(scopes)
    }

    /// Sets `scope`; an empty list clears it
    pub fn with_scopes(mut self, scopes: &[String]) -> Self {
        self.scope = (!scopes.is_empty()).then(|| scopes.join(" "));
        self
    }

    /// Home page of the client
    pub fn with_client_uri(mut self, uri: impl Into<String>) -> Self {
        self.client_uri = Some(uri.into());
        self
    }

    /// Logo shown on consent screens
    pub fn with_logo_uri(mut self, uri: impl Into<String>) -> Self {
        self.logo_uri = Some(uri.into());
        self
    }

    /// Contact addresses for the client's operators
    pub fn with_contacts(mut self, contacts: Vec<String>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    /// Terms-of-service page
    pub fn with_tos_uri(mut self, uri: impl Into<String>) -> Self {
        self.tos_uri = Some(uri.into());
        self
    }

    /// Privacy policy page
    pub fn with_policy_uri(mut self, uri: impl Into<String>) -> Self {
        self.policy_uri = Some(uri.into());
        self
    }

    /// How the client authenticates at the token endpoint
    pub fn with_token_endpoint_auth_method(mut self, method: impl Into<String>) -> Self {
        self.token_endpoint_auth_method = Some(method.into());
        self
    }

    /// Software identifier and version, sent together
    pub fn with_software(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.software_id = Some(id.into());
        self.software_version = Some(version.into());
        self
    }
}

/// Registration result (RFC 7591 Section 3.2.1)
///
/// Credentials are held as [`SecretString`]; members not listed are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,

    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub client_secret: Option<SecretString>,

    #[serde(default)]
    pub client_secret_expires_at: Option<u64>,

    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub registration_access_token: Option<SecretString>,

    #[serde(default)]
    pub registration_client_uri: Option<String>,
    #[serde(default)]
    pub client_id_issued_at: Option<u64>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub grant_types: Option<Vec<String>>,
    #[serde(default)]
    pub response_types: Option<Vec<String>>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::new))
}

fn rejection_reason(status: u16) -> &'static str {
    match status {
        400 => "Invalid client registration request",
        401 => "Invalid or missing initial access token",
        403 => "Client registration not allowed",
        _ => "Client registration failed",
    }
}

/// Discovery and registration against authorization servers
#[derive(Debug, Clone)]
pub struct ClientRegistrationHelper {
    client: reqwest::Client,
}

impl ClientRegistrationHelper {
    /// Helper sending `User-Agent: MCP-Server/1.0`
    ///
    /// # Errors
    ///
    /// `RegistrationError::Client` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, RegistrationError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Helper sending a custom `User-Agent`
    ///
    /// # Errors
    ///
    /// `RegistrationError::Client` if the HTTP client cannot be built.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, RegistrationError> {
        let client =
            build_client(user_agent).map_err(|e| RegistrationError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Helper using an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// `registration_endpoint` of `server_url`, or `None` if it has none or
    /// cannot be discovered
    pub async fn discover_registration_endpoint(&self, server_url: &str) -> Option<String> {
        match fetch_metadata(&self.client, server_url).await {
            Ok(metadata) => match metadata.registration_endpoint {
                Some(endpoint) => {
                    info!(server = %server_url, registration_endpoint = %endpoint, "Found registration endpoint");
                    Some(endpoint)
                }
                None => {
                    warn!(server = %server_url, "Authorization server does not support dynamic client registration");
                    None
                }
            },
            Err(e) => {
                error!(
                    server = %server_url,
                    error = %safe_error_message("DiscoveryError", &e.to_string()),
                    "Failed to discover registration endpoint"
                );
                None
            }
        }
    }

    /// POST `request` to `endpoint`
    ///
    /// # Errors
    ///
    /// `Rejected` for a non-success status, `Http` for transport failures,
    /// `InvalidResponse` for an unparseable body.
    pub async fn try_register_client(
        &self,
        endpoint: &str,
        request: &ClientRegistrationRequest,
        initial_access_token: Option<&SecretString>,
    ) -> Result<ClientRegistrationResponse, RegistrationError> {
        let mut builder = self
            .client
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request);

        if let Some(token) = initial_access_token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RegistrationError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistrationError::Rejected {
                status: status.as_u16(),
                reason: rejection_reason(status.as_u16()),
            });
        }

        response
            .json::<ClientRegistrationResponse>()
            .await
            .map_err(|e| RegistrationError::InvalidResponse(e.to_string()))
    }

    /// [`try_register_client`](Self::try_register_client), logging and
    /// discarding the error
    pub async fn register_client(
        &self,
        endpoint: &str,
        request: &ClientRegistrationRequest,
        initial_access_token: Option<&SecretString>,
    ) -> Option<ClientRegistrationResponse> {
        match self
            .try_register_client(endpoint, request, initial_access_token)
            .await
        {
            Ok(response) => {
                info!(
                    client_id = %response.client_id,
                    client_secret = %mask_client_secret(
                        response.client_secret.as_ref().map(|s| s.expose_secret().as_str())
                    ),
                    "Registered client"
                );
                Some(response)
            }
            Err(RegistrationError::Rejected { status, reason }) => {
                error!(registration_endpoint = %endpoint, status, "{reason}");
                None
            }
            Err(e) => {
                error!(
                    registration_endpoint = %endpoint,
                    error = %safe_error_message("RegistrationError", &e.to_string()),
                    "Client registration failed"
                );
                None
            }
        }
    }

    /// Register `request` with every server that supports it
    pub async fn register_with_servers(
        &self,
        servers: &[String],
        request: &ClientRegistrationRequest,
    ) -> BTreeMap<String, Option<ClientRegistrationResponse>> {
        let attempts = servers.iter().map(|server| async move {
            let response = match self.discover_registration_endpoint(server).await {
                Some(endpoint) => self.register_client(&endpoint, request, None).await,
                None => None,
            };
            (server.clone(), response)
        });

        join_all(attempts).await.into_iter().collect()
    }

    /// Register an authorization-code client with every server that supports it
    pub async fn discover_and_register_with_servers(
        &self,
        servers: &[String],
        client_name: &str,
        redirect_uris: Vec<String>,
        required_scopes: &[String],
    ) -> BTreeMap<String, Option<ClientRegistrationResponse>> {
        let request =
            ClientRegistrationRequest::authorization_code(client_name, redirect_uris, required_scopes);
        self.register_with_servers(servers, &request).await
    }

    /// Authorization request URL with PKCE (OAuth 2.1) and optional RFC 8707 `resource`
    ///
    /// # Errors
    ///
    /// `InvalidUrl` if `authorization_endpoint` is not an absolute URL.
    pub fn authorization_url(
        authorization_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        state: &str,
        pkce: &PkcePair,
        resource: Option<&str>,
    ) -> Result<String, RegistrationError> {
        let mut url = url::Url::parse(authorization_endpoint)
            .map_err(|e| RegistrationError::InvalidUrl(format!("{authorization_endpoint}: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", scope)
                .append_pair("state", state)
                .append_pair("code_challenge", pkce.challenge())
                .append_pair("code_challenge_method", pkce.method());
            if let Some(resource) = resource {
                query.append_pair("resource", resource);
            }
        }

        Ok(url.to_string())
    }
}
