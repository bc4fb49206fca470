//! Authorization configuration
//!
//! [`AuthorizationConfig`] is either built in code or loaded once from a
//! [`ConfigSource`]. The JSON document form accepts any subset of fields;
//! missing or `null` fields take the defaults below. The one exception is
//! `resource_documentation`, where an explicit `null` means "publish none".
//!
//! ```json
//! {
//!   "resource_id": "location-server",
//!   "authorization_servers": ["https://auth.example.com"],
//!   "required_scopes": ["location:read"],
//!   "audience": "location-api",
//!   "enable_authorization": true
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Resource identifier used when none is configured
pub const DEFAULT_RESOURCE_ID: &str = "mcp-server";
/// Default protected-resource metadata path
pub const DEFAULT_RESOURCE_METADATA_URL: &str = "/.well-known/oauth-protected-resource";
/// Default `resource_documentation` link
pub const DEFAULT_RESOURCE_DOCUMENTATION: &str =
    "https://modelcontextprotocol.io/specification/2025-06-18/basic/authorization";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document under `key` is not a valid configuration
    #[error("Malformed authorization config under '{key}': {reason}")]
    Malformed { key: String, reason: String },

    /// The secret store failed for a reason other than absence
    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Secret store errors
#[derive(Debug, Clone, Error)]
pub enum SecretError {
    #[error("Secret '{0}' not found")]
    NotFound(String),

    #[error("Secret store unavailable: {0}")]
    Unavailable(String),
}

/// Authorization settings for one protected resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAuthorizationConfig")]
pub struct AuthorizationConfig {
    /// Resource identifier, published as `resource` and used as the
    /// `WWW-Authenticate` realm
    pub resource_id: String,

    /// Trusted authorization server base URLs, in matching order
    pub authorization_servers: Vec<String>,

    /// Scopes every token must carry; empty means none
    pub required_scopes: Vec<String>,

    /// Expected `aud`; audience is not checked when unset
    pub audience: Option<String>,

    /// Where protected-resource metadata is served
    pub resource_metadata_url: String,

    /// When false the wrapped handler runs with no token checks
    pub enable_authorization: bool,

    pub resource_documentation: Option<String>,
    pub resource_policy_uri: Option<String>,
    pub resource_tos_uri: Option<String>,
}

#[derive(Deserialize)]
struct RawAuthorizationConfig {
    #[serde(default)]
    resource_id: Option<String>,
    #[serde(default)]
    authorization_servers: Option<Vec<String>>,
    #[serde(default)]
    required_scopes: Option<Vec<String>>,
    #[serde(default)]
    audience: Option<String>,
    #[serde(default)]
    resource_metadata_url: Option<String>,
    #[serde(default)]
    enable_authorization: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    resource_documentation: Option<Option<String>>,
    #[serde(default)]
    resource_policy_uri: Option<String>,
    #[serde(default)]
    resource_tos_uri: Option<String>,
}

// Keeps an explicit `null` apart from a missing field.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<RawAuthorizationConfig> for AuthorizationConfig {
    fn from(raw: RawAuthorizationConfig) -> Self {
        Self {
            resource_id: raw
                .resource_id
                .unwrap_or_else(|| DEFAULT_RESOURCE_ID.to_string()),
            authorization_servers: raw.authorization_servers.unwrap_or_default(),
            required_scopes: dedup(raw.required_scopes.unwrap_or_default()),
            audience: raw.audience,
            resource_metadata_url: raw
                .resource_metadata_url
                .unwrap_or_else(|| DEFAULT_RESOURCE_METADATA_URL.to_string()),
            enable_authorization: raw.enable_authorization.unwrap_or(true),
            resource_documentation: raw
                .resource_documentation
                .unwrap_or_else(|| Some(DEFAULT_RESOURCE_DOCUMENTATION.to_string())),
            resource_policy_uri: raw.resource_policy_uri,
            resource_tos_uri: raw.resource_tos_uri,
        }
    }
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCE_ID, Vec::new())
    }
}

impl AuthorizationConfig {
    /// Config with defaults for everything but the resource and its servers
    pub fn new(resource_id: impl Into<String>, authorization_servers: Vec<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            authorization_servers,
            required_scopes: Vec::new(),
            audience: None,
            resource_metadata_url: DEFAULT_RESOURCE_METADATA_URL.to_string(),
            enable_authorization: true,
            resource_documentation: Some(DEFAULT_RESOURCE_DOCUMENTATION.to_string()),
            resource_policy_uri: None,
            resource_tos_uri: None,
        }
    }

    /// Parse the JSON document form
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `json` is not an object of the
    /// expected shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Required scopes; duplicates are dropped, order is kept
    pub fn with_required_scopes(mut self, scopes: Vec<String>) -> Self {
        self.required_scopes = dedup(scopes);
        self
    }

    /// Expected `aud`; enables audience checking
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Path or absolute URL where metadata is served
    pub fn with_resource_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.resource_metadata_url = url.into();
        self
    }

    /// Turn token checks on or off
    pub fn with_enable_authorization(mut self, enabled: bool) -> Self {
        self.enable_authorization = enabled;
        self
    }

    /// Documentation link; `None` publishes none
    pub fn with_resource_documentation(mut self, url: Option<String>) -> Self {
        self.resource_documentation = url;
        self
    }

    /// Policy page published in the metadata
    pub fn with_resource_policy_uri(mut self, url: impl Into<String>) -> Self {
        self.resource_policy_uri = Some(url.into());
        self
    }

    /// Terms-of-service page published in the metadata
    pub fn with_resource_tos_uri(mut self, url: impl Into<String>) -> Self {
        self.resource_tos_uri = Some(url.into());
        self
    }

    /// Request path at which metadata is served
    ///
    /// The path component when `resource_metadata_url` is an absolute URL,
    /// otherwise the value itself.
    pub fn metadata_path(&self) -> String {
        match url::Url::parse(&self.resource_metadata_url) {
            Ok(url) => url.path().to_string(),
            Err(_) => self.resource_metadata_url.clone(),
        }
    }
}

fn dedup(scopes: Vec<String>) -> Vec<String> {
    let mut unique = Vec::with_capacity(scopes.len());
    for scope in scopes {
        if !unique.contains(&scope) {
            unique.push(scope);
        }
    }
    unique
}

/// Named-secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// # Errors
    ///
    /// `SecretError::NotFound` when no secret has this name.
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

/// Source of an [`AuthorizationConfig`]
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Load the configuration stored under `key`
    ///
    /// `Ok(None)` means nothing is stored there.
    ///
    /// # Errors
    ///
    /// `ConfigError::Malformed` for an unparseable document, or a secret
    /// store failure other than absence.
    async fn load(&self, key: &str) -> Result<Option<AuthorizationConfig>, ConfigError>;
}

fn parse_document(key: &str, document: &str) -> Result<AuthorizationConfig, ConfigError> {
    AuthorizationConfig::from_json(document).map_err(|e| ConfigError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Reads the JSON document from the environment variable named by the key
///
/// An empty variable counts as unset.
#[derive(Clone, Default)]
pub struct EnvConfigSource {
    overrides: Option<HashMap<String, String>>,
}

impl fmt::Debug for EnvConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvConfigSource")
            .field("overridden", &self.overrides.is_some())
            .finish()
    }
}

impl EnvConfigSource {
    /// Read the process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from a fixed map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self {
            overrides: Some(vars),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        match &self.overrides {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
        .filter(|value| !value.is_empty())
    }
}

#[async_trait]
impl ConfigSource for EnvConfigSource {
    async fn load(&self, key: &str) -> Result<Option<AuthorizationConfig>, ConfigError> {
        match self.var(key) {
            Some(document) => {
                debug!(key = %key, "Loading authorization config from environment");
                parse_document(key, &document).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Reads the JSON document from a [`SecretStore`]
#[derive(Debug, Clone)]
pub struct SecretConfigSource<S> {
    store: S,
}

impl<S> SecretConfigSource<S> {
    /// Read configuration documents from `store`
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: SecretStore> ConfigSource for SecretConfigSource<S> {
    async fn load(&self, key: &str) -> Result<Option<AuthorizationConfig>, ConfigError> {
        match self.store.get_secret(key).await {
            Ok(document) if document.is_empty() => Ok(None),
            Ok(document) => {
                debug!(key = %key, "Loading authorization config from secret store");
                parse_document(key, &document).map(Some)
            }
            Err(SecretError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Environment first, then the secret store
#[derive(Debug, Clone)]
pub struct LayeredConfigSource<S> {
    env: EnvConfigSource,
    secrets: SecretConfigSource<S>,
}

impl<S> LayeredConfigSource<S> {
    /// Environment first, then `store`
    pub fn new(env: EnvConfigSource, store: S) -> Self {
        Self {
            env,
            secrets: SecretConfigSource::new(store),
        }
    }
}

#[async_trait]
impl<S: SecretStore> ConfigSource for LayeredConfigSource<S> {
    async fn load(&self, key: &str) -> Result<Option<AuthorizationConfig>, ConfigError> {
        if let Some(config) = self.env.load(key).await? {
            return Ok(Some(config));
        }
        self.secrets.load(key).await
    }
}

/// In-memory [`SecretStore`]
#[derive(Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl fmt::Debug for StaticSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSecretStore")
            .field("names", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StaticSecretStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one secret
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}
