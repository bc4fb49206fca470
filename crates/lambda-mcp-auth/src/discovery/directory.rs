//! Authorization server directory
//!
//! Fetches RFC 8414 metadata for each configured authorization server and
//! keeps it for the lifetime of the directory. Entries never expire; the
//! cache is keyed by the server URL exactly as configured, which may differ
//! from the `issuer` the server reports.

use dashmap::DashMap;
use futures_util::future::join_all;
use tracing::{debug, warn};

use super::types::{
    AuthorizationServerMetadata, DiscoveryError, RegistrationCapability, SupportedServer,
};

const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";

/// Build the discovery URL for a server
///
/// The well-known path always sits at the server's origin, so
/// `https://example.com/tenant1` resolves to
/// `https://example.com/.well-known/oauth-authorization-server`.
/// Any path, query or fragment on `server_url` is dropped.
///
/// # Errors
///
/// Returns `InvalidUrl` if `server_url` is not an absolute URL.
pub fn discovery_url(server_url: &str) -> Result<String, DiscoveryError> {
    let mut url = url::Url::parse(server_url)
        .map_err(|e| DiscoveryError::InvalidUrl(format!("{server_url}: {e}")))?;

    url.set_path(WELL_KNOWN_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Fetch and parse one discovery document without touching any cache
pub(crate) async fn fetch_metadata(
    client: &reqwest::Client,
    server_url: &str,
) -> Result<AuthorizationServerMetadata, DiscoveryError> {
    let url = discovery_url(server_url)?;
    debug!(server = %server_url, discovery_url = %url, "Fetching authorization server metadata");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| DiscoveryError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status(status.as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| DiscoveryError::Http(e.to_string()))?;

    AuthorizationServerMetadata::from_document(&body)
}

/// Process-wide cache of authorization server metadata
#[derive(Debug)]
pub struct AuthorizationServerDirectory {
    client: reqwest::Client,
    cache: DashMap<String, AuthorizationServerMetadata>,
}

impl AuthorizationServerDirectory {
    /// Create a directory that fetches through `client`
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Discover metadata for `server_url`, serving from cache when present
    ///
    /// Concurrent misses for the same URL may both fetch; the last write wins.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] if the document is unreachable, answers
    /// with a non-success status, or lacks an `issuer`. Failures are not cached.
    pub async fn discover(
        &self,
        server_url: &str,
    ) -> Result<AuthorizationServerMetadata, DiscoveryError> {
        if let Some(cached) = self.cached(server_url) {
            debug!(server = %server_url, "Returning cached authorization server metadata");
            return Ok(cached);
        }

        let metadata = fetch_metadata(&self.client, server_url).await?;
        debug!(
            server = %server_url,
            issuer = %metadata.issuer,
            "Cached authorization server metadata"
        );
        self.cache.insert(server_url.to_string(), metadata.clone());
        Ok(metadata)
    }

    /// Cached metadata for `server_url`, if any
    pub fn cached(&self, server_url: &str) -> Option<AuthorizationServerMetadata> {
        self.cache.get(server_url).map(|entry| entry.value().clone())
    }

    /// Number of cached servers
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no server has been discovered yet
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Clear all cached metadata
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Partition `servers` by dynamic-registration support
    ///
    /// Every server is discovered independently. A server whose discovery
    /// fails is reported as unsupported instead of failing the whole call.
    /// Output preserves the input order.
    pub async fn list_registration_capable_servers(
        &self,
        servers: &[String],
    ) -> RegistrationCapability {
        let lookups = servers.iter().map(|server| async move {
            let result = self.discover(server).await;
            (server, result)
        });

        let mut capability = RegistrationCapability::default();
        for (server, result) in join_all(lookups).await {
            match result {
                Ok(metadata) => match metadata.registration_endpoint {
                    Some(registration_endpoint) => capability.supported.push(SupportedServer {
                        server: server.clone(),
                        registration_endpoint,
                        supported_scopes: metadata.scopes_supported,
                        supported_response_types: metadata.response_types_supported,
                        supported_grant_types: metadata.grant_types_supported,
                    }),
                    None => capability.unsupported.push(server.clone()),
                },
                Err(e) => {
                    warn!(server = %server, error = %e, "Discovery failed while listing registration support");
                    capability.unsupported.push(server.clone());
                }
            }
        }
        capability
    }
}
