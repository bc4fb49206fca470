//! JWKS (JSON Web Key Set) fetching and caching
//!
//! One [`KeySetCache`] holds the key sets of every authorization server the
//! resource trusts, keyed by `jwks_uri`:
//!
//! - **Fixed TTL**: an entry is served for 3600 seconds after a successful fetch
//! - **No negative caching**: a failed fetch is retried on the next call
//! - **Racy refresh**: concurrent misses may both fetch; the last write wins
//!
//! Time is read through the [`Clock`] trait so expiry can be tested without
//! sleeping.

use dashmap::DashMap;
use jsonwebtoken::jwk::JwkSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, error, info};

/// Lifetime of a cached key set
pub const KEY_SET_TTL: Duration = Duration::from_secs(3600);

/// Key set retrieval errors
#[derive(Debug, Clone, Error)]
pub enum KeyFetchError {
    /// Network failure or timeout
    #[error("JWKS request failed: {0}")]
    Http(String),

    /// Non-success HTTP status
    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    /// Body is not a JWK Set
    #[error("Invalid JWKS document: {0}")]
    InvalidKeySet(String),
}

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> SystemTime;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: Arc<JwkSet>,
    expires_at: SystemTime,
}

/// Process-wide JWKS cache
///
/// # Example
///
/// ```rust,no_run
/// # use lambda_mcp_auth::jwt::KeySetCache;
/// # use lambda_mcp_auth::http_client::{build_client, DEFAULT_USER_AGENT};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = KeySetCache::new(build_client(DEFAULT_USER_AGENT)?);
/// let keys = cache.get_keys("https://auth.example.com/.well-known/jwks.json").await?;
/// if let Some(key) = keys.find("key-id-123") {
///     println!("found {:?}", key.common.key_id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct KeySetCache {
    client: reqwest::Client,
    cache: DashMap<String, CachedKeySet>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl KeySetCache {
    /// Create a cache with the default TTL and the system clock
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: DashMap::new(),
            ttl: KEY_SET_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    /// Override the entry lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the key set for `jwks_uri`, fetching it if absent or expired
    ///
    /// # Errors
    ///
    /// Returns a [`KeyFetchError`] on network failure, non-success status or
    /// an unparseable body. The failure is not cached.
    pub async fn get_keys(&self, jwks_uri: &str) -> Result<Arc<JwkSet>, KeyFetchError> {
        if let Some(keys) = self.cached(jwks_uri) {
            debug!(jwks_uri = %jwks_uri, "Using cached JWKS");
            return Ok(keys);
        }

        let keys = Arc::new(self.fetch(jwks_uri).await?);
        let expires_at = self.clock.now() + self.ttl;
        self.cache.insert(
            jwks_uri.to_string(),
            CachedKeySet {
                keys: Arc::clone(&keys),
                expires_at,
            },
        );

        info!(jwks_uri = %jwks_uri, key_count = keys.keys.len(), "JWKS fetched and cached");
        Ok(keys)
    }

    /// Drop the entry for `jwks_uri`
    pub fn invalidate(&self, jwks_uri: &str) {
        self.cache.remove(jwks_uri);
    }

    /// Drop every cached key set
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no key set is cached
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn cached(&self, jwks_uri: &str) -> Option<Arc<JwkSet>> {
        let entry = self.cache.get(jwks_uri)?;
        (self.clock.now() < entry.expires_at).then(|| Arc::clone(&entry.keys))
    }

    async fn fetch(&self, jwks_uri: &str) -> Result<JwkSet, KeyFetchError> {
        debug!(jwks_uri = %jwks_uri, "Fetching JWKS");

        let response = self.client.get(jwks_uri).send().await.map_err(|e| {
            error!(jwks_uri = %jwks_uri, error = %e, "JWKS request failed");
            KeyFetchError::Http(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(jwks_uri = %jwks_uri, status = status.as_u16(), "JWKS endpoint returned error status");
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeyFetchError::Http(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| {
            error!(jwks_uri = %jwks_uri, error = %e, "Failed to parse JWKS");
            KeyFetchError::InvalidKeySet(e.to_string())
        })
    }
}
