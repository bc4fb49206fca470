//! Bearer token validation against trusted authorization servers
//!
//! The issuer claim is read without verification purely to route the token
//! to the right authorization server. Trust is only established afterwards,
//! by verifying the signature with that server's published keys and
//! re-checking `iss` against the issuer the server itself reports.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{KeySetCache, ValidatedTokenClaims, unverified_issuer};
use crate::config::AuthorizationConfig;
use crate::discovery::{AuthorizationServerDirectory, AuthorizationServerMetadata};
use crate::error::AuthError;

/// Signature algorithms a token may use; everything else, `none` included,
/// is rejected before any key lookup
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::ES256, Algorithm::PS256];

pub(crate) const VALIDATION_FAILED: &str = "Token validation failed";
pub(crate) const MISSING_ISSUER: &str = "Token missing issuer";
pub(crate) const ISSUER_NOT_AUTHORIZED: &str = "Token issuer not in authorized servers";
pub(crate) const MISSING_JWKS_URI: &str = "Authorization server missing JWKS URI";
pub(crate) const SIGNING_KEYS_UNAVAILABLE: &str = "Unable to retrieve signing keys";
pub(crate) const AUDIENCE_INVALID: &str = "Token audience invalid";
pub(crate) const ISSUER_INVALID: &str = "Token issuer invalid";

/// End-to-end token validator
///
/// Shares the metadata directory and key-set cache with whoever else holds
/// the `Arc`s, so a middleware and its layer clones hit the same caches.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    authorization_servers: Vec<String>,
    required_scopes: Vec<String>,
    audience: Option<String>,
    directory: Arc<AuthorizationServerDirectory>,
    key_sets: Arc<KeySetCache>,
    leeway: u64,
}

impl TokenValidator {
    /// Create a validator for `config`
    ///
    /// Expiry is checked with zero leeway.
    pub fn new(
        config: &AuthorizationConfig,
        directory: Arc<AuthorizationServerDirectory>,
        key_sets: Arc<KeySetCache>,
    ) -> Self {
        Self {
            authorization_servers: config.authorization_servers.clone(),
            required_scopes: config.required_scopes.clone(),
            audience: config.audience.clone(),
            directory,
            key_sets,
            leeway: 0,
        }
    }

    /// Allow `seconds` of clock skew on `exp`
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// Validate `token` and return its claims
    ///
    /// # Errors
    ///
    /// - `InvalidToken` for malformed tokens, unknown issuers, unreachable
    ///   key sets, bad signatures, audience or issuer mismatch
    /// - `TokenExpired` when `exp` is in the past
    /// - `InsufficientScope` when a required scope is missing
    pub async fn validate(&self, token: &str) -> Result<ValidatedTokenClaims, AuthError> {
        let issuer = unverified_issuer(token)?.ok_or_else(|| {
            debug!("Token has no issuer claim");
            AuthError::invalid_token(MISSING_ISSUER)
        })?;

        let metadata = self.resolve_issuer(&issuer).await?;

        let jwks_uri = metadata.jwks_uri.as_deref().ok_or_else(|| {
            warn!(issuer = %metadata.issuer, "Authorization server metadata has no jwks_uri");
            AuthError::invalid_token(MISSING_JWKS_URI)
        })?;

        let keys = self.key_sets.get_keys(jwks_uri).await.map_err(|e| {
            warn!(jwks_uri = %jwks_uri, error = %e, "Signing keys unavailable");
            AuthError::invalid_token(SIGNING_KEYS_UNAVAILABLE)
        })?;

        let claims = self.verify(token, &keys, &metadata.issuer)?;
        self.check_scopes(&claims)?;

        debug!(
            issuer = %metadata.issuer,
            subject = ?claims.subject(),
            "Token validated"
        );
        Ok(claims)
    }

    /// First configured server whose discovered issuer equals `issuer`
    ///
    /// A server whose discovery fails is skipped, so an unreachable trusted
    /// server only shows up as the aggregate "not in authorized servers".
    async fn resolve_issuer(&self, issuer: &str) -> Result<AuthorizationServerMetadata, AuthError> {
        for server_url in &self.authorization_servers {
            match self.directory.discover(server_url).await {
                Ok(metadata) if metadata.issuer == issuer => return Ok(metadata),
                Ok(_) => {}
                Err(e) => {
                    warn!(server = %server_url, error = %e, "Skipping authorization server after discovery failure");
                }
            }
        }

        debug!(issuer = %issuer, "Token issuer does not match any authorized server");
        Err(AuthError::invalid_token(ISSUER_NOT_AUTHORIZED))
    }

    fn verify(
        &self,
        token: &str,
        keys: &JwkSet,
        issuer: &str,
    ) -> Result<ValidatedTokenClaims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode token header");
            AuthError::invalid_token(VALIDATION_FAILED)
        })?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            warn!(algorithm = ?header.alg, "Token algorithm not allowed");
            return Err(AuthError::invalid_token(VALIDATION_FAILED));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway;
        validation.set_required_spec_claims(&["exp"]);
        validation.set_issuer(&[issuer]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let candidates: Vec<&Jwk> = match header.kid.as_deref() {
            Some(kid) => keys.find(kid).into_iter().collect(),
            None => keys.keys.iter().collect(),
        };
        if candidates.is_empty() {
            warn!(key_id = ?header.kid, "No matching signing key");
            return Err(AuthError::invalid_token(VALIDATION_FAILED));
        }

        let mut last_error = None;
        for jwk in candidates {
            let key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(e) => {
                    debug!(key_id = ?jwk.common.key_id, error = %e, "Unusable JWK");
                    last_error = Some(e);
                    continue;
                }
            };

            match decode::<Map<String, Value>>(token, &key, &validation) {
                Ok(data) => return Ok(ValidatedTokenClaims::new(data.claims)),
                Err(e) if is_key_mismatch(&e) => last_error = Some(e),
                Err(e) => return Err(classify(&e)),
            }
        }

        Err(last_error.map_or_else(|| AuthError::invalid_token(VALIDATION_FAILED), |e| classify(&e)))
    }

    fn check_scopes(&self, claims: &ValidatedTokenClaims) -> Result<(), AuthError> {
        if self.required_scopes.is_empty() {
            return Ok(());
        }

        let provided = claims.scopes();
        if self
            .required_scopes
            .iter()
            .all(|required| provided.contains(&required.as_str()))
        {
            return Ok(());
        }

        debug!(
            required = ?self.required_scopes,
            provided = ?provided,
            "Token lacks required scopes"
        );
        Err(AuthError::InsufficientScope {
            required: self.required_scopes.clone(),
            provided: provided.into_iter().map(str::to_string).collect(),
        })
    }
}

/// Errors meaning "this key did not verify this token", worth trying the next key
fn is_key_mismatch(err: &JwtError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
    )
}

fn classify(err: &JwtError) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience => AuthError::invalid_token(AUDIENCE_INVALID),
        ErrorKind::InvalidIssuer => AuthError::invalid_token(ISSUER_INVALID),
        kind => {
            debug!(error = ?kind, "Token verification failed");
            AuthError::invalid_token(VALIDATION_FAILED)
        }
    }
}
