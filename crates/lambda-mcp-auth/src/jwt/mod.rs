//! JWT validation for bearer tokens
//!
//! ```text
//!   token ──► unverified `iss` peek ──► AuthorizationServerDirectory
//!                                              │ (metadata, jwks_uri)
//!                                              ▼
//!   ValidatedTokenClaims ◄── signature/exp/aud/iss ◄── KeySetCache
//! ```
//!
//! - `jwks` - key set fetching and TTL caching
//! - `validator` - the end-to-end [`TokenValidator`]

pub mod jwks;
pub mod validator;

pub use jwks::{Clock, KEY_SET_TTL, KeyFetchError, KeySetCache, SystemClock};
pub use validator::{ALLOWED_ALGORITHMS, TokenValidator};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Claims of a token that passed signature, expiry, audience, issuer and
/// scope checks
///
/// Serializes as the plain claim object so it can be attached to a request
/// document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatedTokenClaims(Map<String, Value>);

impl ValidatedTokenClaims {
    /// Wrap an already-verified claim map
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// `iss`
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// `sub`
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// `aud`, which may be a single string or an array
    pub fn audience(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// `exp` in seconds since the Unix epoch
    pub fn expires_at(&self) -> Option<u64> {
        self.0.get("exp").and_then(Value::as_u64)
    }

    /// Whitespace-separated entries of the `scope` claim
    pub fn scopes(&self) -> Vec<&str> {
        self.get_str("scope")
            .map(|scope| scope.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether the `scope` claim contains `scope`
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }

    /// Any claim by name
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    /// All claims, including ones without an accessor
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the raw claim map
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn get_str(&self, claim: &str) -> Option<&str> {
        self.0.get(claim).and_then(Value::as_str)
    }
}

/// Read `iss` from a token without verifying anything
///
/// Only used to pick which authorization server to verify against.
pub(crate) fn unverified_issuer(token: &str) -> Result<Option<String>, AuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::invalid_token(validator::VALIDATION_FAILED));
    };

    let payload = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::invalid_token(validator::VALIDATION_FAILED))?;

    let claims: Map<String, Value> = serde_json::from_slice(&payload)
        .map_err(|_| AuthError::invalid_token(validator::VALIDATION_FAILED))?;

    Ok(claims
        .get("iss")
        .and_then(Value::as_str)
        .map(str::to_string))
}
