//! # Authorization Server Discovery Types
//!
//! Types for OAuth 2.0 Authorization Server Metadata (RFC 8414) as consumed
//! by a protected resource.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Authorization server discovery errors
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The configured server URL cannot be turned into a discovery URL
    #[error("Invalid authorization server URL: {0}")]
    InvalidUrl(String),

    /// Network failure or timeout
    #[error("Discovery request failed: {0}")]
    Http(String),

    /// Non-success HTTP status (redirects included)
    #[error("Discovery endpoint returned HTTP {0}")]
    Status(u16),

    /// Body is not a JSON object or a field has the wrong type
    #[error("Invalid discovery document: {0}")]
    InvalidDocument(String),

    /// Document has no `issuer`
    #[error("Discovery document missing required field: issuer")]
    MissingIssuer,
}

/// OAuth 2.0 Authorization Server Metadata (RFC 8414)
///
/// Only `issuer` is mandatory. Unknown members are kept in
/// `additional_fields` so the document can be re-serialized without loss.
///
/// ```json
/// {
///   "issuer": "https://auth.example.com",
///   "authorization_endpoint": "https://auth.example.com/authorize",
///   "token_endpoint": "https://auth.example.com/token",
///   "jwks_uri": "https://auth.example.com/.well-known/jwks.json",
///   "registration_endpoint": "https://auth.example.com/register",
///   "scopes_supported": ["read", "write"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationServerMetadata {
    /// REQUIRED. The authorization server's issuer identifier
    pub issuer: String,

    /// URL of the authorization endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// URL of the token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// URL of the JWK Set document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// URL of the dynamic client registration endpoint (RFC 7591)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// URL of the token introspection endpoint (RFC 7662)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,

    /// URL of the token revocation endpoint (RFC 7009)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,

    /// Members not modelled above
    #[serde(flatten)]
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl AuthorizationServerMetadata {
    /// Minimal metadata with only an issuer
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            authorization_endpoint: None,
            token_endpoint: None,
            jwks_uri: None,
            registration_endpoint: None,
            scopes_supported: None,
            response_types_supported: None,
            grant_types_supported: None,
            token_endpoint_auth_methods_supported: None,
            code_challenge_methods_supported: None,
            introspection_endpoint: None,
            revocation_endpoint: None,
            additional_fields: HashMap::new(),
        }
    }

    /// Parse a discovery document, checking for `issuer` before anything else
    ///
    /// # Errors
    ///
    /// `InvalidDocument` if the body is not a JSON object or a known field has
    /// the wrong type, `MissingIssuer` if `issuer` is absent or not a string.
    pub fn from_document(body: &[u8]) -> Result<Self, DiscoveryError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| DiscoveryError::InvalidDocument(e.to_string()))?;

        let Some(object) = value.as_object() else {
            return Err(DiscoveryError::InvalidDocument(
                "expected a JSON object".to_string(),
            ));
        };

        if !object.get("issuer").is_some_and(serde_json::Value::is_string) {
            return Err(DiscoveryError::MissingIssuer);
        }

        serde_json::from_value(value).map_err(|e| DiscoveryError::InvalidDocument(e.to_string()))
    }

    /// Whether the server advertises dynamic client registration
    pub fn supports_registration(&self) -> bool {
        self.registration_endpoint.is_some()
    }
}

/// A registration-capable server as published at
/// `/.well-known/client-registration-info`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupportedServer {
    /// Configured server URL
    pub server: String,
    pub registration_endpoint: String,
    pub supported_scopes: Option<Vec<String>>,
    pub supported_response_types: Option<Vec<String>>,
    pub supported_grant_types: Option<Vec<String>>,
}

/// Partition of configured servers by dynamic-registration support
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistrationCapability {
    #[serde(rename = "supported_servers")]
    pub supported: Vec<SupportedServer>,

    /// Servers without a registration endpoint, or whose discovery failed
    #[serde(rename = "unsupported_servers")]
    pub unsupported: Vec<String>,
}
