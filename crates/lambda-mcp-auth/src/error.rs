//! Request-path error taxonomy
//!
//! Every failure on the protected-request path ends up as an [`AuthError`].
//! Each variant maps to exactly one wire-visible response:
//!
//! | Variant | Status | `error` |
//! |---------|--------|---------|
//! | `InvalidRequest` | 401 | `invalid_request` |
//! | `InvalidToken` | 401 | `invalid_token` |
//! | `TokenExpired` | 401 | `invalid_token` |
//! | `InsufficientScope` | 403 | `insufficient_scope` |
//! | `Discovery` / `KeyFetch` / `Internal` | 500 | `server_error` |
//!
//! Upstream failures (`Discovery`, `KeyFetch`) are converted to
//! `InvalidToken` by the [`TokenValidator`](crate::jwt::TokenValidator) before
//! they get here; if one does escape, the client only sees the generic
//! server error and never the upstream error text.

use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::jwt::jwks::KeyFetchError;

/// Generic description used for every 500 response.
pub const INTERNAL_ERROR_DESCRIPTION: &str = "Internal server error";

/// Description used when a bearer token is not present at all.
pub const MISSING_TOKEN_DESCRIPTION: &str = "Access token is required";

/// Description used for expired tokens.
pub const EXPIRED_TOKEN_DESCRIPTION: &str = "Token has expired";

/// Description used for tokens lacking a required scope.
pub const INSUFFICIENT_SCOPE_DESCRIPTION: &str = "Insufficient scope for this resource";

/// Authorization failure on the protected-request path
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carried no usable bearer token
    #[error("{0}")]
    InvalidRequest(String),

    /// The token is malformed, untrusted, or failed verification
    #[error("{0}")]
    InvalidToken(String),

    /// The token signature is valid but `exp` is in the past
    #[error("Token has expired")]
    TokenExpired,

    /// The token is valid but lacks one or more required scopes
    #[error("Insufficient token scope: required [{}], provided [{}]", required.join(" "), provided.join(" "))]
    InsufficientScope {
        /// Scopes demanded by this resource
        required: Vec<String>,
        /// Scopes carried by the token
        provided: Vec<String>,
    },

    /// Authorization server metadata could not be discovered
    #[error("Authorization server discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The signing key set could not be fetched
    #[error("Signing key retrieval failed: {0}")]
    KeyFetch(#[from] KeyFetchError),

    /// Anything else; never shown to the client verbatim
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Shorthand for [`AuthError::InvalidToken`]
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::InvalidToken(description.into())
    }

    /// Shorthand for [`AuthError::Internal`]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Token-missing error with the standard description
    pub fn missing_token() -> Self {
        Self::InvalidRequest(MISSING_TOKEN_DESCRIPTION.to_string())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::InvalidToken(_) | Self::TokenExpired => 401,
            Self::InsufficientScope { .. } => 403,
            Self::Discovery(_) | Self::KeyFetch(_) | Self::Internal(_) => 500,
        }
    }

    /// OAuth error code (RFC 6750 Section 3.1) for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidToken(_) | Self::TokenExpired => "invalid_token",
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::Discovery(_) | Self::KeyFetch(_) | Self::Internal(_) => "server_error",
        }
    }

    /// Description that may be sent to the client
    pub fn public_description(&self) -> String {
        match self {
            Self::InvalidRequest(description) | Self::InvalidToken(description) => {
                description.clone()
            }
            Self::TokenExpired => EXPIRED_TOKEN_DESCRIPTION.to_string(),
            Self::InsufficientScope { .. } => INSUFFICIENT_SCOPE_DESCRIPTION.to_string(),
            Self::Discovery(_) | Self::KeyFetch(_) | Self::Internal(_) => {
                INTERNAL_ERROR_DESCRIPTION.to_string()
            }
        }
    }

    /// Whether this error belongs to the client-authentication class
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::InvalidToken(_)
                | Self::TokenExpired
                | Self::InsufficientScope { .. }
        )
    }
}
