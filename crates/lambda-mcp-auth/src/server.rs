//! Protected-resource side of the protocol
//!
//! - Protected Resource Metadata document (RFC 9728)
//! - `WWW-Authenticate` header values for 401 responses (RFC 6750)
//! - JSON error responses

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::config::AuthorizationConfig;
use crate::error::{AuthError, INTERNAL_ERROR_DESCRIPTION};
use crate::request::ProxyResponse;

/// Ways a client may present its token here
pub const BEARER_METHODS_SUPPORTED: [&str; 2] = ["header", "query"];

/// Protected Resource Metadata (RFC 9728); unset optional fields are omitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_policy_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_tos_uri: Option<String>,
}

/// Builds metadata, challenges and error responses from one configuration
#[derive(Debug, Clone)]
pub struct ResourceMetadataPublisher {
    config: Arc<AuthorizationConfig>,
}

impl ResourceMetadataPublisher {
    /// Publisher for `config`'s resource
    pub fn new(config: Arc<AuthorizationConfig>) -> Self {
        Self { config }
    }

    /// Metadata document, built fresh from configuration
    pub fn protected_resource_metadata(&self) -> ProtectedResourceMetadata {
        let config = &self.config;
        ProtectedResourceMetadata {
            resource: config.resource_id.clone(),
            authorization_servers: config.authorization_servers.clone(),
            scopes_supported: (!config.required_scopes.is_empty())
                .then(|| config.required_scopes.clone()),
            bearer_methods_supported: Some(
                BEARER_METHODS_SUPPORTED.iter().map(|m| m.to_string()).collect(),
            ),
            resource_documentation: config.resource_documentation.clone(),
            resource_policy_uri: config.resource_policy_uri.clone(),
            resource_tos_uri: config.resource_tos_uri.clone(),
        }
    }

    /// 200 response carrying the metadata document
    pub fn metadata_response(&self) -> ProxyResponse {
        match serde_json::to_value(self.protected_resource_metadata()) {
            Ok(body) => ProxyResponse::json(200, &body),
            Err(_) => server_error_response(),
        }
    }

    /// `WWW-Authenticate` value
    ///
    /// ```text
    /// Bearer realm="<resource_id>", as_uri="<metadata url>", error="<error>"[, error_description="..."][, scope="..."]
    /// ```
    pub fn www_authenticate_header(&self, error: &str, description: Option<&str>) -> String {
        let mut parts = vec![
            format!("Bearer realm=\"{}\"", quote(&self.config.resource_id)),
            format!("as_uri=\"{}\"", quote(&self.config.resource_metadata_url)),
            format!("error=\"{}\"", quote(error)),
        ];

        if let Some(description) = description {
            parts.push(format!("error_description=\"{}\"", quote(description)));
        }

        if !self.config.required_scopes.is_empty() {
            parts.push(format!(
                "scope=\"{}\"",
                quote(&self.config.required_scopes.join(" "))
            ));
        }

        parts.join(", ")
    }

    /// JSON error response; `WWW-Authenticate` is added only for 401
    pub fn error_response(
        &self,
        status: u16,
        error: &str,
        description: Option<&str>,
    ) -> ProxyResponse {
        let body = json!({
            "error": error,
            "error_description": description.unwrap_or(error),
        });

        let response = ProxyResponse::json(status, &body);
        if status == 401 {
            response.with_header(
                "WWW-Authenticate",
                self.www_authenticate_header(error, description),
            )
        } else {
            response
        }
    }

    /// Response for a request-path failure
    pub fn auth_error_response(&self, err: &AuthError) -> ProxyResponse {
        let description = err.public_description();
        self.error_response(err.status_code(), err.error_code(), Some(&description))
    }
}

/// 500 response that needs no configuration
pub fn server_error_response() -> ProxyResponse {
    ProxyResponse::json(
        500,
        &json!({
            "error": "server_error",
            "error_description": INTERNAL_ERROR_DESCRIPTION,
        }),
    )
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
