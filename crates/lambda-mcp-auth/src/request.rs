//! API Gateway proxy request and response documents
//!
//! Field names follow the Lambda proxy integration (`httpMethod`,
//! `queryStringParameters`, ...). Members not modelled here are preserved in
//! `extra` so a request can be forwarded unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::jwt::ValidatedTokenClaims;

/// Request member under which validated claims are attached
pub const TOKEN_CLAIMS_KEY: &str = "mcp_token_payload";

/// Query parameter accepted as a fallback token carrier
pub const ACCESS_TOKEN_QUERY_PARAM: &str = "access_token";

/// Inbound proxy request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,

    #[serde(default)]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_value_headers: Option<HashMap<String, Vec<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_string_parameters: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default)]
    pub is_base64_encoded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<Value>,

    /// Claims of the validated bearer token; set by the middleware only
    #[serde(
        rename = "mcp_token_payload",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub token_claims: Option<ValidatedTokenClaims>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProxyRequest {
    /// Request with just a method and path
    pub fn new(http_method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: Some(http_method.into()),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set a single-value header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Set a query-string parameter
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Set the raw body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Header value by case-insensitive name
    ///
    /// Single-value `headers` win; otherwise the first entry of
    /// `multiValueHeaders` is used.
    pub fn header(&self, name: &str) -> Option<&str> {
        let single = self.headers.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        });

        single.or_else(|| {
            self.multi_value_headers.as_ref().and_then(|headers| {
                headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .and_then(|(_, values)| values.first())
                    .map(String::as_str)
            })
        })
    }

    /// Query-string parameter by exact name
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(String::as_str)
    }

    /// Bearer token from `Authorization`, falling back to `access_token`
    ///
    /// An `Authorization` header with another scheme does not stop the
    /// query-parameter fallback.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(strip_bearer)
            .filter(|token| !token.is_empty())
            .or_else(|| {
                self.query_param(ACCESS_TOKEN_QUERY_PARAM)
                    .filter(|token| !token.is_empty())
            })
    }

    /// Claims attached after successful validation
    pub fn token_claims(&self) -> Option<&ValidatedTokenClaims> {
        self.token_claims.as_ref()
    }

    /// Body parsed as JSON
    ///
    /// # Errors
    ///
    /// Returns the parse error for a non-JSON body; an absent body parses as `null`.
    pub fn json_body(&self) -> Result<Value, serde_json::Error> {
        match &self.body {
            Some(body) => serde_json::from_str(body),
            None => Ok(Value::Null),
        }
    }
}

fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}

/// Outbound proxy response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_base64_encoded: bool,
}

impl ProxyResponse {
    /// Empty response with `status_code`
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Self::default()
        }
    }

    /// JSON body with `Content-Type: application/json`
    pub fn json(status_code: u16, body: &Value) -> Self {
        Self::new(status_code)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    /// Set a response header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the response body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body parsed as JSON
    ///
    /// # Errors
    ///
    /// Returns the parse error for a non-JSON body.
    pub fn json_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
