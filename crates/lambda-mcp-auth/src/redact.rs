//! Sensitive data redaction for logs
//!
//! Nothing that might carry a credential is logged as-is. Request documents
//! go through [`safe_log_view`], free-form strings through
//! [`redact_sensitive_string`], errors through [`safe_error_message`].
//!
//! ## What is redacted
//!
//! - `Bearer <token>` → `[REDACTED]`
//! - JWT-shaped strings (`eyJ...`) → `[REDACTED]`
//! - `api_key=...`, `client_secret: ...`, `"access_token": "..."` style pairs → `[REDACTED]`
//! - values of credential-carrying headers and query parameters
//! - caller identity, except source IP and user agent

use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::OnceLock;

use crate::request::ProxyRequest;

/// Replacement for every redacted value
pub const REDACTED: &str = "[REDACTED]";

/// Appended to strings cut at the length limit
pub const TRUNCATED_SUFFIX: &str = "...[truncated]";

/// Default per-string length limit
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1000;

/// Default serialized size limit for [`safe_log_view`]
pub const DEFAULT_MAX_LOG_SIZE: usize = 5000;

/// Length limit for the message part of [`safe_error_message`]
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 200;

/// Header names (lowercase) whose values are always redacted
pub const SENSITIVE_HEADERS: [&str; 8] = [
    "authorization",
    "x-api-key",
    "x-auth-token",
    "x-access-token",
    "cookie",
    "set-cookie",
    "x-amz-security-token",
    "x-amz-session-token",
];

/// Query parameter names (lowercase) whose values are always redacted
pub const SENSITIVE_QUERY_PARAMS: [&str; 8] = [
    "access_token",
    "api_key",
    "apikey",
    "key",
    "token",
    "secret",
    "password",
    "client_secret",
];

/// Fields kept when a sanitized event is still too large
const ESSENTIAL_FIELDS: [&str; 4] = ["httpMethod", "path", "requestContext", "isBase64Encoded"];

const PATTERNS: [&str; 5] = [
    r"(?i)Bearer\s+[A-Za-z0-9\-._~+/]+=*",
    r"ey[A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]*",
    r#"(?i)["']?(?:api_key|apikey|key)["']?\s*[:=]\s*["']?[A-Za-z0-9\-_]{10,}["']?"#,
    r#"(?i)["']?(?:client_secret|secret)["']?\s*[:=]\s*["']?[A-Za-z0-9\-_]{10,}["']?"#,
    r#"(?i)["']?(?:access_token|token)["']?\s*[:=]\s*["']?[A-Za-z0-9\-_]{10,}["']?"#,
];

fn patterns() -> &'static [Regex] {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern).expect("credential pattern must compile"))
            .collect()
    })
}

/// Truncate to `max_length` characters, then redact credential patterns
pub fn redact_sensitive_string(text: &str, max_length: usize) -> String {
    let mut redacted = truncate(text, max_length);
    for pattern in patterns() {
        if pattern.is_match(&redacted) {
            redacted = pattern.replace_all(&redacted, REDACTED).into_owned();
        }
    }
    redacted
}

/// Redact every string inside `value`, at any depth
///
/// Scalar members named like a credential (`api_key`, `token`,
/// `authorization`, ...) are replaced outright.
pub fn redact(value: &Value, max_length: usize) -> Value {
    match value {
        Value::String(text) => Value::String(redact_sensitive_string(text, max_length)),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact(v, max_length)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let redacted = if is_sensitive_name(key) && is_scalar(v) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(v, max_length)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_sensitive_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_QUERY_PARAMS.contains(&name.as_str()) || SENSITIVE_HEADERS.contains(&name.as_str())
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_))
}

/// Redact values of [`SENSITIVE_HEADERS`]; works for single- and multi-value maps
pub fn sanitize_headers(headers: &Value) -> Value {
    sanitize_named_values(headers, &SENSITIVE_HEADERS)
}

/// Redact values of [`SENSITIVE_QUERY_PARAMS`]
pub fn sanitize_query_params(params: &Value) -> Value {
    sanitize_named_values(params, &SENSITIVE_QUERY_PARAMS)
}

fn sanitize_named_values(values: &Value, sensitive: &[&str]) -> Value {
    let Value::Object(map) = values else {
        return values.clone();
    };

    Value::Object(
        map.iter()
            .map(|(name, value)| {
                let value = if sensitive.contains(&name.to_ascii_lowercase().as_str()) {
                    Value::String(REDACTED.to_string())
                } else {
                    match value {
                        Value::Number(_) | Value::Bool(_) => Value::String(value.to_string()),
                        other => other.clone(),
                    }
                };
                (name.clone(), value)
            })
            .collect(),
    )
}

/// Redact a body: as JSON when it parses, otherwise as plain text
pub fn sanitize_body(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(parsed) => redact(&parsed, DEFAULT_MAX_STRING_LENGTH).to_string(),
        Err(_) => redact_sensitive_string(body, DEFAULT_MAX_STRING_LENGTH),
    }
}

/// Reduce `identity` to source IP, user agent and request id
pub fn sanitize_request_context(context: &Value) -> Value {
    let Value::Object(map) = context else {
        return context.clone();
    };

    let mut sanitized = map.clone();
    if let Some(Value::Object(identity)) = map.get("identity") {
        let allowed = |field: &str| {
            identity
                .get(field)
                .cloned()
                .unwrap_or_else(|| Value::String(REDACTED.to_string()))
        };
        sanitized.insert(
            "identity".to_string(),
            json!({
                "sourceIp": allowed("sourceIp"),
                "userAgent": allowed("userAgent"),
                "requestId": identity.get("requestId").cloned().unwrap_or(Value::Null),
            }),
        );
    }
    Value::Object(sanitized)
}

/// Field-by-field sanitized copy of a proxy request document
pub fn sanitize_request(event: &Value) -> Value {
    let Value::Object(map) = event else {
        return redact(event, DEFAULT_MAX_STRING_LENGTH);
    };

    let sanitized: Map<String, Value> = map
        .iter()
        .map(|(key, value)| {
            let value = match key.as_str() {
                "headers" | "multiValueHeaders" => sanitize_headers(value),
                "queryStringParameters" | "multiValueQueryStringParameters" => {
                    sanitize_query_params(value)
                }
                "body" => match value {
                    Value::String(body) => Value::String(sanitize_body(body)),
                    other => redact(other, DEFAULT_MAX_STRING_LENGTH),
                },
                "requestContext" => sanitize_request_context(value),
                _ => value.clone(),
            };
            (key.clone(), value)
        })
        .collect();

    Value::Object(sanitized)
}

/// Sanitized request bounded to `max_size` serialized bytes
///
/// Falls back to the essential fields, then to a four-field summary.
pub fn safe_log_view(event: &Value, max_size: usize) -> Value {
    let sanitized = sanitize_request(event);
    if serialized_len(&sanitized) <= max_size {
        return sanitized;
    }

    let essential: Map<String, Value> = match &sanitized {
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| ESSENTIAL_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => Map::new(),
    };
    let essential = Value::Object(essential);
    if serialized_len(&essential) <= max_size {
        return essential;
    }

    let field = |name: &str| {
        event
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string()
    };
    json!({
        "httpMethod": field("httpMethod"),
        "path": field("path"),
        "requestId": event
            .get("requestContext")
            .and_then(|context| context.get("requestId"))
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN"),
        "_truncated": true,
    })
}

/// [`safe_log_view`] for a typed request
pub fn safe_request_view(request: &ProxyRequest, max_size: usize) -> Value {
    match serde_json::to_value(request) {
        Ok(event) => safe_log_view(&event, max_size),
        Err(_) => json!({ "path": request.path, "_truncated": true }),
    }
}

/// Masked form of a client secret for logs
///
/// Absent → `None`; up to 8 characters → all `*`; otherwise the first and
/// last 4 characters around `*` padding.
pub fn mask_client_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return "None".to_string();
    };

    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

/// `"<type_name>: <redacted message>"`, message capped at 200 characters
pub fn safe_error_message(type_name: &str, message: &str) -> String {
    let redacted = redact_sensitive_string(message, DEFAULT_MAX_STRING_LENGTH);
    format!("{type_name}: {}", truncate(&redacted, MAX_ERROR_MESSAGE_LENGTH))
}

fn truncate(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((cut, _)) => format!("{}{TRUNCATED_SUFFIX}", &text[..cut]),
        None => text.to_string(),
    }
}

fn serialized_len(value: &Value) -> usize {
    serde_json::to_string(value).map_or(usize::MAX, |s| s.len())
}
