//! End-to-end request handling through `AuthorizationMiddleware`
//!
//! Each test drives a proxy event through the middleware against a mock
//! authorization server and checks the exact response the client sees.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::{ServiceBuilder, ServiceExt};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use lambda_mcp_auth::config::{EnvConfigSource, LayeredConfigSource, StaticSecretStore};
use lambda_mcp_auth::handler::{HandlerError, handler_fn, sync_handler_fn};
use lambda_mcp_auth::{
    AuthorizationConfig, AuthorizationLayer, AuthorizationMiddleware, Handler, ProxyRequest,
    ProxyResponse,
};

fn location_handler() -> impl Handler {
    sync_handler_fn(|req: ProxyRequest| {
        let subject = req
            .token_claims()
            .and_then(|claims| claims.subject())
            .unwrap_or("anonymous")
            .to_string();
        Ok(ProxyResponse::json(
            200,
            &json!({"subject": subject, "locations": ["Seattle", "Portland"]}),
        ))
    })
}

fn middleware_for(config: AuthorizationConfig) -> AuthorizationMiddleware<impl Handler> {
    let (directory, key_sets) = caches();
    AuthorizationMiddleware::with_caches(config, location_handler(), directory, key_sets)
}

fn scoped_config(auth: &MockAuthServer) -> AuthorizationConfig {
    AuthorizationConfig::new("location-server", vec![auth.url()])
        .with_required_scopes(vec!["location:read".into()])
}

fn mcp_request(token: &str) -> ProxyRequest {
    ProxyRequest::new("POST", "/mcp")
        .with_header("Authorization", bearer(token))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
}

#[tokio::test]
async fn test_metadata_document() {
    let auth = MockAuthServer::start().await;
    let middleware = middleware_for(
        scoped_config(&auth)
            .with_resource_documentation(Some("https://docs.example.com/location".into()))
            .with_resource_policy_uri("https://example.com/policy"),
    );

    let response = middleware
        .handle(ProxyRequest::new("GET", "/.well-known/oauth-protected-resource"))
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(
        response.json_body().unwrap(),
        json!({
            "resource": "location-server",
            "authorization_servers": [auth.url()],
            "scopes_supported": ["location:read"],
            "bearer_methods_supported": ["header", "query"],
            "resource_documentation": "https://docs.example.com/location",
            "resource_policy_uri": "https://example.com/policy"
        })
    );
}

#[tokio::test]
async fn test_metadata_served_at_absolute_url_path() {
    let auth = MockAuthServer::start().await;
    let middleware = middleware_for(
        AuthorizationConfig::new("location-server", vec![auth.url()])
            .with_resource_metadata_url("https://api.example.com/meta/resource"),
    );

    let response = middleware.handle(ProxyRequest::new("GET", "/meta/resource")).await;
    assert_eq!(response.status_code, 200);
    assert!(response.json_body().unwrap().get("scopes_supported").is_none());
}

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let auth = MockAuthServer::start_default().await;
    let middleware = middleware_for(scoped_config(&auth));

    let token = sign_primary(&claims(&auth.url(), "location:read", 3600));
    let response = middleware.handle(mcp_request(&token)).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.json_body().unwrap(),
        json!({"subject": "user-123", "locations": ["Seattle", "Portland"]})
    );
}

#[tokio::test]
async fn test_claims_attached_to_request_document() {
    let auth = MockAuthServer::start_default().await;
    let (directory, key_sets) = caches();
    let middleware = AuthorizationMiddleware::with_caches(
        scoped_config(&auth),
        sync_handler_fn(|req: ProxyRequest| {
            let document = serde_json::to_string(&req)?;
            Ok(ProxyResponse::new(200).with_body(document))
        }),
        directory,
        key_sets,
    );

    let token = sign_primary(&claims(&auth.url(), "location:read", 3600));
    let response = middleware.handle(mcp_request(&token)).await;

    let document: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(document["mcp_token_payload"]["sub"], "user-123");
    assert_eq!(document["mcp_token_payload"]["iss"], auth.url());
}

#[tokio::test]
async fn test_token_in_query_parameter() {
    let auth = MockAuthServer::start_default().await;
    let middleware = middleware_for(scoped_config(&auth));

    let token = sign_primary(&claims(&auth.url(), "location:read", 3600));
    let response = middleware
        .handle(ProxyRequest::new("GET", "/mcp").with_query_param("access_token", token))
        .await;

    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_missing_token_challenge() {
    let auth = MockAuthServer::start().await;
    let middleware = middleware_for(scoped_config(&auth));

    let response = middleware.handle(ProxyRequest::new("POST", "/mcp")).await;

    assert_eq!(response.status_code, 401);
    assert_eq!(
        response.json_body().unwrap(),
        json!({"error": "invalid_request", "error_description": "Access token is required"})
    );
    assert_eq!(
        response.header("WWW-Authenticate"),
        Some(
            "Bearer realm=\"location-server\", as_uri=\"/.well-known/oauth-protected-resource\", \
             error=\"invalid_request\", error_description=\"Access token is required\", \
             scope=\"location:read\""
        )
    );
}

#[tokio::test]
async fn test_expired_token_challenge() {
    let auth = MockAuthServer::start_default().await;
    let middleware = middleware_for(scoped_config(&auth));

    let token = sign_primary(&claims(&auth.url(), "location:read", -60));
    let response = middleware.handle(mcp_request(&token)).await;

    assert_eq!(response.status_code, 401);
    assert_eq!(
        response.json_body().unwrap(),
        json!({"error": "invalid_token", "error_description": "Token has expired"})
    );
    let challenge = response.header("WWW-Authenticate").unwrap();
    assert!(challenge.starts_with("Bearer realm=\"location-server\""));
    assert!(challenge.contains("error=\"invalid_token\""));
    assert!(challenge.contains("error_description=\"Token has expired\""));
}

#[tokio::test]
async fn test_untrusted_issuer_rejected() {
    let auth = MockAuthServer::start_default().await;
    let middleware = middleware_for(scoped_config(&auth));

    let token = sign_primary(&claims("https://evil.example.com", "location:read", 3600));
    let response = middleware.handle(mcp_request(&token)).await;

    assert_eq!(response.status_code, 401);
    assert_eq!(
        response.json_body().unwrap(),
        json!({
            "error": "invalid_token",
            "error_description": "Token issuer not in authorized servers"
        })
    );
}

#[tokio::test]
async fn test_insufficient_scope() {
    let auth = MockAuthServer::start_default().await;
    let middleware = middleware_for(scoped_config(&auth));

    let token = sign_primary(&claims(&auth.url(), "profile", 3600));
    let response = middleware.handle(mcp_request(&token)).await;

    assert_eq!(response.status_code, 403);
    assert_eq!(
        response.json_body().unwrap(),
        json!({
            "error": "insufficient_scope",
            "error_description": "Insufficient scope for this resource"
        })
    );
    assert!(response.header("WWW-Authenticate").is_none());
}

#[tokio::test]
async fn test_handler_error_hidden() {
    let auth = MockAuthServer::start_default().await;
    let (directory, key_sets) = caches();
    let middleware = AuthorizationMiddleware::with_caches(
        scoped_config(&auth),
        handler_fn(|_req: ProxyRequest| async {
            Err::<ProxyResponse, HandlerError>("connection to db:5432 refused, token=abc".into())
        }),
        directory,
        key_sets,
    );

    let token = sign_primary(&claims(&auth.url(), "location:read", 3600));
    let response = middleware.handle(mcp_request(&token)).await;

    assert_eq!(response.status_code, 500);
    assert_eq!(
        response.json_body().unwrap(),
        json!({"error": "server_error", "error_description": "Internal server error"})
    );
}

#[tokio::test]
async fn test_disabled_authorization_skips_everything() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let middleware = AuthorizationMiddleware::new(
        AuthorizationConfig::new("location-server", vec!["http://127.0.0.1:1".into()])
            .with_enable_authorization(false),
        sync_handler_fn(move |req: ProxyRequest| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(ProxyResponse::new(200).with_body(req.path))
        }),
    )
    .unwrap();

    let metadata = middleware
        .handle(ProxyRequest::new("GET", "/.well-known/oauth-protected-resource"))
        .await;
    assert_eq!(metadata.status_code, 200);
    assert_eq!(metadata.body, "/.well-known/oauth-protected-resource");

    let garbage = middleware
        .handle(ProxyRequest::new("POST", "/mcp").with_header("Authorization", "Bearer junk"))
        .await;
    assert_eq!(garbage.status_code, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_registration_info() {
    let capable = MockAuthServer::start().await;
    capable
        .mount_discovery(capable.metadata_with_registration())
        .await;

    let incapable = MockAuthServer::start().await;
    incapable.mount_discovery(incapable.metadata()).await;

    let missing = MockAuthServer::start().await;
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&missing.server)
        .await;

    let middleware = middleware_for(AuthorizationConfig::new(
        "location-server",
        vec![capable.url(), incapable.url(), missing.url()],
    ));

    let response = middleware
        .handle(ProxyRequest::new("GET", "/.well-known/client-registration-info"))
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.json_body().unwrap(),
        json!({
            "supported_servers": [{
                "server": capable.url(),
                "registration_endpoint": capable.registration_endpoint(),
                "supported_scopes": ["location:read", "location:write"],
                "supported_response_types": ["code"],
                "supported_grant_types": ["authorization_code", "refresh_token"]
            }],
            "unsupported_servers": [incapable.url(), missing.url()]
        })
    );
}

#[tokio::test]
async fn test_from_config_source_env_first() {
    let auth = MockAuthServer::start_default().await;
    let document = json!({
        "resource_id": "location-server",
        "authorization_servers": [auth.url()],
        "required_scopes": ["location:read"]
    })
    .to_string();

    let source = LayeredConfigSource::new(
        EnvConfigSource::from_vars(HashMap::from([(
            "MCP_AUTH_CONFIG".to_string(),
            document,
        )])),
        StaticSecretStore::new().with_secret("MCP_AUTH_CONFIG", "not json"),
    );

    let middleware =
        AuthorizationMiddleware::from_config_source(&source, "MCP_AUTH_CONFIG", location_handler())
            .await
            .unwrap();
    assert!(middleware.is_enforcing());

    let token = sign_primary(&claims(&auth.url(), "location:read", 3600));
    assert_eq!(middleware.handle(mcp_request(&token)).await.status_code, 200);
    assert_eq!(
        middleware.handle(ProxyRequest::new("POST", "/mcp")).await.status_code,
        401
    );
}

#[tokio::test]
async fn test_from_config_source_falls_back_to_passthrough() {
    let empty = LayeredConfigSource::new(
        EnvConfigSource::from_vars(HashMap::new()),
        StaticSecretStore::new(),
    );
    let middleware = AuthorizationMiddleware::from_config_source(&empty, "MISSING", location_handler())
        .await
        .unwrap();
    assert!(!middleware.is_enforcing());
    assert_eq!(middleware.handle(ProxyRequest::new("GET", "/mcp")).await.status_code, 200);

    let broken = LayeredConfigSource::new(
        EnvConfigSource::from_vars(HashMap::new()),
        StaticSecretStore::new().with_secret("MCP_AUTH_CONFIG", "{not json"),
    );
    let middleware =
        AuthorizationMiddleware::from_config_source(&broken, "MCP_AUTH_CONFIG", location_handler())
            .await
            .unwrap();
    assert!(!middleware.is_enforcing());
}

#[tokio::test]
async fn test_tower_layer_with_valid_token() {
    let auth = MockAuthServer::start_default().await;
    let (directory, key_sets) = caches();

    let service = ServiceBuilder::new()
        .layer(AuthorizationLayer::with_caches(scoped_config(&auth), directory, key_sets))
        .service(tower::service_fn(|req: ProxyRequest| async move {
            let subject = req
                .token_claims()
                .and_then(|claims| claims.subject())
                .map(str::to_string);
            Ok::<_, Infallible>(ProxyResponse::new(200).with_body(subject.unwrap_or_default()))
        }));

    let token = sign_primary(&claims(&auth.url(), "location:read", 3600));
    let response = service.oneshot(mcp_request(&token)).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "user-123");
}
