//! # Lambda MCP Auth - OAuth 2.1 Resource-Server Authorization
//!
//! Bearer-token enforcement for MCP servers that receive API-Gateway-style
//! proxy events (serverless functions, Lambda proxies, local adapters).
//!
//! ## Key Features
//!
//! - **Protected Resource Metadata** - RFC 9728 document served from a configurable path
//! - **Authorization Server Discovery** - RFC 8414 metadata, cached per process
//! - **JWT Validation** - RS256 / ES256 / PS256 against published JWKS with a one-hour key cache
//! - **Scope Enforcement** - 403 `insufficient_scope` with `WWW-Authenticate` challenges
//! - **Dynamic Client Registration** - RFC 7591 helper with PKCE (RFC 7636) authorization URLs
//! - **Log Redaction** - request views safe to log at any level
//!
//! ## Architecture
//!
//! - [`config`] - `AuthorizationConfig` and its environment / secret-store sources
//! - [`request`] - `ProxyRequest` / `ProxyResponse` event shapes
//! - [`server`] - RFC 9728 metadata and error responses
//! - [`discovery`] - RFC 8414 discovery and registration capability
//! - [`jwt`] - JWKS cache and token validation
//! - [`middleware`] - `AuthorizationMiddleware` and the Tower layer
//! - [`registration`] - Dynamic client registration
//! - [`pkce`] - PKCE pairs and `state` values
//! - [`redact`] - Log sanitization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lambda_mcp_auth::{AuthorizationConfig, AuthorizationMiddleware, ProxyRequest, ProxyResponse};
//! use lambda_mcp_auth::handler::sync_handler_fn;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthorizationConfig::from_json(r#"{
//!     "resource_id": "location-server",
//!     "authorization_servers": ["https://auth.example.com"],
//!     "required_scopes": ["location:read"]
//! }"#)?;
//!
//! let middleware = AuthorizationMiddleware::new(
//!     config,
//!     sync_handler_fn(|req: ProxyRequest| {
//!         let sub = req.token_claims().and_then(|c| c.subject()).unwrap_or("anonymous");
//!         Ok(ProxyResponse::new(200).with_body(format!("hello {sub}")))
//!     }),
//! )?;
//!
//! let response = middleware.handle(ProxyRequest::new("GET", "/mcp")).await;
//! assert_eq!(response.status_code, 401);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tower` (default) - `AuthorizationLayer` and `tower::Service` for the middleware
//!
//! ## Standards Compliance
//!
//! - **RFC 6750** - Bearer Token Usage
//! - **RFC 7519** - JSON Web Token (JWT)
//! - **RFC 7591** - Dynamic Client Registration
//! - **RFC 7636** - Proof Key for Code Exchange (PKCE)
//! - **RFC 8414** - Authorization Server Metadata
//! - **RFC 8707** - Resource Indicators
//! - **RFC 9728** - OAuth 2.0 Protected Resource Metadata

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod http_client;
pub mod jwt;
pub mod middleware;
pub mod pkce;
pub mod redact;
pub mod registration;
pub mod request;
pub mod server;

#[doc(inline)]
pub use config::{AuthorizationConfig, ConfigError, ConfigSource};

#[doc(inline)]
pub use error::AuthError;

#[doc(inline)]
pub use handler::{Handler, HandlerError, handler_fn, sync_handler_fn};

#[doc(inline)]
pub use jwt::{TokenValidator, ValidatedTokenClaims};

#[doc(inline)]
pub use middleware::AuthorizationMiddleware;

#[cfg(feature = "tower")]
#[doc(inline)]
pub use middleware::AuthorizationLayer;

#[doc(inline)]
pub use request::{ProxyRequest, ProxyResponse};

#[doc(inline)]
pub use server::ResourceMetadataPublisher;
