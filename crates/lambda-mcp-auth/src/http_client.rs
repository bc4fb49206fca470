//! Shared HTTP client for upstream authorization-server calls
//!
//! Discovery, JWKS and registration requests all go through a
//! `reqwest::Client` built here so they share one connection pool and the
//! same limits:
//!
//! - fixed 30 second timeout per request
//! - redirects are not followed (a 3xx is treated as a failed fetch)
//! - a stable `User-Agent`

use std::time::Duration;

/// Timeout applied to every upstream request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `User-Agent` sent to authorization servers
pub const DEFAULT_USER_AGENT: &str = "MCP-Server/1.0";

/// Build the upstream HTTP client
///
/// # Errors
///
/// Returns the underlying `reqwest` error if the TLS backend cannot be initialized.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}
