//! # Authorization Server Discovery
//!
//! RFC 8414 metadata discovery for the authorization servers a resource trusts.
//!
//! ```rust,no_run
//! use lambda_mcp_auth::discovery::AuthorizationServerDirectory;
//! use lambda_mcp_auth::http_client::{build_client, DEFAULT_USER_AGENT};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = AuthorizationServerDirectory::new(build_client(DEFAULT_USER_AGENT)?);
//! let metadata = directory.discover("https://auth.example.com").await?;
//! println!("JWKS: {:?}", metadata.jwks_uri);
//! # Ok(())
//! # }
//! ```

mod directory;
mod types;

pub use directory::{AuthorizationServerDirectory, discovery_url};
pub(crate) use directory::fetch_metadata;
pub use types::{
    AuthorizationServerMetadata, DiscoveryError, RegistrationCapability, SupportedServer,
};
