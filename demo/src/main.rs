//! Location-data MCP server behind `AuthorizationMiddleware`
//!
//! Reads one API-Gateway proxy event from a file (or stdin), runs it through
//! the middleware and prints the response document on stdout. Logs are JSON
//! on stderr, filtered by `RUST_LOG` (default `info`).
//!
//! ```text
//! # Authorization off: the handler answers directly
//! lambda-mcp-auth-demo event.json
//!
//! # Built-in example configuration
//! ENABLE_MCP_AUTH=true lambda-mcp-auth-demo event.json
//!
//! # Configuration document from $MCP_AUTH_CONFIG, then secrets.json
//! lambda-mcp-auth-demo --config-key MCP_AUTH_CONFIG --secrets-file secrets.json event.json
//! ```

mod location;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use lambda_mcp_auth::config::{EnvConfigSource, LayeredConfigSource, StaticSecretStore};
use lambda_mcp_auth::redact::{DEFAULT_MAX_LOG_SIZE, safe_log_view};
use lambda_mcp_auth::{AuthorizationConfig, AuthorizationMiddleware, ProxyRequest};

use location::LocationHandler;

/// Command-line options
#[derive(Parser, Debug)]
#[command(
    name = "lambda-mcp-auth-demo",
    version,
    about = "Run one proxy event through the MCP authorization middleware"
)]
struct Cli {
    /// Proxy event JSON; read from stdin when omitted
    #[arg(value_name = "EVENT")]
    event: Option<PathBuf>,

    /// Environment variable (then secret) holding the authorization config
    #[arg(long, env = "MCP_AUTH_CONFIG_KEY")]
    config_key: Option<String>,

    /// JSON object of secret name to value, backing `--config-key`
    #[arg(long, value_name = "FILE")]
    secrets_file: Option<PathBuf>,

    /// Use the built-in example configuration
    #[arg(long, env = "ENABLE_MCP_AUTH")]
    enable_auth: bool,

    /// Authorization server for the built-in configuration (repeatable)
    #[arg(long = "authorization-server", value_name = "URL")]
    authorization_servers: Vec<String>,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

fn read_event(path: Option<&Path>) -> Result<Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event from {}", path.display()))?,
        None => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read event from stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("event is not valid JSON")
}

fn load_secrets(path: Option<&Path>) -> Result<StaticSecretStore> {
    let Some(path) = path else {
        return Ok(StaticSecretStore::new());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read secrets from {}", path.display()))?;
    let secrets: HashMap<String, String> =
        serde_json::from_str(&raw).context("secrets file must be a JSON object of strings")?;

    Ok(secrets
        .into_iter()
        .fold(StaticSecretStore::new(), |store, (name, value)| {
            store.with_secret(name, value)
        }))
}

fn example_config(cli: &Cli) -> AuthorizationConfig {
    let servers = if cli.authorization_servers.is_empty() {
        vec!["https://auth.example.com".to_string()]
    } else {
        cli.authorization_servers.clone()
    };

    AuthorizationConfig::new("location-mcp-server", servers)
        .with_required_scopes(vec!["location:read".to_string()])
}

async fn build_middleware(cli: &Cli) -> Result<AuthorizationMiddleware<LocationHandler>> {
    let handler = LocationHandler::default();

    if let Some(key) = &cli.config_key {
        let source = LayeredConfigSource::new(
            EnvConfigSource::new(),
            load_secrets(cli.secrets_file.as_deref())?,
        );
        return Ok(AuthorizationMiddleware::from_config_source(&source, key, handler).await?);
    }

    if cli.enable_auth {
        info!("Using built-in authorization configuration");
        return Ok(AuthorizationMiddleware::new(example_config(cli), handler)?);
    }

    info!("Authorization not enabled");
    Ok(AuthorizationMiddleware::passthrough(handler))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let event = read_event(cli.event.as_deref())?;
    info!(
        event = %safe_log_view(&event, DEFAULT_MAX_LOG_SIZE),
        "Received event"
    );

    let request: ProxyRequest =
        serde_json::from_value(event).context("event is not a proxy request")?;
    let middleware = build_middleware(&cli).await?;

    let response = middleware.handle(request).await;
    info!(status = response.status_code, "Request complete");

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
