//! Tradedesk API command-line client.
//!
//! A thin wrapper around the tradedesk-client library for poking a live
//! backend: it sends one request through the full client pipeline and prints
//! the unwrapped JSON payload. Classified errors are printed in the uniform
//! `{status, statusText, data}` shape and the process exits non-zero.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tradedesk_client::cache::now_ms;
use tradedesk_client::nonce::{NonceHeaders, verify_nonce};
use tradedesk_client::{AdminKey, ApiClient, ClientConfig, Contract, SessionAuth};

#[derive(Parser)]
#[command(
    name = "tradedesk",
    about = "Command-line client for the Tradedesk business API",
    version
)]
struct Cli {
    /// API base URL (overrides TRADEDESK_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer access token
    #[arg(long, env = "TRADEDESK_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Tenant client code
    #[arg(long, env = "TRADEDESK_CLIENT_CODE", global = true)]
    client_code: Option<String>,

    /// Admin key; replaces the client code header when set
    #[arg(long, env = "TRADEDESK_ADMIN_KEY", global = true, hide_env_values = true)]
    admin_key: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a GET request
    Get {
        endpoint: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Send a POST request
    Post {
        endpoint: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Send a PUT request
    Put {
        endpoint: String,
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Send a PATCH request
    Patch {
        endpoint: String,
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Send a DELETE request
    Delete {
        endpoint: String,
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Generate and verify a nonce header triple for the current time
    Nonce,
}

/// Parse `key=value`, keeping the value as JSON when it parses as such
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_body(data: Option<&str>) -> Result<Option<Value>> {
    data.map(|raw| serde_json::from_str(raw).context("--data is not valid JSON"))
        .transpose()
}

fn build_client(cli: &Cli) -> Result<ApiClient> {
    let mut config = ClientConfig::from_env().context("Invalid TRADEDESK_* configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }
    // One-shot process: nothing to share a cache with
    config.cache_enabled = false;

    let auth = SessionAuth::new();
    if let Some(token) = &cli.token {
        auth.set_access_token(token.as_str());
    }
    if let Some(code) = &cli.client_code {
        auth.set_client_code(code.as_str());
    }

    let mut client = ApiClient::new(config, Arc::new(auth))?;
    if let Some(key) = &cli.admin_key {
        let admin = AdminKey::new();
        admin.set(key.as_str());
        client = client.with_admin_key(admin);
    }
    Ok(client)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Nonce) {
        let headers = NonceHeaders::generate(now_ms(), ClientConfig::from_env()?.nonce_max_attempts);
        let verified = headers
            .nonce
            .as_deref()
            .is_some_and(|nonce| verify_nonce(headers.timestamp, &headers.request_key, nonce));
        print_json(&json!({
            "requestKey": headers.request_key,
            "timestamp": headers.timestamp,
            "nonce": headers.nonce,
            "verified": verified,
        }))?;
        return Ok(ExitCode::SUCCESS);
    }

    let client = build_client(&cli)?;
    tracing::debug!("Using base URL {}", client.config().base_url);

    let none = Contract::none();
    let result = match &cli.command {
        Commands::Get { endpoint, params } => {
            let params: Map<String, Value> = params.iter().cloned().collect();
            client.get::<Value, _>(endpoint, Some(&params), none).await
        }
        Commands::Post { endpoint, data } => {
            let body = parse_body(data.as_deref())?;
            client.post::<Value, _>(endpoint, body.as_ref(), none).await
        }
        Commands::Put { endpoint, data } => {
            let body = parse_body(data.as_deref())?;
            client.put::<Value, _>(endpoint, body.as_ref(), none).await
        }
        Commands::Patch { endpoint, data } => {
            let body = parse_body(data.as_deref())?;
            client.patch::<Value, _>(endpoint, body.as_ref(), none).await
        }
        Commands::Delete { endpoint, data } => {
            let body = parse_body(data.as_deref())?;
            client.delete::<Value, _>(endpoint, body.as_ref(), none).await
        }
        Commands::Nonce => return Ok(ExitCode::SUCCESS),
    };

    match result {
        Ok(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", serde_json::to_string_pretty(&e.body())?);
            Ok(ExitCode::FAILURE)
        }
    }
}
