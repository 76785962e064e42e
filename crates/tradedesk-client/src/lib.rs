//! # tradedesk-client - Typed REST Client for the Tradedesk Business API
//!
//! This crate is the single choke point for outbound calls from a Tradedesk
//! frontend or service to its backend. Every call goes through one pipeline
//! that handles auth, tenancy, caching, validation and error shaping.
//!
//! ## Architecture Overview
//!
//! 1. **Client** ([`ApiClient`]): typed `get`/`post`/`put`/`patch`/`delete`
//!    plus cache management
//! 2. **Cache Layer** ([`cache`]): per-instance TTL cache for GET payloads and
//!    an in-flight lock set that collapses concurrent identical GETs
//! 3. **Contracts** ([`schema`]): optional input and output validation, with
//!    JSON Schema support through `jsonschema`
//! 4. **Headers** ([`headers`], [`nonce`], [`auth`]): bearer token, tenant
//!    header and the proof-of-work nonce triple
//! 5. **Errors** ([`error`], [`report`]): one [`ApiError`] type readable as a
//!    uniform `{status, statusText, data}` shape, optionally forwarded to a
//!    developer-facing reporter
//!
//! ## Caching Rules
//!
//! - Only GETs are cached, keyed by the fully rendered URL
//! - Parameters that are `null` or empty strings are dropped before the key is
//!   built, and the rest are sorted, so `{a, b}` and `{b, a}` share an entry
//! - A successful write invalidates cached reads of the same resource
//!   (`/users/5` invalidates everything under `/users`)
//! - Failed or invalid responses are never cached
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde::Deserialize;
//! use tradedesk_client::{ApiClient, ClientConfig, Contract, NO_PARAMS, SessionAuth};
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = SessionAuth::with_credentials("token", "ACME");
//!     let client = ApiClient::new(ClientConfig::from_env()?, Arc::new(auth))?;
//!
//!     let users: Vec<User> = client
//!         .get("/users", Some(&serde_json::json!({ "limit": 10 })), Contract::none())
//!         .await?;
//!     println!("Found {} users", users.len());
//!
//!     // Served from cache
//!     let first: User = client.get("/users/1", NO_PARAMS, Contract::none()).await?;
//!     println!("{} is {}", first.id, first.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use tradedesk_client::{ApiClient, ApiError, ClientConfig, Contract, NO_BODY};
//!
//! # async fn example(client: ApiClient) {
//! match client.delete::<(), _>("/users/1", NO_BODY, Contract::none()).await {
//!     Ok(()) => println!("Deleted"),
//!     Err(e) if e.is_timeout() => eprintln!("Timed out"),
//!     Err(e) => eprintln!("{}: {}", e.status(), e.status_text()),
//! }
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod headers;
pub mod hooks;
pub mod key;
pub mod nonce;
pub mod report;
pub mod schema;
pub mod transport;

pub use auth::{AdminKey, AuthProvider, NoAuth, RequestContext, SessionAuth, Tenant};
pub use cache::CacheStats;
pub use client::{ApiClient, Call, NO_BODY, NO_PARAMS};
pub use config::{ClientConfig, InvalidationMode};
pub use error::{ApiError, ApiErrorBody, ConfigError, Result, ValidationStage};
pub use hooks::{LoadingTracker, Outcome, RequestInfo, RequestObserver};
pub use report::{ErrorReport, ErrorReporter, MemoryReporter, TracingReporter};
pub use schema::{Contract, FnSchema, JsonSchema, Schema};
pub use transport::TransportConfig;
