//! Typed API client
//!
//! [`ApiClient`] is the single choke point for outbound calls to one backend.
//! A GET goes through the cache and the in-flight lock set; a write
//! invalidates cached reads of the same resource after a 2xx response. Every
//! call gets auth, tenant and nonce headers and is bounded by the configured
//! timeout.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{AdminKey, AuthProvider, NoAuth, RequestContext};
use crate::cache::{CacheEntry, CacheStats, InFlight, InFlightGuard, ResponseCache, now_ms};
use crate::config::ClientConfig;
use crate::envelope::{error_body, unwrap_envelope};
use crate::error::{ApiError, ConfigError, Result, ValidationStage};
use crate::headers::{X_CACHE_CONTROL, build_headers};
use crate::hooks::{Hooks, Outcome, RequestInfo, RequestObserver};
use crate::key::{QueryParams, build_url, normalize_endpoint, resource_path, strip_params};
use crate::nonce::NonceHeaders;
use crate::report::{ErrorReport, ErrorReporter, TracingReporter, report_safely};
use crate::schema::{Contract, Schema};

/// `None` for calls without query parameters
pub const NO_PARAMS: Option<&'static Value> = None;

/// `None` for writes without a body
pub const NO_BODY: Option<&'static Value> = None;

/// One request, described as data
#[derive(Debug, Clone)]
pub struct Call<'a> {
    pub method: Method,
    pub endpoint: &'a str,
    /// Query parameters as a JSON object, before stripping
    pub params: Option<Value>,
    /// JSON body for writes
    pub body: Option<Value>,
    /// Extra headers applied after the computed ones
    pub headers: HeaderMap,
    pub contract: Contract<'a>,
}

impl<'a> Call<'a> {
    pub fn new(method: Method, endpoint: &'a str) -> Self {
        Self {
            method,
            endpoint,
            params: None,
            body: None,
            headers: HeaderMap::new(),
            contract: Contract::none(),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_contract(mut self, contract: Contract<'a>) -> Self {
        self.contract = contract;
        self
    }
}

/// Typed HTTP client for one backend
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    http: Client,
    cache: Arc<ResponseCache>,
    in_flight: InFlight,
    auth: Arc<dyn AuthProvider>,
    admin_key: Option<AdminKey>,
    reporter: Arc<dyn ErrorReporter>,
    hooks: Hooks,
}

impl ApiClient {
    /// Create a client for `config.base_url`, reading credentials from `auth`
    pub fn new(config: ClientConfig, auth: Arc<dyn AuthProvider>) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let http = config.transport.build_client()?;

        debug!(
            "Initialized API client for {} (cache: {}, ttl: {:?})",
            config.base_url, config.cache_enabled, config.cache_ttl
        );

        Ok(Self {
            config: Arc::new(config),
            http,
            cache: Arc::new(ResponseCache::new()),
            in_flight: InFlight::new(),
            auth,
            admin_key: None,
            reporter: Arc::new(TracingReporter),
            hooks: Hooks::new(),
        })
    }

    /// Create a client without credentials
    pub fn anonymous(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        Self::new(config, Arc::new(NoAuth))
    }

    /// Create an admin client: while `admin_key` holds a key, requests carry
    /// `X-ADMIN-KEY` instead of `X-CLIENT-CODE`
    pub fn admin(
        config: ClientConfig,
        auth: Arc<dyn AuthProvider>,
        admin_key: AdminKey,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(config, auth)?.with_admin_key(admin_key))
    }

    /// Use a custom reqwest client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_admin_key(mut self, admin_key: AdminKey) -> Self {
        self.admin_key = Some(admin_key);
        self
    }

    /// Replace the error reporter (defaults to [`TracingReporter`])
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Notify `observer` before and after every call
    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.hooks.push(observer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn admin_key(&self) -> Option<&AdminKey> {
        self.admin_key.as_ref()
    }

    /// Resolve the live request context from the auth provider and admin key
    pub fn context(&self) -> RequestContext {
        RequestContext::resolve(self.auth.as_ref(), self.admin_key.as_ref())
    }

    /// GET `endpoint`, serving from cache when possible
    pub async fn get<T, P>(&self, endpoint: &str, params: Option<&P>, contract: Contract<'_>) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let mut call = Call::new(Method::GET, endpoint).with_contract(contract);
        call.params = self.serialize_input(params, "params")?;
        self.execute(&self.context(), call).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, data: Option<&B>, contract: Contract<'_>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.write(Method::POST, endpoint, data, contract).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, data: Option<&B>, contract: Contract<'_>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.write(Method::PUT, endpoint, data, contract).await
    }

    pub async fn patch<T, B>(&self, endpoint: &str, data: Option<&B>, contract: Contract<'_>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.write(Method::PATCH, endpoint, data, contract).await
    }

    pub async fn delete<T, B>(&self, endpoint: &str, data: Option<&B>, contract: Contract<'_>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.write(Method::DELETE, endpoint, data, contract).await
    }

    async fn write<T, B>(&self, method: Method, endpoint: &str, data: Option<&B>, contract: Contract<'_>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut call = Call::new(method, endpoint).with_contract(contract);
        call.body = self.serialize_input(data, "body")?;
        self.execute(&self.context(), call).await
    }

    fn serialize_input<P: Serialize + ?Sized>(&self, input: Option<&P>, what: &str) -> Result<Option<Value>> {
        input
            .map(|value| {
                serde_json::to_value(value).map_err(|e| {
                    ApiError::validation(
                        ValidationStage::Request,
                        Value::Null,
                        format!("{what} could not be serialized: {e}"),
                    )
                })
            })
            .transpose()
    }

    /// Run `call` with an explicit context instead of the provider's
    pub async fn execute<T: DeserializeOwned>(&self, ctx: &RequestContext, call: Call<'_>) -> Result<T> {
        let info = RequestInfo {
            method: call.method.clone(),
            endpoint: call.endpoint.to_string(),
        };
        let method = call.method.clone();
        let endpoint = call.endpoint;

        let result = self
            .hooks
            .around(info, classify::<T>, async {
                if call.method == Method::GET {
                    self.run_get(ctx, call).await
                } else {
                    self.run_write(ctx, call).await
                }
            })
            .await;

        if let Err(e) = &result {
            self.report(e, &method, endpoint);
        }
        result
    }

    async fn run_get<T: DeserializeOwned>(&self, ctx: &RequestContext, call: Call<'_>) -> Result<T> {
        let query = prepare_params(call.params.as_ref(), call.contract.input)?;
        let url = build_url(&self.config.base_url, call.endpoint, &query)?;

        if !self.config.cache_enabled {
            let value = self.fetch(ctx, &call, url).await?;
            return accept(value, call.contract.output);
        }

        let key = url.to_string();
        let _guard = match self.wait_for_turn(&key).await {
            Turn::Cached(hit) => return decode(hit),
            Turn::Fetch(guard) => guard,
        };

        let value = self.fetch(ctx, &call, url).await?;
        let typed = accept(value.clone(), call.contract.output)?;
        self.cache.insert(
            key.as_str(),
            CacheEntry::new(value, self.config.cache_ttl, normalize_endpoint(call.endpoint)),
        );
        trace!("Cached {} for {:?}", key, self.config.cache_ttl);
        Ok(typed)
    }

    /// Wait until `key` is either cached or free to fetch
    async fn wait_for_turn(&self, key: &str) -> Turn {
        if let Some(hit) = self.cache.get(key) {
            debug!("Cache hit for {}", key);
            return Turn::Cached(hit);
        }

        let mut waits = 0;
        loop {
            if let Some(guard) = self.in_flight.try_acquire(key) {
                // The previous holder may have stored the entry just before releasing
                if let Some(hit) = self.cache.peek(key) {
                    return Turn::Cached(hit);
                }
                trace!("Cache miss for {}, fetching", key);
                return Turn::Fetch(Some(guard));
            }

            if waits >= self.config.max_lock_waits {
                warn!(
                    "Gave up waiting on in-flight request for {} after {} polls",
                    key, waits
                );
                return Turn::Fetch(None);
            }

            waits += 1;
            trace!("Request for {} in flight, waiting (poll {})", key, waits);
            sleep(self.config.lock_poll_interval).await;

            if let Some(hit) = self.cache.peek(key) {
                debug!("Cache filled for {} while waiting", key);
                return Turn::Cached(hit);
            }
        }
    }

    async fn run_write<T: DeserializeOwned>(&self, ctx: &RequestContext, mut call: Call<'_>) -> Result<T> {
        if let Some(schema) = call.contract.input {
            check(schema, call.body.as_ref().unwrap_or(&Value::Null), ValidationStage::Request)?;
        }

        let query = prepare_params(call.params.as_ref(), None)?;
        let url = build_url(&self.config.base_url, call.endpoint, &query)?;

        if call.method == Method::DELETE {
            call.headers
                .insert(X_CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }

        let value = self.fetch(ctx, &call, url).await?;

        if self.config.cache_enabled {
            let resource = resource_path(call.endpoint);
            let removed = self.cache.invalidate(&resource, self.config.invalidation);
            debug!(
                "{} {} invalidated {} cached entries for {}",
                call.method, call.endpoint, removed, resource
            );
        }

        accept(value, call.contract.output)
    }

    /// Perform one network exchange and unwrap the envelope
    async fn fetch(&self, ctx: &RequestContext, call: &Call<'_>, url: Url) -> Result<Value> {
        let nonce = NonceHeaders::generate(now_ms(), self.config.nonce_max_attempts);
        let body = call
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::unknown(e.to_string()))?;
        let headers = build_headers(&call.method, ctx, body.is_some(), &nonce, &call.headers);

        debug!("{} {}", call.method, url);

        let mut request = self.http.request(call.method.clone(), url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let content_length = response.content_length();
            let bytes = response.bytes().await?;
            Ok::<_, ApiError>((status, content_length, bytes))
        };

        let (status, content_length, bytes) = tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| ApiError::Timeout)??;

        trace!("Response status: {} ({} bytes)", status, bytes.len());

        if !status.is_success() {
            return Err(ApiError::http(status, error_body(&bytes)));
        }

        Ok(unwrap_envelope(status, content_length, &bytes)?.unwrap_or(Value::Null))
    }

    fn report(&self, error: &ApiError, method: &Method, endpoint: &str) {
        if !self.config.report_errors {
            return;
        }
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            normalize_endpoint(endpoint)
        );
        let report = ErrorReport::from_error(error, method.as_str(), endpoint, &url);
        report_safely(self.reporter.as_ref(), &report);
    }

    /// Cache key a GET to `endpoint` with `params` would use
    pub fn cache_key<P: Serialize + ?Sized>(&self, endpoint: &str, params: Option<&P>) -> Result<String> {
        let params = self.serialize_input(params, "params")?;
        let query = prepare_params(params.as_ref(), None)?;
        Ok(build_url(&self.config.base_url, endpoint, &query)?.to_string())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop expired entries, returning how many were removed
    pub fn clear_expired_cache(&self) -> usize {
        self.cache.clear_expired()
    }

    pub fn clear_cache_entry(&self, key: &str) -> bool {
        self.cache.remove(key)
    }

    pub fn has_cached_data(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    /// Remaining lifetime of the cached entry for `key`
    pub fn cache_ttl(&self, key: &str) -> Option<Duration> {
        self.cache.ttl_remaining(key)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of GETs currently on the wire
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("cache_entries", &self.cache.len())
            .field("admin", &self.admin_key.is_some())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

enum Turn {
    Cached(Value),
    /// Fetch from the network, holding the in-flight slot unless waiting timed out
    Fetch(Option<InFlightGuard>),
}

fn classify<T>(result: &Result<T>) -> Outcome {
    match result {
        Ok(_) => Outcome::Success,
        Err(e) => Outcome::Failure(e.status()),
    }
}

fn check(schema: &dyn Schema, value: &Value, stage: ValidationStage) -> Result<()> {
    schema
        .validate(value)
        .map_err(|error| ApiError::validation(stage, value.clone(), error))
}

/// Validate raw params against `schema`, then strip them into query pairs
fn prepare_params(params: Option<&Value>, schema: Option<&dyn Schema>) -> Result<QueryParams> {
    if let Some(schema) = schema {
        check(schema, params.unwrap_or(&Value::Null), ValidationStage::Request)?;
    }

    match params {
        None | Some(Value::Null) => Ok(QueryParams::new()),
        Some(Value::Object(map)) => Ok(strip_params(map)),
        Some(other) => Err(ApiError::validation(
            ValidationStage::Request,
            other.clone(),
            "query parameters must be a JSON object",
        )),
    }
}

/// Check the response payload against the output contract and the result type
fn accept<T: DeserializeOwned>(value: Value, schema: Option<&dyn Schema>) -> Result<T> {
    if let Some(schema) = schema {
        check(schema, &value, ValidationStage::Response)?;
    }
    decode(value)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(&value).map_err(|e| ApiError::validation(ValidationStage::Response, value.clone(), e.to_string()))
}
