//! The HTTP core: executes one logical request reliably against a pool
//! of candidate gateways.
//!
//! One `execute()` call walks two nested loops: an attempt loop that
//! retries transient failures on the current gateway under the
//! [`RetryPolicy`], and a failover loop that marks the gateway unhealthy
//! and rotates to the next healthy one once retries are exhausted. The
//! failover loop is bounded by one pass through all configured gateways;
//! after that the last error surfaces to the caller unwrapped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use mw_domain::{ApiError, Error, GatewayConfig, Result, TraceEvent};
use serde::de::DeserializeOwned;

use crate::auth::{self, CredentialStore};
use crate::pool::GatewayPool;
use crate::retry::{LinearBackoff, RetryPolicy};
use crate::types::{Method, RequestOptions};

/// A live download body. Retry/failover applied only up to first byte.
pub type ByteStream = futures_util::stream::BoxStream<'static, Result<Vec<u8>>>;

/// Executes logical requests against the gateway pool.
///
/// Created once and reused; the underlying `reqwest::Client` maintains a
/// connection pool. Cloning is cheap and clones share credentials and
/// gateway health state.
#[derive(Clone)]
pub struct RequestTransport {
    http: reqwest::Client,
    pool: GatewayPool,
    credentials: CredentialStore,
    retry: Arc<dyn RetryPolicy>,
    timeout: Duration,
    upload_timeout: Duration,
}

impl RequestTransport {
    pub fn new(cfg: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        let pool = GatewayPool::new(
            &cfg.base_urls,
            Duration::from_millis(cfg.failover_cooldown_ms),
        )?;
        let timeout = Duration::from_millis(cfg.timeout_ms);

        Ok(Self {
            http,
            pool,
            credentials: CredentialStore::new(cfg.api_key.clone(), cfg.bearer_token.clone()),
            retry: Arc::new(LinearBackoff {
                base_delay: Duration::from_millis(cfg.retry_delay_ms),
                max_retries: cfg.max_retries,
            }),
            timeout,
            upload_timeout: timeout * cfg.upload_timeout_factor,
        })
    }

    /// Substitute the retry strategy.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.credentials.set_api_key(key);
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) {
        self.credentials.set_bearer_token(token);
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// All configured gateway base addresses, in rotation order.
    pub fn base_urls(&self) -> Vec<String> {
        self.pool.addresses()
    }

    // ── logical operations ───────────────────────────────────────────

    /// Execute one logical JSON request and deserialize the response.
    ///
    /// `body` is serialized only when present. A non-2xx response becomes
    /// a typed [`ApiError`] built from the gateway's error payload.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        opts: &RequestOptions,
    ) -> Result<T> {
        let endpoint = format!("{method} {path}");
        let timeout = opts.timeout.unwrap_or(self.timeout);

        let resp = self
            .send_with_failover(&endpoint, None, |gateway| {
                let mut rb = self
                    .http
                    .request(method.clone(), format!("{gateway}{path}"))
                    .timeout(timeout);
                rb = self.decorate(rb, path, opts);
                if let Some(ref b) = body {
                    rb = rb.json(b);
                }
                rb
            })
            .await?;

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Api(ApiError::network(e.to_string())))?;
        // Some operations (DELETE, cache eviction) reply with no body.
        let body = if body.is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(Error::Json)
    }

    /// Fetch a raw byte stream (blob download).
    ///
    /// The hard timeout and the retry/failover rules apply until the
    /// response headers arrive. The returned stream itself is live and
    /// unguarded, since content size is unbounded; a builder-level
    /// timeout would cancel long downloads mid-body, so the headers
    /// phase is guarded externally instead.
    pub async fn get_binary(&self, path: &str, opts: &RequestOptions) -> Result<ByteStream> {
        let endpoint = format!("GET {path} (binary)");
        let timeout = opts.timeout.unwrap_or(self.timeout);
        let resp = self
            .send_with_failover(&endpoint, Some(timeout), |gateway| {
                let rb = self.http.get(format!("{gateway}{path}"));
                self.decorate(rb, path, opts)
            })
            .await?;

        let stream = resp
            .bytes_stream()
            .map(|chunk| match chunk {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(e) => Err(Error::Api(ApiError::network(e.to_string()))),
            })
            .boxed();
        Ok(stream)
    }

    /// Upload a multipart form (blob upload).
    ///
    /// Same retry/failover machinery as `execute`, but no JSON
    /// content-type and a larger default timeout. `make_form` is called
    /// once per attempt because a form is consumed by the send.
    pub async fn upload<T, F>(&self, path: &str, make_form: F, opts: &RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::multipart::Form,
    {
        let endpoint = format!("POST {path} (multipart)");
        let timeout = opts.timeout.unwrap_or(self.upload_timeout);

        let resp = self
            .send_with_failover(&endpoint, None, |gateway| {
                let rb = self
                    .http
                    .post(format!("{gateway}{path}"))
                    .timeout(timeout)
                    .multipart(make_form());
                self.decorate(rb, path, opts)
            })
            .await?;

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Api(ApiError::network(e.to_string())))?;
        let body = if body.is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(Error::Json)
    }

    // ── request decoration ───────────────────────────────────────────

    fn decorate(
        &self,
        mut rb: reqwest::RequestBuilder,
        path: &str,
        opts: &RequestOptions,
    ) -> reqwest::RequestBuilder {
        let creds = self.credentials.snapshot();
        for (name, value) in auth::headers_for(path, &creds) {
            rb = rb.header(name, value);
        }
        for (name, value) in &opts.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if !opts.query.is_empty() {
            rb = rb.query(&opts.query);
        }
        rb
    }

    // ── failover engine ──────────────────────────────────────────────

    /// Run the attempt loop on the current gateway; on exhaustion, mark
    /// it unhealthy and rotate. At most one pass through the pool.
    ///
    /// `headers_timeout` guards the send future itself, for requests
    /// whose builder carries no timeout (streaming downloads).
    async fn send_with_failover<F>(
        &self,
        endpoint: &str,
        headers_timeout: Option<Duration>,
        build: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let mut gateways_tried = 0;
        let pool_size = self.pool.len();

        loop {
            let gateway = self.pool.current();
            let err = match self
                .attempt_on_gateway(endpoint, &gateway, headers_timeout, &build)
                .await
            {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };
            gateways_tried += 1;

            // Terminal HTTP errors never trigger failover; only
            // retryable-HTTP and network-level failures do.
            if !err.is_retryable() || gateways_tried >= pool_size {
                return Err(err);
            }

            self.pool.mark_unhealthy(&gateway);
            if !self.pool.advance_to_next_healthy() {
                return Err(err);
            }

            let next = self.pool.current();
            tracing::warn!(
                endpoint = %endpoint,
                from = %gateway,
                to = %next,
                "gateway failover"
            );
            TraceEvent::GatewayFailover {
                from: gateway,
                to: next,
                cooldown_ms: self.pool.cooldown().as_millis() as u64,
            }
            .emit();
        }
    }

    /// Retry loop against one gateway. The attempt counter starts at
    /// zero here, so it resets whenever the failover loop rotates.
    async fn attempt_on_gateway<F>(
        &self,
        endpoint: &str,
        gateway: &str,
        headers_timeout: Option<Duration>,
        build: &F,
    ) -> Result<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt - 1);
                tracing::debug!(
                    endpoint = %endpoint,
                    gateway = %gateway,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            let result = match headers_timeout {
                Some(limit) => match tokio::time::timeout(limit, build(gateway).send()).await {
                    Ok(outcome) => outcome.map_err(from_reqwest),
                    Err(_) => Err(ApiError::timeout(format!(
                        "no response headers within {}ms",
                        limit.as_millis()
                    ))
                    .into()),
                },
                None => build(gateway).send().await.map_err(from_reqwest),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let err = match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    TraceEvent::GatewayCall {
                        endpoint: endpoint.to_owned(),
                        gateway: gateway.to_owned(),
                        status,
                        attempt,
                        duration_ms,
                    }
                    .emit();

                    if resp.status().is_success() {
                        return Ok(resp);
                    }
                    error_from_response(resp).await
                }
                Err(err) => {
                    TraceEvent::GatewayCall {
                        endpoint: endpoint.to_owned(),
                        gateway: gateway.to_owned(),
                        status: 0,
                        attempt,
                        duration_ms,
                    }
                    .emit();
                    err
                }
            };

            if !self.retry.should_retry(&err, attempt) {
                return Err(err);
            }
            attempt += 1;
        }
    }
}

/// Build a typed error from a non-2xx response.
///
/// The gateway's error payload is `{ error?, code?, ... }`; absent fields
/// fall back to the status line, and the whole payload rides along as the
/// details bag.
async fn error_from_response(resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let reason = resp
        .status()
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_owned();
    let body = resp.text().await.unwrap_or_default();

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(payload) => {
            let code = payload
                .get("code")
                .and_then(|c| c.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| format!("HTTP_{status}"));
            let message = payload
                .get("error")
                .and_then(|m| m.as_str())
                .map(str::to_owned)
                .unwrap_or(reason);
            ApiError::http(status, code, message)
                .with_details(payload)
                .into()
        }
        Err(_) => ApiError::http(status, format!("HTTP_{status}"), reason).into(),
    }
}

/// Convert a `reqwest::Error` into a domain error.
///
/// Timeouts keep their own code so the retry policy and callers can tell
/// them apart from connect-level failures; both report status 0.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        ApiError::timeout(e.to_string()).into()
    } else {
        ApiError::network(e.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(urls: &[&str]) -> RequestTransport {
        let cfg = GatewayConfig {
            base_urls: urls.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        RequestTransport::new(&cfg).unwrap()
    }

    #[test]
    fn base_urls_reported_in_order() {
        let t = transport(&["http://g1", "http://g2/"]);
        assert_eq!(t.base_urls(), vec!["http://g1", "http://g2"]);
    }

    #[test]
    fn credential_setters_coexist() {
        let t = transport(&["http://g1"]);
        t.set_api_key("mk_1");
        t.set_bearer_token("tok");
        let snap = t.credentials().snapshot();
        assert_eq!(snap.api_key.as_deref(), Some("mk_1"));
        assert_eq!(snap.bearer_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn network_error_has_status_zero() {
        // Port 9 on localhost is discard; nothing listens in CI either way.
        let cfg = GatewayConfig {
            base_urls: vec!["http://127.0.0.1:9".into()],
            max_retries: 0,
            retry_delay_ms: 1,
            ..Default::default()
        };
        let t = RequestTransport::new(&cfg).unwrap();
        let err = t
            .execute::<serde_json::Value>(
                Method::GET,
                "/v1/rqlite/schema",
                None,
                &RequestOptions::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), 0);
        assert_eq!(err.code(), mw_domain::error::CODE_NETWORK_ERROR);
    }
}
