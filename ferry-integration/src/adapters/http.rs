//! Pooled HTTP transport shared by the HTTP-based operator adapters.
//!
//! Each adapter owns one `OperatorTransport`, and with it one connection pool.
//! The pool is dropped by [`OperatorTransport::close`], which the registry
//! calls on shutdown and whenever an operator is removed.

use std::time::Duration;

use ferry_core::{AdapterError, AdapterResult};
use ferry_shared::Masked;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

/// Upper bound for a liveness probe, whatever the operator timeout is.
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_ERROR_BODY_LEN: usize = 256;

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Search timeout for operators that do not configure their own.
    pub default_timeout: Duration,
    pub booking_timeout: Duration,
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            booking_timeout: Duration::from_secs(60),
            probe_timeout: MAX_PROBE_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 20,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: "ferry-search/0.1".to_string(),
        }
    }
}

/// How an operator expects to be authenticated.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    None,
    Bearer(Masked<String>),
    ApiKey { header: HeaderName, key: Masked<String> },
}

impl AuthScheme {
    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            AuthScheme::None => builder,
            AuthScheme::Bearer(token) => builder.bearer_auth(token.expose()),
            AuthScheme::ApiKey { header, key } => builder.header(header.clone(), key.expose().as_str()),
        }
    }
}

pub struct OperatorTransport {
    operator_code: String,
    base_url: Url,
    auth: AuthScheme,
    timeout: Duration,
    probe_timeout: Duration,
    client: RwLock<Option<Client>>,
}

impl OperatorTransport {
    pub fn new(
        operator_code: &str,
        base_url: &str,
        auth: AuthScheme,
        timeout: Duration,
        settings: &TransportSettings,
    ) -> AdapterResult<Self> {
        let base_url = parse_base_url(operator_code, base_url)?;
        let client = build_client(operator_code, timeout, settings)?;

        Ok(Self {
            operator_code: operator_code.to_string(),
            base_url,
            auth,
            timeout,
            probe_timeout: settings.probe_timeout.min(MAX_PROBE_TIMEOUT),
            client: RwLock::new(Some(client)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn is_closed(&self) -> bool {
        self.client.read().await.is_none()
    }

    /// Drop the connection pool. Idempotent.
    pub async fn close(&self) {
        if self.client.write().await.take().is_some() {
            debug!(operator = %self.operator_code, "Released operator connection pool");
        }
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B, timeout: Duration) -> AdapterResult<Value> {
        let client = self.client().await?;
        let builder = client.post(self.url(path)).json(body).timeout(timeout);
        self.send(builder, timeout).await
    }

    pub async fn get_json(&self, path: &str, timeout: Duration) -> AdapterResult<Value> {
        let client = self.client().await?;
        let builder = client.get(self.url(path)).timeout(timeout);
        self.send(builder, timeout).await
    }

    pub async fn delete_json(&self, path: &str, timeout: Duration) -> AdapterResult<Value> {
        let client = self.client().await?;
        let builder = client.delete(self.url(path)).timeout(timeout);
        self.send(builder, timeout).await
    }

    /// GET the given path and report whether it answered with a 2xx status.
    pub async fn probe(&self, path: &str) -> AdapterResult<bool> {
        let client = self.client().await?;
        let builder = self.auth.apply(client.get(self.url(path)).timeout(self.probe_timeout));
        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.probe_timeout))?;

        Ok(response.status().is_success())
    }

    async fn client(&self) -> AdapterResult<Client> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| AdapterError::ShutDown {
                operator_code: self.operator_code.clone(),
            })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, builder: RequestBuilder, timeout: Duration) -> AdapterResult<Value> {
        let response = self
            .auth
            .apply(builder)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AdapterError::AuthenticationFailed {
                operator_code: self.operator_code.clone(),
            });
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY_LEN);
            return Err(AdapterError::HttpStatus {
                status_code: status.as_u16(),
                reason: body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| AdapterError::invalid_response(e.to_string()))
    }
}

fn parse_base_url(operator_code: &str, raw: &str) -> AdapterResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| AdapterError::Config {
        operator_code: operator_code.to_string(),
        reason: format!("invalid endpoint '{}': {}", raw, e),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AdapterError::Config {
            operator_code: operator_code.to_string(),
            reason: format!("unsupported endpoint scheme '{}'", scheme),
        }),
    }
}

fn build_client(operator_code: &str, timeout: Duration, settings: &TransportSettings) -> AdapterResult<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Ok(agent) = HeaderValue::from_str(&settings.user_agent) {
        headers.insert(USER_AGENT, agent);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(settings.connect_timeout)
        .pool_max_idle_per_host(settings.pool_max_idle_per_host)
        .pool_idle_timeout(settings.pool_idle_timeout)
        .build()
        .map_err(|e| AdapterError::Config {
            operator_code: operator_code.to_string(),
            reason: format!("failed to build HTTP client: {}", e),
        })
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> AdapterError {
    if error.is_timeout() {
        AdapterError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if error.is_decode() || error.is_body() {
        AdapterError::invalid_response(error.to_string())
    } else {
        AdapterError::Transport(error.to_string())
    }
}
