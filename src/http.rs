//! HTTP client with bearer auth, timeouts and retry for idempotent reads

use crate::config::HttpConfig;
use crate::error::ServiceError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub struct HttpClient {
    inner: Client,
    base_url: String,
    max_retries: u32,
    read_timeout: Duration,
    submit_timeout: Option<Duration>,
}

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl HttpClient {
    pub fn new(base_url: &str, token: Option<&str>, cfg: &HttpConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("ontreg/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ServiceError::Decode("bearer token contains invalid characters".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        // no client-wide timeout: reads and submissions set their own
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: cfg.max_retries.max(1),
            read_timeout: Duration::from_secs(cfg.timeout),
            submit_timeout: cfg.submit_timeout.map(Duration::from_secs),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET and decode JSON, retrying transport and 5xx failures
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let url = self.url(path);
        let resp = self
            .with_retry(|| self.inner.get(&url).timeout(self.read_timeout).send())
            .await?;
        decode(resp).await
    }

    /// POST a JSON body exactly once and decode the JSON reply
    ///
    /// Scans and registrations are not retried here: a failed scan falls back
    /// to the simulated path and a registration is not idempotent. They run
    /// without a timeout unless `submit_timeout` is configured.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!("POST {}", url);
        let mut req = self.inner.post(&url).json(body);
        if let Some(timeout) = self.submit_timeout {
            req = req.timeout(timeout);
        }
        let resp = req.send().await?;
        decode(check_status(resp).await?).await
    }

    /// Retry up to `max_retries` times with exponential backoff
    async fn with_retry<F, Fut>(&self, request_fn: F) -> Result<Response, ServiceError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = reqwest::Result<Response>>,
    {
        let mut attempt = 0;

        loop {
            let last_attempt = attempt + 1 >= self.max_retries;
            let delay = Duration::from_millis(500 << attempt.min(6));

            match request_fn().await {
                Ok(resp) if resp.status().is_server_error() && !last_attempt => {
                    tracing::warn!(
                        "Server error {}, retrying in {:?}... (attempt {}/{})",
                        resp.status(),
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                }
                Ok(resp) => return check_status(resp).await,
                Err(e) if !last_attempt && (e.is_connect() || e.is_timeout()) => {
                    tracing::warn!(
                        "Request error: {}, retrying in {:?}... (attempt {}/{})",
                        e,
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn check_status(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => snippet(&text, 200),
    };

    if status == StatusCode::NOT_FOUND {
        return Err(ServiceError::NotFound(detail));
    }
    Err(ServiceError::Api {
        status: status.as_u16(),
        detail,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::debug!("Undecodable body: '{}'", snippet(&body, 200));
        ServiceError::Decode(e.to_string())
    })
}

/// First `max` characters of a response body, for messages and logs
fn snippet(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
