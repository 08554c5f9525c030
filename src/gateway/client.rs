use super::error::{extract_detail, GatewayError};
use crate::util::is_loopback;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Responses larger than this are rejected while streaming.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Thin uniform wrapper around calls to the digest backend.
///
/// Every call goes through [`Gateway::request`] (or the byte-level exchange
/// underneath it), which classifies failures into transport, status and
/// parse errors. Nothing here retries; a retry is the user triggering the
/// originating operation again.
///
/// Cloning is cheap: the reqwest client and token are reference-counted.
#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
    token: Option<Arc<SecretString>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Gateway {
    /// Build a gateway for `base`.
    ///
    /// The bearer token is only attached when the base is https or a loopback
    /// host; otherwise it is dropped with a warning so it never crosses the
    /// network in clear text.
    pub fn new(
        base: Url,
        timeout: Duration,
        token: Option<SecretString>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rss-digest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let token = match token {
            Some(_) if base.scheme() != "https" && !is_loopback(&base) => {
                tracing::warn!(base_url = %base, "Not sending API token over plain HTTP");
                None
            }
            other => other.map(Arc::new),
        };

        Ok(Self {
            client,
            base: with_trailing_slash(base),
            timeout,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve an API path such as `/sources/3` against the base URL.
    ///
    /// Leading slashes are dropped so that a base with a path prefix
    /// (`https://host/api/`) keeps its prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// Issue a call and decode the body as JSON.
    ///
    /// An empty success body (ack endpoints, 204) decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, GatewayError> {
        let payload = body.map(serde_json::to_vec).transpose()?;
        let bytes = self.exchange(method, path, payload).await?;
        decode_or_null(&bytes)
    }

    /// `GET path`, decoding straight from the body bytes into `T`.
    ///
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let bytes = self.exchange(Method::GET, path, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `POST path` and return the success body undecoded.
    ///
    /// For mutations whose response is informational: a 2xx status is the
    /// verdict, and callers decode the body only if they can.
    pub async fn post_raw<B>(&self, path: &str, body: Option<&B>) -> Result<Vec<u8>, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let payload = body.map(serde_json::to_vec).transpose()?;
        self.exchange(Method::POST, path, payload).await
    }

    /// `POST path` without a body; the response is an acknowledgement.
    pub async fn post_empty(&self, path: &str) -> Result<serde_json::Value, GatewayError> {
        self.request(Method::POST, path, None).await
    }

    /// `DELETE path`; the response is an acknowledgement.
    pub async fn delete(&self, path: &str) -> Result<serde_json::Value, GatewayError> {
        self.request(Method::DELETE, path, None).await
    }

    pub async fn health(&self) -> Result<Health, GatewayError> {
        self.get("/health").await
    }

    /// Send one request and return the raw success body.
    ///
    /// The timeout covers both the send and the body read so a stalled
    /// stream cannot hang the caller.
    async fn exchange(
        &self,
        method: Method,
        path: &str,
        payload: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = self.endpoint(path)?;
        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(payload) = payload {
            request = request.header(CONTENT_TYPE, "application/json").body(payload);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let (status, bytes) = tokio::time::timeout(self.timeout, async {
            let response = request.send().await?;
            let status = response.status();
            let bytes = read_limited_bytes(response, MAX_BODY_SIZE).await?;
            Ok::<_, GatewayError>((status, bytes))
        })
        .await
        .map_err(|_| GatewayError::Timeout(self.timeout))??;

        if !status.is_success() {
            let detail = extract_detail(&bytes);
            tracing::debug!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                detail = ?detail,
                "Backend rejected request"
            );
            return Err(GatewayError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        tracing::trace!(url = %url, bytes = bytes.len(), "Response received");
        Ok(bytes)
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn decode_or_null(bytes: &[u8]) -> Result<serde_json::Value, GatewayError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, GatewayError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(GatewayError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(GatewayError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
