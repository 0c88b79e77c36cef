//! HTTP protocol backed by reqwest

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Protocol, ProtocolError, Result};
use crate::config::HttpConfig;

/// Metadata about the last request a [`UrlProtocol`] made
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub url: String,
    pub status: u16,
    pub reason: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub fetched_at: DateTime<Utc>,
}

/// What a request is for: API calls carry the shared headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Api,
    File,
}

/// Gets information via HTTP GET requests
///
/// URLs are built as `host + extra + path`. Default headers are shared by
/// every handler holding this protocol.
#[derive(Debug)]
pub struct UrlProtocol {
    client: Client,
    host: String,
    extra: String,
    max_retries: u32,
    headers: RwLock<BTreeMap<String, String>>,
    last_meta: Mutex<Option<ResponseMeta>>,
    total_received: AtomicU64,
}

impl UrlProtocol {
    pub const KIND: &'static str = "url";

    pub fn new(
        host: impl Into<String>,
        extra: impl Into<String>,
        config: &HttpConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ProtocolError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            host: host.into(),
            extra: extra.into(),
            max_retries: config.max_retries.max(1),
            headers: RwLock::new(BTreeMap::new()),
            last_meta: Mutex::new(None),
            total_received: AtomicU64::new(0),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Combine host, extra path and `path` into a full URL
    pub fn url_build(&self, path: &str) -> String {
        format!("{}{}{}", self.host, self.extra, path)
    }

    /// Set a header sent with every following request
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Metadata of the most recent successful request
    pub fn last_meta(&self) -> Option<ResponseMeta> {
        self.last_meta
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bytes received over this protocol's lifetime
    pub fn total_received(&self) -> u64 {
        self.total_received.load(Ordering::Relaxed)
    }

    /// GET `url` with `query` appended, retrying transient failures
    pub async fn get_data(&self, url: &str, query: &[(String, String)]) -> Result<Bytes> {
        self.get_with_retry(url, query, Target::Api).await
    }

    /// Fetch a file hosted outside the API, e.g. on a CDN
    ///
    /// Uses the same client, timeouts and retries as API requests. Default
    /// headers are not sent and the last response metadata is left alone.
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        self.get_with_retry(url, &[], Target::File).await
    }

    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(String, String)],
        target: Target,
    ) -> Result<Bytes> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.get_once(url, query, target).await {
                Ok(bytes) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Request succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempts < self.max_retries => {
                    warn!(url, attempts, error = %e, "Request failed, retrying");

                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(2u64.saturating_pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(url, attempts, error = %e, "Request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(String, String)],
        target: Target,
    ) -> Result<Bytes> {
        debug!(url, params = query.len(), ?target, "Sending request");

        let mut request = self.client.get(url).query(query);

        if target == Target::Api {
            let headers = self
                .headers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for (name, value) in &headers {
                request = request.header(name, value);
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProtocolError::Timeout
            } else if e.is_builder() {
                ProtocolError::InvalidUrl(e.to_string())
            } else {
                ProtocolError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let meta = ResponseMeta {
            url: response.url().to_string(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            version: format!("{:?}", response.version()),
            headers: response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            fetched_at: Utc::now(),
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::RequestFailed(format!("Failed to read body: {}", e)))?;

        self.total_received
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        if target == Target::Api {
            *self.last_meta.lock().unwrap_or_else(PoisonError::into_inner) = Some(meta);
        }

        debug!(url, size = bytes.len(), "Request completed");

        Ok(bytes)
    }
}

impl Protocol for UrlProtocol {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
