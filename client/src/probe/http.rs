//! HTTP probes against the configured public endpoints

use crate::config::EndpointsConfig;
use anyhow::{Context, Result};
use engine::{ChunkSource, MeasureError};
use reqwest::header::CACHE_CONTROL;
use std::time::Duration;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
    ping_url: String,
    download_url: String,
    upload_url: String,
}

impl HttpTransport {
    /// `request_timeout_s` bounds connecting, the ping and the upload. A
    /// download may run as long as its body keeps arriving; only a gap between
    /// chunks longer than the timeout fails it.
    pub fn new(endpoints: &EndpointsConfig) -> Result<Self> {
        let request_timeout = Duration::from_secs(endpoints.request_timeout_s);
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            request_timeout,
            ping_url: endpoints.ping_url.clone(),
            download_url: endpoints.download_url.clone(),
            upload_url: endpoints.upload_url.clone(),
        })
    }

    /// Fetch the small ping resource. Any response counts, whatever its status.
    pub async fn fetch_ping_resource(&self) -> Result<(), MeasureError> {
        let url = cache_bust(&self.ping_url, now_millis());
        self.client
            .get(&url)
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(MeasureError::transport)?;
        Ok(())
    }

    pub async fn open_body(&self) -> Result<HttpBody, MeasureError> {
        let url = cache_bust(&self.download_url, now_millis());
        debug!("Downloading from {}", url);

        let request = self.client.get(&url).header(CACHE_CONTROL, "no-store").send();
        let response = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| MeasureError::Timeout(self.request_timeout))?
            .and_then(|r| r.error_for_status())
            .map_err(MeasureError::transport)?;

        Ok(HttpBody {
            response,
            idle_timeout: self.request_timeout,
        })
    }

    /// POST `payload` in one request; resolves once the response arrives
    pub async fn post(&self, payload: Vec<u8>) -> Result<(), MeasureError> {
        debug!("Uploading {} bytes to {}", payload.len(), self.upload_url);
        self.client
            .post(&self.upload_url)
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.request_timeout)
            .body(payload)
            .send()
            .await
            .map_err(MeasureError::transport)?;
        Ok(())
    }
}

/// Streaming download body
pub struct HttpBody {
    response: reqwest::Response,
    idle_timeout: Duration,
}

impl ChunkSource for HttpBody {
    async fn next_chunk(&mut self) -> Result<Option<usize>, MeasureError> {
        let chunk = tokio::time::timeout(self.idle_timeout, self.response.chunk())
            .await
            .map_err(|_| MeasureError::Timeout(self.idle_timeout))?
            .map_err(MeasureError::transport)?;
        Ok(chunk.map(|bytes| bytes.len()))
    }
}

/// Append a `t=<stamp>` query parameter so intermediaries can't serve a cached copy
pub fn cache_bust(url: &str, stamp: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, separator, stamp)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
