use crate::constants::{ACCEPT_CSV, BROWSER_USER_AGENT, PROBE_PREVIEW_CHARS};
use crate::error::Error;
use crate::models::PipelineConfig;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, USER_AGENT};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upstream that yields the raw instruments CSV
#[async_trait]
pub trait InstrumentSource: Send + Sync {
    /// Download the raw CSV text
    async fn fetch(&self) -> Result<String, Error>;
}

/// Result of probing one mirror
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub url: String,
    pub success: bool,
    pub status: Option<u16>,
    pub content_size: usize,
    pub content_preview: String,
    pub download_ms: u64,
    pub error: Option<String>,
}

/// Downloads the instruments dump over an ordered mirror list
///
/// Each mirror gets one attempt bounded by `timeout`. A non-success status,
/// a transport error, a timeout or a body shorter than `min_payload_chars`
/// moves on to the next mirror.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    urls: Vec<String>,
    timeout: Duration,
    min_payload_chars: usize,
}

impl HttpFetcher {
    pub fn new(urls: Vec<String>, timeout: Duration, min_payload_chars: usize) -> Result<Self, Error> {
        for url in &urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "Invalid mirror URL: must start with http:// or https://, got: '{}'",
                    url
                )));
            }
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        debug!(mirrors = urls.len(), timeout_ms = timeout.as_millis() as u64, "Created HttpFetcher");

        Ok(Self {
            client,
            urls,
            timeout,
            min_payload_chars,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, Error> {
        Self::new(
            config.mirror_urls.clone(),
            config.fetch_timeout,
            config.min_payload_chars,
        )
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, ACCEPT_CSV)
            .header(CACHE_CONTROL, "no-cache")
    }

    /// Single attempt against one mirror
    pub async fn fetch_from(&self, url: &str) -> Result<String, Error> {
        let attempt = async {
            let response = self.request(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Network(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                )));
            }
            Ok::<String, Error>(response.text().await?)
        };

        let body = tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| {
                Error::Network(format!(
                    "Request to {} timed out after {}ms",
                    url,
                    self.timeout.as_millis()
                ))
            })??;

        let size = body.chars().count();
        info!(url, size, "Downloaded CSV");

        if size < self.min_payload_chars {
            return Err(Error::Fetch(format!(
                "Downloaded file seems too small ({} characters)",
                size
            )));
        }

        Ok(body)
    }

    /// Hit every mirror once and report what came back, without validation
    pub async fn probe(&self) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(self.urls.len());

        for url in &self.urls {
            debug!(url, "Probing mirror");
            let started = Instant::now();

            let attempt = async {
                let response = self.request(url).send().await?;
                let status = response.status();
                let body = if status.is_success() {
                    response.text().await?
                } else {
                    String::new()
                };
                Ok::<_, Error>((status, body))
            };

            let outcome = tokio::time::timeout(self.timeout, attempt).await;
            let download_ms = started.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(Ok((status, body))) => ProbeResult {
                    url: url.clone(),
                    success: status.is_success(),
                    status: Some(status.as_u16()),
                    content_size: body.chars().count(),
                    content_preview: body.chars().take(PROBE_PREVIEW_CHARS).collect(),
                    download_ms,
                    error: None,
                },
                Ok(Err(e)) => failed_probe(url, download_ms, e.to_string()),
                Err(_) => failed_probe(
                    url,
                    download_ms,
                    format!("timed out after {}ms", self.timeout.as_millis()),
                ),
            };
            results.push(result);
        }

        results
    }
}

fn failed_probe(url: &str, download_ms: u64, error: String) -> ProbeResult {
    ProbeResult {
        url: url.to_string(),
        success: false,
        status: None,
        content_size: 0,
        content_preview: String::new(),
        download_ms,
        error: Some(error),
    }
}

#[async_trait]
impl InstrumentSource for HttpFetcher {
    /// Try each mirror in order; report the last failure if all of them fail
    async fn fetch(&self) -> Result<String, Error> {
        let mut last_error: Option<Error> = None;

        for url in &self.urls {
            debug!(url, "Attempting download");
            match self.fetch_from(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(url, error = %e, "Download attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(Error::Fetch(msg)) => Error::Fetch(msg),
            Some(other) => Error::Fetch(other.to_string()),
            None => Error::Fetch("All download attempts failed".to_string()),
        })
    }
}
