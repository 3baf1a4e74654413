use crate::error::{CheckError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tally_metrics::http::METRICS_PATH;
use tally_metrics::{codec, MetricContext, Snapshot};

/// Where a snapshot came from. Local snapshots get extra string bindings
/// that a remote peer does not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Supplies the snapshot a check cycle evaluates.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Takes one snapshot.
    ///
    /// # Errors
    ///
    /// Any error aborts the cycle; no partial results are produced.
    async fn acquire(&self) -> Result<Snapshot>;

    fn origin(&self) -> Origin;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Reads the in-process store directly.
pub struct LocalSource {
    context: Arc<MetricContext>,
}

impl LocalSource {
    pub fn new(context: Arc<MetricContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl SnapshotSource for LocalSource {
    async fn acquire(&self) -> Result<Snapshot> {
        Ok(self.context.snapshot())
    }

    fn origin(&self) -> Origin {
        Origin::Local
    }

    fn describe(&self) -> String {
        format!("local:{}", self.context.namespace())
    }
}

/// Fetches a peer's snapshot over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSource {
    /// `address` is `host:port` or a full base URL.
    pub fn new(address: &str, timeout: Duration, allow_nan: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CheckError::Fetch)?;
        Ok(Self {
            client,
            url: metrics_url(address, allow_nan),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let snapshot = codec::decode(&body)?;
        tracing::debug!(url = %self.url, metrics = snapshot.len(), "Fetched snapshot");
        Ok(snapshot)
    }

    fn transport_error(&self, e: reqwest::Error) -> CheckError {
        if e.is_timeout() {
            CheckError::Timeout(self.timeout)
        } else {
            CheckError::Fetch(e)
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn acquire(&self) -> Result<Snapshot> {
        tokio::time::timeout(self.timeout, self.fetch())
            .await
            .map_err(|_| CheckError::Timeout(self.timeout))?
    }

    fn origin(&self) -> Origin {
        Origin::Remote
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn metrics_url(address: &str, allow_nan: bool) -> String {
    let address = address.trim().trim_end_matches('/');
    let base = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    if allow_nan {
        format!("{base}{METRICS_PATH}")
    } else {
        format!("{base}{METRICS_PATH}?allowNaN=false")
    }
}
