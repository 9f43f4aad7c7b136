//! Where candidate proxy addresses come from.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use proxyprobe_types::ProxyAddress;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_ERROR_BODY_CHARS: usize = 2048;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("source returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("source reported an error: {0}")]
    Remote(String),
    #[error("failed to read candidate list {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type PageFut<'a> = Pin<Box<dyn Future<Output = Result<Page, SourceError>> + Send + 'a>>;

/// One page of candidates.
///
/// `records` counts what the source returned before unusable entries were
/// dropped, so a page thinned by blank records is not mistaken for the last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub addresses: Vec<ProxyAddress>,
    pub records: usize,
}

impl Page {
    /// Whether the source had fewer than `limit` records left.
    #[must_use]
    pub fn is_last(&self, limit: usize) -> bool {
        self.records < limit
    }
}

/// Paginated, read-only list of candidates.
pub trait CandidateSource: Send + Sync {
    fn page(&self, offset: usize, limit: usize) -> PageFut<'_>;
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    #[serde(default)]
    errors: Vec<GraphMessage>,
    error: Option<GraphMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    #[serde(default)]
    datas: Vec<GraphRecord>,
}

#[derive(Debug, Deserialize)]
struct GraphRecord {
    data: String,
}

#[derive(Debug, Deserialize)]
struct GraphMessage {
    message: String,
}

/// The subgraph indexing proxy announcements.
#[derive(Debug, Clone)]
pub struct GraphSource {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphSource {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, offset: usize, limit: usize) -> Result<Page, SourceError> {
        let query = format!("{{ datas(first: {limit}, skip: {offset}) {{ data }} }}");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(SourceError::Status { status, body });
        }

        let parsed: GraphResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(SourceError::Remote(error.message));
        }
        if !parsed.errors.is_empty() {
            let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(SourceError::Remote(messages.join("; ")));
        }

        let datas = parsed.data.map(|data| data.datas).unwrap_or_default();
        let records = datas.len();
        let mut addresses: Vec<ProxyAddress> = datas
            .into_iter()
            .filter_map(|record| match ProxyAddress::new(record.data) {
                Ok(address) => Some(address),
                Err(_) => {
                    tracing::warn!("skipping empty candidate record");
                    None
                }
            })
            .collect();
        // Newest announcements first.
        addresses.reverse();
        tracing::debug!(offset, limit, records, count = addresses.len(), "fetched candidate page");
        Ok(Page { addresses, records })
    }
}

impl CandidateSource for GraphSource {
    fn page(&self, offset: usize, limit: usize) -> PageFut<'_> {
        Box::pin(self.fetch(offset, limit))
    }
}

/// A fixed list, from the command line or a file.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    addresses: Vec<ProxyAddress>,
}

impl StaticSource {
    #[must_use]
    pub fn new(addresses: Vec<ProxyAddress>) -> Self {
        Self { addresses }
    }

    /// Blank entries are dropped.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            args.into_iter()
                .filter_map(|arg| ProxyAddress::new(arg).ok())
                .collect(),
        )
    }

    /// One address per line; blank lines and `#` comments are skipped.
    #[must_use]
    pub fn parse_list(content: &str) -> Self {
        Self::from_args(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#')),
        )
    }

    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_list(&content))
    }

    #[must_use]
    pub fn addresses(&self) -> &[ProxyAddress] {
        &self.addresses
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl CandidateSource for StaticSource {
    fn page(&self, offset: usize, limit: usize) -> PageFut<'_> {
        let addresses: Vec<ProxyAddress> = self
            .addresses
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        let records = addresses.len();
        Box::pin(async move { Ok(Page { addresses, records }) })
    }
}
