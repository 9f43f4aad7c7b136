//! Fan-out over a candidate list.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use proxyprobe_types::{ProxyAddress, Verdict};
use serde::Serialize;

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_PAGE_SIZE};
use crate::probe::{ProbeReport, Prober};
use crate::source::{CandidateSource, SourceError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub probed: usize,
    pub active: usize,
    pub inactive: usize,
}

impl RunSummary {
    fn tally(reports: &[ProbeReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            summary.probed += 1;
            match report.verdict {
                Verdict::Active => summary.active += 1,
                Verdict::Inactive | Verdict::Pending => summary.inactive += 1,
            }
            summary
        })
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub reports: Vec<ProbeReport>,
    pub summary: RunSummary,
}

/// Probes many addresses at once. Sessions share only the read-only
/// [`Prober`]; each owns its transport and worker.
pub struct ProbeRunner {
    prober: Arc<Prober>,
    concurrency: usize,
    page_size: usize,
}

impl ProbeRunner {
    pub fn new(prober: Arc<Prober>) -> Self {
        Self {
            prober,
            concurrency: DEFAULT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Read `pages` pages starting at record `offset`. Stops early once the
    /// source returns fewer records than a full page, or when the next
    /// record index would not fit in `usize`.
    pub async fn collect(
        &self,
        source: &dyn CandidateSource,
        offset: usize,
        pages: usize,
    ) -> Result<Vec<ProxyAddress>, SourceError> {
        let mut addresses = Vec::new();
        for page in 0..pages {
            let Some(skip) = page
                .checked_mul(self.page_size)
                .and_then(|start| start.checked_add(offset))
            else {
                tracing::warn!(offset, page, "page offset overflows, stopping");
                break;
            };
            let batch = source.page(skip, self.page_size).await?;
            let last = batch.is_last(self.page_size);
            addresses.extend(batch.addresses);
            if last {
                break;
            }
        }
        Ok(addresses)
    }

    /// Probe every address, at most `concurrency` at a time. Reports come
    /// back in completion order.
    pub async fn probe_all(&self, addresses: Vec<ProxyAddress>) -> RunReport {
        let reports: Vec<ProbeReport> = stream::iter(addresses)
            .map(|address| {
                let prober = Arc::clone(&self.prober);
                async move { prober.probe(&address).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let summary = RunSummary::tally(&reports);
        tracing::info!(
            probed = summary.probed,
            active = summary.active,
            inactive = summary.inactive,
            "run finished"
        );
        RunReport { reports, summary }
    }

    pub async fn run(
        &self,
        source: &dyn CandidateSource,
        offset: usize,
        pages: usize,
    ) -> Result<RunReport, SourceError> {
        let addresses = self.collect(source, offset, pages).await?;
        Ok(self.probe_all(addresses).await)
    }
}
