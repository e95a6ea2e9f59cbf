//! Concurrent detail-page fetcher. Per-item failures degrade to empty
//! defaults; the batch itself never fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use url::Url;

use eventdigest_common::{EnrichedStub, EventStub};

use crate::blocked::is_blocked_domain;
use crate::document::{analyze_page, PageAnalysis};
use crate::search::WebSearcher;

/// How many search hits to consider when a page is blocked.
const SEARCH_FALLBACK_CANDIDATES: usize = 5;

// --- DetailEnricher trait ---

#[async_trait]
pub trait DetailEnricher: Send + Sync {
    /// Enrich stubs with detail-page data. Always returns exactly one
    /// output per input, in input order.
    async fn fetch_details(&self, stubs: Vec<EventStub>) -> Vec<EnrichedStub>;
}

/// Fetches detail pages with bounded concurrency, extracts structured
/// data, and substitutes a search-located source for blocked pages.
pub struct DetailFetcher {
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
    searcher: Arc<dyn WebSearcher>,
}

impl DetailFetcher {
    pub fn new(concurrency: usize, timeout_secs: u64, searcher: Arc<dyn WebSearcher>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .expect("Failed to build HTTP client"),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            searcher,
        }
    }

    async fn fetch_single(&self, stub: EventStub) -> EnrichedStub {
        let Some(html) = self.fetch_html(&stub.url).await else {
            return EnrichedStub::empty(stub);
        };

        let mut analysis = analyze_page(&stub.url, &html);

        if analysis.blocked {
            info!(url = %stub.url, "Page looks blocked, trying search fallback");
            if let Some(substitute) = self.search_fallback(&stub).await {
                analysis = substitute;
            }
        }

        let PageAnalysis {
            json_ld,
            og_meta,
            markdown,
            ..
        } = analysis;

        EnrichedStub {
            stub,
            json_ld,
            og_meta,
            markdown,
        }
    }

    /// Single best-effort GET under the shared concurrency gate. No
    /// retries — a failure here degrades to empty enrichment.
    async fn fetch_html(&self, url: &str) -> Option<String> {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return None;
        };

        match self.http.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    warn!(url, %status, "Detail fetch returned non-success status");
                    return None;
                }
                match response.text().await {
                    Ok(body) => Some(body),
                    Err(e) => {
                        warn!(url, error = %e, "Failed to read detail page body");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(url, error = %e, "Detail fetch failed");
                None
            }
        }
    }

    /// Search for `"{title} event"` and fetch candidates until one is
    /// usable and not itself blocked. Any failure here is non-fatal.
    async fn search_fallback(&self, stub: &EventStub) -> Option<PageAnalysis> {
        let query = format!("{} event", stub.title);
        let results = match self
            .searcher
            .search(&query, SEARCH_FALLBACK_CANDIDATES)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(url = %stub.url, error = %e, "Search fallback failed");
                return None;
            }
        };

        let original_host = host_of(&stub.url);

        for result in results.into_iter().take(SEARCH_FALLBACK_CANDIDATES) {
            if host_of(&result.url) == original_host || is_blocked_domain(&result.url) {
                continue;
            }
            let Some(html) = self.fetch_html(&result.url).await else {
                continue;
            };
            let analysis = analyze_page(&result.url, &html);
            if analysis.blocked {
                continue;
            }
            info!(
                original = %stub.url,
                substitute = %result.url,
                "Substituted search-located source for blocked page"
            );
            return Some(analysis);
        }

        None
    }
}

#[async_trait]
impl DetailEnricher for DetailFetcher {
    async fn fetch_details(&self, stubs: Vec<EventStub>) -> Vec<EnrichedStub> {
        info!(count = stubs.len(), "Fetching detail pages");
        let tasks = stubs.into_iter().map(|stub| self.fetch_single(stub));
        join_all(tasks).await
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}
