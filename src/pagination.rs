// src/pagination.rs

use log::{error, info};
use serde::Deserialize;
use tokio::time::timeout;

use crate::error::{FetchError, ResolveError};
use crate::session::{FetchRequest, Transport};

/// One page of a bulk collection: its 1-based number and the URL that serves it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u64,
    pub url: String,
}

#[derive(Deserialize)]
struct ProbeBody {
    meta: ProbeMeta,
}

#[derive(Deserialize)]
struct ProbeMeta {
    #[serde(rename = "total-count")]
    total_count: u64,
}

/// Sizes a `page[number]`/`page[size]` endpoint from a one-record probe.
pub struct PaginationSizer {
    base_url: String,
    max_page_size: u64,
}

impl PaginationSizer {
    pub fn new(base_url: impl Into<String>, max_page_size: u64) -> Self {
        PaginationSizer {
            base_url: base_url.into(),
            max_page_size: max_page_size.max(1),
        }
    }

    pub fn max_page_size(&self) -> u64 {
        self.max_page_size
    }

    pub fn probe_url(&self) -> String {
        page_url(&self.base_url, 1, 1)
    }

    /// Reads `meta.total-count` and returns the page list covering it.
    ///
    /// A failed probe is fatal: without it the size of the collection is unknown.
    pub async fn size<S: Transport + ?Sized>(&self, transport: &S) -> Result<Vec<PageRequest>, ResolveError> {
        let total_count = self.probe(transport).await.map_err(|err| {
            error!("[pagination] probe of {} failed: {}", self.base_url, err);
            ResolveError::ProbeFailed(err)
        })?;
        let pages = page_requests(&self.base_url, total_count, self.max_page_size);
        info!(
            "[pagination] {} records over {} pages of {}",
            total_count,
            pages.len(),
            self.max_page_size
        );
        Ok(pages)
    }

    async fn probe<S: Transport + ?Sized>(&self, transport: &S) -> Result<u64, FetchError> {
        let request = FetchRequest::get(self.probe_url());
        let per_task = transport.timeout();
        let body = timeout(per_task, transport.execute(&request))
            .await
            .map_err(|_| FetchError::Timeout(per_task))??;
        let probe: ProbeBody = serde_json::from_slice(&body)?;
        Ok(probe.meta.total_count)
    }
}

pub fn page_url(base_url: &str, number: u64, size: u64) -> String {
    format!("{}?page[number]={}&page[size]={}", base_url, number, size)
}

/// `ceil(total_count / page_size)` pages, numbered from 1, each requesting a full page.
pub fn page_requests(base_url: &str, total_count: u64, page_size: u64) -> Vec<PageRequest> {
    let page_size = page_size.max(1);
    let pages = total_count.div_ceil(page_size);
    (1..=pages)
        .map(|number| PageRequest {
            number,
            url: page_url(base_url, number, page_size),
        })
        .collect()
}
