// src/auction_history.rs

use log::{info, warn};
use polars::prelude::*;
use tokio::time::timeout;

use crate::auction::{AuctionRecord, AuctionedSecurity, FiscalAuctionPage};
use crate::config::{AUCTIONS_QUERY_URL, MAX_PAGE_SIZE, ON_THE_RUN_URL};
use crate::error::{FetchError, ResolveError};
use crate::orchestrator::{FetchOrchestrator, FetchTask, TaskOutcome};
use crate::pagination::PaginationSizer;
use crate::session::{FetchRequest, Transport};

/// Every page of the bulk auction collection, in page order, each with its own outcome.
#[derive(Debug)]
pub struct AuctionHistory {
    pages: Vec<(u64, TaskOutcome<Vec<AuctionRecord>>)>,
}

impl AuctionHistory {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn failed_pages(&self) -> Vec<u64> {
        self.pages
            .iter()
            .filter(|(_, outcome)| !outcome.is_done())
            .map(|(number, _)| *number)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.pages.iter().all(|(_, outcome)| outcome.is_done())
    }

    /// Best-effort concatenation in page order; failed pages contribute nothing.
    pub fn records(&self) -> Vec<AuctionRecord> {
        self.pages
            .iter()
            .filter_map(|(_, outcome)| outcome.as_done())
            .flat_map(|records| records.iter().cloned())
            .collect()
    }

    /// Concatenation that refuses to paper over failed pages.
    pub fn complete_records(&self) -> Result<Vec<AuctionRecord>, ResolveError> {
        let failed_pages = self.failed_pages();
        if !failed_pages.is_empty() {
            return Err(ResolveError::IncompleteHistory { failed_pages });
        }
        Ok(self.records())
    }

    /// Unfiltered history as a frame, in fetch order.
    pub fn to_frame(&self) -> Result<DataFrame, PolarsError> {
        auctions_to_frame(&self.records())
    }
}

/// Sizes the auction collection, fetches every page in one wave, and keeps page order.
pub struct AuctionHistoryResolver {
    sizer: PaginationSizer,
}

impl AuctionHistoryResolver {
    pub fn new(base_url: impl Into<String>, max_page_size: u64) -> Self {
        AuctionHistoryResolver {
            sizer: PaginationSizer::new(base_url, max_page_size),
        }
    }

    pub async fn resolve<S: Transport + ?Sized>(&self, transport: &S) -> Result<AuctionHistory, ResolveError> {
        let pages = self.sizer.size(transport).await?;
        let tasks = pages
            .into_iter()
            .map(|page| FetchTask::new(page.number, FetchRequest::get(page.url)))
            .collect::<Vec<_>>();

        let wave = FetchOrchestrator::new(transport, "auctions")
            .run(tasks, |number, body| parse_auction_page(*number, &body))
            .await;

        let mut pages: Vec<_> = wave.into_iter().collect();
        pages.sort_by_key(|(number, _)| *number);
        let history = AuctionHistory { pages };
        info!(
            "[auctions] {} pages, {} failed",
            history.page_count(),
            history.failed_pages().len()
        );
        Ok(history)
    }
}

impl Default for AuctionHistoryResolver {
    fn default() -> Self {
        AuctionHistoryResolver::new(AUCTIONS_QUERY_URL, MAX_PAGE_SIZE)
    }
}

pub fn parse_auction_page(number: u64, body: &[u8]) -> Result<Vec<AuctionRecord>, FetchError> {
    let page: FiscalAuctionPage = serde_json::from_slice(body)?;
    let total = page.data.len();
    let records: Vec<AuctionRecord> = page
        .data
        .into_iter()
        .filter_map(|row| AuctionRecord::try_from(row).ok())
        .collect();
    if records.len() < total {
        warn!(
            "[auctions] page {} skipped {} of {} rows without usable dates",
            number,
            total - records.len(),
            total
        );
    }
    Ok(records)
}

/// Latest auctioned securities from TreasuryDirect, as auction records.
pub async fn fetch_auctioned_securities<S: Transport + ?Sized>(transport: &S) -> Result<Vec<AuctionRecord>, FetchError> {
    fetch_auctioned_securities_from(transport, ON_THE_RUN_URL).await
}

pub async fn fetch_auctioned_securities_from<S: Transport + ?Sized>(
    transport: &S,
    url: &str,
) -> Result<Vec<AuctionRecord>, FetchError> {
    let per_task = transport.timeout();
    let body = timeout(per_task, transport.execute(&FetchRequest::get(url)))
        .await
        .map_err(|_| FetchError::Timeout(per_task))??;
    let securities: Vec<AuctionedSecurity> = serde_json::from_slice(&body)?;
    let total = securities.len();
    let records: Vec<AuctionRecord> = securities
        .into_iter()
        .filter_map(|security| AuctionRecord::try_from(security).ok())
        .collect();
    if records.len() < total {
        warn!("[auctioned] skipped {} of {} securities without usable dates", total - records.len(), total);
    }
    Ok(records)
}

pub fn auctions_to_frame(records: &[AuctionRecord]) -> Result<DataFrame, PolarsError> {
    let day = |date: chrono::NaiveDate| date.format("%Y-%m-%d").to_string();
    DataFrame::new(vec![
        Series::new("cusip", records.iter().map(|r| r.cusip.clone()).collect::<Vec<_>>()),
        Series::new(
            "security_type",
            records.iter().map(|r| r.security_type.to_string()).collect::<Vec<_>>(),
        ),
        Series::new(
            "original_security_term",
            records.iter().map(|r| r.original_security_term.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "security_term_week_year",
            records.iter().map(|r| r.security_term_week_year.clone()).collect::<Vec<_>>(),
        ),
        Series::new("auction_date", records.iter().map(|r| day(r.auction_date)).collect::<Vec<_>>()),
        Series::new("issue_date", records.iter().map(|r| day(r.issue_date)).collect::<Vec<_>>()),
        Series::new("maturity_date", records.iter().map(|r| day(r.maturity_date)).collect::<Vec<_>>()),
    ])
}
