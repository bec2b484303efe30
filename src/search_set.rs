// src/search_set.rs

use chrono::NaiveDate;
use log::info;
use std::collections::BTreeMap;

use crate::auction::AuctionRecord;
use crate::error::ResolveError;
use crate::nearest::{NearestTenorMatcher, TenorMatch};
use crate::tenor::{Tenor, TenorMapping};

/// Auctions held on or before this day are too old to stand in for a curve point.
pub fn history_floor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Bills, notes and bonds auctioned after 2000-01-01, in their original order.
pub fn nominal_candidates(history: &[AuctionRecord]) -> Vec<AuctionRecord> {
    let floor = history_floor();
    history
        .iter()
        .filter(|record| record.security_type.is_nominal_coupon_or_bill())
        .filter(|record| record.auction_date > floor)
        .cloned()
        .collect()
}

/// Off-benchmark curve points matched to the issue maturing closest to each.
pub fn interpolation_matches(history: &[AuctionRecord], today: NaiveDate) -> Result<Vec<TenorMatch>, ResolveError> {
    let candidates = nominal_candidates(history);
    NearestTenorMatcher::by_maturity(today).match_targets(&TenorMapping::interpolation_targets(), &candidates)
}

/// Tenor → CUSIP covering the interpolation grid, with on-the-run issues taking
/// precedence where both name a tenor.
pub fn build_search_set(
    history: &[AuctionRecord],
    on_the_run: &BTreeMap<Tenor, String>,
    today: NaiveDate,
) -> Result<BTreeMap<Tenor, String>, ResolveError> {
    let mut search: BTreeMap<Tenor, String> = interpolation_matches(history, today)?
        .into_iter()
        .map(|matched| (matched.tenor, matched.record.cusip))
        .collect();
    let interpolated = search.len();
    search.extend(on_the_run.iter().map(|(tenor, cusip)| (*tenor, cusip.clone())));
    info!(
        "[search] {} interpolated + {} on-the-run = {} identifiers",
        interpolated,
        on_the_run.len(),
        search.len()
    );
    Ok(search)
}

/// Labels the search set by tenor for the quote fetcher.
pub fn labelled(search: &BTreeMap<Tenor, String>) -> BTreeMap<String, String> {
    search
        .iter()
        .map(|(tenor, cusip)| (tenor.to_string(), cusip.clone()))
        .collect()
}
