// src/on_off_the_run.rs

use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

use crate::auction::AuctionRecord;
use crate::tenor::{Tenor, TenorMapping};

/// An issue with its recency rank inside its term group (0 = on-the-run).
#[derive(Clone, Debug, PartialEq)]
pub struct RankedIssue {
    pub rank: usize,
    pub tenor: Option<Tenor>,
    pub record: AuctionRecord,
}

/// Tenor → CUSIP for the current issues plus one map per off-the-run rank.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedIdentifierSet {
    pub on_the_run: BTreeMap<Tenor, String>,
    /// `off_the_run[k - 1]` holds rank `k`.
    pub off_the_run: Vec<BTreeMap<Tenor, String>>,
}

impl ResolvedIdentifierSet {
    pub fn off_the_run_rank(&self, rank: usize) -> Option<&BTreeMap<Tenor, String>> {
        rank.checked_sub(1).and_then(|index| self.off_the_run.get(index))
    }
}

/// Eligible auction records grouped by original term, newest issue first.
#[derive(Clone, Debug, Default)]
pub struct TermLadder {
    groups: BTreeMap<String, Vec<AuctionRecord>>,
}

impl TermLadder {
    /// Applies the exclusions, drops auctions after `as_of`, groups by original term,
    /// and orders each group by issue date descending.
    ///
    /// Records sharing an issue date keep their fetch order (the sort is stable).
    pub fn build(records: &[AuctionRecord], as_of: NaiveDate) -> Self {
        let mut groups: BTreeMap<String, Vec<AuctionRecord>> = BTreeMap::new();
        let mut kept = 0usize;
        for record in records
            .iter()
            .filter(|record| record.is_eligible())
            .filter(|record| record.auction_date <= as_of)
        {
            kept += 1;
            groups
                .entry(record.original_security_term.clone())
                .or_default()
                .push(record.clone());
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));
        }
        debug!(
            "[otr] {} of {} records eligible across {} terms",
            kept,
            records.len(),
            groups.len()
        );
        TermLadder { groups }
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn group(&self, term: &str) -> Option<&[AuctionRecord]> {
        self.groups.get(term).map(Vec::as_slice)
    }

    /// The `rank`-th most recent issue of every term that has one, mapped or not.
    pub fn rank(&self, rank: usize) -> Vec<RankedIssue> {
        let mut issues: Vec<RankedIssue> = self
            .groups
            .iter()
            .filter_map(|(term, group)| {
                group.get(rank).map(|record| RankedIssue {
                    rank,
                    tenor: TenorMapping::tenor(term),
                    record: record.clone(),
                })
            })
            .collect();
        issues.sort_by(|a, b| match (a.tenor, b.tenor) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.record.original_security_term.cmp(&b.record.original_security_term),
        });
        issues
    }

    pub fn on_the_run(&self) -> Vec<RankedIssue> {
        self.rank(0)
    }

    /// Ranks `0..=n`, one layer per rank, restricted to terms with a numeric tenor
    /// and sorted by tenor ascending.
    pub fn layers(&self, n: usize) -> Vec<Vec<RankedIssue>> {
        (0..=n)
            .map(|rank| {
                self.rank(rank)
                    .into_iter()
                    .filter(|issue| issue.tenor.is_some())
                    .collect::<Vec<_>>()
            })
            .take_while(|layer| !layer.is_empty())
            .collect()
    }

    /// `layers(n)` collapsed to tenor → CUSIP.
    pub fn identifier_layers(&self, n: usize) -> Vec<BTreeMap<Tenor, String>> {
        self.layers(n).into_iter().map(collapse).collect()
    }

    pub fn resolve(&self, n: usize) -> ResolvedIdentifierSet {
        let mut layers = self.identifier_layers(n).into_iter();
        let on_the_run = layers.next().unwrap_or_default();
        ResolvedIdentifierSet {
            on_the_run,
            off_the_run: layers.collect(),
        }
    }
}

fn collapse(layer: Vec<RankedIssue>) -> BTreeMap<Tenor, String> {
    layer
        .into_iter()
        .filter_map(|issue| issue.tenor.map(|tenor| (tenor, issue.record.cusip)))
        .collect()
}

/// On-the-run and the last `n` off-the-run issues per term, as of a given day.
pub struct OnOffTheRunResolver {
    as_of: NaiveDate,
}

impl OnOffTheRunResolver {
    pub fn new(as_of: NaiveDate) -> Self {
        OnOffTheRunResolver { as_of }
    }

    /// Resolver pinned to today's date in New York.
    pub fn today() -> Self {
        OnOffTheRunResolver::new(crate::market_today())
    }

    pub fn ladder(&self, records: &[AuctionRecord]) -> TermLadder {
        TermLadder::build(records, self.as_of)
    }

    pub fn resolve(&self, records: &[AuctionRecord], n: usize) -> ResolvedIdentifierSet {
        self.ladder(records).resolve(n)
    }

    pub fn on_the_run(&self, records: &[AuctionRecord]) -> BTreeMap<Tenor, String> {
        self.resolve(records, 0).on_the_run
    }
}
