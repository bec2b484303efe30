// src/quotes.rs

use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use std::collections::BTreeMap;

use crate::config::{CUSIP_SEARCH_URL, FEDINVEST_PRICES_URL};
use crate::error::FetchError;
use crate::orchestrator::{FetchOrchestrator, FetchTask, TaskOutcome, WaveResult};
use crate::session::{FetchRequest, Transport};
use crate::table::{parse_number, Record, Table, TableExtractor, TableLayout};

const QUOTES_TABLE: &str = "quotes";

/// Where a vendor renders its per-CUSIP quote grid and which columns matter.
#[derive(Clone, Debug)]
pub struct QuoteSource {
    pub name: &'static str,
    pub url: String,
    pub layout: TableLayout,
    pub id_column: &'static str,
    /// Columns that carry the identifier when the page leaves its heading blank.
    pub id_aliases: &'static [&'static str],
    /// Numeric column whose largest value marks the authoritative quote.
    pub best_column: &'static str,
    pub maturity_column: &'static str,
    pub maturity_format: &'static str,
    pub payload: fn(&str) -> Vec<(String, String)>,
}

impl QuoteSource {
    /// Brokerage fixed-income CUSIP search, best quote by estimated total size.
    pub fn cusip_search() -> Self {
        QuoteSource {
            name: "cusip-search",
            url: CUSIP_SEARCH_URL.to_string(),
            layout: TableLayout::new(&[(QUOTES_TABLE, 0)]),
            id_column: "CUSIP",
            id_aliases: &["#0"],
            best_column: "Estimated Total",
            maturity_column: "Maturity",
            maturity_format: "%m/%d/%Y",
            payload: cusip_search_payload,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

fn cusip_search_payload(cusip: &str) -> Vec<(String, String)> {
    [
        ("ProductSearch.ShowQuoteSelection", "buy"),
        ("ProductSearch.BestQuoteOnly", "true"),
        ("ProductSearch.Product", "Treasuries"),
        ("CusipSearch.Cusip", cusip),
        ("Grid.PagingAndSorting.PrimarySort", "Maturity"),
        ("Grid.PagingAndSorting.PrimarySortOrder", "ASC"),
        ("Grid.PagingAndSorting.SecondarySort", "YTM"),
        ("Grid.PagingAndSorting.SecondarySortOrder", "DESC"),
        ("IsSearch", "true"),
        ("PageState.CurrentState", "EditSearch"),
        ("PageState.NextState", "SearchResults"),
        ("PageState.IncludeOnlyAccordion", "False"),
        ("PageState.MaturityAccordion", "False"),
        ("PageState.RatingsAccordion", "False"),
        ("PageState.ProductAccordion", "False"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

/// The row chosen for one identifier, enriched with its label and time to maturity.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteRecord {
    pub label: String,
    pub cusip: String,
    pub fields: Record,
    pub best_value: f64,
    pub maturity: Option<NaiveDate>,
    /// Actual days to maturity over 365.
    pub time_to_maturity: Option<f64>,
}

/// Outcome of a quote wave, keyed by the caller's labels.
#[derive(Debug)]
pub struct QuoteBook {
    wave: WaveResult<String, QuoteRecord>,
}

impl QuoteBook {
    pub fn len(&self) -> usize {
        self.wave.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wave.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&TaskOutcome<QuoteRecord>> {
        self.wave.get(&label.to_string())
    }

    pub fn quotes(&self) -> BTreeMap<&str, &QuoteRecord> {
        self.wave
            .iter()
            .filter_map(|(label, outcome)| outcome.as_done().map(|quote| (label.as_str(), quote)))
            .collect()
    }

    /// Labels whose requested identifier was absent from the returned table.
    pub fn missing(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .wave
            .iter()
            .filter(|(_, outcome)| matches!(outcome.error(), Some(FetchError::IdentifierNotFound(_))))
            .map(|(label, _)| label.as_str())
            .collect();
        labels.sort_unstable();
        labels
    }

    /// Labels that failed for any reason, missing identifiers included.
    pub fn failed(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.wave.failed_keys().into_iter().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    pub fn into_wave(self) -> WaveResult<String, QuoteRecord> {
        self.wave
    }
}

/// Fans one quote request per identifier out over a shared session.
pub struct QuoteFetcher<'a, S: Transport + ?Sized, E: TableExtractor> {
    transport: &'a S,
    extractor: &'a E,
    source: QuoteSource,
    as_of: NaiveDate,
}

impl<'a, S: Transport + ?Sized, E: TableExtractor> QuoteFetcher<'a, S, E> {
    pub fn new(transport: &'a S, extractor: &'a E, source: QuoteSource, as_of: NaiveDate) -> Self {
        QuoteFetcher {
            transport,
            extractor,
            source,
            as_of,
        }
    }

    /// `identifiers` maps a label (tenor or the raw CUSIP) to the CUSIP to quote.
    pub async fn fetch(&self, identifiers: &BTreeMap<String, String>) -> QuoteBook {
        let tasks = identifiers
            .iter()
            .map(|(label, cusip)| {
                let form = (self.source.payload)(cusip);
                FetchTask::new(label.clone(), FetchRequest::post_form(self.source.url.clone(), form))
            })
            .collect::<Vec<_>>();

        let wave = FetchOrchestrator::new(self.transport, self.source.name)
            .run(tasks, |label, body| {
                let cusip = identifiers.get(label).map(String::as_str).unwrap_or(label.as_str());
                let mut tables = self.extractor.extract(&body)?;
                let table = self.source.layout.take(&mut tables, QUOTES_TABLE)?;
                select_best_quote(&self.source, table, label, cusip, self.as_of)
            })
            .await;

        let book = QuoteBook { wave };
        let missing = book.missing();
        if !missing.is_empty() {
            warn!("[{}] identifiers not returned: {:?}", self.source.name, missing);
        }
        info!(
            "[{}] {} of {} quotes resolved",
            self.source.name,
            book.quotes().len(),
            book.len()
        );
        book
    }

    /// Quotes a plain list of CUSIPs, each labelled by itself.
    pub async fn fetch_cusips(&self, cusips: &[String]) -> QuoteBook {
        let identifiers = cusips.iter().map(|cusip| (cusip.clone(), cusip.clone())).collect();
        self.fetch(&identifiers).await
    }
}

/// Picks the row with the largest `best_column` value among the rows for `cusip`.
///
/// Rows are narrowed to the requested identifier only when the table carries an
/// identifier column; an identifier absent from such a table is an error. Ties keep
/// the earliest row.
pub fn select_best_quote(
    source: &QuoteSource,
    table: Table,
    label: &str,
    cusip: &str,
    as_of: NaiveDate,
) -> Result<QuoteRecord, FetchError> {
    let id_column = std::iter::once(source.id_column)
        .chain(source.id_aliases.iter().copied())
        .find(|column| table.column_index(column).is_some());

    let candidates: Vec<usize> = match id_column {
        Some(column) => {
            let index = table.column_index(column);
            let rows: Vec<usize> = (0..table.height())
                .filter(|row| {
                    index
                        .and_then(|i| table.rows[*row].get(i))
                        .is_some_and(|value| value.eq_ignore_ascii_case(cusip))
                })
                .collect();
            if rows.is_empty() {
                return Err(FetchError::IdentifierNotFound(cusip.to_string()));
            }
            rows
        }
        None => (0..table.height()).collect(),
    };

    let mut best: Option<(usize, f64)> = None;
    for row in candidates {
        let Some(value) = table.cell(row, source.best_column).and_then(parse_number) else {
            continue;
        };
        match best {
            Some((_, current)) if current >= value => {}
            _ => best = Some((row, value)),
        }
    }
    let (row, best_value) = best.ok_or_else(|| {
        FetchError::malformed(format!("no rows with a numeric '{}' for {}", source.best_column, cusip))
    })?;

    let mut fields = table.record(row).unwrap_or_default();
    if let Some(column) = id_column.filter(|column| *column != source.id_column) {
        if let Some(value) = fields.remove(column) {
            fields.insert(source.id_column.to_string(), value);
        }
    }
    let maturity = match fields.get(source.maturity_column) {
        Some(raw) => Some(NaiveDate::parse_from_str(raw.trim(), source.maturity_format).map_err(|_| {
            FetchError::malformed(format!("unreadable {} '{}' for {}", source.maturity_column, raw, cusip))
        })?),
        None => None,
    };
    let time_to_maturity = maturity.map(|date| (date - as_of).num_days() as f64 / 365.0);

    Ok(QuoteRecord {
        label: label.to_string(),
        cusip: fields
            .get(source.id_column)
            .cloned()
            .unwrap_or_else(|| cusip.to_string()),
        fields,
        best_value,
        maturity,
        time_to_maturity,
    })
}

/// One dated FedInvest price sheet, narrowed to the requested CUSIPs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceSheet {
    pub table: Table,
    /// Requested CUSIPs the sheet did not list.
    pub missing: Vec<String>,
}

pub fn fedinvest_payload(date: NaiveDate) -> Vec<(String, String)> {
    vec![
        ("priceDate.month".to_string(), date.month().to_string()),
        ("priceDate.day".to_string(), date.day().to_string()),
        ("priceDate.year".to_string(), date.year().to_string()),
        ("submit".to_string(), "Show Prices".to_string()),
    ]
}

/// End-of-day prices for each date. An empty `cusips` keeps every row.
pub async fn fetch_price_sheets<S, E>(
    transport: &S,
    extractor: &E,
    dates: &[NaiveDate],
    cusips: &[String],
) -> WaveResult<NaiveDate, PriceSheet>
where
    S: Transport + ?Sized,
    E: TableExtractor,
{
    fetch_price_sheets_from(transport, extractor, FEDINVEST_PRICES_URL, dates, cusips).await
}

pub async fn fetch_price_sheets_from<S, E>(
    transport: &S,
    extractor: &E,
    url: &str,
    dates: &[NaiveDate],
    cusips: &[String],
) -> WaveResult<NaiveDate, PriceSheet>
where
    S: Transport + ?Sized,
    E: TableExtractor,
{
    let layout = TableLayout::new(&[("prices", 0)]);
    let tasks = dates
        .iter()
        .map(|date| FetchTask::new(*date, FetchRequest::post_form(url, fedinvest_payload(*date))))
        .collect::<Vec<_>>();

    FetchOrchestrator::new(transport, "fedinvest")
        .run(tasks, |date, body| {
            let mut tables = extractor.extract(&body)?;
            let table = layout.take(&mut tables, "prices")?;
            narrow_price_sheet(table, *date, cusips)
        })
        .await
}

fn narrow_price_sheet(mut table: Table, date: NaiveDate, cusips: &[String]) -> Result<PriceSheet, FetchError> {
    if cusips.is_empty() {
        return Ok(PriceSheet {
            table,
            missing: Vec::new(),
        });
    }
    if table.column_index("CUSIP").is_none() {
        return Err(FetchError::malformed(format!("price sheet for {} has no CUSIP column", date)));
    }
    let listed: Vec<String> = table.column_values("CUSIP").map(str::to_string).collect();
    let missing: Vec<String> = cusips
        .iter()
        .filter(|cusip| !listed.iter().any(|listed| listed == *cusip))
        .cloned()
        .collect();
    if !missing.is_empty() {
        warn!("[fedinvest] {} sheet is missing {:?}", date, missing);
    }
    table.retain_rows("CUSIP", |value| cusips.iter().any(|cusip| cusip == value));
    Ok(PriceSheet { table, missing })
}
