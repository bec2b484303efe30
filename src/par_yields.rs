// src/par_yields.rs

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::config::PAR_YIELDS_URL;
use crate::error::FetchError;
use crate::orchestrator::{FetchOrchestrator, FetchTask, TaskOutcome, WaveResult};
use crate::session::{FetchRequest, Transport};

/// Daily curve datasets published per calendar year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurveKind {
    ParYield,
    RealParYield,
    BillRates,
    LongTermRate,
    RealLongTerm,
}

impl CurveKind {
    pub const ALL: [CurveKind; 5] = [
        CurveKind::ParYield,
        CurveKind::RealParYield,
        CurveKind::BillRates,
        CurveKind::LongTermRate,
        CurveKind::RealLongTerm,
    ];

    pub fn type_param(self) -> &'static str {
        match self {
            CurveKind::ParYield => "daily_treasury_yield_curve",
            CurveKind::RealParYield => "daily_treasury_real_yield_curve",
            CurveKind::BillRates => "daily_treasury_bill_rates",
            CurveKind::LongTermRate => "daily_treasury_long_term_rate",
            CurveKind::RealLongTerm => "daily_treasury_real_long_term",
        }
    }
}

pub fn curve_url(base_url: &str, kind: CurveKind, year: i32) -> String {
    format!(
        "{}/{}/all?type={}&field_tdr_date_value={}&page&_format=csv",
        base_url,
        year,
        kind.type_param(),
        year
    )
}

/// Reads a curve CSV and rewrites its `Date` column from `%m/%d/%Y` to `%Y-%m-%d`.
pub fn parse_curve_csv(body: Vec<u8>) -> Result<DataFrame, FetchError> {
    let mut df = CsvReader::new(Cursor::new(body)).has_header(true).finish()?;
    if df.get_column_names().contains(&"Date") {
        let dates: Vec<Option<String>> = df
            .column("Date")?
            .str()?
            .into_iter()
            .map(|raw| {
                raw.map(|raw| {
                    NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y")
                        .map(|date| date.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|_| raw.to_string())
                })
            })
            .collect();
        df.replace("Date", Series::new("Date", dates))?;
    }
    Ok(df)
}

/// One request per (kind, year).
pub async fn fetch_curves<S: Transport + ?Sized>(
    transport: &S,
    kinds: &[CurveKind],
    years: &[i32],
) -> WaveResult<(CurveKind, i32), DataFrame> {
    fetch_curves_from(transport, PAR_YIELDS_URL, kinds, years).await
}

pub async fn fetch_curves_from<S: Transport + ?Sized>(
    transport: &S,
    base_url: &str,
    kinds: &[CurveKind],
    years: &[i32],
) -> WaveResult<(CurveKind, i32), DataFrame> {
    let tasks = years
        .iter()
        .flat_map(|year| {
            kinds.iter().map(move |kind| {
                FetchTask::new((*kind, *year), FetchRequest::get(curve_url(base_url, *kind, *year)))
            })
        })
        .collect::<Vec<_>>();
    FetchOrchestrator::new(transport, "par-yields")
        .run(tasks, |_, body| parse_curve_csv(body))
        .await
}

/// Frames grouped by kind, ordered as `years` was given. Failed and empty years are left out.
pub fn frames_by_kind(
    wave: WaveResult<(CurveKind, i32), DataFrame>,
    years: &[i32],
) -> BTreeMap<CurveKind, Vec<(i32, DataFrame)>> {
    let mut outcomes = wave.into_outcomes();
    let mut grouped: BTreeMap<CurveKind, Vec<(i32, DataFrame)>> = BTreeMap::new();
    for kind in CurveKind::ALL {
        for year in years {
            if let Some(TaskOutcome::Done(df)) = outcomes.remove(&(kind, *year)) {
                if df.height() > 0 {
                    grouped.entry(kind).or_default().push((*year, df));
                }
            }
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_urls_carry_year_twice() {
        assert_eq!(
            curve_url("https://t", CurveKind::BillRates, 2024),
            "https://t/2024/all?type=daily_treasury_bill_rates&field_tdr_date_value=2024&page&_format=csv"
        );
    }

    #[test]
    fn csv_dates_are_normalized() {
        let body = b"Date,1 Mo,10 Yr\n05/31/2024,5.46,4.51\n05/30/2024,5.47,4.55\n".to_vec();
        let df = parse_curve_csv(body).unwrap();
        assert_eq!(df.height(), 2);
        let dates = df.column("Date").unwrap().str().unwrap();
        assert_eq!(dates.get(0), Some("2024-05-31"));
        let ten = df.column("10 Yr").unwrap().f64().unwrap();
        assert_eq!(ten.get(1), Some(4.55));
    }
}
