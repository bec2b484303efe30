// src/factsheet.rs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::config::FACTSHEET_URL;
use crate::error::FetchError;
use crate::orchestrator::{FetchOrchestrator, FetchTask, WaveResult};
use crate::session::{FetchRequest, Transport};

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(rename = "yieldChartMap")]
    yield_chart: ChartMap,
    #[serde(rename = "priceChartMap")]
    price_chart: ChartMap,
}

#[derive(Debug, Deserialize)]
struct ChartMap {
    #[serde(rename = "SINCE_INCEPTION", default)]
    since_inception: Vec<ChartSeries>,
}

#[derive(Debug, Deserialize)]
struct ChartSeries {
    #[serde(default)]
    data: Vec<(i64, Option<f64>)>,
}

/// One observation of a bond's bid/ask history.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FactsheetPoint {
    pub timestamp: DateTime<Utc>,
    pub yield_bid: f64,
    pub yield_ask: f64,
    pub price_bid: f64,
    pub price_ask: f64,
}

impl FactsheetPoint {
    pub fn yield_mid(&self) -> f64 {
        (self.yield_ask + self.yield_bid) / 2.0
    }

    pub fn price_mid(&self) -> f64 {
        (self.price_ask + self.price_bid) / 2.0
    }
}

pub fn factsheet_url(base_url: &str, cusip: &str) -> String {
    format!("{}/US{}", base_url, cusip)
}

/// Merges the four bid/ask legs on their timestamps. A leg with no observation at a
/// timestamp contributes zero.
pub fn parse_factsheet(body: &[u8]) -> Result<Vec<FactsheetPoint>, FetchError> {
    let chart: ChartBody = serde_json::from_slice(body)?;
    let mut merged: BTreeMap<i64, FactsheetPoint> = BTreeMap::new();

    let legs: [(&ChartMap, usize, fn(&mut FactsheetPoint, f64)); 4] = [
        (&chart.yield_chart, 0, |point, value| point.yield_bid += value),
        (&chart.yield_chart, 1, |point, value| point.yield_ask += value),
        (&chart.price_chart, 0, |point, value| point.price_bid += value),
        (&chart.price_chart, 1, |point, value| point.price_ask += value),
    ];
    for (map, leg, apply) in legs {
        let series = map
            .since_inception
            .get(leg)
            .ok_or_else(|| FetchError::malformed(format!("chart is missing series {}", leg)))?;
        for (epoch_ms, value) in &series.data {
            let timestamp = DateTime::<Utc>::from_timestamp_millis(*epoch_ms)
                .ok_or_else(|| FetchError::malformed(format!("bad timestamp {}", epoch_ms)))?;
            let point = merged.entry(*epoch_ms).or_insert_with(|| FactsheetPoint {
                timestamp,
                ..FactsheetPoint::default()
            });
            apply(point, value.unwrap_or(0.0));
        }
    }
    Ok(merged.into_values().collect())
}

/// Full history for each CUSIP, one request apiece.
pub async fn fetch_factsheets<S: Transport + ?Sized>(
    transport: &S,
    cusips: &[String],
) -> WaveResult<String, Vec<FactsheetPoint>> {
    fetch_factsheets_from(transport, FACTSHEET_URL, cusips).await
}

pub async fn fetch_factsheets_from<S: Transport + ?Sized>(
    transport: &S,
    base_url: &str,
    cusips: &[String],
) -> WaveResult<String, Vec<FactsheetPoint>> {
    let tasks = cusips
        .iter()
        .map(|cusip| FetchTask::new(cusip.clone(), FetchRequest::get(factsheet_url(base_url, cusip))))
        .collect::<Vec<_>>();
    FetchOrchestrator::new(transport, "factsheet")
        .run(tasks, |_, body| parse_factsheet(&body))
        .await
}
