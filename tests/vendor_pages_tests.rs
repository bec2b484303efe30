// tests/vendor_pages_tests.rs
mod common;

use common::{Canned, MockTransport};
use ustextract::delivery_basket::{event_target, fetch_delivery_baskets_from};
use ustextract::factsheet::{factsheet_url, fetch_factsheets_from};
use ustextract::par_yields::{curve_url, fetch_curves_from, frames_by_kind, CurveKind};
use ustextract::{FetchError, HtmlTableExtractor, TaskOutcome};

const CME_URL: &str = "https://mock/curve-watch";

fn basket_page(with_options: bool) -> Vec<u8> {
    let picker = "<table><tr><td>2 Yr</td><td>5 Yr</td></tr></table>";
    let ctd = "<table><tr><td>CUSIP</td><td>Coupon</td><td>Maturity</td></tr>\
               <tr><td>91282CKN0</td><td>4.625</td><td>04/30/2031</td></tr></table>";
    let otr = "<table><tr><td>CUSIP</td><td>Coupon</td></tr><tr><td>91282CKQ3</td><td>4.375</td></tr></table>";
    let strikes = "<table><tr><th>Strike</th><th>Yield</th></tr><tr><td>110</td><td>4.41</td></tr></table>";
    let deliverables = "<table><tr><th>CUSIP</th><th>Conversion Factor</th></tr>\
                        <tr><td>91282CKN0</td><td>0.8312</td></tr>\
                        <tr><td>91282CJZ5</td><td>0.8105</td></tr></table>";
    let strikes = if with_options { strikes } else { "" };
    format!("<div>{}{}{}{}{}</div>", picker, ctd, otr, strikes, deliverables).into_bytes()
}

#[tokio::test]
async fn baskets_follow_each_contracts_layout() {
    let transport = MockTransport::new()
        .on_form(CME_URL, "__EVENTTARGET", &event_target("10 Yr").unwrap(), Canned::Body(basket_page(true)))
        .on_form(CME_URL, "__EVENTTARGET", &event_target("20 Yr").unwrap(), Canned::Body(basket_page(false)))
        .on_form(CME_URL, "__EVENTTARGET", &event_target("5 Yr").unwrap(), Canned::Status(500));

    let wave = fetch_delivery_baskets_from(
        &transport,
        &HtmlTableExtractor,
        CME_URL,
        &["10 Yr", "20 Yr", "5 Yr", "40 Yr"],
    )
    .await;

    // unknown contracts never become tasks
    assert_eq!(wave.len(), 3);
    assert_eq!(transport.calls().len(), 3);
    assert_eq!(wave.failed_keys(), vec![&"5 Yr".to_string()]);

    let ten = wave.get(&"10 Yr".to_string()).and_then(TaskOutcome::as_done).unwrap();
    assert_eq!(ten.ctd.columns, vec!["CUSIP", "Coupon", "Maturity"]);
    assert_eq!(ten.ctd.cell(0, "CUSIP"), Some("91282CKN0"));
    assert_eq!(ten.otr.cell(0, "CUSIP"), Some("91282CKQ3"));
    assert_eq!(ten.strike_as_yield.as_ref().map(|t| t.height()), Some(1));
    assert_eq!(ten.deliverables.height(), 2);

    let twenty = wave.get(&"20 Yr".to_string()).and_then(TaskOutcome::as_done).unwrap();
    assert!(twenty.strike_as_yield.is_none());
    assert_eq!(twenty.deliverables.cell(1, "Conversion Factor"), Some("0.8105"));
}

#[tokio::test]
async fn short_basket_page_is_a_missing_table() {
    let transport = MockTransport::new().on_form(
        CME_URL,
        "__EVENTTARGET",
        &event_target("2 Yr").unwrap(),
        Canned::Body(basket_page(false)),
    );
    let wave = fetch_delivery_baskets_from(&transport, &HtmlTableExtractor, CME_URL, &["2 Yr"]).await;
    assert!(matches!(
        wave.get(&"2 Yr".to_string()).and_then(TaskOutcome::error),
        Some(FetchError::MissingTable { index: 4, found: 4, .. })
    ));
}

#[tokio::test]
async fn factsheet_histories_per_cusip() {
    let base = "https://mock/factsheet";
    let chart = br#"{
        "yieldChartMap": {"SINCE_INCEPTION": [
            {"data": [[1717113600000, 4.50], [1717200000000, 4.46]]},
            {"data": [[1717113600000, 4.48], [1717200000000, 4.44]]}
        ]},
        "priceChartMap": {"SINCE_INCEPTION": [
            {"data": [[1717113600000, 99.1], [1717200000000, 99.4]]},
            {"data": [[1717113600000, 99.3], [1717200000000, 99.6]]}
        ]}
    }"#;
    let transport = MockTransport::new()
        .on_get(&factsheet_url(base, "91282CKQ3"), Canned::Body(chart.to_vec()))
        .on_get(&factsheet_url(base, "912810TZ1"), Canned::Body(b"not json".to_vec()));

    let wave = fetch_factsheets_from(&transport, base, &["91282CKQ3".to_string(), "912810TZ1".to_string()]).await;

    let points = wave.get(&"91282CKQ3".to_string()).and_then(TaskOutcome::as_done).unwrap();
    assert_eq!(points.len(), 2);
    assert!((points[1].yield_mid() - 4.45).abs() < 1e-9);
    assert!((points[0].price_mid() - 99.2).abs() < 1e-9);
    assert!(matches!(
        wave.get(&"912810TZ1".to_string()).and_then(TaskOutcome::error),
        Some(FetchError::Json(_))
    ));
}

#[tokio::test]
async fn curve_frames_group_by_kind_in_year_order() {
    let base = "https://mock/yields";
    let csv = |date: &str, value: &str| format!("Date,1 Mo,10 Yr\n{},5.5,{}\n", date, value).into_bytes();
    let transport = MockTransport::new()
        .on_get(&curve_url(base, CurveKind::ParYield, 2023), Canned::Body(csv("12/29/2023", "3.88")))
        .on_get(&curve_url(base, CurveKind::ParYield, 2024), Canned::Body(csv("05/31/2024", "4.51")))
        .on_get(&curve_url(base, CurveKind::BillRates, 2024), Canned::Body(b"Date,4 WEEKS BANK DISCOUNT\n".to_vec()))
        .on_get(&curve_url(base, CurveKind::BillRates, 2023), Canned::Status(404));

    let years = [2024, 2023];
    let wave = fetch_curves_from(&transport, base, &[CurveKind::ParYield, CurveKind::BillRates], &years).await;
    assert_eq!(wave.len(), 4);

    let grouped = frames_by_kind(wave, &years);
    let par = grouped.get(&CurveKind::ParYield).unwrap();
    assert_eq!(par.iter().map(|(year, _)| *year).collect::<Vec<_>>(), vec![2024, 2023]);
    let dates = par[1].1.column("Date").unwrap().str().unwrap();
    assert_eq!(dates.get(0), Some("2023-12-29"));
    // header-only and failed years drop out
    assert!(!grouped.contains_key(&CurveKind::BillRates));
}
