// src/delivery_basket.rs

use crate::config::CME_CURVE_WATCH_URL;
use crate::error::FetchError;
use crate::orchestrator::{FetchOrchestrator, FetchTask, WaveResult};
use crate::session::{FetchRequest, Transport};
use crate::table::{Table, TableExtractor, TableLayout};

const EVENT_TARGET_PREFIX: &str = "ctl00$MainContent$ucViewControl_IntegratedStrikeAsYield$ucTenorPicker$lvFutures";
const VIEWSTATE_GENERATOR: &str = "7E260167";

/// Treasury futures contracts on the curve-watch picker, in picker order.
pub const FUTURES_TENORS: [&str; 8] = [
    "2 Yr",
    "3 Yr",
    "5 Yr",
    "10 Yr",
    "Ultra 10 Yr",
    "T-Bond",
    "20 Yr",
    "Ultra T_Bond",
];

/// Cheapest-to-deliver, on-the-run and deliverable-basket tables for one contract.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliveryBasket {
    pub ctd: Table,
    pub otr: Table,
    /// Absent for contracts without listed options.
    pub strike_as_yield: Option<Table>,
    pub deliverables: Table,
}

/// Contracts without options drop the strike-as-yield grid and shift deliverables up.
pub fn basket_layout(tenor: &str) -> TableLayout {
    if has_options(tenor) {
        TableLayout::new(&[("ctd", 1), ("otr", 2), ("strike_as_yield", 3), ("deliverables", 4)])
    } else {
        TableLayout::new(&[("ctd", 1), ("otr", 2), ("deliverables", 3)])
    }
}

pub fn has_options(tenor: &str) -> bool {
    !matches!(tenor, "3 Yr" | "20 Yr")
}

pub fn event_target(tenor: &str) -> Option<String> {
    FUTURES_TENORS
        .iter()
        .position(|candidate| *candidate == tenor)
        .map(|slot| format!("{}$ctrl{}$lbTenor", EVENT_TARGET_PREFIX, slot))
}

pub fn basket_payload(event_target: &str) -> Vec<(String, String)> {
    vec![
        ("aac_nid".to_string(), "2905".to_string()),
        ("ctl00$smPublic".to_string(), format!("ctl00$upMain|{}", event_target)),
        ("__EVENTTARGET".to_string(), event_target.to_string()),
        ("__VIEWSTATEGENERATOR".to_string(), VIEWSTATE_GENERATOR.to_string()),
        ("__ASYNCPOST".to_string(), "true".to_string()),
    ]
}

pub fn parse_basket(tenor: &str, mut tables: Vec<Table>) -> Result<DeliveryBasket, FetchError> {
    let layout = basket_layout(tenor);
    let ctd = layout.take(&mut tables, "ctd")?.promote_first_row();
    let otr = layout.take(&mut tables, "otr")?.promote_first_row();
    let strike_as_yield = if layout.has("strike_as_yield") {
        Some(layout.take(&mut tables, "strike_as_yield")?)
    } else {
        None
    };
    let deliverables = layout.take(&mut tables, "deliverables")?;
    Ok(DeliveryBasket {
        ctd,
        otr,
        strike_as_yield,
        deliverables,
    })
}

/// One request per futures tenor. Unknown tenors are skipped.
pub async fn fetch_delivery_baskets<S, E>(
    transport: &S,
    extractor: &E,
    tenors: &[&str],
) -> WaveResult<String, DeliveryBasket>
where
    S: Transport + ?Sized,
    E: TableExtractor,
{
    fetch_delivery_baskets_from(transport, extractor, CME_CURVE_WATCH_URL, tenors).await
}

pub async fn fetch_delivery_baskets_from<S, E>(
    transport: &S,
    extractor: &E,
    url: &str,
    tenors: &[&str],
) -> WaveResult<String, DeliveryBasket>
where
    S: Transport + ?Sized,
    E: TableExtractor,
{
    let tasks = tenors
        .iter()
        .filter_map(|tenor| {
            event_target(tenor).map(|target| {
                FetchTask::new(tenor.to_string(), FetchRequest::post_form(url, basket_payload(&target)))
            })
        })
        .collect::<Vec<_>>();

    FetchOrchestrator::new(transport, "cme")
        .run(tasks, |tenor, body| parse_basket(tenor, extractor.extract(&body)?))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_targets_follow_picker_slots() {
        assert_eq!(
            event_target("Ultra 10 Yr").unwrap(),
            "ctl00$MainContent$ucViewControl_IntegratedStrikeAsYield$ucTenorPicker$lvFutures$ctrl4$lbTenor"
        );
        assert!(event_target("40 Yr").is_none());
    }

    #[test]
    fn optionless_contracts_shift_deliverables() {
        assert_eq!(basket_layout("20 Yr").index_of("deliverables"), Some(3));
        assert_eq!(basket_layout("10 Yr").index_of("deliverables"), Some(4));
        assert!(!basket_layout("3 Yr").has("strike_as_yield"));
    }
}
