// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use ustextract::{AuctionRecord, FetchError, FetchRequest, SecurityType, Transport};

pub enum Canned {
    Body(Vec<u8>),
    Status(u16),
    Delayed(Duration, Vec<u8>),
}

type Matcher = Box<dyn Fn(&FetchRequest) -> bool + Send + Sync>;

/// Serves canned responses to whichever route matches first; anything else is a 404.
pub struct MockTransport {
    routes: Vec<(Matcher, Canned)>,
    timeout: Duration,
    calls: Mutex<Vec<FetchRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            routes: Vec::new(),
            timeout: Duration::from_secs(2),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_get(mut self, url: &str, canned: Canned) -> Self {
        let url = url.to_string();
        self.routes.push((
            Box::new(move |request: &FetchRequest| matches!(request, FetchRequest::Get { url: u } if *u == url)),
            canned,
        ));
        self
    }

    /// Matches a form post to `url` carrying `key=value`.
    pub fn on_form(mut self, url: &str, key: &str, value: &str, canned: Canned) -> Self {
        let (url, key, value) = (url.to_string(), key.to_string(), value.to_string());
        self.routes.push((
            Box::new(move |request: &FetchRequest| match request {
                FetchRequest::PostForm { url: u, form } => {
                    *u == url && form.iter().any(|(k, v)| *k == key && *v == value)
                }
                _ => false,
            }),
            canned,
        ));
        self
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        let canned = self.routes.iter().find(|(matches, _)| matches(request)).map(|(_, canned)| canned);
        match canned {
            Some(Canned::Body(body)) => Ok(body.clone()),
            Some(Canned::Delayed(delay, body)) => {
                sleep(*delay).await;
                Ok(body.clone())
            }
            Some(Canned::Status(status)) => Err(FetchError::Status {
                status: *status,
                url: request.url().to_string(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                url: request.url().to_string(),
            }),
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn record(
    cusip: &str,
    security_type: SecurityType,
    term: &str,
    auction: NaiveDate,
    issue: NaiveDate,
    maturity: NaiveDate,
) -> AuctionRecord {
    AuctionRecord {
        cusip: cusip.to_string(),
        security_type,
        original_security_term: term.to_string(),
        security_term_week_year: term.to_string(),
        auction_date: auction,
        issue_date: issue,
        maturity_date: maturity,
    }
}

/// A note/bond/bill issued on `issue`, auctioned three days earlier.
pub fn issue(cusip: &str, security_type: SecurityType, term: &str, issue: NaiveDate, maturity: NaiveDate) -> AuctionRecord {
    record(cusip, security_type, term, issue - chrono::Duration::days(3), issue, maturity)
}
