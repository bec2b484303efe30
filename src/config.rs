// src/config.rs

use std::env;
use std::time::Duration;

pub const AUCTIONS_QUERY_URL: &str =
    "https://api.fiscaldata.treasury.gov/services/api/fiscal_service/v1/accounting/od/auctions_query";
pub const ON_THE_RUN_URL: &str = "https://treasurydirect.gov/TA_WS/securities/auctioned";
pub const FEDINVEST_PRICES_URL: &str = "https://savingsbonds.gov/GA-FI/FedInvest/selectSecurityPriceDate";
pub const CUSIP_SEARCH_URL: &str =
    "https://client.schwab.com/Areas/Trade/FixedIncomeSearch/FISearch.aspx/CusipSearch";
pub const CME_CURVE_WATCH_URL: &str = "https://cmegroup-tools.quikstrike.net/User/QuikStrikeView.aspx?viewitemid=IntegratedStrikeAsYield&tabid=CurveWatch&insid=126856832&qsid=4239e622-9037-467c-bd40-1733ccafafd3";
pub const FACTSHEET_URL: &str = "https://www.bondsupermart.com/main/ws/v3/bond-info/bond-factsheet-chart";
pub const PAR_YIELDS_URL: &str =
    "https://home.treasury.gov/resource-center/data-chart-center/interest-rates/daily-treasury-rates.csv";

/// Largest page the fiscal data API will serve in one request.
pub const MAX_PAGE_SIZE: u64 = 10_000;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub const TIMEOUT_ENV: &str = "UST_REQUEST_TIMEOUT_SECS";
pub const COOKIE_ENV: &str = "UST_SESSION_COOKIE";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

/// Headers shared by every request of a wave. Captured once when the session is built.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub label: String,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
}

impl SessionConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            headers: Vec::new(),
            cookies: Vec::new(),
        }
    }

    /// Navigation headers the vendor HTML endpoints expect from a desktop browser.
    pub fn browser(label: impl Into<String>) -> Self {
        Self::new(label)
            .with_header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            )
            .with_header("Accept-Language", "en-US,en;q=0.9")
            .with_header("Cache-Control", "max-age=0")
            .with_header("Dnt", "1")
            .with_header("Upgrade-Insecure-Requests", "1")
            .with_header("User-Agent", BROWSER_USER_AGENT)
    }

    /// Reads the timeout and cookie bundle overrides from the environment.
    pub fn from_env(label: impl Into<String>) -> Self {
        let mut config = Self::browser(label);
        if let Some(secs) = env::var(TIMEOUT_ENV).ok().and_then(|raw| raw.trim().parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(bundle) = env::var(COOKIE_ENV) {
            config = config.with_cookie_bundle(&bundle);
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Accepts a `name=value; name2=value2` bundle as handed over by a login flow.
    pub fn with_cookie_bundle(mut self, bundle: &str) -> Self {
        for pair in bundle.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    self.cookies.push((name.to_string(), value.trim().to_string()));
                }
            }
        }
        self
    }

    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
