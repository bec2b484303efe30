// src/lib.rs

pub mod config;
pub mod error;
pub mod session;
pub mod table;
pub mod orchestrator;
pub mod pagination;
pub mod auction;
pub mod auction_history;
pub mod tenor;
pub mod on_off_the_run;
pub mod nearest;
pub mod quotes;
pub mod delivery_basket;
pub mod factsheet;
pub mod par_yields;
pub mod search_set;

pub use config::SessionConfig;
pub use error::{FetchError, ResolveError};
pub use session::{FetchRequest, Transport, TreasurySession};
pub use table::{HtmlTableExtractor, Table, TableExtractor, TableLayout};
pub use orchestrator::{FetchOrchestrator, FetchTask, TaskOutcome, WaveResult};
pub use pagination::PaginationSizer;
pub use auction::{AuctionRecord, DateField, SecurityType};
pub use auction_history::{AuctionHistory, AuctionHistoryResolver};
pub use tenor::{Tenor, TenorMapping};
pub use on_off_the_run::{OnOffTheRunResolver, ResolvedIdentifierSet, TermLadder};
pub use nearest::{NearestTenorMatcher, TenorMatch};
pub use quotes::{QuoteBook, QuoteFetcher, QuoteRecord, QuoteSource};

/// Today's date on the US Treasury market's clock.
pub fn market_today() -> chrono::NaiveDate {
    chrono::Utc::now().with_timezone(&chrono_tz::US::Eastern).date_naive()
}
