// src/error.rs

use polars::prelude::PolarsError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single unit of concurrent work. Never escapes the wave it happened in.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
    #[error("table '{role}' (index {index}) not present, page has {found} tables")]
    MissingTable { role: String, index: usize, found: usize },
    #[error("{0} not present in returned table")]
    IdentifierNotFound(String),
    #[error("malformed content: {0}")]
    Malformed(String),
    #[error("invalid header {0}")]
    InvalidHeader(String),
}

impl FetchError {
    pub fn malformed(message: impl Into<String>) -> Self {
        FetchError::Malformed(message.into())
    }
}

/// Failures that abort the whole call rather than a single task.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("pagination probe failed, auction history is unknown: {0}")]
    ProbeFailed(FetchError),
    #[error("no candidate records to match against")]
    EmptyCandidates,
    #[error("auction history incomplete, failed pages: {failed_pages:?}")]
    IncompleteHistory { failed_pages: Vec<u64> },
    #[error("could not build session: {0}")]
    Session(FetchError),
}
