// src/session.rs

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::{FetchError, ResolveError};

/// One addressable request of a wave.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchRequest {
    Get { url: String },
    PostForm { url: String, form: Vec<(String, String)> },
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        FetchRequest::Get { url: url.into() }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        FetchRequest::PostForm { url: url.into(), form }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchRequest::Get { url } | FetchRequest::PostForm { url, .. } => url,
        }
    }
}

/// Executes a request and hands back the raw body of a 2xx response.
///
/// Implementations are shared read-only across every task of a wave.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError>;

    /// Per-request timeout the orchestrator applies uniformly to a wave.
    fn timeout(&self) -> Duration;
}

/// A reqwest client with its headers, cookies and timeout frozen at construction.
///
/// Any login or cookie refresh has to produce a new session before the next wave;
/// there is no way to mutate one that tasks are already borrowing.
pub struct TreasurySession {
    label: String,
    client: Client,
    timeout: Duration,
}

impl TreasurySession {
    pub fn new(config: &SessionConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }
        if let Some(cookie) = config.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|_| FetchError::InvalidHeader(COOKIE.to_string()))?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(TreasurySession {
            label: config.label.clone(),
            client,
            timeout: config.timeout,
        })
    }

    /// Session from `SessionConfig::from_env`. A bad header or cookie is fatal to the caller.
    pub fn from_env(label: impl Into<String>) -> Result<Self, ResolveError> {
        TreasurySession::new(&SessionConfig::from_env(label)).map_err(ResolveError::Session)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn build(&self, request: &FetchRequest) -> RequestBuilder {
        match request {
            FetchRequest::Get { url } => self.client.get(url),
            FetchRequest::PostForm { url, form } => self.client.post(url).form(form),
        }
    }
}

#[async_trait]
impl Transport for TreasurySession {
    async fn execute(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        debug!("[{}] {}", self.label, request.url());
        let response = self.build(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: request.url().to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_header_values_with_newlines() {
        let config = SessionConfig::new("bad").with_header("X-Test", "a\nb");
        assert!(matches!(
            TreasurySession::new(&config),
            Err(FetchError::InvalidHeader(name)) if name == "X-Test"
        ));
    }

    #[test]
    fn bad_cookie_from_env_is_a_session_error() {
        std::env::set_var(crate::config::COOKIE_ENV, "token=a\nb");
        let result = TreasurySession::from_env("env");
        std::env::remove_var(crate::config::COOKIE_ENV);
        assert!(matches!(
            result,
            Err(ResolveError::Session(FetchError::InvalidHeader(name))) if name == "cookie"
        ));
        assert!(TreasurySession::from_env("env").is_ok());
    }

    #[test]
    fn builds_with_cookie_bundle() {
        let config = SessionConfig::browser("vendor").with_cookie("session", "abc");
        let session = TreasurySession::new(&config).unwrap();
        assert_eq!(session.label(), "vendor");
        assert_eq!(session.timeout(), config.timeout);
    }
}
