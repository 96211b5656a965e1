use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::{CourierError, Result};
use crate::fetcher::Fetcher;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_options(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_USER_AGENT)
    }

    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

fn fetch_error(url: &str, err: reqwest::Error) -> CourierError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if let Some(status) = err.status() {
        format!("HTTP status {}", status)
    } else {
        err.to_string()
    };

    CourierError::Fetch {
        url: url.to_string(),
        reason,
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(url, e))?;

        let response = response.error_for_status().map_err(|e| fetch_error(url, e))?;

        let body = response.bytes().await.map_err(|e| fetch_error(url, e))?;
        tracing::debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(body.to_vec())
    }
}
