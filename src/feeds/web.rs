//! Pull feed: fixed web endpoints polled for text.
//!
//! Each endpoint is fetched with a short timeout. A failing endpoint is
//! skipped for the cycle; the others are still read.

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub struct WebPoller {
    http: Client,
    urls: Vec<String>,
}

impl WebPoller {
    pub fn new(urls: Vec<String>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("tidewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build web feed HTTP client")?;
        Ok(Self { http, urls })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        resp.text().await.with_context(|| format!("Reading body of {url}"))
    }

    /// Fetch every endpoint concurrently; returns the bodies that arrived.
    pub async fn poll(&self) -> Vec<String> {
        let fetches = self.urls.iter().map(|url| async move {
            match self.fetch(url).await {
                Ok(body) => Some(body),
                Err(e) => {
                    debug!(url = %url, error = %e, "Web endpoint skipped");
                    None
                }
            }
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }
}
