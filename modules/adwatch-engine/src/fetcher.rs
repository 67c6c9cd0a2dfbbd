use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Max concurrent page fetches across the analysis batch and the
/// extraction cascade.
const MAX_CONCURRENT_FETCHES: usize = 4;

// --- PageFetcher trait ---

/// Fetches landing pages. `fetch_text` returns Readability-extracted main
/// content for the compliance judge; `fetch_html` returns the raw document
/// (scripts included) for the extraction cascade. `None` means the page
/// yielded nothing usable — absence, not an error.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>>;
    async fn fetch_html(&self, url: &str) -> Result<Option<String>>;
    fn name(&self) -> &str;
}

fn readability_text(url: &str, html: &[u8]) -> Option<String> {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html,
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    let text = transform_content_input(input, &config);
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

// --- Plain HTTP fetcher ---

/// reqwest-based fetcher. Follows redirects (reqwest default, up to 10 hops).
/// Sufficient for landing pages that render server-side.
pub struct HttpFetcher {
    client: reqwest::Client,
    semaphore: Semaphore,
}

impl HttpFetcher {
    pub fn new() -> Self {
        info!("Using HttpFetcher (max_concurrent={MAX_CONCURRENT_FETCHES})");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; adwatch/0.1)")
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            semaphore: Semaphore::new(MAX_CONCURRENT_FETCHES),
        }
    }

    async fn get(&self, url: &str) -> Result<Option<String>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("Fetch semaphore closed"))?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Landing page request failed")?;

        if !resp.status().is_success() {
            warn!(url, status = %resp.status(), "Landing page returned error status");
            return Ok(None);
        }

        let html = resp.text().await.context("Failed to read response body")?;
        if html.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(html))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>> {
        let Some(html) = self.get(url).await? else {
            return Ok(None);
        };
        Ok(readability_text(url, html.as_bytes()))
    }

    async fn fetch_html(&self, url: &str) -> Result<Option<String>> {
        self.get(url).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

// --- Browserless fetcher ---

/// Headless-browser fetcher for JS-rendered landing pages.
pub struct BrowserlessFetcher {
    client: browserless_client::BrowserlessClient,
    semaphore: Semaphore,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        info!(base_url, "Using BrowserlessFetcher");
        Self {
            client: browserless_client::BrowserlessClient::new(base_url, token),
            semaphore: Semaphore::new(MAX_CONCURRENT_FETCHES),
        }
    }

    async fn content(&self, url: &str) -> Result<Option<String>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("Fetch semaphore closed"))?;

        let html = self
            .client
            .content(url)
            .await
            .context("Browserless content request failed")?;

        if html.trim().is_empty() {
            warn!(url, fetcher = "browserless", "Empty HTML response");
            return Ok(None);
        }
        Ok(Some(html))
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>> {
        let Some(html) = self.content(url).await? else {
            return Ok(None);
        };
        Ok(readability_text(url, html.as_bytes()))
    }

    async fn fetch_html(&self, url: &str) -> Result<Option<String>> {
        self.content(url).await
    }

    fn name(&self) -> &str {
        "browserless"
    }
}
