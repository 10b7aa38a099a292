use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use gap_core::{Article, NewsProvider, ScanError};
use reqwest::{header, Client, Url};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://seeking-alpha.p.rapidapi.com";
pub const DEFAULT_PAGE_SIZE: u32 = 56;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

const API_KEY_HEADER: &str = "X-RapidAPI-Key";
const API_HOST_HEADER: &str = "X-RapidAPI-Host";

/// Seeking Alpha news client (RapidAPI gateway)
#[derive(Clone)]
pub struct SeekingAlphaClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl SeekingAlphaClient {
    /// Create a client with the default endpoint, page size and timeout
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_options(
            api_key,
            DEFAULT_BASE_URL,
            DEFAULT_PAGE_SIZE,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_options(
        api_key: &str,
        base_url: &str,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("news API key is empty"));
        }

        let base_url = base_url.trim_end_matches('/').to_string();
        let host = Url::parse(&base_url)
            .with_context(|| format!("invalid news API base URL: {}", base_url))?
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("news API base URL has no host: {}", base_url))?;

        let mut headers = header::HeaderMap::new();
        let mut key = header::HeaderValue::from_str(api_key)
            .context("API key contains invalid header characters")?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(
            API_HOST_HEADER,
            header::HeaderValue::from_str(&host)
                .context("API host contains invalid header characters")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            page_size,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the latest news for a symbol
    pub async fn get_news(&self, ticker: &str) -> Result<Vec<Article>, ScanError> {
        let url = format!("{}/news/v2/list-by-symbol", self.base_url);
        let query = [("size", self.page_size.to_string()), ("id", ticker.to_string())];
        tracing::debug!("Fetching news for {} from {}", ticker, url);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ScanError::lookup(ticker, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::lookup(
                ticker,
                format!(
                    "HTTP {}: {}",
                    status,
                    response.text().await.unwrap_or_default()
                ),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScanError::lookup(ticker, e.to_string()))?;

        parse_news_response(&body).map_err(|e| ScanError::lookup(ticker, e.to_string()))
    }
}

#[async_trait]
impl NewsProvider for SeekingAlphaClient {
    async fn fetch_articles(&self, ticker: &str) -> Result<Vec<Article>, ScanError> {
        self.get_news(ticker).await
    }
}

/// Decode a `list-by-symbol` body into articles, keeping the API's order
pub fn parse_news_response(body: &str) -> Result<Vec<Article>, serde_json::Error> {
    let response: NewsResponse = serde_json::from_str(body)?;

    Ok(response
        .data
        .into_iter()
        .map(|item| Article {
            published_at: item.attributes.publish_on.with_timezone(&Utc),
            headline: item.attributes.title,
        })
        .collect())
}

// Response structures
#[derive(Debug, Deserialize)]
struct NewsResponse {
    data: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    attributes: NewsAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsAttributes {
    publish_on: DateTime<FixedOffset>,
    title: String,
}
