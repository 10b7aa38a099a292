use async_trait::async_trait;
use crate::{Article, ScanError};

/// Source of recent headlines for a ticker.
///
/// Any error is treated by the pipeline as "skip this candidate", so
/// implementations should not retry internally.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_articles(&self, ticker: &str) -> Result<Vec<Article>, ScanError>;
}
