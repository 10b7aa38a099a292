use futures_util::stream::{self, StreamExt};
use gap_core::{NewsProvider, Selection, StockCandidate};
use gap_risk_calculator::GapRiskCalculator;
use std::sync::Arc;
use tracing::{info, warn};

/// Minimum absolute gap (10%) for a stock to be planned
pub const DEFAULT_GAP_THRESHOLD: f64 = 0.10;

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Candidates handed to the pipeline
    pub received: usize,

    /// Dropped by the gap filter
    pub filtered_out: usize,

    /// Selections produced
    pub emitted: usize,

    /// Dropped because the plan could not be priced or the news lookup failed
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub selections: Vec<Selection>,
    pub report: PipelineReport,
}

/// Filters gapping stocks, plans each trade and attaches recent news.
///
/// Output order always follows input order, whatever the concurrency.
pub struct EnrichmentPipeline {
    calculator: GapRiskCalculator,
    news: Arc<dyn NewsProvider>,
    gap_threshold: f64,
    concurrency: usize,
}

impl EnrichmentPipeline {
    pub fn new(calculator: GapRiskCalculator, news: Arc<dyn NewsProvider>) -> Self {
        Self {
            calculator,
            news,
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            concurrency: 1,
        }
    }

    pub fn with_gap_threshold(mut self, gap_threshold: f64) -> Self {
        self.gap_threshold = gap_threshold;
        self
    }

    /// Number of news lookups allowed in flight. 1 means fully sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// A gap exactly at the threshold is kept.
    pub fn passes_filter(&self, candidate: &StockCandidate) -> bool {
        candidate.gap_percent.abs() >= self.gap_threshold
    }

    pub fn filter_candidates(&self, candidates: Vec<StockCandidate>) -> Vec<StockCandidate> {
        candidates
            .into_iter()
            .filter(|c| self.passes_filter(c))
            .collect()
    }

    /// Plan and enrich one candidate. `None` when it cannot be priced or
    /// its news lookup fails.
    pub async fn process(&self, candidate: &StockCandidate) -> Option<Selection> {
        let position = match self
            .calculator
            .calculate(candidate.gap_percent, candidate.opening_price)
        {
            Ok(position) => position,
            Err(e) => {
                warn!(ticker = %candidate.ticker, "Skipping candidate: {}", e);
                return None;
            }
        };

        match self.news.fetch_articles(&candidate.ticker).await {
            Ok(articles) => {
                info!("Found {} articles about {}", articles.len(), candidate.ticker);
                Some(Selection {
                    ticker: candidate.ticker.clone(),
                    position,
                    articles,
                })
            }
            Err(e) => {
                warn!(ticker = %candidate.ticker, "Skipping candidate: {}", e);
                None
            }
        }
    }

    pub async fn run(&self, candidates: Vec<StockCandidate>) -> PipelineOutcome {
        let received = candidates.len();
        let survivors = self.filter_candidates(candidates);
        let filtered_out = received - survivors.len();

        info!(
            "{} of {} candidates gap at least {:.0}%",
            survivors.len(),
            received,
            self.gap_threshold * 100.0
        );

        // `buffered` yields in submission order, so completion order never
        // leaks into the output.
        let results: Vec<Option<Selection>> = stream::iter(survivors.iter())
            .map(|candidate| self.process(candidate))
            .buffered(self.concurrency)
            .collect()
            .await;

        let selections: Vec<Selection> = results.into_iter().flatten().collect();
        let emitted = selections.len();

        PipelineOutcome {
            selections,
            report: PipelineReport {
                received,
                filtered_out,
                emitted,
                skipped: survivors.len() - emitted,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use gap_core::{Article, ScanError};
    use gap_risk_calculator::RiskParameters;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory news source with per-ticker failures and delays
    #[derive(Default)]
    struct StubNews {
        articles: HashMap<String, Vec<Article>>,
        failing: HashSet<String>,
        delays_ms: HashMap<String, u64>,
        calls: Mutex<Vec<String>>,
    }

    impl StubNews {
        fn with_article(mut self, ticker: &str, headline: &str) -> Self {
            self.articles
                .entry(ticker.to_string())
                .or_default()
                .push(Article {
                    published_at: Utc.with_ymd_and_hms(2024, 1, 5, 13, 30, 0).unwrap(),
                    headline: headline.to_string(),
                });
            self
        }

        fn failing_for(mut self, ticker: &str) -> Self {
            self.failing.insert(ticker.to_string());
            self
        }

        fn delayed(mut self, ticker: &str, ms: u64) -> Self {
            self.delays_ms.insert(ticker.to_string(), ms);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NewsProvider for StubNews {
        async fn fetch_articles(&self, ticker: &str) -> Result<Vec<Article>, ScanError> {
            self.calls.lock().unwrap().push(ticker.to_string());
            if let Some(ms) = self.delays_ms.get(ticker) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.failing.contains(ticker) {
                return Err(ScanError::lookup(ticker, "HTTP 503 Service Unavailable"));
            }
            Ok(self.articles.get(ticker).cloned().unwrap_or_default())
        }
    }

    fn candidate(ticker: &str, gap: f64, price: f64) -> StockCandidate {
        StockCandidate::new(ticker, gap, price).unwrap()
    }

    fn pipeline(news: Arc<StubNews>) -> EnrichmentPipeline {
        EnrichmentPipeline::new(GapRiskCalculator::new(RiskParameters::default()), news)
    }

    fn tickers(selections: &[Selection]) -> Vec<&str> {
        selections.iter().map(|s| s.ticker.as_str()).collect()
    }

    #[test]
    fn test_filter_boundary_keeps_exact_threshold() {
        let p = pipeline(Arc::new(StubNews::default()));

        assert!(p.passes_filter(&candidate("UP", 0.10, 10.0)));
        assert!(p.passes_filter(&candidate("DOWN", -0.10, 10.0)));
        assert!(!p.passes_filter(&candidate("NEAR", 0.0999, 10.0)));
        assert!(!p.passes_filter(&candidate("FLAT", 0.0, 10.0)));
    }

    #[test]
    fn test_filter_is_stable() {
        let p = pipeline(Arc::new(StubNews::default()));
        let kept = p.filter_candidates(vec![
            candidate("AAA", 0.30, 5.0),
            candidate("BBB", 0.02, 5.0),
            candidate("CCC", -0.12, 5.0),
            candidate("DDD", -0.05, 5.0),
            candidate("EEE", 0.11, 5.0),
        ]);

        let names: Vec<&str> = kept.iter().map(|c| c.ticker.as_str()).collect();
        assert_eq!(names, vec!["AAA", "CCC", "EEE"]);
    }

    #[test]
    fn test_custom_threshold() {
        let p = pipeline(Arc::new(StubNews::default())).with_gap_threshold(0.25);
        assert!(!p.passes_filter(&candidate("AAA", 0.20, 5.0)));
        assert!(p.passes_filter(&candidate("BBB", -0.25, 5.0)));
    }

    #[tokio::test]
    async fn test_worked_example_end_to_end() {
        let news = Arc::new(StubNews::default().with_article("ABC", "ABC cuts guidance"));
        let outcome = pipeline(news).run(vec![candidate("ABC", -0.15, 50.0)]).await;

        assert_eq!(outcome.selections.len(), 1);
        let selection = &outcome.selections[0];
        assert_eq!(selection.ticker, "ABC");
        assert_eq!(selection.position.stop_loss_price, dec!(42.94));
        assert_eq!(selection.position.take_profit_price, dec!(57.06));
        assert_eq!(selection.position.shares, 28);
        assert_eq!(selection.position.expected_profit, dec!(197.68));
        assert_eq!(selection.articles.len(), 1);
        assert_eq!(selection.articles[0].headline, "ABC cuts guidance");
    }

    #[tokio::test]
    async fn test_failed_lookup_skips_only_that_candidate() {
        let news = Arc::new(
            StubNews::default()
                .with_article("AAA", "first")
                .with_article("CCC", "third")
                .failing_for("BBB"),
        );
        let outcome = pipeline(news.clone())
            .run(vec![
                candidate("AAA", 0.20, 10.0),
                candidate("BBB", -0.20, 10.0),
                candidate("CCC", 0.15, 10.0),
            ])
            .await;

        assert_eq!(tickers(&outcome.selections), vec!["AAA", "CCC"]);
        assert_eq!(
            outcome.report,
            PipelineReport {
                received: 3,
                filtered_out: 0,
                emitted: 2,
                skipped: 1,
            }
        );
        assert_eq!(news.calls(), vec!["AAA", "BBB", "CCC"]);
    }

    #[tokio::test]
    async fn test_unpriceable_candidate_is_skipped_without_lookup() {
        let news = Arc::new(StubNews::default());
        let huge = StockCandidate {
            ticker: "HUGE".to_string(),
            gap_percent: -0.5,
            opening_price: 5e28,
        };
        let outcome = pipeline(news.clone())
            .run(vec![huge, candidate("OK", 0.2, 10.0)])
            .await;

        assert_eq!(tickers(&outcome.selections), vec!["OK"]);
        assert_eq!(outcome.report.skipped, 1);
        assert_eq!(news.calls(), vec!["OK"]);
    }

    #[tokio::test]
    async fn test_empty_news_still_emits() {
        let news = Arc::new(StubNews::default());
        let outcome = pipeline(news).run(vec![candidate("QUIET", 0.4, 3.0)]).await;

        assert_eq!(outcome.selections.len(), 1);
        assert!(outcome.selections[0].articles.is_empty());
    }

    #[tokio::test]
    async fn test_filtered_candidates_are_never_looked_up() {
        let news = Arc::new(StubNews::default());
        let outcome = pipeline(news.clone())
            .run(vec![
                candidate("SMALL", 0.05, 10.0),
                candidate("BIG", -0.30, 10.0),
            ])
            .await;

        assert_eq!(tickers(&outcome.selections), vec!["BIG"]);
        assert_eq!(outcome.report.filtered_out, 1);
        assert_eq!(news.calls(), vec!["BIG"]);
    }

    #[tokio::test]
    async fn test_concurrent_run_preserves_input_order() {
        let news = Arc::new(
            StubNews::default()
                .delayed("SLOW", 80)
                .delayed("MID", 40)
                .failing_for("BAD")
                .with_article("FAST", "fast news"),
        );
        let outcome = pipeline(news)
            .with_concurrency(4)
            .run(vec![
                candidate("SLOW", 0.2, 10.0),
                candidate("MID", 0.2, 10.0),
                candidate("BAD", 0.2, 10.0),
                candidate("FAST", 0.2, 10.0),
            ])
            .await;

        assert_eq!(tickers(&outcome.selections), vec!["SLOW", "MID", "FAST"]);
        assert_eq!(outcome.report.skipped, 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome = pipeline(Arc::new(StubNews::default())).run(Vec::new()).await;

        assert!(outcome.selections.is_empty());
        assert_eq!(outcome.report, PipelineReport::default());
    }

    #[test]
    fn test_zero_concurrency_falls_back_to_sequential() {
        let p = pipeline(Arc::new(StubNews::default())).with_concurrency(0);
        assert_eq!(p.concurrency, 1);
    }
}
