use anyhow::{bail, Context, Result};
use gap_pipeline::DEFAULT_GAP_THRESHOLD;
use gap_risk_calculator::RiskParameters;
use seeking_alpha_client::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize)]
pub struct ScannerConfig {
    // Files
    pub input_path: PathBuf,               // ./opg.csv
    pub output_path: PathBuf,              // ./opg.json

    // Risk parameters
    pub account_balance: f64,              // $10,000
    pub loss_tolerance_percent: f64,       // 0.02 (2%)
    pub profit_capture_percent: f64,       // 0.8 (80% of the gap fill)
    pub gap_threshold: f64,                // 0.10 (10%)

    // News API
    #[serde(skip_serializing)]
    pub news_api_key: String,
    pub news_api_base_url: String,
    pub news_page_size: u32,               // 56
    pub news_timeout_seconds: u64,         // 15
    pub news_concurrency: usize,           // 1 = sequential
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            input_path: lookup("GAP_INPUT_PATH")
                .unwrap_or_else(|| "./opg.csv".to_string())
                .into(),
            output_path: lookup("GAP_OUTPUT_PATH")
                .unwrap_or_else(|| "./opg.json".to_string())
                .into(),

            account_balance: parse_or(&lookup, "ACCOUNT_BALANCE", "10000")?,
            loss_tolerance_percent: parse_or(&lookup, "LOSS_TOLERANCE", "0.02")?,
            profit_capture_percent: parse_or(&lookup, "PROFIT_CAPTURE", "0.8")?,
            gap_threshold: parse_or(&lookup, "GAP_THRESHOLD", &DEFAULT_GAP_THRESHOLD.to_string())?,

            news_api_key: lookup("RAPIDAPI_KEY")
                .filter(|k| !k.trim().is_empty())
                .context("RAPIDAPI_KEY not set")?,
            news_api_base_url: lookup("NEWS_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            news_page_size: parse_or(&lookup, "NEWS_PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?,
            news_timeout_seconds: parse_or(
                &lookup,
                "NEWS_TIMEOUT_SECS",
                &DEFAULT_TIMEOUT_SECS.to_string(),
            )?,
            news_concurrency: parse_or(&lookup, "NEWS_CONCURRENCY", "1")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.gap_threshold >= 0.0 && self.gap_threshold.is_finite()) {
            bail!("GAP_THRESHOLD must be a non-negative number");
        }
        if self.news_page_size == 0 {
            bail!("NEWS_PAGE_SIZE must be at least 1");
        }
        if self.news_timeout_seconds == 0 {
            bail!("NEWS_TIMEOUT_SECS must be at least 1");
        }
        if self.news_concurrency == 0 {
            bail!("NEWS_CONCURRENCY must be at least 1");
        }
        self.risk_parameters()?;
        Ok(())
    }

    pub fn risk_parameters(&self) -> Result<RiskParameters> {
        RiskParameters::new(
            self.account_balance,
            self.loss_tolerance_percent,
            self.profit_capture_percent,
        )
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", key, raw))
}
