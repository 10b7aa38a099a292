use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ScanError;

/// Highest opening price accepted. Keeps every derived price and share
/// count inside `Decimal` range.
pub const MAX_OPENING_PRICE: f64 = 1_000_000_000.0;

/// A stock that opened away from its prior close.
///
/// `gap_percent` is a fraction: `-0.15` means the stock opened 15% below
/// the previous session's close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCandidate {
    pub ticker: String,
    pub gap_percent: f64,
    pub opening_price: f64,
}

impl StockCandidate {
    /// Build a candidate, rejecting values the risk model cannot price.
    ///
    /// The ticker is trimmed but keeps its case. A gap of -100% or worse
    /// implies a non-positive prior close and is refused.
    pub fn new(ticker: &str, gap_percent: f64, opening_price: f64) -> Result<Self, ScanError> {
        let ticker = ticker.trim().to_string();
        if ticker.is_empty() {
            return Err(ScanError::InvalidData("ticker is empty".to_string()));
        }
        if !gap_percent.is_finite() || gap_percent <= -1.0 {
            return Err(ScanError::InvalidData(format!(
                "{}: gap {} is out of range",
                ticker, gap_percent
            )));
        }
        if !(opening_price > 0.0 && opening_price <= MAX_OPENING_PRICE) {
            return Err(ScanError::InvalidData(format!(
                "{}: opening price {} must be positive and at most {}",
                ticker, opening_price, MAX_OPENING_PRICE
            )));
        }

        Ok(Self {
            ticker,
            gap_percent,
            opening_price,
        })
    }
}

/// Planned intraday trade for a gapping stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(with = "rust_decimal::serde::float")]
    pub entry_price: Decimal,
    pub shares: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub take_profit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub stop_loss_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub expected_profit: Decimal,
}

/// News headline attached to a selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub published_at: DateTime<Utc>,
    pub headline: String,
}

/// One output record: a ticker's trading plan plus its recent news.
///
/// The position fields are flattened into the record so the JSON reads
/// `{"ticker": .., "entry_price": .., .., "articles": [..]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub ticker: String,
    #[serde(flatten)]
    pub position: Position,
    pub articles: Vec<Article>,
}
