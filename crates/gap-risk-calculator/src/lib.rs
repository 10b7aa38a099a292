use anyhow::{bail, Result};
use gap_core::{Position, ScanError, MAX_OPENING_PRICE};
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

/// Largest capital base accepted. Keeps `max_loss / 0.01` well inside `u64`.
pub const MAX_ACCOUNT_BALANCE: f64 = 1_000_000_000_000.0;

/// Account-level risk settings shared by every trade in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParameters {
    /// Capital base the loss tolerance is measured against
    pub account_balance: f64,

    /// Fraction of the balance a single trade may lose (e.g., 0.02 = 2%)
    pub loss_tolerance_percent: f64,

    /// Fraction of the gap-fill move assumed capturable (e.g., 0.8 = 80%)
    pub profit_capture_percent: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            account_balance: 10_000.0,
            loss_tolerance_percent: 0.02,
            profit_capture_percent: 0.8,
        }
    }
}

impl RiskParameters {
    pub fn new(
        account_balance: f64,
        loss_tolerance_percent: f64,
        profit_capture_percent: f64,
    ) -> Result<Self> {
        if !(account_balance > 0.0 && account_balance <= MAX_ACCOUNT_BALANCE) {
            bail!("account_balance must be positive and at most {}", MAX_ACCOUNT_BALANCE);
        }
        if !(loss_tolerance_percent > 0.0 && loss_tolerance_percent <= 1.0) {
            bail!("loss_tolerance_percent must be between 0 and 1");
        }
        if !(0.0..=1.0).contains(&profit_capture_percent) {
            bail!("profit_capture_percent must be between 0 and 1");
        }

        let params = Self {
            account_balance,
            loss_tolerance_percent,
            profit_capture_percent,
        };
        if params.max_loss_per_trade() <= Decimal::ZERO {
            bail!("max loss per trade must be positive");
        }

        Ok(params)
    }

    /// Dollar loss allowed on one trade: `balance * tolerance`, unrounded so
    /// share sizing never exceeds the real budget.
    pub fn max_loss_per_trade(&self) -> Decimal {
        let balance = Decimal::from_f64(self.account_balance).unwrap_or_default();
        let tolerance = Decimal::from_f64(self.loss_tolerance_percent).unwrap_or_default();
        balance.checked_mul(tolerance).unwrap_or_default()
    }
}

/// Gap-fill trade planner.
///
/// A stock that gapped is assumed to retrace part of the way back to the
/// prior close implied by the gap:
///   prior_close = open / (1 + gap)
///   move        = profit_capture * (prior_close - open)
///   stop        = open - move
///   target      = open + move
///   shares      = floor(max_loss / |stop - open|)
///
/// Stop and target sit at the same distance from entry. Prices are rounded
/// to cents (half away from zero) before sizing, and all sizing arithmetic
/// runs in `Decimal` so identical inputs always produce identical plans.
#[derive(Debug, Clone)]
pub struct GapRiskCalculator {
    params: RiskParameters,
    max_loss_per_trade: Decimal,
}

impl GapRiskCalculator {
    pub fn new(params: RiskParameters) -> Self {
        Self {
            max_loss_per_trade: params.max_loss_per_trade(),
            params,
        }
    }

    pub fn max_loss_per_trade(&self) -> Decimal {
        self.max_loss_per_trade
    }

    /// Build the trading plan for one gapping stock.
    ///
    /// A zero price risk (flat gap or zero capture) yields zero shares.
    /// Inputs that a validated `StockCandidate` cannot hold (gap at or below
    /// -100%, price outside `(0, MAX_OPENING_PRICE]`) are rejected rather
    /// than priced.
    pub fn calculate(&self, gap_percent: f64, opening_price: f64) -> Result<Position, ScanError> {
        if !(opening_price > 0.0 && opening_price <= MAX_OPENING_PRICE) {
            return Err(ScanError::InvalidData(format!(
                "opening price {} is out of range",
                opening_price
            )));
        }
        if !(gap_percent.is_finite() && gap_percent > -1.0) {
            return Err(ScanError::InvalidData(format!("gap {} is out of range", gap_percent)));
        }

        let implied_prior_close = opening_price / (1.0 + gap_percent);
        let gap_value = implied_prior_close - opening_price;
        let captured_move = self.params.profit_capture_percent * gap_value;

        let overflow = || {
            ScanError::InvalidData(format!(
                "gap {} at {} overflows the price range",
                gap_percent, opening_price
            ))
        };

        let entry = Decimal::from_f64(opening_price)
            .map(round_cents)
            .ok_or_else(overflow)?;
        let captured = Decimal::from_f64(captured_move)
            .map(round_cents)
            .ok_or_else(overflow)?;

        let stop_loss_price = entry.checked_sub(captured).ok_or_else(overflow)?;
        let take_profit_price = entry.checked_add(captured).ok_or_else(overflow)?;

        let risk_per_share = captured.abs();
        let shares = if risk_per_share.is_zero() {
            0
        } else {
            self.max_loss_per_trade
                .checked_div(risk_per_share)
                .and_then(|raw| raw.floor().to_u64())
                .ok_or_else(overflow)?
        };

        let expected_profit = risk_per_share
            .checked_mul(Decimal::from(shares))
            .map(round_cents)
            .ok_or_else(overflow)?;

        tracing::debug!(
            "gap {:.4} open {} -> stop {} target {} risk/share {} shares {}",
            gap_percent,
            entry,
            stop_loss_price,
            take_profit_price,
            risk_per_share,
            shares
        );

        Ok(Position {
            entry_price: entry,
            shares,
            take_profit_price,
            stop_loss_price,
            expected_profit,
        })
    }
}

/// Round to 2 dp, half away from zero
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
