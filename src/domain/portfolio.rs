use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::errors::ProfitabilityError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMonthGroup {
    /// Calendar month of the closing dates, `YYYY-MM`
    pub month: String,
    pub position_returns: Vec<Decimal>,
    pub position_count: usize,
    pub mean_return_pct: Decimal,
}

/// A position left out of an aggregate because it could not be computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPosition {
    pub symbol: String,
    pub code: String,
    pub reason: String,
}

impl SkippedPosition {
    pub fn from_error(symbol: &str, error: &ProfitabilityError) -> Self {
        Self {
            symbol: symbol.to_string(),
            code: error.code().to_string(),
            reason: error.to_string(),
        }
    }
}

/// Monthly-compounded return over closed positions.
///
/// With no closed positions the aggregate is empty and every return is
/// exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAggregate {
    pub month_groups: BTreeMap<String, PortfolioMonthGroup>,
    pub compounded_return_pct: Decimal,
    pub compounded_return_decimal: Decimal,
    pub simple_mean_return_pct: Decimal,
    pub positions_included: usize,
    pub ineligible: usize,
    pub skipped: Vec<SkippedPosition>,
}

impl PortfolioAggregate {
    pub fn empty() -> Self {
        Self {
            month_groups: BTreeMap::new(),
            compounded_return_pct: Decimal::ZERO,
            compounded_return_decimal: Decimal::ZERO,
            simple_mean_return_pct: Decimal::ZERO,
            positions_included: 0,
            ineligible: 0,
            skipped: Vec::new(),
        }
    }
}

/// Mark-to-market line for one open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionReturn {
    pub symbol: String,
    pub current_price: Option<Decimal>,
    pub weighted_average_price: Decimal,
    pub active_allocation_pct: Decimal,
    pub unrealized_return_pct: Option<Decimal>,
    pub total_return_pct: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBookSummary {
    pub positions: Vec<OpenPositionReturn>,
    /// Mean over the positions whose quote was available; `None` if none were
    pub mean_unrealized_return_pct: Option<Decimal>,
    pub unavailable_symbols: Vec<String>,
    pub failed: Vec<SkippedPosition>,
}
