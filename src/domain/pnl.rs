use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::ProfitabilityError;
use super::position::{Direction, PositionStatus};

/// Profit realized by one DECREASE or CLOSE transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedLeg {
    pub source_transaction_id: u32,
    pub allocation_fraction_closed: Decimal,
    pub exit_price: Decimal,
    pub return_pct: Decimal,
    pub profit_amount: Decimal,
    pub closed_at: DateTime<Utc>,
}

/// Current price handed to the engine for the open remainder of a position
#[derive(Debug, Clone, PartialEq)]
pub enum PriceSnapshot {
    Quoted(Decimal),
    Unavailable { reason: String },
    NotRequested,
}

impl From<Result<Decimal, ProfitabilityError>> for PriceSnapshot {
    fn from(quote: Result<Decimal, ProfitabilityError>) -> Self {
        match quote {
            Ok(price) => Self::Quoted(price),
            Err(ProfitabilityError::QuoteUnavailable { reason, .. }) => {
                Self::Unavailable { reason }
            }
            Err(e) => Self::Unavailable {
                reason: e.to_string(),
            },
        }
    }
}

/// Mark-to-market of whatever allocation is still open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum UnrealizedLeg {
    /// Nothing left open, the unrealized return is zero by definition
    Closed,
    #[serde(rename_all = "camelCase")]
    Marked {
        current_price: Decimal,
        allocation_fraction: Decimal,
        return_pct: Decimal,
        profit_amount: Decimal,
    },
    Unavailable { reason: String },
}

impl UnrealizedLeg {
    pub fn return_pct(&self) -> Option<Decimal> {
        match self {
            Self::Closed => Some(Decimal::ZERO),
            Self::Marked { return_pct, .. } => Some(*return_pct),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn profit_amount(&self) -> Option<Decimal> {
        match self {
            Self::Closed => Some(Decimal::ZERO),
            Self::Marked { profit_amount, .. } => Some(*profit_amount),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }
}

/// Derived view of a position, recomputed from the ledger on every request.
///
/// `unrealized_return_pct` and `total_return_pct` are `None` when the open
/// remainder could not be marked; a computed zero is always `Some(0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionState {
    pub symbol: String,
    pub direction: Direction,
    pub status: PositionStatus,
    pub weighted_average_price: Decimal,
    pub allocation_after_adds: Decimal,
    pub total_allocation_fraction: Decimal,
    pub active_allocation_pct: Decimal,
    pub realized_legs: Vec<RealizedLeg>,
    pub realized_profit: Decimal,
    pub realized_return_pct: Decimal,
    pub unrealized: UnrealizedLeg,
    pub unrealized_return_pct: Option<Decimal>,
    pub total_return_pct: Option<Decimal>,
}

impl PositionState {
    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }
}
