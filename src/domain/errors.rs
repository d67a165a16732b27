use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProfitabilityError>;

/// Failures of the cost-basis and profitability engine.
///
/// Structural ledger errors are fatal for the position being computed.
/// `QuoteUnavailable` is only ever used to mark the unrealized leg as missing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfitabilityError {
    #[error("Malformed ledger: {reason}")]
    MalformedLedger { reason: String },

    #[error("Invalid allocation on transaction {transaction_id}: {percentage}% is outside (0, 100]")]
    InvalidAllocation {
        transaction_id: u32,
        percentage: Decimal,
    },

    #[error("Inconsistent close on transaction {transaction_id}: {reason}")]
    InconsistentClose { transaction_id: u32, reason: String },

    #[error("Degenerate ledger: {reason}")]
    DegenerateLedger { reason: String },

    #[error("Quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),
}

impl ProfitabilityError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedLedger {
            reason: reason.into(),
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateLedger {
            reason: reason.into(),
        }
    }

    pub fn quote_unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        Self::QuoteUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code used in API error bodies and skip reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedLedger { .. } => "malformed_ledger",
            Self::InvalidAllocation { .. } => "invalid_allocation",
            Self::InconsistentClose { .. } => "inconsistent_close",
            Self::DegenerateLedger { .. } => "degenerate_ledger",
            Self::QuoteUnavailable { .. } => "quote_unavailable",
            Self::ArithmeticOverflow(_) => "arithmetic_overflow",
        }
    }
}
