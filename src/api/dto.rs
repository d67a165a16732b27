use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Direction, Position, ProfitabilityError, TransactionKind};
use crate::services::{parse_ledger_date, StoredPosition};

// Request DTOs

/// One follow-up transaction of a calculation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Percent units: 50 means half
    pub percentage: Decimal,
    pub price: Decimal,
    pub date: Option<String>,
}

/// `{direction, entryPrice, symbol, transactions, closingDate?}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    #[serde(default)]
    pub transactions: Vec<TransactionRequest>,
    pub entry_date: Option<String>,
    pub closing_date: Option<String>,
    /// Price for the open remainder; the quote service is asked when absent
    pub current_price: Option<Decimal>,
}

impl CalculationRequest {
    /// Build the ledger. Undated transactions inherit the previous date and
    /// an undated entry is pinned to the Unix epoch; an undated CLOSE leaves
    /// the closing date unknown unless `closingDate` is given.
    pub fn to_position(&self) -> Result<Position, ProfitabilityError> {
        let mut timestamp = match self.entry_date.as_deref() {
            Some(raw) => parse_ledger_date(raw)?,
            None => DateTime::<Utc>::default(),
        };

        let mut position = Position::open(&self.symbol, self.direction, self.entry_price, timestamp);

        for tx in &self.transactions {
            if let Some(raw) = tx.date.as_deref() {
                timestamp = parse_ledger_date(raw)?;
            }
            position = position.append(tx.kind, tx.price, tx.percentage, timestamp)?;
        }

        match self.closing_date.as_deref() {
            Some(raw) => {
                let closing_date: NaiveDate = parse_ledger_date(raw)?.date_naive();
                position.closing_date = Some(closing_date);
            }
            None if self
                .transactions
                .iter()
                .any(|tx| tx.kind == TransactionKind::Close && tx.date.is_none()) =>
            {
                position.closing_date = None;
            }
            None => {}
        }

        Ok(position)
    }
}

/// Stored position plus an optional price for its open remainder
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRequest {
    #[serde(flatten)]
    pub position: StoredPosition,
    #[serde(alias = "CurrentPrice")]
    pub current_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioQuery {
    /// Only closed positions from the last `months` months
    pub months: Option<u32>,
    pub as_of: Option<NaiveDate>,
}

// Response DTOs

#[derive(Debug, Serialize)]
pub struct PriceDto {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request(value: serde_json::Value) -> CalculationRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_builds_ledger() {
        let req = request(json!({
            "symbol": "AAPL",
            "direction": "LONG",
            "entryPrice": "10",
            "entryDate": "2024-01-02",
            "transactions": [
                { "type": "ADD", "percentage": 100, "price": 20, "date": "2024-01-10" },
                { "type": "decrease", "percentage": "50", "price": "22" },
                { "type": "CLOSE", "percentage": 100, "price": 25, "date": "2024-02-01" }
            ]
        }));

        let position = req.to_position().unwrap();

        assert_eq!(position.transactions.len(), 4);
        assert_eq!(position.transactions[2].timestamp, position.transactions[1].timestamp);
        assert_eq!(position.allocations[1].percentage, dec!(100));
        assert!(!position.is_open);
        assert_eq!(position.closing_date, NaiveDate::from_ymd_opt(2024, 2, 1));
    }

    #[test]
    fn test_undated_close_has_no_closing_date() {
        let req = request(json!({
            "symbol": "AAPL",
            "direction": "SHORT",
            "entryPrice": 10,
            "transactions": [{ "type": "CLOSE", "percentage": 100, "price": 9 }]
        }));
        let position = req.to_position().unwrap();
        assert!(!position.is_open);
        assert_eq!(position.closing_date, None);

        let req = request(json!({
            "symbol": "AAPL",
            "direction": "SHORT",
            "entryPrice": 10,
            "transactions": [{ "type": "CLOSE", "percentage": 100, "price": 9 }],
            "closingDate": "2024-06-30"
        }));
        assert_eq!(
            req.to_position().unwrap().closing_date,
            NaiveDate::from_ymd_opt(2024, 6, 30)
        );
    }

    #[test]
    fn test_request_errors_surface_as_ledger_errors() {
        let req = request(json!({
            "symbol": "AAPL",
            "direction": "LONG",
            "entryPrice": 10,
            "transactions": [{ "type": "DECREASE", "percentage": 120, "price": 9 }]
        }));
        assert_eq!(req.to_position().unwrap_err().code(), "invalid_allocation");

        let req = request(json!({
            "symbol": "AAPL",
            "direction": "LONG",
            "entryPrice": 10,
            "transactions": [{ "type": "INITIAL", "percentage": 100, "price": 9 }]
        }));
        assert_eq!(req.to_position().unwrap_err().code(), "malformed_ledger");
    }
}
