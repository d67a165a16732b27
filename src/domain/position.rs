use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{ProfitabilityError, Result};

pub const FULL_ALLOCATION_PCT: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[serde(alias = "Long", alias = "long", alias = "Buy", alias = "buy")]
    Long,
    #[serde(alias = "Short", alias = "short", alias = "Sell", alias = "sell")]
    Short,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    #[serde(alias = "initial", alias = "Initial")]
    Initial,
    #[serde(alias = "add", alias = "Add", alias = "adicion")]
    Add,
    #[serde(alias = "decrease", alias = "Decrease", alias = "toma_parcial")]
    Decrease,
    #[serde(alias = "close", alias = "Close", alias = "cierre_total")]
    Close,
}

impl FromStr for TransactionKind {
    type Err = ProfitabilityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initial" => Ok(Self::Initial),
            "add" | "adicion" => Ok(Self::Add),
            "decrease" | "toma_parcial" => Ok(Self::Decrease),
            "close" | "cierre_total" => Ok(Self::Close),
            other => Err(ProfitabilityError::malformed(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

/// Price leg of the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: u32,
    pub price: Decimal,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
}

/// Allocation leg paired by id with a [`Transaction`].
///
/// `percentage` is relative to the size of the position right before the
/// transaction: an ADD of 50 grows the position by half, a DECREASE of 50
/// sells half of what is left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationEntry {
    pub id: u32,
    pub percentage: Decimal,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub transactions: Vec<Transaction>,
    pub allocations: Vec<AllocationEntry>,
    pub is_open: bool,
    pub closing_date: Option<NaiveDate>,
}

impl Position {
    /// Start a ledger with its INITIAL transaction at full allocation
    pub fn open(
        symbol: impl Into<String>,
        direction: Direction,
        entry_price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            transactions: vec![Transaction {
                id: 1,
                price: entry_price,
                kind: TransactionKind::Initial,
                timestamp,
            }],
            allocations: vec![AllocationEntry {
                id: 1,
                percentage: FULL_ALLOCATION_PCT,
                kind: TransactionKind::Initial,
                timestamp,
            }],
            is_open: true,
            closing_date: None,
        }
    }

    /// Transaction/allocation pairs in ledger order
    pub fn legs(&self) -> impl Iterator<Item = (&Transaction, &AllocationEntry)> {
        self.transactions.iter().zip(self.allocations.iter())
    }

    pub fn has_close(&self) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.kind == TransactionKind::Close)
    }

    pub fn next_id(&self) -> u32 {
        self.transactions
            .iter()
            .map(|tx| tx.id)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Append a transaction/allocation pair, returning the extended ledger.
    ///
    /// A CLOSE marks the position terminal and records the closing date.
    pub fn append(
        mut self,
        kind: TransactionKind,
        price: Decimal,
        percentage: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let id = self.next_id();

        if kind == TransactionKind::Initial {
            return Err(ProfitabilityError::malformed(format!(
                "transaction {} cannot be INITIAL, the ledger is already open",
                id
            )));
        }
        if !self.is_open || self.has_close() {
            return Err(ProfitabilityError::InconsistentClose {
                transaction_id: id,
                reason: "position is already closed".to_string(),
            });
        }

        self.transactions.push(Transaction {
            id,
            price,
            kind,
            timestamp,
        });
        self.allocations.push(AllocationEntry {
            id,
            percentage,
            kind,
            timestamp,
        });

        if kind == TransactionKind::Close {
            self.is_open = false;
            self.closing_date = Some(timestamp.date_naive());
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the structural invariants of the ledger before any arithmetic.
    pub fn validate(&self) -> Result<()> {
        let first = self
            .transactions
            .first()
            .ok_or_else(|| ProfitabilityError::malformed("ledger has no transactions"))?;

        if self.transactions.len() != self.allocations.len() {
            return Err(ProfitabilityError::malformed(format!(
                "{} transactions but {} allocation entries",
                self.transactions.len(),
                self.allocations.len()
            )));
        }

        if first.kind != TransactionKind::Initial {
            return Err(ProfitabilityError::malformed(format!(
                "first transaction {} is {:?}, expected INITIAL",
                first.id, first.kind
            )));
        }

        let last_index = self.transactions.len() - 1;
        let mut previous: Option<&Transaction> = None;

        for (index, (tx, allocation)) in self.legs().enumerate() {
            if tx.id != allocation.id {
                return Err(ProfitabilityError::malformed(format!(
                    "transaction id {} is paired with allocation id {}",
                    tx.id, allocation.id
                )));
            }
            if tx.kind != allocation.kind {
                return Err(ProfitabilityError::malformed(format!(
                    "transaction {} is {:?} but its allocation is {:?}",
                    tx.id, tx.kind, allocation.kind
                )));
            }
            if tx.price < Decimal::ZERO {
                return Err(ProfitabilityError::malformed(format!(
                    "transaction {} has negative price {}",
                    tx.id, tx.price
                )));
            }

            if let Some(prev) = previous {
                if tx.kind == TransactionKind::Initial {
                    return Err(ProfitabilityError::malformed(format!(
                        "transaction {} is a second INITIAL",
                        tx.id
                    )));
                }
                if tx.id <= prev.id {
                    return Err(ProfitabilityError::malformed(format!(
                        "transaction ids are not ascending: {} follows {}",
                        tx.id, prev.id
                    )));
                }
                if tx.timestamp < prev.timestamp {
                    return Err(ProfitabilityError::malformed(format!(
                        "transaction {} is dated before transaction {}",
                        tx.id, prev.id
                    )));
                }
            }

            if allocation.percentage <= Decimal::ZERO || allocation.percentage > FULL_ALLOCATION_PCT
            {
                return Err(ProfitabilityError::InvalidAllocation {
                    transaction_id: tx.id,
                    percentage: allocation.percentage,
                });
            }

            if tx.kind == TransactionKind::Initial && allocation.percentage != FULL_ALLOCATION_PCT {
                return Err(ProfitabilityError::malformed(format!(
                    "INITIAL allocation must be 100%, got {}%",
                    allocation.percentage
                )));
            }

            if tx.kind == TransactionKind::Close {
                if allocation.percentage != FULL_ALLOCATION_PCT {
                    return Err(ProfitabilityError::InconsistentClose {
                        transaction_id: tx.id,
                        reason: format!(
                            "CLOSE must consume 100% of the remainder, got {}%",
                            allocation.percentage
                        ),
                    });
                }
                if index != last_index {
                    return Err(ProfitabilityError::InconsistentClose {
                        transaction_id: tx.id,
                        reason: "CLOSE is not the last transaction".to_string(),
                    });
                }
            }

            previous = Some(tx);
        }

        if self.is_open && self.has_close() {
            return Err(ProfitabilityError::malformed(
                "position is flagged open but its ledger contains a CLOSE",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_open_creates_initial_leg() {
        let position = Position::open("AAPL", Direction::Long, dec!(10), day(1));
        assert_eq!(position.transactions.len(), 1);
        assert_eq!(position.allocations[0].percentage, dec!(100));
        assert_eq!(position.next_id(), 2);
        assert!(position.validate().is_ok());
    }

    #[test]
    fn test_append_assigns_ids_and_closes() {
        let position = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Add, dec!(12), dec!(50), day(2))
            .unwrap()
            .append(TransactionKind::Close, dec!(15), dec!(100), day(5))
            .unwrap();

        let ids: Vec<u32> = position.transactions.iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!position.is_open);
        assert_eq!(
            position.closing_date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );
    }

    #[test]
    fn test_append_after_close_fails() {
        let position = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Close, dec!(15), dec!(100), day(2))
            .unwrap();

        let err = position
            .append(TransactionKind::Add, dec!(11), dec!(10), day(3))
            .unwrap_err();
        assert!(matches!(
            err,
            ProfitabilityError::InconsistentClose { transaction_id: 3, .. }
        ));
    }

    #[test]
    fn test_append_initial_is_malformed() {
        let err = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Initial, dec!(11), dec!(100), day(2))
            .unwrap_err();
        assert_eq!(err.code(), "malformed_ledger");
    }

    #[test]
    fn test_close_with_partial_percentage_is_inconsistent() {
        let err = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Close, dec!(15), dec!(60), day(2))
            .unwrap_err();
        assert!(matches!(
            err,
            ProfitabilityError::InconsistentClose { transaction_id: 2, .. }
        ));
    }

    #[test]
    fn test_allocation_out_of_range() {
        for pct in [dec!(0), dec!(-5), dec!(100.01)] {
            let err = Position::open("AAPL", Direction::Long, dec!(10), day(1))
                .append(TransactionKind::Decrease, dec!(15), pct, day(2))
                .unwrap_err();
            assert!(matches!(
                err,
                ProfitabilityError::InvalidAllocation { transaction_id: 2, .. }
            ));
        }
    }

    #[test]
    fn test_validate_rejects_structural_violations() {
        let empty = Position {
            symbol: "AAPL".to_string(),
            direction: Direction::Long,
            transactions: vec![],
            allocations: vec![],
            is_open: true,
            closing_date: None,
        };
        assert_eq!(empty.validate().unwrap_err().code(), "malformed_ledger");

        let mut mismatched = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Add, dec!(12), dec!(50), day(2))
            .unwrap();
        mismatched.allocations[1].id = 7;
        assert_eq!(mismatched.validate().unwrap_err().code(), "malformed_ledger");

        let mut descending = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Add, dec!(12), dec!(50), day(2))
            .unwrap();
        descending.transactions[1].id = 1;
        descending.allocations[1].id = 1;
        assert_eq!(descending.validate().unwrap_err().code(), "malformed_ledger");

        let mut backdated = Position::open("AAPL", Direction::Long, dec!(10), day(5))
            .append(TransactionKind::Add, dec!(12), dec!(50), day(6))
            .unwrap();
        backdated.transactions[1].timestamp = day(2);
        assert_eq!(backdated.validate().unwrap_err().code(), "malformed_ledger");

        let mut no_initial = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Add, dec!(12), dec!(50), day(2))
            .unwrap();
        no_initial.transactions[0].kind = TransactionKind::Add;
        no_initial.allocations[0].kind = TransactionKind::Add;
        let err = no_initial.validate().unwrap_err();
        assert_eq!(err.code(), "malformed_ledger");
        assert!(err.to_string().contains("expected INITIAL"));

        let mut second_initial = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Add, dec!(12), dec!(50), day(2))
            .unwrap();
        second_initial.transactions[1].kind = TransactionKind::Initial;
        second_initial.allocations[1].kind = TransactionKind::Initial;
        second_initial.allocations[1].percentage = dec!(100);
        let err = second_initial.validate().unwrap_err();
        assert_eq!(err.code(), "malformed_ledger");
        assert!(err.to_string().contains("second INITIAL"));
    }

    #[test]
    fn test_close_must_be_last() {
        let mut position = Position::open("AAPL", Direction::Long, dec!(10), day(1))
            .append(TransactionKind::Add, dec!(12), dec!(50), day(2))
            .unwrap();
        position.transactions[1].kind = TransactionKind::Close;
        position.allocations[1].kind = TransactionKind::Close;
        position.allocations[1].percentage = dec!(100);
        position.transactions.push(Transaction {
            id: 3,
            price: dec!(13),
            kind: TransactionKind::Add,
            timestamp: day(3),
        });
        position.allocations.push(AllocationEntry {
            id: 3,
            percentage: dec!(10),
            kind: TransactionKind::Add,
            timestamp: day(3),
        });
        position.is_open = false;

        assert!(matches!(
            position.validate().unwrap_err(),
            ProfitabilityError::InconsistentClose { transaction_id: 2, .. }
        ));
    }

    #[test]
    fn test_kind_parsing_accepts_ledger_spellings() {
        assert_eq!("add".parse::<TransactionKind>().unwrap(), TransactionKind::Add);
        assert_eq!(
            "toma_parcial".parse::<TransactionKind>().unwrap(),
            TransactionKind::Decrease
        );
        assert_eq!("CLOSE".parse::<TransactionKind>().unwrap(), TransactionKind::Close);
        assert!("split".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_direction_accepts_trade_direction_names() {
        let long: Direction = serde_json::from_str("\"Buy\"").unwrap();
        let short: Direction = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(long, Direction::Long);
        assert_eq!(short, Direction::Short);
    }
}
