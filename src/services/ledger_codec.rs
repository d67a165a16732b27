use crate::domain::{
    AllocationEntry, Direction, Position, ProfitabilityError, Result, Transaction,
    TransactionKind, FULL_ALLOCATION_PCT,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// `PriceEntry` item as stored with a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntryRecord {
    pub id: u32,
    pub price: Decimal,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub date: String,
}

/// `ActiveAllocation` item as stored with a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    pub id: u32,
    #[serde(alias = "percentage")]
    pub active_allocation: Decimal,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub date: String,
}

/// Stored position envelope.
///
/// Field names are PascalCase with camelCase accepted too; the two ledger
/// arrays may be embedded either as arrays or as JSON-encoded strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredPosition {
    #[serde(alias = "symbol")]
    pub symbol: String,
    #[serde(alias = "tradeDirection")]
    pub trade_direction: Direction,
    #[serde(alias = "priceEntry", deserialize_with = "inline_or_encoded")]
    pub price_entry: Vec<PriceEntryRecord>,
    #[serde(alias = "activeAllocation", deserialize_with = "inline_or_encoded")]
    pub active_allocation: Vec<AllocationRecord>,
    #[serde(alias = "state", default = "default_open")]
    pub state: bool,
    #[serde(alias = "closingDate", default, skip_serializing_if = "Option::is_none")]
    pub closing_date: Option<String>,
}

fn default_open() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InlineOrEncoded<T> {
    Inline(Vec<T>),
    Encoded(String),
}

fn inline_or_encoded<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match InlineOrEncoded::<T>::deserialize(deserializer)? {
        InlineOrEncoded::Inline(items) => Ok(items),
        InlineOrEncoded::Encoded(raw) => serde_json::from_str(&raw).map_err(serde::de::Error::custom),
    }
}

/// Parse a stored date, either RFC3339 or a bare `YYYY-MM-DD` (midnight UTC)
pub fn parse_ledger_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ProfitabilityError::malformed(format!("unparseable date '{}'", raw)))
}

fn record_kind(index: usize, id: u32, raw: Option<&str>) -> Result<TransactionKind> {
    match raw {
        Some(kind) => kind.parse(),
        None if index == 0 => Ok(TransactionKind::Initial),
        None => Err(ProfitabilityError::malformed(format!(
            "record {} has no type and is not the first entry",
            id
        ))),
    }
}

impl TryFrom<StoredPosition> for Position {
    type Error = ProfitabilityError;

    fn try_from(stored: StoredPosition) -> Result<Self> {
        let transactions = stored
            .price_entry
            .iter()
            .enumerate()
            .map(|(index, record)| {
                Ok(Transaction {
                    id: record.id,
                    price: record.price,
                    kind: record_kind(index, record.id, record.kind.as_deref())?,
                    timestamp: parse_ledger_date(&record.date)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let allocations = stored
            .active_allocation
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let kind = record_kind(index, record.id, record.kind.as_deref())?;
                if record.active_allocation <= Decimal::ZERO
                    || record.active_allocation > FULL_ALLOCATION_PCT
                {
                    return Err(ProfitabilityError::InvalidAllocation {
                        transaction_id: record.id,
                        percentage: record.active_allocation,
                    });
                }
                // The stored INITIAL figure is the position's weight in the
                // account, ledger arithmetic starts from the full position.
                let percentage = if kind == TransactionKind::Initial {
                    FULL_ALLOCATION_PCT
                } else {
                    record.active_allocation
                };
                Ok(AllocationEntry {
                    id: record.id,
                    percentage,
                    kind,
                    timestamp: parse_ledger_date(&record.date)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let closing_date = match stored.closing_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(parse_ledger_date(raw)?.date_naive()),
            _ => transactions
                .iter()
                .find(|tx| tx.kind == TransactionKind::Close)
                .map(|tx| tx.timestamp.date_naive()),
        };

        let position = Position {
            symbol: stored.symbol,
            direction: stored.trade_direction,
            transactions,
            allocations,
            is_open: stored.state,
            closing_date,
        };

        position.validate()?;

        debug!(
            "Decoded stored ledger for {}: {} transactions, open={}",
            position.symbol,
            position.transactions.len(),
            position.is_open
        );

        Ok(position)
    }
}
