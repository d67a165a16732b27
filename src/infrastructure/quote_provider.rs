use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::domain::ProfitabilityError;

pub type QuoteResult = Result<Decimal, ProfitabilityError>;

/// Market-data collaborator: last price for a symbol or `QuoteUnavailable`
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> QuoteResult;
}

/// Fixed price table, used offline and in tests
#[derive(Debug, Clone, Default)]
pub struct StaticQuoteProvider {
    prices: HashMap<String, Decimal>,
}

impl StaticQuoteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }
}

#[async_trait]
impl QuoteProvider for StaticQuoteProvider {
    async fn get_quote(&self, symbol: &str) -> QuoteResult {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ProfitabilityError::quote_unavailable(symbol, "no price configured"))
    }
}

/// Fetch one quote per distinct symbol with at most `concurrency` requests
/// in flight.
///
/// Completion order is arbitrary, so results are keyed by symbol.
pub async fn fetch_quotes<P, I>(provider: &P, symbols: I, concurrency: usize) -> HashMap<String, QuoteResult>
where
    P: QuoteProvider + ?Sized,
    I: IntoIterator<Item = String>,
{
    let unique: BTreeSet<String> = symbols.into_iter().collect();
    debug!("Fetching {} quotes with concurrency {}", unique.len(), concurrency.max(1));

    stream::iter(unique)
        .map(move |symbol| async move {
            let quote = provider.get_quote(&symbol).await;
            if let Err(e) = &quote {
                warn!("{}", e);
            }
            (symbol, quote)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}
