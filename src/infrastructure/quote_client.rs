use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::domain::ProfitabilityError;
use crate::infrastructure::quote_provider::{QuoteProvider, QuoteResult};

/// Client for the quote service exposing `GET /api/yfinance/quote/{symbol}`.
///
/// Timeouts are the only transport policy applied here; a failed request
/// simply reports the quote as unavailable.
pub struct HttpQuoteClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpQuoteClient {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .with_context(|| format!("Invalid quote service URL {}", base_url.as_ref()))?;
        if base_url.cannot_be_a_base() {
            bail!("Quote service URL {} cannot carry a path", base_url);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build quote HTTP client")?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// The symbol is pushed as a single percent-encoded path segment
    fn quote_url(&self, symbol: &str) -> std::result::Result<Url, ProfitabilityError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProfitabilityError::quote_unavailable(symbol, "quote URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["api", "yfinance", "quote"])
            .push(symbol);
        Ok(url)
    }

    /// Pull the price out of `{symbol, price, currency, marketTime}`
    fn parse_price(symbol: &str, body: &serde_json::Value) -> QuoteResult {
        let raw = body
            .get("price")
            .ok_or_else(|| ProfitabilityError::quote_unavailable(symbol, "missing price field"))?;

        let price = match raw {
            serde_json::Value::String(s) => s.parse::<Decimal>().ok(),
            serde_json::Value::Number(n) => n.to_string().parse::<Decimal>().ok().or_else(|| {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }),
            _ => None,
        }
        .ok_or_else(|| {
            ProfitabilityError::quote_unavailable(symbol, format!("unparseable price {}", raw))
        })?;

        if price <= Decimal::ZERO {
            return Err(ProfitabilityError::quote_unavailable(
                symbol,
                format!("non-positive price {}", price),
            ));
        }

        Ok(price)
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteClient {
    async fn get_quote(&self, symbol: &str) -> QuoteResult {
        let url = self.quote_url(symbol)?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ProfitabilityError::quote_unavailable(symbol, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfitabilityError::quote_unavailable(
                symbol,
                format!("quote service returned {}", status),
            ));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ProfitabilityError::quote_unavailable(symbol, format!("invalid response body: {}", e))
        })?;

        let price = Self::parse_price(symbol, &body)?;

        debug!("Quote for {}: {}", symbol, price);

        Ok(price)
    }
}
