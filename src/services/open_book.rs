use crate::domain::{
    OpenBookSummary, OpenPositionReturn, Position, PriceSnapshot, ProfitabilityError, Result,
    SkippedPosition, UnrealizedLeg,
};
use crate::infrastructure::{fetch_quotes, QuoteProvider};
use crate::services::position_aggregator::PositionAggregator;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Mark a batch of open positions to market.
///
/// Quotes are fetched once per symbol with at most `concurrency` requests in
/// flight. Closed ledgers in the batch are reported as failed.
pub async fn summarize_open_book<P>(
    provider: &P,
    positions: &[Position],
    concurrency: usize,
) -> Result<OpenBookSummary>
where
    P: QuoteProvider + ?Sized,
{
    let symbols = positions
        .iter()
        .filter(|p| p.is_open)
        .map(|p| p.symbol.clone());
    let quotes = fetch_quotes(provider, symbols, concurrency).await;

    let mut summary = OpenBookSummary {
        positions: Vec::with_capacity(positions.len()),
        mean_unrealized_return_pct: None,
        unavailable_symbols: Vec::new(),
        failed: Vec::new(),
    };

    for position in positions {
        if !position.is_open {
            summary.failed.push(SkippedPosition {
                symbol: position.symbol.clone(),
                code: "position_closed".to_string(),
                reason: "position is closed".to_string(),
            });
            continue;
        }

        let snapshot = match quotes.get(&position.symbol) {
            Some(quote) => PriceSnapshot::from(quote.clone()),
            None => PriceSnapshot::NotRequested,
        };

        let state = match PositionAggregator::compute(position, &snapshot) {
            Ok(state) => state,
            Err(e) => {
                warn!("Open book: {} failed: {}", position.symbol, e);
                summary.failed.push(SkippedPosition::from_error(&position.symbol, &e));
                continue;
            }
        };

        let current_price = match &state.unrealized {
            UnrealizedLeg::Marked { current_price, .. } => Some(*current_price),
            _ => None,
        };

        if matches!(state.unrealized, UnrealizedLeg::Unavailable { .. })
            && !summary.unavailable_symbols.contains(&state.symbol)
        {
            summary.unavailable_symbols.push(state.symbol.clone());
        }

        summary.positions.push(OpenPositionReturn {
            symbol: state.symbol,
            current_price,
            weighted_average_price: state.weighted_average_price,
            active_allocation_pct: state.active_allocation_pct,
            unrealized_return_pct: state.unrealized_return_pct,
            total_return_pct: state.total_return_pct,
        });
    }

    let marked: Vec<Decimal> = summary
        .positions
        .iter()
        .filter(|p| p.current_price.is_some())
        .filter_map(|p| p.unrealized_return_pct)
        .collect();

    if !marked.is_empty() {
        let sum = marked
            .iter()
            .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(*r))
            .ok_or(ProfitabilityError::ArithmeticOverflow("open book sum"))?;
        summary.mean_unrealized_return_pct = Some(
            sum.checked_div(Decimal::from(marked.len()))
                .ok_or(ProfitabilityError::ArithmeticOverflow("open book mean"))?,
        );
    }

    info!(
        "Open book: {} positions marked, {} unavailable, {} failed",
        marked.len(),
        summary.unavailable_symbols.len(),
        summary.failed.len()
    );

    Ok(summary)
}
