use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::api::{dto::*, errors::ApiError};
use crate::domain::{
    OpenBookSummary, PortfolioAggregate, Position, PositionState, PriceSnapshot, SkippedPosition,
};
use crate::infrastructure::QuoteProvider;
use crate::services::{
    summarize_open_book, LookbackWindow, PortfolioAggregator, PortfolioEntry, PositionAggregator,
};
use rust_decimal::Decimal;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub quotes: Arc<dyn QuoteProvider>,
    pub quote_concurrency: usize,
}

impl AppState {
    pub fn new(quotes: Arc<dyn QuoteProvider>, quote_concurrency: usize) -> Self {
        Self {
            quotes,
            quote_concurrency,
        }
    }

    /// Price for a position's open remainder: the supplied one, a quote for
    /// open ledgers, nothing for closed ones.
    async fn snapshot_for(&self, position: &Position, supplied: Option<Decimal>) -> PriceSnapshot {
        match supplied {
            Some(price) => PriceSnapshot::Quoted(price),
            None if position.is_open => {
                PriceSnapshot::from(self.quotes.get_quote(&position.symbol).await)
            }
            None => PriceSnapshot::NotRequested,
        }
    }
}

/// GET /health - Health check
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "profitability-backend"
    }))
}

/// POST /profitability/position - State of one calculation request
pub async fn position_profitability(
    State(state): State<AppState>,
    Json(payload): Json<CalculationRequest>,
) -> Result<Json<PositionState>, ApiError> {
    let position = payload.to_position()?;
    let snapshot = state.snapshot_for(&position, payload.current_price).await;

    let result = PositionAggregator::compute(&position, &snapshot)?;
    Ok(Json(result))
}

/// POST /profitability/ledger - State of a stored position document
pub async fn ledger_profitability(
    State(state): State<AppState>,
    Json(payload): Json<LedgerRequest>,
) -> Result<Json<PositionState>, ApiError> {
    let position = Position::try_from(payload.position)?;
    let snapshot = state.snapshot_for(&position, payload.current_price).await;

    let result = PositionAggregator::compute(&position, &snapshot)?;
    Ok(Json(result))
}

/// POST /profitability/portfolio - Monthly-compounded return of closed positions
pub async fn portfolio_profitability(
    Query(query): Query<PortfolioQuery>,
    Json(payload): Json<Vec<CalculationRequest>>,
) -> Result<Json<PortfolioAggregate>, ApiError> {
    if query.months == Some(0) {
        return Err(ApiError::BadRequest("months must be at least 1".to_string()));
    }

    let window = query.months.map(|months| LookbackWindow {
        months,
        as_of: query.as_of.unwrap_or_else(|| Utc::now().date_naive()),
    });

    let entries: Vec<PortfolioEntry> = payload
        .iter()
        .map(|request| match request.to_position() {
            Ok(position) => PortfolioEntry::from_position(&position),
            Err(e) => PortfolioEntry::failed(request.symbol.clone(), e),
        })
        .collect();

    info!("Aggregating portfolio of {} positions", entries.len());

    let aggregate = PortfolioAggregator::aggregate(&entries, window)?;
    Ok(Json(aggregate))
}

/// POST /profitability/open-book - Mark open positions to market
pub async fn open_book(
    State(state): State<AppState>,
    Json(payload): Json<Vec<CalculationRequest>>,
) -> Result<Json<OpenBookSummary>, ApiError> {
    let mut positions = Vec::with_capacity(payload.len());
    let mut rejected = Vec::new();
    for request in &payload {
        match request.to_position() {
            Ok(position) => positions.push(position),
            Err(e) => rejected.push(SkippedPosition::from_error(&request.symbol, &e)),
        }
    }

    let mut summary =
        summarize_open_book(&*state.quotes, &positions, state.quote_concurrency).await?;
    summary.failed.extend(rejected);
    Ok(Json(summary))
}

/// GET /prices/:symbol - Current quote for a symbol
pub async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<PriceDto>, ApiError> {
    let price = state
        .quotes
        .get_quote(&symbol)
        .await
        .map_err(|e| ApiError::NotFound(format!("Price for {} not found: {}", symbol, e)))?;

    Ok(Json(PriceDto {
        symbol,
        price,
        timestamp: Utc::now(),
    }))
}
