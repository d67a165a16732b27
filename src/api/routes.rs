use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::*;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Profitability routes
        .route("/profitability/position", post(position_profitability))
        .route("/profitability/ledger", post(ledger_profitability))
        .route("/profitability/portfolio", post(portfolio_profitability))
        .route("/profitability/open-book", post(open_book))

        // Market data
        .route("/prices/:symbol", get(get_price))

        .with_state(state)
}
