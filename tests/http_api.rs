use axum::body::Body;
use axum::http::{Request, StatusCode};
use profitability_backend::infrastructure::StaticQuoteProvider;
use profitability_backend::{create_router, AppState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router() -> axum::Router {
    let quotes = StaticQuoteProvider::new()
        .with_price("AAPL", dec!(15))
        .with_price("TSLA", dec!(180));
    create_router(AppState::new(Arc::new(quotes), 4))
}

async fn call(method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Decimals are serialized as strings
fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.to_string().parse().unwrap(),
        other => panic!("not a decimal: {}", other),
    }
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_open_position_uses_quote_service() {
    let (status, body) = call(
        "POST",
        "/profitability/position",
        Some(json!({ "symbol": "AAPL", "direction": "LONG", "entryPrice": 10, "transactions": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["totalReturnPct"]), dec!(50));
    assert_eq!(body["status"], "OPEN");
    assert_eq!(body["unrealized"]["state"], "marked");
}

#[tokio::test]
async fn test_supplied_price_wins_and_missing_quote_is_null() {
    let (_, body) = call(
        "POST",
        "/profitability/position",
        Some(json!({ "symbol": "AAPL", "direction": "SHORT", "entryPrice": 10, "currentPrice": 8 })),
    )
    .await;
    assert_eq!(decimal(&body["totalReturnPct"]), dec!(20));

    let (status, body) = call(
        "POST",
        "/profitability/position",
        Some(json!({
            "symbol": "NOPE",
            "direction": "LONG",
            "entryPrice": 10,
            "transactions": [{ "type": "DECREASE", "percentage": 50, "price": 12 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["realizedReturnPct"]), dec!(10));
    assert!(body["totalReturnPct"].is_null());
    assert_eq!(body["unrealized"]["state"], "unavailable");
}

#[tokio::test]
async fn test_invalid_ledger_is_unprocessable() {
    let (status, body) = call(
        "POST",
        "/profitability/position",
        Some(json!({
            "symbol": "AAPL",
            "direction": "LONG",
            "entryPrice": 10,
            "transactions": [{ "type": "ADD", "percentage": 0, "price": 12 }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_allocation");
}

#[tokio::test]
async fn test_stored_ledger_document() {
    let (status, body) = call(
        "POST",
        "/profitability/ledger",
        Some(json!({
            "Symbol": "TSLA",
            "TradeDirection": "Buy",
            "PriceEntry": "[{\"id\":1,\"price\":\"100\",\"date\":\"2024-04-01T09:30:00Z\"},{\"id\":2,\"price\":\"200\",\"type\":\"add\",\"date\":\"2024-04-08\"}]",
            "ActiveAllocation": "[{\"id\":1,\"activeAllocation\":\"5\",\"date\":\"2024-04-01T09:30:00Z\"},{\"id\":2,\"activeAllocation\":\"100\",\"type\":\"add\",\"date\":\"2024-04-08\"}]",
            "State": true
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["weightedAveragePrice"]), dec!(150));
    assert_eq!(decimal(&body["activeAllocationPct"]), dec!(200));
    assert_eq!(decimal(&body["totalReturnPct"]), dec!(20));
}

#[tokio::test]
async fn test_portfolio_compounds_months() {
    let closed = |symbol: &str, exit: u32, date: &str| {
        json!({
            "symbol": symbol,
            "direction": "LONG",
            "entryPrice": 100,
            "transactions": [{ "type": "CLOSE", "percentage": 100, "price": exit, "date": date }]
        })
    };

    let (status, body) = call(
        "POST",
        "/profitability/portfolio",
        Some(json!([
            closed("A", 110, "2024-01-15"),
            closed("B", 110, "2024-02-15"),
            closed("C", 80, "2024-04-15"),
            { "symbol": "OPEN", "direction": "LONG", "entryPrice": 100 },
            { "symbol": "BAD", "direction": "LONG", "entryPrice": 100,
              "transactions": [{ "type": "CLOSE", "percentage": 40, "price": 90 }] }
        ])),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["compoundedReturnPct"]), dec!(-3.2));
    assert_eq!(body["monthGroups"].as_object().unwrap().len(), 3);
    assert_eq!(body["ineligible"], 1);
    assert_eq!(body["skipped"][0]["symbol"], "BAD");
    assert_eq!(body["skipped"][0]["code"], "inconsistent_close");
}

#[tokio::test]
async fn test_portfolio_lookback() {
    let (_, body) = call(
        "POST",
        "/profitability/portfolio?months=2&asOf=2024-04-30",
        Some(json!([
            { "symbol": "OLD", "direction": "LONG", "entryPrice": 100,
              "transactions": [{ "type": "CLOSE", "percentage": 100, "price": 150, "date": "2024-01-10" }] },
            { "symbol": "NEW", "direction": "LONG", "entryPrice": 100,
              "transactions": [{ "type": "CLOSE", "percentage": 100, "price": 104, "date": "2024-04-10" }] }
        ])),
    )
    .await;

    assert_eq!(body["positionsIncluded"], 1);
    assert_eq!(decimal(&body["compoundedReturnPct"]), dec!(4));

    let (status, body) = call("POST", "/profitability/portfolio?months=0", Some(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_open_book() {
    let (status, body) = call(
        "POST",
        "/profitability/open-book",
        Some(json!([
            { "symbol": "AAPL", "direction": "LONG", "entryPrice": 10 },
            { "symbol": "TSLA", "direction": "SHORT", "entryPrice": 200 },
            { "symbol": "GONE", "direction": "LONG", "entryPrice": 10 }
        ])),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["meanUnrealizedReturnPct"]), dec!(30));
    assert_eq!(body["unavailableSymbols"], json!(["GONE"]));
}

#[tokio::test]
async fn test_price_lookup() {
    let (status, body) = call("GET", "/prices/TSLA", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["price"]), dec!(180));

    let (status, body) = call("GET", "/prices/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
