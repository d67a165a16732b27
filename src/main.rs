use anyhow::Result;
use profitability_backend::infrastructure::{HttpQuoteClient, QuoteProvider, StaticQuoteProvider};
use profitability_backend::{create_router, AppState, ServiceConfig};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Profitability Backend");

    let config = ServiceConfig::from_env()?;

    info!("Configuration:");
    info!("  Listen address: {}", config.listen_addr());
    info!("  Quote timeout: {:?}", config.quote_timeout);
    info!("  Quote concurrency: {}", config.quote_concurrency);

    let quotes: Arc<dyn QuoteProvider> = match &config.quote_service_url {
        Some(url) => {
            info!("  Quote service: {}", url);
            Arc::new(HttpQuoteClient::new(url.clone(), config.quote_timeout)?)
        }
        None => {
            warn!("QUOTE_SERVICE_URL not set, open positions will not be marked to market");
            Arc::new(StaticQuoteProvider::new())
        }
    };

    let state = AppState::new(quotes, config.quote_concurrency);

    // Create router with middleware
    let app = create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start HTTP server
    let addr = config.listen_addr();
    info!("HTTP server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
