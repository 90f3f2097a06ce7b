/// Axum HTTP server setup and routing
use axum::{
    routing::{get, post},
    Router,
};
use instant_send::InMemoryLedger;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;

pub fn create_router(ledger: Arc<InMemoryLedger>) -> Router {
    // Mini app frontends call straight from the browser
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/time", get(get_time))
        // Account endpoints
        .route("/balance/:address", get(get_balance))
        .route("/escrow/:address", get(get_escrow))
        // Transaction endpoints
        .route("/tx", post(submit_transaction))
        .route("/tx/:id/status", get(get_transaction_status))
        // Devnet helper endpoints
        .route("/devnet/airdrop", post(airdrop))
        .route("/devnet/advance", post(advance_time))
        // Shared state
        .with_state(ledger)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(ledger: Arc<InMemoryLedger>, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(ledger.clone());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Ledger mock listening on http://{}", addr);
    log::info!("Escrow program {}, fee {}", ledger.program_id(), ledger.fee());
    log::info!("Devnet endpoints: POST /devnet/airdrop, POST /devnet/advance");

    axum::serve(listener, app).await?;

    Ok(())
}
