//! HTTP service exposing the shadow pipeline as JSON endpoints.

mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;

pub fn build_router(config: Config) -> Router {
    let state = Arc::new(AppState { config });

    Router::new()
        .route("/api/sun", get(handlers::sun_position))
        .route("/api/ratio", post(handlers::shadow_ratio))
        .route("/api/route", post(handlers::route_shade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(config: Config) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    eprintln!("  ShadePath server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, build_router(config)).await
}
