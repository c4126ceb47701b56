//! `api` crate: HTTP surface for editor sessions.
//!
//! Exposes:
//!   POST   /api/v1/workflows/:id/session
//!   GET    /api/v1/workflows/:id/session
//!   DELETE /api/v1/workflows/:id/session
//!   POST   /api/v1/workflows/:id/session/actions
//!   GET    /api/v1/workflows/:id/session/issues
//!   POST   /api/v1/workflows/:id/publish

pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub use state::AppState;

/// All routes, with tracing and permissive CORS for the editor UI.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/workflows/:id/session",
            post(handlers::sessions::open)
                .get(handlers::sessions::view)
                .delete(handlers::sessions::close),
        )
        .route("/api/v1/workflows/:id/session/actions", post(handlers::sessions::dispatch))
        .route("/api/v1/workflows/:id/session/issues", get(handlers::sessions::issues))
        .route("/api/v1/workflows/:id/publish", post(handlers::sessions::publish))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
