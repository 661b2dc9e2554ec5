mod error;
mod setup;
mod webhooks;

pub use error::{ErrorBody, ErrorResponse};

use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new().route("/installations", get(setup::list_installations));

    let webhook_routes = Router::new().route("/github", post(webhooks::github_webhook));

    Router::new()
        .route("/health", get(health_check))
        .route("/setup", get(setup::setup_page))
        .route("/setup/callback", get(setup::setup_callback))
        .nest("/api", api_routes)
        .nest("/webhooks", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
