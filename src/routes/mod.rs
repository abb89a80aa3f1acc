pub mod graphql;
pub mod uploads;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full HTTP surface: GraphQL API plus blob upload and download.
pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.storage.max_upload_bytes;

    Router::new()
        .merge(graphql::router())
        .merge(uploads::router(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
