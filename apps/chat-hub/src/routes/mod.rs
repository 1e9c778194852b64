use axum::Router;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(crate::gateway::server::router())
        .fallback(not_found)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
