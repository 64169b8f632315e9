use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tracing::{error, info};

use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/db/initialize", get(handler))
}

/// Handle `GET /db/initialize`: create the schema if it is missing.
async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match state.store.initialize().await {
        Ok(()) => {
            info!("Schema initialized");
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => {
            error!("Failed to initialize schema: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to initialize schema"),
            )
                .into_response()
        }
    }
}
