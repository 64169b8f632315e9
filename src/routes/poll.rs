use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tracing::{error, info};

use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/poll", get(handler))
}

/// Handle `GET /poll`.
///
/// Answers `ok` once the sensor has been read, even if some rows failed to
/// insert; those failures are only logged.
async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    info!("GET /poll - manual poll requested");

    match state.poll().await {
        Ok(_) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            error!("Poll failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(e.to_string())).into_response()
        }
    }
}
