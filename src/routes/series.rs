use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::query::{self, Period};
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/json", get(handler))
}

/// Window selection: an explicit `count` wins over `period`.
#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    period: Option<String>,
    count: Option<i64>,
}

async fn handler(
    Query(params): Query<SeriesQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    debug!("GET /json {:?}", params);

    let store = state.store.as_ref();
    let timeout = state.timeouts.store;
    let result = match params.count {
        // Never larger than the widest named window
        Some(count) => {
            query::series_for_count(store, count.clamp(0, Period::Year.count()), timeout).await
        }
        None => query::series(store, Period::parse(params.period.as_deref()), timeout).await,
    };

    match result {
        Ok(series) => (StatusCode::OK, Json(series)).into_response(),
        Err(e) => {
            error!("Failed to load measurements: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to load measurements"),
            )
                .into_response()
        }
    }
}
