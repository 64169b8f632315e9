//! Route gateway: merges every sub-router and binds the shared state.

use axum::Router;

use crate::AppState;

mod db;
mod health;
mod poll;
mod series;
mod view;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(series::router())
        .merge(poll::router())
        .merge(db::router())
        .merge(health::router())
        .merge(view::router())
        .with_state(state)
}
