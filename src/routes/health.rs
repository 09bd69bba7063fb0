use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::core::state::AppState;
use crate::types::response::{Health, Response};

pub(crate) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(Response::new(Health {
        status: "available",
        version: env!("CARGO_PKG_VERSION"),
        env: state.env,
    }))
}
