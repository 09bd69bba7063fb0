use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::core::error::Error;
use crate::core::state::AppState;
use crate::types::request::{LoginData, RegisterData};
use crate::types::response::Response;

#[tracing::instrument(skip_all)]
pub(crate) async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterData>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(data) = payload?;

    let token = state.user_controller.register(data).await?;

    Ok((StatusCode::CREATED, Json(Response::new(token))))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<LoginData>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(data) = payload?;

    let token = state.user_controller.login(data).await?;

    Ok(Json(Response::new(token)))
}
