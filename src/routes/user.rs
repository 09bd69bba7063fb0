use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use crate::core::error::Error;
use crate::core::state::AppState;
use crate::types::request::UpdateUserData;
use crate::types::response::{Response, UserResponse};
use crate::types::user::User;

pub(crate) async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(Response::new(UserResponse::from(&user)))
}

#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub(crate) async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<UpdateUserData>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(data) = payload?;

    let user = state.user_controller.update_user(&user, data).await?;

    Ok(Json(Response::new(UserResponse::from(&user))))
}
