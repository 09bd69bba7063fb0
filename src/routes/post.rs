use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use crate::core::error::Error;
use crate::core::state::AppState;
use crate::types::request::{ListQuery, PostInput, PostUpdateInput};
use crate::types::response::{PostResponse, Response};
use crate::types::user::User;

#[tracing::instrument(skip_all)]
pub(crate) async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, Error> {
    let Query(query) = query?;
    let pagination = query.pagination();
    let filter = query.filter();

    let (posts, total) = state.post_controller.list(&pagination, &filter).await?;

    let posts: Vec<PostResponse> = posts.into_iter().map(PostResponse::from).collect();

    Ok(Json(Response::page(posts, &pagination, total)))
}

#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub(crate) async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(input) = payload?;

    let post = state.post_controller.create(&user, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(Response::new(PostResponse::from(post))),
    ))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn get(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, Error> {
    let Path(id) = id?;

    let post = state.post_controller.get(id).await?;

    Ok(Json(Response::new(PostResponse::from(post))))
}

#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub(crate) async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PostUpdateInput>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Path(id) = id?;
    let Json(input) = payload?;

    let post = state.post_controller.update(&user, id, input).await?;

    Ok(Json(Response::new(PostResponse::from(post))))
}

#[tracing::instrument(skip_all, fields(user_id = user.id))]
pub(crate) async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, Error> {
    let Path(id) = id?;

    state.post_controller.delete(&user, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
