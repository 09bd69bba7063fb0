use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::error::FieldError;
use crate::types::post::Post;
use crate::types::request::Pagination;
use crate::types::user::User;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

impl ErrorResponse {
    pub(crate) fn new(error: &str) -> Self {
        Self {
            error: error.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ValidationErrorResponse {
    pub(crate) errors: Vec<FieldError>,
}

impl ValidationErrorResponse {
    pub(crate) fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }
}

/// Envelope for every successful body.
#[derive(Debug, Serialize)]
pub(crate) struct Response<T> {
    pub(crate) data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) meta: Option<Metadata>,
}

impl<T> Response<T> {
    pub(crate) fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    pub(crate) fn page(data: T, pagination: &Pagination, total: i64) -> Self {
        let last_page = ((total + pagination.page_size - 1) / pagination.page_size).max(1);

        Self {
            data,
            meta: Some(Metadata {
                current_page: pagination.page,
                page_size: pagination.page_size,
                first_page: 1,
                last_page,
                total_records: total,
            }),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct Metadata {
    pub(crate) current_page: i64,
    pub(crate) page_size: i64,
    pub(crate) first_page: i64,
    pub(crate) last_page: i64,
    pub(crate) total_records: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) token: String,
    pub(crate) user: UserResponse,
    pub(crate) expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostResponse {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user: Option<UserResponse>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            user: post.author.as_ref().map(UserResponse::from),
            title: post.title,
            content: post.content,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Health {
    pub(crate) status: &'static str,
    pub(crate) version: &'static str,
    pub(crate) env: String,
}
