use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use crate::core::error::Error;
use crate::types::post::{NewPost, Post, PostFilter};
use crate::types::request::Pagination;
use crate::types::user::{NewUser, User};

/// Durable user records. The store is authoritative; the cache only mirrors it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait UserStore: Send + Sync {
    /// Fails with `DuplicateEmail` or `DuplicateUsername` on a uniqueness clash.
    async fn create(&self, user: NewUser) -> Result<User, Error>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, Error>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Writes username, email and active flag. Returns false if the row is gone.
    async fn update(&self, user: &User) -> Result<bool, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait PostStore: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, Error>;

    /// The returned post carries its author.
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>, Error>;

    /// Only matches a row owned by `post.user_id`. Returns the new
    /// `updated_at`, or `None` when nothing matched.
    async fn update(&self, post: &Post) -> Result<Option<DateTime<Utc>>, Error>;

    /// Returns false when there was nothing to delete.
    async fn delete(&self, id: i64) -> Result<bool, Error>;

    /// One page of posts plus the total number of matches.
    async fn list(
        &self,
        pagination: &Pagination,
        filter: &PostFilter,
    ) -> Result<(Vec<Post>, i64), Error>;
}

/// Runs a store call under a deadline. Running out of time, or failing to get
/// a connection at all, means the database is unavailable.
pub(crate) async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(limit, operation).await {
        Ok(Err(Error::Sql(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)))) | Err(_) => {
            Err(Error::DependencyUnavailable("database"))
        }
        Ok(result) => result,
    }
}
