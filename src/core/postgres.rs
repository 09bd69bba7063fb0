use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;

use crate::core::error::Error;
use crate::core::store::{PostStore, UserStore, bounded};
use crate::types::post::{NewPost, Post, PostFilter};
use crate::types::request::Pagination;
use crate::types::user::{NewUser, User};

const SELECT_POSTS: &str = "SELECT
    p.id, p.title, p.content, p.user_id, p.created_at, p.updated_at,
    u.id AS author_id,
    u.username AS author_username,
    u.email AS author_email,
    u.is_active AS author_is_active,
    u.created_at AS author_created_at
    FROM posts p
    JOIN users u ON p.user_id = u.id";

fn map_user(row: PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn map_post(row: PgRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        author: Some(User {
            id: row.get("author_id"),
            username: row.get("author_username"),
            email: row.get("author_email"),
            password_hash: String::new(),
            is_active: row.get("author_is_active"),
            created_at: row.get("author_created_at"),
        }),
    }
}

fn map_unique_violation(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("users_email_key") => return Error::DuplicateEmail,
            Some("users_username_key") => return Error::DuplicateUsername,
            _ => {}
        }
    }

    Error::Sql(e)
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    let mut keyword = " WHERE ";

    if let Some(user_id) = filter.user_id {
        query.push(keyword).push("p.user_id = ").push_bind(user_id);
        keyword = " AND ";
    }

    if let Some(title) = &filter.title {
        query
            .push(keyword)
            .push("p.title ILIKE ")
            .push_bind(format!("%{}%", title));
        keyword = " AND ";
    }

    if let Some(content) = &filter.content {
        query
            .push(keyword)
            .push("p.content ILIKE ")
            .push_bind(format!("%{}%", content));
    }
}

fn list_query<'a>(pagination: &Pagination, filter: &PostFilter) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::new(SELECT_POSTS);
    push_filter(&mut query, filter);

    // column and direction come from closed enums, never from user input
    query
        .push(format!(
            " ORDER BY p.{} {}",
            pagination.sort_by.column(),
            pagination.sort.as_sql()
        ))
        .push(" LIMIT ")
        .push_bind(pagination.page_size)
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    query
}

fn count_query<'a>(filter: &PostFilter) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::new("SELECT COUNT(*) FROM posts p");
    push_filter(&mut query, filter);
    query
}

#[derive(Clone, Debug)]
pub(crate) struct PgUserStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub(crate) fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn get_by(&self, column: &'static str, value: Value<'_>) -> Result<Option<User>, Error> {
        let sql = format!(
            "SELECT id, username, email, password_hash, is_active, created_at
            FROM users WHERE {} = $1",
            column
        );

        let query = sqlx::query(&sql);
        let query = match value {
            Value::Id(id) => query.bind(id),
            Value::Text(text) => query.bind(text),
        };

        match bounded(self.timeout, async {
            query
                .map(map_user)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Sql)
        })
        .await
        {
            Ok(user) => Ok(Some(user)),
            Err(Error::Sql(sqlx::Error::RowNotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

enum Value<'a> {
    Id(i64),
    Text(&'a str),
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        bounded(self.timeout, async {
            sqlx::query(
                "INSERT INTO users (username, email, password_hash, is_active)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, email, password_hash, is_active, created_at;",
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .map(map_user)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, Error> {
        self.get_by("id", Value::Id(id)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.get_by("email", Value::Text(email)).await
    }

    async fn update(&self, user: &User) -> Result<bool, Error> {
        bounded(self.timeout, async {
            let result = sqlx::query(
                "UPDATE users SET username = $1, email = $2 WHERE id = $3;",
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(map_unique_violation)?;

            Ok(result.rows_affected() > 0)
        })
        .await
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PgPostStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgPostStore {
    pub(crate) fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create(&self, post: NewPost) -> Result<Post, Error> {
        bounded(self.timeout, async {
            sqlx::query(
                "INSERT INTO posts (title, content, user_id)
                VALUES ($1, $2, $3)
                RETURNING id, created_at, updated_at;",
            )
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.user_id)
            .map(|row: PgRow| Post {
                id: row.get("id"),
                title: post.title.clone(),
                content: post.content.clone(),
                user_id: post.user_id,
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                author: None,
            })
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Sql)
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>, Error> {
        let sql = format!("{} WHERE p.id = $1", SELECT_POSTS);

        match bounded(self.timeout, async {
            sqlx::query(&sql)
                .bind(id)
                .map(map_post)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Sql)
        })
        .await
        {
            Ok(post) => Ok(Some(post)),
            Err(Error::Sql(sqlx::Error::RowNotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update(&self, post: &Post) -> Result<Option<DateTime<Utc>>, Error> {
        bounded(self.timeout, async {
            sqlx::query(
                "UPDATE posts SET title = $1, content = $2, updated_at = NOW()
                WHERE id = $3 AND user_id = $4
                RETURNING updated_at;",
            )
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.id)
            .bind(post.user_id)
            .map(|row: PgRow| row.get("updated_at"))
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Sql)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<bool, Error> {
        bounded(self.timeout, async {
            let result = sqlx::query("DELETE FROM posts WHERE id = $1;")
                .bind(id)
                .execute(&self.pool)
                .await?;

            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn list(
        &self,
        pagination: &Pagination,
        filter: &PostFilter,
    ) -> Result<(Vec<Post>, i64), Error> {
        bounded(self.timeout, async {
            let total: i64 = count_query(filter)
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await?;

            let posts = list_query(pagination, filter)
                .build()
                .map(map_post)
                .fetch_all(&self.pool)
                .await?;

            Ok((posts, total))
        })
        .await
    }
}
