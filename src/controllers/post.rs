use std::sync::Arc;

use crate::core::cache::{CacheAside, CacheKey, POST_TTL};
use crate::core::error::Error;
use crate::core::store::PostStore;
use crate::types::post::{NewPost, Post, PostFilter};
use crate::types::request::{Pagination, PostInput, PostUpdateInput};
use crate::types::user::User;
use crate::utils::validate::Validator;

#[derive(Clone)]
pub(crate) struct PostController {
    posts: Arc<dyn PostStore>,
    cache: CacheAside,
}

impl std::fmt::Debug for PostController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostController")
            .field("cache", &self.cache)
            .finish()
    }
}

fn validate_title(validator: &mut Validator, title: &str) {
    validator.text("title", title, 3, Some(200));
}

fn validate_content(validator: &mut Validator, content: &str) {
    validator.text("content", content, 10, None);
}

impl PostController {
    pub(crate) fn new(posts: Arc<dyn PostStore>, cache: CacheAside) -> Self {
        Self { posts, cache }
    }

    pub(crate) async fn create(&self, author: &User, input: PostInput) -> Result<Post, Error> {
        let mut validator = Validator::new();
        validate_title(&mut validator, &input.title);
        validate_content(&mut validator, &input.content);
        validator.finish()?;

        let mut post = self
            .posts
            .create(NewPost {
                title: input.title,
                content: input.content,
                user_id: author.id,
            })
            .await?;
        post.author = Some(author.clone());

        tracing::debug!(post_id = post.id, user_id = author.id, "Created post");

        self.cache.put(CacheKey::Post(post.id), &post, POST_TTL).await;

        Ok(post)
    }

    pub(crate) async fn get(&self, id: i64) -> Result<Post, Error> {
        self.cache
            .read_through(CacheKey::Post(id), POST_TTL, || self.posts.get_by_id(id))
            .await?
            .ok_or(Error::NotFound)
    }

    /// Ownership is always checked against the store, never the cache.
    async fn owned(&self, principal: &User, id: i64) -> Result<Post, Error> {
        let post = self.posts.get_by_id(id).await?.ok_or(Error::NotFound)?;

        if post.user_id != principal.id {
            tracing::info!(post_id = id, user_id = principal.id, "Rejected change to foreign post");
            return Err(Error::Forbidden);
        }

        Ok(post)
    }

    pub(crate) async fn update(
        &self,
        principal: &User,
        id: i64,
        input: PostUpdateInput,
    ) -> Result<Post, Error> {
        let mut post = self.owned(principal, id).await?;

        let mut validator = Validator::new();
        if let Some(title) = &input.title {
            validate_title(&mut validator, title);
        }
        if let Some(content) = &input.content {
            validate_content(&mut validator, content);
        }
        validator.finish()?;

        if let Some(title) = input.title {
            post.title = title;
        }
        if let Some(content) = input.content {
            post.content = content;
        }

        post.updated_at = self.posts.update(&post).await?.ok_or(Error::NotFound)?;

        self.cache.invalidate(CacheKey::Post(id)).await;

        Ok(post)
    }

    pub(crate) async fn delete(&self, principal: &User, id: i64) -> Result<(), Error> {
        self.owned(principal, id).await?;

        if !self.posts.delete(id).await? {
            return Err(Error::NotFound);
        }

        self.cache.invalidate(CacheKey::Post(id)).await;

        Ok(())
    }

    pub(crate) async fn list(
        &self,
        pagination: &Pagination,
        filter: &PostFilter,
    ) -> Result<(Vec<Post>, i64), Error> {
        self.posts.list(pagination, filter).await
    }
}
