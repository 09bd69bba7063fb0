use axum::http::HeaderMap;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

use crate::core::cache::{CacheAside, CacheKey, USER_TTL};
use crate::core::error::{self, Error};
use crate::core::store::UserStore;
use crate::types::request::{LoginData, RegisterData, UpdateUserData};
use crate::types::response::{TokenResponse, UserResponse};
use crate::types::user::{NewUser, User};
use crate::utils::auth::{TokenAuthority, bearer_token};
use crate::utils::validate::Validator;

#[derive(Clone)]
pub(crate) struct UserController {
    users: Arc<dyn UserStore>,
    cache: CacheAside,
    authority: Arc<TokenAuthority>,
    token_ttl: Duration,
    hash_cost: u32,
    email_pattern: Regex,
}

impl std::fmt::Debug for UserController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserController")
            .field("cache", &self.cache)
            .field("authority", &self.authority)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl UserController {
    pub(crate) fn new(
        users: Arc<dyn UserStore>,
        cache: CacheAside,
        authority: Arc<TokenAuthority>,
        token_ttl: Duration,
    ) -> Result<Self, error::ConfigError> {
        Ok(Self {
            users,
            cache,
            authority,
            token_ttl,
            hash_cost: bcrypt::DEFAULT_COST,
            email_pattern: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")?,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    async fn hash(&self, password: String) -> Result<String, Error> {
        let cost = self.hash_cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|_| Error::Internal)?
            .map_err(Error::Bcrypt)
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, Error> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|_| Error::Internal)?
            .map_err(Error::Bcrypt)
    }

    fn token_response(&self, user: &User) -> Result<TokenResponse, Error> {
        let (token, expires_at) = self.authority.issue(user.id, self.token_ttl)?;

        Ok(TokenResponse {
            token,
            user: UserResponse::from(user),
            expires_at,
        })
    }

    pub(crate) async fn register(&self, data: RegisterData) -> Result<TokenResponse, Error> {
        let mut validator = Validator::new();
        validator.text("username", &data.username, 3, Some(100));
        validator.email("email", &data.email, 255, &self.email_pattern);
        validator.text("password", &data.password, 8, Some(72));
        validator.finish()?;

        let password_hash = self.hash(data.password).await?;

        let user = self
            .users
            .create(NewUser {
                username: data.username,
                email: data.email,
                password_hash,
                is_active: true,
            })
            .await?;

        tracing::info!(user_id = user.id, "Registered user {}", user.username);

        self.cache.put(CacheKey::User(user.id), &user, USER_TTL).await;

        self.token_response(&user)
    }

    pub(crate) async fn login(&self, data: LoginData) -> Result<TokenResponse, Error> {
        let mut validator = Validator::new();
        validator.email("email", &data.email, 255, &self.email_pattern);
        validator.required("password", &data.password);
        validator.finish()?;

        let user = self
            .users
            .get_by_email(&data.email)
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !self
            .verify_password(data.password, user.password_hash.clone())
            .await?
        {
            return Err(Error::InvalidCredentials);
        }

        self.cache.put(CacheKey::User(user.id), &user, USER_TTL).await;

        self.token_response(&user)
    }

    pub(crate) async fn get_user(&self, id: i64) -> Result<Option<User>, Error> {
        self.cache
            .read_through(CacheKey::User(id), USER_TTL, || self.users.get_by_id(id))
            .await
    }

    pub(crate) async fn update_user(
        &self,
        principal: &User,
        data: UpdateUserData,
    ) -> Result<User, Error> {
        let mut validator = Validator::new();
        if let Some(username) = &data.username {
            validator.text("username", username, 3, Some(100));
        }
        if let Some(email) = &data.email {
            validator.email("email", email, 255, &self.email_pattern);
        }
        validator.finish()?;

        // the principal may come from the cache, so the write starts from the stored row
        let mut user = self
            .users
            .get_by_id(principal.id)
            .await?
            .ok_or(Error::NotFound)?;
        if !user.is_active {
            self.cache.invalidate(CacheKey::User(user.id)).await;
            return Err(Error::AccountInactive);
        }

        if let Some(username) = data.username {
            user.username = username;
        }
        if let Some(email) = data.email {
            user.email = email;
        }

        if !self.users.update(&user).await? {
            return Err(Error::NotFound);
        }

        self.cache.invalidate(CacheKey::User(user.id)).await;

        Ok(user)
    }

    /// Resolves the bearer token in `headers` to an active user.
    pub(crate) async fn authenticate(&self, headers: &HeaderMap) -> Result<User, Error> {
        let token = bearer_token(headers)?;
        let id = self.authority.verify(token)?;

        let user = self.get_user(id).await?.ok_or(Error::IdentityNotFound)?;

        if !user.is_active {
            return Err(Error::AccountInactive);
        }

        Ok(user)
    }
}
