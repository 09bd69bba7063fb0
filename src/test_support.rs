use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{TimeZone, Utc};
use config::Config;
use std::sync::Arc;
use std::time::Duration;

use crate::controllers::user::UserController;
use crate::core::cache::{CacheAside, MemoryCache};
use crate::core::config::{Args, defaults};
use crate::core::state::AppState;
use crate::core::store::{MockPostStore, MockUserStore};
use crate::types::post::Post;
use crate::types::user::User;
use crate::utils::auth::TokenAuthority;

pub(crate) const SECRET: &str = "test-secret";

pub(crate) fn args(requests: u32) -> Args {
    let builder = defaults(Config::builder())
        .and_then(|builder| builder.set_override("secret", SECRET))
        .and_then(|builder| builder.set_override("ratelimiter_requests", requests as i64))
        .and_then(|builder| builder.set_override("ratelimiter_window_secs", 60_i64))
        .unwrap();

    Args::from_builder(builder).unwrap()
}

pub(crate) fn authority() -> TokenAuthority {
    let args = args(1);
    TokenAuthority::new(SECRET, &args.token_issuer, &args.token_audience)
}

pub(crate) fn bearer(user_id: i64) -> HeaderMap {
    let (token, _) = authority()
        .issue(user_id, Duration::from_secs(3600))
        .unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

pub(crate) fn memory_cache() -> CacheAside {
    CacheAside::new(Arc::new(MemoryCache::new()), Duration::from_secs(1))
}

pub(crate) fn user(id: i64, is_active: bool) -> User {
    User {
        id,
        username: format!("user{}", id),
        email: format!("user{}@example.com", id),
        password_hash: String::new(),
        is_active,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub(crate) fn post(id: i64, user_id: i64) -> Post {
    let created_at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();

    Post {
        id,
        title: format!("Post {}", id),
        content: "Some content about crabs".to_owned(),
        user_id,
        created_at,
        updated_at: created_at,
        author: Some(user(user_id, true)),
    }
}

pub(crate) fn user_controller(users: MockUserStore, cache: CacheAside) -> UserController {
    UserController::new(
        Arc::new(users),
        cache,
        Arc::new(authority()),
        Duration::from_secs(3600),
    )
    .unwrap()
    .with_hash_cost(4)
}

/// State over mocked stores, allowing `requests` requests per client per minute.
pub(crate) fn state(users: MockUserStore, posts: MockPostStore, requests: u32) -> AppState {
    let mut state = AppState::new(&args(requests), Arc::new(users), Arc::new(posts)).unwrap();
    state.user_controller = state.user_controller.with_hash_cost(4);
    state
}
