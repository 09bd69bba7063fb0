use std::sync::Arc;
use std::time::Duration;

use crate::controllers::post::PostController;
use crate::controllers::user::UserController;
use crate::core::cache::{CacheAside, MemoryCache};
use crate::core::config::Args;
use crate::core::error::ConfigError;
use crate::core::store::{PostStore, UserStore};
use crate::utils::auth::TokenAuthority;
use crate::utils::ratelimiter::Ratelimiter;

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    pub(crate) env: String,
    pub(crate) ratelimiter: Ratelimiter,
    pub(crate) cache: CacheAside,
    pub(crate) user_controller: UserController,
    pub(crate) post_controller: PostController,
}

impl AppState {
    pub(crate) fn new(
        config: &Args,
        users: Arc<dyn UserStore>,
        posts: Arc<dyn PostStore>,
    ) -> Result<Self, ConfigError> {
        let cache = if config.cache_enabled {
            CacheAside::new(Arc::new(MemoryCache::new()), config.cache_timeout())
        } else {
            tracing::info!("Cache disabled, every read goes to the database");
            CacheAside::disabled()
        };

        let authority = Arc::new(TokenAuthority::new(
            &config.secret,
            &config.token_issuer,
            &config.token_audience,
        ));

        Ok(AppState {
            env: config.env.clone(),
            ratelimiter: Ratelimiter::new(
                config.ratelimiter_enabled,
                config.ratelimiter_requests,
                config.ratelimiter_window(),
                config.ratelimiter_shards,
            ),
            cache: cache.clone(),
            user_controller: UserController::new(
                users,
                cache.clone(),
                authority,
                config.token_expiry(),
            )?,
            post_controller: PostController::new(posts, cache),
        })
    }
}

/// Periodically drops stale rate-limit windows and expired cache entries.
pub(crate) async fn maintenance_loop(state: AppState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let removed = state.ratelimiter.sweep().await;
        let tracked = state.ratelimiter.tracked_clients().await;
        tracing::debug!(removed, tracked, "Swept rate limiter windows");

        state.cache.purge_expired().await;
    }
}
