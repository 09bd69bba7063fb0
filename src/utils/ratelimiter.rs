use axum::extract::{ConnectInfo, Request, State};
use axum::{body::Body, http::Response, middleware::Next};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::core::error::Error;
use crate::core::state::AppState;

#[derive(Debug)]
struct Window {
    count: AtomicU32,
    expiry: Instant,
}

impl Window {
    fn open(now: Instant, length: Duration) -> Self {
        Self {
            count: AtomicU32::new(1),
            expiry: now + length,
        }
    }

    /// Increments the counter unless it is already at `limit`.
    fn try_admit(&self, limit: u32) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < limit).then_some(count + 1)
            })
            .is_ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Decision {
    pub(crate) permitted: bool,
    pub(crate) retry_after: Duration,
}

impl Decision {
    fn permit() -> Self {
        Self {
            permitted: true,
            retry_after: Duration::ZERO,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            permitted: false,
            retry_after,
        }
    }
}

type Shard = RwLock<HashMap<String, Window>>;

/// Fixed-window request counter per client. Clients are spread over
/// independently locked shards; stale windows are dropped by `sweep`.
#[derive(Clone)]
pub(crate) struct Ratelimiter {
    enabled: bool,
    max_requests: u32,
    window_length: Duration,
    shards: Arc<[Shard]>,
}

impl std::fmt::Debug for Ratelimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ratelimiter")
            .field("enabled", &self.enabled)
            .field("max_requests", &self.max_requests)
            .field("window_length", &self.window_length)
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl Ratelimiter {
    pub(crate) fn new(
        enabled: bool,
        max_requests: u32,
        window_length: Duration,
        shards: usize,
    ) -> Self {
        assert!(max_requests > 0);

        Self {
            enabled,
            max_requests,
            window_length,
            shards: (0..shards.max(1))
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);

        &self.shards[(hasher.finish() % self.shards.len() as u64) as usize]
    }

    /// Counts a request from `key` against its current window.
    pub(crate) async fn allow(&self, key: &str) -> Decision {
        if !self.enabled {
            return Decision::permit();
        }

        let shard = self.shard(key);
        let now = Instant::now();

        {
            let windows = shard.read().await;
            if let Some(window) = windows.get(key).filter(|window| now < window.expiry) {
                return self.admit(window, now);
            }
        }

        let mut windows = shard.write().await;

        // someone may have opened a window while we waited for the lock
        if let Some(window) = windows.get(key).filter(|window| now < window.expiry) {
            return self.admit(window, now);
        }

        windows.insert(key.to_owned(), Window::open(now, self.window_length));

        Decision::permit()
    }

    fn admit(&self, window: &Window, now: Instant) -> Decision {
        if window.try_admit(self.max_requests) {
            Decision::permit()
        } else {
            Decision::deny(window.expiry - now)
        }
    }

    /// Drops windows that expired at least one window length ago. Returns the
    /// number removed.
    pub(crate) async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        for shard in self.shards.iter() {
            let mut windows = shard.write().await;
            let before = windows.len();

            windows.retain(|_, window| now < window.expiry + self.window_length);

            removed += before - windows.len();
        }

        removed
    }

    pub(crate) async fn tracked_clients(&self) -> usize {
        let mut total = 0;
        for shard in self.shards.iter() {
            total += shard.read().await.len();
        }
        total
    }
}

/// First `X-Forwarded-For` entry, else the peer address without its port.
pub(crate) fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(client) = forwarded {
        return client.to_owned();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

pub(crate) async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response<Body>, Error> {
    let client = client_key(&request);
    let decision = state.ratelimiter.allow(&client).await;

    if !decision.permitted {
        tracing::info!(%client, "Rate limit exceeded");
        return Err(Error::RateLimited(decision.retry_after));
    }

    Ok(next.run(request).await)
}
