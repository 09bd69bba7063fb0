use config::builder::DefaultState;
use config::{Config, ConfigBuilder};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Args {
    pub(crate) env: String,
    pub(crate) port: u16,
    pub(crate) log_level: String,
    pub(crate) database_host: String,
    pub(crate) database_port: u16,
    pub(crate) database_name: String,
    pub(crate) database_user: String,
    pub(crate) database_password: String,
    pub(crate) database_max_connections: u32,
    /// upper bound on any single store call, in seconds
    pub(crate) store_timeout_secs: u64,
    pub(crate) secret: String,
    pub(crate) token_issuer: String,
    pub(crate) token_audience: String,
    pub(crate) token_expiry_secs: u64,
    pub(crate) ratelimiter_enabled: bool,
    pub(crate) ratelimiter_requests: u32,
    pub(crate) ratelimiter_window_secs: u64,
    pub(crate) ratelimiter_shards: usize,
    pub(crate) sweep_interval_secs: u64,
    pub(crate) cache_enabled: bool,
    /// upper bound on any single cache call, in milliseconds
    pub(crate) cache_timeout_ms: u64,
}

impl Args {
    pub(crate) fn load() -> Result<Self, config::ConfigError> {
        Self::from_builder(
            defaults(Config::builder())?.add_source(config::Environment::with_prefix("SOCIAL_API")),
        )
    }

    pub(crate) fn from_builder(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        let args = builder.build()?.try_deserialize::<Args>()?;
        args.validate()?;
        Ok(args)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        let positive = [
            ("ratelimiter_requests", self.ratelimiter_requests as u64),
            ("ratelimiter_window_secs", self.ratelimiter_window_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("store_timeout_secs", self.store_timeout_secs),
        ];

        for (key, value) in positive {
            if value == 0 {
                return Err(config::ConfigError::Message(format!(
                    "{} must be greater than zero",
                    key
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn database_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.database_user,
            self.database_password,
            self.database_host,
            self.database_port,
            self.database_name
        )
    }

    pub(crate) fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub(crate) fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_secs)
    }

    pub(crate) fn ratelimiter_window(&self) -> Duration {
        Duration::from_secs(self.ratelimiter_window_secs)
    }

    pub(crate) fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub(crate) fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}

/// Everything except the signing secret has a default.
pub(crate) fn defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_default("env", "development")?
        .set_default("port", 8080_i64)?
        .set_default("log_level", "info")?
        .set_default("database_host", "localhost")?
        .set_default("database_port", 5432_i64)?
        .set_default("database_name", "socialnetwork")?
        .set_default("database_user", "postgres")?
        .set_default("database_password", "postgres")?
        .set_default("database_max_connections", 25_i64)?
        .set_default("store_timeout_secs", 5_i64)?
        .set_default("token_issuer", "social-api")?
        .set_default("token_audience", "social-api-users")?
        .set_default("token_expiry_secs", 24 * 60 * 60_i64)?
        .set_default("ratelimiter_enabled", true)?
        .set_default("ratelimiter_requests", 20_i64)?
        .set_default("ratelimiter_window_secs", 5_i64)?
        .set_default("ratelimiter_shards", 16_i64)?
        .set_default("sweep_interval_secs", 60_i64)?
        .set_default("cache_enabled", true)?
        .set_default("cache_timeout_ms", 500_i64)
}
