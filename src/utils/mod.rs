pub(crate) mod auth;
pub(crate) mod ratelimiter;
pub(crate) mod validate;
