pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod post;
pub(crate) mod router;
pub(crate) mod user;
