pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod postgres;
pub(crate) mod state;
pub(crate) mod store;
