pub(crate) mod post;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod user;
