use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user row. The password hash never leaves the process: it is skipped when
/// serializing, so cached copies carry an empty hash.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct User {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    #[serde(skip, default)]
    pub(crate) password_hash: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("is_active", &self.is_active)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NewUser {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) is_active: bool,
}
